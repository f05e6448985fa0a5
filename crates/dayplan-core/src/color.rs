//! Stateless color helpers for rendering text on task colors.

/// Pick black or white text for a `#rrggbb` background using perceived
/// luminance. Unparseable input gets black, matching a light default
/// background.
pub fn contrast_text_color(hex: &str) -> &'static str {
    let Some((r, g, b)) = parse_hex(hex) else {
        return "#000000";
    };

    let luminance =
        (0.299 * f64::from(r) + 0.587 * f64::from(g) + 0.114 * f64::from(b)) / 255.0;
    if luminance > 0.5 { "#000000" } else { "#ffffff" }
}

pub fn parse_hex(hex: &str) -> Option<(u8, u8, u8)> {
    let digits = hex.strip_prefix('#')?;
    if digits.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&digits[0..2], 16).ok()?;
    let g = u8::from_str_radix(&digits[2..4], 16).ok()?;
    let b = u8::from_str_radix(&digits[4..6], 16).ok()?;
    Some((r, g, b))
}

#[cfg(test)]
mod tests {
    use super::contrast_text_color;

    #[test]
    fn dark_backgrounds_get_white_text() {
        assert_eq!(contrast_text_color("#000000"), "#ffffff");
        assert_eq!(contrast_text_color("#1a237e"), "#ffffff");
    }

    #[test]
    fn light_backgrounds_get_black_text() {
        assert_eq!(contrast_text_color("#ffffff"), "#000000");
        assert_eq!(contrast_text_color("#ffeb3b"), "#000000");
    }

    #[test]
    fn garbage_falls_back_to_black() {
        assert_eq!(contrast_text_color("red"), "#000000");
        assert_eq!(contrast_text_color("#12"), "#000000");
    }
}
