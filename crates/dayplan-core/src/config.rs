use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use tracing::{debug, info, trace, warn};

use crate::grid::{
    DEFAULT_END_HOUR, DEFAULT_GRANULARITY_MINUTES, DEFAULT_START_HOUR, TimeGrid,
};
use crate::recurrence::RecurrencePolicy;

#[derive(Debug, Clone)]
pub struct Config {
    map: HashMap<String, String>,
    pub loaded_files: Vec<PathBuf>,
}

impl Config {
    #[tracing::instrument(skip(rc_override))]
    pub fn load(rc_override: Option<&Path>) -> anyhow::Result<Self> {
        let mut cfg = Config {
            map: HashMap::new(),
            loaded_files: vec![],
        };

        cfg.map
            .insert("data.location".to_string(), "~/.dayplan".to_string());
        cfg.map
            .insert("default.command".to_string(), "day".to_string());
        cfg.map.insert("color".to_string(), "on".to_string());
        cfg.map.insert(
            "grid.granularity".to_string(),
            DEFAULT_GRANULARITY_MINUTES.to_string(),
        );
        cfg.map
            .insert("grid.start.hour".to_string(), DEFAULT_START_HOUR.to_string());
        cfg.map
            .insert("grid.end.hour".to_string(), DEFAULT_END_HOUR.to_string());
        cfg.map
            .insert("recurrence.honor.interval".to_string(), "off".to_string());

        let rc = resolve_rc_path(rc_override)?;
        if let Some(path) = rc {
            info!(rc = %path.display(), "loading rc file");
            cfg.load_file(&path)?;
        } else {
            debug!("no rc file found; using defaults");
        }

        Ok(cfg)
    }

    #[tracing::instrument(skip(self, overrides))]
    pub fn apply_overrides<I>(&mut self, overrides: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (k, v) in overrides {
            let key = k.strip_prefix("rc.").unwrap_or(&k).to_string();
            debug!(key = %key, value = %v, "applying override");
            self.map.insert(key, v);
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.map.get(key).cloned()
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.map.get(key).map(|v| parse_bool(v))
    }

    pub fn get_u32(&self, key: &str) -> Option<u32> {
        self.map.get(key).and_then(|v| v.trim().parse().ok())
    }

    /// Grid settings, falling back to the defaults on unparseable values.
    pub fn time_grid(&self) -> TimeGrid {
        TimeGrid::new(
            self.get_u32("grid.granularity")
                .unwrap_or(DEFAULT_GRANULARITY_MINUTES),
            self.get_u32("grid.start.hour").unwrap_or(DEFAULT_START_HOUR),
            self.get_u32("grid.end.hour").unwrap_or(DEFAULT_END_HOUR),
        )
    }

    pub fn recurrence_policy(&self) -> RecurrencePolicy {
        if self.get_bool("recurrence.honor.interval").unwrap_or(false) {
            RecurrencePolicy::honor_interval()
        } else {
            RecurrencePolicy::legacy()
        }
    }

    #[tracing::instrument(skip(self))]
    fn load_file(&mut self, path: &Path) -> anyhow::Result<()> {
        let path = expand_tilde(path);
        let text = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;

        self.loaded_files.push(path.clone());

        let base_dir = path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        for (line_num, raw_line) in text.lines().enumerate() {
            let mut line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((before, _)) = line.split_once('#') {
                line = before.trim();
            }

            if line.is_empty() {
                continue;
            }

            if let Some(include_rest) = line.strip_prefix("include ") {
                let include_path = resolve_include_path(&base_dir, include_rest.trim())?;
                debug!(
                    file = %path.display(),
                    include = %include_path.display(),
                    line = line_num + 1,
                    "processing include"
                );

                if include_path.exists() {
                    self.load_file(&include_path)?;
                } else {
                    warn!(include = %include_path.display(), "include file does not exist; skipping");
                }
                continue;
            }

            let (k, v) = line.split_once('=').ok_or_else(|| {
                anyhow!(
                    "invalid config line {}:{}: {}",
                    path.display(),
                    line_num + 1,
                    raw_line
                )
            })?;

            let key = k.trim().to_string();
            let value = v.trim().to_string();
            trace!(key = %key, value = %value, "loaded config key");
            self.map.insert(key, value);
        }

        Ok(())
    }
}

#[tracing::instrument(skip(cfg, override_dir))]
pub fn resolve_data_dir(cfg: &Config, override_dir: Option<&Path>) -> anyhow::Result<PathBuf> {
    let dir = if let Some(path) = override_dir {
        path.to_path_buf()
    } else if let Some(cfg_value) = cfg.get("data.location") {
        expand_tilde(Path::new(&cfg_value))
    } else {
        default_data_dir()?
    };

    if !dir.exists() {
        info!(dir = %dir.display(), "creating data directory");
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }

    Ok(dir)
}

#[tracing::instrument(skip(override_path))]
fn resolve_rc_path(override_path: Option<&Path>) -> anyhow::Result<Option<PathBuf>> {
    if let Some(path) = override_path {
        return Ok(Some(path.to_path_buf()));
    }

    if let Ok(rc_env) = std::env::var("DAYPLANRC") {
        if rc_env == "/dev/null" {
            return Ok(None);
        }
        return Ok(Some(PathBuf::from(rc_env)));
    }

    let home = dirs::home_dir().ok_or_else(|| anyhow!("cannot determine home directory"))?;
    let candidate = home.join(".dayplanrc");
    if candidate.exists() {
        return Ok(Some(candidate));
    }

    Ok(None)
}

fn default_data_dir() -> anyhow::Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| anyhow!("cannot determine home directory"))?;
    Ok(home.join(".dayplan"))
}

fn resolve_include_path(base_dir: &Path, include: &str) -> anyhow::Result<PathBuf> {
    if include.trim().is_empty() {
        return Err(anyhow!("include path cannot be empty"));
    }

    let raw = PathBuf::from(include);
    let expanded = expand_tilde(&raw);
    if expanded.is_absolute() {
        Ok(expanded)
    } else {
        Ok(base_dir.join(expanded))
    }
}

fn expand_tilde(path: &Path) -> PathBuf {
    let text = path.to_string_lossy();
    if let Some(rest) = text.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    path.to_path_buf()
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_ascii_lowercase().as_str(),
        "1" | "y" | "yes" | "on" | "true"
    )
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::Config;

    #[test]
    fn defaults_give_the_standard_grid() {
        let mut file = tempfile::NamedTempFile::new().expect("temp rc");
        file.flush().expect("flush");
        let cfg = Config::load(Some(file.path())).expect("load config");

        let grid = cfg.time_grid();
        assert_eq!(grid.granularity_minutes, 30);
        assert_eq!(grid.start_hour, 6);
        assert_eq!(grid.end_hour, 23);
        assert!(!cfg.recurrence_policy().honor_interval);
    }

    #[test]
    fn overrides_replace_file_values() {
        let mut file = tempfile::NamedTempFile::new().expect("temp rc");
        writeln!(file, "# comment").expect("write");
        writeln!(file, "grid.granularity = 60").expect("write");
        writeln!(file, "grid.start.hour = 0").expect("write");
        writeln!(file, "grid.end.hour = 24").expect("write");
        file.flush().expect("flush");

        let mut cfg = Config::load(Some(file.path())).expect("load config");
        assert_eq!(cfg.time_grid().granularity_minutes, 60);

        cfg.apply_overrides(vec![("rc.grid.granularity".to_string(), "15".to_string())]);
        assert_eq!(cfg.time_grid().granularity_minutes, 15);
    }

    #[test]
    fn honor_interval_is_opt_in() {
        let mut file = tempfile::NamedTempFile::new().expect("temp rc");
        writeln!(file, "recurrence.honor.interval = yes").expect("write");
        file.flush().expect("flush");

        let cfg = Config::load(Some(file.path())).expect("load config");
        assert!(cfg.recurrence_policy().honor_interval);
    }
}
