use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::NaiveDate;
use unicode_width::UnicodeWidthStr;

use crate::color;
use crate::config::Config;
use crate::grid::{TimeGrid, format_duration};
use crate::layout::LayoutEngine;
use crate::stats::Statistics;
use crate::task::{Recurrence, Task};

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self { color })
    }

    #[tracing::instrument(skip(self, tasks))]
    pub fn print_task_table(&mut self, tasks: &[Task]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        let headers = vec![
            "ID".to_string(),
            "Title".to_string(),
            "Duration".to_string(),
            "Recurrence".to_string(),
            "Scheduled".to_string(),
            "Done".to_string(),
        ];

        let mut rows = Vec::with_capacity(tasks.len());
        for task in tasks {
            let id = self.paint(&short_id(&task.id), "33");
            let scheduled = task
                .scheduled_date
                .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default();
            let recurrence = task
                .recurrence
                .as_ref()
                .map(describe_recurrence)
                .unwrap_or_default();
            let done = if task.completed {
                self.paint("yes", "32")
            } else {
                String::new()
            };

            rows.push(vec![
                id,
                task.title.clone(),
                format_duration(task.duration_minutes),
                recurrence,
                scheduled,
                done,
            ]);
        }

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, task))]
    pub fn print_task_info(&mut self, task: &Task) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        writeln!(out, "id          {}", task.id)?;
        writeln!(out, "title       {}", task.title)?;
        writeln!(
            out,
            "description {}",
            task.description.clone().unwrap_or_default()
        )?;
        writeln!(out, "duration    {}", format_duration(task.duration_minutes))?;
        writeln!(out, "color       {}", task.color)?;
        writeln!(
            out,
            "recurrence  {}",
            task.recurrence
                .as_ref()
                .map(describe_recurrence)
                .unwrap_or_default()
        )?;
        writeln!(out, "created     {}", task.created_at.format("%Y-%m-%dT%H:%M:%S"))?;
        writeln!(out, "completed   {}", task.completed)?;

        if let Some(at) = task.scheduled_date {
            writeln!(out, "scheduled   {}", at.format("%Y-%m-%dT%H:%M:%S"))?;
        }
        if let Some(at) = task.completed_at {
            writeln!(out, "completedAt {}", at.format("%Y-%m-%dT%H:%M:%S"))?;
        }
        if let Some(parent) = &task.parent_task_id {
            writeln!(out, "parent      {parent}")?;
        }

        Ok(())
    }

    /// The day view: one line per slot, tasks anchored at their starting
    /// slot with the layout engine's horizontal placement.
    #[tracing::instrument(skip(self, grid, layout, day_tasks))]
    pub fn print_day_grid(
        &mut self,
        grid: &TimeGrid,
        layout: &LayoutEngine,
        date: NaiveDate,
        day_tasks: &[Task],
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        writeln!(out, "{}", date.format("%A, %B %-d"))?;
        writeln!(out)?;

        for slot in grid.slots(date) {
            let anchored: Vec<Task> = day_tasks
                .iter()
                .filter(|task| grid.starts_in_slot(task, slot))
                .cloned()
                .collect();

            let label = self.paint(&slot.format("%H:%M").to_string(), "90");
            if anchored.is_empty() {
                writeln!(out, "{label}  .")?;
                continue;
            }

            let mut cells = Vec::with_capacity(anchored.len());
            for task in &anchored {
                let pos = layout.position_in_slot(&anchored, &task.id);
                let mark = if task.completed { "✓ " } else { "" };
                let title = if task.completed {
                    self.paint(&task.title, "32")
                } else {
                    self.paint_on_color(&task.title, &task.color)
                };
                cells.push(format!(
                    "{mark}{title} ({}) [{:.0}%+{:.0}%]",
                    format_duration(task.duration_minutes),
                    pos.left_pct,
                    pos.width_pct,
                ));
            }
            writeln!(out, "{label}  {}", cells.join(" | "))?;
        }

        Ok(())
    }

    #[tracing::instrument(skip(self, stats))]
    pub fn print_stats(&mut self, stats: &Statistics) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        writeln!(out, "tasks       {}", stats.total_tasks)?;
        writeln!(out, "completed   {}", stats.completed_tasks)?;
        writeln!(out, "scheduled   {}", stats.scheduled_tasks)?;
        writeln!(out, "completion  {:.0}%", stats.completion_rate * 100.0)?;
        writeln!(out, "scheduling  {:.0}%", stats.scheduling_rate * 100.0)?;
        writeln!(out)?;

        let headers = vec![
            "ID".to_string(),
            "Title".to_string(),
            "Instances".to_string(),
            "Completed".to_string(),
            "Scheduled".to_string(),
            "Rate".to_string(),
        ];

        let rows = stats
            .per_series
            .iter()
            .map(|series| {
                vec![
                    self.paint(&short_id(&series.task_id), "33"),
                    series.title.clone(),
                    series.total_instances.to_string(),
                    series.completed_instances.to_string(),
                    series.scheduled_instances.to_string(),
                    format!("{:.0}%", series.completion_rate * 100.0),
                ]
            })
            .collect();

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }

    /// Paint text over the task's own color block, picking whichever of
    /// black or white reads against it.
    fn paint_on_color(&self, text: &str, hex: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        let Some((r, g, b)) = color::parse_hex(hex) else {
            return text.to_string();
        };
        let fg = if color::contrast_text_color(hex) == "#000000" {
            "30"
        } else {
            "97"
        };
        format!("\x1b[{fg};48;2;{r};{g};{b}m{text}\x1b[0m")
    }
}

/// Occurrence ids embed their date, so show enough of the front to stay
/// readable while remaining paste-able as a prefix selector.
fn short_id(id: &str) -> String {
    id.chars().take(8).collect()
}

pub fn describe_recurrence(rule: &Recurrence) -> String {
    match rule {
        Recurrence::Daily { interval } if *interval > 1 => format!("every {interval} days"),
        Recurrence::Daily { .. } => "daily".to_string(),
        Recurrence::Weekly { interval } if *interval > 1 => format!("every {interval} weeks"),
        Recurrence::Weekly { .. } => "weekly".to_string(),
        Recurrence::Monthly { interval } if *interval > 1 => format!("every {interval} months"),
        Recurrence::Monthly { .. } => "monthly".to_string(),
        Recurrence::Weekdays { weekdays } => {
            const NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];
            let names: Vec<&str> = weekdays
                .iter()
                .filter_map(|d| NAMES.get(*d as usize).copied())
                .collect();
            format!("weekdays {}", names.join(","))
        }
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::describe_recurrence;
    use crate::task::Recurrence;

    #[test]
    fn recurrence_descriptions_read_naturally() {
        assert_eq!(describe_recurrence(&Recurrence::Daily { interval: 1 }), "daily");
        assert_eq!(
            describe_recurrence(&Recurrence::Weekly { interval: 2 }),
            "every 2 weeks"
        );
        assert_eq!(
            describe_recurrence(&Recurrence::Weekdays {
                weekdays: vec![1, 3, 5]
            }),
            "weekdays Mon,Wed,Fri"
        );
    }
}
