use std::io::Read;

use anyhow::{Context, anyhow};
use chrono::{Local, NaiveDateTime};
use tracing::{debug, info, instrument, warn};

use crate::cli::Invocation;
use crate::config::Config;
use crate::datetime::{parse_date_expr, parse_day_expr};
use crate::grid::format_duration;
use crate::layout::{self, LayoutEngine};
use crate::render::Renderer;
use crate::store::{Persistence, TaskDraft, TaskStore};
use crate::task::{Recurrence, Task, TaskPatch};

const MIN_EDITOR_DURATION: u32 = 15;
const MAX_EDITOR_DURATION: u32 = 480;
const DEFAULT_DURATION: u32 = 60;
const DEFAULT_COLOR: &str = "#3b82f6";

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "add",
        "list",
        "day",
        "info",
        "modify",
        "schedule",
        "unschedule",
        "done",
        "delete",
        "stats",
        "export",
        "import",
        "help",
        "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

#[instrument(skip(store, cfg, renderer, inv))]
pub fn dispatch<P: Persistence>(
    store: &mut TaskStore<P>,
    cfg: &Config,
    renderer: &mut Renderer,
    inv: Invocation,
) -> anyhow::Result<()> {
    let now = Local::now().naive_local();

    // The per-load reconciliation pass: today's occurrences exist before
    // any command runs. Idempotent, so running it on every dispatch is
    // safe.
    let generated = store
        .generate_occurrences(now.date(), cfg.recurrence_policy())
        .context("failed to generate today's occurrences")?;
    if generated > 0 {
        debug!(generated, "reconciled today's occurrences");
    }

    let command = inv.command.as_str();
    debug!(command, args = ?inv.command_args, "dispatching command");

    match command {
        "add" => cmd_add(store, &inv.command_args, now),
        "list" => cmd_list(store, renderer),
        "day" => cmd_day(store, cfg, renderer, &inv.command_args, now),
        "info" => cmd_info(store, renderer, &inv.command_args),
        "modify" => cmd_modify(store, &inv.command_args),
        "schedule" => cmd_schedule(store, cfg, &inv.command_args, now),
        "unschedule" => cmd_unschedule(store, &inv.command_args),
        "done" => cmd_done(store, &inv.command_args, now),
        "delete" => cmd_delete(store, &inv.command_args),
        "stats" => cmd_stats(store, renderer),
        "export" => cmd_export(store),
        "import" => cmd_import(store),
        "help" => cmd_help(),
        "version" => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other}")),
    }
}

/// Resolve a task by full id or unique id prefix. Mutating commands go
/// through this so a typo reports instead of silently no-opping.
///
/// Occurrence ids embed their series id as a prefix, so a prefix of a
/// series id also matches every occurrence the series has generated. A
/// prefix that reaches one task plus nothing but its own occurrences
/// still names that task unambiguously.
fn resolve_id<P: Persistence>(store: &TaskStore<P>, token: &str) -> anyhow::Result<String> {
    if let Some(task) = store.get(token) {
        return Ok(task.id.clone());
    }

    let matches: Vec<&Task> = store
        .list_tasks()
        .iter()
        .filter(|task| task.id.starts_with(token))
        .collect();

    match matches.as_slice() {
        [] => Err(anyhow!("no task matches id: {token}")),
        [only] => Ok(only.id.clone()),
        many => many
            .iter()
            .find(|candidate| {
                many.iter().all(|t| {
                    t.id == candidate.id
                        || t.parent_task_id.as_deref() == Some(candidate.id.as_str())
                })
            })
            .map(|candidate| candidate.id.clone())
            .ok_or_else(|| anyhow!("ambiguous id prefix: {token}")),
    }
}

#[derive(Debug, Default)]
struct Mods {
    title_words: Vec<String>,
    description: Option<String>,
    duration_minutes: Option<u32>,
    color: Option<String>,
    recur: Option<String>,
    interval: Option<u32>,
    weekdays: Option<Vec<u32>>,
}

fn parse_mods(args: &[String]) -> anyhow::Result<Mods> {
    let mut mods = Mods::default();

    for arg in args {
        if let Some(value) = arg.strip_prefix("desc:") {
            mods.description = Some(value.to_string());
        } else if let Some(value) = arg.strip_prefix("duration:") {
            mods.duration_minutes =
                Some(value.parse().with_context(|| format!("invalid duration: {value}"))?);
        } else if let Some(value) = arg.strip_prefix("color:") {
            mods.color = Some(value.to_string());
        } else if let Some(value) = arg.strip_prefix("recur:") {
            mods.recur = Some(value.to_ascii_lowercase());
        } else if let Some(value) = arg.strip_prefix("interval:") {
            mods.interval =
                Some(value.parse().with_context(|| format!("invalid interval: {value}"))?);
        } else if let Some(value) = arg.strip_prefix("weekdays:") {
            let days = value
                .split(',')
                .map(|d| {
                    d.trim()
                        .parse::<u32>()
                        .ok()
                        .filter(|d| *d <= 6)
                        .ok_or_else(|| anyhow!("invalid weekday (0=Sun..6=Sat): {d}"))
                })
                .collect::<anyhow::Result<Vec<u32>>>()?;
            mods.weekdays = Some(days);
        } else {
            mods.title_words.push(arg.clone());
        }
    }

    Ok(mods)
}

fn build_recurrence(mods: &Mods) -> anyhow::Result<Option<Option<Recurrence>>> {
    let Some(recur) = &mods.recur else {
        return Ok(None);
    };
    let interval = mods.interval.unwrap_or(1).max(1);

    let rule = match recur.as_str() {
        "none" => return Ok(Some(None)),
        "daily" => Recurrence::Daily { interval },
        "weekly" => Recurrence::Weekly { interval },
        "monthly" => Recurrence::Monthly { interval },
        "weekdays" => Recurrence::Weekdays {
            weekdays: mods.weekdays.clone().unwrap_or_default(),
        },
        other => return Err(anyhow!("unknown recurrence type: {other}")),
    };
    Ok(Some(Some(rule)))
}

#[instrument(skip(store, args, now))]
fn cmd_add<P: Persistence>(
    store: &mut TaskStore<P>,
    args: &[String],
    now: NaiveDateTime,
) -> anyhow::Result<()> {
    info!("command add");

    let mods = parse_mods(args)?;
    let title = mods.title_words.join(" ").trim().to_string();
    if title.is_empty() {
        return Err(anyhow!("add requires a non-empty title"));
    }

    // Boundary validation; the store itself does not re-check.
    let duration = mods.duration_minutes.unwrap_or(DEFAULT_DURATION);
    if !(MIN_EDITOR_DURATION..=MAX_EDITOR_DURATION).contains(&duration) {
        return Err(anyhow!(
            "duration must be between {MIN_EDITOR_DURATION} and {MAX_EDITOR_DURATION} minutes"
        ));
    }

    let recurrence = build_recurrence(&mods)?.flatten();
    let draft = TaskDraft {
        title,
        description: mods.description.filter(|d| !d.is_empty()),
        duration_minutes: duration,
        color: mods.color.unwrap_or_else(|| DEFAULT_COLOR.to_string()),
        recurrence,
    };

    let task = store.add_task(draft, now)?;
    println!("Created task {}.", &task.id[..8.min(task.id.len())]);
    Ok(())
}

#[instrument(skip(store, renderer))]
fn cmd_list<P: Persistence>(
    store: &mut TaskStore<P>,
    renderer: &mut Renderer,
) -> anyhow::Result<()> {
    info!("command list");
    renderer.print_task_table(store.list_tasks())
}

#[instrument(skip(store, cfg, renderer, args, now))]
fn cmd_day<P: Persistence>(
    store: &mut TaskStore<P>,
    cfg: &Config,
    renderer: &mut Renderer,
    args: &[String],
    now: NaiveDateTime,
) -> anyhow::Result<()> {
    info!("command day");

    let date = match args.first() {
        Some(expr) => parse_day_expr(expr, now)?,
        None => now.date(),
    };

    let grid = cfg.time_grid();
    let layout = LayoutEngine {
        granularity_minutes: grid.granularity_minutes,
        ..LayoutEngine::default()
    };

    let day_tasks: Vec<Task> = store
        .occurrences_for_date(date)
        .into_iter()
        .cloned()
        .collect();
    renderer.print_day_grid(&grid, &layout, date, &day_tasks)
}

#[instrument(skip(store, renderer, args))]
fn cmd_info<P: Persistence>(
    store: &mut TaskStore<P>,
    renderer: &mut Renderer,
    args: &[String],
) -> anyhow::Result<()> {
    info!("command info");

    let token = args.first().ok_or_else(|| anyhow!("info requires a task id"))?;
    let id = resolve_id(store, token)?;
    let task = store.get(&id).ok_or_else(|| anyhow!("task vanished: {id}"))?;
    renderer.print_task_info(task)
}

#[instrument(skip(store, args))]
fn cmd_modify<P: Persistence>(store: &mut TaskStore<P>, args: &[String]) -> anyhow::Result<()> {
    info!("command modify");

    let (token, rest) = args
        .split_first()
        .ok_or_else(|| anyhow!("modify requires a task id"))?;
    let id = resolve_id(store, token)?;
    let mods = parse_mods(rest)?;

    if let Some(duration) = mods.duration_minutes
        && !(MIN_EDITOR_DURATION..=MAX_EDITOR_DURATION).contains(&duration)
    {
        return Err(anyhow!(
            "duration must be between {MIN_EDITOR_DURATION} and {MAX_EDITOR_DURATION} minutes"
        ));
    }

    let title = mods.title_words.join(" ").trim().to_string();
    let patch = TaskPatch {
        title: (!title.is_empty()).then_some(title),
        description: mods
            .description
            .as_ref()
            .map(|d| (!d.is_empty()).then(|| d.clone())),
        duration_minutes: mods.duration_minutes,
        color: mods.color.clone(),
        recurrence: build_recurrence(&mods)?,
    };

    store.update_task(&id, &patch)?;
    println!("Modified task {}.", &id[..8.min(id.len())]);
    Ok(())
}

#[instrument(skip(store, cfg, args, now))]
fn cmd_schedule<P: Persistence>(
    store: &mut TaskStore<P>,
    cfg: &Config,
    args: &[String],
    now: NaiveDateTime,
) -> anyhow::Result<()> {
    info!("command schedule");

    let (token, rest) = args
        .split_first()
        .ok_or_else(|| anyhow!("schedule requires a task id and a time"))?;
    let id = resolve_id(store, token)?;

    let expr = rest.join(" ");
    if expr.trim().is_empty() {
        return Err(anyhow!("schedule requires a time expression"));
    }
    let at = parse_date_expr(&expr, now)?;

    // The CLI behaves like a drop: the time snaps to its grid slot and
    // overwrites any prior placement.
    let grid = cfg.time_grid();
    layout::drop_on_slot(store, &grid, &id, at)?;

    let slot = grid.slot_for(at);
    println!(
        "Scheduled task {} at {}.",
        &id[..8.min(id.len())],
        slot.format("%Y-%m-%d %H:%M")
    );
    Ok(())
}

#[instrument(skip(store, args))]
fn cmd_unschedule<P: Persistence>(store: &mut TaskStore<P>, args: &[String]) -> anyhow::Result<()> {
    info!("command unschedule");

    let token = args
        .first()
        .ok_or_else(|| anyhow!("unschedule requires a task id"))?;
    let id = resolve_id(store, token)?;
    store.unschedule_task(&id)?;
    println!("Unscheduled task {}.", &id[..8.min(id.len())]);
    Ok(())
}

#[instrument(skip(store, args, now))]
fn cmd_done<P: Persistence>(
    store: &mut TaskStore<P>,
    args: &[String],
    now: NaiveDateTime,
) -> anyhow::Result<()> {
    info!("command done");

    let token = args.first().ok_or_else(|| anyhow!("done requires a task id"))?;
    let id = resolve_id(store, token)?;
    store.complete_task(&id, now)?;

    let completed = store.get(&id).is_some_and(|t| t.completed);
    if completed {
        println!("Completed task {}.", &id[..8.min(id.len())]);
    } else {
        println!("Reopened task {}.", &id[..8.min(id.len())]);
    }
    Ok(())
}

#[instrument(skip(store, args))]
fn cmd_delete<P: Persistence>(store: &mut TaskStore<P>, args: &[String]) -> anyhow::Result<()> {
    info!("command delete");

    let token = args
        .first()
        .ok_or_else(|| anyhow!("delete requires a task id"))?;
    let id = resolve_id(store, token)?;

    let cascade = store
        .list_tasks()
        .iter()
        .filter(|t| t.parent_task_id.as_deref() == Some(id.as_str()))
        .count();
    store.delete_task(&id)?;

    if cascade > 0 {
        println!(
            "Deleted task {} and {cascade} occurrence(s).",
            &id[..8.min(id.len())]
        );
    } else {
        println!("Deleted task {}.", &id[..8.min(id.len())]);
    }
    Ok(())
}

#[instrument(skip(store, renderer))]
fn cmd_stats<P: Persistence>(
    store: &mut TaskStore<P>,
    renderer: &mut Renderer,
) -> anyhow::Result<()> {
    info!("command stats");
    renderer.print_stats(&store.statistics())
}

#[instrument(skip(store))]
fn cmd_export<P: Persistence>(store: &mut TaskStore<P>) -> anyhow::Result<()> {
    info!("command export");

    let serialized = serde_json::to_string_pretty(store.list_tasks())?;
    println!("{serialized}");
    Ok(())
}

#[instrument(skip(store))]
fn cmd_import<P: Persistence>(store: &mut TaskStore<P>) -> anyhow::Result<()> {
    info!("command import");

    let mut raw = String::new();
    std::io::stdin()
        .read_to_string(&mut raw)
        .context("failed reading import payload from stdin")?;

    let tasks: Vec<Task> = serde_json::from_str(&raw).context("failed parsing import payload")?;
    let count = tasks.len();
    store.replace_all(tasks)?;

    if count == 0 {
        warn!("imported an empty task set");
    }
    println!("Imported {count} task(s).");
    Ok(())
}

fn cmd_help() -> anyhow::Result<()> {
    println!("usage: dayplan [flags] <command> [args]");
    println!();
    println!("commands:");
    println!("  add <title> [duration:MIN] [color:#hex] [desc:TEXT]");
    println!("      [recur:daily|weekly|monthly|weekdays] [interval:N] [weekdays:0,1,..6]");
    println!("  list");
    println!("  day [today|tomorrow|YYYY-MM-DD]");
    println!("  info <id>");
    println!("  modify <id> [new title] [duration:MIN] [color:#hex] [desc:TEXT] [recur:...]");
    println!("  schedule <id> <time>     time snaps to the nearest grid slot");
    println!("  unschedule <id>");
    println!("  done <id>                toggles completion");
    println!("  delete <id>              cascades to generated occurrences");
    println!("  stats");
    println!("  export | import");
    println!();
    println!(
        "durations are minutes ({MIN_EDITOR_DURATION}..{MAX_EDITOR_DURATION}, default {})",
        format_duration(DEFAULT_DURATION)
    );
    Ok(())
}
