use std::fmt::Write as _;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::Args;
use crossbeam_channel::bounded;

use crate::app::controller::ChartPoint;
use crate::app::App;
use crate::colorize::gradient_hue;
use crate::dates::{DateKey, MonthRange};
use crate::model::{Entry, MonthEntryCache, PainLevel, UserId};
use crate::storage::{EntryStore, RangeSubscription, StorePayload};

const SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Args, Debug, Clone)]
pub struct LogArgs {
    /// Day to record, as YYYY-MM-DD
    #[arg()]
    pub date: DateKey,
    /// Pain level from 0 (none) to 10 (worst); required for a day with no entry yet
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=10))]
    pub level: Option<u8>,
    /// Notes for the day; replaces any existing notes
    #[arg(long)]
    pub notes: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ShowArgs {
    /// Month to print, as YYYY-MM (defaults to the current month)
    #[arg(long)]
    pub month: Option<MonthRange>,
}

#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
    /// Month to export, as YYYY-MM (defaults to the current month)
    #[arg(long)]
    pub month: Option<MonthRange>,
}

pub fn run_tui(app: &mut App) -> Result<()> {
    app.run()
}

pub fn log_entry(store: &dyn EntryStore, user_id: Option<&UserId>, args: LogArgs) -> Result<()> {
    let user_id = require_user(user_id)?;
    let entry = build_entry(store, user_id, &args)?;
    store
        .put(user_id, &entry)
        .with_context(|| format!("saving entry for {}", entry.date))?;
    println!(
        "Logged {} for {}: level {}{}",
        entry.date,
        user_id,
        entry.pain_level,
        if entry.notes.is_empty() { "" } else { " with notes" }
    );
    Ok(())
}

pub fn show_month(store: &dyn EntryStore, user_id: Option<&UserId>, args: ShowArgs) -> Result<()> {
    let user_id = require_user(user_id)?;
    let month = args
        .month
        .unwrap_or_else(|| MonthRange::containing(DateKey::today()));
    let entries = read_month(store, user_id, month)?;
    print!("{}", format_month(month, &entries));
    Ok(())
}

pub fn export_month(
    store: &dyn EntryStore,
    user_id: Option<&UserId>,
    args: ExportArgs,
) -> Result<()> {
    let user_id = require_user(user_id)?;
    let month = args
        .month
        .unwrap_or_else(|| MonthRange::containing(DateKey::today()));
    let entries = read_month(store, user_id, month)?;
    println!("{}", export_json(&entries)?);
    Ok(())
}

fn require_user(user_id: Option<&UserId>) -> Result<&UserId> {
    user_id.ok_or_else(|| {
        anyhow!("no user configured; pass --user, set PAINLOG_USER or add user_id to the config")
    })
}

/// Reads one month through a short-lived subscription.
fn read_month(
    store: &dyn EntryStore,
    user_id: &UserId,
    month: MonthRange,
) -> Result<MonthEntryCache> {
    let (sink, events) = bounded(1);
    let handle = store.subscribe(RangeSubscription::for_month(user_id.clone(), month, 0), sink);
    let event = events.recv_timeout(SNAPSHOT_TIMEOUT);
    store.unsubscribe(handle);
    let event = event.with_context(|| format!("waiting for entries of {month}"))?;
    match event.payload {
        StorePayload::Snapshot(entries) => Ok(entries),
        StorePayload::Error(message) => bail!("reading entries for {month}: {message}"),
    }
}

fn build_entry(store: &dyn EntryStore, user_id: &UserId, args: &LogArgs) -> Result<Entry> {
    let existing = read_month(store, user_id, MonthRange::containing(args.date))?
        .remove(&args.date);
    let pain_level = match (args.level, existing.as_ref()) {
        (Some(level), _) => PainLevel::new(level)?,
        (None, Some(entry)) => entry.pain_level,
        (None, None) => bail!("{} has no entry yet; pass --level", args.date),
    };
    let notes = args
        .notes
        .clone()
        .or_else(|| existing.map(|entry| entry.notes))
        .unwrap_or_default();
    Ok(Entry::new(args.date, pain_level, notes))
}

fn format_month(month: MonthRange, entries: &MonthEntryCache) -> String {
    let mut out = String::new();
    let _ = writeln!(&mut out, "{}", month.title());
    if entries.is_empty() {
        out.push_str("No entries.\n");
        return out;
    }
    for entry in entries.values() {
        let _ = writeln!(
            &mut out,
            "{}  {:<6}  level {:>2}  hue {:>3}",
            entry.date,
            entry.date.label(),
            entry.pain_level,
            gradient_hue(entry.pain_level)
        );
        let notes = entry.notes.trim();
        if !notes.is_empty() {
            let snippet: String = notes.lines().next().unwrap_or("").chars().take(160).collect();
            let _ = writeln!(&mut out, "    {snippet}");
        }
    }
    out
}

fn export_json(entries: &MonthEntryCache) -> Result<String> {
    let points: Vec<ChartPoint> = entries.values().map(ChartPoint::from).collect();
    serde_json::to_string_pretty(&points).context("serializing entries")
}
