//! Logs command - inspect and prune the event log

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use dialoguer::Confirm;
use serde::Serialize;

use super::get_ledger_dir;
use crate::output;
use ledger_core::services::logging::now_ms;
use ledger_core::{EntryPoint, LogEntry, LoggingService};

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

#[derive(Subcommand)]
pub enum LogsCommands {
    /// Show recent log entries
    List {
        /// Number of entries to show
        #[arg(short, long, default_value = "50")]
        limit: usize,
        /// Show only failed operations
        #[arg(long)]
        errors: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete entries older than a number of days
    Clear {
        #[arg(long, default_value = "30")]
        older_than_days: u64,
        /// Don't ask for confirmation
        #[arg(long, short = 'f')]
        force: bool,
    },
    /// Entry counts and where the log lives
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Copy the log database to a file
    Export {
        /// Destination path
        output: PathBuf,
    },
}

#[derive(Serialize)]
struct LogStats {
    entries: u64,
    errors: u64,
    path: PathBuf,
    size_bytes: u64,
}

pub fn run(command: LogsCommands) -> Result<()> {
    let ledger_dir = get_ledger_dir()?;
    std::fs::create_dir_all(&ledger_dir)?;
    let service = LoggingService::new(&ledger_dir, EntryPoint::Cli, env!("CARGO_PKG_VERSION"))?;

    match command {
        LogsCommands::List { limit, errors, json } => list(&service, limit, errors, json),
        LogsCommands::Clear {
            older_than_days,
            force,
        } => clear(&service, older_than_days, force),
        LogsCommands::Stats { json } => stats(&service, json),
        LogsCommands::Export { output: path } => export(&service, &path),
    }
}

fn list(service: &LoggingService, limit: usize, errors: bool, json: bool) -> Result<()> {
    let entries = if errors {
        service.get_errors(limit)?
    } else {
        service.get_recent(limit)?
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else if entries.is_empty() {
        output::info("The event log is empty.");
    } else {
        let mut table = output::create_table();
        table.set_header(vec!["Time", "Event", "Account", "Transfer", "Error"]);
        for entry in &entries {
            table.add_row(row(entry));
        }
        println!("{}", table);
    }
    Ok(())
}

fn row(entry: &LogEntry) -> Vec<String> {
    let time = chrono::DateTime::from_timestamp_millis(entry.timestamp)
        .map(|at| output::format_timestamp(&at))
        .unwrap_or_else(|| entry.timestamp.to_string());
    let event = match &entry.command {
        Some(command) => format!("{} ({})", entry.event, command),
        None => entry.event.clone(),
    };
    let error = match (&entry.error_kind, &entry.error_message) {
        (Some(kind), Some(message)) => format!("{}: {}", kind, message).red().to_string(),
        (Some(kind), None) => kind.red().to_string(),
        _ => String::new(),
    };
    vec![
        time,
        event,
        entry.account_id.clone().unwrap_or_default(),
        entry.transfer_id.clone().unwrap_or_default(),
        error,
    ]
}

fn clear(service: &LoggingService, older_than_days: u64, force: bool) -> Result<()> {
    if !force
        && !Confirm::new()
            .with_prompt(format!("Delete entries older than {} days?", older_than_days))
            .default(false)
            .interact()?
    {
        return Ok(());
    }

    let cutoff = now_ms() - older_than_days as i64 * DAY_MS;
    let deleted = service.delete_before(cutoff)?;
    output::success(&format!("Deleted {} entries", deleted));
    Ok(())
}

fn stats(service: &LoggingService, json: bool) -> Result<()> {
    let path = service.db_path().to_path_buf();
    let stats = LogStats {
        entries: service.count()?,
        errors: service.error_count()?,
        size_bytes: std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0),
        path,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }
    let mut table = output::create_table();
    table.add_row(vec!["Entries".to_string(), stats.entries.to_string()]);
    table.add_row(vec!["Errors".to_string(), stats.errors.to_string()]);
    table.add_row(vec!["Path".to_string(), stats.path.display().to_string()]);
    table.add_row(vec!["Size".to_string(), format!("{} bytes", stats.size_bytes)]);
    println!("{}", table);
    Ok(())
}

fn export(service: &LoggingService, path: &Path) -> Result<()> {
    let written = service.export(path)?;
    output::success(&format!("Event log copied to {}", written.display()));
    Ok(())
}
