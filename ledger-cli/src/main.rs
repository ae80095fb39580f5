//! Ledger CLI - accounts and transfers in your terminal

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{accounts, audit, history, logs, register, show, transfer};

/// Ledger - accounts and transfers in your terminal
#[derive(Parser)]
#[command(name = "ledger", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open a new account (prompts for missing values)
    Register {
        /// Account holder name
        #[arg(long)]
        name: Option<String>,
        /// Unique email address
        #[arg(long)]
        email: Option<String>,
        /// Opening balance
        #[arg(long)]
        balance: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Move money between two accounts
    Transfer {
        /// Source account (id or email)
        from: String,
        /// Destination account (id or email)
        to: String,
        /// Amount, at most two decimal places
        amount: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the transfers of an account, oldest first
    History {
        /// Account id or email
        account: String,
        /// Show raw log records instead of the resolved statement
        #[arg(long)]
        raw: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show one account
    Show {
        /// Account id or email
        account: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List all accounts with ledger totals
    Accounts {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check balances against the transfer history
    Audit {
        /// Only audit this account (id or email)
        account: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// View and manage the event log
    Logs {
        #[command(subcommand)]
        command: logs::LogsCommands,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Diagnostics go to stderr so --json output stays clean
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("LEDGER_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&format!("Error: {:#}", e));
            if matches!(e.downcast_ref::<ledger_core::Error>(), Some(err) if err.is_retryable()) {
                output::error("The ledger was busy; the command can be retried as-is.");
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Register {
            name,
            email,
            balance,
            json,
        } => register::run(name, email, balance, json),
        Commands::Transfer {
            from,
            to,
            amount,
            json,
        } => transfer::run(&from, &to, &amount, json),
        Commands::History { account, raw, json } => history::run(&account, raw, json),
        Commands::Show { account, json } => show::run(&account, json),
        Commands::Accounts { json } => accounts::run(json),
        Commands::Audit { account, json } => audit::run(account, json),
        Commands::Logs { command } => logs::run(command),
    }
}
