//! History command - list the transfers of one account

use anyhow::Result;
use colored::Colorize;

use super::{get_context, get_logger, log_command, report};
use crate::output;
use ledger_core::domain::result::Result as LedgerResult;
use ledger_core::{AccountKey, Direction, TransferRecord};

pub fn run(account: &str, raw: bool, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let logger = get_logger();
    log_command(&logger, "history");

    let key = AccountKey::parse(account);

    if raw {
        let records: LedgerResult<Vec<TransferRecord>> = ctx
            .history(&key)
            .and_then(|history| history.iter().collect());
        return report(records, json, |records| {
            if records.is_empty() {
                output::info("No transfers yet.");
                return;
            }
            let mut table = output::create_table();
            table.set_header(vec!["Seq", "Time", "Source", "Destination", "Amount"]);
            for record in records {
                table.add_row(vec![
                    record.sequence.to_string(),
                    output::format_timestamp(&record.created_at),
                    record.source_id.to_string(),
                    record.destination_id.to_string(),
                    output::format_money(record.amount),
                ]);
            }
            output::align_right(&mut table, &[4]);
            println!("{}", table);
        });
    }

    report(ctx.history_service.statement(&key), json, |views| {
        if views.is_empty() {
            output::info("No transfers yet.");
            return;
        }
        let mut table = output::create_table();
        table.set_header(vec!["Time", "Direction", "Counterparty", "Email", "Amount"]);
        for view in views {
            let (direction, amount) = match view.direction {
                Direction::Sent => (
                    "sent".red().to_string(),
                    format!("-{}", output::format_money(view.amount)),
                ),
                Direction::Received => (
                    "received".green().to_string(),
                    output::format_money(view.amount),
                ),
            };
            table.add_row(vec![
                output::format_timestamp(&view.created_at),
                direction,
                view.counterparty_name.clone(),
                view.counterparty_email.clone(),
                amount,
            ]);
        }
        output::align_right(&mut table, &[4]);
        println!("{}", table);
        println!("{} transfer(s)", views.len());
    })
}
