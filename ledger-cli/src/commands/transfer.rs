//! Transfer command - move money between two accounts

use anyhow::Result;

use super::{get_context, get_logger, log_command, log_error, log_event, parse_amount, report};
use crate::output;
use ledger_core::{AccountKey, LogEvent};

pub fn run(from: &str, to: &str, amount: &str, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let logger = get_logger();
    log_command(&logger, "transfer");

    let source = AccountKey::parse(from);
    let destination = AccountKey::parse(to);
    let result = parse_amount(amount)
        .and_then(|amount| ctx.transfer(&source, &destination, amount));

    match &result {
        Ok(record) => log_event(
            &logger,
            LogEvent::new("transfer_committed")
                .with_transfer(record.id)
                .with_account(record.source_id),
        ),
        Err(err) => log_error(&logger, "transfer_failed", err),
    }

    report(result, json, |record| {
        output::success(&format!(
            "Transferred {} from {} to {}",
            output::format_money(record.amount),
            source,
            destination
        ));
        println!("  Transfer: {}", record.id);
        println!("  Sequence: {}", record.sequence);
    })
}
