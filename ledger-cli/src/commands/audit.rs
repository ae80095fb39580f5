//! Audit command - replay histories and check money is conserved

use anyhow::{bail, Result};
use colored::Colorize;
use serde::Serialize;

use super::{get_context, get_logger, log_command, report};
use crate::output;
use ledger_core::domain::result::Result as LedgerResult;
use ledger_core::{AccountKey, AuditReport, LedgerContext, LedgerTotals};

#[derive(Serialize)]
struct AuditOutput {
    reports: Vec<AuditReport>,
    totals: LedgerTotals,
    consistent: bool,
}

pub fn run(account: Option<String>, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let logger = get_logger();
    log_command(&logger, "audit");

    let result = audit(&ctx, account.as_deref());

    let inconsistent = matches!(&result, Ok(out) if !out.consistent);

    report(result, json, |out| {
        let mut table = output::create_table();
        table.set_header(vec!["Account", "Opening", "Received", "Sent", "Balance", "OK"]);
        for r in &out.reports {
            table.add_row(vec![
                r.account_id.to_string(),
                output::format_money(r.opening_balance),
                output::format_money(r.total_received),
                output::format_money(r.total_sent),
                output::format_money(r.actual_balance),
                if r.consistent {
                    "yes".green().to_string()
                } else {
                    format!("no (expected {})", output::format_money(r.expected_balance))
                        .red()
                        .to_string()
                },
            ]);
        }
        output::align_right(&mut table, &[1, 2, 3, 4]);
        println!("{}", table);
        println!(
            "Total balance {} / opening {}",
            output::format_money(out.totals.total_balance),
            output::format_money(out.totals.total_opening_balance)
        );
        if out.consistent {
            output::success("Ledger is consistent.");
        }
    })?;

    if inconsistent {
        bail!("audit found inconsistent balances");
    }
    Ok(())
}

fn audit(ctx: &LedgerContext, account: Option<&str>) -> LedgerResult<AuditOutput> {
    let keys: Vec<AccountKey> = match account {
        Some(key) => vec![AccountKey::parse(key)],
        None => ctx
            .account_service
            .list()?
            .into_iter()
            .map(|a| AccountKey::Id(a.id))
            .collect(),
    };
    let reports = keys
        .iter()
        .map(|key| ctx.history_service.verify(key))
        .collect::<LedgerResult<Vec<_>>>()?;
    let totals = ctx.account_service.totals()?;
    let consistent = reports.iter().all(|r| r.consistent)
        && totals.total_balance == totals.total_opening_balance;
    Ok(AuditOutput {
        reports,
        totals,
        consistent,
    })
}
