//! Accounts command - list every account with ledger totals

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

use super::{get_context, report};
use crate::output;
use ledger_core::{Account, LedgerTotals};

#[derive(Serialize)]
struct AccountsOutput {
    accounts: Vec<Account>,
    totals: LedgerTotals,
}

pub fn run(json: bool) -> Result<()> {
    let ctx = get_context()?;
    let result = ctx.account_service.list().and_then(|accounts| {
        Ok(AccountsOutput {
            accounts,
            totals: ctx.account_service.totals()?,
        })
    });

    report(result, json, |out| {
        if out.accounts.is_empty() {
            output::info("No accounts yet. Create one with `ledger register`.");
            return;
        }
        let mut table = output::create_table();
        table.set_header(vec!["ID", "Name", "Email", "Balance"]);
        for account in &out.accounts {
            table.add_row(vec![
                account.id.to_string(),
                account.name.clone(),
                account.email.clone(),
                output::format_money(account.balance),
            ]);
        }
        output::align_right(&mut table, &[3]);
        println!("{}", table);
        println!(
            "{} account(s), {} transfer(s), total balance {}",
            out.totals.accounts,
            out.totals.transfers,
            output::format_money(out.totals.total_balance).bold()
        );
    })
}
