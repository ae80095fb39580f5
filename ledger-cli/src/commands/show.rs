//! Show command - details of one account

use anyhow::Result;
use colored::Colorize;

use super::{get_context, report};
use crate::output;
use ledger_core::AccountKey;

pub fn run(account: &str, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let key = AccountKey::parse(account);

    report(ctx.account_service.get(&key), json, |account| {
        println!("{}", account.name.bold());
        let mut table = output::create_table();
        table.add_row(vec!["ID".to_string(), account.id.to_string()]);
        table.add_row(vec!["Email".to_string(), account.email.clone()]);
        table.add_row(vec!["Balance".to_string(), output::format_money(account.balance)]);
        table.add_row(vec![
            "Opening balance".to_string(),
            output::format_money(account.opening_balance),
        ]);
        table.add_row(vec!["Version".to_string(), account.version.to_string()]);
        table.add_row(vec![
            "Created".to_string(),
            output::format_timestamp(&account.created_at),
        ]);
        table.add_row(vec![
            "Updated".to_string(),
            output::format_timestamp(&account.updated_at),
        ]);
        println!("{}", table);
    })
}
