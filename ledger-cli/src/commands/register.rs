//! Register command - open a new account

use anyhow::Result;
use dialoguer::Input;

use super::{get_context, get_logger, log_command, log_error, log_event, parse_amount, report};
use crate::output;
use ledger_core::LogEvent;

pub fn run(
    name: Option<String>,
    email: Option<String>,
    balance: Option<String>,
    json: bool,
) -> Result<()> {
    let ctx = get_context()?;
    let logger = get_logger();
    log_command(&logger, "register");

    // Prompt for anything not given on the command line
    let name = match name {
        Some(n) => n,
        None => Input::new().with_prompt("Account name").interact_text()?,
    };
    let email = match email {
        Some(e) => e,
        None => Input::new().with_prompt("Email").interact_text()?,
    };
    let balance: String = match balance {
        Some(b) => b,
        None => Input::new()
            .with_prompt("Opening balance")
            .default("0.00".to_string())
            .interact_text()?,
    };

    let result = parse_amount(&balance).and_then(|amount| ctx.register(&name, &email, amount));
    match &result {
        Ok(account) => log_event(
            &logger,
            LogEvent::new("account_registered").with_account(account.id),
        ),
        Err(err) => log_error(&logger, "register_failed", err),
    }

    report(result, json, |account| {
        output::success(&format!("Registered account {}", account.name));
        println!("  ID:      {}", account.id);
        println!("  Email:   {}", account.email);
        println!("  Balance: {}", output::format_money(account.balance));
    })
}
