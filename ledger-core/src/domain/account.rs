//! Account domain model

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::money::validate_opening_balance;
use super::result::{Error, Result};

/// A ledger account
///
/// The balance is only ever changed by the transfer engine, through a
/// version-checked write. `version` starts at 0 and increases by one on
/// every committed balance change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    /// Unique, normalized to lowercase
    pub email: String,
    pub balance: Decimal,
    /// Balance the account was registered with (used by audits)
    pub opening_balance: Decimal,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Build a freshly registered account from validated registration data
    pub fn open(new: &NewAccount) -> Self {
        let now = super::now();
        Self {
            id: Uuid::new_v4(),
            name: new.name.clone(),
            email: new.email.clone(),
            balance: new.initial_balance,
            opening_balance: new.initial_balance,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// The balance/version pair the transfer engine works with
    pub fn state(&self) -> AccountState {
        AccountState {
            id: self.id,
            balance: self.balance,
            version: self.version,
        }
    }
}

/// Balance and revision of an account as read at one point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountState {
    pub id: Uuid,
    pub balance: Decimal,
    pub version: i64,
}

/// Registration request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub initial_balance: Decimal,
}

impl NewAccount {
    /// Validate and normalize registration data
    pub fn new(name: &str, email: &str, initial_balance: Decimal) -> Result<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::validation("account name cannot be empty"));
        }
        let email = normalize_email(email)?;
        let initial_balance = validate_opening_balance(initial_balance)?;
        Ok(Self {
            name: name.to_string(),
            email,
            initial_balance,
        })
    }
}

/// Trim and lowercase an email, rejecting obviously malformed ones
pub fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain))
            if !local.is_empty() && !domain.is_empty() && !domain.contains('@') =>
        {
            Ok(email)
        }
        _ => Err(Error::validation(format!("invalid email address: {:?}", email))),
    }
}

/// How a caller refers to an account: by id or by email
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AccountKey {
    Id(Uuid),
    Email(String),
}

impl AccountKey {
    /// Parse a user-supplied key. UUIDs are ids, anything else is an email.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match Uuid::parse_str(raw) {
            Ok(id) => AccountKey::Id(id),
            Err(_) => AccountKey::Email(raw.to_lowercase()),
        }
    }
}

impl FromStr for AccountKey {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<Uuid> for AccountKey {
    fn from(id: Uuid) -> Self {
        AccountKey::Id(id)
    }
}

impl From<&str> for AccountKey {
    fn from(raw: &str) -> Self {
        AccountKey::parse(raw)
    }
}

impl fmt::Display for AccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountKey::Id(id) => write!(f, "{}", id),
            AccountKey::Email(email) => write!(f, "{}", email),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_account_normalizes() {
        let new = NewAccount::new("  Alice ", " Alice@Example.COM ", Decimal::new(10000, 2)).unwrap();
        assert_eq!(new.name, "Alice");
        assert_eq!(new.email, "alice@example.com");
        assert_eq!(new.initial_balance, Decimal::new(100, 0));
    }

    #[test]
    fn test_new_account_validation() {
        assert!(matches!(
            NewAccount::new("", "a@b.c", Decimal::ZERO),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            NewAccount::new("Bob", "not-an-email", Decimal::ZERO),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            NewAccount::new("Bob", "a@@b", Decimal::ZERO),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            NewAccount::new("Bob", "bob@example.com", Decimal::new(-1, 0)),
            Err(Error::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_open_starts_at_version_zero() {
        let new = NewAccount::new("Carol", "carol@example.com", Decimal::new(5, 0)).unwrap();
        let account = Account::open(&new);
        assert_eq!(account.version, 0);
        assert_eq!(account.balance, account.opening_balance);
        assert_eq!(account.state().balance, Decimal::new(5, 0));
    }

    #[test]
    fn test_account_key_parse() {
        let id = Uuid::new_v4();
        assert_eq!(AccountKey::parse(&id.to_string()), AccountKey::Id(id));
        assert_eq!(
            AccountKey::parse("Ghost@Example.com"),
            AccountKey::Email("ghost@example.com".to_string())
        );
        assert_eq!(AccountKey::parse("ghost").to_string(), "ghost");
    }
}
