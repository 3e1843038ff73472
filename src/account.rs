//! Account model, CSV records and boundary validation.
//!
//! The calculator assumes a well-formed account set. Everything that could
//! violate that assumption (negative fees, duplicate numbers, two main
//! accounts) is rejected here, before a snapshot reaches the core.

use crate::decimal::Decimal4;
use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;

/// A sub-account as read from the account store.
///
/// # Invariants
///
/// - `monthly_fee >= 0`
/// - `monthly_fee` and `|balance|` are at most `Decimal4::MAX_WHOLE_UNITS`
/// - `account_number` is unique within a set and non-empty
/// - At most one account in a set has `is_main == true`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Unique account identifier.
    pub account_number: String,

    /// Recurring charge level the account is topped up to and by.
    pub monthly_fee: Decimal4,

    /// Current standing. Negative means the account is in debt.
    pub balance: Decimal4,

    /// Absorbs whatever the debt and fee stages leave over.
    pub is_main: bool,

    /// Excluded from every allocation regardless of balance.
    pub is_frozen: bool,
}

impl Account {
    /// Creates an unfrozen, non-main account.
    pub fn new(account_number: impl Into<String>, monthly_fee: Decimal4, balance: Decimal4) -> Self {
        Account {
            account_number: account_number.into(),
            monthly_fee,
            balance,
            is_main: false,
            is_frozen: false,
        }
    }

    /// Marks the account as the main account.
    pub fn main(mut self) -> Self {
        self.is_main = true;
        self
    }

    /// Marks the account as frozen.
    pub fn frozen(mut self) -> Self {
        self.is_frozen = true;
        self
    }

    /// Returns `true` if the account may receive part of a deposit.
    pub fn can_receive(&self) -> bool {
        !self.is_frozen
    }
}

/// Raw account row as read from CSV.
///
/// Fields are kept as strings so that a malformed value produces an
/// `InvalidRecord` error naming the row and field, rather than a bare
/// deserialization error.
#[derive(Debug, Deserialize)]
pub struct AccountRecord {
    pub account_number: String,
    pub monthly_fee: String,
    pub balance: String,
    pub is_main: Option<String>,
    pub is_frozen: Option<String>,
}

impl AccountRecord {
    /// Parses the raw record into a typed account.
    pub fn parse(&self, row: usize) -> Result<Account> {
        let account_number = self.account_number.trim();
        if account_number.is_empty() {
            return Err(EngineError::InvalidRecord {
                row,
                message: "empty account number".to_string(),
            });
        }

        Ok(Account {
            account_number: account_number.to_string(),
            monthly_fee: parse_amount(&self.monthly_fee, "monthly_fee", row)?,
            balance: parse_amount(&self.balance, "balance", row)?,
            is_main: parse_flag(self.is_main.as_deref(), "is_main", row)?,
            is_frozen: parse_flag(self.is_frozen.as_deref(), "is_frozen", row)?,
        })
    }
}

fn parse_amount(raw: &str, field: &str, row: usize) -> Result<Decimal4> {
    Decimal4::from_str(raw).map_err(|e| EngineError::InvalidRecord {
        row,
        message: format!("{} {:?}: {}", field, raw.trim(), e),
    })
}

fn parse_flag(raw: Option<&str>, field: &str, row: usize) -> Result<bool> {
    let value = raw.map(|s| s.trim().to_lowercase()).unwrap_or_default();
    match value.as_str() {
        "" | "0" | "false" | "no" => Ok(false),
        "1" | "true" | "yes" => Ok(true),
        other => Err(EngineError::InvalidRecord {
            row,
            message: format!("{} must be a boolean, got {:?}", field, other),
        }),
    }
}

/// Checks a full account set against the boundary rules.
///
/// A set without any main account passes; the calculator handles it as a
/// zero-allocation case.
pub fn validate_accounts(accounts: &[Account]) -> Result<()> {
    let mut seen = HashSet::new();
    let mut main: Option<&str> = None;

    for (idx, account) in accounts.iter().enumerate() {
        validate_account(account)?;

        if !seen.insert(account.account_number.as_str()) {
            return Err(EngineError::DuplicateAccount {
                account: account.account_number.clone(),
                row: idx + 1,
            });
        }

        if account.is_main {
            if let Some(existing) = main {
                return Err(EngineError::InvalidAccount {
                    account: account.account_number.clone(),
                    message: format!("{} is already the main account", existing),
                });
            }
            main = Some(account.account_number.as_str());
        }
    }

    Ok(())
}

/// Checks the per-account rules: non-empty number, non-negative fee, and
/// fee and balance within `Decimal4::MAX_WHOLE_UNITS`.
pub fn validate_account(account: &Account) -> Result<()> {
    if account.account_number.trim().is_empty() {
        return Err(EngineError::InvalidAccount {
            account: account.account_number.clone(),
            message: "account number must not be empty".to_string(),
        });
    }
    if account.monthly_fee.is_negative() {
        return Err(EngineError::InvalidAccount {
            account: account.account_number.clone(),
            message: format!("monthly fee {} is negative", account.monthly_fee),
        });
    }
    if !account.monthly_fee.in_range() || !account.balance.in_range() {
        return Err(EngineError::InvalidAccount {
            account: account.account_number.clone(),
            message: format!(
                "fee {} or balance {} exceeds the supported maximum of {}",
                account.monthly_fee,
                account.balance,
                Decimal4::max_value()
            ),
        });
    }
    Ok(())
}

/// Orders accounts main-first, then ascending by account number.
pub fn sort_for_listing(accounts: &mut [Account]) {
    accounts.sort_by(|a, b| {
        b.is_main
            .cmp(&a.is_main)
            .then_with(|| a.account_number.cmp(&b.account_number))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal4 {
        Decimal4::from_str(s).unwrap()
    }

    fn record(number: &str, fee: &str, balance: &str, main: &str, frozen: &str) -> AccountRecord {
        AccountRecord {
            account_number: number.to_string(),
            monthly_fee: fee.to_string(),
            balance: balance.to_string(),
            is_main: Some(main.to_string()),
            is_frozen: Some(frozen.to_string()),
        }
    }

    #[test]
    fn test_parse_record() {
        let account = record(" 40817-001 ", "300", "-12.5", "1", "no").parse(2).unwrap();
        assert_eq!(account.account_number, "40817-001");
        assert_eq!(account.monthly_fee.to_string(), "300.0000");
        assert_eq!(account.balance.to_string(), "-12.5000");
        assert!(account.is_main);
        assert!(!account.is_frozen);
    }

    #[test]
    fn test_parse_missing_flags_default_to_false() {
        let raw = AccountRecord {
            account_number: "A".to_string(),
            monthly_fee: "0".to_string(),
            balance: "0".to_string(),
            is_main: None,
            is_frozen: Some("".to_string()),
        };
        let account = raw.parse(2).unwrap();
        assert!(!account.is_main);
        assert!(!account.is_frozen);
    }

    #[test]
    fn test_parse_rejects_bad_amount() {
        let err = record("A", "ten", "0", "0", "0").parse(7).unwrap_err();
        assert!(matches!(err, EngineError::InvalidRecord { row: 7, .. }));
    }

    #[test]
    fn test_parse_rejects_bad_flag() {
        let err = record("A", "1", "0", "maybe", "0").parse(3).unwrap_err();
        assert!(err.to_string().contains("is_main"));
    }

    #[test]
    fn test_validate_rejects_negative_fee() {
        let accounts = vec![Account::new("A", dec("-1"), dec("0")).main()];
        let err = validate_accounts(&accounts).unwrap_err();
        assert!(matches!(err, EngineError::InvalidAccount { .. }));
    }

    #[test]
    fn test_validate_rejects_out_of_range_amounts() {
        let huge = dec("50000000000000000000000000000");
        let accounts = vec![Account::new("A", dec("1"), huge).main()];
        assert!(matches!(
            validate_accounts(&accounts),
            Err(EngineError::InvalidAccount { .. })
        ));

        let fee = Decimal4::max_value() + dec("1");
        assert!(validate_account(&Account::new("B", fee, dec("0"))).is_err());
        assert!(validate_account(&Account::new("C", dec("1"), -Decimal4::max_value())).is_ok());
    }

    #[test]
    fn test_validate_rejects_duplicates() {
        let accounts = vec![
            Account::new("A", dec("1"), dec("0")).main(),
            Account::new("A", dec("2"), dec("0")),
        ];
        let err = validate_accounts(&accounts).unwrap_err();
        assert!(matches!(err, EngineError::DuplicateAccount { row: 2, .. }));
    }

    #[test]
    fn test_validate_rejects_second_main() {
        let accounts = vec![
            Account::new("A", dec("1"), dec("0")).main(),
            Account::new("B", dec("1"), dec("0")).main(),
        ];
        assert!(validate_accounts(&accounts).is_err());
    }

    #[test]
    fn test_validate_accepts_set_without_main() {
        let accounts = vec![Account::new("A", dec("1"), dec("-5"))];
        assert!(validate_accounts(&accounts).is_ok());
    }

    #[test]
    fn test_sort_for_listing_puts_main_first() {
        let mut accounts = vec![
            Account::new("C", dec("1"), dec("0")),
            Account::new("B", dec("1"), dec("0")).main(),
            Account::new("A", dec("1"), dec("0")),
        ];
        sort_for_listing(&mut accounts);
        let order: Vec<_> = accounts.iter().map(|a| a.account_number.as_str()).collect();
        assert_eq!(order, vec!["B", "A", "C"]);
    }
}
