//! Ledger entry models.

use crate::decimal::Decimal4;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What caused a balance change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Credit from a deposit, direct or distributed.
    Deposit,

    /// Manual correction of an account's balance.
    BalanceAdjustment,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::Deposit => f.write_str("deposit"),
            EntryKind::BalanceAdjustment => f.write_str("balance_adjustment"),
        }
    }
}

/// An entry to be appended. The ledger assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLedgerEntry {
    pub account_number: String,
    pub kind: EntryKind,

    /// Signed for adjustments, always positive for deposits.
    pub amount: Decimal4,

    pub balance_before: Decimal4,
    pub balance_after: Decimal4,
    pub description: String,
}

/// A stored ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Monotonically increasing within a ledger.
    pub id: u64,
    pub account_number: String,
    pub kind: EntryKind,
    pub amount: Decimal4,
    pub balance_before: Decimal4,
    pub balance_after: Decimal4,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn from_new(id: u64, entry: NewLedgerEntry, created_at: DateTime<Utc>) -> Self {
        LedgerEntry {
            id,
            account_number: entry.account_number,
            kind: entry.kind,
            amount: entry.amount,
            balance_before: entry.balance_before,
            balance_after: entry.balance_after,
            description: entry.description,
            created_at,
        }
    }
}

/// A ledger entry as listed to callers, flagged with whether it belongs to
/// the main account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListedEntry {
    pub id: u64,
    pub account_number: String,
    pub kind: EntryKind,
    pub amount: Decimal4,
    pub balance_before: Decimal4,
    pub balance_after: Decimal4,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub is_main: bool,
}

impl LedgerEntry {
    /// Attaches the owning account's main flag for listing.
    pub fn listed(self, is_main: bool) -> ListedEntry {
        ListedEntry {
            id: self.id,
            account_number: self.account_number,
            kind: self.kind,
            amount: self.amount,
            balance_before: self.balance_before,
            balance_after: self.balance_after,
            description: self.description,
            created_at: self.created_at,
            is_main,
        }
    }
}
