//! Storage collaborators: the account store, the transaction ledger and the
//! transaction boundary that ties them together.
//!
//! `MemoryBook` is the in-memory implementation. `CsvBook` builds on it to
//! persist to files.

use crate::account::{sort_for_listing, validate_account, validate_accounts, Account};
use crate::decimal::Decimal4;
use crate::error::{EngineError, Result};
use crate::ledger::{LedgerEntry, NewLedgerEntry};
use chrono::Utc;
use log::debug;

/// Reads and writes account state.
pub trait AccountStore {
    /// All accounts, main first, then ascending by account number.
    fn list_accounts(&self) -> Result<Vec<Account>>;

    fn get_account(&self, account_number: &str) -> Result<Option<Account>>;

    fn update_balance(&mut self, account_number: &str, balance: Decimal4) -> Result<()>;

    fn update_account(
        &mut self,
        account_number: &str,
        monthly_fee: Decimal4,
        balance: Decimal4,
    ) -> Result<()>;
}

/// Append-only record of balance changes.
pub trait TransactionLedger {
    fn append(&mut self, entry: NewLedgerEntry) -> Result<LedgerEntry>;

    /// Up to `limit` entries, most recent first.
    fn list(&self, limit: usize) -> Result<Vec<LedgerEntry>>;

    /// Up to `limit` entries for one account, most recent first.
    fn list_for_account(&self, account_number: &str, limit: usize) -> Result<Vec<LedgerEntry>>;
}

/// An account store and ledger sharing one transaction boundary.
///
/// Writes issued between `begin` and `commit` become visible together or,
/// after `rollback`, not at all.
pub trait Book: AccountStore + TransactionLedger {
    fn begin(&mut self) -> Result<()>;

    fn commit(&mut self) -> Result<()>;

    /// Discards every write since `begin`. A no-op outside a transaction.
    fn rollback(&mut self);
}

#[derive(Debug, Clone)]
struct Savepoint {
    accounts: Vec<Account>,
    ledger_len: usize,
    next_id: u64,
}

/// In-memory book.
///
/// Accounts are kept in listing order. `begin` snapshots the accounts and
/// remembers the ledger length, which is all `rollback` needs since the
/// ledger only grows.
#[derive(Debug, Clone, Default)]
pub struct MemoryBook {
    accounts: Vec<Account>,
    ledger: Vec<LedgerEntry>,
    next_id: u64,
    savepoint: Option<Savepoint>,
}

impl MemoryBook {
    /// Creates a book over a validated account set with an empty ledger.
    pub fn new(accounts: Vec<Account>) -> Result<Self> {
        Self::with_ledger(accounts, Vec::new())
    }

    /// Creates a book with existing ledger history.
    pub fn with_ledger(mut accounts: Vec<Account>, mut ledger: Vec<LedgerEntry>) -> Result<Self> {
        validate_accounts(&accounts)?;
        sort_for_listing(&mut accounts);
        ledger.sort_by_key(|e| e.id);
        let next_id = ledger.last().map(|e| e.id + 1).unwrap_or(1);

        Ok(MemoryBook {
            accounts,
            ledger,
            next_id,
            savepoint: None,
        })
    }

    /// Returns `true` while a transaction is open.
    pub fn in_transaction(&self) -> bool {
        self.savepoint.is_some()
    }

    /// Full ledger in append order.
    pub fn entries(&self) -> &[LedgerEntry] {
        &self.ledger
    }

    /// Accounts in listing order.
    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    fn account_mut(&mut self, account_number: &str) -> Result<&mut Account> {
        self.accounts
            .iter_mut()
            .find(|a| a.account_number == account_number)
            .ok_or_else(|| EngineError::AccountNotFound(account_number.to_string()))
    }
}

impl AccountStore for MemoryBook {
    fn list_accounts(&self) -> Result<Vec<Account>> {
        Ok(self.accounts.clone())
    }

    fn get_account(&self, account_number: &str) -> Result<Option<Account>> {
        Ok(self
            .accounts
            .iter()
            .find(|a| a.account_number == account_number)
            .cloned())
    }

    fn update_balance(&mut self, account_number: &str, balance: Decimal4) -> Result<()> {
        self.account_mut(account_number)?.balance = balance;
        Ok(())
    }

    fn update_account(
        &mut self,
        account_number: &str,
        monthly_fee: Decimal4,
        balance: Decimal4,
    ) -> Result<()> {
        let account = self.account_mut(account_number)?;
        let mut updated = account.clone();
        updated.monthly_fee = monthly_fee;
        updated.balance = balance;
        validate_account(&updated)?;
        *account = updated;
        Ok(())
    }
}

impl TransactionLedger for MemoryBook {
    fn append(&mut self, entry: NewLedgerEntry) -> Result<LedgerEntry> {
        let stored = LedgerEntry::from_new(self.next_id, entry, Utc::now());
        self.next_id += 1;
        self.ledger.push(stored.clone());
        Ok(stored)
    }

    fn list(&self, limit: usize) -> Result<Vec<LedgerEntry>> {
        Ok(self.ledger.iter().rev().take(limit).cloned().collect())
    }

    fn list_for_account(&self, account_number: &str, limit: usize) -> Result<Vec<LedgerEntry>> {
        Ok(self
            .ledger
            .iter()
            .rev()
            .filter(|e| e.account_number == account_number)
            .take(limit)
            .cloned()
            .collect())
    }
}

impl Book for MemoryBook {
    fn begin(&mut self) -> Result<()> {
        if self.savepoint.is_some() {
            return Err(EngineError::Storage(
                "transaction already in progress".to_string(),
            ));
        }
        self.savepoint = Some(Savepoint {
            accounts: self.accounts.clone(),
            ledger_len: self.ledger.len(),
            next_id: self.next_id,
        });
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        match self.savepoint.take() {
            Some(_) => Ok(()),
            None => Err(EngineError::Storage("no transaction to commit".to_string())),
        }
    }

    fn rollback(&mut self) {
        if let Some(savepoint) = self.savepoint.take() {
            debug!(
                "Rolling back {} ledger entries",
                self.ledger.len() - savepoint.ledger_len
            );
            self.accounts = savepoint.accounts;
            self.ledger.truncate(savepoint.ledger_len);
            self.next_id = savepoint.next_id;
        }
    }
}
