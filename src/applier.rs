//! Applies deposits and account adjustments to a `Book`.
//!
//! # Transaction boundary
//!
//! Each `apply` or `update_account_data` call runs its writes between
//! `Book::begin` and `Book::commit`. On any write error the book is rolled
//! back, so either every credited account is updated and logged or none is.
//! Storage-level errors are retried up to `ApplierConfig::max_attempts`.
//!
//! # Serialization
//!
//! The book sits behind a mutex held from snapshot to commit, so two
//! concurrent deposits never compute against the same stale snapshot.

use crate::account::{validate_account, Account};
use crate::allocation::{total_allocated, AllocationResult};
use crate::calculator::DistributionCalculator;
use crate::decimal::Decimal4;
use crate::error::{EngineError, Result};
use crate::ledger::{EntryKind, LedgerEntry, ListedEntry, NewLedgerEntry};
use crate::store::Book;
use log::{debug, info, warn};
use serde::Serialize;
use std::sync::{Mutex, MutexGuard};

/// Tunables for the applier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplierConfig {
    /// Total attempts for one unit of work, including the first.
    pub max_attempts: u32,

    /// Ledger description for targeted deposits.
    pub direct_description: String,

    /// Ledger description for proportional distributions.
    pub distribution_description: String,

    /// Ledger description for manual balance changes.
    pub adjustment_description: String,
}

impl Default for ApplierConfig {
    fn default() -> Self {
        ApplierConfig {
            max_attempts: 3,
            direct_description: "Direct deposit to account".to_string(),
            distribution_description: "Distribution of deposit to main account".to_string(),
            adjustment_description: "Manual balance adjustment".to_string(),
        }
    }
}

/// Result of `DepositApplier::apply`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DepositOutcome {
    pub distribution: Vec<AllocationResult>,

    /// `true` once at least one credited account has been committed.
    pub applied: bool,
}

/// Reads snapshots from a book, runs the calculator and persists the result.
pub struct DepositApplier<B: Book> {
    book: Mutex<B>,
    calculator: DistributionCalculator,
    config: ApplierConfig,
}

impl<B: Book> DepositApplier<B> {
    pub fn new(book: B) -> Self {
        Self::with_config(book, ApplierConfig::default())
    }

    pub fn with_config(book: B, config: ApplierConfig) -> Self {
        DepositApplier {
            book: Mutex::new(book),
            calculator: DistributionCalculator::new(),
            config,
        }
    }

    pub fn config(&self) -> &ApplierConfig {
        &self.config
    }

    /// Consumes the applier and returns the book.
    pub fn into_inner(self) -> Result<B> {
        self.book
            .into_inner()
            .map_err(|_| EngineError::Storage("book lock poisoned".to_string()))
    }

    fn lock(&self) -> Result<MutexGuard<'_, B>> {
        self.book
            .lock()
            .map_err(|_| EngineError::Storage("book lock poisoned".to_string()))
    }

    /// All accounts, main first.
    pub fn accounts(&self) -> Result<Vec<Account>> {
        self.lock()?.list_accounts()
    }

    /// Up to `limit` ledger entries, most recent first, each flagged with
    /// whether it belongs to the main account.
    pub fn transactions(&self, limit: usize) -> Result<Vec<ListedEntry>> {
        let book = self.lock()?;
        let accounts = book.list_accounts()?;
        Ok(flag_main(book.list(limit)?, &accounts))
    }

    /// Up to `limit` ledger entries for one account, most recent first.
    pub fn account_transactions(&self, account_number: &str, limit: usize) -> Result<Vec<ListedEntry>> {
        let book = self.lock()?;
        let accounts = book.list_accounts()?;
        if !accounts.iter().any(|a| a.account_number == account_number) {
            return Err(EngineError::AccountNotFound(account_number.to_string()));
        }
        Ok(flag_main(book.list_for_account(account_number, limit)?, &accounts))
    }

    /// Computes the distribution for `amount` without writing anything.
    pub fn preview(&self, amount: Decimal4, target: Option<&str>) -> Result<Vec<AllocationResult>> {
        check_amount(amount)?;
        let book = self.lock()?;
        let snapshot = book.list_accounts()?;
        check_target(&snapshot, target)?;
        let distribution = self.calculator.compute(&snapshot, amount, target);
        check_final_balances(&distribution)?;
        Ok(distribution)
    }

    /// Distributes `amount` and persists every credited account with one
    /// ledger entry each, atomically.
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` if `amount <= 0`
    /// - `AmountOutOfRange` if `amount` exceeds `Decimal4::MAX_WHOLE_UNITS`
    /// - `InvalidAccount` if a credited balance would leave that range
    /// - `AccountNotFound` / `AccountNotEligible` for an unknown or frozen target
    /// - `PersistenceFailure` if the writes could not be committed; nothing
    ///   was written and the call may be retried
    pub fn apply(&self, amount: Decimal4, target: Option<&str>) -> Result<DepositOutcome> {
        check_amount(amount)?;
        let mut book = self.lock()?;
        let snapshot = book.list_accounts()?;
        check_target(&snapshot, target)?;

        let distribution = self.calculator.compute(&snapshot, amount, target);
        check_final_balances(&distribution)?;
        if !distribution.iter().any(AllocationResult::is_credited) {
            warn!("Deposit of {} credited no account; nothing written", amount);
            return Ok(DepositOutcome {
                distribution,
                applied: false,
            });
        }

        let description = match target {
            Some(_) => &self.config.direct_description,
            None => &self.config.distribution_description,
        };

        self.with_retries(&mut *book, |book| {
            for result in distribution.iter().filter(|r| r.is_credited()) {
                book.update_balance(&result.account_number, result.final_balance)?;
                book.append(NewLedgerEntry {
                    account_number: result.account_number.clone(),
                    kind: EntryKind::Deposit,
                    amount: result.allocated,
                    balance_before: result.current_balance,
                    balance_after: result.final_balance,
                    description: description.clone(),
                })?;
            }
            Ok(())
        })?;

        info!(
            "Deposit of {} applied: {} allocated across {} account(s)",
            amount,
            total_allocated(&distribution),
            distribution.iter().filter(|r| r.is_credited()).count()
        );

        Ok(DepositOutcome {
            distribution,
            applied: true,
        })
    }

    /// Sets an account's monthly fee and balance. A balance change is logged
    /// as a `balance_adjustment` entry, which is returned.
    pub fn update_account_data(
        &self,
        account_number: &str,
        monthly_fee: Decimal4,
        balance: Decimal4,
    ) -> Result<Option<LedgerEntry>> {
        validate_account(&Account::new(account_number, monthly_fee, balance))?;

        let mut book = self.lock()?;
        let existing = book
            .get_account(account_number)?
            .ok_or_else(|| EngineError::AccountNotFound(account_number.to_string()))?;

        let entry = self.with_retries(&mut *book, |book| {
            book.update_account(account_number, monthly_fee, balance)?;
            if existing.balance == balance {
                return Ok(None);
            }
            book.append(NewLedgerEntry {
                account_number: account_number.to_string(),
                kind: EntryKind::BalanceAdjustment,
                amount: balance - existing.balance,
                balance_before: existing.balance,
                balance_after: balance,
                description: self.config.adjustment_description.clone(),
            })
            .map(Some)
        })?;

        info!(
            "Account {} updated: fee {} -> {}, balance {} -> {}",
            account_number, existing.monthly_fee, monthly_fee, existing.balance, balance
        );
        Ok(entry)
    }

    /// Runs `work` inside a transaction, retrying storage errors.
    ///
    /// Every failure is rolled back before the next attempt or before
    /// returning `PersistenceFailure`.
    fn with_retries<T>(&self, book: &mut B, mut work: impl FnMut(&mut B) -> Result<T>) -> Result<T> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match transact(book, &mut work) {
                Ok(value) => {
                    debug!("Committed on attempt {}", attempt);
                    return Ok(value);
                }
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    warn!(
                        "Attempt {}/{} rolled back: {}; retrying",
                        attempt, max_attempts, e
                    );
                }
                Err(e) => {
                    warn!("Attempt {}/{} rolled back: {}", attempt, max_attempts, e);
                    return Err(EngineError::PersistenceFailure {
                        attempts: attempt,
                        source: Box::new(e),
                    });
                }
            }
        }
    }
}

fn transact<B: Book, T>(book: &mut B, work: &mut impl FnMut(&mut B) -> Result<T>) -> Result<T> {
    book.begin()?;
    let result = work(book).and_then(|value| book.commit().map(|_| value));
    if result.is_err() {
        book.rollback();
    }
    result
}

fn check_amount(amount: Decimal4) -> Result<()> {
    if !amount.is_positive() {
        return Err(EngineError::InvalidAmount(amount));
    }
    if !amount.in_range() {
        return Err(EngineError::AmountOutOfRange(amount));
    }
    Ok(())
}

/// Keeps every balance the book would store loadable again.
fn check_final_balances(distribution: &[AllocationResult]) -> Result<()> {
    match distribution.iter().find(|r| !r.final_balance.in_range()) {
        Some(result) => Err(EngineError::InvalidAccount {
            account: result.account_number.clone(),
            message: format!(
                "balance would reach {}, above the supported maximum of {}",
                result.final_balance,
                Decimal4::max_value()
            ),
        }),
        None => Ok(()),
    }
}

fn flag_main(entries: Vec<LedgerEntry>, accounts: &[Account]) -> Vec<ListedEntry> {
    let main = accounts.iter().find(|a| a.is_main).map(|a| a.account_number.as_str());
    entries
        .into_iter()
        .map(|entry| {
            let is_main = main == Some(entry.account_number.as_str());
            entry.listed(is_main)
        })
        .collect()
}

/// A targeted deposit must name an existing, unfrozen account.
fn check_target(snapshot: &[Account], target: Option<&str>) -> Result<()> {
    let Some(target) = target else {
        return Ok(());
    };
    match snapshot.iter().find(|a| a.account_number == target) {
        None => Err(EngineError::AccountNotFound(target.to_string())),
        Some(account) if !account.can_receive() => {
            Err(EngineError::AccountNotEligible(target.to_string()))
        }
        Some(_) => Ok(()),
    }
}
