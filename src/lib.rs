//! # Deposit Allocator
//!
//! Distributes an incoming deposit across a set of sub-accounts and records
//! the result in a transaction ledger.
//!
//! ## Design Principles
//!
//! - **Fixed-point arithmetic**: Uses 4 decimal places via `rust_decimal`
//! - **Pure core**: `DistributionCalculator` has no I/O and no state
//! - **Atomic writes**: `DepositApplier` commits all balance updates and
//!   ledger entries of one deposit together, or none
//! - **Deterministic output**: one result per account, in snapshot order
//!
//! ## Example
//!
//! ```
//! use deposit_allocator::{Account, Decimal4, DepositApplier, MemoryBook};
//! use std::str::FromStr;
//!
//! let book = MemoryBook::new(vec![
//!     Account::new("main", Decimal4::from(10), Decimal4::from(10)).main(),
//!     Account::new("savings", Decimal4::from(30), Decimal4::from(-10)),
//! ])
//! .unwrap();
//! let applier = DepositApplier::new(book);
//!
//! let outcome = applier.apply(Decimal4::from_str("25").unwrap(), None).unwrap();
//! assert!(outcome.applied);
//! ```

pub mod account;
pub mod allocation;
pub mod applier;
pub mod calculator;
pub mod csv_book;
pub mod decimal;
pub mod error;
pub mod ledger;
pub mod response;
pub mod store;

pub use account::{validate_accounts, Account, AccountRecord};
pub use allocation::{total_allocated, AllocationResult};
pub use applier::{ApplierConfig, DepositApplier, DepositOutcome};
pub use calculator::DistributionCalculator;
pub use csv_book::CsvBook;
pub use decimal::Decimal4;
pub use error::{EngineError, Result};
pub use ledger::{EntryKind, LedgerEntry, ListedEntry, NewLedgerEntry};
pub use response::Response;
pub use store::{AccountStore, Book, MemoryBook, TransactionLedger};
