//! File-backed book: accounts and ledger kept in two CSV files.
//!
//! State is loaded once into a `MemoryBook`. On commit both files are written
//! to temporary siblings and renamed into place, so a reader never sees a
//! half-written file.

use crate::account::{Account, AccountRecord};
use crate::decimal::Decimal4;
use crate::error::{EngineError, Result};
use crate::ledger::{LedgerEntry, NewLedgerEntry};
use crate::store::{AccountStore, Book, MemoryBook, TransactionLedger};
use csv::{ReaderBuilder, Trim};
use log::{debug, error, info, warn};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// A `Book` persisted to an accounts CSV and a ledger CSV.
#[derive(Debug)]
pub struct CsvBook {
    inner: MemoryBook,
    accounts_path: PathBuf,
    ledger_path: PathBuf,
}

impl CsvBook {
    /// Loads both files. The accounts file must exist; a missing ledger file
    /// means an empty ledger.
    pub fn open(accounts_path: impl Into<PathBuf>, ledger_path: impl Into<PathBuf>) -> Result<Self> {
        let accounts_path = accounts_path.into();
        let ledger_path = ledger_path.into();

        let accounts = read_accounts(BufReader::new(File::open(&accounts_path)?))?;
        let ledger = if ledger_path.exists() {
            read_ledger(BufReader::new(File::open(&ledger_path)?))?
        } else {
            debug!("Ledger {} not found, starting empty", ledger_path.display());
            Vec::new()
        };

        info!(
            "Loaded {} accounts and {} ledger entries",
            accounts.len(),
            ledger.len()
        );

        Ok(CsvBook {
            inner: MemoryBook::with_ledger(accounts, ledger)?,
            accounts_path,
            ledger_path,
        })
    }

    fn persist(&self) -> Result<()> {
        let accounts_tmp = temp_path(&self.accounts_path);
        let ledger_tmp = temp_path(&self.ledger_path);

        let result = self.write_and_swap(&accounts_tmp, &ledger_tmp);
        if result.is_err() {
            let _ = fs::remove_file(&accounts_tmp);
            let _ = fs::remove_file(&ledger_tmp);
        }
        result
    }

    /// Swaps the ledger first, keeping the previous ledger as a backup until
    /// the accounts file is in place. If the accounts swap fails the ledger on
    /// disk is put back as it was.
    fn write_and_swap(&self, accounts_tmp: &Path, ledger_tmp: &Path) -> Result<()> {
        write_accounts(self.inner.accounts(), File::create(accounts_tmp)?)?;
        write_ledger(self.inner.entries(), File::create(ledger_tmp)?)?;

        let backup = sibling_path(&self.ledger_path, ".bak");
        let had_ledger = self.ledger_path.exists();
        if had_ledger {
            fs::copy(&self.ledger_path, &backup)?;
        }

        if let Err(e) = fs::rename(ledger_tmp, &self.ledger_path) {
            discard_backup(&backup, had_ledger);
            return Err(e.into());
        }

        match fs::rename(accounts_tmp, &self.accounts_path) {
            Ok(()) => {
                discard_backup(&backup, had_ledger);
                Ok(())
            }
            Err(e) => {
                self.restore_ledger(&backup, had_ledger);
                Err(e.into())
            }
        }
    }

    fn restore_ledger(&self, backup: &Path, had_ledger: bool) {
        let restored = if had_ledger {
            fs::rename(backup, &self.ledger_path)
        } else {
            fs::remove_file(&self.ledger_path)
        };
        match restored {
            Ok(()) => warn!(
                "Accounts file swap failed; ledger {} restored",
                self.ledger_path.display()
            ),
            Err(e) => error!(
                "Accounts file swap failed and ledger {} could not be restored: {}",
                self.ledger_path.display(),
                e
            ),
        }
    }
}

fn discard_backup(backup: &Path, had_ledger: bool) {
    if had_ledger {
        let _ = fs::remove_file(backup);
    }
}

fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

fn temp_path(path: &Path) -> PathBuf {
    sibling_path(path, ".tmp")
}

/// Reads an accounts CSV with header
/// `account_number,monthly_fee,balance,is_main,is_frozen`.
///
/// The first malformed row rejects the whole file with an error naming it.
pub fn read_accounts<R: Read>(reader: R) -> Result<Vec<Account>> {
    let mut csv_reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(reader);

    let mut accounts = Vec::new();
    for (row_idx, result) in csv_reader.deserialize::<AccountRecord>().enumerate() {
        let row_num = row_idx + 2; // 1-indexed, accounting for header row
        let record = result.map_err(|e| EngineError::InvalidRecord {
            row: row_num,
            message: e.to_string(),
        })?;
        accounts.push(record.parse(row_num)?);
    }

    Ok(accounts)
}

/// Reads a ledger CSV as written by `write_ledger`.
///
/// As with accounts, the first malformed row rejects the whole file.
pub fn read_ledger<R: Read>(reader: R) -> Result<Vec<LedgerEntry>> {
    let mut csv_reader = ReaderBuilder::new().trim(Trim::All).from_reader(reader);

    let mut entries = Vec::new();
    for (row_idx, result) in csv_reader.deserialize::<LedgerEntry>().enumerate() {
        let entry = result.map_err(|e| EngineError::InvalidRecord {
            row: row_idx + 2,
            message: e.to_string(),
        })?;
        entries.push(entry);
    }

    Ok(entries)
}

pub fn write_accounts<W: Write>(accounts: &[Account], writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(BufWriter::new(writer));
    for account in accounts {
        csv_writer.serialize(account)?;
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn write_ledger<W: Write>(entries: &[LedgerEntry], writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(BufWriter::new(writer));
    for entry in entries {
        csv_writer.serialize(entry)?;
    }
    csv_writer.flush()?;
    Ok(())
}

impl AccountStore for CsvBook {
    fn list_accounts(&self) -> Result<Vec<Account>> {
        self.inner.list_accounts()
    }

    fn get_account(&self, account_number: &str) -> Result<Option<Account>> {
        self.inner.get_account(account_number)
    }

    fn update_balance(&mut self, account_number: &str, balance: Decimal4) -> Result<()> {
        self.inner.update_balance(account_number, balance)
    }

    fn update_account(
        &mut self,
        account_number: &str,
        monthly_fee: Decimal4,
        balance: Decimal4,
    ) -> Result<()> {
        self.inner.update_account(account_number, monthly_fee, balance)
    }
}

impl TransactionLedger for CsvBook {
    fn append(&mut self, entry: NewLedgerEntry) -> Result<LedgerEntry> {
        self.inner.append(entry)
    }

    fn list(&self, limit: usize) -> Result<Vec<LedgerEntry>> {
        self.inner.list(limit)
    }

    fn list_for_account(&self, account_number: &str, limit: usize) -> Result<Vec<LedgerEntry>> {
        self.inner.list_for_account(account_number, limit)
    }
}

impl Book for CsvBook {
    fn begin(&mut self) -> Result<()> {
        self.inner.begin()
    }

    /// Writes the files first; the in-memory transaction is only closed once
    /// they are in place, so a failed write can still be rolled back.
    fn commit(&mut self) -> Result<()> {
        if !self.inner.in_transaction() {
            return Err(EngineError::Storage("no transaction to commit".to_string()));
        }
        self.persist()?;
        self.inner.commit()
    }

    fn rollback(&mut self) {
        self.inner.rollback()
    }
}
