//! Per-account allocation results.

use crate::account::Account;
use crate::decimal::Decimal4;
use serde::Serialize;

/// How much of a deposit one account receives and where that leaves it.
///
/// # Invariants
///
/// - `final_balance == current_balance + allocated`
/// - `allocated >= 0`
/// - Frozen accounts always have `allocated == 0`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllocationResult {
    pub account_number: String,
    pub monthly_fee: Decimal4,

    /// Balance at computation time.
    pub current_balance: Decimal4,

    /// Amount assigned from the deposit.
    pub allocated: Decimal4,

    /// `current_balance + allocated`.
    pub final_balance: Decimal4,

    pub is_main: bool,
    pub is_frozen: bool,

    /// `final_balance >= 0`.
    pub is_active: bool,
}

impl AllocationResult {
    /// Starts a zero allocation for an account snapshot.
    pub fn untouched(account: &Account) -> Self {
        AllocationResult {
            account_number: account.account_number.clone(),
            monthly_fee: account.monthly_fee,
            current_balance: account.balance,
            allocated: Decimal4::ZERO,
            final_balance: account.balance,
            is_main: account.is_main,
            is_frozen: account.is_frozen,
            is_active: !account.balance.is_negative(),
        }
    }

    /// Adds `amount` to the allocation and the running balance.
    ///
    /// Zero or negative amounts and frozen accounts are ignored.
    pub fn credit(&mut self, amount: Decimal4) {
        if self.is_frozen || !amount.is_positive() {
            return;
        }
        self.allocated += amount;
        self.final_balance = self.current_balance + self.allocated;
    }

    pub fn refresh_active(&mut self) {
        self.is_active = !self.final_balance.is_negative();
    }

    /// Returns `true` if this account receives anything.
    pub fn is_credited(&self) -> bool {
        self.allocated.is_positive()
    }
}

/// Sum of `allocated` over a result set.
pub fn total_allocated(results: &[AllocationResult]) -> Decimal4 {
    results.iter().map(|r| r.allocated).sum()
}
