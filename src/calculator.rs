//! Deposit distribution across a snapshot of accounts.
//!
//! `DistributionCalculator::compute` is pure: it reads an account snapshot
//! and returns one `AllocationResult` per account, in input order.
//!
//! # Modes
//!
//! - **Targeted**: the whole deposit goes to the named account, provided it
//!   exists and is not frozen. Otherwise nothing is allocated.
//! - **Proportional**: four stages share a running remainder.
//!   1. Debts, smallest magnitude first (stable on ties).
//!   2. Fee leveling, in scan order, up to each account's monthly fee.
//!   3. Proportional rounds of one monthly fee per eligible account, main
//!      first. The last round may be partial and exhausts the remainder.
//!   4. Overflow: with no eligible accounts, the remainder goes to main.
//!
//! # Termination
//!
//! Complete rounds are applied in one step (`k` rounds at once) and the
//! partial round always consumes what is left, so no stage ever loops on an
//! unchanged remainder.

use crate::account::Account;
use crate::allocation::AllocationResult;
use crate::decimal::Decimal4;
use crate::error::{EngineError, Result};
use log::{debug, warn};

/// Computes allocations. Holds no state.
#[derive(Debug, Clone, Copy, Default)]
pub struct DistributionCalculator;

impl DistributionCalculator {
    pub fn new() -> Self {
        DistributionCalculator
    }

    /// Distributes `deposit` across `accounts`.
    ///
    /// With `target` set, the deposit is routed to that account only. Without
    /// it, the proportional pipeline runs against the main account.
    pub fn compute(
        &self,
        accounts: &[Account],
        deposit: Decimal4,
        target: Option<&str>,
    ) -> Vec<AllocationResult> {
        let mut results: Vec<AllocationResult> =
            accounts.iter().map(AllocationResult::untouched).collect();

        match target {
            Some(target) => distribute_targeted(&mut results, deposit, target),
            None => match main_index(&results) {
                Ok(main) => distribute_proportional(&mut results, deposit, main),
                Err(e) => warn!("{}; leaving all balances unchanged", e),
            },
        }

        for result in results.iter_mut() {
            result.refresh_active();
        }
        results
    }
}

/// Locates the main account. A frozen main account cannot absorb anything and
/// counts as missing.
fn main_index(results: &[AllocationResult]) -> Result<usize> {
    results
        .iter()
        .position(|r| r.is_main && !r.is_frozen)
        .ok_or(EngineError::NoMainAccount)
}

fn distribute_targeted(results: &mut [AllocationResult], deposit: Decimal4, target: &str) {
    match results.iter_mut().find(|r| r.account_number == target) {
        Some(result) if result.is_frozen => {
            warn!(
                "Target account {} is frozen; deposit of {} not allocated",
                target, deposit
            );
        }
        Some(result) => {
            result.credit(deposit);
            debug!("Direct deposit of {} to {}", deposit, target);
        }
        None => warn!("Target account {} not in snapshot", target),
    }
}

fn distribute_proportional(results: &mut [AllocationResult], deposit: Decimal4, main: usize) {
    let mut remaining = deposit;

    remaining = pay_debts(results, remaining);
    remaining = level_fees(results, remaining);
    remaining = proportional_rounds(results, remaining, main);

    if remaining.is_positive() {
        debug!(
            "No account eligible for proportional rounds; {} overflows to main {}",
            remaining, results[main].account_number
        );
        results[main].credit(remaining);
    }
}

/// Stage 1: pays negative balances, smallest debt first.
///
/// Returns the remainder.
fn pay_debts(results: &mut [AllocationResult], mut remaining: Decimal4) -> Decimal4 {
    let mut debtors: Vec<usize> = results
        .iter()
        .enumerate()
        .filter(|(_, r)| !r.is_frozen && r.final_balance.is_negative())
        .map(|(idx, _)| idx)
        .collect();
    // sort_by_key is stable: equal debts keep scan order
    debtors.sort_by_key(|&idx| results[idx].final_balance.abs());

    for idx in debtors {
        if !remaining.is_positive() {
            break;
        }
        let debt = results[idx].final_balance.abs();
        let payment = debt.min(remaining);
        results[idx].credit(payment);
        remaining -= payment;
        debug!(
            "Debt payoff: {} to {} (debt {})",
            payment, results[idx].account_number, debt
        );
    }

    remaining
}

/// Stage 2: tops accounts up to their monthly fee, in scan order.
fn level_fees(results: &mut [AllocationResult], mut remaining: Decimal4) -> Decimal4 {
    for result in results.iter_mut().filter(|r| !r.is_frozen) {
        if !remaining.is_positive() {
            break;
        }
        if result.final_balance >= result.monthly_fee {
            continue;
        }
        let top_up = (result.monthly_fee - result.final_balance).min(remaining);
        result.credit(top_up);
        remaining -= top_up;
        debug!(
            "Fee leveling: {} to {} (fee {})",
            top_up, result.account_number, result.monthly_fee
        );
    }

    remaining
}

/// Stage 3: hands out one monthly fee per eligible account per round.
///
/// Eligible accounts are unfrozen with a positive fee, main first, then scan
/// order. Returns the remainder, which is non-zero only when nothing is
/// eligible.
fn proportional_rounds(
    results: &mut [AllocationResult],
    mut remaining: Decimal4,
    main: usize,
) -> Decimal4 {
    let eligible = round_order(results, main);
    let round_cost: Decimal4 = eligible.iter().map(|&idx| results[idx].monthly_fee).sum();
    if eligible.is_empty() || !round_cost.is_positive() {
        return remaining;
    }

    let rounds = remaining.whole_multiples(round_cost);
    if rounds.is_positive() {
        for &idx in &eligible {
            let share = results[idx].monthly_fee * rounds;
            results[idx].credit(share);
        }
        remaining -= round_cost * rounds;
        debug!(
            "Proportional rounds: {} complete round(s) of {}",
            rounds, round_cost
        );
    }

    for &idx in &eligible {
        if !remaining.is_positive() {
            break;
        }
        let share = results[idx].monthly_fee.min(remaining);
        results[idx].credit(share);
        remaining -= share;
        debug!(
            "Partial round: {} to {}",
            share, results[idx].account_number
        );
    }

    remaining
}

fn round_order(results: &[AllocationResult], main: usize) -> Vec<usize> {
    let eligible = |r: &AllocationResult| !r.is_frozen && r.monthly_fee.is_positive();

    let mut order = Vec::with_capacity(results.len());
    if eligible(&results[main]) {
        order.push(main);
    }
    order.extend(
        results
            .iter()
            .enumerate()
            .filter(|&(idx, r)| idx != main && eligible(r))
            .map(|(idx, _)| idx),
    );
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocation::total_allocated;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal4 {
        Decimal4::from_str(s).unwrap()
    }

    fn allocated(results: &[AllocationResult], number: &str) -> String {
        results
            .iter()
            .find(|r| r.account_number == number)
            .unwrap()
            .allocated
            .to_string()
    }

    #[test]
    fn test_debts_paid_smallest_first() {
        let accounts = vec![
            Account::new("M", dec("0"), dec("0")).main(),
            Account::new("A", dec("0"), dec("-50")),
            Account::new("B", dec("0"), dec("-10")),
            Account::new("C", dec("0"), dec("-30")),
        ];
        let results = DistributionCalculator::new().compute(&accounts, dec("15"), None);

        assert_eq!(allocated(&results, "B"), "10.0000");
        assert_eq!(allocated(&results, "C"), "5.0000");
        assert_eq!(allocated(&results, "A"), "0.0000");
        assert_eq!(allocated(&results, "M"), "0.0000");
    }

    #[test]
    fn test_equal_debts_keep_scan_order() {
        let accounts = vec![
            Account::new("M", dec("0"), dec("0")).main(),
            Account::new("X", dec("0"), dec("-20")),
            Account::new("Y", dec("0"), dec("-20")),
        ];
        let results = DistributionCalculator::new().compute(&accounts, dec("25"), None);

        assert_eq!(allocated(&results, "X"), "20.0000");
        assert_eq!(allocated(&results, "Y"), "5.0000");
    }

    #[test]
    fn test_main_debt_is_included() {
        let accounts = vec![
            Account::new("M", dec("0"), dec("-5")).main(),
            Account::new("A", dec("0"), dec("-8")),
        ];
        let results = DistributionCalculator::new().compute(&accounts, dec("10"), None);

        assert_eq!(allocated(&results, "M"), "5.0000");
        assert_eq!(allocated(&results, "A"), "5.0000");
    }

    #[test]
    fn test_fee_leveling_after_debt() {
        let accounts = vec![
            Account::new("M", dec("0"), dec("0")).main(),
            Account::new("A", dec("20"), dec("-10")),
        ];
        let results = DistributionCalculator::new().compute(&accounts, dec("25"), None);

        // 10 clears the debt, 15 of the 20 fee is leveled
        assert_eq!(allocated(&results, "A"), "25.0000");
        assert_eq!(results[1].final_balance, dec("15"));
    }

    #[test]
    fn test_partial_round_stops_when_exhausted() {
        let accounts = vec![
            Account::new("O", dec("30"), dec("30")),
            Account::new("M", dec("10"), dec("10")).main(),
        ];
        let results = DistributionCalculator::new().compute(&accounts, dec("25"), None);

        assert_eq!(allocated(&results, "M"), "10.0000");
        assert_eq!(allocated(&results, "O"), "15.0000");
        // output keeps input order
        assert_eq!(results[0].account_number, "O");
    }

    #[test]
    fn test_complete_rounds_then_partial() {
        let accounts = vec![
            Account::new("M", dec("10"), dec("10")).main(),
            Account::new("A", dec("30"), dec("30")),
        ];
        // two complete rounds (80) then 10 to main, 5 to A
        let results = DistributionCalculator::new().compute(&accounts, dec("95"), None);

        assert_eq!(allocated(&results, "M"), "30.0000");
        assert_eq!(allocated(&results, "A"), "65.0000");
    }

    #[test]
    fn test_tiny_fee_huge_deposit_is_bounded() {
        let accounts = vec![Account::new("M", dec("0.0001"), dec("1")).main()];
        let results = DistributionCalculator::new().compute(&accounts, dec("1000000000"), None);
        assert_eq!(allocated(&results, "M"), "1000000000.0000");
    }

    #[test]
    fn test_overflow_to_main_when_no_fees() {
        let accounts = vec![
            Account::new("M", dec("0"), dec("5")).main(),
            Account::new("A", dec("0"), dec("0")),
            Account::new("F", dec("50"), dec("0")).frozen(),
        ];
        let results = DistributionCalculator::new().compute(&accounts, dec("100"), None);

        assert_eq!(allocated(&results, "M"), "100.0000");
        assert_eq!(allocated(&results, "F"), "0.0000");
    }

    #[test]
    fn test_no_main_leaves_accounts_unchanged() {
        let accounts = vec![Account::new("A", dec("10"), dec("-10"))];
        let results = DistributionCalculator::new().compute(&accounts, dec("50"), None);

        assert_eq!(total_allocated(&results), Decimal4::ZERO);
        assert_eq!(results[0].final_balance, dec("-10"));
        assert!(!results[0].is_active);
    }

    #[test]
    fn test_frozen_main_counts_as_missing() {
        let accounts = vec![
            Account::new("M", dec("10"), dec("0")).main().frozen(),
            Account::new("A", dec("10"), dec("-10")),
        ];
        let results = DistributionCalculator::new().compute(&accounts, dec("50"), None);
        assert_eq!(total_allocated(&results), Decimal4::ZERO);
    }

    #[test]
    fn test_targeted_routes_everything() {
        let accounts = vec![
            Account::new("M", dec("10"), dec("-5")).main(),
            Account::new("A", dec("10"), dec("0")),
        ];
        let results = DistributionCalculator::new().compute(&accounts, dec("40"), Some("A"));

        assert_eq!(allocated(&results, "A"), "40.0000");
        assert_eq!(allocated(&results, "M"), "0.0000");
        assert!(!results[0].is_active);
    }

    #[test]
    fn test_targeted_frozen_allocates_nothing() {
        let accounts = vec![
            Account::new("M", dec("10"), dec("0")).main(),
            Account::new("F", dec("10"), dec("0")).frozen(),
        ];
        let results = DistributionCalculator::new().compute(&accounts, dec("40"), Some("F"));
        assert_eq!(total_allocated(&results), Decimal4::ZERO);
    }

    #[test]
    fn test_is_active_recomputed() {
        let accounts = vec![
            Account::new("M", dec("0"), dec("0")).main(),
            Account::new("A", dec("0"), dec("-10")),
            Account::new("B", dec("0"), dec("-30")),
        ];
        let results = DistributionCalculator::new().compute(&accounts, dec("20"), None);

        assert!(results[1].is_active);
        assert!(!results[2].is_active);
    }
}
