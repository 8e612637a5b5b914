//! Allocation primitives: pure monetary helpers shared by the split
//! calculation. All intermediate arithmetic stays at full decimal precision;
//! rounding to 2 fractional digits happens only at emission time,
//! half-away-from-zero.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use std::collections::HashMap;

use super::models::{Share, ShareRole};

/// Maximum accepted drift between a share list's sum and the order total,
/// and between a reported transfer and its stored share.
pub const AMOUNT_TOLERANCE: Decimal = dec!(0.01);

/// Percentage commission: `value * pct / 100`, unrounded.
pub fn percentage_of(value: Decimal, pct: Decimal) -> Decimal {
    value * pct / Decimal::ONE_HUNDRED
}

/// Round a monetary amount to 2 decimal places, half away from zero.
pub fn round_amount(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Wallet-indexed running totals in item-encounter order. Replaces mutating
/// a share array in place while iterating: totals are accumulated here once
/// and converted to the ordered share list at emission.
#[derive(Debug, Default)]
pub struct WalletTotals {
    order: Vec<String>,
    amounts: HashMap<String, Decimal>,
}

impl WalletTotals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accumulate(&mut self, wallet_id: &str, amount: Decimal) {
        match self.amounts.get_mut(wallet_id) {
            Some(total) => *total += amount,
            None => {
                self.order.push(wallet_id.to_string());
                self.amounts.insert(wallet_id.to_string(), amount);
            }
        }
    }

    pub fn get(&self, wallet_id: &str) -> Option<Decimal> {
        self.amounts.get(wallet_id).copied()
    }

    pub fn total(&self) -> Decimal {
        self.amounts.values().copied().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Deduct `deduction` across all wallets proportionally to their current
    /// amounts: each `a` becomes `max(0, a - deduction * a / total)`. A
    /// non-positive total makes this a no-op; that is a defined edge case,
    /// not an error.
    pub fn deduct_proportionally(&mut self, deduction: Decimal) {
        let total = self.total();
        if total <= Decimal::ZERO {
            return;
        }

        for amount in self.amounts.values_mut() {
            let cut = deduction * *amount / total;
            *amount = (*amount - cut).max(Decimal::ZERO);
        }
    }

    /// Convert to shares in encounter order, dropping non-positive totals.
    pub fn into_shares(self, role: ShareRole) -> Vec<Share> {
        let WalletTotals { order, amounts } = self;
        order
            .into_iter()
            .filter_map(|wallet_id| {
                let amount = amounts.get(&wallet_id).copied()?;
                (amount > Decimal::ZERO).then(|| Share::new(wallet_id, amount, role))
            })
            .collect()
    }
}

/// Emission-time rounding of every share amount.
pub fn round_shares(shares: &mut [Share]) {
    for share in shares.iter_mut() {
        share.amount = round_amount(share.amount);
    }
}

/// Reconcile the rounded share list against the order total. A difference
/// within tolerance lands entirely on the first share in emission order; a
/// larger difference is distributed proportionally to current amounts,
/// re-rounded, with each adjusted share clamped at zero.
pub fn normalize_shares(shares: &mut Vec<Share>, order_total: Decimal) {
    if shares.is_empty() {
        return;
    }

    let current_total: Decimal = shares.iter().map(|s| s.amount).sum();
    if current_total == order_total {
        return;
    }

    let difference = order_total - current_total;
    if difference.abs() <= AMOUNT_TOLERANCE {
        shares[0].amount = round_amount(shares[0].amount + difference);
        return;
    }

    if current_total <= Decimal::ZERO {
        // Nothing to weight by; validation will reject the list
        return;
    }

    let proportions: Vec<Decimal> = shares
        .iter()
        .map(|s| s.amount / current_total)
        .collect();
    for (share, proportion) in shares.iter_mut().zip(proportions) {
        let adjustment = difference * proportion;
        share.amount = round_amount(share.amount + adjustment).max(Decimal::ZERO);
    }
}

/// Final validation: every share carries a wallet id and a strictly positive
/// amount, and the sum matches the order total within tolerance. The error
/// string is the human-readable diagnosis surfaced to operators.
pub fn validate_shares(shares: &[Share], order_total: Decimal) -> Result<(), String> {
    let mut sum = Decimal::ZERO;
    for share in shares {
        if share.wallet_id.trim().is_empty() {
            return Err("Wallet ID missing on one of the shares.".to_string());
        }
        if share.amount <= Decimal::ZERO {
            return Err(format!(
                "Invalid amount {} for wallet {}",
                share.amount, share.wallet_id
            ));
        }
        sum += share.amount;
    }

    if (sum - order_total).abs() > AMOUNT_TOLERANCE {
        return Err(format!(
            "Share sum ({:.2}) does not match the order total ({:.2})",
            sum, order_total
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage_of() {
        assert_eq!(percentage_of(dec!(100.00), dec!(10)), dec!(10.00));
        assert_eq!(percentage_of(dec!(59.90), dec!(0)), dec!(0.00));
        // Full precision kept until emission
        assert_eq!(percentage_of(dec!(10.00), dec!(3.33)), dec!(0.333));
    }

    #[test]
    fn test_round_amount_half_away_from_zero() {
        assert_eq!(round_amount(dec!(33.335)), dec!(33.34));
        assert_eq!(round_amount(dec!(33.334)), dec!(33.33));
        assert_eq!(round_amount(dec!(-0.005)), dec!(-0.01));
    }

    #[test]
    fn test_accumulate_sums_repeated_wallets() {
        let mut totals = WalletTotals::new();
        totals.accumulate("w1", dec!(40.00));
        totals.accumulate("w2", dec!(10.00));
        totals.accumulate("w1", dec!(20.00));

        assert_eq!(totals.get("w1"), Some(dec!(60.00)));
        assert_eq!(totals.total(), dec!(70.00));

        let shares = totals.into_shares(ShareRole::Producer);
        assert_eq!(shares.len(), 2);
        // Encounter order preserved
        assert_eq!(shares[0].wallet_id, "w1");
        assert_eq!(shares[1].wallet_id, "w2");
    }

    #[test]
    fn test_proportional_deduction_single_recipient() {
        let mut totals = WalletTotals::new();
        totals.accumulate("w1", dec!(90.00));
        totals.deduct_proportionally(dec!(9.00));
        assert_eq!(totals.get("w1"), Some(dec!(81.00)));
    }

    #[test]
    fn test_proportional_deduction_weights_by_amount() {
        let mut totals = WalletTotals::new();
        totals.accumulate("w1", dec!(60.00));
        totals.accumulate("w2", dec!(30.00));
        totals.deduct_proportionally(dec!(9.00));
        assert_eq!(totals.get("w1"), Some(dec!(54.00)));
        assert_eq!(totals.get("w2"), Some(dec!(27.00)));
    }

    #[test]
    fn test_proportional_deduction_full_amount_reaches_exact_zero() {
        let mut totals = WalletTotals::new();
        totals.accumulate("w1", dec!(60.00));
        totals.accumulate("w2", dec!(40.00));
        totals.deduct_proportionally(dec!(100.00));
        assert_eq!(totals.get("w1"), Some(dec!(0.00)));
        assert_eq!(totals.get("w2"), Some(dec!(0.00)));
    }

    #[test]
    fn test_proportional_deduction_never_goes_negative() {
        let mut totals = WalletTotals::new();
        totals.accumulate("w1", dec!(10.00));
        totals.deduct_proportionally(dec!(50.00));
        assert_eq!(totals.get("w1"), Some(dec!(0.00)));
    }

    #[test]
    fn test_proportional_deduction_noop_on_zero_total() {
        let mut totals = WalletTotals::new();
        totals.accumulate("w1", dec!(0.00));
        totals.deduct_proportionally(dec!(5.00));
        assert_eq!(totals.get("w1"), Some(dec!(0.00)));

        let mut empty = WalletTotals::new();
        empty.deduct_proportionally(dec!(5.00));
        assert!(empty.is_empty());
    }

    #[test]
    fn test_normalize_small_difference_lands_on_first_share() {
        // Three-way split of 100.00 rounds to 99.99
        let mut shares = vec![
            Share::new("w1", dec!(33.33), ShareRole::Producer),
            Share::new("w2", dec!(33.33), ShareRole::Producer),
            Share::new("w3", dec!(33.33), ShareRole::Producer),
        ];
        normalize_shares(&mut shares, dec!(100.00));
        assert_eq!(shares[0].amount, dec!(33.34));
        assert_eq!(shares[1].amount, dec!(33.33));
        assert_eq!(shares[2].amount, dec!(33.33));
        let sum: Decimal = shares.iter().map(|s| s.amount).sum();
        assert_eq!(sum, dec!(100.00));
    }

    #[test]
    fn test_normalize_large_difference_distributes_proportionally() {
        let mut shares = vec![
            Share::new("w1", dec!(60.00), ShareRole::Producer),
            Share::new("w2", dec!(30.00), ShareRole::Producer),
        ];
        normalize_shares(&mut shares, dec!(100.00));
        assert_eq!(shares[0].amount, dec!(66.67));
        assert_eq!(shares[1].amount, dec!(33.33));
    }

    #[test]
    fn test_normalize_empty_list_is_noop() {
        let mut shares: Vec<Share> = vec![];
        normalize_shares(&mut shares, dec!(10.00));
        assert!(shares.is_empty());
    }

    #[test]
    fn test_validate_rejects_missing_wallet() {
        let shares = vec![Share::new("", dec!(10.00), ShareRole::Producer)];
        assert!(validate_shares(&shares, dec!(10.00))
            .unwrap_err()
            .contains("Wallet ID missing"));
    }

    #[test]
    fn test_validate_rejects_non_positive_amount() {
        let shares = vec![Share::new("w1", dec!(0.00), ShareRole::Producer)];
        assert!(validate_shares(&shares, dec!(0.00))
            .unwrap_err()
            .contains("Invalid amount"));
    }

    #[test]
    fn test_validate_rejects_sum_mismatch() {
        let shares = vec![
            Share::new("w1", dec!(50.00), ShareRole::Producer),
            Share::new("w2", dec!(40.00), ShareRole::Producer),
        ];
        let err = validate_shares(&shares, dec!(100.00)).unwrap_err();
        assert!(err.contains("90.00"));
        assert!(err.contains("100.00"));
    }

    #[test]
    fn test_validate_accepts_within_tolerance() {
        let shares = vec![
            Share::new("w1", dec!(50.00), ShareRole::Producer),
            Share::new("w2", dec!(49.99), ShareRole::Producer),
        ];
        assert!(validate_shares(&shares, dec!(100.00)).is_ok());
    }
}
