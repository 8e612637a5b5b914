use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::split_engine::models::Share;
use crate::split_engine::allocation::AMOUNT_TOLERANCE;

/// Split lifecycle status.
///
/// `pending -> processing -> confirmed -> completed`, with side branches to
/// `refunded` (until settlement completes) and `failed` (while the payment
/// is still moving). `completed`, `refunded` and `failed` are terminal for
/// the payment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitStatus {
    Pending,
    Processing,
    Confirmed,
    Completed,
    Refunded,
    Failed,
}

impl SplitStatus {
    pub const ALL: [SplitStatus; 6] = [
        SplitStatus::Pending,
        SplitStatus::Processing,
        SplitStatus::Confirmed,
        SplitStatus::Completed,
        SplitStatus::Refunded,
        SplitStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SplitStatus::Pending => "pending",
            SplitStatus::Processing => "processing",
            SplitStatus::Confirmed => "confirmed",
            SplitStatus::Completed => "completed",
            SplitStatus::Refunded => "refunded",
            SplitStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "processing" => SplitStatus::Processing,
            "confirmed" => SplitStatus::Confirmed,
            "completed" => SplitStatus::Completed,
            "refunded" => SplitStatus::Refunded,
            "failed" => SplitStatus::Failed,
            _ => SplitStatus::Pending,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SplitStatus::Completed | SplitStatus::Refunded | SplitStatus::Failed
        )
    }

    /// The transition table of the reconciliation state machine. Status never
    /// regresses; terminal states accept nothing.
    pub fn can_transition(&self, to: SplitStatus) -> bool {
        use SplitStatus::*;
        match (self, to) {
            (Pending, Processing) => true,
            (Pending | Processing, Confirmed) => true,
            (Pending | Processing | Confirmed, Completed) => true,
            (Pending | Processing | Confirmed, Refunded) => true,
            (Pending | Processing, Failed) => true,
            _ => false,
        }
    }

    /// Every status from which `to` is reachable, for guarded ledger updates.
    pub fn sources_of(to: SplitStatus) -> Vec<SplitStatus> {
        Self::ALL
            .iter()
            .copied()
            .filter(|from| from.can_transition(to))
            .collect()
    }
}

impl fmt::Display for SplitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One order's split as persisted by the ledger. Created when the order's
/// payment is submitted, advanced only by status transitions and settlement
/// marking, and removed only by explicit administrative clearing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitRecord {
    pub id: Uuid,
    pub order_id: i64,
    /// Unset until the processor accepts the payment.
    pub payment_id: Option<String>,
    pub shares: Vec<Share>,
    pub status: SplitStatus,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub marketplace_commission: Decimal,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub affiliate_commission: Option<Decimal>,
    /// Wallets whose transfers matched their stored share.
    pub settled_wallets: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SplitRecord {
    pub fn share_for(&self, wallet_id: &str) -> Option<&Share> {
        self.shares.iter().find(|s| s.wallet_id == wallet_id)
    }

    pub fn is_wallet_settled(&self, wallet_id: &str) -> bool {
        self.settled_wallets.iter().any(|w| w == wallet_id)
    }

    /// Every stored share has a matching confirmed transfer.
    pub fn is_fully_settled(&self) -> bool {
        !self.shares.is_empty()
            && self
                .shares
                .iter()
                .all(|s| self.is_wallet_settled(&s.wallet_id))
    }

    /// Whether a reported transfer amount matches the stored share for the
    /// wallet, within the shared tolerance.
    pub fn transfer_matches(&self, wallet_id: &str, amount: Decimal) -> bool {
        self.share_for(wallet_id)
            .map(|s| (s.amount - amount).abs() <= AMOUNT_TOLERANCE)
            .unwrap_or(false)
    }
}

/// Input for creating a ledger row.
#[derive(Debug, Clone)]
pub struct NewSplitRecord {
    pub order_id: i64,
    pub payment_id: Option<String>,
    pub shares: Vec<Share>,
    pub total_amount: Decimal,
    pub marketplace_commission: Decimal,
    pub affiliate_commission: Option<Decimal>,
}

/// Append-only audit row keyed by payment id: one at submission per payment
/// attempt, one per status transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitHistoryEntry {
    pub id: Uuid,
    pub order_id: i64,
    pub payment_id: String,
    pub status: SplitStatus,
    pub split_data: Option<Vec<Share>>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub marketplace_commission: Decimal,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub affiliate_commission: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::split_engine::models::ShareRole;
    use rust_decimal_macros::dec;

    fn record(shares: Vec<Share>, settled: Vec<&str>) -> SplitRecord {
        SplitRecord {
            id: Uuid::new_v4(),
            order_id: 1,
            payment_id: Some("pay_1".to_string()),
            shares,
            status: SplitStatus::Processing,
            total_amount: dec!(100.00),
            marketplace_commission: dec!(10.00),
            affiliate_commission: None,
            settled_wallets: settled.into_iter().map(String::from).collect(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_status_string_round_trip() {
        for status in [
            SplitStatus::Pending,
            SplitStatus::Processing,
            SplitStatus::Confirmed,
            SplitStatus::Completed,
            SplitStatus::Refunded,
            SplitStatus::Failed,
        ] {
            assert_eq!(SplitStatus::parse(status.as_str()), status);
        }
        // Unknown strings default to pending
        assert_eq!(SplitStatus::parse("garbage"), SplitStatus::Pending);
    }

    #[test]
    fn test_transitions_never_regress() {
        assert!(SplitStatus::Pending.can_transition(SplitStatus::Processing));
        assert!(SplitStatus::Processing.can_transition(SplitStatus::Confirmed));
        assert!(SplitStatus::Confirmed.can_transition(SplitStatus::Completed));
        // Out-of-order confirmation straight from pending
        assert!(SplitStatus::Pending.can_transition(SplitStatus::Confirmed));

        assert!(!SplitStatus::Confirmed.can_transition(SplitStatus::Processing));
        assert!(!SplitStatus::Completed.can_transition(SplitStatus::Processing));
        assert!(!SplitStatus::Completed.can_transition(SplitStatus::Refunded));
        assert!(!SplitStatus::Refunded.can_transition(SplitStatus::Completed));
        assert!(!SplitStatus::Failed.can_transition(SplitStatus::Processing));
        assert!(!SplitStatus::Confirmed.can_transition(SplitStatus::Failed));
    }

    #[test]
    fn test_terminal_statuses_accept_nothing() {
        for terminal in [SplitStatus::Completed, SplitStatus::Refunded, SplitStatus::Failed] {
            assert!(terminal.is_terminal());
            for to in SplitStatus::ALL {
                assert!(!terminal.can_transition(to));
            }
        }
        assert!(!SplitStatus::Pending.is_terminal());
        assert!(!SplitStatus::Processing.is_terminal());
    }

    #[test]
    fn test_sources_follow_the_transition_table() {
        assert_eq!(
            SplitStatus::sources_of(SplitStatus::Processing),
            vec![SplitStatus::Pending]
        );
        assert_eq!(
            SplitStatus::sources_of(SplitStatus::Completed),
            vec![SplitStatus::Pending, SplitStatus::Processing, SplitStatus::Confirmed]
        );
        assert_eq!(
            SplitStatus::sources_of(SplitStatus::Failed),
            vec![SplitStatus::Pending, SplitStatus::Processing]
        );
    }

    #[test]
    fn test_fully_settled_requires_every_share() {
        let shares = vec![
            Share::new("w1", dec!(60.00), ShareRole::Marketplace),
            Share::new("w2", dec!(40.00), ShareRole::Producer),
        ];

        let partial = record(shares.clone(), vec!["w1"]);
        assert!(!partial.is_fully_settled());

        let full = record(shares.clone(), vec!["w1", "w2"]);
        assert!(full.is_fully_settled());

        // An empty share list is never considered settled
        let empty = record(vec![], vec![]);
        assert!(!empty.is_fully_settled());
    }

    #[test]
    fn test_transfer_matches_within_tolerance() {
        let rec = record(
            vec![Share::new("w1", dec!(60.00), ShareRole::Producer)],
            vec![],
        );
        assert!(rec.transfer_matches("w1", dec!(60.00)));
        assert!(rec.transfer_matches("w1", dec!(59.99)));
        assert!(!rec.transfer_matches("w1", dec!(59.50)));
        assert!(!rec.transfer_matches("unknown", dec!(60.00)));
    }
}
