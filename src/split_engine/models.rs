use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Which payee a share belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShareRole {
    Marketplace,
    Affiliate,
    Producer,
}

impl ShareRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShareRole::Marketplace => "marketplace",
            ShareRole::Affiliate => "affiliate",
            ShareRole::Producer => "producer",
        }
    }
}

/// One payee's slice of an order total. Shares in a final list always carry
/// a strictly positive amount; zero shares are dropped, never emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Share {
    pub wallet_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub role: ShareRole,
}

impl Share {
    pub fn new(wallet_id: impl Into<String>, amount: Decimal, role: ShareRole) -> Self {
        Self { wallet_id: wallet_id.into(), amount, role }
    }
}

/// Result of a split calculation. The commission totals are recorded on the
/// ledger row alongside the share list.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedSplit {
    pub shares: Vec<Share>,
    pub total_amount: Decimal,
    pub marketplace_commission: Decimal,
    pub affiliate_commission: Option<Decimal>,
}

impl ComputedSplit {
    pub fn is_empty(&self) -> bool {
        self.shares.is_empty()
    }

    pub fn wire_shares(&self) -> Vec<WireShare> {
        self.shares.iter().map(WireShare::from).collect()
    }
}

/// The payload entry handed to the payment processor's transfer API. Field
/// names and numeric formatting are the processor's wire contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireShare {
    pub wallet_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub fixed_value: Decimal,
}

impl From<&Share> for WireShare {
    fn from(share: &Share) -> Self {
        Self {
            wallet_id: share.wallet_id.clone(),
            fixed_value: share.amount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_wire_share_field_names() {
        let share = Share::new("abc-wallet", dec!(81.00), ShareRole::Producer);
        let json = serde_json::to_string(&WireShare::from(&share)).unwrap();
        assert!(json.contains("\"walletId\":\"abc-wallet\""));
        assert!(json.contains("\"fixedValue\":81"));
    }

    #[test]
    fn test_wire_share_parses_float_value() {
        let wire: WireShare =
            serde_json::from_str(r#"{"walletId":"w1","fixedValue":10.5}"#).unwrap();
        assert_eq!(wire.fixed_value, dec!(10.5));
    }

    #[test]
    fn test_share_role_serializes_snake_case() {
        let share = Share::new("w", dec!(1.00), ShareRole::Marketplace);
        let json = serde_json::to_string(&share).unwrap();
        assert!(json.contains("\"role\":\"marketplace\""));
        let back: Share = serde_json::from_str(&json).unwrap();
        assert_eq!(back, share);
    }
}
