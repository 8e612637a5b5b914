use rust_decimal::Decimal;
use std::collections::HashMap;
use uuid::Uuid;

use crate::orders::{Order, OrderItem};

/// A producer/vendor resolved for a line item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SellerWallet {
    pub user_id: i64,
    pub wallet_id: String,
}

/// An affiliate referral resolved for an order. `amount` is the commission
/// pre-computed by the affiliate platform; whether it is used depends on the
/// configured commission mode.
#[derive(Debug, Clone, PartialEq)]
pub struct AffiliateReferral {
    pub wallet_id: String,
    pub amount: Decimal,
}

/// External payee directory boundary: maps line items, referrals and the
/// shipping assignment to processor wallet identifiers. Lookups are
/// synchronous, since the calculation is a pure single pass with no
/// suspension points; implementations resolve against an already-loaded
/// snapshot.
pub trait PayeeDirectory: Send + Sync {
    /// The producer fulfilling this item, if one is registered with a wallet.
    fn seller_for_item(&self, item: &OrderItem) -> Option<SellerWallet>;

    /// At most one affiliate per order. `None` when there is no referral or
    /// the affiliate has no wallet configured.
    fn affiliate_for_order(&self, order_id: i64) -> Option<AffiliateReferral>;

    /// The producer designated to receive the shipping amount, if any.
    fn shipping_recipient(&self, order: &Order) -> Option<SellerWallet>;
}

/// Processor wallet identifiers are UUID-formatted.
pub fn is_valid_wallet_id(wallet_id: &str) -> bool {
    Uuid::parse_str(wallet_id).is_ok()
}

/// Directory backed by fixed maps, for tests and local runs.
#[derive(Default)]
pub struct MemoryDirectory {
    sellers: HashMap<i64, SellerWallet>,
    affiliates: HashMap<i64, AffiliateReferral>,
    shipping: HashMap<i64, SellerWallet>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_seller(mut self, product_id: i64, seller: SellerWallet) -> Self {
        self.sellers.insert(product_id, seller);
        self
    }

    pub fn with_affiliate(mut self, order_id: i64, referral: AffiliateReferral) -> Self {
        self.affiliates.insert(order_id, referral);
        self
    }

    pub fn with_shipping_recipient(mut self, order_id: i64, seller: SellerWallet) -> Self {
        self.shipping.insert(order_id, seller);
        self
    }
}

impl PayeeDirectory for MemoryDirectory {
    fn seller_for_item(&self, item: &OrderItem) -> Option<SellerWallet> {
        self.sellers.get(&item.product_id).cloned()
    }

    fn affiliate_for_order(&self, order_id: i64) -> Option<AffiliateReferral> {
        self.affiliates.get(&order_id).cloned()
    }

    fn shipping_recipient(&self, order: &Order) -> Option<SellerWallet> {
        self.shipping.get(&order.id).cloned()
    }
}
