use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{AffiliateCommissionMode, SplitSettings};
use crate::directory::PayeeDirectory;
use crate::error::{SplitError, SplitResult};
use crate::orders::Order;

use super::allocation::{
    normalize_shares, percentage_of, round_amount, round_shares, validate_shares, WalletTotals,
};
use super::models::{ComputedSplit, Share, ShareRole};

/// Split calculation engine. Stateless: the payee directory is the only
/// injected collaborator, settings arrive as a per-order snapshot, and
/// `compute` is a pure synchronous pass over the order's items.
pub struct SplitEngine {
    directory: Arc<dyn PayeeDirectory>,
}

impl SplitEngine {
    pub fn new(directory: Arc<dyn PayeeDirectory>) -> Self {
        Self { directory }
    }

    /// Partition the order total into per-wallet shares.
    ///
    /// Returns `NotEligible` when dynamic split is disabled, unconfigured or
    /// the order type is unsupported, and `Validation` when the computed
    /// shares fail reconciliation. In both cases no shares are returned and
    /// the caller must not apply a partial split.
    pub fn compute(&self, order: &Order, settings: &SplitSettings) -> SplitResult<ComputedSplit> {
        self.check_eligibility(order, settings)?;

        let order_total = order.total();
        let mut marketplace_total = Decimal::ZERO;
        let mut commission_total = Decimal::ZERO;
        let mut producers = WalletTotals::new();

        // Items: the marketplace takes its commission on every item; the
        // remainder goes to the resolved producer, or to the marketplace
        // when the item has no registered seller.
        for item in &order.items {
            let commission = percentage_of(item.total, settings.marketplace_commission_pct);
            commission_total += commission;

            match self.directory.seller_for_item(item) {
                Some(seller) => {
                    marketplace_total += commission;
                    producers.accumulate(&seller.wallet_id, item.total - commission);
                }
                None => {
                    debug!(
                        "Order {}: no seller for product {}, value stays with the marketplace",
                        order.id, item.product_id
                    );
                    marketplace_total += item.total;
                }
            }
        }

        // At most one affiliate commission per order, deducted from the
        // producers proportionally to their accumulated amounts.
        let affiliate = self.resolve_affiliate(order, settings, commission_total, order_total);
        if let Some((_, amount)) = &affiliate {
            producers.deduct_proportionally(*amount);
        }

        // Shipping goes to the designated fulfilling producer, defaulting to
        // the marketplace when none resolves.
        if order.shipping_total > Decimal::ZERO {
            match self.directory.shipping_recipient(order) {
                Some(seller) => producers.accumulate(&seller.wallet_id, order.shipping_total),
                None => marketplace_total += order.shipping_total,
            }
        }

        // Emission order is fixed: affiliate, marketplace, producers in
        // item-encounter order.
        let mut shares = Vec::new();
        if let Some((wallet_id, amount)) = &affiliate {
            shares.push(Share::new(wallet_id.clone(), *amount, ShareRole::Affiliate));
        }
        if marketplace_total > Decimal::ZERO {
            shares.push(Share::new(
                settings.marketplace_wallet_id.clone(),
                marketplace_total,
                ShareRole::Marketplace,
            ));
        }
        shares.extend(producers.into_shares(ShareRole::Producer));

        round_shares(&mut shares);
        normalize_shares(&mut shares, order_total);

        if let Err(diagnosis) = validate_shares(&shares, order_total) {
            warn!("Order {}: split validation failed - {}", order.id, diagnosis);
            return Err(SplitError::Validation(diagnosis));
        }

        info!(
            "✓ Order {}: computed {} share(s) over total {}",
            order.id,
            shares.len(),
            order_total
        );

        Ok(ComputedSplit {
            shares,
            total_amount: order_total,
            marketplace_commission: round_amount(commission_total),
            affiliate_commission: affiliate.map(|(_, amount)| round_amount(amount)),
        })
    }

    fn check_eligibility(&self, order: &Order, settings: &SplitSettings) -> SplitResult<()> {
        if !settings.dynamic_split_enabled {
            return Err(SplitError::NotEligible(
                "Dynamic split is not enabled.".to_string(),
            ));
        }
        if settings.marketplace_wallet_id.trim().is_empty() {
            return Err(SplitError::NotEligible(
                "Marketplace wallet is not configured.".to_string(),
            ));
        }
        if !pct_in_range(settings.marketplace_commission_pct)
            || !pct_in_range(settings.default_affiliate_commission_pct)
        {
            return Err(SplitError::NotEligible(
                "Commission percentage out of the 0-100 range.".to_string(),
            ));
        }
        if order.recurring {
            return Err(SplitError::NotEligible(
                "Dynamic split is not supported on recurring orders.".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve the order-level affiliate share. The wallet always comes from
    /// the external referral; the amount depends on the configured mode.
    fn resolve_affiliate(
        &self,
        order: &Order,
        settings: &SplitSettings,
        commission_total: Decimal,
        order_total: Decimal,
    ) -> Option<(String, Decimal)> {
        let referral = self.directory.affiliate_for_order(order.id)?;

        let amount = match settings.affiliate_commission_mode {
            AffiliateCommissionMode::UseExternalReferralAmount => referral.amount,
            AffiliateCommissionMode::PercentageAfterMarketplace => percentage_of(
                order_total - commission_total,
                settings.default_affiliate_commission_pct,
            ),
        };

        if amount <= Decimal::ZERO {
            debug!("Order {}: affiliate resolved with no commission, skipped", order.id);
            return None;
        }

        Some((referral.wallet_id, amount))
    }
}

fn pct_in_range(pct: Decimal) -> bool {
    pct >= Decimal::ZERO && pct <= Decimal::ONE_HUNDRED
}
