use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{ConfigStore, ManualSplitEntry, SplitSettings};
use crate::directory::is_valid_wallet_id;
use crate::error::{SplitError, SplitResult};
use crate::ledger::{NewSplitRecord, SplitLedger, SplitStatus};
use crate::orders::{Order, OrderStore};

use super::engine::SplitEngine;
use super::models::{ComputedSplit, Share, ShareRole, WireShare};

/// Submission-path orchestration: computes the dynamic split for an order's
/// payment, persists it to the ledger, and falls back to the manually
/// configured static split when the dynamic calculation refuses. Every
/// failure here degrades to "no split applied"; the order keeps processing.
pub struct PaymentSplitService {
    engine: SplitEngine,
    config: Arc<dyn ConfigStore>,
    ledger: Arc<dyn SplitLedger>,
    orders: Arc<dyn OrderStore>,
}

impl PaymentSplitService {
    pub fn new(
        engine: SplitEngine,
        config: Arc<dyn ConfigStore>,
        ledger: Arc<dyn SplitLedger>,
        orders: Arc<dyn OrderStore>,
    ) -> Self {
        Self { engine, config, ledger, orders }
    }

    /// Build the share payload for the order's payment, or `None` when no
    /// split applies. `payment_id` is passed when the processor has already
    /// accepted the payment; otherwise it is attached later via
    /// [`attach_payment`](Self::attach_payment).
    pub async fn split_for_payment(
        &self,
        order: &Order,
        payment_id: Option<&str>,
    ) -> SplitResult<Option<Vec<WireShare>>> {
        let settings = self.config.split_settings();

        match self.engine.compute(order, &settings) {
            Ok(split) if split.is_empty() => {
                info!("Order {}: nothing to split", order.id);
                Ok(None)
            }
            Ok(split) => {
                let payload = split.wire_shares();
                self.persist(order, payment_id, &split).await?;
                self.orders
                    .append_order_note(
                        order.id,
                        "Dynamic split calculated and applied to payment.",
                    )
                    .await?;
                Ok(Some(payload))
            }
            Err(SplitError::NotEligible(reason)) => {
                info!("Order {}: {} Falling back to static split.", order.id, reason);
                self.apply_static_split(order, payment_id, &settings).await
            }
            Err(SplitError::Validation(diagnosis)) => {
                warn!("Order {}: dynamic split discarded - {}", order.id, diagnosis);
                self.orders
                    .append_order_note(
                        order.id,
                        &format!("Dynamic split discarded: {}", diagnosis),
                    )
                    .await?;
                Ok(None)
            }
            Err(other) => Err(other),
        }
    }

    /// Record the processor's payment id on the order's ledger row.
    pub async fn attach_payment(&self, order_id: i64, payment_id: &str) -> SplitResult<()> {
        self.ledger.attach_payment(order_id, payment_id).await
    }

    /// Administrative clearing of an order's split record.
    pub async fn clear_split(&self, order_id: i64) -> SplitResult<()> {
        self.ledger.clear_record(order_id).await
    }

    /// The manually configured static split, applied when the dynamic
    /// calculation is disabled or refuses the order.
    async fn apply_static_split(
        &self,
        order: &Order,
        payment_id: Option<&str>,
        settings: &SplitSettings,
    ) -> SplitResult<Option<Vec<WireShare>>> {
        let shares = static_shares(&settings.manual_split);
        if shares.is_empty() {
            return Ok(None);
        }

        let split = ComputedSplit {
            shares,
            total_amount: order.total(),
            marketplace_commission: rust_decimal::Decimal::ZERO,
            affiliate_commission: None,
        };
        let payload = split.wire_shares();

        self.persist(order, payment_id, &split).await?;

        let mut note = String::from("Static split applied to payment:\n");
        for share in &split.shares {
            note.push_str(&format!("- Wallet {}: {:.2}\n", share.wallet_id, share.amount));
        }
        self.orders.append_order_note(order.id, note.trim_end()).await?;

        Ok(Some(payload))
    }

    async fn persist(
        &self,
        order: &Order,
        payment_id: Option<&str>,
        split: &ComputedSplit,
    ) -> SplitResult<()> {
        self.ledger
            .create_record(NewSplitRecord {
                order_id: order.id,
                payment_id: payment_id.map(String::from),
                shares: split.shares.clone(),
                total_amount: split.total_amount,
                marketplace_commission: split.marketplace_commission,
                affiliate_commission: split.affiliate_commission,
            })
            .await?;

        if let Some(payment_id) = payment_id {
            self.ledger
                .record_history(
                    order.id,
                    payment_id,
                    SplitStatus::Pending,
                    Some(&split.shares),
                    split.total_amount,
                    split.marketplace_commission,
                    split.affiliate_commission,
                )
                .await?;
        }

        Ok(())
    }
}

/// Convert the configured entries to shares, skipping entries with an
/// invalid wallet id or a non-positive amount.
fn static_shares(entries: &[ManualSplitEntry]) -> Vec<Share> {
    entries
        .iter()
        .filter(|entry| {
            if !is_valid_wallet_id(&entry.wallet_id) {
                warn!("Static split entry skipped, invalid wallet id: {}", entry.wallet_id);
                return false;
            }
            if entry.fixed_value <= rust_decimal::Decimal::ZERO {
                warn!(
                    "Static split entry skipped, non-positive amount for wallet {}",
                    entry.wallet_id
                );
                return false;
            }
            true
        })
        .map(|entry| Share::new(entry.wallet_id.clone(), entry.fixed_value, ShareRole::Producer))
        .collect()
}
