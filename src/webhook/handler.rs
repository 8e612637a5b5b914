use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::SplitResult;
use crate::ledger::{SplitLedger, SplitRecord, SplitStatus};
use crate::orders::OrderStore;

use super::events::ProcessorEvent;

/// Reconciliation state machine: consumes processor events and advances the
/// split record for the referenced payment. Invocations may be delivered
/// concurrently and out of order; every status change goes through the
/// ledger's guarded update, so replays and races cannot regress a record.
/// Events for unknown payments are ignored.
pub struct SplitWebhookHandler {
    ledger: Arc<dyn SplitLedger>,
    orders: Arc<dyn OrderStore>,
}

impl SplitWebhookHandler {
    pub fn new(ledger: Arc<dyn SplitLedger>, orders: Arc<dyn OrderStore>) -> Self {
        Self { ledger, orders }
    }

    pub async fn handle(&self, event: ProcessorEvent) -> SplitResult<()> {
        let payment_id = event.payment_id().to_string();

        let Some(record) = self.ledger.get_by_payment(&payment_id).await? else {
            debug!("No split record for payment {}, event ignored", payment_id);
            return Ok(());
        };

        match event {
            ProcessorEvent::PaymentReceived { .. } => {
                self.transition(
                    &record,
                    &payment_id,
                    SplitStatus::Processing,
                    "Payment split is processing.",
                )
                .await
            }
            ProcessorEvent::PaymentConfirmed { .. } => {
                self.transition(
                    &record,
                    &payment_id,
                    SplitStatus::Confirmed,
                    "Payment split confirmed. Awaiting transfers.",
                )
                .await
            }
            ProcessorEvent::PaymentRefunded { .. } => {
                self.transition(
                    &record,
                    &payment_id,
                    SplitStatus::Refunded,
                    "Payment split refunded.",
                )
                .await
            }
            ProcessorEvent::TransferReceived { wallet_id, value, .. } => {
                self.handle_transfer_received(&record, &payment_id, &wallet_id, value)
                    .await
            }
            ProcessorEvent::TransferFailed { wallet_id, error, .. } => {
                self.orders
                    .append_order_note(
                        record.order_id,
                        &format!("Split transfer failed for wallet {}: {}", wallet_id, error),
                    )
                    .await?;
                warn!(
                    "Payment {}: transfer to wallet {} failed: {}",
                    payment_id, wallet_id, error
                );
                self.transition(
                    &record,
                    &payment_id,
                    SplitStatus::Failed,
                    "Payment split failed.",
                )
                .await
            }
        }
    }

    async fn handle_transfer_received(
        &self,
        record: &SplitRecord,
        payment_id: &str,
        wallet_id: &str,
        value: rust_decimal::Decimal,
    ) -> SplitResult<()> {
        let Some(share) = record.share_for(wallet_id) else {
            warn!(
                "Payment {}: transfer for wallet {} with no stored share",
                payment_id, wallet_id
            );
            self.orders
                .append_order_note(
                    record.order_id,
                    &format!(
                        "Split transfer received for unknown wallet {}: {:.2}",
                        wallet_id, value
                    ),
                )
                .await?;
            return Ok(());
        };

        self.orders
            .append_order_note(
                record.order_id,
                &format!("Split transfer received for wallet {}: {:.2}", wallet_id, value),
            )
            .await?;

        if !record.transfer_matches(wallet_id, value) {
            // Mismatches are reported, not enforced: partial or adjusted
            // transfers are a processor-side decision.
            warn!(
                "Payment {}: transfer amount mismatch for wallet {} (expected {}, received {})",
                payment_id, wallet_id, share.amount, value
            );
            self.orders
                .append_order_note(
                    record.order_id,
                    &format!(
                        "Split transfer amount mismatch for wallet {}: expected {:.2}, received {:.2}",
                        wallet_id, share.amount, value
                    ),
                )
                .await?;
            return Ok(());
        }

        let Some(updated) = self.ledger.mark_wallet_settled(payment_id, wallet_id).await? else {
            return Ok(());
        };

        if updated.is_fully_settled() {
            self.transition(
                &updated,
                payment_id,
                SplitStatus::Completed,
                "All split transfers completed.",
            )
            .await?;
        }

        Ok(())
    }

    /// Guarded transition plus its audit trail: order note and history row
    /// only when the status actually changed. The source statuses come from
    /// the transition table, so a replayed or out-of-order event can never
    /// move a record backwards.
    async fn transition(
        &self,
        record: &SplitRecord,
        payment_id: &str,
        to: SplitStatus,
        note: &str,
    ) -> SplitResult<()> {
        let from = SplitStatus::sources_of(to);
        if !self.ledger.update_status(payment_id, &from, to).await? {
            debug!(
                "Payment {}: transition to {} skipped (already applied or terminal)",
                payment_id, to
            );
            return Ok(());
        }

        info!("✓ Payment {}: split status -> {}", payment_id, to);
        self.orders.append_order_note(record.order_id, note).await?;
        self.ledger
            .record_history(
                record.order_id,
                payment_id,
                to,
                None,
                record.total_amount,
                record.marketplace_commission,
                record.affiliate_commission,
            )
            .await?;

        Ok(())
    }
}
