use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::SplitResult;
use crate::split_engine::models::Share;

use super::models::{NewSplitRecord, SplitHistoryEntry, SplitRecord, SplitStatus};
use super::repository::SplitLedger;

/// In-memory split ledger. A single store-wide lock makes every operation an
/// atomic read-modify-write, matching the per-record atomicity the Postgres
/// implementation gets from row locking. Used as the test fixture and for
/// embedded deployments without a database.
#[derive(Default)]
pub struct MemorySplitLedger {
    inner: RwLock<Store>,
}

#[derive(Default)]
struct Store {
    records: HashMap<i64, SplitRecord>,
    history: Vec<SplitHistoryEntry>,
}

impl MemorySplitLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store {
    fn by_payment_mut(&mut self, payment_id: &str) -> Option<&mut SplitRecord> {
        self.records
            .values_mut()
            .find(|r| r.payment_id.as_deref() == Some(payment_id))
    }

    fn by_payment(&self, payment_id: &str) -> Option<&SplitRecord> {
        self.records
            .values()
            .find(|r| r.payment_id.as_deref() == Some(payment_id))
    }
}

#[async_trait]
impl SplitLedger for MemorySplitLedger {
    async fn create_record(&self, record: NewSplitRecord) -> SplitResult<SplitRecord> {
        let now = Utc::now();
        let stored = SplitRecord {
            id: Uuid::new_v4(),
            order_id: record.order_id,
            payment_id: record.payment_id,
            shares: record.shares,
            status: SplitStatus::Pending,
            total_amount: record.total_amount,
            marketplace_commission: record.marketplace_commission,
            affiliate_commission: record.affiliate_commission,
            settled_wallets: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        self.inner
            .write()
            .records
            .insert(stored.order_id, stored.clone());
        Ok(stored)
    }

    async fn get_by_order(&self, order_id: i64) -> SplitResult<Option<SplitRecord>> {
        Ok(self.inner.read().records.get(&order_id).cloned())
    }

    async fn get_by_payment(&self, payment_id: &str) -> SplitResult<Option<SplitRecord>> {
        Ok(self.inner.read().by_payment(payment_id).cloned())
    }

    async fn attach_payment(&self, order_id: i64, payment_id: &str) -> SplitResult<()> {
        let mut store = self.inner.write();
        if let Some(record) = store.records.get_mut(&order_id) {
            record.payment_id = Some(payment_id.to_string());
            record.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn update_status(
        &self,
        payment_id: &str,
        from: &[SplitStatus],
        to: SplitStatus,
    ) -> SplitResult<bool> {
        let mut store = self.inner.write();
        match store.by_payment_mut(payment_id) {
            Some(record) if from.contains(&record.status) => {
                record.status = to;
                record.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_wallet_settled(
        &self,
        payment_id: &str,
        wallet_id: &str,
    ) -> SplitResult<Option<SplitRecord>> {
        let mut store = self.inner.write();
        match store.by_payment_mut(payment_id) {
            Some(record) => {
                if !record.is_wallet_settled(wallet_id) {
                    record.settled_wallets.push(wallet_id.to_string());
                    record.updated_at = Utc::now();
                }
                Ok(Some(record.clone()))
            }
            None => Ok(None),
        }
    }

    async fn record_history(
        &self,
        order_id: i64,
        payment_id: &str,
        status: SplitStatus,
        split_data: Option<&[Share]>,
        total_amount: Decimal,
        marketplace_commission: Decimal,
        affiliate_commission: Option<Decimal>,
    ) -> SplitResult<()> {
        self.inner.write().history.push(SplitHistoryEntry {
            id: Uuid::new_v4(),
            order_id,
            payment_id: payment_id.to_string(),
            status,
            split_data: split_data.map(|s| s.to_vec()),
            total_amount,
            marketplace_commission,
            affiliate_commission,
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn history_for_payment(
        &self,
        payment_id: &str,
    ) -> SplitResult<Vec<SplitHistoryEntry>> {
        Ok(self
            .inner
            .read()
            .history
            .iter()
            .filter(|e| e.payment_id == payment_id)
            .cloned()
            .collect())
    }

    async fn clear_record(&self, order_id: i64) -> SplitResult<()> {
        self.inner.write().records.remove(&order_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::split_engine::models::ShareRole;
    use rust_decimal_macros::dec;

    fn new_record(order_id: i64, payment_id: Option<&str>) -> NewSplitRecord {
        NewSplitRecord {
            order_id,
            payment_id: payment_id.map(String::from),
            shares: vec![
                Share::new("w1", dec!(60.00), ShareRole::Marketplace),
                Share::new("w2", dec!(40.00), ShareRole::Producer),
            ],
            total_amount: dec!(100.00),
            marketplace_commission: dec!(10.00),
            affiliate_commission: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_lookup() {
        let ledger = MemorySplitLedger::new();
        let created = ledger.create_record(new_record(1, Some("pay_1"))).await.unwrap();
        assert_eq!(created.status, SplitStatus::Pending);

        let by_order = ledger.get_by_order(1).await.unwrap().unwrap();
        assert_eq!(by_order.id, created.id);
        let by_payment = ledger.get_by_payment("pay_1").await.unwrap().unwrap();
        assert_eq!(by_payment.id, created.id);
        assert!(ledger.get_by_payment("other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_attach_payment_links_record() {
        let ledger = MemorySplitLedger::new();
        ledger.create_record(new_record(1, None)).await.unwrap();
        assert!(ledger.get_by_payment("pay_9").await.unwrap().is_none());

        ledger.attach_payment(1, "pay_9").await.unwrap();
        assert!(ledger.get_by_payment("pay_9").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_update_status_is_guarded() {
        let ledger = MemorySplitLedger::new();
        ledger.create_record(new_record(1, Some("pay_1"))).await.unwrap();

        let ok = ledger
            .update_status("pay_1", &[SplitStatus::Pending], SplitStatus::Processing)
            .await
            .unwrap();
        assert!(ok);

        // Same guard again: current status no longer matches
        let again = ledger
            .update_status("pay_1", &[SplitStatus::Pending], SplitStatus::Processing)
            .await
            .unwrap();
        assert!(!again);

        let record = ledger.get_by_payment("pay_1").await.unwrap().unwrap();
        assert_eq!(record.status, SplitStatus::Processing);
    }

    #[tokio::test]
    async fn test_mark_wallet_settled_is_idempotent() {
        let ledger = MemorySplitLedger::new();
        ledger.create_record(new_record(1, Some("pay_1"))).await.unwrap();

        let first = ledger.mark_wallet_settled("pay_1", "w1").await.unwrap().unwrap();
        assert_eq!(first.settled_wallets, vec!["w1"]);

        let replay = ledger.mark_wallet_settled("pay_1", "w1").await.unwrap().unwrap();
        assert_eq!(replay.settled_wallets, vec!["w1"]);

        let second = ledger.mark_wallet_settled("pay_1", "w2").await.unwrap().unwrap();
        assert!(second.is_fully_settled());
    }

    #[tokio::test]
    async fn test_history_is_append_only_per_payment() {
        let ledger = MemorySplitLedger::new();
        ledger
            .record_history(1, "pay_1", SplitStatus::Pending, None, dec!(100.00), dec!(10.00), None)
            .await
            .unwrap();
        ledger
            .record_history(1, "pay_1", SplitStatus::Processing, None, dec!(100.00), dec!(10.00), None)
            .await
            .unwrap();
        ledger
            .record_history(2, "pay_2", SplitStatus::Pending, None, dec!(50.00), dec!(5.00), None)
            .await
            .unwrap();

        let history = ledger.history_for_payment("pay_1").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].status, SplitStatus::Pending);
        assert_eq!(history[1].status, SplitStatus::Processing);
    }

    #[tokio::test]
    async fn test_clear_record_removes_row() {
        let ledger = MemorySplitLedger::new();
        ledger.create_record(new_record(1, Some("pay_1"))).await.unwrap();
        ledger.clear_record(1).await.unwrap();
        assert!(ledger.get_by_order(1).await.unwrap().is_none());
    }
}
