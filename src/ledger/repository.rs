use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::types::BigDecimal;
use sqlx::{PgPool, Row};
use std::str::FromStr;
use tracing::info;
use uuid::Uuid;

use crate::error::{SplitError, SplitResult};
use crate::split_engine::models::Share;

use super::models::{NewSplitRecord, SplitHistoryEntry, SplitRecord, SplitStatus};

/// Persistence facade for split records. One record per order, an
/// append-only history keyed by payment id, and atomic per-record updates:
/// `update_status` is a compare-and-set and `mark_wallet_settled` a
/// transactional read-modify-write, so concurrently delivered processor
/// events can never produce a flickering status.
#[async_trait]
pub trait SplitLedger: Send + Sync {
    async fn create_record(&self, record: NewSplitRecord) -> SplitResult<SplitRecord>;

    async fn get_by_order(&self, order_id: i64) -> SplitResult<Option<SplitRecord>>;

    async fn get_by_payment(&self, payment_id: &str) -> SplitResult<Option<SplitRecord>>;

    /// Record the processor's payment id once the payment is accepted.
    async fn attach_payment(&self, order_id: i64, payment_id: &str) -> SplitResult<()>;

    /// Guarded status update: applied only when the current status is one of
    /// `from`. Returns whether a row transitioned.
    async fn update_status(
        &self,
        payment_id: &str,
        from: &[SplitStatus],
        to: SplitStatus,
    ) -> SplitResult<bool>;

    /// Add `wallet_id` to the record's settled set, idempotently, and return
    /// the updated record. `None` when no record exists for the payment.
    async fn mark_wallet_settled(
        &self,
        payment_id: &str,
        wallet_id: &str,
    ) -> SplitResult<Option<SplitRecord>>;

    async fn record_history(
        &self,
        order_id: i64,
        payment_id: &str,
        status: SplitStatus,
        split_data: Option<&[Share]>,
        total_amount: Decimal,
        marketplace_commission: Decimal,
        affiliate_commission: Option<Decimal>,
    ) -> SplitResult<()>;

    async fn history_for_payment(&self, payment_id: &str)
        -> SplitResult<Vec<SplitHistoryEntry>>;

    /// Administrative clearing; the only path that removes a record.
    async fn clear_record(&self, order_id: i64) -> SplitResult<()>;
}

/// Postgres-backed split ledger.
pub struct PgSplitLedger {
    pub pool: PgPool,
}

impl PgSplitLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn record_from_row(row: &sqlx::postgres::PgRow) -> SplitResult<SplitRecord> {
        let split_data: String = row.try_get("split_data")?;
        let settled_wallets: String = row.try_get("settled_wallets")?;
        let status: String = row.try_get("status")?;

        Ok(SplitRecord {
            id: row.try_get("id")?,
            order_id: row.try_get("order_id")?,
            payment_id: row.try_get("payment_id")?,
            shares: serde_json::from_str(&split_data)?,
            status: SplitStatus::parse(&status),
            total_amount: decimal_from_db(row.try_get("total_amount")?)?,
            marketplace_commission: decimal_from_db(row.try_get("marketplace_commission")?)?,
            affiliate_commission: row
                .try_get::<Option<BigDecimal>, _>("affiliate_commission")?
                .map(decimal_from_db)
                .transpose()?,
            settled_wallets: serde_json::from_str(&settled_wallets)?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

fn numeric(value: Decimal) -> BigDecimal {
    // A Decimal's string form is always a valid NUMERIC literal
    BigDecimal::from_str(&value.to_string()).unwrap_or_default()
}

fn decimal_from_db(value: BigDecimal) -> SplitResult<Decimal> {
    Decimal::from_str(&value.to_string())
        .map_err(|e| SplitError::Internal(format!("Invalid amount in ledger row: {}", e)))
}

#[async_trait]
impl SplitLedger for PgSplitLedger {
    async fn create_record(&self, record: NewSplitRecord) -> SplitResult<SplitRecord> {
        let now = Utc::now();
        let row = sqlx::query(
            r#"
            INSERT INTO split_records (
                id, order_id, payment_id, split_data, status, total_amount,
                marketplace_commission, affiliate_commission, settled_wallets,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id, order_id, payment_id, split_data, status, total_amount,
                      marketplace_commission, affiliate_commission, settled_wallets,
                      created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(record.order_id)
        .bind(&record.payment_id)
        .bind(serde_json::to_string(&record.shares)?)
        .bind(SplitStatus::Pending.as_str())
        .bind(numeric(record.total_amount))
        .bind(numeric(record.marketplace_commission))
        .bind(record.affiliate_commission.map(numeric))
        .bind(serde_json::to_string(&Vec::<String>::new())?)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        info!("✓ Split record created for order {}", record.order_id);
        Self::record_from_row(&row)
    }

    async fn get_by_order(&self, order_id: i64) -> SplitResult<Option<SplitRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, order_id, payment_id, split_data, status, total_amount,
                   marketplace_commission, affiliate_commission, settled_wallets,
                   created_at, updated_at
            FROM split_records
            WHERE order_id = $1
            "#,
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| Self::record_from_row(&r)).transpose()
    }

    async fn get_by_payment(&self, payment_id: &str) -> SplitResult<Option<SplitRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, order_id, payment_id, split_data, status, total_amount,
                   marketplace_commission, affiliate_commission, settled_wallets,
                   created_at, updated_at
            FROM split_records
            WHERE payment_id = $1
            "#,
        )
        .bind(payment_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| Self::record_from_row(&r)).transpose()
    }

    async fn attach_payment(&self, order_id: i64, payment_id: &str) -> SplitResult<()> {
        sqlx::query(
            r#"
            UPDATE split_records
            SET payment_id = $2, updated_at = $3
            WHERE order_id = $1
            "#,
        )
        .bind(order_id)
        .bind(payment_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_status(
        &self,
        payment_id: &str,
        from: &[SplitStatus],
        to: SplitStatus,
    ) -> SplitResult<bool> {
        let from_values: Vec<String> = from.iter().map(|s| s.as_str().to_string()).collect();

        let result = sqlx::query(
            r#"
            UPDATE split_records
            SET status = $2, updated_at = $3
            WHERE payment_id = $1 AND status = ANY($4)
            "#,
        )
        .bind(payment_id)
        .bind(to.as_str())
        .bind(Utc::now())
        .bind(&from_values)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_wallet_settled(
        &self,
        payment_id: &str,
        wallet_id: &str,
    ) -> SplitResult<Option<SplitRecord>> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            SELECT id, order_id, payment_id, split_data, status, total_amount,
                   marketplace_commission, affiliate_commission, settled_wallets,
                   created_at, updated_at
            FROM split_records
            WHERE payment_id = $1
            FOR UPDATE
            "#,
        )
        .bind(payment_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(None);
        };

        let mut record = Self::record_from_row(&row)?;
        if !record.is_wallet_settled(wallet_id) {
            record.settled_wallets.push(wallet_id.to_string());
            record.updated_at = Utc::now();

            sqlx::query(
                r#"
                UPDATE split_records
                SET settled_wallets = $2, updated_at = $3
                WHERE payment_id = $1
                "#,
            )
            .bind(payment_id)
            .bind(serde_json::to_string(&record.settled_wallets)?)
            .bind(record.updated_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(Some(record))
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
        sqlx::query(
            r#"
            INSERT INTO split_history (
                id, order_id, payment_id, status, split_data, total_amount,
                marketplace_commission, affiliate_commission, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(order_id)
        .bind(payment_id)
        .bind(status.as_str())
        .bind(split_data.map(serde_json::to_string).transpose()?)
        .bind(numeric(total_amount))
        .bind(numeric(marketplace_commission))
        .bind(affiliate_commission.map(numeric))
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn history_for_payment(
        &self,
        payment_id: &str,
    ) -> SplitResult<Vec<SplitHistoryEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, order_id, payment_id, status, split_data, total_amount,
                   marketplace_commission, affiliate_commission, created_at
            FROM split_history
            WHERE payment_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(payment_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let status: String = row.try_get("status")?;
                let split_data: Option<String> = row.try_get("split_data")?;
                Ok(SplitHistoryEntry {
                    id: row.try_get("id")?,
                    order_id: row.try_get("order_id")?,
                    payment_id: row.try_get("payment_id")?,
                    status: SplitStatus::parse(&status),
                    split_data: split_data
                        .as_deref()
                        .map(serde_json::from_str)
                        .transpose()?,
                    total_amount: decimal_from_db(row.try_get("total_amount")?)?,
                    marketplace_commission: decimal_from_db(
                        row.try_get("marketplace_commission")?,
                    )?,
                    affiliate_commission: row
                        .try_get::<Option<BigDecimal>, _>("affiliate_commission")?
                        .map(decimal_from_db)
                        .transpose()?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }

    async fn clear_record(&self, order_id: i64) -> SplitResult<()> {
        sqlx::query("DELETE FROM split_records WHERE order_id = $1")
            .bind(order_id)
            .execute(&self.pool)
            .await?;

        info!("Split record cleared for order {}", order_id);
        Ok(())
    }
}
