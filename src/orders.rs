use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::SplitResult;

/// One line item of an order, as supplied by the order store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
}

/// Order snapshot consumed by the split calculation. Orders live in an
/// external store; the engine only reads item totals, shipping and the
/// recurring flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub items: Vec<OrderItem>,
    #[serde(with = "rust_decimal::serde::float")]
    pub shipping_total: Decimal,
    /// Recurring/subscription orders are not eligible for dynamic split.
    #[serde(default)]
    pub recurring: bool,
}

impl Order {
    pub fn total(&self) -> Decimal {
        self.items.iter().map(|i| i.total).sum::<Decimal>() + self.shipping_total
    }
}

/// External order store boundary. The split core only writes human-readable
/// audit notes back to the order for operator visibility.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn append_order_note(&self, order_id: i64, note: &str) -> SplitResult<()>;
}

/// Order store that keeps notes in memory, for tests and local runs.
#[derive(Default)]
pub struct MemoryOrderStore {
    notes: Mutex<HashMap<i64, Vec<String>>>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notes_for(&self, order_id: i64) -> Vec<String> {
        self.notes
            .lock()
            .get(&order_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn append_order_note(&self, order_id: i64, note: &str) -> SplitResult<()> {
        self.notes
            .lock()
            .entry(order_id)
            .or_default()
            .push(note.to_string());
        Ok(())
    }
}
