//! Dynamic payment split engine for marketplace orders.
//!
//! Allocates an order's total across the marketplace operator, an optional
//! referring affiliate and the producing vendors, hands the resulting share
//! payload to the payment processor, and reconciles the split as transfer
//! confirmations arrive. Orders, payee lookups and commission settings live
//! in external systems reached through the [`orders::OrderStore`],
//! [`directory::PayeeDirectory`] and [`config::ConfigStore`] boundaries.

pub mod config;
pub mod directory;
pub mod error;
pub mod ledger;
pub mod orders;
pub mod split_engine;
pub mod webhook;

pub use config::{AffiliateCommissionMode, ConfigStore, SplitSettings};
pub use error::{SplitError, SplitResult};
pub use ledger::{MemorySplitLedger, PgSplitLedger, SplitLedger, SplitRecord, SplitStatus};
pub use split_engine::{ComputedSplit, PaymentSplitService, Share, ShareRole, SplitEngine, WireShare};
pub use webhook::{ProcessorEvent, SplitWebhookHandler};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize logging and tracing
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,marketsplit=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
