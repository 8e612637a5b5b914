use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Processor notification, tagged by the `event` field of the delivered
/// payload. Every event carries the processor's payment identifier; transfer
/// events additionally carry the destination wallet and amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProcessorEvent {
    #[serde(rename_all = "camelCase")]
    PaymentReceived { payment_id: String },
    #[serde(rename_all = "camelCase")]
    PaymentConfirmed { payment_id: String },
    #[serde(rename_all = "camelCase")]
    PaymentRefunded { payment_id: String },
    #[serde(rename_all = "camelCase")]
    TransferReceived {
        payment_id: String,
        wallet_id: String,
        #[serde(with = "rust_decimal::serde::float")]
        value: Decimal,
    },
    #[serde(rename_all = "camelCase")]
    TransferFailed {
        payment_id: String,
        wallet_id: String,
        error: String,
    },
}

impl ProcessorEvent {
    pub fn payment_id(&self) -> &str {
        match self {
            ProcessorEvent::PaymentReceived { payment_id }
            | ProcessorEvent::PaymentConfirmed { payment_id }
            | ProcessorEvent::PaymentRefunded { payment_id }
            | ProcessorEvent::TransferReceived { payment_id, .. }
            | ProcessorEvent::TransferFailed { payment_id, .. } => payment_id,
        }
    }
}
