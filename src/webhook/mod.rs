pub mod events;
pub mod handler;

pub use events::ProcessorEvent;
pub use handler::SplitWebhookHandler;
