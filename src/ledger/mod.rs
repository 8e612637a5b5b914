pub mod memory;
pub mod models;
pub mod repository;

pub use memory::MemorySplitLedger;
pub use models::{NewSplitRecord, SplitHistoryEntry, SplitRecord, SplitStatus};
pub use repository::{PgSplitLedger, SplitLedger};
