pub mod ledger;
pub mod record;

pub use ledger::{MergeStrategy, ShowLedger, UpsertOutcome};
pub use record::{MovieKey, ShowRecord};
