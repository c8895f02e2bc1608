pub mod monthly_log;
pub mod writer;

pub use monthly_log::{hour_stamp, MonthlyLog, MonthlyLogEntry, TOP_MOVIES_PER_WRITE};
pub use writer::{format_last_updated, SnapshotWriter, TrackedStore};
