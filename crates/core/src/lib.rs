pub use config::{ConfigError, ConfigFile, ConfigManager, TrackedMovie, TrackerConfig};
pub use cutoff::{CutoffFilter, CutoffMode};
pub use ledger::{MergeStrategy, MovieKey, ShowLedger, ShowRecord, UpsertOutcome};
pub use provider::{
    format_region_label, PricedArea, ProviderResponse, SessionObservation, SessionProvider,
    VenueDirectory, VenueInfo,
};
pub use rollup::{
    round2, ChainDetail, CityDetail, MovieSummary, RollupEngine, FASTFILLING_MIN, HOUSEFULL_MIN,
};
pub use snapshot::{
    format_last_updated, hour_stamp, MonthlyLog, MonthlyLogEntry, SnapshotWriter, TrackedStore,
    TOP_MOVIES_PER_WRITE,
};
pub use tracker::{RunReport, Tracker};
pub use vault::{EncryptedPayload, KeyRecord, KeyVault, VaultError};

mod config;
mod cutoff;
mod ledger;
pub mod provider;
mod rollup;
mod snapshot;
mod tracker;
pub mod vault;
