pub mod engine;
pub mod summary;

pub use engine::{round2, RollupEngine, FASTFILLING_MIN, HOUSEFULL_MIN};
pub use summary::{ChainDetail, CityDetail, MovieSummary};
