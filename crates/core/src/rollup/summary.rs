use serde::{Deserialize, Serialize};

/// Per-(city, state) slice of a movie's rollup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CityDetail {
    pub city: String,
    pub state: String,
    pub venues: u32,
    pub shows: u32,
    pub gross: f64,
    pub sold: u64,
    pub total_seats: u64,
    pub fastfilling: u32,
    pub housefull: u32,
    pub occupancy: f64,
}

/// Per-exhibitor-chain slice of a movie's rollup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainDetail {
    pub chain: String,
    pub venues: u32,
    pub shows: u32,
    pub gross: f64,
    pub sold: u64,
    pub total_seats: u64,
    pub fastfilling: u32,
    pub housefull: u32,
    pub occupancy: f64,
}

/// Movie-level rollup. Purely derived from the ledger; never mutated
/// independently, always fully recomputable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieSummary {
    pub shows: u32,
    pub gross: f64,
    pub sold: u64,
    pub total_seats: u64,
    pub venues: u32,
    pub cities: u32,
    pub fastfilling: u32,
    pub housefull: u32,
    pub occupancy: f64,
    pub details: Vec<CityDetail>,
    #[serde(rename = "Chain_details")]
    pub chain_details: Vec<ChainDetail>,
}
