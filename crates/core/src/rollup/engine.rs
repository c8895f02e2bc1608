use std::collections::{BTreeMap, BTreeSet};

use crate::ledger::{MovieKey, ShowLedger, ShowRecord};

use super::summary::{ChainDetail, CityDetail, MovieSummary};

/// Occupancy band thresholds, in percent. Boundaries are inclusive:
/// exactly 50.00 is fastfilling, exactly 98.00 is housefull.
pub const FASTFILLING_MIN: f64 = 50.0;
pub const HOUSEFULL_MIN: f64 = 98.0;

/// Round to 2 decimal places. Applied only when producing output
/// values, never during accumulation, so repeated rebuilds cannot
/// compound rounding error.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn classify(occupancy: f64) -> (u32, u32) {
    if occupancy >= HOUSEFULL_MIN {
        (0, 1)
    } else if occupancy >= FASTFILLING_MIN {
        (1, 0)
    } else {
        (0, 0)
    }
}

#[derive(Default)]
struct Counters {
    shows: u32,
    gross: f64,
    sold: u64,
    total_seats: u64,
    fastfilling: u32,
    housefull: u32,
    venues: BTreeSet<String>,
}

impl Counters {
    fn add(&mut self, record: &ShowRecord) {
        let (fastfilling, housefull) = classify(record.occupancy());
        self.shows += 1;
        self.gross += record.gross;
        self.sold += u64::from(record.sold);
        self.total_seats += u64::from(record.total_seats);
        self.fastfilling += fastfilling;
        self.housefull += housefull;
        self.venues.insert(record.venue.clone());
    }

    fn occupancy(&self) -> f64 {
        if self.total_seats == 0 {
            0.0
        } else {
            self.sold as f64 / self.total_seats as f64 * 100.0
        }
    }
}

/// Recomputes movie/city/chain summaries from a ledger snapshot.
/// Pure: the same ledger always yields identical output.
pub struct RollupEngine;

impl RollupEngine {
    pub fn rebuild(ledger: &ShowLedger) -> BTreeMap<MovieKey, MovieSummary> {
        ledger
            .iter()
            .map(|(key, records)| (key.clone(), Self::summarize(records)))
            .collect()
    }

    /// Explicit ranking for externally visible "top N" views: stable
    /// sort, descending by gross, ties broken by movie label ascending.
    pub fn top_by_gross<'a>(
        summaries: &'a BTreeMap<MovieKey, MovieSummary>,
        n: usize,
    ) -> Vec<(&'a MovieKey, &'a MovieSummary)> {
        let mut ranked: Vec<_> = summaries.iter().collect();
        ranked.sort_by(|(a_key, a), (b_key, b)| {
            b.gross
                .partial_cmp(&a.gross)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a_key.label().cmp(&b_key.label()))
        });
        ranked.truncate(n);
        ranked
    }

    fn summarize(records: &[ShowRecord]) -> MovieSummary {
        // Primary pass: movie-level accumulation.
        let mut movie = Counters::default();
        let mut cities = BTreeSet::new();
        for record in records {
            movie.add(record);
            cities.insert(record.city.clone());
        }

        // Secondary pass: the same record set re-scanned, grouped by
        // (city, state) and by chain.
        let mut by_city: BTreeMap<(String, String), Counters> = BTreeMap::new();
        let mut by_chain: BTreeMap<String, Counters> = BTreeMap::new();
        for record in records {
            by_city
                .entry((record.city.clone(), record.state.clone()))
                .or_default()
                .add(record);
            by_chain
                .entry(record.chain.clone().unwrap_or_else(|| "Unknown".to_string()))
                .or_default()
                .add(record);
        }

        let details = by_city
            .into_iter()
            .map(|((city, state), c)| CityDetail {
                city,
                state,
                venues: c.venues.len() as u32,
                shows: c.shows,
                gross: c.gross,
                sold: c.sold,
                total_seats: c.total_seats,
                fastfilling: c.fastfilling,
                housefull: c.housefull,
                occupancy: round2(c.occupancy()),
            })
            .collect();

        let chain_details = by_chain
            .into_iter()
            .map(|(chain, c)| ChainDetail {
                chain,
                venues: c.venues.len() as u32,
                shows: c.shows,
                gross: c.gross,
                sold: c.sold,
                total_seats: c.total_seats,
                fastfilling: c.fastfilling,
                housefull: c.housefull,
                occupancy: round2(c.occupancy()),
            })
            .collect();

        MovieSummary {
            shows: movie.shows,
            gross: movie.gross,
            sold: movie.sold,
            total_seats: movie.total_seats,
            venues: movie.venues.len() as u32,
            cities: cities.len() as u32,
            fastfilling: movie.fastfilling,
            housefull: movie.housefull,
            occupancy: round2(movie.occupancy()),
            details,
            chain_details,
        }
    }
}
