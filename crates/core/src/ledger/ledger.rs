use std::collections::BTreeMap;

use super::record::{MovieKey, ShowRecord};

/// How an incoming record is reconciled against one already stored for
/// the same (venue, time, audi) identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    /// Unconditionally replace. Used within a single run, where the most
    /// recent observation of a show is the freshest.
    LatestWins,
    /// Replace only if the incoming record improves gross or sold. Used
    /// when merging a run against persisted history, so a stale response
    /// delivered out of order can never make the numbers go backwards.
    MonotonicMax,
}

/// What `upsert` did with the incoming record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Replaced,
    Kept,
}

/// Keyed store of show records per movie scope. Entries accumulate and
/// are never removed; distinct shows persist across runs.
///
/// This is a plain value. Concurrent writers must serialize their
/// upserts (the tracker funnels observations through a single channel
/// consumer).
#[derive(Debug, Clone, Default)]
pub struct ShowLedger {
    shows: BTreeMap<MovieKey, Vec<ShowRecord>>,
}

impl ShowLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or reconcile one record under the given strategy.
    /// Applying an identical record twice is a no-op either way.
    pub fn upsert(
        &mut self,
        key: &MovieKey,
        record: ShowRecord,
        strategy: MergeStrategy,
    ) -> UpsertOutcome {
        let records = self.shows.entry(key.clone()).or_default();

        match records.iter().position(|r| r.same_show(&record)) {
            Some(idx) => {
                let existing = &records[idx];
                let replace = match strategy {
                    MergeStrategy::LatestWins => true,
                    MergeStrategy::MonotonicMax => {
                        record.gross > existing.gross || record.sold > existing.sold
                    }
                };
                if replace && *existing != record {
                    records[idx] = record;
                    UpsertOutcome::Replaced
                } else {
                    UpsertOutcome::Kept
                }
            }
            None => {
                records.push(record);
                UpsertOutcome::Inserted
            }
        }
    }

    /// Merge every record of `other` into this ledger.
    pub fn merge_from(&mut self, other: &ShowLedger, strategy: MergeStrategy) {
        for (key, records) in other.iter() {
            for record in records {
                self.upsert(key, record.clone(), strategy);
            }
        }
    }

    /// Seed a movie's records wholesale (used when loading persisted
    /// history, where the stored set is already deduplicated).
    pub fn seed(&mut self, key: MovieKey, records: Vec<ShowRecord>) {
        self.shows.entry(key).or_default().extend(records);
    }

    pub fn records(&self, key: &MovieKey) -> &[ShowRecord] {
        self.shows.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MovieKey, &[ShowRecord])> {
        self.shows.iter().map(|(k, v)| (k, v.as_slice()))
    }

    pub fn movies(&self) -> impl Iterator<Item = &MovieKey> {
        self.shows.keys()
    }

    pub fn movie_count(&self) -> usize {
        self.shows.len()
    }

    pub fn show_count(&self) -> usize {
        self.shows.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.shows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> MovieKey {
        MovieKey::new("Movie A", "hindi")
    }

    fn record(sold: u32, gross: f64) -> ShowRecord {
        ShowRecord {
            city: "Pune".to_string(),
            state: "Maharashtra".to_string(),
            venue: "City Pride".to_string(),
            address: None,
            chain: Some("Pvr".to_string()),
            time: "09:00 PM".to_string(),
            audi: "Screen 1".to_string(),
            total_seats: 200,
            available: 200 - sold,
            sold,
            gross,
            mins_left: 30,
        }
    }

    #[test]
    fn upsert_inserts_new_identity() {
        let mut ledger = ShowLedger::new();
        let outcome = ledger.upsert(&key(), record(10, 1500.0), MergeStrategy::LatestWins);
        assert_eq!(outcome, UpsertOutcome::Inserted);
        assert_eq!(ledger.records(&key()).len(), 1);
    }

    #[test]
    fn identical_record_is_idempotent_under_both_strategies() {
        for strategy in [MergeStrategy::LatestWins, MergeStrategy::MonotonicMax] {
            let mut ledger = ShowLedger::new();
            ledger.upsert(&key(), record(10, 1500.0), strategy);
            let snapshot = ledger.clone();

            let outcome = ledger.upsert(&key(), record(10, 1500.0), strategy);
            assert_eq!(outcome, UpsertOutcome::Kept);
            assert_eq!(ledger.records(&key()), snapshot.records(&key()));
        }
    }

    #[test]
    fn latest_wins_replaces_even_with_worse_numbers() {
        let mut ledger = ShowLedger::new();
        ledger.upsert(&key(), record(50, 9000.0), MergeStrategy::LatestWins);
        let outcome = ledger.upsert(&key(), record(10, 1500.0), MergeStrategy::LatestWins);
        assert_eq!(outcome, UpsertOutcome::Replaced);
        assert_eq!(ledger.records(&key())[0].sold, 10);
    }

    #[test]
    fn monotonic_max_keeps_better_existing_record() {
        let mut ledger = ShowLedger::new();
        ledger.upsert(&key(), record(50, 9000.0), MergeStrategy::MonotonicMax);
        let outcome = ledger.upsert(&key(), record(10, 1500.0), MergeStrategy::MonotonicMax);
        assert_eq!(outcome, UpsertOutcome::Kept);

        let merged = &ledger.records(&key())[0];
        assert_eq!(merged.sold, 50);
        assert_eq!(merged.gross, 9000.0);
    }

    #[test]
    fn monotonic_max_adopts_improvement_on_either_axis() {
        let mut ledger = ShowLedger::new();
        ledger.upsert(&key(), record(50, 9000.0), MergeStrategy::MonotonicMax);

        // Same sold, higher gross.
        let mut better = record(50, 9500.0);
        better.available = 150;
        let outcome = ledger.upsert(&key(), better, MergeStrategy::MonotonicMax);
        assert_eq!(outcome, UpsertOutcome::Replaced);

        let merged = &ledger.records(&key())[0];
        assert!(merged.gross >= 9000.0 && merged.sold >= 50);
    }

    #[test]
    fn ledger_never_drops_distinct_shows() {
        let mut ledger = ShowLedger::new();
        ledger.upsert(&key(), record(10, 1500.0), MergeStrategy::LatestWins);

        let mut evening = record(20, 3000.0);
        evening.time = "11:30 PM".to_string();
        ledger.upsert(&key(), evening, MergeStrategy::LatestWins);

        let mut other_venue = record(5, 700.0);
        other_venue.venue = "Inox Bund Garden".to_string();
        ledger.upsert(&key(), other_venue, MergeStrategy::MonotonicMax);

        assert_eq!(ledger.show_count(), 3);
    }

    #[test]
    fn distinct_movie_keys_never_share_records() {
        let mut ledger = ShowLedger::new();
        let tamil = MovieKey::new("Movie A", "tamil");
        ledger.upsert(&key(), record(10, 1500.0), MergeStrategy::LatestWins);
        ledger.upsert(&tamil, record(10, 1500.0), MergeStrategy::LatestWins);

        assert_eq!(ledger.movie_count(), 2);
        assert_eq!(ledger.records(&key()).len(), 1);
        assert_eq!(ledger.records(&tamil).len(), 1);
    }
}
