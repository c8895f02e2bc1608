use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::ledger::MovieKey;
use crate::rollup::{round2, MovieSummary, RollupEngine};

/// Each write touches at most this many movies, ranked by gross.
pub const TOP_MOVIES_PER_WRITE: usize = 50;

/// One point-in-time entry in the monthly history log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyLogEntry {
    pub gross: f64,
    pub tickets: u64,
    pub occ: String,
    pub shows: u32,
}

/// Bounded historical log for one calendar month: movie label →
/// rounded-hour stamp → totals at that time. Repeated runs within the
/// same rounded hour overwrite their stamp instead of appending.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonthlyLog {
    entries: BTreeMap<String, BTreeMap<String, MonthlyLogEntry>>,
}

impl MonthlyLog {
    /// One log file per calendar month, named `MM-YYYY.json`.
    pub fn path_for(logs_dir: &Path, now: DateTime<Utc>) -> PathBuf {
        logs_dir.join(format!("{}.json", now.format("%m-%Y")))
    }

    /// Missing or malformed log files are a safe empty start.
    pub fn load(path: &Path) -> Self {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(_) => return Self::default(),
        };
        match serde_json::from_str(&content) {
            Ok(entries) => Self { entries },
            Err(e) => {
                log::warn!("Ignoring malformed monthly log {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&self.entries)?;
        fs::write(path, content)
            .with_context(|| format!("failed to write monthly log {}", path.display()))?;
        Ok(())
    }

    /// Record this run's top movies under the current rounded-hour
    /// stamp, overwriting an earlier run from the same hour.
    pub fn record(&mut self, now: DateTime<Utc>, summaries: &BTreeMap<MovieKey, MovieSummary>) {
        let stamp = hour_stamp(now);
        for (key, summary) in RollupEngine::top_by_gross(summaries, TOP_MOVIES_PER_WRITE) {
            self.entries.entry(key.label()).or_default().insert(
                stamp.clone(),
                MonthlyLogEntry {
                    gross: round2(summary.gross),
                    tickets: summary.sold,
                    occ: format!("{}%", summary.occupancy),
                    shows: summary.shows,
                },
            );
        }
    }

    pub fn movie(&self, label: &str) -> Option<&BTreeMap<String, MonthlyLogEntry>> {
        self.entries.get(label)
    }

    pub fn movie_count(&self) -> usize {
        self.entries.len()
    }
}

/// Ceiling-biased hour stamp, e.g. "8PM, 30/08/2026": minutes past the
/// hour > 45 take the next hour's label, otherwise the current hour
/// keeps it. The date part always comes from `now`, not the rounded
/// hour.
pub fn hour_stamp(now: DateTime<Utc>) -> String {
    let rounded = if now.minute() > 45 {
        now + Duration::hours(1)
    } else {
        now
    };
    format!("{}, {}", rounded.format("%-I%p"), now.format("%d/%m/%Y"))
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use crate::ledger::{MergeStrategy, ShowLedger, ShowRecord};

    use super::*;

    fn at(time: &str) -> DateTime<Utc> {
        format!("2026-08-30T{}Z", time).parse().unwrap()
    }

    fn summaries_for(movies: &[(&str, f64)]) -> BTreeMap<MovieKey, MovieSummary> {
        let mut ledger = ShowLedger::new();
        for (title, gross) in movies {
            let key = MovieKey::new(*title, "hindi");
            let record = ShowRecord {
                city: "Pune".to_string(),
                state: "Maharashtra".to_string(),
                venue: "V1".to_string(),
                address: None,
                chain: None,
                time: "08:00 PM".to_string(),
                audi: "A1".to_string(),
                total_seats: 100,
                available: 40,
                sold: 60,
                gross: *gross,
                mins_left: 10,
            };
            ledger.upsert(&key, record, MergeStrategy::LatestWins);
        }
        RollupEngine::rebuild(&ledger)
    }

    #[test]
    fn hour_rounding_is_ceiling_biased_past_45() {
        assert_eq!(hour_stamp(at("20:45:00")), "8PM, 30/08/2026");
        assert_eq!(hour_stamp(at("20:46:00")), "9PM, 30/08/2026");
        assert_eq!(hour_stamp(at("20:10:00")), "8PM, 30/08/2026");
        // Rolling past midnight keeps the current date label.
        assert_eq!(hour_stamp(at("23:50:00")), "12AM, 30/08/2026");
    }

    #[test]
    fn same_rounded_hour_overwrites_instead_of_appending() {
        let mut log = MonthlyLog::default();
        log.record(at("20:05:00"), &summaries_for(&[("Movie A", 1000.0)]));
        log.record(at("20:30:00"), &summaries_for(&[("Movie A", 2500.0)]));

        let points = log.movie("Movie A | hindi").unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points["8PM, 30/08/2026"].gross, 2500.0);

        log.record(at("21:00:00"), &summaries_for(&[("Movie A", 4000.0)]));
        assert_eq!(log.movie("Movie A | hindi").unwrap().len(), 2);
    }

    #[test]
    fn each_write_touches_at_most_the_top_fifty() {
        let movies: Vec<(String, f64)> = (0..60)
            .map(|i| (format!("Movie {:02}", i), f64::from(i) * 100.0))
            .collect();
        let refs: Vec<(&str, f64)> = movies.iter().map(|(t, g)| (t.as_str(), *g)).collect();

        let mut log = MonthlyLog::default();
        log.record(at("20:00:00"), &summaries_for(&refs));

        assert_eq!(log.movie_count(), TOP_MOVIES_PER_WRITE);
        // The lowest-grossing movies never made the log.
        assert!(log.movie("Movie 00 | hindi").is_none());
        assert!(log.movie("Movie 59 | hindi").is_some());
    }

    #[test]
    fn log_round_trips_and_tolerates_corruption() {
        let dir = TempDir::new().unwrap();
        let path = MonthlyLog::path_for(dir.path(), at("20:00:00"));
        assert_eq!(path.file_name().unwrap(), "08-2026.json");

        let mut log = MonthlyLog::default();
        log.record(at("20:00:00"), &summaries_for(&[("Movie A", 1000.0)]));
        log.save(&path).unwrap();
        assert_eq!(MonthlyLog::load(&path), log);

        fs::write(&path, "{ broken").unwrap();
        assert_eq!(MonthlyLog::load(&path), MonthlyLog::default());
    }
}
