use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ledger::{MovieKey, ShowLedger, ShowRecord};
use crate::rollup::MovieSummary;
use crate::vault::KeyVault;

/// `lastUpdated` metadata value, e.g. "10:05 AM, 30 August 2026".
pub fn format_last_updated(now: DateTime<Utc>) -> String {
    now.format("%I:%M %p, %d %B %Y").to_string()
}

/// Persisted shape of one encrypted per-(movie, date) store file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedStore {
    pub date: NaiveDate,
    pub last_updated: String,
    pub venues: Vec<ShowRecord>,
}

/// Persists the per-run artifacts: a dated summary file, a dated
/// detailed file, and the encrypted per-movie tracked stores. Every
/// artifact carries a `{date, lastUpdated}` envelope alongside the
/// keyed payload.
pub struct SnapshotWriter {
    out_dir: PathBuf,
}

impl SnapshotWriter {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }

    pub fn summary_path(&self, date: NaiveDate) -> PathBuf {
        self.out_dir.join(format!("{}.json", date))
    }

    pub fn detailed_path(&self, date: NaiveDate) -> PathBuf {
        self.out_dir.join(format!("{}_Detailed.json", date))
    }

    /// Load the persisted detailed file back into a ledger. Missing or
    /// malformed files are a safe empty start, never an error.
    pub fn load_detailed(&self, date: NaiveDate) -> ShowLedger {
        let path = self.detailed_path(date);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(_) => return ShowLedger::new(),
        };

        let value: Value = match serde_json::from_str(&content) {
            Ok(value) => value,
            Err(e) => {
                log::warn!(
                    "Ignoring malformed detailed file {}: {}",
                    path.display(),
                    e
                );
                return ShowLedger::new();
            }
        };

        ledger_from_value(value)
    }

    pub fn write_summary(
        &self,
        date: NaiveDate,
        now: DateTime<Utc>,
        summaries: &BTreeMap<MovieKey, MovieSummary>,
    ) -> Result<()> {
        let mut payload = envelope(date, now);
        for (key, summary) in summaries {
            payload.insert(key.label(), serde_json::to_value(summary)?);
        }
        self.write_json(&self.summary_path(date), &payload)
    }

    pub fn write_detailed(
        &self,
        date: NaiveDate,
        now: DateTime<Utc>,
        ledger: &ShowLedger,
    ) -> Result<()> {
        let mut payload = envelope(date, now);
        for (key, records) in ledger.iter() {
            payload.insert(key.label(), serde_json::to_value(records)?);
        }
        self.write_json(&self.detailed_path(date), &payload)
    }

    fn write_json(&self, path: &Path, payload: &Map<String, Value>) -> Result<()> {
        fs::create_dir_all(&self.out_dir)?;
        let file = File::create(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        serde_json::to_writer_pretty(file, payload)?;
        Ok(())
    }

    /// Path of the encrypted store file for one (movie, date).
    pub fn tracked_path(vault: &KeyVault, date: NaiveDate, key: &MovieKey) -> PathBuf {
        vault
            .store_dir()
            .join(date.to_string())
            .join(format!("{}.json", slug(&key.label())))
    }

    /// Decrypt the tracked store for one (movie, date). A missing file
    /// is a first run; an undecryptable one is logged and treated as
    /// empty here — only key rotation treats that as fatal.
    pub fn load_tracked(vault: &KeyVault, date: NaiveDate, key: &MovieKey) -> Vec<ShowRecord> {
        let path = Self::tracked_path(vault, date, key);
        if !path.exists() {
            return Vec::new();
        }

        match vault
            .decrypt_file(&path)
            .and_then(|plaintext| {
                serde_json::from_slice::<TrackedStore>(&plaintext)
                    .map_err(|e| crate::vault::VaultError::Parse(e.to_string()))
            }) {
            Ok(store) => store.venues,
            Err(e) => {
                log::warn!(
                    "Failed to open tracked store {}: {}",
                    path.display(),
                    e
                );
                Vec::new()
            }
        }
    }

    /// Encrypt and persist the tracked store for one (movie, date).
    pub fn write_tracked(
        vault: &KeyVault,
        date: NaiveDate,
        key: &MovieKey,
        now: DateTime<Utc>,
        records: &[ShowRecord],
    ) -> Result<()> {
        let store = TrackedStore {
            date,
            last_updated: format_last_updated(now),
            venues: records.to_vec(),
        };
        let plaintext = serde_json::to_vec(&store)?;
        let path = Self::tracked_path(vault, date, key);
        vault
            .encrypt_to_file(&path, &plaintext)
            .with_context(|| format!("failed to write tracked store {}", path.display()))?;
        Ok(())
    }
}

fn envelope(date: NaiveDate, now: DateTime<Utc>) -> Map<String, Value> {
    let mut payload = Map::new();
    payload.insert("date".to_string(), Value::String(date.to_string()));
    payload.insert(
        "lastUpdated".to_string(),
        Value::String(format_last_updated(now)),
    );
    payload
}

fn ledger_from_value(value: Value) -> ShowLedger {
    let mut ledger = ShowLedger::new();
    let Value::Object(map) = value else {
        return ledger;
    };

    for (label, entry) in map {
        if label == "date" || label == "lastUpdated" {
            continue;
        }
        match serde_json::from_value::<Vec<ShowRecord>>(entry) {
            Ok(records) => ledger.seed(MovieKey::parse_label(&label), records),
            Err(e) => log::warn!("Skipping unreadable entry for '{}': {}", label, e),
        }
    }

    ledger
}

fn slug(label: &str) -> String {
    label
        .to_lowercase()
        .replace(|c: char| !c.is_ascii_alphanumeric(), "_")
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use crate::ledger::MergeStrategy;
    use crate::rollup::RollupEngine;

    use super::*;

    fn now() -> DateTime<Utc> {
        "2026-08-30T10:05:00Z".parse().unwrap()
    }

    fn date() -> NaiveDate {
        "2026-08-30".parse().unwrap()
    }

    fn record(venue: &str) -> ShowRecord {
        ShowRecord {
            city: "Mumbai".to_string(),
            state: "Maharashtra".to_string(),
            venue: venue.to_string(),
            address: Some("Linking Road".to_string()),
            chain: Some("Pvr".to_string()),
            time: "07:30 PM".to_string(),
            audi: "A1".to_string(),
            total_seats: 100,
            available: 20,
            sold: 80,
            gross: 16000.0,
            mins_left: 90,
        }
    }

    #[test]
    fn detailed_file_round_trips_through_the_ledger() {
        let dir = TempDir::new().unwrap();
        let writer = SnapshotWriter::new(dir.path());

        let key = MovieKey::new("Movie A", "hindi");
        let mut ledger = ShowLedger::new();
        ledger.upsert(&key, record("V1"), MergeStrategy::LatestWins);
        ledger.upsert(&key, record("V2"), MergeStrategy::LatestWins);

        writer.write_detailed(date(), now(), &ledger).unwrap();
        let loaded = writer.load_detailed(date());

        assert_eq!(loaded.records(&key), ledger.records(&key));
    }

    #[test]
    fn summary_file_carries_the_metadata_envelope() {
        let dir = TempDir::new().unwrap();
        let writer = SnapshotWriter::new(dir.path());

        let key = MovieKey::new("Movie A", "hindi");
        let mut ledger = ShowLedger::new();
        ledger.upsert(&key, record("V1"), MergeStrategy::LatestWins);
        let summaries = RollupEngine::rebuild(&ledger);

        writer.write_summary(date(), now(), &summaries).unwrap();

        let content = fs::read_to_string(writer.summary_path(date())).unwrap();
        let value: Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value["date"], "2026-08-30");
        assert_eq!(value["lastUpdated"], "10:05 AM, 30 August 2026");
        assert_eq!(value["Movie A | hindi"]["sold"], 80);
        assert_eq!(value["Movie A | hindi"]["Chain_details"][0]["chain"], "Pvr");
    }

    #[test]
    fn missing_and_malformed_detailed_files_start_empty() {
        let dir = TempDir::new().unwrap();
        let writer = SnapshotWriter::new(dir.path());

        assert!(writer.load_detailed(date()).is_empty());

        fs::write(writer.detailed_path(date()), "{ not json").unwrap();
        assert!(writer.load_detailed(date()).is_empty());
    }

    #[test]
    fn tracked_store_round_trips_through_the_vault() {
        let dir = TempDir::new().unwrap();
        let vault = KeyVault::open(dir.path().join("store"), 30, now()).unwrap();
        let key = MovieKey::new("Movie A", "hindi");

        // First run: nothing on disk yet.
        assert!(SnapshotWriter::load_tracked(&vault, date(), &key).is_empty());

        let records = vec![record("V1"), record("V2")];
        SnapshotWriter::write_tracked(&vault, date(), &key, now(), &records).unwrap();

        assert_eq!(SnapshotWriter::load_tracked(&vault, date(), &key), records);

        // The file on disk is ciphertext, not the plaintext payload.
        let raw = fs::read_to_string(SnapshotWriter::tracked_path(&vault, date(), &key)).unwrap();
        assert!(!raw.contains("Movie A"));
        assert!(!raw.contains("venues"));
    }
}
