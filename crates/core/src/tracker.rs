use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use anyhow::Result;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};
use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::config::{TrackedMovie, TrackerConfig};
use crate::cutoff::{CutoffFilter, CutoffMode};
use crate::ledger::{MergeStrategy, MovieKey, ShowLedger, ShowRecord};
use crate::provider::{
    ProviderResponse, SessionObservation, SessionProvider, VenueDirectory, VenueInfo,
};
use crate::rollup::RollupEngine;
use crate::snapshot::{MonthlyLog, SnapshotWriter};
use crate::vault::KeyVault;

/// Outcome counters for one reconciled date.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub venues_fetched: usize,
    pub venues_unavailable: usize,
    pub venues_failed: usize,
    pub admitted: usize,
    pub rejected: usize,
    pub movies: usize,
    pub shows: usize,
}

enum FetchOutcome {
    Fetched,
    Unavailable,
    Failed,
}

/// UTC offset from a configured minute count. Checked end to end: a
/// value that truncates, overflows the seconds multiplication, or falls
/// outside chrono's ±24h range yields `None` rather than a coincidental
/// in-range offset.
fn offset_from_minutes(mins: i64) -> Option<FixedOffset> {
    i32::try_from(mins)
        .ok()
        .and_then(|m| m.checked_mul(60))
        .and_then(FixedOffset::east_opt)
}

/// Wires one batch run: provider fan-out → cutoff filter → ledger
/// merge → rollup → snapshot artifacts.
///
/// Venue fetches run as independent tasks; all admitted observations
/// funnel through a single channel consumer, which serializes the
/// ledger upserts (the compare-and-replace in `upsert` is not atomic
/// across writers).
pub struct Tracker {
    config: TrackerConfig,
    directory: VenueDirectory,
    provider: Arc<dyn SessionProvider>,
    tz: FixedOffset,
}

impl Tracker {
    pub fn new(
        config: TrackerConfig,
        directory: VenueDirectory,
        provider: Arc<dyn SessionProvider>,
    ) -> Self {
        let tz = offset_from_minutes(config.timezone_offset_mins).unwrap_or_else(|| {
            log::warn!(
                "Invalid timezone offset {} minutes; falling back to UTC",
                config.timezone_offset_mins
            );
            FixedOffset::east_opt(0).expect("zero offset is always valid")
        });
        Self {
            config,
            directory,
            provider,
            tz,
        }
    }

    /// Which date a tracked movie's run targets, or `None` when the
    /// movie is skipped entirely. Live runs ignore unreleased movies,
    /// track the release date on release day, and today afterwards.
    /// Advance runs look at the release date until it arrives, then a
    /// configurable number of days ahead.
    pub fn target_date(
        movie: &TrackedMovie,
        today: NaiveDate,
        mode: CutoffMode,
        advance_offset: i64,
    ) -> Option<NaiveDate> {
        match mode {
            CutoffMode::Live => {
                if today < movie.release_date {
                    None
                } else if today == movie.release_date {
                    Some(movie.release_date)
                } else {
                    Some(today)
                }
            }
            CutoffMode::Advance => {
                if today < movie.release_date {
                    Some(movie.release_date)
                } else {
                    Some(today + Duration::days(advance_offset))
                }
            }
        }
    }

    /// One full batch run: rotate the key if due, then reconcile every
    /// date any tracked movie targets (plus the mode's default date).
    pub async fn run(
        &self,
        now: DateTime<Utc>,
        mode: CutoffMode,
        vault: &mut KeyVault,
    ) -> Result<Vec<(NaiveDate, RunReport)>> {
        // Rotation first, while nothing else touches the store. An
        // aborted rotation keeps the old key active and the run
        // continues on it.
        if let Err(e) = vault.rotate_if_due(now) {
            log::error!("Key rotation aborted: {}", e);
        }

        let today = now.with_timezone(&self.tz).date_naive();
        let mut dates = BTreeSet::new();
        dates.insert(match mode {
            CutoffMode::Live => today,
            CutoffMode::Advance => today + Duration::days(self.config.advance_day_offset),
        });
        for movie in &self.config.movies {
            if let Some(date) =
                Self::target_date(movie, today, mode, self.config.advance_day_offset)
            {
                dates.insert(date);
            } else {
                log::info!(
                    "Skipping {} — releases on {}",
                    movie.name,
                    movie.release_date
                );
            }
        }

        let mut reports = Vec::new();
        for date in dates {
            log::info!("Reconciling {} ({:?} mode)", date, mode);
            let report = self.run_for_date(now, date, mode, vault).await?;
            reports.push((date, report));
        }
        Ok(reports)
    }

    /// Reconcile one date: fetch every venue concurrently, merge
    /// admitted observations into the persisted ledger, rebuild the
    /// rollups and write all artifacts.
    pub async fn run_for_date(
        &self,
        now: DateTime<Utc>,
        date: NaiveDate,
        mode: CutoffMode,
        vault: &KeyVault,
    ) -> Result<RunReport> {
        let writer = SnapshotWriter::new(&self.config.data_dir);
        let mut ledger = writer.load_detailed(date);
        let mut report = RunReport::default();

        let (tx, mut rx) = mpsc::channel::<(VenueInfo, Vec<SessionObservation>)>(64);
        let mut handles = Vec::with_capacity(self.directory.len());

        for venue in self.directory.venues() {
            let provider = Arc::clone(&self.provider);
            let venue = venue.clone();
            let tx = tx.clone();
            let fetch_timeout = StdDuration::from_secs(self.config.fetch_timeout_secs);

            handles.push(tokio::spawn(async move {
                match timeout(fetch_timeout, provider.fetch(&venue.id, date)).await {
                    Ok(Ok(ProviderResponse::Sessions(sessions))) => {
                        let _ = tx.send((venue, sessions)).await;
                        FetchOutcome::Fetched
                    }
                    Ok(Ok(ProviderResponse::Unavailable)) => {
                        log::debug!("Venue {} has no sessions for {}", venue.id, date);
                        FetchOutcome::Unavailable
                    }
                    Ok(Err(e)) => {
                        log::warn!("Venue {} failed: {}", venue.id, e);
                        FetchOutcome::Failed
                    }
                    Err(_) => {
                        log::warn!("Venue {} timed out", venue.id);
                        FetchOutcome::Failed
                    }
                }
            }));
        }
        drop(tx);

        // Single consumer: this loop is the only writer to the ledger,
        // so upserts from concurrently completing fetches apply one at
        // a time.
        while let Some((venue, sessions)) = rx.recv().await {
            for obs in sessions {
                match self.admit(&venue, &obs, now, mode) {
                    Some((key, record)) => {
                        ledger.upsert(&key, record, MergeStrategy::LatestWins);
                        report.admitted += 1;
                    }
                    None => report.rejected += 1,
                }
            }
        }

        for handle in handles {
            match handle.await {
                Ok(FetchOutcome::Fetched) => report.venues_fetched += 1,
                Ok(FetchOutcome::Unavailable) => report.venues_unavailable += 1,
                Ok(FetchOutcome::Failed) | Err(_) => report.venues_failed += 1,
            }
        }

        let summaries = RollupEngine::rebuild(&ledger);
        report.movies = summaries.len();
        report.shows = ledger.show_count();

        writer.write_summary(date, now, &summaries)?;
        writer.write_detailed(date, now, &ledger)?;

        let log_path = MonthlyLog::path_for(&self.config.logs_dir, now);
        let mut monthly = MonthlyLog::load(&log_path);
        monthly.record(now, &summaries);
        monthly.save(&log_path)?;

        self.update_tracked_stores(vault, date, now, mode, &ledger)?;

        log::info!(
            "{}: {} shows across {} movies ({} venues ok, {} failed)",
            date,
            report.shows,
            report.movies,
            report.venues_fetched,
            report.venues_failed
        );
        Ok(report)
    }

    /// Apply the language gate and the cutoff filter to one
    /// observation; build its ledger record if admitted.
    fn admit(
        &self,
        venue: &VenueInfo,
        obs: &SessionObservation,
        now: DateTime<Utc>,
        mode: CutoffMode,
    ) -> Option<(MovieKey, ShowRecord)> {
        let tracked = self
            .config
            .movies
            .iter()
            .find(|m| m.movie_id == obs.movie_id);

        if let Some(movie) = tracked {
            let want = movie.language.to_lowercase();
            if !obs.languages.iter().any(|l| l.to_lowercase() == want) {
                return None;
            }
        }

        let cutoff_mins = tracked
            .map(|m| m.cutoff_mins)
            .unwrap_or(self.config.default_cutoff_mins);
        let filter = CutoffFilter::new(mode, cutoff_mins);
        if !filter.admits(now, obs.start_time) {
            return None;
        }

        let key = match tracked {
            Some(movie) => movie.movie_key(),
            None => {
                let language = obs.primary_language().to_string();
                match obs.screen_format.as_deref() {
                    Some(format) => {
                        MovieKey::with_format(&obs.title, language, format.replace('-', " | "))
                    }
                    None => MovieKey::new(&obs.title, language),
                }
            }
        };

        let total = obs.total_seats;
        let available = obs.available_seats.min(total);
        let record = ShowRecord {
            city: venue.city.clone(),
            state: venue.state_label(),
            venue: venue.name.clone(),
            address: None,
            chain: venue.chain_label(),
            time: obs
                .start_time
                .with_timezone(&self.tz)
                .format("%I:%M %p")
                .to_string(),
            audi: obs.auditorium.clone(),
            total_seats: total,
            available,
            sold: total - available,
            gross: obs.gross().max(0.0),
            mins_left: CutoffFilter::minutes_left(now, obs.start_time),
        };

        Some((key, record))
    }

    /// Merge this run's records for each tracked movie against its
    /// encrypted history under MonotonicMax and write the store back.
    fn update_tracked_stores(
        &self,
        vault: &KeyVault,
        date: NaiveDate,
        now: DateTime<Utc>,
        mode: CutoffMode,
        ledger: &ShowLedger,
    ) -> Result<()> {
        let today = now.with_timezone(&self.tz).date_naive();

        for movie in &self.config.movies {
            if Self::target_date(movie, today, mode, self.config.advance_day_offset) != Some(date) {
                continue;
            }

            let key = movie.movie_key();
            let current = ledger.records(&key);
            if current.is_empty() {
                continue;
            }

            let mut merged = ShowLedger::new();
            merged.seed(key.clone(), SnapshotWriter::load_tracked(vault, date, &key));
            for record in current {
                merged.upsert(&key, record.clone(), MergeStrategy::MonotonicMax);
            }

            SnapshotWriter::write_tracked(vault, date, &key, now, merged.records(&key))?;
            log::info!(
                "{} — {} shows stored for {}",
                movie.name,
                merged.records(&key).len(),
                date
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn movie(release: &str) -> TrackedMovie {
        TrackedMovie {
            name: "Movie A".to_string(),
            language: "hindi".to_string(),
            format: None,
            movie_id: "m1".to_string(),
            release_date: release.parse().unwrap(),
            cutoff_mins: 100,
        }
    }

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn live_runs_skip_unreleased_movies() {
        let m = movie("2026-09-04");
        assert_eq!(
            Tracker::target_date(&m, day("2026-08-30"), CutoffMode::Live, 1),
            None
        );
    }

    #[test]
    fn live_runs_track_release_day_then_today() {
        let m = movie("2026-08-28");
        assert_eq!(
            Tracker::target_date(&m, day("2026-08-28"), CutoffMode::Live, 1),
            Some(day("2026-08-28"))
        );
        assert_eq!(
            Tracker::target_date(&m, day("2026-08-30"), CutoffMode::Live, 1),
            Some(day("2026-08-30"))
        );
    }

    #[test]
    fn out_of_range_timezone_offsets_are_rejected() {
        assert_eq!(offset_from_minutes(330), FixedOffset::east_opt(330 * 60));
        assert_eq!(offset_from_minutes(-330), FixedOffset::east_opt(-330 * 60));

        // ±24h and beyond, including values that would truncate through
        // i32 or overflow the seconds multiplication.
        assert_eq!(offset_from_minutes(24 * 60), None);
        assert_eq!(offset_from_minutes(i64::from(i32::MAX)), None);
        assert_eq!(offset_from_minutes(i64::from(i32::MIN)), None);
        assert_eq!(offset_from_minutes(i64::MAX), None);
        assert_eq!(offset_from_minutes(1 << 33), None);
    }

    #[test]
    fn advance_runs_look_ahead() {
        let m = movie("2026-09-04");
        // Before release: the release day itself is the target.
        assert_eq!(
            Tracker::target_date(&m, day("2026-08-30"), CutoffMode::Advance, 1),
            Some(day("2026-09-04"))
        );
        // After release: a configurable number of days ahead.
        assert_eq!(
            Tracker::target_date(&movie("2026-08-28"), day("2026-08-30"), CutoffMode::Advance, 3),
            Some(day("2026-09-02"))
        );
    }
}
