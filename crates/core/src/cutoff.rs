use chrono::{DateTime, Utc};

/// The two complementary temporal inclusion filters over one
/// observation stream. Callers pick one per run based on tracking
/// intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CutoffMode {
    /// Day-of box office: admit started and near-term shows, exclude
    /// far-future ones.
    Live,
    /// Advance bookings: the complement, admit only far-future shows.
    Advance,
}

/// Decides whether an observed session is in scope given the current
/// time and a per-movie minute threshold.
#[derive(Debug, Clone, Copy)]
pub struct CutoffFilter {
    mode: CutoffMode,
    cutoff_mins: i64,
}

impl CutoffFilter {
    pub fn new(mode: CutoffMode, cutoff_mins: i64) -> Self {
        Self { mode, cutoff_mins }
    }

    pub fn mode(&self) -> CutoffMode {
        self.mode
    }

    /// Whole minutes from `now` until the show starts. Negative for
    /// shows already under way.
    pub fn minutes_left(now: DateTime<Utc>, start_time: DateTime<Utc>) -> i64 {
        (start_time - now).num_minutes()
    }

    pub fn admits(&self, now: DateTime<Utc>, start_time: DateTime<Utc>) -> bool {
        let minutes_left = Self::minutes_left(now, start_time);
        match self.mode {
            CutoffMode::Live => minutes_left < self.cutoff_mins,
            CutoffMode::Advance => minutes_left >= self.cutoff_mins,
        }
    }
}
