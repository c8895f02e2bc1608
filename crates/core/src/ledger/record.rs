use std::fmt;

use serde::{Deserialize, Serialize};

/// Composite identity for a tracked movie scope: title + language,
/// optionally narrowed by presentation format (e.g. "IMAX | 3D").
/// Distinct keys never share show records.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MovieKey {
    pub title: String,
    pub language: String,
    pub format: Option<String>,
}

impl MovieKey {
    pub fn new(title: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            language: language.into(),
            format: None,
        }
    }

    pub fn with_format(
        title: impl Into<String>,
        language: impl Into<String>,
        format: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            language: language.into(),
            format: Some(format.into()),
        }
    }

    /// Label used as the JSON object key in persisted files:
    /// `"Title | language"` or `"Title [Format | language]"`.
    pub fn label(&self) -> String {
        match &self.format {
            Some(format) => format!("{} [{} | {}]", self.title, format, self.language),
            None => format!("{} | {}", self.title, self.language),
        }
    }

    /// Inverse of [`MovieKey::label`], used when reading persisted files
    /// back into a ledger.
    pub fn parse_label(label: &str) -> Self {
        if label.ends_with(']') {
            if let Some(start) = label.rfind(" [") {
                let inner = &label[start + 2..label.len() - 1];
                if let Some((format, language)) = inner.rsplit_once(" | ") {
                    return Self::with_format(&label[..start], language, format);
                }
            }
        }

        match label.rsplit_once(" | ") {
            Some((title, language)) => Self::new(title, language),
            None => Self::new(label, ""),
        }
    }
}

impl fmt::Display for MovieKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// One observed ticket session at a specific venue/time/auditorium.
/// `sold` and `gross` are derived from seat counts and price tiers at
/// construction, never taken from the wire as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShowRecord {
    pub city: String,
    pub state: String,
    pub venue: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain: Option<String>,
    /// Local wall-clock show time label, e.g. "07:30 PM".
    pub time: String,
    #[serde(default)]
    pub audi: String,
    pub total_seats: u32,
    pub available: u32,
    pub sold: u32,
    pub gross: f64,
    /// Minutes until the show started, at observation time. Negative for
    /// shows that had already begun.
    #[serde(default)]
    pub mins_left: i64,
}

impl ShowRecord {
    /// Occupancy percentage (0 when the auditorium reports zero seats).
    pub fn occupancy(&self) -> f64 {
        if self.total_seats == 0 {
            0.0
        } else {
            f64::from(self.sold) / f64::from(self.total_seats) * 100.0
        }
    }

    /// Identity match: (venue, time, audi) is unique within a ledger.
    pub fn same_show(&self, other: &ShowRecord) -> bool {
        self.venue == other.venue && self.time == other.time && self.audi == other.audi
    }
}
