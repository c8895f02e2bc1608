use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One price tier inside an observed session: seats sold in the tier
/// and the tier's ticket price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricedArea {
    pub sold: u32,
    pub price: f64,
}

/// A normalized ticket-session observation from the external feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionObservation {
    pub movie_id: String,
    pub title: String,
    pub languages: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen_format: Option<String>,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub auditorium: String,
    pub total_seats: u32,
    pub available_seats: u32,
    #[serde(default)]
    pub priced_areas: Vec<PricedArea>,
}

impl SessionObservation {
    pub fn sold(&self) -> u32 {
        self.total_seats.saturating_sub(self.available_seats)
    }

    /// Gross is always derived from the price tiers, never reported by
    /// the feed directly.
    pub fn gross(&self) -> f64 {
        self.priced_areas
            .iter()
            .map(|area| f64::from(area.sold) * area.price)
            .sum()
    }

    pub fn primary_language(&self) -> &str {
        self.languages.first().map(String::as_str).unwrap_or("")
    }
}

/// Result of asking the provider about one (venue, date).
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderResponse {
    /// The date is not in the provider's known session-date set.
    Unavailable,
    Sessions(Vec<SessionObservation>),
}

/// The external session feed. Implementations do the actual fetching;
/// the core only consumes normalized observations.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn fetch(&self, venue_id: &str, date: NaiveDate) -> Result<ProviderResponse>;
}

/// Static venue directory entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VenueInfo {
    pub id: String,
    pub name: String,
    pub city: String,
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_key: Option<String>,
}

impl VenueInfo {
    /// Display form of the state label.
    pub fn state_label(&self) -> String {
        format_region_label(&self.state)
    }

    /// Display form of the exhibitor chain, when one is known.
    pub fn chain_label(&self) -> Option<String> {
        self.chain_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .map(format_region_label)
    }
}

/// Static venue/city lookup table, loaded once per run.
#[derive(Debug, Clone, Default)]
pub struct VenueDirectory {
    venues: Vec<VenueInfo>,
}

impl VenueDirectory {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read venue directory {}", path.display()))?;
        let venues: Vec<VenueInfo> = serde_json::from_str(&content)
            .with_context(|| format!("malformed venue directory {}", path.display()))?;
        log::info!("Loaded {} venues from {}", venues.len(), path.display());
        Ok(Self { venues })
    }

    pub fn from_venues(venues: Vec<VenueInfo>) -> Self {
        Self { venues }
    }

    pub fn venues(&self) -> &[VenueInfo] {
        &self.venues
    }

    pub fn len(&self) -> usize {
        self.venues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.venues.is_empty()
    }
}

/// Feed labels come dashed and lowercased ("uttar-pradesh", "pvr-inox").
/// Normalize to display form; empty or missing becomes "Unknown".
pub fn format_region_label(raw: &str) -> String {
    if raw.trim().is_empty() {
        return "Unknown".to_string();
    }

    raw.replace('-', " ")
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_labels_are_normalized() {
        assert_eq!(format_region_label("uttar-pradesh"), "Uttar Pradesh");
        assert_eq!(format_region_label("pvr"), "Pvr");
        assert_eq!(format_region_label(""), "Unknown");
        assert_eq!(format_region_label("  "), "Unknown");
    }

    #[test]
    fn sold_and_gross_are_derived_from_tiers() {
        let obs = SessionObservation {
            movie_id: "m1".to_string(),
            title: "Movie A".to_string(),
            languages: vec!["hindi".to_string()],
            screen_format: None,
            start_time: "2026-08-30T15:30:00Z".parse().unwrap(),
            auditorium: "A1".to_string(),
            total_seats: 120,
            available_seats: 40,
            priced_areas: vec![
                PricedArea { sold: 50, price: 250.0 },
                PricedArea { sold: 30, price: 180.0 },
            ],
        };

        assert_eq!(obs.sold(), 80);
        assert_eq!(obs.gross(), 50.0 * 250.0 + 30.0 * 180.0);
        assert_eq!(obs.primary_language(), "hindi");
    }

    #[test]
    fn sold_never_underflows_on_bad_feed_counts() {
        let obs = SessionObservation {
            movie_id: "m1".to_string(),
            title: "Movie A".to_string(),
            languages: vec![],
            screen_format: None,
            start_time: "2026-08-30T15:30:00Z".parse().unwrap(),
            auditorium: String::new(),
            total_seats: 10,
            available_seats: 25,
            priced_areas: vec![],
        };
        assert_eq!(obs.sold(), 0);
    }

    #[test]
    fn chain_label_requires_a_nonempty_key() {
        let mut venue = VenueInfo {
            id: "v1".to_string(),
            name: "Grand Galaxy".to_string(),
            city: "Mumbai".to_string(),
            state: "maharashtra".to_string(),
            chain_key: Some("pvr-inox".to_string()),
        };
        assert_eq!(venue.chain_label().as_deref(), Some("Pvr Inox"));
        assert_eq!(venue.state_label(), "Maharashtra");

        venue.chain_key = Some("  ".to_string());
        assert_eq!(venue.chain_label(), None);
        venue.chain_key = None;
        assert_eq!(venue.chain_label(), None);
    }
}
