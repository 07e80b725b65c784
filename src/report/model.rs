//! Report data model: the raw scrape boundary and the normalized document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::duration;

/// English month names, indexed by month number - 1.
pub const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Human month name for a 1-based month number; empty for out-of-range input.
pub fn month_name(month: u32) -> &'static str {
    month
        .checked_sub(1)
        .and_then(|i| MONTH_NAMES.get(i as usize))
        .copied()
        .unwrap_or("")
}

/// One table row lifted cell-for-cell from the portal's report view.
///
/// The scraper does no interpretation beyond trimming cell text; the
/// normalizer owns the column layout and all validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRow {
    pub cells: Vec<String>,
}

/// The raw output of one complete scrape: the table header plus every data
/// row across all pagination pages. Consumed exactly once by the normalizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawReport {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
    pub scraped_at: DateTime<Utc>,
    pub source_url: String,
    pub pages_processed: u32,
}

/// A call-duration cell: the portal's original `HH:MM:SS` text plus the
/// derived seconds when the text is well-formed.
///
/// Serializes as the bare string so stored documents keep the wire shape
/// (`"HH:MM:SS"` or `""`). Deserialization never fails — text that no longer
/// validates simply loses its derived seconds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DurationField {
    text: String,
    seconds: Option<u64>,
}

impl DurationField {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from portal text. Empty text is the portal's "no data" marker
    /// and is valid; anything else must decode as `HH:MM:SS`.
    pub fn from_text(text: &str) -> Result<Self, duration::DurationError> {
        if text.is_empty() {
            return Ok(Self::empty());
        }
        let seconds = duration::decode(text)?;
        Ok(Self {
            text: text.to_string(),
            seconds: Some(seconds),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn seconds(&self) -> Option<u64> {
        self.seconds
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

impl Serialize for DurationField {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text)
    }
}

impl<'de> Deserialize<'de> for DurationField {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        let seconds = duration::decode(&text).ok();
        Ok(Self { text, seconds })
    }
}

/// Aggregated call counters for one direction.
///
/// The wait columns only exist for incoming calls; they stay `None` for
/// outgoing so serialized documents omit them entirely.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallStats {
    pub total: u32,
    pub successful: u32,
    pub unsuccessful: u32,
    pub min_time: DurationField,
    pub max_time: DurationField,
    pub avg_time: DurationField,
    pub total_time: DurationField,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_wait: Option<DurationField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_wait: Option<DurationField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_wait: Option<DurationField>,
}

impl CallStats {
    /// Whether the portal's own arithmetic holds for this direction.
    pub fn is_consistent(&self) -> bool {
        self.total == self.successful + self.unsuccessful
    }
}

/// One normalized per-agent, per-month call-statistics document.
///
/// Identity is (agent_name, year, month, task_id); the latest write for a
/// given identity wins in the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentReport {
    pub agent_name: String,
    pub agent_number: String,
    pub year: i32,
    pub month: u32,
    pub task_id: String,
    pub incoming_calls: CallStats,
    pub outgoing_calls: CallStats,
    /// False when `total != successful + unsuccessful` in either direction.
    /// The record is kept — a garbled scrape should not lose data.
    pub consistency_flag: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    pub last_updated: DateTime<Utc>,
}

impl AgentReport {
    pub fn total_calls(&self) -> u64 {
        u64::from(self.incoming_calls.total) + u64::from(self.outgoing_calls.total)
    }

    /// The `YYYY-MM` partition label used in API responses.
    pub fn month_year(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_names_cover_the_year() {
        assert_eq!(month_name(1), "January");
        assert_eq!(month_name(12), "December");
        assert_eq!(month_name(0), "");
        assert_eq!(month_name(13), "");
    }

    #[test]
    fn duration_field_serializes_as_bare_string() {
        let field = DurationField::from_text("01:02:03").unwrap();
        assert_eq!(serde_json::to_string(&field).unwrap(), "\"01:02:03\"");
        assert_eq!(field.seconds(), Some(3723));

        let empty = DurationField::empty();
        assert_eq!(serde_json::to_string(&empty).unwrap(), "\"\"");
        assert_eq!(empty.seconds(), None);
    }

    #[test]
    fn duration_field_round_trips_through_json() {
        let field = DurationField::from_text("10:00:59").unwrap();
        let json = serde_json::to_string(&field).unwrap();
        let back: DurationField = serde_json::from_str(&json).unwrap();
        assert_eq!(back, field);
    }

    #[test]
    fn outgoing_stats_omit_wait_fields() {
        let stats = CallStats {
            total: 3,
            successful: 3,
            ..Default::default()
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert!(json.get("min_wait").is_none());
        assert!(json.get("total").is_some());
    }
}
