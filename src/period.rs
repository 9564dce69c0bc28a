// src/period.rs
//
// Calendar bucketing. Keys are plain strings chosen to sort
// lexicographically within one granularity, so aggregated rows can be
// ordered without re-parsing dates.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Day,
    Week,
    Month,
}

impl Period {
    pub fn parse(value: &str) -> Option<Period> {
        match value {
            "day" => Some(Period::Day),
            "week" => Some(Period::Week),
            "month" => Some(Period::Month),
            _ => None,
        }
    }

    /// Bucket key for a business date at this granularity.
    ///
    /// Weeks are ISO-8601 (Monday-start); the ISO year can differ from the
    /// calendar year around New Year, e.g. 2025-12-29 belongs to 2026-W01.
    /// The tenant's configurable week-start only affects calendar display
    /// in the frontend, never bucket identity.
    pub fn key(self, date: NaiveDate) -> String {
        match self {
            Period::Day => date.format("%Y-%m-%d").to_string(),
            Period::Week => {
                let iso = date.iso_week();
                format!("{:04}-W{:02}", iso.year(), iso.week())
            }
            Period::Month => format!("{:04}-{:02}", date.year(), date.month()),
        }
    }
}

/// Day key used by the heatmap and the day granularity alike.
pub fn day_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
