//! Query building -- typed request parameters and the filter predicate they produce.

pub mod params;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::Serialize;

pub use self::params::{ChartParams, ListParams, ParamError, SummaryParams};

/// Store-agnostic predicate over execution records.
///
/// Every field is optional; only the present ones constrain the result.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Filter {
    /// Inclusive lower bound on start time.
    pub start: Option<DateTime<Utc>>,
    /// Inclusive upper bound on start time.
    pub end: Option<DateTime<Utc>>,
    /// Status set. Values are passed through unvalidated.
    pub statuses: Vec<String>,
    /// Case-insensitive substring of the interface name.
    pub interface_name: Option<String>,
    /// Full-text search over the message field.
    pub text: Option<String>,
    /// Inclusive duration bounds, milliseconds.
    pub min_duration: Option<f64>,
    pub max_duration: Option<f64>,
}

impl Filter {
    /// Replace the time bounds with an explicit window.
    pub fn within(mut self, window: TimeWindow) -> Self {
        self.start = Some(window.start);
        self.end = Some(window.end);
        self
    }

    /// Canonical text form, stable for equal filters. Used in cache keys.
    pub fn signature(&self) -> String {
        let ts = |t: &Option<DateTime<Utc>>| {
            t.map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
                .unwrap_or_default()
        };
        let mut statuses = self.statuses.clone();
        statuses.sort();
        statuses.dedup();
        format!(
            "start={};end={};status={};name={};q={};min={};max={}",
            ts(&self.start),
            ts(&self.end),
            statuses.join(","),
            self.interface_name.as_deref().unwrap_or(""),
            self.text.as_deref().unwrap_or(""),
            self.min_duration.map(|d| d.to_string()).unwrap_or_default(),
            self.max_duration.map(|d| d.to_string()).unwrap_or_default(),
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// A resolved `[start, end]` time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Named look-back ranges for the summary endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RangePreset {
    LastHour,
    #[default]
    LastDay,
    LastWeek,
    LastMonth,
}

impl RangePreset {
    pub fn span(self) -> Duration {
        match self {
            RangePreset::LastHour => Duration::hours(1),
            RangePreset::LastDay => Duration::hours(24),
            RangePreset::LastWeek => Duration::days(7),
            RangePreset::LastMonth => Duration::days(30),
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "1h" => Some(RangePreset::LastHour),
            "24h" => Some(RangePreset::LastDay),
            "7d" => Some(RangePreset::LastWeek),
            "30d" => Some(RangePreset::LastMonth),
            _ => None,
        }
    }
}

/// Chart bucket granularity. Truncation is always done in UTC.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Bucket {
    Minute,
    #[default]
    Hour,
    Day,
}

impl Bucket {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "minute" => Some(Bucket::Minute),
            "hour" => Some(Bucket::Hour),
            "day" => Some(Bucket::Day),
            _ => None,
        }
    }

    /// strftime pattern producing the bucket key.
    pub fn key_format(self) -> &'static str {
        match self {
            Bucket::Minute => "%Y-%m-%dT%H:%M:00Z",
            Bucket::Hour => "%Y-%m-%dT%H:00:00Z",
            Bucket::Day => "%Y-%m-%d",
        }
    }
}
