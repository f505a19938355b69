//! Typed request parameters.
//!
//! Each endpoint recognises a fixed set of keys. Unrecognised keys are
//! ignored, but a recognised key carrying a malformed value is rejected.
//! Empty values count as absent.

use std::num::IntErrorKind;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike, Utc};
use thiserror::Error;

use super::{Bucket, Filter, RangePreset, SortDirection, TimeWindow};

pub const DEFAULT_LIMIT: usize = 50;
pub const MAX_LIMIT: usize = 100;

const FILTER_KEYS: &[&str] = &[
    "start",
    "end",
    "status",
    "status[]",
    "interfaceName",
    "qtext",
    "minDuration",
    "maxDuration",
];

#[derive(Debug, Error, PartialEq)]
pub enum ParamError {
    #[error("invalid date for '{field}': {value}")]
    InvalidDate { field: &'static str, value: String },

    #[error("invalid number for '{field}': {value}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("invalid value for '{field}': {value} (expected one of {expected})")]
    InvalidChoice {
        field: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("parameter '{field}' given more than once")]
    Repeated { field: &'static str },
}

/// `GET /executions`
#[derive(Debug, Clone, PartialEq)]
pub struct ListParams {
    pub filter: Filter,
    pub limit: usize,
    pub cursor: Option<String>,
    pub sort: SortDirection,
}

/// `GET /executions/summary`
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryParams {
    pub range: RangePreset,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    /// Additional non-time constraints.
    pub filter: Filter,
}

/// `GET /executions/chart-data`
#[derive(Debug, Clone, PartialEq)]
pub struct ChartParams {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub bucket: Bucket,
    /// Additional non-time constraints.
    pub filter: Filter,
}

struct RawParams<'a> {
    pairs: &'a [(String, String)],
}

impl<'a> RawParams<'a> {
    fn new(pairs: &'a [(String, String)], extra_keys: &[&str]) -> Self {
        for (key, _) in pairs {
            let k = key.as_str();
            if !FILTER_KEYS.contains(&k) && !extra_keys.contains(&k) {
                tracing::debug!(key = %k, "ignoring unrecognised query parameter");
            }
        }
        Self { pairs }
    }

    fn values(&self, keys: &'a [&'a str]) -> impl Iterator<Item = &'a str> + 'a {
        self.pairs
            .iter()
            .filter(move |(k, _)| keys.contains(&k.as_str()))
            .map(|(_, v)| v.as_str())
            .filter(|v| !v.is_empty())
    }

    fn single(&self, field: &'static str) -> Result<Option<&'a str>, ParamError> {
        let mut found = None;
        for (k, v) in self.pairs {
            if k == field && !v.is_empty() {
                if found.is_some() {
                    return Err(ParamError::Repeated { field });
                }
                found = Some(v.as_str());
            }
        }
        Ok(found)
    }

    fn timestamp(&self, field: &'static str) -> Result<Option<DateTime<Utc>>, ParamError> {
        self.single(field)?
            .map(|v| parse_timestamp(field, v))
            .transpose()
    }

    /// Zero is treated as "not provided".
    fn duration_bound(&self, field: &'static str) -> Result<Option<f64>, ParamError> {
        let Some(raw) = self.single(field)? else {
            return Ok(None);
        };
        let value = raw
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| ParamError::InvalidNumber {
                field,
                value: raw.to_string(),
            })?;
        Ok((value != 0.0).then_some(value))
    }

    fn filter(&self) -> Result<Filter, ParamError> {
        Ok(Filter {
            start: self.timestamp("start")?,
            end: self.timestamp("end")?,
            statuses: self
                .values(&["status", "status[]"])
                .map(str::to_string)
                .collect(),
            interface_name: self.single("interfaceName")?.map(str::to_string),
            text: self
                .single("qtext")?
                .map(str::trim)
                .filter(|q| !q.is_empty())
                .map(str::to_string),
            min_duration: self.duration_bound("minDuration")?,
            max_duration: self.duration_bound("maxDuration")?,
        })
    }
}

impl ListParams {
    pub fn from_pairs(pairs: &[(String, String)]) -> Result<Self, ParamError> {
        let raw = RawParams::new(pairs, &["limit", "cursor", "sort"]);

        let limit = match raw.single("limit")? {
            None => DEFAULT_LIMIT,
            Some(v) => {
                let n = match v.trim().parse::<i64>() {
                    Ok(n) => n,
                    // Out-of-range integers still clamp.
                    Err(e) if *e.kind() == IntErrorKind::PosOverflow => i64::MAX,
                    Err(e) if *e.kind() == IntErrorKind::NegOverflow => i64::MIN,
                    Err(_) => {
                        return Err(ParamError::InvalidNumber {
                            field: "limit",
                            value: v.to_string(),
                        })
                    }
                };
                clamp_limit(n)
            }
        };

        let sort = match raw.single("sort")? {
            None => SortDirection::Desc,
            Some("asc") => SortDirection::Asc,
            Some("desc") => SortDirection::Desc,
            Some(other) => {
                return Err(ParamError::InvalidChoice {
                    field: "sort",
                    value: other.to_string(),
                    expected: "asc, desc",
                })
            }
        };

        Ok(Self {
            filter: raw.filter()?,
            limit,
            cursor: raw.single("cursor")?.map(str::to_string),
            sort,
        })
    }
}

impl SummaryParams {
    pub fn from_pairs(pairs: &[(String, String)]) -> Result<Self, ParamError> {
        let raw = RawParams::new(pairs, &["range"]);
        let range = match raw.single("range")? {
            None => RangePreset::default(),
            Some(v) => RangePreset::parse(v).ok_or_else(|| ParamError::InvalidChoice {
                field: "range",
                value: v.to_string(),
                expected: "1h, 24h, 7d, 30d",
            })?,
        };
        let mut filter = raw.filter()?;
        let start = filter.start.take();
        let end = filter.end.take();
        Ok(Self {
            range,
            start,
            end,
            filter,
        })
    }

    /// Explicit bounds win; a missing start falls back to `now - range`.
    ///
    /// `now` is truncated to the whole second so requests for the same
    /// named range within one second share a cache key.
    pub fn window(&self, now: DateTime<Utc>) -> TimeWindow {
        let now = now.with_nanosecond(0).unwrap_or(now);
        TimeWindow {
            start: self.start.unwrap_or(now - self.range.span()),
            end: self.end.unwrap_or(now),
        }
    }
}

impl ChartParams {
    pub fn from_pairs(pairs: &[(String, String)]) -> Result<Self, ParamError> {
        let raw = RawParams::new(pairs, &["bucket"]);
        let bucket = match raw.single("bucket")? {
            None => Bucket::default(),
            Some(v) => Bucket::parse(v).ok_or_else(|| ParamError::InvalidChoice {
                field: "bucket",
                value: v.to_string(),
                expected: "minute, hour, day",
            })?,
        };
        let mut filter = raw.filter()?;
        let start = filter.start.take();
        let end = filter.end.take();
        Ok(Self {
            start,
            end,
            bucket,
            filter,
        })
    }

    /// Defaults to the 24 hours ending now.
    pub fn window(&self, now: DateTime<Utc>) -> TimeWindow {
        TimeWindow {
            start: self
                .start
                .unwrap_or(now - RangePreset::LastDay.span()),
            end: self.end.unwrap_or(now),
        }
    }
}

pub fn clamp_limit(requested: i64) -> usize {
    requested.clamp(1, MAX_LIMIT as i64) as usize
}

/// Accepts RFC 3339, a naive date-time (taken as UTC) or a bare date.
pub fn parse_timestamp(field: &'static str, value: &str) -> Result<DateTime<Utc>, ParamError> {
    let v = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(v) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(v, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(naive.and_utc());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(v, "%Y-%m-%dT%H:%M") {
        return Ok(naive.and_utc());
    }
    if let Some(midnight) = NaiveDate::parse_from_str(v, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        return Ok(midnight.and_utc());
    }
    Err(ParamError::InvalidDate {
        field,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_list_defaults() {
        let p = ListParams::from_pairs(&[]).unwrap();
        assert_eq!(p.limit, DEFAULT_LIMIT);
        assert_eq!(p.sort, SortDirection::Desc);
        assert!(p.cursor.is_none());
        assert_eq!(p.filter, Filter::default());
    }

    #[test]
    fn test_limit_is_clamped() {
        let p = ListParams::from_pairs(&pairs(&[("limit", "10000")])).unwrap();
        assert_eq!(p.limit, MAX_LIMIT);
        let p = ListParams::from_pairs(&pairs(&[("limit", "0")])).unwrap();
        assert_eq!(p.limit, 1);
        let p = ListParams::from_pairs(&pairs(&[("limit", "-20")])).unwrap();
        assert_eq!(p.limit, 1);
        let p = ListParams::from_pairs(&pairs(&[("limit", "25")])).unwrap();
        assert_eq!(p.limit, 25);
    }

    #[test]
    fn test_limit_beyond_i64_is_clamped() {
        let p = ListParams::from_pairs(&pairs(&[("limit", "99999999999999999999")])).unwrap();
        assert_eq!(p.limit, MAX_LIMIT);
        let p = ListParams::from_pairs(&pairs(&[("limit", "-99999999999999999999")])).unwrap();
        assert_eq!(p.limit, 1);
    }

    #[test]
    fn test_malformed_values_are_rejected() {
        assert!(matches!(
            ListParams::from_pairs(&pairs(&[("limit", "ten")])),
            Err(ParamError::InvalidNumber { field: "limit", .. })
        ));
        assert!(matches!(
            ListParams::from_pairs(&pairs(&[("sort", "sideways")])),
            Err(ParamError::InvalidChoice { field: "sort", .. })
        ));
        assert!(matches!(
            ListParams::from_pairs(&pairs(&[("start", "last tuesday")])),
            Err(ParamError::InvalidDate { field: "start", .. })
        ));
        assert!(matches!(
            ListParams::from_pairs(&pairs(&[("minDuration", "fast")])),
            Err(ParamError::InvalidNumber { field: "minDuration", .. })
        ));
        assert!(matches!(
            ListParams::from_pairs(&pairs(&[("limit", "5"), ("limit", "6")])),
            Err(ParamError::Repeated { field: "limit" })
        ));
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let p = ListParams::from_pairs(&pairs(&[("_", "1700000000"), ("limit", "3")])).unwrap();
        assert_eq!(p.limit, 3);
    }

    #[test]
    fn test_filter_mapping() {
        let p = ListParams::from_pairs(&pairs(&[
            ("start", "2024-01-01T00:00:00Z"),
            ("end", "2024-01-02"),
            ("status", "FAILED"),
            ("status", "NOT_A_STATUS"),
            ("interfaceName", "payroll"),
            ("qtext", "  timeout  "),
            ("minDuration", "0"),
            ("maxDuration", "5000"),
        ]))
        .unwrap();
        let f = p.filter;
        assert_eq!(f.start.unwrap().to_rfc3339(), "2024-01-01T00:00:00+00:00");
        assert_eq!(f.end.unwrap().to_rfc3339(), "2024-01-02T00:00:00+00:00");
        assert_eq!(f.statuses, vec!["FAILED", "NOT_A_STATUS"]);
        assert_eq!(f.interface_name.as_deref(), Some("payroll"));
        assert_eq!(f.text.as_deref(), Some("timeout"));
        assert_eq!(f.min_duration, None);
        assert_eq!(f.max_duration, Some(5000.0));
    }

    #[test]
    fn test_bracketed_status_keys_join_the_set() {
        let p = ListParams::from_pairs(&pairs(&[
            ("status[]", "SUCCESS"),
            ("status[]", "WARNING"),
        ]))
        .unwrap();
        assert_eq!(p.filter.statuses, vec!["SUCCESS", "WARNING"]);
    }

    #[test]
    fn test_empty_values_are_absent() {
        let p = ListParams::from_pairs(&pairs(&[
            ("start", ""),
            ("status", ""),
            ("qtext", "   "),
            ("cursor", ""),
        ]))
        .unwrap();
        assert_eq!(p.filter, Filter::default());
        assert!(p.cursor.is_none());
    }

    #[test]
    fn test_summary_window_resolution() {
        let now: DateTime<Utc> = "2024-06-01T12:00:00Z".parse().unwrap();

        let p = SummaryParams::from_pairs(&[]).unwrap();
        let w = p.window(now);
        assert_eq!(w.end, now);
        assert_eq!(w.start, now - chrono::Duration::hours(24));

        let p = SummaryParams::from_pairs(&pairs(&[("range", "7d")])).unwrap();
        assert_eq!(p.window(now).start, now - chrono::Duration::days(7));

        let p = SummaryParams::from_pairs(&pairs(&[
            ("range", "1h"),
            ("start", "2024-05-01T00:00:00Z"),
        ]))
        .unwrap();
        assert_eq!(
            p.window(now).start,
            "2024-05-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap()
        );
        assert!(p.filter.start.is_none());

        assert!(matches!(
            SummaryParams::from_pairs(&pairs(&[("range", "2y")])),
            Err(ParamError::InvalidChoice { field: "range", .. })
        ));
    }

    #[test]
    fn test_summary_window_ignores_subsecond_now() {
        let p = SummaryParams::from_pairs(&pairs(&[("range", "24h")])).unwrap();
        let early: DateTime<Utc> = "2024-06-01T12:00:00.014Z".parse().unwrap();
        let late: DateTime<Utc> = "2024-06-01T12:00:00.916Z".parse().unwrap();

        let w = p.window(early);
        assert_eq!(w, p.window(late));
        assert_eq!(w.end, "2024-06-01T12:00:00Z".parse::<DateTime<Utc>>().unwrap());

        // Explicit bounds are kept exactly.
        let p = SummaryParams::from_pairs(&pairs(&[("end", "2024-06-01T11:00:00.250Z")])).unwrap();
        assert_eq!(
            p.window(late).end,
            "2024-06-01T11:00:00.250Z".parse::<DateTime<Utc>>().unwrap()
        );
    }

    #[test]
    fn test_chart_params() {
        let now: DateTime<Utc> = "2024-06-01T12:00:00Z".parse().unwrap();
        let p = ChartParams::from_pairs(&pairs(&[("bucket", "minute"), ("status", "FAILED")]))
            .unwrap();
        assert_eq!(p.bucket, Bucket::Minute);
        assert_eq!(p.filter.statuses, vec!["FAILED"]);
        assert_eq!(p.window(now).start, now - chrono::Duration::hours(24));
        assert!(matches!(
            ChartParams::from_pairs(&pairs(&[("bucket", "fortnight")])),
            Err(ParamError::InvalidChoice { field: "bucket", .. })
        ));
    }

    #[test]
    fn test_naive_timestamps_are_utc() {
        let t = parse_timestamp("start", "2024-01-01T05:06:07.250").unwrap();
        assert_eq!(t.to_rfc3339(), "2024-01-01T05:06:07.250+00:00");
        let t = parse_timestamp("start", "2024-01-01T05:06").unwrap();
        assert_eq!(t.to_rfc3339(), "2024-01-01T05:06:00+00:00");
        let t = parse_timestamp("start", "2024-01-01T05:06:07+02:00").unwrap();
        assert_eq!(t.to_rfc3339(), "2024-01-01T03:06:07+00:00");
    }
}
