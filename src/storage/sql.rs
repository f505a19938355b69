//! Rendering of the typed filter into a parameterised SQLite `WHERE` clause.

use chrono::{DateTime, Utc};
use rusqlite::types::Value;

use crate::cursor::PageCursor;
use crate::query::{Filter, SortDirection};

/// A `WHERE` body plus its positional parameters, in order.
#[derive(Debug, Default)]
pub struct WhereClause {
    clauses: Vec<String>,
    pub params: Vec<Value>,
}

impl WhereClause {
    pub fn from_filter(filter: &Filter) -> Self {
        let mut w = Self::default();

        if let Some(start) = filter.start {
            w.push("start_time >= ?", [Value::Integer(ceil_millis(start))]);
        }
        if let Some(end) = filter.end {
            w.push("start_time <= ?", [Value::Integer(end.timestamp_millis())]);
        }

        if !filter.statuses.is_empty() {
            let marks = vec!["?"; filter.statuses.len()].join(", ");
            w.push(
                format!("status IN ({marks})"),
                filter.statuses.iter().map(|s| Value::Text(s.clone())),
            );
        }

        if let Some(name) = &filter.interface_name {
            w.push(
                "instr(lower(interface_name), lower(?)) > 0",
                [Value::Text(name.clone())],
            );
        }

        if let Some(query) = filter.text.as_deref().and_then(fts_query) {
            w.push(
                "id IN (SELECT rowid FROM executions_fts WHERE executions_fts MATCH ?)",
                [Value::Text(query)],
            );
        }

        if let Some(min) = filter.min_duration {
            w.push("duration >= ?", [Value::Real(min)]);
        }
        if let Some(max) = filter.max_duration {
            w.push("duration <= ?", [Value::Real(max)]);
        }

        w
    }

    /// Strict seek past `cursor` in the given direction.
    pub fn seek(mut self, cursor: &PageCursor, direction: SortDirection) -> Self {
        let op = match direction {
            SortDirection::Desc => "<",
            SortDirection::Asc => ">",
        };
        let ts = cursor.ts.timestamp_millis();
        self.push(
            format!("(start_time {op} ? OR (start_time = ? AND id {op} ?))"),
            [
                Value::Integer(ts),
                Value::Integer(ts),
                Value::Integer(cursor.id),
            ],
        );
        self
    }

    pub fn and(mut self, clause: &str, params: impl IntoIterator<Item = Value>) -> Self {
        self.push(clause, params);
        self
    }

    pub fn sql(&self) -> String {
        if self.clauses.is_empty() {
            "1 = 1".to_string()
        } else {
            self.clauses.join(" AND ")
        }
    }

    fn push(&mut self, clause: impl Into<String>, params: impl IntoIterator<Item = Value>) {
        self.clauses.push(clause.into());
        self.params.extend(params);
    }
}

/// Millisecond timestamp rounded up, so a sub-millisecond lower bound never
/// admits an earlier stored row.
fn ceil_millis(t: DateTime<Utc>) -> i64 {
    let ms = t.timestamp_millis();
    if t.timestamp_subsec_nanos() % 1_000_000 == 0 {
        ms
    } else {
        ms + 1
    }
}

/// Turn free text into an FTS5 query matching any of its terms.
///
/// Every term is quoted so operators and punctuation in user input are
/// searched literally instead of parsed as query syntax.
pub fn fts_query(text: &str) -> Option<String> {
    let terms: Vec<String> = text
        .split_whitespace()
        .map(|t| format!("\"{}\"", t.replace('"', "\"\"")))
        .collect();
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" OR "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_filter_matches_everything() {
        let w = WhereClause::from_filter(&Filter::default());
        assert_eq!(w.sql(), "1 = 1");
        assert!(w.params.is_empty());
    }

    #[test]
    fn test_params_follow_clause_order() {
        let filter = Filter {
            start: Some("2024-01-01T00:00:00Z".parse().unwrap()),
            statuses: vec!["FAILED".into(), "WARNING".into()],
            max_duration: Some(900.0),
            ..Default::default()
        };
        let w = WhereClause::from_filter(&filter);
        assert_eq!(
            w.sql(),
            "start_time >= ? AND status IN (?, ?) AND duration <= ?"
        );
        assert_eq!(
            w.params,
            vec![
                Value::Integer(1_704_067_200_000),
                Value::Text("FAILED".into()),
                Value::Text("WARNING".into()),
                Value::Real(900.0),
            ]
        );
    }

    #[test]
    fn test_subsecond_bounds_stay_inclusive() {
        let filter = Filter {
            start: Some("2024-01-01T00:00:00.0005Z".parse().unwrap()),
            end: Some("2024-01-01T00:00:01.0005Z".parse().unwrap()),
            ..Default::default()
        };
        let w = WhereClause::from_filter(&filter);
        assert_eq!(
            w.params,
            vec![
                Value::Integer(1_704_067_200_001),
                Value::Integer(1_704_067_201_000),
            ]
        );

        let exact = Filter {
            start: Some("2024-01-01T00:00:00.250Z".parse().unwrap()),
            ..Default::default()
        };
        assert_eq!(
            WhereClause::from_filter(&exact).params,
            vec![Value::Integer(1_704_067_200_250)]
        );
    }

    #[test]
    fn test_seek_direction() {
        let cursor = PageCursor {
            ts: "2024-01-01T00:00:00Z".parse().unwrap(),
            id: 9,
        };
        let desc = WhereClause::default().seek(&cursor, SortDirection::Desc);
        assert_eq!(
            desc.sql(),
            "(start_time < ? OR (start_time = ? AND id < ?))"
        );
        let asc = WhereClause::default().seek(&cursor, SortDirection::Asc);
        assert_eq!(asc.sql(), "(start_time > ? OR (start_time = ? AND id > ?))");
        assert_eq!(asc.params.len(), 3);
    }

    #[test]
    fn test_fts_query_quotes_terms() {
        assert_eq!(
            fts_query("socket timeout").as_deref(),
            Some("\"socket\" OR \"timeout\"")
        );
        assert_eq!(
            fts_query("say \"hi\" -x").as_deref(),
            Some("\"say\" OR \"\"\"hi\"\"\" OR \"-x\"")
        );
        assert_eq!(fts_query("   "), None);
    }
}
