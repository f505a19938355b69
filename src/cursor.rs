//! Opaque continuation tokens for the execution listing.
//!
//! A cursor pins a position in the `(start_time, id)` order. The token is the
//! URL-safe base64 of `<rfc3339 millis>|<id>`; callers must treat it as opaque.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;

use crate::model::ExecutionRecord;

const SEPARATOR: char = '|';

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CursorError {
    #[error("invalid cursor: {0}")]
    Invalid(&'static str),
}

/// Resume position: the sort key of the last row already returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    pub ts: DateTime<Utc>,
    pub id: i64,
}

impl PageCursor {
    pub fn after(record: &ExecutionRecord) -> Self {
        Self {
            ts: record.start_time,
            id: record.id,
        }
    }

    pub fn encode(&self) -> String {
        let payload = format!(
            "{}{}{}",
            self.ts.to_rfc3339_opts(SecondsFormat::Millis, true),
            SEPARATOR,
            self.id
        );
        URL_SAFE_NO_PAD.encode(payload.as_bytes())
    }

    pub fn decode(token: &str) -> Result<Self, CursorError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token.trim().as_bytes())
            .map_err(|_| CursorError::Invalid("not base64"))?;
        let payload = String::from_utf8(bytes).map_err(|_| CursorError::Invalid("not utf-8"))?;
        let (ts, id) = payload
            .split_once(SEPARATOR)
            .ok_or(CursorError::Invalid("missing separator"))?;
        if ts.is_empty() || id.is_empty() {
            return Err(CursorError::Invalid("missing field"));
        }
        let ts = DateTime::parse_from_rfc3339(ts)
            .map_err(|_| CursorError::Invalid("bad timestamp"))?
            .with_timezone(&Utc);
        let id = id
            .parse::<i64>()
            .map_err(|_| CursorError::Invalid("bad id"))?;
        Ok(Self { ts, id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn test_decode_inverts_encode() {
        let cursor = PageCursor {
            ts: ts("2024-03-05T10:11:12.345Z"),
            id: 982_113,
        };
        let token = cursor.encode();
        assert!(!token.contains('|'));
        assert!(!token.contains('='));
        assert_eq!(PageCursor::decode(&token).unwrap(), cursor);
    }

    #[test]
    fn test_token_is_query_string_safe() {
        let cursor = PageCursor {
            ts: ts("2099-12-31T23:59:59.999Z"),
            id: i64::MAX,
        };
        let token = cursor.encode();
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert_eq!(
            PageCursor::decode("%%%"),
            Err(CursorError::Invalid("not base64"))
        );
        let no_sep = URL_SAFE_NO_PAD.encode("2024-01-01T00:00:00Z");
        assert_eq!(
            PageCursor::decode(&no_sep),
            Err(CursorError::Invalid("missing separator"))
        );
        let no_id = URL_SAFE_NO_PAD.encode("2024-01-01T00:00:00Z|");
        assert_eq!(
            PageCursor::decode(&no_id),
            Err(CursorError::Invalid("missing field"))
        );
        let bad_ts = URL_SAFE_NO_PAD.encode("yesterday|12");
        assert_eq!(
            PageCursor::decode(&bad_ts),
            Err(CursorError::Invalid("bad timestamp"))
        );
        let bad_id = URL_SAFE_NO_PAD.encode("2024-01-01T00:00:00Z|abc");
        assert_eq!(
            PageCursor::decode(&bad_id),
            Err(CursorError::Invalid("bad id"))
        );
    }
}
