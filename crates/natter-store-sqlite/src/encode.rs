//! Encoding and decoding helpers between domain types and the plain
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 UTC strings (microsecond
//! precision, `Z` suffix) so that `ORDER BY created_at` is chronological.

use chrono::{DateTime, SecondsFormat, Utc};
use natter_core::comment::Comment;

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawComment::from_row`].
pub const COMMENT_COLUMNS: &str =
  "comment_id, subject_id, author_id, content, created_at, hidden, parent_id";

/// Values read directly from a `comments` row.
pub struct RawComment {
  pub comment_id: i64,
  pub subject_id: i64,
  pub author_id:  i64,
  pub content:    String,
  pub created_at: String,
  pub hidden:     bool,
  pub parent_id:  Option<i64>,
}

impl RawComment {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      comment_id: row.get(0)?,
      subject_id: row.get(1)?,
      author_id:  row.get(2)?,
      content:    row.get(3)?,
      created_at: row.get(4)?,
      hidden:     row.get(5)?,
      parent_id:  row.get(6)?,
    })
  }

  pub fn into_comment(self) -> Result<Comment> {
    Ok(Comment {
      id:         self.comment_id,
      subject_id: self.subject_id,
      author_id:  self.author_id,
      content:    self.content,
      created_at: decode_dt(&self.created_at)?,
      parent_id:  self.parent_id,
      hidden:     self.hidden,
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  #[test]
  fn encoded_timestamps_sort_chronologically() {
    let whole = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    let fractional = Utc.timestamp_opt(1_700_000_000, 500_000_000).unwrap();
    let later = Utc.timestamp_opt(1_700_000_001, 0).unwrap();

    let encoded = [encode_dt(whole), encode_dt(fractional), encode_dt(later)];
    assert!(encoded.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(encoded[0], "2023-11-14T22:13:20.000000Z");
  }

  #[test]
  fn timestamp_roundtrip_keeps_microseconds() {
    let dt = Utc.timestamp_opt(1_700_000_000, 123_456_000).unwrap();
    assert_eq!(decode_dt(&encode_dt(dt)).unwrap(), dt);
  }

  #[test]
  fn bad_timestamp_is_reported() {
    assert!(matches!(decode_dt("yesterday"), Err(Error::DateParse(_))));
  }
}
