//! [`SqliteStore`] — the SQLite implementation of [`CommentStore`].

use std::path::Path;

use chrono::{SubsecRound as _, Utc};
use rusqlite::OptionalExtension as _;

use natter_core::{
  comment::{Comment, CommentId, NewComment, SubjectId},
  store::CommentStore,
};

use crate::{
  Result,
  encode::{COMMENT_COLUMNS, RawComment, encode_dt},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A comment store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

#[cfg(test)]
impl SqliteStore {
  /// Run raw SQL against the connection, for seeding corrupt rows.
  pub(crate) async fn conn_for_tests<F>(&self, f: F)
  where
    F: FnOnce(&mut rusqlite::Connection) -> tokio_rusqlite::Result<()>
      + Send
      + 'static,
  {
    self.conn.call(f).await.expect("raw sql");
  }
}

// ─── CommentStore impl ───────────────────────────────────────────────────────

impl CommentStore for SqliteStore {
  type Error = crate::Error;

  // ── Writes ────────────────────────────────────────────────────────────────

  async fn insert(&self, input: NewComment) -> Result<Comment> {
    // Truncate to what the column can hold so the returned record equals a
    // later fetch.
    let created_at = Utc::now().trunc_subsecs(6);
    let at_str     = encode_dt(created_at);
    let content    = input.content.clone();

    let id: CommentId = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO comments (
             subject_id, author_id, content, created_at, hidden, parent_id
           ) VALUES (?1, ?2, ?3, ?4, 0, ?5)",
          rusqlite::params![
            input.subject_id,
            input.author_id,
            content,
            at_str,
            input.parent_id,
          ],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    Ok(Comment {
      id,
      subject_id: input.subject_id,
      author_id: input.author_id,
      content: input.content,
      created_at,
      parent_id: input.parent_id,
      hidden: false,
    })
  }

  async fn update_content(&self, id: CommentId, content: String) -> Result<bool> {
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE comments SET content = ?1 WHERE comment_id = ?2",
          rusqlite::params![content, id],
        )?)
      })
      .await?;
    Ok(changed > 0)
  }

  async fn set_hidden(&self, id: CommentId, hidden: bool) -> Result<bool> {
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE comments SET hidden = ?1 WHERE comment_id = ?2",
          rusqlite::params![hidden, id],
        )?)
      })
      .await?;
    Ok(changed > 0)
  }

  async fn delete(&self, id: CommentId) -> Result<bool> {
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM comments WHERE comment_id = ?1",
          rusqlite::params![id],
        )?)
      })
      .await?;
    Ok(changed > 0)
  }

  async fn delete_subtree(&self, id: CommentId) -> Result<bool> {
    let deleted = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        // UNION (not UNION ALL) so a corrupt parent cycle terminates.
        let deleted = tx.execute(
          "WITH RECURSIVE subtree(id) AS (
             SELECT comment_id FROM comments WHERE comment_id = ?1
             UNION
             SELECT c.comment_id
             FROM comments c
             JOIN subtree s ON c.parent_id = s.id
           )
           DELETE FROM comments WHERE comment_id IN (SELECT id FROM subtree)",
          rusqlite::params![id],
        )?;
        tx.commit()?;
        Ok(deleted)
      })
      .await?;

    tracing::debug!(comment_id = id, rows = deleted, "deleted subtree");
    Ok(deleted > 0)
  }

  async fn delete_all_for_subject(&self, subject_id: SubjectId) -> Result<bool> {
    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM comments WHERE subject_id = ?1",
          rusqlite::params![subject_id],
        )?)
      })
      .await?;

    tracing::debug!(subject_id, rows = deleted, "deleted subject comments");
    Ok(true)
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn fetch(&self, id: CommentId) -> Result<Option<Comment>> {
    let raw: Option<RawComment> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE comment_id = ?1"),
            rusqlite::params![id],
            RawComment::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawComment::into_comment).transpose()
  }

  async fn fetch_all_for_subject(&self, subject_id: SubjectId) -> Result<Vec<Comment>> {
    let raws: Vec<RawComment> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {COMMENT_COLUMNS}
           FROM comments
           WHERE subject_id = ?1
           ORDER BY created_at ASC, comment_id ASC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![subject_id], RawComment::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawComment::into_comment).collect()
  }

  async fn count_for_subject(&self, subject_id: SubjectId) -> Result<u64> {
    let count: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COUNT(*) FROM comments WHERE subject_id = ?1",
          rusqlite::params![subject_id],
          |row| row.get(0),
        )?)
      })
      .await?;

    Ok(u64::try_from(count).unwrap_or_default())
  }
}
