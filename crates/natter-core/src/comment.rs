//! Comment records — the rows the store persists.
//!
//! A comment's position in a thread is carried only by `parent_id`. Its depth
//! is never stored; it is derived from the assembled [`Thread`] when needed.
//!
//! [`Thread`]: crate::thread::Thread

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Store-assigned comment identifier.
pub type CommentId = i64;

/// Identifier of the post (or other commentable entity) a comment belongs to.
pub type SubjectId = i64;

/// Opaque reference to the authoring user.
pub type AuthorId = i64;

// ─── Comment ─────────────────────────────────────────────────────────────────

/// A persisted comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
  pub id:         CommentId,
  pub subject_id: SubjectId,
  pub author_id:  AuthorId,
  pub content:    String,
  /// Store-assigned timestamp; never changes after creation.
  pub created_at: DateTime<Utc>,
  /// `None` for a top-level comment. Write-once.
  pub parent_id:  Option<CommentId>,
  /// Moderation flag. Only affects display.
  pub hidden:     bool,
}

impl Comment {
  pub fn is_top_level(&self) -> bool { self.parent_id.is_none() }
}

// ─── NewComment ──────────────────────────────────────────────────────────────

/// Input to [`crate::store::CommentStore::insert`].
/// `id` and `created_at` are always set by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewComment {
  pub subject_id: SubjectId,
  pub author_id:  AuthorId,
  pub content:    String,
  pub parent_id:  Option<CommentId>,
}

impl NewComment {
  pub fn top_level(
    subject_id: SubjectId,
    author_id: AuthorId,
    content: impl Into<String>,
  ) -> Self {
    Self { subject_id, author_id, content: content.into(), parent_id: None }
  }

  pub fn reply(
    subject_id: SubjectId,
    parent_id: CommentId,
    author_id: AuthorId,
    content: impl Into<String>,
  ) -> Self {
    Self {
      subject_id,
      author_id,
      content: content.into(),
      parent_id: Some(parent_id),
    }
  }
}
