//! The `CommentStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `natter-store-sqlite`,
//! or [`crate::memory::MemoryStore`] in tests). [`crate::service`] depends on
//! this abstraction, not on any concrete backend.

use std::future::Future;

use crate::comment::{Comment, CommentId, NewComment, SubjectId};

/// Abstraction over a durable comment store.
///
/// Methods that address a single comment return `Ok(false)` (or `Ok(None)`)
/// when the id does not exist; `Err` is reserved for backend faults. Backends
/// perform no retries.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes.
pub trait CommentStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Writes ────────────────────────────────────────────────────────────

  /// Persist a new comment. The store assigns `id` and `created_at`.
  fn insert(
    &self,
    input: NewComment,
  ) -> impl Future<Output = Result<Comment, Self::Error>> + Send + '_;

  /// Replace the content of a comment. `created_at`, `parent_id` and
  /// `hidden` are left untouched.
  fn update_content(
    &self,
    id: CommentId,
    content: String,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Set the moderation flag. Setting it to its current value still
  /// returns `true`.
  fn set_hidden(
    &self,
    id: CommentId,
    hidden: bool,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Delete a single row. Replies to it are left in place; use
  /// [`CommentStore::delete_subtree`] to cascade.
  fn delete(
    &self,
    id: CommentId,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Delete `id` and every comment whose parent chain leads back to it, as
  /// one atomic operation.
  fn delete_subtree(
    &self,
    id: CommentId,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Delete every comment on a subject. Succeeds even when there are none.
  fn delete_all_for_subject(
    &self,
    subject_id: SubjectId,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// Retrieve a comment by id. Returns `None` if not found.
  fn fetch(
    &self,
    id: CommentId,
  ) -> impl Future<Output = Result<Option<Comment>, Self::Error>> + Send + '_;

  /// All comments on a subject, ordered by `created_at` ascending with ties
  /// broken by `id` ascending.
  fn fetch_all_for_subject(
    &self,
    subject_id: SubjectId,
  ) -> impl Future<Output = Result<Vec<Comment>, Self::Error>> + Send + '_;

  /// Number of comments on a subject, hidden and nested ones included.
  fn count_for_subject(
    &self,
    subject_id: SubjectId,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;
}
