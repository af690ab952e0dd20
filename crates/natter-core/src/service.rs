//! [`CommentService`] — the operation surface presentation code calls.
//!
//! The service validates the shape of its input and maps store outcomes onto
//! [`Error`]. Whether the caller is allowed to perform an operation (author
//! or moderator) is decided before the call; the service does not check.

use std::collections::HashSet;

use crate::{
  Error, Result,
  comment::{AuthorId, Comment, CommentId, NewComment, SubjectId},
  store::CommentStore,
  thread::{self, Thread},
};

/// Comment operations over a [`CommentStore`] handle.
///
/// Construct one at startup and pass it to whoever needs it; cloning is as
/// cheap as cloning the store.
#[derive(Clone)]
pub struct CommentService<S> {
  store: S,
}

impl<S: CommentStore> CommentService<S> {
  pub fn new(store: S) -> Self { Self { store } }

  pub fn store(&self) -> &S { &self.store }

  // ── Creation ──────────────────────────────────────────────────────────

  /// Post a top-level comment on `subject_id`.
  pub async fn add_top_level(
    &self,
    subject_id: SubjectId,
    author_id: AuthorId,
    content: &str,
  ) -> Result<CommentId> {
    let content = validate_content(content)?;
    let comment = self
      .store
      .insert(NewComment::top_level(subject_id, author_id, content))
      .await
      .map_err(|e| {
        Error::persistence(format!("insert failed for subject={subject_id}"), e)
      })?;

    tracing::debug!(comment_id = comment.id, subject_id, "added comment");
    Ok(comment.id)
  }

  /// Reply to `parent_id`, which must exist and belong to `subject_id`.
  pub async fn add_reply(
    &self,
    subject_id: SubjectId,
    parent_id: CommentId,
    author_id: AuthorId,
    content: &str,
  ) -> Result<CommentId> {
    let content = validate_content(content)?;
    let parent = self.get(parent_id).await?;
    if parent.subject_id != subject_id {
      return Err(Error::InvalidInput(format!(
        "comment {parent_id} belongs to subject {}, not {subject_id}",
        parent.subject_id
      )));
    }

    let comment = self
      .store
      .insert(NewComment::reply(subject_id, parent_id, author_id, content))
      .await
      .map_err(|e| {
        Error::persistence(format!("insert failed for reply to id={parent_id}"), e)
      })?;

    // The level costs one fetch per ancestor and only feeds the log line.
    if tracing::enabled!(tracing::Level::DEBUG) {
      match self.depth_of(&parent).await {
        Ok(depth) => {
          tracing::debug!(
            comment_id = comment.id,
            parent_id,
            level = depth + 1,
            "added reply"
          );
        }
        Err(e) => {
          tracing::debug!(comment_id = comment.id, parent_id, error = %e, "added reply");
        }
      }
    }
    Ok(comment.id)
  }

  // ── Mutation ──────────────────────────────────────────────────────────

  pub async fn edit(&self, id: CommentId, content: &str) -> Result<bool> {
    let content = validate_content(content)?;
    let updated = self
      .store
      .update_content(id, content)
      .await
      .map_err(|e| Error::persistence(format!("update_content failed for id={id}"), e))?;
    if !updated {
      return Err(Error::NotFound(id));
    }
    tracing::debug!(comment_id = id, "edited comment");
    Ok(true)
  }

  /// Delete a comment together with every reply beneath it.
  pub async fn delete(&self, id: CommentId) -> Result<bool> {
    let deleted = self
      .store
      .delete_subtree(id)
      .await
      .map_err(|e| Error::persistence(format!("delete_subtree failed for id={id}"), e))?;
    if !deleted {
      return Err(Error::NotFound(id));
    }
    tracing::debug!(comment_id = id, "deleted comment subtree");
    Ok(true)
  }

  pub async fn set_hidden(&self, id: CommentId, hidden: bool) -> Result<bool> {
    let updated = self
      .store
      .set_hidden(id, hidden)
      .await
      .map_err(|e| Error::persistence(format!("set_hidden failed for id={id}"), e))?;
    if !updated {
      return Err(Error::NotFound(id));
    }
    tracing::debug!(comment_id = id, hidden, "set comment visibility");
    Ok(true)
  }

  /// Flip the moderation flag and return the new value.
  pub async fn toggle_hidden(&self, id: CommentId) -> Result<bool> {
    let hidden = !self.get(id).await?.hidden;
    self.set_hidden(id, hidden).await?;
    Ok(hidden)
  }

  /// Remove every comment on a subject, e.g. when the post itself is deleted.
  pub async fn delete_all_for_subject(&self, subject_id: SubjectId) -> Result<bool> {
    let deleted = self
      .store
      .delete_all_for_subject(subject_id)
      .await
      .map_err(|e| {
        Error::persistence(
          format!("delete_all_for_subject failed for subject={subject_id}"),
          e,
        )
      })?;
    tracing::debug!(subject_id, "deleted all comments for subject");
    Ok(deleted)
  }

  // ── Reads ─────────────────────────────────────────────────────────────

  pub async fn get(&self, id: CommentId) -> Result<Comment> {
    self
      .store
      .fetch(id)
      .await
      .map_err(|e| Error::persistence(format!("fetch failed for id={id}"), e))?
      .ok_or(Error::NotFound(id))
  }

  /// Depth of a comment, derived by following stored parent links.
  pub async fn level_of(&self, id: CommentId) -> Result<usize> {
    let comment = self.get(id).await?;
    self.depth_of(&comment).await
  }

  /// The assembled comment forest for `subject_id`.
  pub async fn get_thread(&self, subject_id: SubjectId) -> Result<Thread> {
    let rows = self
      .store
      .fetch_all_for_subject(subject_id)
      .await
      .map_err(|e| {
        Error::persistence(
          format!("fetch_all_for_subject failed for subject={subject_id}"),
          e,
        )
      })?;
    Ok(thread::build(subject_id, rows))
  }

  /// Flat number of comments on a subject, hidden and nested included.
  pub async fn count(&self, subject_id: SubjectId) -> Result<u64> {
    self.store.count_for_subject(subject_id).await.map_err(|e| {
      Error::persistence(format!("count_for_subject failed for subject={subject_id}"), e)
    })
  }

  /// Walk up the parent chain. Stops at a dangling parent (which the thread
  /// builder would treat as a root) and at any cycle.
  async fn depth_of(&self, comment: &Comment) -> Result<usize> {
    let mut level = 0;
    let mut seen = HashSet::from([comment.id]);
    let mut next = comment.parent_id;

    while let Some(parent_id) = next {
      if !seen.insert(parent_id) {
        break;
      }
      let parent = self
        .store
        .fetch(parent_id)
        .await
        .map_err(|e| Error::persistence(format!("fetch failed for id={parent_id}"), e))?;
      match parent {
        Some(parent) => {
          level += 1;
          next = parent.parent_id;
        }
        None => break,
      }
    }
    Ok(level)
  }
}

/// Trimmed content, or `InvalidInput` if nothing is left.
fn validate_content(content: &str) -> Result<String> {
  let trimmed = content.trim();
  if trimmed.is_empty() {
    return Err(Error::InvalidInput("comment content must not be empty".into()));
  }
  Ok(trimmed.to_owned())
}
