//! [`MemoryStore`] — an in-process [`CommentStore`].
//!
//! Used as the test double for [`crate::service::CommentService`] and for
//! embedding without a database. Cloning shares the underlying rows.

use std::{
  collections::{BTreeMap, HashMap, HashSet},
  sync::{Arc, Mutex, PoisonError},
};

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
  comment::{Comment, CommentId, NewComment, SubjectId},
  store::CommentStore,
};

#[derive(Debug, Error)]
pub enum MemoryError {
  /// Set via [`MemoryStore::set_unavailable`].
  #[error("store unavailable")]
  Unavailable,

  #[error("store lock poisoned")]
  Poisoned,
}

#[derive(Default)]
struct Inner {
  last_id:      CommentId,
  last_created: Option<DateTime<Utc>>,
  rows:         BTreeMap<CommentId, Comment>,
  unavailable:  bool,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
  inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
  pub fn new() -> Self { Self::default() }

  /// While set, every store call fails with [`MemoryError::Unavailable`].
  pub fn set_unavailable(&self, unavailable: bool) {
    let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
    inner.unavailable = unavailable;
  }

  /// Write a row exactly as given, bypassing id and timestamp assignment.
  /// Lets tests seed corrupt data (dangling or cyclic parents).
  pub fn insert_raw(&self, comment: Comment) -> Result<(), MemoryError> {
    self.with(|inner| {
      inner.last_id = inner.last_id.max(comment.id);
      inner.rows.insert(comment.id, comment);
    })
  }

  fn with<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> Result<R, MemoryError> {
    let mut inner = self.inner.lock().map_err(|_| MemoryError::Poisoned)?;
    if inner.unavailable {
      return Err(MemoryError::Unavailable);
    }
    Ok(f(&mut inner))
  }
}

impl CommentStore for MemoryStore {
  type Error = MemoryError;

  async fn insert(&self, input: NewComment) -> Result<Comment, MemoryError> {
    self.with(|inner| {
      inner.last_id += 1;
      // Keep timestamps non-decreasing so id order and time order agree.
      let now = Utc::now();
      let created_at = inner.last_created.map_or(now, |last| last.max(now));
      inner.last_created = Some(created_at);

      let comment = Comment {
        id: inner.last_id,
        subject_id: input.subject_id,
        author_id: input.author_id,
        content: input.content,
        created_at,
        parent_id: input.parent_id,
        hidden: false,
      };
      inner.rows.insert(comment.id, comment.clone());
      comment
    })
  }

  async fn update_content(
    &self,
    id: CommentId,
    content: String,
  ) -> Result<bool, MemoryError> {
    self.with(|inner| match inner.rows.get_mut(&id) {
      Some(row) => {
        row.content = content;
        true
      }
      None => false,
    })
  }

  async fn set_hidden(
    &self,
    id: CommentId,
    hidden: bool,
  ) -> Result<bool, MemoryError> {
    self.with(|inner| match inner.rows.get_mut(&id) {
      Some(row) => {
        row.hidden = hidden;
        true
      }
      None => false,
    })
  }

  async fn delete(&self, id: CommentId) -> Result<bool, MemoryError> {
    self.with(|inner| inner.rows.remove(&id).is_some())
  }

  async fn delete_subtree(&self, id: CommentId) -> Result<bool, MemoryError> {
    self.with(|inner| {
      if !inner.rows.contains_key(&id) {
        return false;
      }

      let mut replies: HashMap<CommentId, Vec<CommentId>> = HashMap::new();
      for row in inner.rows.values() {
        if let Some(parent) = row.parent_id {
          replies.entry(parent).or_default().push(row.id);
        }
      }

      let mut doomed = HashSet::from([id]);
      let mut frontier = vec![id];
      while let Some(parent) = frontier.pop() {
        for &child in replies.get(&parent).into_iter().flatten() {
          if doomed.insert(child) {
            frontier.push(child);
          }
        }
      }

      inner.rows.retain(|id, _| !doomed.contains(id));
      true
    })
  }

  async fn delete_all_for_subject(
    &self,
    subject_id: SubjectId,
  ) -> Result<bool, MemoryError> {
    self.with(|inner| {
      inner.rows.retain(|_, row| row.subject_id != subject_id);
      true
    })
  }

  async fn fetch(&self, id: CommentId) -> Result<Option<Comment>, MemoryError> {
    self.with(|inner| inner.rows.get(&id).cloned())
  }

  async fn fetch_all_for_subject(
    &self,
    subject_id: SubjectId,
  ) -> Result<Vec<Comment>, MemoryError> {
    self.with(|inner| {
      let mut rows: Vec<Comment> = inner
        .rows
        .values()
        .filter(|row| row.subject_id == subject_id)
        .cloned()
        .collect();
      rows.sort_by_key(|row| (row.created_at, row.id));
      rows
    })
  }

  async fn count_for_subject(
    &self,
    subject_id: SubjectId,
  ) -> Result<u64, MemoryError> {
    self.with(|inner| {
      inner
        .rows
        .values()
        .filter(|row| row.subject_id == subject_id)
        .count() as u64
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const S: SubjectId = 3;

  fn raw(id: CommentId, parent_id: Option<CommentId>) -> Comment {
    Comment {
      id,
      subject_id: S,
      author_id: 1,
      content: format!("comment {id}"),
      created_at: Utc::now(),
      parent_id,
      hidden: false,
    }
  }

  #[tokio::test]
  async fn delete_subtree_terminates_on_parent_cycle() {
    let store = MemoryStore::new();
    store.insert_raw(raw(1, Some(2))).unwrap();
    store.insert_raw(raw(2, Some(1))).unwrap();
    store.insert_raw(raw(3, Some(2))).unwrap();
    store.insert_raw(raw(4, None)).unwrap();

    assert!(store.delete_subtree(1).await.unwrap());
    let left: Vec<CommentId> = store
      .fetch_all_for_subject(S)
      .await
      .unwrap()
      .iter()
      .map(|c| c.id)
      .collect();
    assert_eq!(left, vec![4]);
    assert!(!store.delete_subtree(1).await.unwrap());
  }

  #[tokio::test]
  async fn insert_after_raw_rows_gets_fresh_id() {
    let store = MemoryStore::new();
    store.insert_raw(raw(40, None)).unwrap();
    let next = store
      .insert(NewComment::reply(S, 40, 1, "reply"))
      .await
      .unwrap();
    assert_eq!(next.id, 41);
    assert_eq!(store.count_for_subject(S).await.unwrap(), 2);
  }

  #[tokio::test]
  async fn creation_times_never_go_backwards() {
    let store = MemoryStore::new();
    let mut last = None;
    for i in 0..50 {
      let c = store
        .insert(NewComment::top_level(S, 1, format!("c{i}")))
        .await
        .unwrap();
      if let Some(prev) = last {
        assert!(c.created_at >= prev);
      }
      last = Some(c.created_at);
    }
  }

  #[tokio::test]
  async fn unavailable_store_fails_every_call() {
    let store = MemoryStore::new();
    store.set_unavailable(true);
    assert!(matches!(store.fetch(1).await, Err(MemoryError::Unavailable)));
    assert!(matches!(
      store.insert_raw(raw(1, None)),
      Err(MemoryError::Unavailable)
    ));

    store.set_unavailable(false);
    assert!(store.fetch(1).await.unwrap().is_none());
  }
}
