//! Error types for `natter-core`.

use thiserror::Error;

use crate::comment::CommentId;

#[derive(Debug, Error)]
pub enum Error {
  /// Empty or whitespace-only content, or a reply aimed at a comment on a
  /// different subject. Nothing was written.
  #[error("invalid input: {0}")]
  InvalidInput(String),

  /// The target comment (or the parent of a reply) does not exist.
  #[error("comment not found: {0}")]
  NotFound(CommentId),

  /// The backing store failed or rejected the operation.
  #[error("{context}: {source}")]
  Persistence {
    context: String,
    #[source]
    source:  Box<dyn std::error::Error + Send + Sync>,
  },
}

impl Error {
  /// Wrap a store error with the operation that produced it.
  pub fn persistence<E>(context: impl Into<String>, source: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Persistence { context: context.into(), source: Box::new(source) }
  }

  pub fn is_not_found(&self) -> bool { matches!(self, Self::NotFound(_)) }

  pub fn is_invalid_input(&self) -> bool {
    matches!(self, Self::InvalidInput(_))
  }

  pub fn is_persistence(&self) -> bool {
    matches!(self, Self::Persistence { .. })
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
