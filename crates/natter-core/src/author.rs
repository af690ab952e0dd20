//! Resolving author references to display names.
//!
//! User accounts live outside this crate. Presentation code asks an
//! [`AuthorDirectory`] for names; the service never does.

use std::collections::HashMap;

use crate::comment::AuthorId;

pub trait AuthorDirectory {
  /// The display name for `author_id`, if known.
  fn display_name(&self, author_id: AuthorId) -> Option<String>;

  /// Like [`AuthorDirectory::display_name`] but never empty-handed.
  fn display_name_or_placeholder(&self, author_id: AuthorId) -> String {
    self
      .display_name(author_id)
      .unwrap_or_else(|| format!("user #{author_id}"))
  }
}

impl AuthorDirectory for HashMap<AuthorId, String> {
  fn display_name(&self, author_id: AuthorId) -> Option<String> {
    self.get(&author_id).cloned()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn falls_back_to_placeholder() {
    let directory = HashMap::from([(1, "alice".to_string())]);
    assert_eq!(directory.display_name_or_placeholder(1), "alice");
    assert_eq!(directory.display_name_or_placeholder(2), "user #2");
  }
}
