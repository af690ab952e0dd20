//! Runtime configuration for the `natter` binary.
//!
//! Read from a TOML file (optional) layered with `NATTER_`-prefixed
//! environment variables:
//!
//! ```toml
//! store_path = "~/.local/share/natter/comments.db"
//!
//! [authors]
//! 1 = "alice"
//! 2 = "bob"
//! ```

use std::{
  collections::HashMap,
  path::{Path, PathBuf},
};

use anyhow::Context as _;
use natter_core::{author::AuthorDirectory, comment::AuthorId};
use serde::Deserialize;

// ─── Settings ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
  #[serde(default = "default_store_path")]
  pub store_path: PathBuf,
  /// Author id (as a string key) to display name.
  #[serde(default)]
  pub authors:    HashMap<String, String>,
}

fn default_store_path() -> PathBuf { PathBuf::from("natter.db") }

impl Settings {
  /// Load `path` (if it exists) and the environment. `store_override` wins
  /// over both.
  pub fn load(path: &Path, store_override: Option<&Path>) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("NATTER"))
      .set_override_option(
        "store_path",
        store_override.map(|p| p.to_string_lossy().into_owned()),
      )
      .context("failed to apply --store override")?
      .build()
      .context("failed to read config file")?;

    let mut settings: Settings = settings
      .try_deserialize()
      .context("failed to deserialise Settings")?;
    settings.store_path = expand_tilde(&settings.store_path);
    Ok(settings)
  }

  /// The configured author names, keyed by numeric id.
  pub fn author_directory(&self) -> ConfiguredAuthors {
    let names = self
      .authors
      .iter()
      .filter_map(|(key, name)| match key.trim().parse::<AuthorId>() {
        Ok(id) => Some((id, name.clone())),
        Err(_) => {
          tracing::warn!(key = %key, "ignoring [authors] entry with a non-numeric id");
          None
        }
      })
      .collect();
    ConfiguredAuthors(names)
  }
}

// ─── Author directory ─────────────────────────────────────────────────────────

/// [`AuthorDirectory`] backed by the `[authors]` config table.
pub struct ConfiguredAuthors(HashMap<AuthorId, String>);

impl AuthorDirectory for ConfiguredAuthors {
  fn display_name(&self, author_id: AuthorId) -> Option<String> {
    self.0.display_name(author_id)
  }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn author_directory_skips_bad_keys() {
    let settings = Settings {
      store_path: default_store_path(),
      authors:    HashMap::from([
        ("1".to_string(), "alice".to_string()),
        ("bob".to_string(), "bob".to_string()),
      ]),
    };
    let directory = settings.author_directory();
    assert_eq!(directory.display_name(1).as_deref(), Some("alice"));
    assert_eq!(directory.0.len(), 1);
  }

  #[test]
  fn missing_file_and_override_give_store_path() {
    let settings = Settings::load(
      Path::new("/nonexistent/natter.toml"),
      Some(Path::new("/tmp/override.db")),
    )
    .unwrap();
    assert_eq!(settings.store_path, PathBuf::from("/tmp/override.db"));
    assert!(settings.authors.is_empty());
  }

  #[test]
  fn relative_paths_are_left_alone() {
    assert_eq!(expand_tilde(Path::new("natter.db")), PathBuf::from("natter.db"));
  }
}
