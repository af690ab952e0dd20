//! `natter` — command-line front end for threaded comments.
//!
//! Reads `natter.toml` (or the path given with `--config`), opens the SQLite
//! comment store, and runs one operation.
//!
//! # Usage
//!
//! ```text
//! natter post  --subject 1 --author 1 "First!"
//! natter reply --subject 1 --parent 1 --author 2 "Welcome."
//! natter show  --subject 1
//! ```

mod render;
mod settings;

use std::{path::PathBuf, process::ExitCode};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use natter_core::{
  Error,
  comment::{AuthorId, CommentId, SubjectId},
  service::CommentService,
};
use natter_store_sqlite::SqliteStore;
use settings::Settings;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "natter", version, about = "Threaded comments over a SQLite store")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, value_name = "FILE", default_value = "natter.toml")]
  config: PathBuf,

  /// Database file; overrides `store_path` from the config.
  #[arg(long, value_name = "FILE")]
  store: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Post a top-level comment.
  Post {
    #[arg(long)]
    subject: SubjectId,
    #[arg(long)]
    author:  AuthorId,
    content: String,
  },
  /// Reply to an existing comment.
  Reply {
    #[arg(long)]
    subject: SubjectId,
    #[arg(long)]
    parent:  CommentId,
    #[arg(long)]
    author:  AuthorId,
    content: String,
  },
  /// Replace a comment's text.
  Edit { id: CommentId, content: String },
  /// Delete a comment and all replies beneath it.
  Delete { id: CommentId },
  /// Hide a comment from regular readers.
  Hide { id: CommentId },
  /// Make a hidden comment visible again.
  Unhide { id: CommentId },
  /// Flip a comment's hidden flag.
  Toggle { id: CommentId },
  /// Print the thread for a subject.
  Show {
    #[arg(long)]
    subject: SubjectId,
    /// Include the text of hidden comments (moderator view).
    #[arg(long)]
    all:     bool,
    /// Print the thread as JSON instead of text.
    #[arg(long)]
    json:    bool,
  },
  /// Print the number of comments on a subject.
  Count {
    #[arg(long)]
    subject: SubjectId,
  },
  /// Delete every comment on a subject.
  Purge {
    #[arg(long)]
    subject: SubjectId,
  },
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> ExitCode {
  // Logs go to stderr so command output stays pipeable.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();
  let settings = match Settings::load(&cli.config, cli.store.as_deref()) {
    Ok(settings) => settings,
    Err(e) => {
      tracing::error!(error = ?e, "failed to load configuration");
      eprintln!(
        "error: could not load configuration from {}",
        cli.config.display()
      );
      return ExitCode::FAILURE;
    }
  };

  let service = match open_service(&settings).await {
    Ok(service) => service,
    Err(err) => return report(&err),
  };

  match run(&service, &settings, cli.command).await {
    Ok(output) => {
      print!("{output}");
      ExitCode::SUCCESS
    }
    Err(e) => match e.downcast_ref::<Error>() {
      Some(err) => report(err),
      None => {
        eprintln!("error: {e:#}");
        ExitCode::FAILURE
      }
    },
  }
}

async fn open_service(
  settings: &Settings,
) -> natter_core::Result<CommentService<SqliteStore>> {
  let store = SqliteStore::open(&settings.store_path).await.map_err(|e| {
    Error::persistence(
      format!("failed to open store at {}", settings.store_path.display()),
      e,
    )
  })?;
  Ok(CommentService::new(store))
}

/// Print the user-facing message for `err`; storage causes only reach the
/// log.
fn report(err: &Error) -> ExitCode {
  if err.is_persistence() {
    tracing::error!(error = %err, "store operation failed");
  }
  eprintln!("error: {}", user_message(err));
  ExitCode::FAILURE
}

// ─── Dispatch ─────────────────────────────────────────────────────────────────

async fn run(
  service: &CommentService<SqliteStore>,
  settings: &Settings,
  command: Command,
) -> anyhow::Result<String> {
  let output = match command {
    Command::Post { subject, author, content } => {
      let id = service.add_top_level(subject, author, &content).await?;
      format!("posted comment #{id}\n")
    }
    Command::Reply { subject, parent, author, content } => {
      let id = service.add_reply(subject, parent, author, &content).await?;
      format!("posted reply #{id} to #{parent}\n")
    }
    Command::Edit { id, content } => {
      service.edit(id, &content).await?;
      format!("edited comment #{id}\n")
    }
    Command::Delete { id } => {
      service.delete(id).await?;
      format!("deleted comment #{id} and its replies\n")
    }
    Command::Hide { id } => {
      service.set_hidden(id, true).await?;
      format!("comment #{id} is hidden\n")
    }
    Command::Unhide { id } => {
      service.set_hidden(id, false).await?;
      format!("comment #{id} is visible\n")
    }
    Command::Toggle { id } => {
      let state = if service.toggle_hidden(id).await? { "hidden" } else { "visible" };
      format!("comment #{id} is {state}\n")
    }
    Command::Show { subject, all, json } => {
      let thread = service.get_thread(subject).await?;
      if json {
        let mut out =
          serde_json::to_string_pretty(&thread).context("encoding thread as JSON")?;
        out.push('\n');
        out
      } else {
        render::render_thread(&thread, &settings.author_directory(), all)
      }
    }
    Command::Count { subject } => {
      format!("{}\n", service.count(subject).await?)
    }
    Command::Purge { subject } => {
      service.delete_all_for_subject(subject).await?;
      format!("deleted all comments on subject {subject}\n")
    }
  };
  Ok(output)
}

/// What the user sees for a failed operation. Storage details stay in the
/// log.
fn user_message(err: &Error) -> String {
  match err {
    Error::InvalidInput(msg) => msg.clone(),
    Error::NotFound(id) => format!("comment #{id} does not exist"),
    Error::Persistence { .. } => {
      "could not reach the comment store, please try again".to_string()
    }
  }
}
