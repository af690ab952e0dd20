//! Plain-text rendering of a comment thread.
//!
//! Each comment is a header line and its content, indented two spaces per
//! level:
//!
//! ```text
//! #1 alice (2024-05-01 09:30) [2 replies]
//!   First!
//!   #2 bob (2024-05-01 09:41)
//!     Welcome.
//! ```

use std::fmt::Write as _;

use natter_core::{author::AuthorDirectory, thread::Thread};

const INDENT: &str = "  ";

/// Render `thread`. Hidden comments keep their place (so their replies still
/// make sense) but their text is replaced unless `show_hidden` is set.
pub fn render_thread(
  thread: &Thread,
  authors: &impl AuthorDirectory,
  show_hidden: bool,
) -> String {
  if thread.is_empty() {
    return "No comments yet.\n".to_string();
  }

  let mut out = String::new();
  for (level, node) in thread.walk() {
    let comment = &node.comment;
    let pad = INDENT.repeat(level);

    let _ = write!(
      out,
      "{pad}#{} {} ({})",
      comment.id,
      authors.display_name_or_placeholder(comment.author_id),
      comment.created_at.format("%Y-%m-%d %H:%M"),
    );
    match node.reply_count() {
      0 => {}
      1 => out.push_str(" [1 reply]"),
      n => {
        let _ = write!(out, " [{n} replies]");
      }
    }
    if comment.hidden && show_hidden {
      out.push_str(" [hidden]");
    }
    out.push('\n');

    if comment.hidden && !show_hidden {
      let _ = writeln!(out, "{pad}{INDENT}[hidden]");
      continue;
    }
    for line in comment.content.lines() {
      let _ = writeln!(out, "{pad}{INDENT}{line}");
    }
  }
  out
}
