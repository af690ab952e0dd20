//! Thread assembly — turning a subject's flat comment rows into a forest.
//!
//! [`build`] is the only way a [`Thread`] is derived from storage. After that
//! a caller holding a `Thread` can keep it current with [`Thread::insert`],
//! [`Thread::remove`] and friends instead of rebuilding it after every
//! successful write.
//!
//! Depth ("level") is never stored on a node. [`Thread::walk`] and
//! [`Thread::level_of`] compute it from the tree shape.
//!
//! Threads may be arbitrarily deep, so nothing here recurses: `Clone`,
//! `PartialEq`, `Debug` and `Drop` on [`CommentNode`] are written out with
//! explicit stacks, and a [`Thread`] serialises as a flat pre-order list of
//! `(level, comment)` entries:
//!
//! ```json
//! { "subject_id": 7,
//!   "comments": [
//!     { "level": 0, "comment": { "id": 1, ... } },
//!     { "level": 1, "comment": { "id": 2, "parent_id": 1, ... } } ] }
//! ```

use std::{collections::HashMap, fmt};

use serde::{Deserialize, Serialize, Serializer, ser::SerializeStruct as _};

use crate::{
  Error,
  comment::{Comment, CommentId, SubjectId},
};

// ─── Nodes ───────────────────────────────────────────────────────────────────

/// A comment together with its replies, oldest first.
pub struct CommentNode {
  pub comment:  Comment,
  pub children: Vec<CommentNode>,
}

impl CommentNode {
  pub fn new(comment: Comment) -> Self {
    Self { comment, children: Vec::new() }
  }

  pub fn id(&self) -> CommentId { self.comment.id }

  /// Number of direct replies.
  pub fn reply_count(&self) -> usize { self.children.len() }

  /// Number of comments below this one, at any depth.
  pub fn descendant_count(&self) -> usize {
    let mut total = 0;
    let mut stack: Vec<&CommentNode> = vec![self];
    while let Some(node) = stack.pop() {
      total += node.children.len();
      stack.extend(node.children.iter());
    }
    total
  }
}

impl Drop for CommentNode {
  fn drop(&mut self) {
    let mut pending = std::mem::take(&mut self.children);
    while let Some(mut node) = pending.pop() {
      pending.append(&mut node.children);
    }
  }
}

impl Clone for CommentNode {
  fn clone(&self) -> Self {
    // (source, next child cursor, children cloned so far); never empty at
    // the top of the loop.
    let mut stack: Vec<(&CommentNode, usize, Vec<CommentNode>)> =
      vec![(self, 0, Vec::with_capacity(self.children.len()))];

    loop {
      let top = stack.len() - 1;
      let (source, cursor) = (stack[top].0, stack[top].1);
      if let Some(child) = source.children.get(cursor) {
        stack[top].1 += 1;
        stack.push((child, 0, Vec::with_capacity(child.children.len())));
        continue;
      }

      let (source, _, children) = stack.swap_remove(top);
      let node = CommentNode { comment: source.comment.clone(), children };
      match stack.last_mut() {
        Some((_, _, siblings)) => siblings.push(node),
        None => return node,
      }
    }
  }
}

impl PartialEq for CommentNode {
  fn eq(&self, other: &Self) -> bool {
    let mut pairs = vec![(self, other)];
    while let Some((a, b)) = pairs.pop() {
      if a.comment != b.comment || a.children.len() != b.children.len() {
        return false;
      }
      pairs.extend(a.children.iter().zip(&b.children));
    }
    true
  }
}

impl Eq for CommentNode {}

impl fmt::Debug for CommentNode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CommentNode")
      .field("comment", &self.comment)
      .field("replies", &self.reply_count())
      .field("descendants", &self.descendant_count())
      .finish_non_exhaustive()
  }
}

// ─── Thread ──────────────────────────────────────────────────────────────────

/// The forest of comments on one subject. Roots and every child list are in
/// creation order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "FlatThread")]
pub struct Thread {
  pub subject_id: SubjectId,
  pub roots:      Vec<CommentNode>,
}

impl Thread {
  pub fn empty(subject_id: SubjectId) -> Self {
    Self { subject_id, roots: Vec::new() }
  }

  pub fn is_empty(&self) -> bool { self.roots.is_empty() }

  /// Total number of comments in the forest.
  pub fn len(&self) -> usize {
    self.roots.iter().map(|r| 1 + r.descendant_count()).sum()
  }

  /// Depth-first, pre-order traversal yielding `(level, node)`; roots are
  /// level 0.
  pub fn walk(&self) -> Walk<'_> {
    Walk { stack: self.roots.iter().rev().map(|n| (0, n)).collect() }
  }

  pub fn find(&self, id: CommentId) -> Option<&CommentNode> {
    self.walk().map(|(_, n)| n).find(|n| n.id() == id)
  }

  /// Depth of `id` in this forest, or `None` if it is not present.
  pub fn level_of(&self, id: CommentId) -> Option<usize> {
    self.walk().find(|(_, n)| n.id() == id).map(|(level, _)| level)
  }

  pub fn contains(&self, id: CommentId) -> bool { self.find(id).is_some() }

  // ── Incremental mutation ──────────────────────────────────────────────

  /// Place a freshly created comment. It is appended after its siblings, so
  /// it must be newer than everything already in the thread.
  ///
  /// A comment whose parent is not in the thread becomes a root, matching
  /// what [`build`] would do. Returns the level it landed at, or `None` if
  /// the comment belongs to another subject or its id is already present.
  pub fn insert(&mut self, comment: Comment) -> Option<usize> {
    if comment.subject_id != self.subject_id || self.contains(comment.id) {
      return None;
    }

    let parent_path = comment
      .parent_id
      .filter(|&p| p != comment.id)
      .and_then(|p| self.path_to(p));

    match parent_path {
      Some(path) => {
        let level = path.len();
        self.node_at_mut(&path)?.children.push(CommentNode::new(comment));
        Some(level)
      }
      None => {
        self.roots.push(CommentNode::new(comment));
        Some(0)
      }
    }
  }

  /// Detach `id` and its whole reply subtree.
  pub fn remove(&mut self, id: CommentId) -> Option<CommentNode> {
    let path = self.path_to(id)?;
    let (&last, parent) = path.split_last()?;
    if parent.is_empty() {
      return Some(self.roots.remove(last));
    }
    let parent = self.node_at_mut(parent)?;
    Some(parent.children.remove(last))
  }

  pub fn set_hidden(&mut self, id: CommentId, hidden: bool) -> bool {
    self.with_comment(id, |c| c.hidden = hidden)
  }

  pub fn update_content(&mut self, id: CommentId, content: String) -> bool {
    self.with_comment(id, |c| c.content = content)
  }

  fn with_comment(
    &mut self,
    id: CommentId,
    f: impl FnOnce(&mut Comment),
  ) -> bool {
    let Some(path) = self.path_to(id) else {
      return false;
    };
    match self.node_at_mut(&path) {
      Some(node) => {
        f(&mut node.comment);
        true
      }
      None => false,
    }
  }

  /// Child indices leading from `roots` to `id`.
  fn path_to(&self, id: CommentId) -> Option<Vec<usize>> {
    let mut path = Vec::new();
    let mut stack: Vec<(usize, usize, &CommentNode)> = self
      .roots
      .iter()
      .enumerate()
      .rev()
      .map(|(i, n)| (0, i, n))
      .collect();

    while let Some((depth, index, node)) = stack.pop() {
      path.truncate(depth);
      path.push(index);
      if node.id() == id {
        return Some(path);
      }
      stack.extend(
        node
          .children
          .iter()
          .enumerate()
          .rev()
          .map(|(i, c)| (depth + 1, i, c)),
      );
    }
    None
  }

  fn node_at_mut(&mut self, path: &[usize]) -> Option<&mut CommentNode> {
    let (first, rest) = path.split_first()?;
    let mut node = self.roots.get_mut(*first)?;
    for &i in rest {
      node = node.children.get_mut(i)?;
    }
    Some(node)
  }
}

/// Iterator returned by [`Thread::walk`].
pub struct Walk<'a> {
  stack: Vec<(usize, &'a CommentNode)>,
}

impl<'a> Iterator for Walk<'a> {
  type Item = (usize, &'a CommentNode);

  fn next(&mut self) -> Option<Self::Item> {
    let (level, node) = self.stack.pop()?;
    self
      .stack
      .extend(node.children.iter().rev().map(|c| (level + 1, c)));
    Some((level, node))
  }
}

// ─── Serialisation ───────────────────────────────────────────────────────────

#[derive(Serialize, Deserialize)]
struct FlatEntry<C> {
  level:   usize,
  comment: C,
}

#[derive(Deserialize)]
struct FlatThread {
  subject_id: SubjectId,
  comments:   Vec<FlatEntry<Comment>>,
}

/// The pre-order walk, serialised as a sequence without collecting it.
struct FlatWalk<'a>(&'a Thread);

impl Serialize for FlatWalk<'_> {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(
      self
        .0
        .walk()
        .map(|(level, node)| FlatEntry { level, comment: &node.comment }),
    )
  }
}

impl Serialize for Thread {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let mut state = serializer.serialize_struct("Thread", 2)?;
    state.serialize_field("subject_id", &self.subject_id)?;
    state.serialize_field("comments", &FlatWalk(self))?;
    state.end()
  }
}

impl TryFrom<FlatThread> for Thread {
  type Error = Error;

  /// Rebuild the forest from pre-order entries. Each entry's level may be at
  /// most one deeper than the entry before it.
  fn try_from(flat: FlatThread) -> Result<Self, Error> {
    let mut roots = Vec::new();
    // The chain of still-open ancestors; `open[i]` sits at level `i`.
    let mut open: Vec<CommentNode> = Vec::new();

    fn close(open: &mut Vec<CommentNode>, roots: &mut Vec<CommentNode>) {
      if let Some(done) = open.pop() {
        match open.last_mut() {
          Some(parent) => parent.children.push(done),
          None => roots.push(done),
        }
      }
    }

    for entry in flat.comments {
      if entry.level > open.len() {
        return Err(Error::InvalidInput(format!(
          "comment {} is at level {} but follows a comment at level {}",
          entry.comment.id,
          entry.level,
          open.len().saturating_sub(1),
        )));
      }
      while open.len() > entry.level {
        close(&mut open, &mut roots);
      }
      open.push(CommentNode::new(entry.comment));
    }
    while !open.is_empty() {
      close(&mut open, &mut roots);
    }

    Ok(Thread { subject_id: flat.subject_id, roots })
  }
}

// ─── Builder ─────────────────────────────────────────────────────────────────

/// Assemble a subject's rows into a [`Thread`].
///
/// `rows` must be in creation order (as returned by
/// [`crate::store::CommentStore::fetch_all_for_subject`]); that order is kept
/// among roots and among the replies to any one comment.
///
/// Never drops a row:
/// - a `parent_id` that matches no row, or that points at the row itself,
///   makes the row a root;
/// - rows caught in a parent cycle (only possible with corrupt data) are
///   promoted to roots after the regular ones, in input order.
pub fn build(subject_id: SubjectId, rows: Vec<Comment>) -> Thread {
  let n = rows.len();

  let mut index: HashMap<CommentId, usize> = HashMap::with_capacity(n);
  for (i, row) in rows.iter().enumerate() {
    index.entry(row.id).or_insert(i);
  }

  let mut kids: Vec<Vec<usize>> = vec![Vec::new(); n];
  let mut root_rows = Vec::new();
  for (i, row) in rows.iter().enumerate() {
    let parent = match row.parent_id {
      None => None,
      Some(p) if p == row.id => {
        tracing::warn!(comment_id = row.id, "comment lists itself as parent");
        None
      }
      Some(p) => {
        let found = index.get(&p).copied();
        if found.is_none() {
          tracing::debug!(
            comment_id = row.id,
            parent_id = p,
            "dangling parent; placing comment at root"
          );
        }
        found
      }
    };
    match parent {
      Some(p) => kids[p].push(i),
      None => root_rows.push(i),
    }
  }

  let mut slots: Vec<Option<Comment>> = rows.into_iter().map(Some).collect();
  let mut visited = vec![false; n];
  let mut roots = Vec::with_capacity(root_rows.len());

  for r in root_rows {
    roots.extend(assemble(r, &kids, &mut slots, &mut visited));
  }

  for i in 0..n {
    if !visited[i] {
      tracing::warn!(
        subject_id,
        comment_id = ?slots[i].as_ref().map(|c| c.id),
        "comment unreachable from any root (parent cycle); promoting to root"
      );
      roots.extend(assemble(i, &kids, &mut slots, &mut visited));
    }
  }

  Thread { subject_id, roots }
}

/// Iteratively build the owned subtree rooted at row `root`, skipping rows
/// that were already placed elsewhere.
fn assemble(
  root: usize,
  kids: &[Vec<usize>],
  slots: &mut [Option<Comment>],
  visited: &mut [bool],
) -> Option<CommentNode> {
  // (row, next child cursor, children assembled so far)
  let mut stack: Vec<(usize, usize, Vec<CommentNode>)> =
    vec![(root, 0, Vec::new())];
  visited[root] = true;

  loop {
    let (row, cursor, _) = stack.last_mut()?;
    if let Some(&child) = kids[*row].get(*cursor) {
      *cursor += 1;
      if !visited[child] {
        visited[child] = true;
        stack.push((child, 0, Vec::new()));
      }
      continue;
    }

    let (row, _, children) = stack.pop()?;
    let node = CommentNode { comment: slots[row].take()?, children };
    match stack.last_mut() {
      Some((_, _, siblings)) => siblings.push(node),
      None => return Some(node),
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::{TimeZone, Utc};

  use super::*;

  const SUBJECT: SubjectId = 7;

  fn row(id: CommentId, parent_id: Option<CommentId>) -> Comment {
    Comment {
      id,
      subject_id: SUBJECT,
      author_id: 1,
      content: format!("comment {id}"),
      created_at: Utc.timestamp_opt(1_700_000_000 + id, 0).unwrap(),
      parent_id,
      hidden: false,
    }
  }

  fn ids(nodes: &[CommentNode]) -> Vec<CommentId> {
    nodes.iter().map(CommentNode::id).collect()
  }

  fn walked(thread: &Thread) -> Vec<(usize, CommentId)> {
    thread.walk().map(|(l, n)| (l, n.id())).collect()
  }

  /// A -> {B -> {C}, D}
  fn scenario() -> Vec<Comment> {
    vec![row(1, None), row(2, Some(1)), row(3, Some(2)), row(4, Some(1))]
  }

  // ─── Builder ───────────────────────────────────────────────────────────────

  #[test]
  fn empty_input_builds_empty_forest() {
    let thread = build(SUBJECT, vec![]);
    assert!(thread.is_empty());
    assert_eq!(thread.len(), 0);
  }

  #[test]
  fn builds_nested_scenario() {
    let thread = build(SUBJECT, scenario());

    assert_eq!(ids(&thread.roots), vec![1]);
    let a = &thread.roots[0];
    assert_eq!(ids(&a.children), vec![2, 4]);
    assert_eq!(ids(&a.children[0].children), vec![3]);
    assert!(a.children[1].children.is_empty());
    assert_eq!(thread.len(), 4);
    assert_eq!(a.reply_count(), 2);
    assert_eq!(a.descendant_count(), 3);
  }

  #[test]
  fn walk_reports_derived_levels() {
    let thread = build(SUBJECT, scenario());
    assert_eq!(walked(&thread), vec![(0, 1), (1, 2), (2, 3), (1, 4)]);
    assert_eq!(thread.level_of(3), Some(2));
    assert_eq!(thread.level_of(99), None);
  }

  #[test]
  fn siblings_and_roots_keep_input_order() {
    let rows = vec![
      row(1, None),
      row(2, None),
      row(3, Some(1)),
      row(4, Some(2)),
      row(5, Some(1)),
      row(6, None),
      row(7, Some(1)),
    ];
    let thread = build(SUBJECT, rows);
    assert_eq!(ids(&thread.roots), vec![1, 2, 6]);
    assert_eq!(ids(&thread.roots[0].children), vec![3, 5, 7]);
    assert_eq!(ids(&thread.roots[1].children), vec![4]);
  }

  #[test]
  fn dangling_parent_becomes_root() {
    let rows = vec![row(1, None), row(2, Some(42)), row(3, Some(2))];
    let thread = build(SUBJECT, rows);
    assert_eq!(ids(&thread.roots), vec![1, 2]);
    assert_eq!(ids(&thread.roots[1].children), vec![3]);
  }

  #[test]
  fn self_reference_becomes_root() {
    let rows = vec![row(1, None), row(2, Some(2))];
    let thread = build(SUBJECT, rows);
    assert_eq!(ids(&thread.roots), vec![1, 2]);
    assert!(thread.roots[1].children.is_empty());
  }

  #[test]
  fn reply_listed_before_its_parent_still_attaches() {
    let rows = vec![row(5, Some(9)), row(9, None)];
    let thread = build(SUBJECT, rows);
    assert_eq!(ids(&thread.roots), vec![9]);
    assert_eq!(ids(&thread.roots[0].children), vec![5]);
  }

  #[test]
  fn parent_cycle_is_promoted_without_loss() {
    // 2 and 3 point at each other; neither is reachable from a real root.
    let rows = vec![row(1, None), row(2, Some(3)), row(3, Some(2))];
    let thread = build(SUBJECT, rows);

    assert_eq!(ids(&thread.roots), vec![1, 2]);
    assert_eq!(ids(&thread.roots[1].children), vec![3]);
    assert!(thread.roots[1].children[0].children.is_empty());
    assert_eq!(thread.len(), 3);
  }

  #[test]
  fn every_row_appears_exactly_once() {
    // Deterministic pseudo-random forest with some dangling parents mixed in.
    let mut rows = Vec::new();
    let mut seed: i64 = 17;
    for id in 1..=300 {
      seed = (seed * 1_103_515_245 + 12_345) % 2_147_483_648;
      let parent = match seed % 5 {
        0 => None,
        1 => Some(10_000 + id),
        _ if id > 1 => Some(1 + seed % (id - 1)),
        _ => None,
      };
      rows.push(row(id, parent));
    }

    let thread = build(SUBJECT, rows);
    let mut seen: Vec<CommentId> = thread.walk().map(|(_, n)| n.id()).collect();
    assert_eq!(seen.len(), 300);
    seen.sort_unstable();
    assert_eq!(seen, (1..=300).collect::<Vec<_>>());

    // Children are always in ascending id (= creation) order.
    for (_, node) in thread.walk() {
      let child_ids = ids(&node.children);
      assert!(child_ids.windows(2).all(|w| w[0] < w[1]));
    }
  }

  #[test]
  fn deep_chain_does_not_overflow() {
    let rows: Vec<Comment> = (1..=50_000)
      .map(|id| row(id, (id > 1).then(|| id - 1)))
      .collect();
    let thread = build(SUBJECT, rows);
    assert_eq!(thread.roots.len(), 1);
    assert_eq!(thread.len(), 50_000);
    assert_eq!(thread.level_of(50_000), Some(49_999));
  }

  // ─── Incremental mutation ──────────────────────────────────────────────────

  #[test]
  fn insert_matches_rebuild() {
    let mut thread = build(SUBJECT, scenario());
    assert_eq!(thread.insert(row(5, Some(3))), Some(3));
    assert_eq!(thread.insert(row(6, None)), Some(0));
    assert_eq!(thread.insert(row(7, Some(404))), Some(0));

    let mut all = scenario();
    all.extend([row(5, Some(3)), row(6, None), row(7, Some(404))]);
    assert_eq!(thread, build(SUBJECT, all));
  }

  #[test]
  fn insert_rejects_foreign_subject_and_duplicates() {
    let mut thread = build(SUBJECT, scenario());
    let mut foreign = row(8, Some(1));
    foreign.subject_id = SUBJECT + 1;
    assert_eq!(thread.insert(foreign), None);
    assert_eq!(thread.insert(row(2, Some(1))), None);
    assert_eq!(thread.len(), 4);
  }

  #[test]
  fn remove_detaches_whole_subtree() {
    let mut thread = build(SUBJECT, scenario());
    let removed = thread.remove(2).expect("present");
    assert_eq!(removed.id(), 2);
    assert_eq!(ids(&removed.children), vec![3]);
    assert_eq!(walked(&thread), vec![(0, 1), (1, 4)]);

    assert!(thread.remove(3).is_none());
    assert!(thread.remove(1).is_some());
    assert!(thread.is_empty());
  }

  #[test]
  fn set_hidden_and_update_content_in_place() {
    let mut thread = build(SUBJECT, scenario());
    assert!(thread.set_hidden(3, true));
    assert!(thread.set_hidden(3, true));
    assert!(thread.find(3).unwrap().comment.hidden);

    assert!(thread.update_content(4, "edited".into()));
    assert_eq!(thread.find(4).unwrap().comment.content, "edited");

    assert!(!thread.set_hidden(99, true));
    assert!(!thread.update_content(99, "nope".into()));
  }

  // ─── Deep threads and serialisation ────────────────────────────────────────

  fn deep_chain(depth: CommentId) -> Thread {
    let rows = (1..=depth).map(|id| row(id, (id > 1).then(|| id - 1))).collect();
    build(SUBJECT, rows)
  }

  #[test]
  fn thread_serialises_as_flat_preorder() {
    let thread = build(SUBJECT, scenario());
    let json = serde_json::to_value(&thread).unwrap();
    assert_eq!(json["subject_id"], SUBJECT);

    let entries: Vec<(u64, i64)> = json["comments"]
      .as_array()
      .unwrap()
      .iter()
      .map(|e| (e["level"].as_u64().unwrap(), e["comment"]["id"].as_i64().unwrap()))
      .collect();
    assert_eq!(entries, vec![(0, 1), (1, 2), (2, 3), (1, 4)]);
  }

  #[test]
  fn json_round_trip_keeps_shape() {
    let mut rows = scenario();
    rows.extend([row(5, None), row(6, Some(404)), row(7, Some(6))]);
    let thread = build(SUBJECT, rows);

    let json = serde_json::to_string(&thread).unwrap();
    let back: Thread = serde_json::from_str(&json).unwrap();
    assert_eq!(back, thread);
  }

  #[test]
  fn deserialise_rejects_level_jumps() {
    let json = serde_json::json!({
      "subject_id": SUBJECT,
      "comments": [
        { "level": 0, "comment": row(1, None) },
        { "level": 2, "comment": row(2, Some(1)) },
      ],
    });
    let err = serde_json::from_value::<Thread>(json).unwrap_err();
    assert!(err.to_string().contains("level 2"));
  }

  #[test]
  fn deep_chain_clones_compares_and_serialises() {
    let thread = deep_chain(50_000);

    let copy = thread.clone();
    assert_eq!(copy.len(), 50_000);
    assert!(copy == thread);

    let mut edited = thread.clone();
    assert!(edited.update_content(50_000, "changed".into()));
    assert!(edited != thread);

    let json = serde_json::to_string(&thread).unwrap();
    let back: Thread = serde_json::from_str(&json).unwrap();
    assert!(back == thread);
    assert_eq!(back.level_of(50_000), Some(49_999));

    assert!(format!("{:?}", thread.roots[0]).contains("descendants: 49999"));
  }
}
