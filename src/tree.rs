//! Edit nodes and the tree container that owns them.
//!
//! Edits form a tree: a parent edit covers all of its children, siblings
//! never overlap, and children are kept sorted by offset. Newly created
//! edits are unparented; they are linked with [`EditTree::add_child`] and
//! executed by handing a root to the processor.
//!
//! # Architecture
//!
//! All nodes live in an [`EditTree`] arena and are addressed by [`EditId`]
//! handles. The arena owns every node for the lifetime of the tree;
//! removing a child only unlinks it, so it can be inspected or re-added
//! later. Ids are the identity of an edit: they are `Copy + Eq + Ord +
//! Hash` and are what the copier keys its map on.
//!
//! # Well-formedness
//!
//! - a parent edit covers all its children
//! - siblings don't overlap
//! - an edit with length 0 can't have any children (group edits excepted)
//!
//! Any mutation that would violate one of these fails eagerly with
//! [`MalformedTree`] and leaves both trees untouched. Several insertion
//! points may share one offset; they are ordered by arrival, and that order
//! is observable because it determines apply order.
//!
//! # Basic usage
//!
//! ```ignore
//! use edit_tree::tree::EditTree;
//!
//! let mut tree = EditTree::new();
//! let root = tree.multi();
//! let www = tree.insert(0, "www.");
//! let eclipse = tree.insert(0, "eclipse.");
//! tree.add_child(root, www)?;
//! tree.add_child(root, eclipse)?;
//! ```

use std::{
  collections::BTreeMap,
  num::NonZeroUsize,
};

use smallvec::SmallVec;
use thiserror::Error;

use crate::{
  span::Span,
  Tendril,
};

pub type Result<T> = std::result::Result<T, MalformedTree>;

/// Handle to an edit owned by an [`EditTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EditId(NonZeroUsize);

impl EditId {
  pub const fn new(id: NonZeroUsize) -> Self {
    Self(id)
  }

  pub const fn get(self) -> NonZeroUsize {
    self.0
  }
}

impl From<NonZeroUsize> for EditId {
  fn from(value: NonZeroUsize) -> Self {
    Self::new(value)
  }
}

/// A structural invariant was violated.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum MalformedTree {
  #[error("edit {child:?} overlaps a sibling under {parent:?}")]
  Overlapping { parent: EditId, child: EditId },
  #[error("edit {child:?} is not covered by {parent:?}")]
  OutsideParent { parent: EditId, child: EditId },
  #[error("zero-length edit {parent:?} cannot take children")]
  ZeroLengthParent { parent: EditId, child: EditId },
  #[error("edit {edit:?} is marked as deleted")]
  DeletedEdit { edit: EditId },
  #[error("edit {child:?} already has a parent")]
  AlreadyParented { parent: EditId, child: EditId },
  #[error("children of {parent:?} are not in ascending offset order")]
  UnsortedChildren { parent: EditId },
  #[error("edit {edit:?} has no paired partner edit")]
  MissingPartner { edit: EditId },
  #[error("edits {from_edit:?} and {to_edit:?} do not reference each other")]
  BrokenPair { from_edit: EditId, to_edit: EditId },
  #[error("the partner of {edit:?} is outside the applied tree")]
  PartnerOutsideTree { edit: EditId },
  #[error("edit {root:?} extends past document length {len}")]
  OutOfDocument { root: EditId, len: usize },
}

/// Cross-reference state carried by move and copy sources.
///
/// `content` and `scratch` are transient apply-time state; they are cleared
/// at the start of every apply and never survive a copy.
#[derive(Debug, Clone, Default)]
pub struct SourceLink {
  pub(crate) target:  Option<EditId>,
  pub(crate) content: Option<Tendril>,
  pub(crate) scratch: Option<EditId>,
}

impl SourceLink {
  /// The paired target edit, if one has been linked.
  pub fn target(&self) -> Option<EditId> {
    self.target
  }
}

/// Variant data of an edit node.
#[derive(Debug, Clone)]
pub enum EditKind {
  /// Inserts `text` at the edit's offset; length is always 0.
  Insert { text: Tendril },
  /// Removes the edit's range.
  Delete,
  /// Removes the edit's range and inserts `text` in its place.
  Replace { text: Tendril },
  /// Structural grouping; performs no document change. An undefined multi
  /// auto-expands to the coverage of its children until it is itself
  /// parented.
  Multi { defined: bool },
  /// Records a region and tracks it through application.
  RangeMarker,
  /// Designates a region whose text is moved to the paired target; the
  /// region itself is removed on apply.
  MoveSource(SourceLink),
  /// Insertion point receiving the text of the paired move source.
  MoveTarget { source: Option<EditId> },
  /// Designates a region whose text is copied to the paired target.
  CopySource(SourceLink),
  /// Insertion point receiving the text of the paired copy source.
  CopyTarget { source: Option<EditId> },
}

/// Variant discriminant without payload, for dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum KindTag {
  Insert,
  Delete,
  Replace,
  Multi,
  RangeMarker,
  MoveSource,
  MoveTarget,
  CopySource,
  CopyTarget,
}

#[derive(Debug, Clone)]
pub(crate) struct EditNode {
  pub(crate) span:     Span,
  pub(crate) deleted:  bool,
  pub(crate) parent:   Option<EditId>,
  pub(crate) children: SmallVec<[EditId; 2]>,
  pub(crate) delta:    isize,
  pub(crate) kind:     EditKind,
}

/// Arena owning every edit node and the links between them.
#[derive(Debug, Clone)]
pub struct EditTree {
  nodes:   BTreeMap<EditId, EditNode>,
  next_id: NonZeroUsize,
}

impl Default for EditTree {
  fn default() -> Self {
    Self::new()
  }
}

impl EditTree {
  pub fn new() -> Self {
    Self {
      nodes:   BTreeMap::new(),
      next_id: NonZeroUsize::new(1).expect("nonzero"),
    }
  }

  fn alloc(&mut self, span: Span, kind: EditKind) -> EditId {
    let id = EditId::new(self.next_id);
    let next = self.next_id.get().saturating_add(1);
    self.next_id = NonZeroUsize::new(next).unwrap_or(self.next_id);
    self.nodes.insert(id, EditNode {
      span,
      deleted: false,
      parent: None,
      children: SmallVec::new(),
      delta: 0,
      kind,
    });
    id
  }

  // Constructors.
  //

  /// An insertion of `text` at `offset`.
  pub fn insert(&mut self, offset: usize, text: impl Into<Tendril>) -> EditId {
    self.alloc(Span::point(offset), EditKind::Insert { text: text.into() })
  }

  /// A removal of `length` chars at `offset`.
  pub fn delete(&mut self, offset: usize, length: usize) -> EditId {
    self.alloc(Span::new(offset, length), EditKind::Delete)
  }

  /// A replacement of `length` chars at `offset` with `text`.
  pub fn replace(&mut self, offset: usize, length: usize, text: impl Into<Tendril>) -> EditId {
    self.alloc(Span::new(offset, length), EditKind::Replace { text: text.into() })
  }

  /// A group edit whose region grows to cover its children. While empty its
  /// region is `(0, 0)`; the region freezes when the group itself is added
  /// to a parent.
  pub fn multi(&mut self) -> EditId {
    self.alloc(Span::point(0), EditKind::Multi { defined: false })
  }

  /// A group edit with a fixed region.
  pub fn multi_spanning(&mut self, offset: usize, length: usize) -> EditId {
    self.alloc(Span::new(offset, length), EditKind::Multi { defined: true })
  }

  /// A marker that produces no document change but has its region tracked
  /// through application.
  pub fn range_marker(&mut self, offset: usize, length: usize) -> EditId {
    self.alloc(Span::new(offset, length), EditKind::RangeMarker)
  }

  /// The source half of a move pair. Pair it with [`EditTree::move_target`].
  pub fn move_source(&mut self, offset: usize, length: usize) -> EditId {
    self.alloc(Span::new(offset, length), EditKind::MoveSource(SourceLink::default()))
  }

  /// The target half of a move pair: an insertion point at `offset` that
  /// receives the source's text. Links both partner references; `source`
  /// must be an unpaired move source.
  pub fn move_target(&mut self, offset: usize, source: EditId) -> EditId {
    let id = self.alloc(Span::point(offset), EditKind::MoveTarget { source: Some(source) });
    match &mut self.node_mut(source).kind {
      EditKind::MoveSource(link) => {
        assert!(link.target.is_none(), "move source is already paired");
        link.target = Some(id);
      },
      _ => panic!("edit {source:?} is not a move source"),
    }
    id
  }

  /// The source half of a copy pair. Unlike a move source, the region stays
  /// in place on apply.
  pub fn copy_source(&mut self, offset: usize, length: usize) -> EditId {
    self.alloc(Span::new(offset, length), EditKind::CopySource(SourceLink::default()))
  }

  /// The target half of a copy pair; see [`EditTree::move_target`].
  pub fn copy_target(&mut self, offset: usize, source: EditId) -> EditId {
    let id = self.alloc(Span::point(offset), EditKind::CopyTarget { source: Some(source) });
    match &mut self.node_mut(source).kind {
      EditKind::CopySource(link) => {
        assert!(link.target.is_none(), "copy source is already paired");
        link.target = Some(id);
      },
      _ => panic!("edit {source:?} is not a copy source"),
    }
    id
  }

  // Accessors.
  //

  pub(crate) fn node(&self, id: EditId) -> &EditNode {
    self.nodes.get(&id).expect("unknown edit id")
  }

  pub(crate) fn node_mut(&mut self, id: EditId) -> &mut EditNode {
    self.nodes.get_mut(&id).expect("unknown edit id")
  }

  /// The edit's region, or `None` once the edit has been marked deleted.
  pub fn span(&self, id: EditId) -> Option<Span> {
    let node = self.node(id);
    (!node.deleted).then_some(node.span)
  }

  /// The edit's offset. Only meaningful while the edit is alive.
  pub fn offset(&self, id: EditId) -> usize {
    self.node(id).span.offset
  }

  /// The edit's length. Only meaningful while the edit is alive.
  pub fn length(&self, id: EditId) -> usize {
    self.node(id).span.length
  }

  /// The position one past the edit's region.
  pub fn exclusive_end(&self, id: EditId) -> usize {
    self.node(id).span.exclusive_end()
  }

  /// Whether the edit's region was removed by an enclosing change.
  pub fn is_deleted(&self, id: EditId) -> bool {
    self.node(id).deleted
  }

  pub fn parent(&self, id: EditId) -> Option<EditId> {
    self.node(id).parent
  }

  pub fn children(&self, id: EditId) -> &[EditId] {
    &self.node(id).children
  }

  pub fn has_children(&self, id: EditId) -> bool {
    !self.node(id).children.is_empty()
  }

  pub fn child_count(&self, id: EditId) -> usize {
    self.node(id).children.len()
  }

  pub fn kind(&self, id: EditId) -> &EditKind {
    &self.node(id).kind
  }

  pub(crate) fn kind_mut(&mut self, id: EditId) -> &mut EditKind {
    &mut self.node_mut(id).kind
  }

  pub(crate) fn kind_tag(&self, id: EditId) -> KindTag {
    match self.node(id).kind {
      EditKind::Insert { .. } => KindTag::Insert,
      EditKind::Delete => KindTag::Delete,
      EditKind::Replace { .. } => KindTag::Replace,
      EditKind::Multi { .. } => KindTag::Multi,
      EditKind::RangeMarker => KindTag::RangeMarker,
      EditKind::MoveSource(_) => KindTag::MoveSource,
      EditKind::MoveTarget { .. } => KindTag::MoveTarget,
      EditKind::CopySource(_) => KindTag::CopySource,
      EditKind::CopyTarget { .. } => KindTag::CopyTarget,
    }
  }

  /// The paired edit of a move/copy source or target, if any.
  pub fn partner(&self, id: EditId) -> Option<EditId> {
    match &self.node(id).kind {
      EditKind::MoveSource(link) | EditKind::CopySource(link) => link.target,
      EditKind::MoveTarget { source } | EditKind::CopyTarget { source } => *source,
      _ => None,
    }
  }

  /// Whether edit `id` covers `other`. Deleted edits cover nothing, and a
  /// zero-length edit can't cover any other edit.
  pub fn covers(&self, id: EditId, other: EditId) -> bool {
    let (a, b) = (self.node(id), self.node(other));
    !a.deleted && !b.deleted && a.span.covers(b.span)
  }

  /// The smallest span containing every non-deleted edit in `edits`, or
  /// `None` when all of them are deleted. Requires at least one input.
  pub fn coverage(&self, edits: &[EditId]) -> Option<Span> {
    assert!(!edits.is_empty(), "coverage requires at least one edit");
    Span::coverage(
      edits
        .iter()
        .map(|&id| self.node(id))
        .filter(|node| !node.deleted)
        .map(|node| node.span),
    )
  }

  // Parent and child management.
  //

  /// Links `child` below `parent`, keeping children sorted by offset.
  ///
  /// Fails if the child is deleted or already parented, if the parent does
  /// not cover it, or if it overlaps a sibling. On failure neither edit is
  /// changed. An undefined group child freezes its region here; an
  /// undefined group parent expands to cover the new child instead of
  /// being checked for coverage.
  pub fn add_child(&mut self, parent: EditId, child: EditId) -> Result<()> {
    assert!(parent != child, "edit cannot be its own child");

    let parent_node = self.node(parent);
    let parent_span = parent_node.span;
    let open_multi = matches!(parent_node.kind, EditKind::Multi { defined: false });
    if parent_node.deleted {
      return Err(MalformedTree::DeletedEdit { edit: parent });
    }

    let child_node = self.node(child);
    if child_node.deleted {
      return Err(MalformedTree::DeletedEdit { edit: child });
    }
    if child_node.parent.is_some() {
      return Err(MalformedTree::AlreadyParented { parent, child });
    }

    // An undefined group takes its region the moment it is parented: the
    // coverage of its children, or an insertion point at the parent offset.
    let freeze_child = matches!(child_node.kind, EditKind::Multi { defined: false });
    let child_span = if freeze_child && child_node.children.is_empty() {
      Span::point(parent_span.offset)
    } else if freeze_child {
      self
        .coverage(&self.node(child).children.clone())
        .expect("live children have coverage")
    } else {
      child_node.span
    };

    if !open_multi {
      if parent_span.is_empty() {
        return Err(MalformedTree::ZeroLengthParent { parent, child });
      }
      if !parent_span.covers(child_span) {
        return Err(MalformedTree::OutsideParent { parent, child });
      }
    }

    let index = self.insertion_index(parent, child, child_span)?;

    if freeze_child {
      let node = self.node_mut(child);
      node.span = child_span;
      node.kind = EditKind::Multi { defined: true };
    }
    self.node_mut(parent).children.insert(index, child);
    self.node_mut(child).parent = Some(parent);

    if open_multi {
      let coverage = self
        .coverage(&self.node(parent).children.clone())
        .expect("group has at least one child");
      self.node_mut(parent).span = coverage;
    }
    Ok(())
  }

  /// Links every edit in `children` below `parent`, stopping at the first
  /// failure. Earlier children stay linked; the caller cleans up.
  pub fn add_children(
    &mut self,
    parent: EditId,
    children: impl IntoIterator<Item = EditId>,
  ) -> Result<()> {
    for child in children {
      self.add_child(parent, child)?;
    }
    Ok(())
  }

  /// Binary search for the slot a new child belongs in. The comparison
  /// raises on overlap, so a child that fits nowhere fails here.
  fn insertion_index(&self, parent: EditId, child: EditId, child_span: Span) -> Result<usize> {
    let children = &self.node(parent).children;
    if children.is_empty() {
      return Ok(0);
    }
    let last = self.node(*children.last().expect("nonempty")).span;
    if last.precedes(child_span) {
      return Ok(children.len());
    }

    let mut lo = 0;
    let mut hi = children.len();
    while lo < hi {
      let mid = (lo + hi) / 2;
      let existing = self.node(children[mid]).span;
      if existing.precedes(child_span) {
        // Ties between stacked insertion points resolve here too: the
        // earlier arrival sorts first, so the search keeps moving right.
        lo = mid + 1;
      } else if child_span.precedes(existing) {
        hi = mid;
      } else {
        return Err(MalformedTree::Overlapping { parent, child });
      }
    }
    Ok(lo)
  }

  /// Unlinks the given child. Returns whether the parent contained it. The
  /// node stays allocated and can be re-added.
  pub fn remove_child(&mut self, parent: EditId, child: EditId) -> bool {
    let children = &mut self.node_mut(parent).children;
    let Some(index) = children.iter().position(|&c| c == child) else {
      return false;
    };
    children.remove(index);
    self.node_mut(child).parent = None;
    true
  }

  /// Unlinks and returns the child at `index`. Panics when the index is out
  /// of range.
  pub fn remove_child_at(&mut self, parent: EditId, index: usize) -> EditId {
    let child = self.node_mut(parent).children.remove(index);
    self.node_mut(child).parent = None;
    child
  }

  /// Unlinks and returns all children in order.
  pub fn remove_children(&mut self, parent: EditId) -> Vec<EditId> {
    let children: Vec<EditId> = std::mem::take(&mut self.node_mut(parent).children).into_vec();
    for &child in &children {
      self.node_mut(child).parent = None;
    }
    children
  }

  // Validation.
  //

  /// Re-checks the structural invariants over the subtree rooted at `root`:
  /// no deleted edits, parents contain their children, siblings are sorted
  /// and disjoint, and non-group zero-length edits are childless.
  pub fn validate(&self, root: EditId) -> Result<()> {
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
      let node = self.node(id);
      if node.deleted {
        return Err(MalformedTree::DeletedEdit { edit: id });
      }
      if node.span.is_empty()
        && !node.children.is_empty()
        && !matches!(node.kind, EditKind::Multi { .. })
      {
        return Err(MalformedTree::ZeroLengthParent {
          parent: id,
          child:  node.children[0],
        });
      }

      let mut prev: Option<Span> = None;
      for &child in &node.children {
        let child_node = self.node(child);
        if child_node.deleted {
          return Err(MalformedTree::DeletedEdit { edit: child });
        }
        let child_span = child_node.span;
        if !node.span.contains_span(child_span) {
          return Err(MalformedTree::OutsideParent { parent: id, child });
        }
        if let Some(prev_span) = prev {
          if !prev_span.precedes(child_span) {
            return Err(if child_span.precedes(prev_span) {
              MalformedTree::UnsortedChildren { parent: id }
            } else {
              MalformedTree::Overlapping { parent: id, child }
            });
          }
        }
        prev = Some(child_span);
        stack.push(child);
      }
    }
    Ok(())
  }

  // Offset and length updating, used by the processor.
  //

  pub(crate) fn adjust_offset(&mut self, id: EditId, delta: isize) {
    let node = self.node_mut(id);
    if node.deleted {
      return;
    }
    let offset = node.span.offset as isize + delta;
    assert!(offset >= 0, "offset shifted below zero");
    node.span.offset = offset as usize;
  }

  pub(crate) fn adjust_length(&mut self, id: EditId, delta: isize) {
    let node = self.node_mut(id);
    if node.deleted {
      return;
    }
    let length = node.span.length as isize + delta;
    assert!(length >= 0, "length shrunk below zero");
    node.span.length = length as usize;
  }

  pub(crate) fn mark_deleted(&mut self, id: EditId) {
    self.node_mut(id).deleted = true;
  }

  /// Marks the whole subtree rooted at `id` as deleted.
  pub(crate) fn delete_subtree(&mut self, id: EditId) {
    self.mark_deleted(id);
    let children: SmallVec<[EditId; 2]> = self.node(id).children.clone();
    for child in children {
      self.delete_subtree(child);
    }
  }

  /// Shifts the whole subtree rooted at `id` by `delta`.
  pub(crate) fn shift_subtree(&mut self, id: EditId, delta: isize) {
    self.adjust_offset(id, delta);
    let children: SmallVec<[EditId; 2]> = self.node(id).children.clone();
    for child in children {
      self.shift_subtree(child, delta);
    }
  }

  /// Re-homes every child of `from` under `to`, keeping their order and
  /// bypassing validation. `to` must be childless.
  pub(crate) fn adopt_children(&mut self, to: EditId, from: EditId) {
    debug_assert!(self.node(to).children.is_empty());
    let children = std::mem::take(&mut self.node_mut(from).children);
    for &child in &children {
      self.node_mut(child).parent = Some(to);
    }
    self.node_mut(to).children = children;
  }

  /// Appends `child` under `parent` without validation; the caller
  /// guarantees order and coverage.
  pub(crate) fn attach_raw(&mut self, parent: EditId, child: EditId) {
    debug_assert!(self.node(child).parent.is_none());
    self.node_mut(parent).children.push(child);
    self.node_mut(child).parent = Some(parent);
  }

  /// Clones span, deleted flag, and variant payload of `id` into a fresh
  /// unparented node. Transient state (delta, stashed source content) is
  /// not carried over; partner references still point at the originals
  /// until the copier rewires them.
  pub(crate) fn clone_node(&mut self, id: EditId) -> EditId {
    let node = self.node(id);
    let span = node.span;
    let deleted = node.deleted;
    let kind = match &node.kind {
      EditKind::Insert { text } => EditKind::Insert { text: text.clone() },
      EditKind::Delete => EditKind::Delete,
      EditKind::Replace { text } => EditKind::Replace { text: text.clone() },
      EditKind::Multi { defined } => EditKind::Multi { defined: *defined },
      EditKind::RangeMarker => EditKind::RangeMarker,
      EditKind::MoveSource(link) => EditKind::MoveSource(SourceLink {
        target:  link.target,
        content: None,
        scratch: None,
      }),
      EditKind::MoveTarget { source } => EditKind::MoveTarget { source: *source },
      EditKind::CopySource(link) => EditKind::CopySource(SourceLink {
        target:  link.target,
        content: None,
        scratch: None,
      }),
      EditKind::CopyTarget { source } => EditKind::CopyTarget { source: *source },
    };
    let copy = self.alloc(span, kind);
    self.node_mut(copy).deleted = deleted;
    copy
  }

  /// Drops the subtree rooted at `id` from the arena entirely. The subtree
  /// must be unparented.
  pub(crate) fn discard_subtree(&mut self, id: EditId) {
    debug_assert!(self.node(id).parent.is_none());
    let children: SmallVec<[EditId; 2]> = self.node(id).children.clone();
    for child in children {
      self.node_mut(child).parent = None;
      self.discard_subtree(child);
    }
    self.nodes.remove(&id);
  }

  /// Clears transient apply-time state on a node.
  pub(crate) fn reset_transients(&mut self, id: EditId) {
    let node = self.node_mut(id);
    node.delta = 0;
    if let EditKind::MoveSource(link) | EditKind::CopySource(link) = &mut node.kind {
      link.content = None;
      link.scratch = None;
    }
  }
}
