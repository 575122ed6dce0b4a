//! Four-pass execution of an edit tree against a document.
//!
//! Applying a tree runs, in order:
//!
//! 1. **Integrity check** - re-verifies the structural invariants, the
//!    pairing of move/copy edits, and that the root fits inside the
//!    document. Nothing has been touched when this pass fails.
//! 2. **Source computation** - move/copy sources read their text from the
//!    still-unmodified document. Nested edits below a source are applied to
//!    a scratch copy of that text, so the paired target later inserts the
//!    transformed result.
//! 3. **Document updating** - children execute before their parents,
//!    highest offset first, so regions earlier in the document keep valid
//!    offsets while later regions change. Every executed edit is a single
//!    `replace` on the document, and its inverse is recorded for the undo
//!    edit.
//! 4. **Region updating** - only with [`Style::UPDATE_REGIONS`]: offsets
//!    and lengths are rewritten to each edit's position in the changed
//!    document, and edits whose region was removed by an enclosing change
//!    are marked deleted.
//!
//! # Basic usage
//!
//! ```ignore
//! use edit_tree::{processor::Style, tree::EditTree};
//! use ropey::Rope;
//!
//! let mut doc = Rope::from("org");
//! let mut tree = EditTree::new();
//! let root = tree.multi();
//! let www = tree.insert(0, "www.");
//! let eclipse = tree.insert(0, "eclipse.");
//! tree.add_children(root, [www, eclipse])?;
//!
//! let undo = tree.apply(root, &mut doc)?;
//! assert_eq!(doc, "www.eclipse.org");
//!
//! undo.apply(&mut doc)?;
//! assert_eq!(doc, "org");
//! ```
//!
//! # Faults
//!
//! A [`MalformedTree`] raised by pass 1 leaves document and tree untouched.
//! Pass 2 only reads the document, so a fault there still leaves it
//! unchanged. A [`BadLocation`] raised by pass 3 leaves the document in an
//! undefined intermediate state; callers that need atomicity snapshot the
//! document first.
//!
//! # Partial execution
//!
//! A processor built with [`Processor::with_filter`] only executes the
//! edits its predicate accepts; excluded edits act as pure structural
//! grouping but are still traversed and still have their regions updated.

use std::ops::{
  BitOr,
  BitOrAssign,
};

use ropey::Rope;
use thiserror::Error;

use crate::{
  copier::Copier,
  document::{
    self,
    BadLocation,
    Document,
  },
  tree::{
    EditId,
    EditKind,
    EditTree,
    KindTag,
    MalformedTree,
  },
  undo::{
    UndoCollector,
    UndoEdit,
  },
  Tendril,
};

pub type Result<T> = std::result::Result<T, ApplyError>;

/// Faults surfaced by [`Processor::perform`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ApplyError {
  #[error(transparent)]
  Malformed(#[from] MalformedTree),
  #[error(transparent)]
  Location(#[from] BadLocation),
}

/// Execution style flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Style(u8);

impl Style {
  /// Neither an undo edit nor region updates.
  pub const NONE: Style = Style(0);
  /// Record an inverse edit tree while applying.
  pub const CREATE_UNDO: Style = Style(1);
  /// Rewrite every edit's region to its post-apply position.
  pub const UPDATE_REGIONS: Style = Style(1 << 1);

  pub const fn contains(self, flags: Style) -> bool {
    self.0 & flags.0 == flags.0
  }
}

impl Default for Style {
  fn default() -> Self {
    Style::CREATE_UNDO | Style::UPDATE_REGIONS
  }
}

impl BitOr for Style {
  type Output = Style;

  fn bitor(self, rhs: Style) -> Style {
    Style(self.0 | rhs.0)
  }
}

impl BitOrAssign for Style {
  fn bitor_assign(&mut self, rhs: Style) {
    self.0 |= rhs.0;
  }
}

type Filter<'a> = Box<dyn FnMut(&EditTree, EditId) -> bool + 'a>;

/// Owns one execution of an edit tree against a document.
///
/// A tree must not be handed to two processors at once, and the engine as a
/// whole is single-threaded; `perform` blocks until every pass completes or
/// a fault is raised.
pub struct Processor<'a, D: Document> {
  tree:     &'a mut EditTree,
  document: &'a mut D,
  root:     EditId,
  style:    Style,
  filter:   Option<Filter<'a>>,
}

impl<'a, D: Document> Processor<'a, D> {
  pub fn new(tree: &'a mut EditTree, document: &'a mut D, root: EditId, style: Style) -> Self {
    Self {
      tree,
      document,
      root,
      style,
      filter: None,
    }
  }

  /// Restricts execution to edits the predicate accepts.
  pub fn with_filter(mut self, filter: impl FnMut(&EditTree, EditId) -> bool + 'a) -> Self {
    self.filter = Some(Box::new(filter));
    self
  }

  /// Runs all passes. Returns the undo edit when [`Style::CREATE_UNDO`] is
  /// set, `None` otherwise.
  pub fn perform(mut self) -> Result<Option<UndoEdit>> {
    assert!(
      self.tree.parent(self.root).is_none(),
      "apply root must be unparented"
    );

    self.check_integrity()?;
    self.compute_sources()?;

    let mut collector = self.style.contains(Style::CREATE_UNDO).then(UndoCollector::new);
    self.update_document(self.root, &mut collector)?;

    if self.style.contains(Style::UPDATE_REGIONS) {
      self.update_regions(self.root, 0, false);
    }

    tracing::debug!(
      root = ?self.root,
      changes = collector.as_ref().map_or(0, UndoCollector::len),
      "applied edit tree"
    );
    Ok(collector.map(UndoCollector::finish))
  }

  fn considers(&mut self, id: EditId) -> bool {
    match &mut self.filter {
      Some(filter) => filter(&*self.tree, id),
      None => true,
    }
  }

  // Pass 1: integrity.
  //

  fn check_integrity(&mut self) -> std::result::Result<(), MalformedTree> {
    self.tree.validate(self.root)?;

    let len = self.document.len_chars();
    if self.tree.exclusive_end(self.root) > len {
      return Err(MalformedTree::OutOfDocument {
        root: self.root,
        len,
      });
    }

    // Reset transient apply state and collect the considered halves of
    // every move/copy pair.
    let mut sources: Vec<(EditId, EditId)> = Vec::new();
    let mut targets: Vec<(EditId, EditId)> = Vec::new();
    let mut stack = vec![self.root];
    while let Some(id) = stack.pop() {
      self.tree.reset_transients(id);
      if self.considers(id) {
        match self.tree.kind(id) {
          EditKind::MoveSource(link) | EditKind::CopySource(link) => {
            let target = link
              .target()
              .ok_or(MalformedTree::MissingPartner { edit: id })?;
            sources.push((id, target));
          },
          EditKind::MoveTarget { source } | EditKind::CopyTarget { source } => {
            let source = source.ok_or(MalformedTree::MissingPartner { edit: id })?;
            targets.push((source, id));
          },
          _ => {},
        }
      }
      stack.extend_from_slice(self.tree.children(id));
    }

    // A pair executes as a whole or not at all: a half whose partner is
    // missing from the applied subtree would silently degrade into a bare
    // delete or a stale insert.
    for &(source, target) in &sources {
      if self.tree.partner(target) != Some(source) {
        return Err(MalformedTree::BrokenPair { from_edit: source, to_edit: target });
      }
      if !targets.contains(&(source, target)) {
        return Err(MalformedTree::PartnerOutsideTree { edit: source });
      }
    }
    for &(source, target) in &targets {
      if self.tree.partner(source) != Some(target) {
        return Err(MalformedTree::BrokenPair { from_edit: source, to_edit: target });
      }
      if !sources.contains(&(source, target)) {
        return Err(MalformedTree::PartnerOutsideTree { edit: target });
      }
    }
    Ok(())
  }

  // Pass 2: source computation.
  //

  fn compute_sources(&mut self) -> Result<()> {
    let mut pending = Vec::new();
    let mut stack = vec![self.root];
    while let Some(id) = stack.pop() {
      let is_source = matches!(
        self.tree.kind_tag(id),
        KindTag::MoveSource | KindTag::CopySource
      );
      if is_source && self.considers(id) {
        // Nested edits are consumed by the scratch apply below.
        pending.push(id);
        continue;
      }
      stack.extend_from_slice(self.tree.children(id));
    }
    for id in pending {
      self.compute_source(id)?;
    }
    Ok(())
  }

  fn compute_source(&mut self, id: EditId) -> Result<()> {
    let span = self.tree.span(id).expect("validated edit is alive");
    let content = self.document.get(span.offset, span.length)?;
    let is_move = self.tree.kind_tag(id) == KindTag::MoveSource;

    let (content, scratch) = if !self.tree.has_children(id) {
      (content, None)
    } else {
      // Apply the nested edits to a scratch copy of the source text. A
      // move re-roots the real children (the target adopts them later); a
      // copy transforms throwaway clones and keeps the originals in place.
      let scratch_root = self.tree.multi_spanning(span.offset, span.length);
      let children = if is_move {
        self.tree.remove_children(id)
      } else {
        let clone = Copier::new(&mut *self.tree, id).perform();
        let children = self.tree.remove_children(clone);
        self.tree.discard_subtree(clone);
        children
      };
      self
        .tree
        .add_children(scratch_root, children)
        .expect("children of a source fit its scratch root");
      self.tree.shift_subtree(scratch_root, -(span.offset as isize));

      let mut scratch_doc = Rope::from(content.as_str());
      Processor::new(
        &mut *self.tree,
        &mut scratch_doc,
        scratch_root,
        Style::UPDATE_REGIONS,
      )
      .perform()?;
      let transformed = Tendril::from(scratch_doc.to_string().as_str());

      if is_move {
        (transformed, Some(scratch_root))
      } else {
        self.tree.discard_subtree(scratch_root);
        (transformed, None)
      }
    };

    match self.tree.kind_mut(id) {
      EditKind::MoveSource(link) | EditKind::CopySource(link) => {
        link.content = Some(content);
        link.scratch = scratch;
      },
      _ => unreachable!("source computation on a non-source edit"),
    }
    Ok(())
  }

  // Pass 3: document updating.
  //

  fn update_document(
    &mut self,
    id: EditId,
    collector: &mut Option<UndoCollector>,
  ) -> Result<isize> {
    let mut delta = 0;
    let children: Vec<EditId> = self.tree.children(id).to_vec();
    for &child in children.iter().rev() {
      delta += self.update_document(child, collector)?;
    }
    if self.considers(id) {
      // Keep covering the children now that they shifted, then perform
      // this edit's own change.
      if delta != 0 {
        self.tree.adjust_length(id, delta);
      }
      let own = self.execute(id, collector)?;
      if own != 0 {
        self.tree.adjust_length(id, own);
      }
      self.tree.node_mut(id).delta = own;
      delta += own;
    }
    Ok(delta)
  }

  fn execute(
    &mut self,
    id: EditId,
    collector: &mut Option<UndoCollector>,
  ) -> document::Result<isize> {
    let span = self.tree.node(id).span;
    match self.tree.kind_tag(id) {
      KindTag::Insert => {
        let EditKind::Insert { text } = self.tree.kind(id) else {
          unreachable!()
        };
        let text = text.clone();
        let inserted = text.chars().count();
        self.document.replace(span.offset, 0, &text)?;
        record(collector, span.offset, inserted, Tendril::new());
        Ok(inserted as isize)
      },
      KindTag::Delete | KindTag::MoveSource => {
        let removed = self.document.get(span.offset, span.length)?;
        self.document.replace(span.offset, span.length, "")?;
        record(collector, span.offset, 0, removed);
        Ok(-(span.length as isize))
      },
      KindTag::Replace => {
        let EditKind::Replace { text } = self.tree.kind(id) else {
          unreachable!()
        };
        let text = text.clone();
        let inserted = text.chars().count();
        let removed = self.document.get(span.offset, span.length)?;
        self.document.replace(span.offset, span.length, &text)?;
        record(collector, span.offset, inserted, removed);
        Ok(inserted as isize - span.length as isize)
      },
      KindTag::Multi | KindTag::RangeMarker | KindTag::CopySource => Ok(0),
      KindTag::MoveTarget | KindTag::CopyTarget => {
        let source = self.tree.partner(id).expect("pairing checked before execution");
        let (content, scratch) = match self.tree.kind_mut(source) {
          EditKind::MoveSource(link) | EditKind::CopySource(link) => {
            (link.content.take(), link.scratch.take())
          },
          _ => unreachable!("target paired with a non-source edit"),
        };
        let content = content.expect("source content computed before target execution");
        let inserted = content.chars().count();
        self.document.replace(span.offset, 0, &content)?;
        record(collector, span.offset, inserted, Tendril::new());
        if let Some(scratch) = scratch {
          // Adopt the moved children at this target's position.
          self.tree.shift_subtree(scratch, span.offset as isize);
          self.tree.adopt_children(id, scratch);
          self.tree.discard_subtree(scratch);
        }
        Ok(inserted as isize)
      },
    }
  }

  // Pass 4: region updating.
  //

  fn update_regions(&mut self, id: EditId, accumulated: isize, delete: bool) -> isize {
    if delete {
      self.tree.mark_deleted(id);
    } else {
      self.tree.adjust_offset(id, accumulated);
    }

    let tag = self.tree.kind_tag(id);
    let children: Vec<EditId> = self.tree.children(id).to_vec();

    if tag == KindTag::MoveTarget {
      // Adopted children already carry final-coordinate regions from the
      // scratch apply; shift them as a block instead of re-accumulating
      // their deltas.
      for &child in &children {
        if delete {
          self.tree.delete_subtree(child);
        } else {
          self.tree.shift_subtree(child, accumulated);
        }
      }
      return accumulated + self.tree.node(id).delta;
    }

    let child_delete = delete || deletes_children(tag);
    let mut acc = accumulated;
    for &child in &children {
      acc = self.update_regions(child, acc, child_delete);
    }
    acc + self.tree.node(id).delta
  }
}

/// Whether executing this edit removes the content of its own region, so
/// that any edit nested inside it ends up deleted.
fn deletes_children(tag: KindTag) -> bool {
  matches!(tag, KindTag::Delete | KindTag::Replace | KindTag::MoveSource)
}

fn record(collector: &mut Option<UndoCollector>, offset: usize, inserted: usize, removed: Tendril) {
  if let Some(collector) = collector {
    collector.append_inverse(offset, inserted, removed);
  }
}

impl EditTree {
  /// Applies the subtree rooted at `root` to `document` with the default
  /// style, returning the undo edit.
  pub fn apply<D: Document>(&mut self, root: EditId, document: &mut D) -> Result<UndoEdit> {
    let undo = self.apply_with(root, document, Style::default())?;
    Ok(undo.expect("default style creates an undo"))
  }

  /// Applies the subtree rooted at `root` to `document`.
  pub fn apply_with<D: Document>(
    &mut self,
    root: EditId,
    document: &mut D,
    style: Style,
  ) -> Result<Option<UndoEdit>> {
    Processor::new(self, document, root, style).perform()
  }
}
