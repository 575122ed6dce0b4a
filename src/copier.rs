//! Deep copies of edit subtrees.
//!
//! Copying happens in two stages: a structural clone of every node in the
//! subtree, recorded in an identity map, followed by a post-processing walk
//! that rewires cross-edit references. A move/copy pair whose halves were
//! both copied ends up paired inside the copy; a partner outside the copied
//! subtree is detached, and applying such a copy fails the integrity pass.

use std::collections::BTreeMap;

use crate::tree::{
  EditId,
  EditKind,
  EditTree,
};

/// Copies the subtree rooted at one edit inside its arena.
pub struct Copier<'t> {
  tree: &'t mut EditTree,
  root: EditId,
  map:  BTreeMap<EditId, EditId>,
}

impl<'t> Copier<'t> {
  pub fn new(tree: &'t mut EditTree, root: EditId) -> Self {
    Self {
      tree,
      root,
      map: BTreeMap::new(),
    }
  }

  /// Runs the copy and returns the root of the copied subtree.
  pub fn perform(mut self) -> EditId {
    let copy = self.copy_subtree(self.root);
    let originals: Vec<EditId> = self.map.keys().copied().collect();
    for original in originals {
      self.post_process(original);
    }
    copy
  }

  /// The copy made for `original`, if it was part of the copied subtree.
  pub fn copy_of(&self, original: EditId) -> Option<EditId> {
    self.map.get(&original).copied()
  }

  fn copy_subtree(&mut self, id: EditId) -> EditId {
    let copy = self.tree.clone_node(id);
    self.map.insert(id, copy);
    let children: Vec<EditId> = self.tree.children(id).to_vec();
    for child in children {
      let child_copy = self.copy_subtree(child);
      // Order and coverage carry over from the original.
      self.tree.attach_raw(copy, child_copy);
    }
    copy
  }

  fn post_process(&mut self, original: EditId) {
    let copy = self.map[&original];
    let partner = match self.tree.kind(original) {
      EditKind::MoveSource(_)
      | EditKind::MoveTarget { .. }
      | EditKind::CopySource(_)
      | EditKind::CopyTarget { .. } => self.tree.partner(original),
      _ => return,
    };
    let rewired = partner.and_then(|partner| self.copy_of(partner));
    match self.tree.kind_mut(copy) {
      EditKind::MoveSource(link) | EditKind::CopySource(link) => link.target = rewired,
      EditKind::MoveTarget { source } | EditKind::CopyTarget { source } => *source = rewired,
      _ => unreachable!("partner rewiring on an unpaired edit"),
    }
  }
}

impl EditTree {
  /// Deep-copies the subtree rooted at `root`; returns the copy's root.
  pub fn copy(&mut self, root: EditId) -> EditId {
    Copier::new(self, root).perform()
  }
}
