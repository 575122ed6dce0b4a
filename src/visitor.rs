//! External traversal of an edit tree.
//!
//! [`EditTree::accept`] drives a [`Visitor`] over a subtree: the generic
//! `pre_visit` hook, then the variant-specific `visit_*` hook, then the
//! edit's children (unless the hook declined), then `post_visit`. Child
//! lists are snapshotted before descending, so a visitor may add or remove
//! children of the edit it is currently looking at without upsetting the
//! walk.

use crate::tree::{
  EditId,
  EditTree,
  KindTag,
};

/// Visitor over an edit tree.
///
/// Every `visit_*` hook defaults to [`Visitor::visit`], which defaults to
/// descending. Returning `false` from a hook skips the edit's children;
/// `pre_visit` and `post_visit` run regardless.
pub trait Visitor {
  /// Called for every edit before its variant hook.
  fn pre_visit(&mut self, tree: &mut EditTree, edit: EditId) {
    let _ = (tree, edit);
  }

  /// Called for every edit after its variant hook and children.
  fn post_visit(&mut self, tree: &mut EditTree, edit: EditId) {
    let _ = (tree, edit);
  }

  /// Fallback for all variants; `true` descends into children.
  fn visit(&mut self, tree: &mut EditTree, edit: EditId) -> bool {
    let _ = (tree, edit);
    true
  }

  fn visit_insert(&mut self, tree: &mut EditTree, edit: EditId) -> bool {
    self.visit(tree, edit)
  }

  fn visit_delete(&mut self, tree: &mut EditTree, edit: EditId) -> bool {
    self.visit(tree, edit)
  }

  fn visit_replace(&mut self, tree: &mut EditTree, edit: EditId) -> bool {
    self.visit(tree, edit)
  }

  fn visit_multi(&mut self, tree: &mut EditTree, edit: EditId) -> bool {
    self.visit(tree, edit)
  }

  fn visit_range_marker(&mut self, tree: &mut EditTree, edit: EditId) -> bool {
    self.visit(tree, edit)
  }

  fn visit_move_source(&mut self, tree: &mut EditTree, edit: EditId) -> bool {
    self.visit(tree, edit)
  }

  fn visit_move_target(&mut self, tree: &mut EditTree, edit: EditId) -> bool {
    self.visit(tree, edit)
  }

  fn visit_copy_source(&mut self, tree: &mut EditTree, edit: EditId) -> bool {
    self.visit(tree, edit)
  }

  fn visit_copy_target(&mut self, tree: &mut EditTree, edit: EditId) -> bool {
    self.visit(tree, edit)
  }
}

impl EditTree {
  /// Walks the subtree rooted at `root` with `visitor`.
  pub fn accept<V: Visitor + ?Sized>(&mut self, root: EditId, visitor: &mut V) {
    visitor.pre_visit(self, root);
    let descend = match self.kind_tag(root) {
      KindTag::Insert => visitor.visit_insert(self, root),
      KindTag::Delete => visitor.visit_delete(self, root),
      KindTag::Replace => visitor.visit_replace(self, root),
      KindTag::Multi => visitor.visit_multi(self, root),
      KindTag::RangeMarker => visitor.visit_range_marker(self, root),
      KindTag::MoveSource => visitor.visit_move_source(self, root),
      KindTag::MoveTarget => visitor.visit_move_target(self, root),
      KindTag::CopySource => visitor.visit_copy_source(self, root),
      KindTag::CopyTarget => visitor.visit_copy_target(self, root),
    };
    if descend {
      let children: Vec<EditId> = self.children(root).to_vec();
      for child in children {
        self.accept(child, visitor);
      }
    }
    visitor.post_visit(self, root);
  }
}
