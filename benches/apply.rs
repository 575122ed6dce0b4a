//! Benchmarks for edit tree construction and application.
//!
//! Run with: `cargo bench --bench apply`

use divan::{
  black_box,
  Bencher,
};
use edit_tree::{
  processor::Style,
  tree::{
    EditId,
    EditTree,
  },
};
use ropey::Rope;

fn main() {
  divan::main();
}

fn make_ascii_text(size: usize) -> String {
  let line = "The quick brown fox jumps over the lazy dog. ";
  let mut s = String::with_capacity(size);
  while s.len() < size {
    s.push_str(line);
  }
  s.truncate(size);
  s
}

fn make_rope(size: usize) -> Rope {
  Rope::from_str(&make_ascii_text(size))
}

fn build_flat(len: usize, count: usize, span: usize) -> (EditTree, EditId) {
  let mut tree = EditTree::new();
  let root = tree.multi();
  let step = len / (count + 1);
  for i in 0..count {
    let start = (i + 1) * step;
    let edit = tree.replace(start, span.min(len - start), "xyz");
    tree.add_child(root, edit).expect("disjoint by construction");
  }
  (tree, root)
}

fn build_nested(len: usize, groups: usize, per_group: usize) -> (EditTree, EditId) {
  let mut tree = EditTree::new();
  let root = tree.multi();
  let group_step = len / (groups + 1);
  for g in 0..groups {
    let start = (g + 1) * group_step;
    let group = tree.multi_spanning(start, group_step / 2);
    tree.add_child(root, group).expect("disjoint by construction");
    let step = (group_step / 2) / (per_group + 1);
    for i in 0..per_group {
      let edit = tree.replace(start + (i + 1) * step, 1, "x");
      tree.add_child(group, edit).expect("disjoint by construction");
    }
  }
  (tree, root)
}

mod build {
  use super::*;

  const SIZE: usize = 100 * 1024;
  const SPAN: usize = 3;

  #[divan::bench(args = [8, 64, 512])]
  fn flat_tree(bencher: Bencher, count: usize) {
    bencher.bench(|| black_box(build_flat(SIZE, count, SPAN)));
  }
}

mod apply {
  use super::*;

  const SIZE: usize = 100 * 1024;
  const SPAN: usize = 3;

  #[divan::bench(args = [8, 64, 512])]
  fn flat(bencher: Bencher, count: usize) {
    let doc = make_rope(SIZE);

    bencher.bench(|| {
      let (mut tree, root) = build_flat(SIZE, count, SPAN);
      let mut next = doc.clone();
      let undo = tree.apply(root, black_box(&mut next)).unwrap();
      black_box((next, undo));
    });
  }

  #[divan::bench(args = [8, 64])]
  fn nested(bencher: Bencher, groups: usize) {
    let doc = make_rope(SIZE);

    bencher.bench(|| {
      let (mut tree, root) = build_nested(SIZE, groups, 8);
      let mut next = doc.clone();
      let undo = tree.apply(root, black_box(&mut next)).unwrap();
      black_box((next, undo));
    });
  }

  #[divan::bench]
  fn without_undo_or_regions(bencher: Bencher) {
    let doc = make_rope(SIZE);

    bencher.bench(|| {
      let (mut tree, root) = build_flat(SIZE, 64, SPAN);
      let mut next = doc.clone();
      tree
        .apply_with(root, black_box(&mut next), Style::NONE)
        .unwrap();
      black_box(next);
    });
  }

  #[divan::bench]
  fn undo_roundtrip(bencher: Bencher) {
    let doc = make_rope(SIZE);

    bencher.bench(|| {
      let (mut tree, root) = build_flat(SIZE, 64, SPAN);
      let mut next = doc.clone();
      let undo = tree.apply(root, &mut next).unwrap();
      undo.apply(&mut next).unwrap();
      black_box(next);
    });
  }
}
