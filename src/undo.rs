//! Inverse edits recorded during application.
//!
//! While a tree executes, every atomic document change records the replace
//! that would reverse it. The records accumulate into an [`UndoEdit`]:
//! applying it to the changed document restores the previous state and, by
//! default, hands back the redo edit the same way.

use crate::{
  document::{
    Document,
    Result,
  },
  processor::Style,
  span::Span,
  Tendril,
};

/// A single recorded inverse: replace `length` chars at `offset` with
/// `text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InverseReplace {
  pub offset: usize,
  pub length: usize,
  pub text:   Tendril,
}

/// Collects inverses while a tree executes.
#[derive(Debug, Default)]
pub(crate) struct UndoCollector {
  inverses: Vec<InverseReplace>,
}

impl UndoCollector {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  /// Records the inverse of a replace that inserted `inserted` chars at
  /// `offset`, displacing `removed`.
  pub(crate) fn append_inverse(&mut self, offset: usize, inserted: usize, removed: Tendril) {
    self.inverses.push(InverseReplace {
      offset,
      length: inserted,
      text: removed,
    });
  }

  pub(crate) fn len(&self) -> usize {
    self.inverses.len()
  }

  pub(crate) fn finish(self) -> UndoEdit {
    UndoEdit {
      inverses: self.inverses,
    }
  }
}

/// An edit that restores the document state preceding an apply.
///
/// The records are kept in the order the original changes ran and are
/// executed back to front, so each one replays in the exact coordinate
/// space it was captured in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UndoEdit {
  inverses: Vec<InverseReplace>,
}

impl UndoEdit {
  pub fn is_empty(&self) -> bool {
    self.inverses.is_empty()
  }

  pub fn len(&self) -> usize {
    self.inverses.len()
  }

  /// The recorded inverse replaces, in the order the original changes ran.
  pub fn changes(&self) -> &[InverseReplace] {
    &self.inverses
  }

  /// The smallest span containing every record, or `None` when empty.
  pub fn coverage(&self) -> Option<Span> {
    Span::coverage(
      self
        .inverses
        .iter()
        .map(|inverse| Span::new(inverse.offset, inverse.length)),
    )
  }

  /// Applies the undo with the default style, returning the redo edit.
  pub fn apply<D: Document>(&self, document: &mut D) -> Result<UndoEdit> {
    let redo = self.apply_with(document, Style::default())?;
    Ok(redo.expect("default style creates an undo"))
  }

  /// Applies the undo. A failed replace leaves the document in an
  /// undefined intermediate state, like any pass-three fault.
  pub fn apply_with<D: Document>(&self, document: &mut D, style: Style) -> Result<Option<UndoEdit>> {
    let mut redo = style.contains(Style::CREATE_UNDO).then(Vec::new);
    for inverse in self.inverses.iter().rev() {
      let displaced = document.get(inverse.offset, inverse.length)?;
      document.replace(inverse.offset, inverse.length, &inverse.text)?;
      if let Some(redo) = &mut redo {
        redo.push(InverseReplace {
          offset: inverse.offset,
          length: inverse.text.chars().count(),
          text:   displaced,
        });
      }
    }
    Ok(redo.map(|inverses| UndoEdit { inverses }))
  }
}

#[cfg(test)]
mod test {
  use ropey::Rope;

  use super::*;

  fn collect(records: &[(usize, usize, &str)]) -> UndoEdit {
    let mut collector = UndoCollector::new();
    for &(offset, inserted, removed) in records {
      collector.append_inverse(offset, inserted, Tendril::from(removed));
    }
    collector.finish()
  }

  #[test]
  fn records_replay_back_to_front() {
    // The forward apply inserted "XY" at 5 and removed "bc" at 1, in that
    // order; the undo must reinsert before it can trim.
    let mut doc = Rope::from("adeXYf");
    let undo = collect(&[(5, 2, ""), (1, 0, "bc")]);

    let redo = undo.apply(&mut doc).unwrap();
    assert_eq!(doc, "abcdef");

    // The redo records mirror the undo's ops; replayed back to front they
    // reinsert "XY" at 5 and take "bc" back out at 1.
    assert_eq!(redo.changes(), &[
      InverseReplace {
        offset: 1,
        length: 2,
        text:   Tendril::new(),
      },
      InverseReplace {
        offset: 5,
        length: 0,
        text:   Tendril::from("XY"),
      },
    ]);

    redo.apply(&mut doc).unwrap();
    assert_eq!(doc, "adeXYf");
  }

  #[test]
  fn empty_undo_is_identity() {
    let mut doc = Rope::from("hello");
    let undo = UndoEdit::default();
    assert!(undo.is_empty());
    assert_eq!(undo.coverage(), None);

    let redo = undo.apply(&mut doc).unwrap();
    assert_eq!(doc, "hello");
    assert!(redo.is_empty());
  }

  #[test]
  fn style_none_skips_the_redo() {
    let mut doc = Rope::from("ab");
    let undo = collect(&[(0, 1, "x")]);
    let redo = undo.apply_with(&mut doc, Style::NONE).unwrap();
    assert_eq!(doc, "xb");
    assert!(redo.is_none());
  }

  #[test]
  fn coverage_spans_all_records() {
    let undo = collect(&[(8, 2, ""), (1, 3, "abc")]);
    assert_eq!(undo.coverage(), Some(Span::new(1, 9)));
  }

  #[test]
  fn bad_location_surfaces() {
    let mut doc = Rope::from("ab");
    let undo = collect(&[(5, 1, "x")]);
    assert!(undo.apply(&mut doc).is_err());
  }
}
