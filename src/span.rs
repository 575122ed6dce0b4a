//! Text regions and the arithmetic the edit tree is built on.
//!
//! A [`Span`] is a 0-based char offset plus a length. A zero-length span is
//! an insertion point between two characters. All end arithmetic uses
//! exclusive ends so that zero-length spans stay representable at offset 0.

/// A contiguous region of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
  pub offset: usize,
  pub length: usize,
}

impl Span {
  #[inline]
  pub const fn new(offset: usize, length: usize) -> Self {
    Self { offset, length }
  }

  /// An insertion point at `offset`.
  #[inline]
  pub const fn point(offset: usize) -> Self {
    Self { offset, length: 0 }
  }

  /// The position one past the last character of the region.
  #[inline]
  pub const fn exclusive_end(self) -> usize {
    self.offset + self.length
  }

  #[inline]
  pub const fn is_empty(self) -> bool {
    self.length == 0
  }

  #[inline]
  pub fn contains(self, pos: usize) -> bool {
    self.offset <= pos && pos < self.exclusive_end()
  }

  /// Pure containment: every position of `other` lies within `self`.
  /// Insertion points at either boundary count as contained.
  #[inline]
  pub fn contains_span(self, other: Span) -> bool {
    self.offset <= other.offset && other.exclusive_end() <= self.exclusive_end()
  }

  /// Covering as used when linking a child below a parent: an insertion
  /// point covers nothing, not even another insertion point at the same
  /// offset.
  #[inline]
  pub fn covers(self, other: Span) -> bool {
    self.length != 0 && self.contains_span(other)
  }

  /// Whether `self` lies entirely before `other` in sibling order.
  ///
  /// Touching boundaries are fine, with one exception: an insertion point
  /// glued to the start of a non-empty sibling counts as overlapping, in
  /// either insertion order. An insertion point at a sibling's end boundary
  /// is allowed, as are several insertion points stacked on one offset.
  pub fn precedes(self, other: Span) -> bool {
    self.exclusive_end() <= other.offset
      && !(self.length == 0 && other.length != 0 && self.offset == other.offset)
  }

  /// The smallest span containing every span yielded by `spans`, or `None`
  /// when the iterator is empty.
  pub fn coverage(spans: impl IntoIterator<Item = Span>) -> Option<Span> {
    let mut result: Option<(usize, usize)> = None;
    for span in spans {
      let (offset, end) = result.unwrap_or((usize::MAX, 0));
      result = Some((
        offset.min(span.offset),
        end.max(span.exclusive_end()),
      ));
    }
    result.map(|(offset, end)| Span::new(offset, end - offset))
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn containment_includes_boundaries() {
    let outer = Span::new(2, 4);
    assert!(outer.contains_span(Span::new(2, 4)));
    assert!(outer.contains_span(Span::point(2)));
    assert!(outer.contains_span(Span::point(6)));
    assert!(!outer.contains_span(Span::new(5, 2)));
    assert!(!outer.contains_span(Span::point(7)));
  }

  #[test]
  fn covering_requires_positive_length() {
    assert!(Span::new(0, 3).covers(Span::point(0)));
    assert!(Span::new(0, 3).covers(Span::new(1, 2)));
    assert!(!Span::point(0).covers(Span::point(0)));
    assert!(!Span::point(5).covers(Span::new(5, 1)));
  }

  #[test]
  fn sibling_order_at_boundaries() {
    // Disjoint and touching regions are ordered.
    assert!(Span::new(0, 2).precedes(Span::new(2, 3)));
    assert!(Span::new(0, 2).precedes(Span::point(2)));
    // An insertion point at a sibling's start overlaps it.
    assert!(!Span::point(2).precedes(Span::new(2, 3)));
    assert!(!Span::new(2, 3).precedes(Span::point(2)));
    // Stacked insertion points order both ways; arrival breaks the tie.
    assert!(Span::point(2).precedes(Span::point(2)));
  }

  #[test]
  fn coverage_spans_min_to_max() {
    let spans = [Span::new(4, 2), Span::point(1), Span::new(8, 1)];
    assert_eq!(Span::coverage(spans), Some(Span::new(1, 8)));
    assert_eq!(Span::coverage([Span::point(5)]), Some(Span::point(5)));
    assert_eq!(Span::coverage([]), None);
  }
}
