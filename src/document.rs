//! The document contract the engine executes against.
//!
//! The engine treats a document as an opaque mutable character store with a
//! single mutation primitive, `replace`. Offsets and lengths are char
//! indices. [`ropey::Rope`] is the standard implementation.

use std::borrow::Cow;

use ropey::Rope;
use thiserror::Error;

use crate::Tendril;

pub type Result<T> = std::result::Result<T, BadLocation>;

/// Raised when an offset/length pair falls outside a document.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("range {offset}..{end} is out of bounds for document length {len}", end = .offset + .length)]
pub struct BadLocation {
  pub offset: usize,
  pub length: usize,
  pub len:    usize,
}

/// An opaque mutable character store.
///
/// Implementations must reject any range that does not lie within
/// `0..=len_chars()` with [`BadLocation`] and leave the document unchanged
/// in that case.
pub trait Document {
  fn len_chars(&self) -> usize;

  /// Reads `length` chars starting at `offset`.
  fn get(&self, offset: usize, length: usize) -> Result<Tendril>;

  /// Replaces `length` chars starting at `offset` with `text`.
  fn replace(&mut self, offset: usize, length: usize, text: &str) -> Result<()>;
}

fn check_bounds(offset: usize, length: usize, len: usize) -> Result<()> {
  match offset.checked_add(length) {
    Some(end) if end <= len => Ok(()),
    _ => Err(BadLocation {
      offset,
      length,
      len,
    }),
  }
}

impl Document for Rope {
  fn len_chars(&self) -> usize {
    Rope::len_chars(self)
  }

  fn get(&self, offset: usize, length: usize) -> Result<Tendril> {
    check_bounds(offset, length, Rope::len_chars(self))?;
    let text = Cow::from(self.slice(offset..offset + length));
    Ok(Tendril::from(text.as_ref()))
  }

  fn replace(&mut self, offset: usize, length: usize, text: &str) -> Result<()> {
    check_bounds(offset, length, Rope::len_chars(self))?;
    if length != 0 {
      self.remove(offset..offset + length);
    }
    if !text.is_empty() {
      self.insert(offset, text);
    }
    Ok(())
  }
}
