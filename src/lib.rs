use smartstring::{
  LazyCompact,
  SmartString,
};

pub mod copier;
pub mod document;
pub mod processor;
pub mod span;
pub mod tree;
pub mod undo;
pub mod visitor;

pub type Tendril = SmartString<LazyCompact>;
