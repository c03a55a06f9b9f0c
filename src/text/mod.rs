//! Text processing ahead of synthesis.

pub mod splitter;

pub use splitter::{SentenceSplitter, SplitterKind, Utterance};
