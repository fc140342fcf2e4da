//! Shared helpers.
//!
//! - [`tokenizer`] - field tokenization, index terms and query words
//! - [`progress`] - load spinner that compiles to a no-op without the `progress` feature

pub mod progress;
pub mod tokenizer;

pub use progress::LoadSpinner;
pub use tokenizer::*;
