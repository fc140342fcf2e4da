//! Index construction.
//!
//! Two index families are built from one dataset snapshot:
//!
//! 1. **Search index** - token and token-prefix postings for free-text search
//! 2. **Categorical index** - value postings for equality filters
//!
//! Both are rebuilt from scratch whenever the dataset changes.

pub mod build;
pub mod types;

pub use build::build_indexes;
pub use types::*;
