//! # modelcat - model catalog query engine
//!
//! An in-memory search, filter and sort engine for catalogs of downloadable
//! model files, sized for around a hundred thousand records.
//!
//! ## Architecture
//!
//! - [`record`] - the record structure, dataset loading, hardware estimates
//! - [`index`] - inverted search index and categorical indexes
//! - [`query`] - query model, search and filter resolution, set combination, sorting
//! - [`cache`] - bounded insertion-ordered result caches
//! - [`engine`] - the pipeline tying indexes, caches and resolution together
//! - [`offload`] - background execution with timeout and fallback
//! - [`config`] - thresholds and capacities, loaded from JSON
//! - [`output`] - terminal rendering
//!
//! ## Quick Start
//!
//! ```no_run
//! use modelcat::config::EngineConfig;
//! use modelcat::engine::CatalogEngine;
//! use modelcat::query::{CatalogQuery, Filter, SortField, SortSpec};
//! use modelcat::record::{CategoricalField, synthetic_records};
//!
//! let mut engine = CatalogEngine::with_records(synthetic_records(50_000, 1), EngineConfig::default());
//! let query = CatalogQuery::new()
//!     .search("llama chat")
//!     .filter(Filter::categorical(CategoricalField::QuantFormat, "Q4_K_M"))
//!     .sort(SortSpec::desc(SortField::DownloadCount));
//!
//! let result = engine.apply_query(&query).unwrap();
//! for record in result.iter().take(10) {
//!     println!("{}", record.model_name);
//! }
//! ```
//!
//! ## Search semantics
//!
//! Every query word must match (AND). A word matches a record when any
//! indexed text field contains it as a substring, which gives
//! autocomplete-style partial matching.

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod index;
pub mod offload;
pub mod output;
pub mod query;
pub mod record;
pub mod utils;

pub use error::{CatalogError, Result};
