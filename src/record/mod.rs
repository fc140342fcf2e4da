//! Catalog records and how they get into memory.
//!
//! - [`types`] - the [`Record`] structure and its field enums
//! - [`loader`] - tolerant JSON dataset loading
//! - [`hardware`] - hardware requirement estimation for incomplete records
//! - [`synthetic`] - reproducible generated catalogs

pub mod hardware;
pub mod loader;
pub mod synthetic;
pub mod types;

pub use hardware::HardwareEstimator;
pub use loader::{LoadReport, load_dataset, parse_dataset};
pub use synthetic::synthetic_records;
pub use types::*;
