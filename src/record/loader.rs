use crate::config::HardwareConfig;
use crate::record::hardware::HardwareEstimator;
use crate::record::types::Record;
use anyhow::{Context, Result, bail};
use memmap2::Mmap;
use serde_json::Value;
use std::fs::File;
use std::path::Path;

/// Outcome of loading a dataset file
#[derive(Debug, Default)]
pub struct LoadReport {
    pub records: Vec<Record>,
    /// Elements decoded into records
    pub loaded: usize,
    /// Elements that were not objects or failed to decode
    pub skipped: usize,
}

/// Load a dataset from a JSON file.
///
/// The file holds either a top-level array of records or an object with a
/// `models` array. Malformed elements are skipped, never fatal.
pub fn load_dataset(path: &Path, hardware: &HardwareConfig) -> Result<LoadReport> {
    let file =
        File::open(path).with_context(|| format!("Failed to open dataset {}", path.display()))?;
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(LoadReport::default());
    }

    // SAFETY: the dataset file is treated as read-only for the lifetime of the map
    let mmap = unsafe { Mmap::map(&file) }
        .with_context(|| format!("Failed to map dataset {}", path.display()))?;

    parse_dataset(&mmap, hardware).with_context(|| format!("Invalid dataset {}", path.display()))
}

/// Parse dataset bytes. See [`load_dataset`].
pub fn parse_dataset(bytes: &[u8], hardware: &HardwareConfig) -> Result<LoadReport> {
    let root: Value = serde_json::from_slice(bytes).context("Dataset is not valid JSON")?;

    let elements = match root {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("models") {
            Some(Value::Array(items)) => items,
            _ => bail!("Dataset object has no `models` array"),
        },
        _ => bail!("Dataset must be an array or an object with a `models` array"),
    };

    let estimator = HardwareEstimator::new(hardware.clone());
    let mut report = LoadReport {
        records: Vec::with_capacity(elements.len()),
        ..Default::default()
    };

    for (i, element) in elements.into_iter().enumerate() {
        if !element.is_object() {
            report.skipped += 1;
            tracing::warn!(target: "modelcat::loader", element = i, "Skipping non-object dataset element");
            continue;
        }

        match serde_json::from_value::<Record>(element) {
            Ok(mut record) => {
                record.sanitize();
                estimator.fill_missing(&mut record);
                report.records.push(record);
                report.loaded += 1;
            }
            Err(e) => {
                report.skipped += 1;
                tracing::warn!(
                    target: "modelcat::loader",
                    element = i,
                    error = %e,
                    "Skipping malformed record"
                );
            }
        }
    }

    tracing::info!(
        target: "modelcat::loader",
        loaded = report.loaded,
        skipped = report.skipped,
        "Dataset loaded"
    );

    Ok(report)
}
