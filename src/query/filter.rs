//! Filter specifications and their normalization into predicates.
//!
//! A [`FilterSpec`] is what callers hand in: loosely validated, possibly with
//! NaN or negative bounds. [`FilterSpec::normalize`] turns it into a sorted,
//! deduplicated list of [`Predicate`]s plus any [`FilterWarning`]s raised
//! while coercing bad input. No-op filters (`"all"`, `[0, +inf)`, GPU
//! "any") produce no predicate at all.

use crate::index::normalize_value;
use crate::record::{CategoricalField, NumericField, Record};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Categorical value meaning "no constraint"
pub const ALL_VALUES: &str = "all";

/// GPU requirement tri-state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GpuRequirement {
    #[default]
    Any,
    Required,
    NotRequired,
}

/// One filter as supplied by the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Filter {
    /// Field equals value (case-insensitive); `"all"` disables the filter
    Categorical { field: CategoricalField, value: String },
    /// Inclusive numeric range; absent bounds mean 0 and +inf
    Range {
        field: NumericField,
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
    },
    /// Hardware requirement constraints
    #[serde(rename_all = "camelCase")]
    Hardware {
        #[serde(default)]
        min_cpu_cores: Option<f64>,
        #[serde(default)]
        min_ram_gb: Option<f64>,
        #[serde(default)]
        gpu: GpuRequirement,
    },
}

impl Filter {
    pub fn categorical(field: CategoricalField, value: impl Into<String>) -> Self {
        Filter::Categorical {
            field,
            value: value.into(),
        }
    }

    pub fn range(field: NumericField, min: Option<f64>, max: Option<f64>) -> Self {
        Filter::Range { field, min, max }
    }

    pub fn min_cpu_cores(cores: f64) -> Self {
        Filter::Hardware {
            min_cpu_cores: Some(cores),
            min_ram_gb: None,
            gpu: GpuRequirement::Any,
        }
    }

    pub fn min_ram_gb(gb: f64) -> Self {
        Filter::Hardware {
            min_cpu_cores: None,
            min_ram_gb: Some(gb),
            gpu: GpuRequirement::Any,
        }
    }

    pub fn gpu(requirement: GpuRequirement) -> Self {
        Filter::Hardware {
            min_cpu_cores: None,
            min_ram_gb: None,
            gpu: requirement,
        }
    }

    fn normalize_into(&self, out: &mut NormalizedFilters) {
        match self {
            Filter::Categorical { field, value } => {
                let value = normalize_value(value);
                if !value.is_empty() && value != ALL_VALUES {
                    out.predicates.push(Predicate::Categorical {
                        field: *field,
                        value,
                    });
                }
            }
            Filter::Range { field, min, max } => {
                let label = field.name();
                let mut lo = coerce_min(*min, label, &mut out.warnings);
                let mut hi = coerce_max(*max, label, &mut out.warnings);
                if lo > hi {
                    out.warnings.push(FilterWarning::SwappedRange {
                        filter: label.to_string(),
                        min: lo,
                        max: hi,
                    });
                    std::mem::swap(&mut lo, &mut hi);
                }

                let min = lo.ceil() as u64;
                let max = if hi.is_infinite() {
                    None
                } else {
                    Some(hi.floor() as u64)
                };
                if min > 0 || max.is_some() {
                    out.predicates.push(Predicate::Range {
                        field: *field,
                        min,
                        max,
                    });
                }
            }
            Filter::Hardware {
                min_cpu_cores,
                min_ram_gb,
                gpu,
            } => {
                let cores = coerce_min(*min_cpu_cores, "minCpuCores", &mut out.warnings);
                if cores > 0.0 {
                    out.predicates
                        .push(Predicate::MinCpuCores(cores.ceil().min(u32::MAX as f64) as u32));
                }
                let ram = coerce_min(*min_ram_gb, "minRamGB", &mut out.warnings);
                if ram > 0.0 {
                    out.predicates
                        .push(Predicate::MinRamGb(ram.ceil().min(u32::MAX as f64) as u32));
                }
                match gpu {
                    GpuRequirement::Any => {}
                    GpuRequirement::Required => out.predicates.push(Predicate::Gpu(true)),
                    GpuRequirement::NotRequired => out.predicates.push(Predicate::Gpu(false)),
                }
            }
        }
    }
}

/// Which bound of a range was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Bound {
    Min,
    Max,
}

/// A recovered problem in caller-supplied filter input
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FilterWarning {
    /// A NaN, negative or non-finite bound was replaced by its default
    InvalidBound { filter: String, bound: Bound, raw: f64 },
    /// The minimum exceeded the maximum and the two were swapped
    SwappedRange { filter: String, min: f64, max: f64 },
}

impl fmt::Display for FilterWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterWarning::InvalidBound { filter, bound, raw } => {
                let (side, default) = match bound {
                    Bound::Min => ("minimum", "0"),
                    Bound::Max => ("maximum", "unbounded"),
                };
                write!(f, "{filter}: invalid {side} {raw}, using {default}")
            }
            FilterWarning::SwappedRange { filter, min, max } => {
                write!(f, "{filter}: minimum {min} exceeds maximum {max}, swapped")
            }
        }
    }
}

fn coerce_min(raw: Option<f64>, filter: &str, warnings: &mut Vec<FilterWarning>) -> f64 {
    match raw {
        None => 0.0,
        Some(v) if v.is_finite() && v >= 0.0 => v,
        Some(v) => {
            warnings.push(FilterWarning::InvalidBound {
                filter: filter.to_string(),
                bound: Bound::Min,
                raw: v,
            });
            0.0
        }
    }
}

fn coerce_max(raw: Option<f64>, filter: &str, warnings: &mut Vec<FilterWarning>) -> f64 {
    match raw {
        None => f64::INFINITY,
        Some(v) if v == f64::INFINITY => v,
        Some(v) if v.is_finite() && v >= 0.0 => v,
        Some(v) => {
            warnings.push(FilterWarning::InvalidBound {
                filter: filter.to_string(),
                bound: Bound::Max,
                raw: v,
            });
            f64::INFINITY
        }
    }
}

/// The filters of one query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterSpec {
    pub filters: Vec<Filter>,
}

impl FilterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn push(&mut self, filter: Filter) {
        self.filters.push(filter);
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Validate and canonicalize into predicates
    pub fn normalize(&self) -> NormalizedFilters {
        let mut out = NormalizedFilters::default();
        for filter in &self.filters {
            filter.normalize_into(&mut out);
        }
        out.predicates.sort();
        out.predicates.dedup();
        out
    }
}

impl FromIterator<Filter> for FilterSpec {
    fn from_iter<I: IntoIterator<Item = Filter>>(iter: I) -> Self {
        Self {
            filters: iter.into_iter().collect(),
        }
    }
}

/// Result of [`FilterSpec::normalize`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedFilters {
    /// Active predicates in canonical order
    pub predicates: Vec<Predicate>,
    pub warnings: Vec<FilterWarning>,
}

impl NormalizedFilters {
    /// Deterministic encoding, independent of the order filters were given in
    pub fn key(&self) -> String {
        self.predicates
            .iter()
            .map(Predicate::to_string)
            .collect::<Vec<_>>()
            .join(";")
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }
}

/// A validated, active constraint on records
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Predicate {
    /// Normalized field value equals `value`
    Categorical { field: CategoricalField, value: String },
    /// `min <= value <= max`, `max = None` meaning unbounded
    Range {
        field: NumericField,
        min: u64,
        max: Option<u64>,
    },
    MinCpuCores(u32),
    MinRamGb(u32),
    /// GPU requirement must equal this
    Gpu(bool),
}

impl Predicate {
    /// Evaluate against one record. Absent fields never match.
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Predicate::Categorical { field, value } => record
                .categorical(*field)
                .is_some_and(|v| v.trim().to_lowercase() == *value),
            Predicate::Range { field, min, max } => record
                .numeric(*field)
                .is_some_and(|v| v >= *min && max.is_none_or(|m| v <= m)),
            Predicate::MinCpuCores(n) => record.min_cpu_cores.is_some_and(|c| c >= *n),
            Predicate::MinRamGb(n) => record.min_ram_gb.is_some_and(|r| r >= *n),
            Predicate::Gpu(required) => record.gpu_required == Some(*required),
        }
    }

    /// Categorical predicates can be answered from the categorical index
    pub fn is_categorical(&self) -> bool {
        matches!(self, Predicate::Categorical { .. })
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Categorical { field, value } => write!(f, "{}={}", field.name(), value),
            Predicate::Range { field, min, max } => match max {
                Some(max) => write!(f, "{}={}..{}", field.name(), min, max),
                None => write!(f, "{}={}..", field.name(), min),
            },
            Predicate::MinCpuCores(n) => write!(f, "minCpuCores>={n}"),
            Predicate::MinRamGb(n) => write!(f, "minRamGB>={n}"),
            Predicate::Gpu(required) => write!(f, "gpuRequired={required}"),
        }
    }
}
