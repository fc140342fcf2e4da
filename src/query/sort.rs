use crate::record::{Position, Record};
use rayon::prelude::*;
use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Fields a result set can be ordered by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    ModelName,
    QuantFormat,
    ModelType,
    License,
    FileSize,
    DownloadCount,
    LikeCount,
    UploadDate,
    #[serde(rename = "minRamGB")]
    MinRamGb,
    MinCpuCores,
}

impl SortField {
    pub fn name(&self) -> &'static str {
        match self {
            SortField::ModelName => "modelName",
            SortField::QuantFormat => "quantFormat",
            SortField::ModelType => "modelType",
            SortField::License => "license",
            SortField::FileSize => "fileSize",
            SortField::DownloadCount => "downloadCount",
            SortField::LikeCount => "likeCount",
            SortField::UploadDate => "uploadDate",
            SortField::MinRamGb => "minRamGB",
            SortField::MinCpuCores => "minCpuCores",
        }
    }

    /// Sort key of a record, `None` when the field is absent
    pub fn key(&self, record: &Record) -> Option<SortKey> {
        let text = |s: Option<&str>| s.map(|s| SortKey::Text(s.to_lowercase()));
        match self {
            SortField::ModelName => text(Some(record.model_name.as_str())),
            SortField::QuantFormat => text(record.quant_format.as_deref()),
            SortField::ModelType => text(record.model_type.as_deref()),
            SortField::License => text(record.license.as_deref()),
            SortField::UploadDate => text(record.upload_date.as_deref()),
            SortField::FileSize => record.file_size.map(SortKey::Number),
            SortField::DownloadCount => record.download_count.map(SortKey::Number),
            SortField::LikeCount => record.like_count.map(SortKey::Number),
            SortField::MinRamGb => record.min_ram_gb.map(|n| SortKey::Number(n as u64)),
            SortField::MinCpuCores => record.min_cpu_cores.map(|n| SortKey::Number(n as u64)),
        }
    }
}

impl FromStr for SortField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "name" | "modelname" => SortField::ModelName,
            "format" | "quant" | "quantformat" => SortField::QuantFormat,
            "type" | "modeltype" => SortField::ModelType,
            "license" => SortField::License,
            "size" | "filesize" => SortField::FileSize,
            "downloads" | "downloadcount" => SortField::DownloadCount,
            "likes" | "likecount" => SortField::LikeCount,
            "date" | "uploaddate" => SortField::UploadDate,
            "ram" | "minramgb" => SortField::MinRamGb,
            "cores" | "cpu" | "mincpucores" => SortField::MinCpuCores,
            other => return Err(format!("unknown sort field: {other}")),
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

/// Field and direction to order results by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: SortField,
    #[serde(default)]
    pub direction: Direction,
}

impl SortSpec {
    pub fn asc(field: SortField) -> Self {
        Self {
            field,
            direction: Direction::Ascending,
        }
    }

    pub fn desc(field: SortField) -> Self {
        Self {
            field,
            direction: Direction::Descending,
        }
    }
}

impl fmt::Display for SortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction {
            Direction::Ascending => write!(f, "{}:asc", self.field.name()),
            Direction::Descending => write!(f, "{}:desc", self.field.name()),
        }
    }
}

/// Comparable value extracted once per candidate
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum SortKey {
    Number(u64),
    /// Lower-cased text
    Text(String),
}

/// Order `positions`, returning them as a sequence.
///
/// Absent keys always come last, whichever the direction. Equal keys keep
/// ascending position order, so the sort is stable in both directions.
/// Without a sort spec positions stay in dataset order.
pub fn sort_positions(
    records: &[Record],
    positions: &RoaringBitmap,
    spec: Option<&SortSpec>,
    parallel: bool,
) -> Vec<Position> {
    let Some(spec) = spec else {
        return positions.iter().collect();
    };

    let mut keyed: Vec<(Option<SortKey>, Position)> = if parallel {
        let positions: Vec<Position> = positions.iter().collect();
        positions
            .into_par_iter()
            .map(|p| (records.get(p as usize).and_then(|r| spec.field.key(r)), p))
            .collect()
    } else {
        positions
            .iter()
            .map(|p| (records.get(p as usize).and_then(|r| spec.field.key(r)), p))
            .collect()
    };

    let descending = spec.direction == Direction::Descending;
    let compare = |a: &(Option<SortKey>, Position), b: &(Option<SortKey>, Position)| {
        let by_key = match (&a.0, &b.0) {
            (Some(x), Some(y)) if descending => y.cmp(x),
            (Some(x), Some(y)) => x.cmp(y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_key.then(a.1.cmp(&b.1))
    };

    // Positions are unique so the comparator is total and an unstable sort
    // is deterministic.
    if parallel {
        keyed.par_sort_unstable_by(compare);
    } else {
        keyed.sort_unstable_by(compare);
    }

    keyed.into_iter().map(|(_, p)| p).collect()
}
