use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Zero-based index of a record within the loaded dataset
pub type Position = u32;

/// A single downloadable model file in the catalog.
///
/// Records are immutable once loaded. Every field except the model name is
/// optional; absent values never match a filter and sort after present ones.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    #[serde(default, deserialize_with = "lenient_string")]
    pub model_name: String,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub quant_format: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub model_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub license: Option<String>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub file_size: Option<u64>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub file_size_formatted: Option<String>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub download_count: Option<u64>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub like_count: Option<u64>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub hugging_face_link: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub direct_download_link: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub upload_date: Option<String>,
    #[serde(default, rename = "minRamGB", deserialize_with = "lenient_small")]
    pub min_ram_gb: Option<u32>,
    #[serde(default, deserialize_with = "lenient_small")]
    pub min_cpu_cores: Option<u32>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub gpu_required: Option<bool>,
    #[serde(default)]
    pub os_supported: Vec<String>,
}

impl Record {
    /// Convenience constructor used by tests and synthetic data
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            model_name: name.into(),
            ..Default::default()
        }
    }

    /// Text value for an indexed text field
    pub fn text(&self, field: TextField) -> Option<&str> {
        match field {
            TextField::ModelName => Some(self.model_name.as_str()),
            TextField::QuantFormat => self.quant_format.as_deref(),
            TextField::ModelType => self.model_type.as_deref(),
            TextField::License => self.license.as_deref(),
        }
    }

    /// Value of a categorical field
    pub fn categorical(&self, field: CategoricalField) -> Option<&str> {
        match field {
            CategoricalField::QuantFormat => self.quant_format.as_deref(),
            CategoricalField::ModelType => self.model_type.as_deref(),
            CategoricalField::License => self.license.as_deref(),
        }
    }

    /// Value of a numeric range field
    pub fn numeric(&self, field: NumericField) -> Option<u64> {
        match field {
            NumericField::FileSize => self.file_size,
            NumericField::DownloadCount => self.download_count,
            NumericField::LikeCount => self.like_count,
        }
    }

    /// Normalize a freshly decoded record: blank strings become absent and
    /// link fields must be http(s) URLs.
    pub fn sanitize(&mut self) {
        self.model_name = self.model_name.trim().to_string();
        for value in [
            &mut self.quant_format,
            &mut self.model_type,
            &mut self.license,
            &mut self.file_size_formatted,
            &mut self.upload_date,
        ] {
            blank_to_none(value);
        }
        for link in [&mut self.hugging_face_link, &mut self.direct_download_link] {
            blank_to_none(link);
            if link.as_deref().is_some_and(|url| !is_http_url(url)) {
                *link = None;
            }
        }
        self.os_supported.retain(|os| !os.trim().is_empty());
    }

    /// Whether all hardware requirement fields are present
    pub fn has_hardware(&self) -> bool {
        self.min_ram_gb.is_some() && self.min_cpu_cores.is_some() && self.gpu_required.is_some()
    }
}

/// Text fields registered in the inverted search index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TextField {
    ModelName,
    QuantFormat,
    ModelType,
    License,
}

impl TextField {
    pub const ALL: [TextField; 4] = [
        TextField::ModelName,
        TextField::QuantFormat,
        TextField::ModelType,
        TextField::License,
    ];
}

/// Fields with a small closed vocabulary, filtered by equality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CategoricalField {
    QuantFormat,
    ModelType,
    License,
}

impl CategoricalField {
    pub const ALL: [CategoricalField; 3] = [
        CategoricalField::QuantFormat,
        CategoricalField::ModelType,
        CategoricalField::License,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CategoricalField::QuantFormat => "quantFormat",
            CategoricalField::ModelType => "modelType",
            CategoricalField::License => "license",
        }
    }
}

/// Non-negative integer fields filtered by inclusive range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NumericField {
    FileSize,
    DownloadCount,
    LikeCount,
}

impl NumericField {
    pub fn name(&self) -> &'static str {
        match self {
            NumericField::FileSize => "fileSize",
            NumericField::DownloadCount => "downloadCount",
            NumericField::LikeCount => "likeCount",
        }
    }
}

fn blank_to_none(value: &mut Option<String>) {
    if let Some(s) = value {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            *value = None;
        } else if trimmed.len() != s.len() {
            *value = Some(trimmed.to_string());
        }
    }
}

fn is_http_url(url: &str) -> bool {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    matches!(rest, Some(host) if !host.is_empty() && !host.contains(char::is_whitespace))
}

/// Coerce a JSON value into a non-negative count.
///
/// Integers, floats and numeric strings are accepted; negative values clamp
/// to zero and anything unparsable becomes absent.
pub(crate) fn coerce_count(value: &Value) -> Option<u64> {
    let number = match value {
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                return Some(u);
            }
            n.as_f64()?
        }
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        Value::Bool(_) | Value::Null | Value::Array(_) | Value::Object(_) => return None,
    };
    if number.is_nan() {
        None
    } else if number <= 0.0 || number.is_infinite() {
        Some(0)
    } else {
        Some(number.floor() as u64)
    }
}

fn lenient_count<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
    let value = Option::<Value>::deserialize(d)?;
    Ok(value.as_ref().and_then(coerce_count))
}

fn lenient_small<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
    let value = Option::<Value>::deserialize(d)?;
    Ok(value
        .as_ref()
        .and_then(coerce_count)
        .map(|n| n.min(u32::MAX as u64) as u32))
}

fn lenient_bool<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
    let value = Option::<Value>::deserialize(d)?;
    Ok(match value {
        Some(Value::Bool(b)) => Some(b),
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        },
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0),
        _ => None,
    })
}

fn lenient_opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    let value = Option::<Value>::deserialize(d)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(lenient_opt_string(d)?.unwrap_or_default())
}
