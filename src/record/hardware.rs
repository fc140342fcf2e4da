//! Hardware requirement estimation for records that arrive without it.
//!
//! Requirements are rounded to common retail configurations so that the
//! hardware filters work on a small set of values.

use crate::config::HardwareConfig;
use crate::record::types::Record;
use regex::Regex;
use std::sync::OnceLock;

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Quantization prefixes considered memory-efficient (4-bit and below)
const EFFICIENT_FORMATS: [&str; 6] = ["Q4_", "Q3_", "Q2_", "IQ4_", "IQ3_", "IQ2_"];

/// Parameter-count patterns, tried in order. The first capture is billions.
const PARAM_PATTERNS: [&str; 4] = [
    // 7B, 13b, 1.5B followed by space, hyphen or end
    r"(?i)(\d+(?:\.\d+)?)b(?:\s|$|-)",
    r"(?i)(\d+(?:\.\d+)?)b-",
    r"(?i)-(\d+(?:\.\d+)?)b-",
    r"(?i)_(\d+(?:\.\d+)?)b_",
];

fn param_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        PARAM_PATTERNS
            .iter()
            .map(|p| Regex::new(p).expect("valid parameter pattern"))
            .collect()
    })
}

/// Derives RAM, CPU and GPU requirements from name, size and quantization
pub struct HardwareEstimator {
    config: HardwareConfig,
}

impl HardwareEstimator {
    pub fn new(config: HardwareConfig) -> Self {
        Self { config }
    }

    /// Fill in whichever hardware fields are absent. Present values are kept.
    pub fn fill_missing(&self, record: &mut Record) {
        if record.has_hardware() && !record.os_supported.is_empty() {
            return;
        }

        let file_size = record.file_size.unwrap_or(0);
        let quant = record.quant_format.as_deref().unwrap_or("");
        let params = self.estimate_parameters(&record.model_name, file_size);

        if record.min_ram_gb.is_none() {
            record.min_ram_gb = Some(self.ram_requirement(file_size, quant));
        }
        if record.min_cpu_cores.is_none() {
            record.min_cpu_cores = Some(self.cpu_requirement(params, file_size));
        }
        if record.gpu_required.is_none() {
            record.gpu_required = Some(self.gpu_requirement(params, file_size, quant));
        }
        if record.os_supported.is_empty() {
            record.os_supported = self.config.default_os_support.clone();
        }
    }

    /// Parameter count from the model name, else from file size
    pub fn estimate_parameters(&self, model_name: &str, file_size: u64) -> Option<u64> {
        for pattern in param_patterns() {
            if let Some(caps) = pattern.captures(model_name)
                && let Ok(billions) = caps[1].parse::<f64>()
            {
                return Some((billions * 1e9) as u64);
            }
        }

        // Quantized weights run roughly 1.5 GiB per billion parameters
        let billions = file_size as f64 / (1.5 * GIB);
        if billions > 0.5 {
            Some((billions * 1e9) as u64)
        } else {
            None
        }
    }

    /// Minimum RAM in GB, one of 8, 16, 32, 64, 128
    pub fn ram_requirement(&self, file_size: u64, quant: &str) -> u32 {
        if file_size == 0 {
            return 8;
        }
        let mut ram = file_size as f64 / GIB * self.config.ram_multiplier;
        if is_efficient_quantization(quant) {
            ram *= 1.0 - self.config.quantization_ram_reduction;
        }
        match ram {
            r if r <= 8.0 => 8,
            r if r <= 16.0 => 16,
            r if r <= 32.0 => 32,
            r if r <= 64.0 => 64,
            _ => 128,
        }
    }

    /// Minimum CPU cores, one of 4, 6, 8, 12, 16
    pub fn cpu_requirement(&self, params: Option<u64>, file_size: u64) -> u32 {
        if let Some(p) = params {
            return match p {
                p if p <= self.config.small_model_threshold => 4,
                p if p <= self.config.medium_model_threshold => 6,
                p if p <= 30_000_000_000 => 8,
                p if p <= 70_000_000_000 => 12,
                _ => 16,
            };
        }

        match file_size as f64 / GIB {
            gb if gb <= 2.0 => 4,
            gb if gb <= 6.0 => 6,
            gb if gb <= 15.0 => 8,
            gb if gb <= 40.0 => 12,
            _ => 16,
        }
    }

    pub fn gpu_requirement(&self, params: Option<u64>, file_size: u64, quant: &str) -> bool {
        if params.is_some_and(|p| p >= self.config.gpu_required_threshold) {
            return true;
        }
        let gb = file_size as f64 / GIB;
        if gb >= 8.0 {
            return true;
        }
        !(is_efficient_quantization(quant) && gb <= 4.0)
    }
}

impl Default for HardwareEstimator {
    fn default() -> Self {
        Self::new(HardwareConfig::default())
    }
}

fn is_efficient_quantization(quant: &str) -> bool {
    let upper = quant.to_ascii_uppercase();
    EFFICIENT_FORMATS.iter().any(|prefix| upper.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    const GB: u64 = 1024 * 1024 * 1024;

    #[test]
    fn test_parameters_from_name() {
        let est = HardwareEstimator::default();
        assert_eq!(est.estimate_parameters("Llama 2 7B Chat", 0), Some(7_000_000_000));
        assert_eq!(est.estimate_parameters("qwen-1.5b-base", 0), Some(1_500_000_000));
        assert_eq!(est.estimate_parameters("Mixtral_70B_Q4", 0), Some(70_000_000_000));
    }

    #[test]
    fn test_parameters_from_unseparated_name() {
        let est = HardwareEstimator::default();
        assert_eq!(est.estimate_parameters("gemma2b-it", 0), Some(2_000_000_000));
        assert_eq!(est.estimate_parameters("Qwen1.5B Chat", 0), Some(1_500_000_000));
        assert_eq!(est.estimate_parameters("Mistral7B Instruct", 0), Some(7_000_000_000));
        assert_eq!(est.estimate_parameters("phi-2.7b", 0), Some(2_700_000_000));
    }

    #[test]
    fn test_unseparated_name_drives_requirements() {
        let est = HardwareEstimator::default();
        // 30 GiB on disk would say 16 cores; the name says 7B
        let mut record = Record {
            model_name: "Mistral7B Instruct".to_string(),
            file_size: Some(30 * GB),
            ..Default::default()
        };
        est.fill_missing(&mut record);
        assert_eq!(record.min_cpu_cores, Some(6));
    }

    #[test]
    fn test_parameters_from_size() {
        let est = HardwareEstimator::default();
        assert!(est.estimate_parameters("Phi", 3 * GB).is_some());
        assert_eq!(est.estimate_parameters("Tiny", 100 * 1024 * 1024), None);
    }

    #[test]
    fn test_ram_tiers() {
        let est = HardwareEstimator::default();
        assert_eq!(est.ram_requirement(0, ""), 8);
        assert_eq!(est.ram_requirement(4 * GB, "Q4_K_M"), 8);
        assert_eq!(est.ram_requirement(7 * GB, "F16"), 16);
        assert_eq!(est.ram_requirement(40 * GB, "Q8_0"), 128);
    }

    #[test]
    fn test_cpu_and_gpu() {
        let est = HardwareEstimator::default();
        assert_eq!(est.cpu_requirement(Some(7_000_000_000), 0), 6);
        assert_eq!(est.cpu_requirement(None, 10 * GB), 8);
        assert!(!est.gpu_requirement(Some(7_000_000_000), 4 * GB, "Q4_K_M"));
        assert!(est.gpu_requirement(Some(13_000_000_000), 4 * GB, "Q4_K_M"));
        assert!(est.gpu_requirement(None, 2 * GB, "Q8_0"));
    }

    #[test]
    fn test_fill_missing_keeps_existing() {
        let est = HardwareEstimator::default();
        let mut record = Record {
            model_name: "Mistral 7B".to_string(),
            file_size: Some(4 * GB),
            quant_format: Some("Q4_K_M".to_string()),
            min_cpu_cores: Some(2),
            ..Default::default()
        };
        est.fill_missing(&mut record);

        assert_eq!(record.min_cpu_cores, Some(2));
        assert_eq!(record.min_ram_gb, Some(8));
        assert_eq!(record.gpu_required, Some(false));
        assert_eq!(record.os_supported.len(), 3);
    }
}
