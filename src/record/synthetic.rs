//! Deterministic synthetic catalogs for benches, tests and demos.

use crate::record::types::Record;

const FAMILIES: [&str; 8] = [
    "Llama", "Mistral", "Qwen", "Gemma", "Phi", "DeepSeek", "Falcon", "Yi",
];
const SIZES: [&str; 6] = ["1B", "3B", "7B", "13B", "34B", "70B"];
const VARIANTS: [&str; 6] = ["Chat", "Instruct", "Base", "Coder", "Vision", "Uncensored"];
const QUANTS: [&str; 10] = [
    "Q2_K", "Q3_K_M", "Q4_0", "Q4_K_M", "Q4_K_S", "Q5_K_M", "Q6_K", "Q8_0", "F16", "IQ4_XS",
];
const LICENSES: [&str; 5] = ["apache-2.0", "mit", "llama2", "cc-by-4.0", "other"];

/// Small linear congruential generator; reproducible across platforms
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    fn pick<'a>(&mut self, items: &[&'a str]) -> &'a str {
        items[(self.next() % items.len() as u64) as usize]
    }
}

/// Generate `count` records from `seed`. Every 17th record lacks a like
/// count so null handling gets exercised.
pub fn synthetic_records(count: usize, seed: u64) -> Vec<Record> {
    let mut rng = Lcg(seed ^ 0x9E37_79B9_7F4A_7C15);
    let mut records = Vec::with_capacity(count);

    for i in 0..count {
        let family = rng.pick(&FAMILIES);
        let size = rng.pick(&SIZES);
        let variant = rng.pick(&VARIANTS);
        let quant = rng.pick(&QUANTS);
        let billions: u64 = size.trim_end_matches('B').parse().unwrap_or(1);
        let file_size = billions * 600_000_000 + rng.next() % 400_000_000;

        records.push(Record {
            model_name: format!("{family} {size} {variant} v{}", i % 97),
            quant_format: Some(quant.to_string()),
            model_type: Some(family.to_string()),
            license: Some(rng.pick(&LICENSES).to_string()),
            file_size: Some(file_size),
            download_count: Some(rng.next() % 100_000),
            like_count: if i % 17 == 0 { None } else { Some(rng.next() % 5_000) },
            hugging_face_link: Some(format!("https://huggingface.co/synthetic/{family}-{i}")),
            min_ram_gb: Some([8, 16, 32, 64][(rng.next() % 4) as usize]),
            min_cpu_cores: Some([4, 6, 8, 12, 16][(rng.next() % 5) as usize]),
            gpu_required: Some(rng.next() % 3 == 0),
            ..Default::default()
        });
    }

    records
}
