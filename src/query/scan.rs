use crate::record::{Position, Record};
use rayon::prelude::*;
use roaring::RoaringBitmap;
use std::thread;

/// How linear scans over records are executed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Single pass on the calling thread
    Blocking,
    /// Fan out across the rayon pool
    Parallel,
    /// Calling thread, yielding between fixed-size batches
    Cooperative { batch: usize },
}

/// Positions of records matching `pred`, restricted to `candidates` when given
pub fn scan<F>(
    records: &[Record],
    candidates: Option<&RoaringBitmap>,
    mode: ScanMode,
    pred: F,
) -> RoaringBitmap
where
    F: Fn(&Record) -> bool + Sync,
{
    let matches = |pos: Position| records.get(pos as usize).is_some_and(&pred);

    match (mode, candidates) {
        (ScanMode::Blocking, Some(cands)) => cands.iter().filter(|&p| matches(p)).collect(),
        (ScanMode::Blocking, None) => (0..records.len() as Position)
            .filter(|&p| matches(p))
            .collect(),
        (ScanMode::Parallel, Some(cands)) => {
            let positions: Vec<Position> = cands.iter().collect();
            let hits: Vec<Position> = positions.into_par_iter().filter(|&p| matches(p)).collect();
            hits.into_iter().collect()
        }
        (ScanMode::Parallel, None) => {
            let hits: Vec<Position> = (0..records.len() as Position)
                .into_par_iter()
                .filter(|&p| matches(p))
                .collect();
            hits.into_iter().collect()
        }
        (ScanMode::Cooperative { batch }, cands) => {
            let positions: Vec<Position> = match cands {
                Some(c) => c.iter().collect(),
                None => (0..records.len() as Position).collect(),
            };
            let mut out = RoaringBitmap::new();
            for (i, chunk) in positions.chunks(batch.max(1)).enumerate() {
                if i > 0 {
                    thread::yield_now();
                }
                out.extend(chunk.iter().copied().filter(|&p| matches(p)));
            }
            out
        }
    }
}
