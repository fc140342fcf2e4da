use crate::record::Position;
use roaring::RoaringBitmap;

/// Every position of a dataset with `universe` records
pub fn full(universe: Position) -> RoaringBitmap {
    let mut all = RoaringBitmap::new();
    all.insert_range(0..universe);
    all
}

/// Intersect position sets.
///
/// No sets yields the full range, a single set is returned untouched. Sets
/// are folded smallest first so the running result only shrinks, and the
/// fold stops as soon as it is empty.
pub fn intersect(mut sets: Vec<RoaringBitmap>, universe: Position) -> RoaringBitmap {
    match sets.len() {
        0 => return full(universe),
        1 => return sets.pop().unwrap_or_default(),
        _ => {}
    }

    sets.sort_by_key(|s| s.len());
    let mut iter = sets.into_iter();
    let mut acc = iter.next().unwrap_or_default();
    for set in iter {
        if acc.is_empty() {
            break;
        }
        acc &= set;
    }
    acc
}
