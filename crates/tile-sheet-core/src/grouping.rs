use crate::error::{Result, TileSheetError};
use crate::model::{Batch, Sized2d};

/// Number of batches needed for `total` items at `per_batch` items each.
pub fn batch_count(total: usize, per_batch: usize) -> usize {
    if per_batch == 0 {
        return 0;
    }
    total.div_ceil(per_batch)
}

/// Partitions `items` into `ceil(total / per_batch)` batches with mixed
/// orientation.
///
/// Items are split into a wide queue (`w >= h`) and a tall queue (`w < h`),
/// each keeping its input order. The concatenation wide-then-tall is dealt
/// round-robin: element `i` goes to batch `i % batch_count`. Batch sizes
/// therefore differ by at most one.
pub fn group_into_batches<T: Sized2d>(items: Vec<T>, per_batch: usize) -> Result<Vec<Batch<T>>> {
    if per_batch == 0 {
        return Err(TileSheetError::InvalidInput(
            "tiles per batch must be a positive integer".into(),
        ));
    }
    if items.is_empty() {
        return Err(TileSheetError::InvalidInput("no tiles to group".into()));
    }

    let count = batch_count(items.len(), per_batch);
    let (wide, tall): (Vec<T>, Vec<T>) = items.into_iter().partition(|it| {
        let (w, h) = it.size();
        w >= h
    });

    let mut batches: Vec<Batch<T>> = (0..count)
        .map(|index| Batch {
            index,
            items: Vec::with_capacity(per_batch),
        })
        .collect();
    for (i, item) in wide.into_iter().chain(tall).enumerate() {
        batches[i % count].items.push(item);
    }
    Ok(batches)
}
