use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::training::TrainingError;

/// Row indices of the two partitions, in shuffled order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub holdout: Vec<usize>,
}

/// Shuffle `0..rows` with a seeded RNG and cut off `ceil(rows * fraction)`
/// indices as the holdout.
///
/// The same `rows`, `holdout_fraction` and `seed` always give the same split.
pub fn train_holdout_split(rows: usize, holdout_fraction: f64, seed: u64) -> Result<Split, TrainingError> {
    if !(holdout_fraction > 0.0 && holdout_fraction < 1.0) {
        return Err(TrainingError::InvalidHoldout(holdout_fraction));
    }
    if rows == 0 {
        return Err(TrainingError::EmptyDataset);
    }

    let holdout_rows = (rows as f64 * holdout_fraction).ceil() as usize;
    if holdout_rows >= rows {
        return Err(TrainingError::EmptyPartition {
            partition: "train",
            rows,
            holdout_fraction,
        });
    }

    let mut indices: Vec<usize> = (0..rows).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let train = indices.split_off(holdout_rows);
    Ok(Split {
        train,
        holdout: indices,
    })
}
