//! Seeded train/test partitioning and k-fold index generation

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::debug;

/// Shuffle `0..n` with a fixed seed and split into (train, test) indices.
///
/// The test partition holds `ceil(n * test_fraction)` rows, kept to at
/// least one row on each side when `n >= 2`.
pub fn train_test_split(n: usize, test_fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let mut n_test = (n as f64 * test_fraction.clamp(0.0, 1.0)).ceil() as usize;
    if n >= 2 {
        n_test = n_test.clamp(1, n - 1);
    } else {
        n_test = 0;
    }

    let test = indices.split_off(n - n_test);

    debug!(
        train = indices.len(),
        test = test.len(),
        seed = seed,
        "Dataset split"
    );

    (indices, test)
}

/// Contiguous k-fold partitions over `0..n`, as (fit, validate) pairs.
///
/// The first `n % k` folds get one extra row. `k` is clamped to `2..=n`.
pub fn k_fold_indices(n: usize, k: usize) -> Vec<(Vec<usize>, Vec<usize>)> {
    if n < 2 {
        return Vec::new();
    }
    let k = k.clamp(2, n);
    let base = n / k;
    let extra = n % k;

    let mut folds = Vec::with_capacity(k);
    let mut start = 0;
    for fold in 0..k {
        let size = base + usize::from(fold < extra);
        let end = start + size;
        let validate: Vec<usize> = (start..end).collect();
        let fit: Vec<usize> = (0..start).chain(end..n).collect();
        folds.push((fit, validate));
        start = end;
    }
    folds
}
