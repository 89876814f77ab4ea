//! Order-preserving train/test split for time series.

use super::ModelError;
use std::ops::Range;

/// Row ranges of a chronological split: train is the leading block, test
/// the trailing block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndex {
    pub train: Range<usize>,
    pub test: Range<usize>,
}

/// Split `n` rows without shuffling.
///
/// `n_test = ceil(n * test_fraction)`, clamped so both sides keep at least
/// one row. A tiny epsilon keeps `ceil` from rounding up floating noise
/// (`15 * 0.2 = 3.0000000000000004`).
pub fn chronological_split(n: usize, test_fraction: f64) -> Result<SplitIndex, ModelError> {
    if n < 2 {
        return Err(ModelError::InsufficientRows {
            required: 2,
            actual: n,
        });
    }
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(ModelError::InvalidTestFraction(test_fraction));
    }

    let n_test = ((n as f64 * test_fraction) - 1e-9).ceil() as usize;
    let n_test = n_test.clamp(1, n - 1);
    let n_train = n - n_test;

    Ok(SplitIndex {
        train: 0..n_train,
        test: n_train..n,
    })
}
