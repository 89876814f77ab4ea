//! Lag feature preprocessing.
//!
//! Raw series → feature table:
//! 1. sort ascending by timestamp
//! 2. rename `close` to `y`
//! 3. append `lag_1 ..= lag_N`, where `lag_k` is `y` shifted down `k` rows
//! 4. drop every row with a missing value
//!
//! The output therefore has `rows_in - N` rows when the input is complete.

use crate::frame::{Frame, FrameError, TIMESTAMP_COLUMN};
use thiserror::Error;
use tracing::info;

pub const DEFAULT_LAGS: usize = 5;
pub const SOURCE_COLUMN: &str = "close";
pub const TARGET_COLUMN: &str = "y";
pub const LAG_PREFIX: &str = "lag_";

#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("expected column '{0}' is missing")]
    MissingColumn(String),

    #[error("lag count must be at least 1")]
    InvalidLagCount,

    #[error("frame error: {0}")]
    Frame(#[from] FrameError),
}

/// Name of the `k`-th lag column.
pub fn lag_column(k: usize) -> String {
    format!("{LAG_PREFIX}{k}")
}

/// Names of the lag columns present in `frame`, in frame order.
pub fn lag_columns(frame: &Frame) -> Vec<&str> {
    frame
        .column_names()
        .into_iter()
        .filter(|name| name.contains(LAG_PREFIX))
        .collect()
}

/// Build the feature table from a raw series.
pub fn make_lag_features(raw: &Frame, lags: usize) -> Result<Frame, FeatureError> {
    if lags == 0 {
        return Err(FeatureError::InvalidLagCount);
    }
    for required in [TIMESTAMP_COLUMN, SOURCE_COLUMN] {
        if !raw.has_column(required) {
            return Err(FeatureError::MissingColumn(required.to_string()));
        }
    }

    let mut frame = raw.sort_by_timestamp();
    frame.rename_column(SOURCE_COLUMN, TARGET_COLUMN)?;
    for k in 1..=lags {
        let lagged = frame.shifted(TARGET_COLUMN, k)?;
        frame.push_column(lag_column(k), lagged)?;
    }

    let features = frame.drop_incomplete();
    info!(
        rows_in = raw.height(),
        rows_out = features.height(),
        lags,
        "built lag features"
    );
    Ok(features)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn series(closes: &[f64]) -> Frame {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        // Newest first, as Alpha Vantage delivers it.
        let dates: Vec<NaiveDate> = (0..closes.len())
            .rev()
            .map(|i| start + chrono::Duration::days(i as i64))
            .collect();
        let values: Vec<f64> = closes.iter().rev().copied().collect();
        Frame::new(dates).with_column("close", values).unwrap()
    }

    #[test]
    fn ten_rows_give_five_feature_rows() {
        let closes: Vec<f64> = (0..10).map(|i| 100.0 + i as f64).collect();
        let features = make_lag_features(&series(&closes), DEFAULT_LAGS).unwrap();

        assert_eq!(features.height(), 5);
        assert_eq!(
            features.column_names(),
            vec!["y", "lag_1", "lag_2", "lag_3", "lag_4", "lag_5"]
        );
        assert_eq!(
            features.column("y").unwrap(),
            &[105.0, 106.0, 107.0, 108.0, 109.0]
        );
        assert_eq!(
            features.column("lag_5").unwrap(),
            &[100.0, 101.0, 102.0, 103.0, 104.0]
        );
    }

    #[test]
    fn missing_close_is_rejected() {
        let frame = Frame::new(vec![NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()])
            .with_column("open", vec![1.0])
            .unwrap();
        match make_lag_features(&frame, DEFAULT_LAGS) {
            Err(FeatureError::MissingColumn(c)) => assert_eq!(c, "close"),
            other => panic!("expected MissingColumn, got {other:?}"),
        }
    }

    #[test]
    fn zero_lags_is_rejected() {
        assert!(matches!(
            make_lag_features(&series(&[1.0, 2.0]), 0),
            Err(FeatureError::InvalidLagCount)
        ));
    }

    #[test]
    fn incomplete_source_rows_are_dropped() {
        let mut closes: Vec<f64> = (0..12).map(|i| i as f64).collect();
        closes[11] = f64::NAN;
        let features = make_lag_features(&series(&closes), 2).unwrap();
        // Two leading rows lost to lags, the last row lost to the gap.
        assert_eq!(features.height(), 9);
    }

    #[test]
    fn other_columns_are_carried_through() {
        let frame = series(&[1.0, 2.0, 3.0])
            .with_column("open", vec![0.5, 0.5, 0.5])
            .unwrap();
        let features = make_lag_features(&frame, 1).unwrap();
        assert!(features.column("open").is_some());
        assert_eq!(lag_columns(&features), vec!["lag_1"]);
    }

    proptest! {
        #[test]
        fn output_height_and_order(closes in prop::collection::vec(1.0f64..1000.0, 6..200)) {
            let n = closes.len();
            let features = make_lag_features(&series(&closes), DEFAULT_LAGS).unwrap();

            prop_assert_eq!(features.height(), n - DEFAULT_LAGS);
            prop_assert_eq!(lag_columns(&features).len(), DEFAULT_LAGS);
            for w in features.timestamps().windows(2) {
                prop_assert!(w[0] < w[1]);
            }
            for name in lag_columns(&features) {
                prop_assert!(features.column(name).unwrap().iter().all(|v| !v.is_nan()));
            }
        }
    }
}
