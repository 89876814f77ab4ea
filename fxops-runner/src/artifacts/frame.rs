//! Parquet storage for `Frame` artifacts.
//!
//! `data.parquet` holds the index as a `Date` column followed by one `f64`
//! column per series. `schema.json` records the column order, row count and
//! content hash; `load` rejects a parquet file that disagrees with it.

use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use fxops_core::frame::TIMESTAMP_COLUMN;
use fxops_core::Frame;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{read_file, write_file, ArtifactError, Materializer};

pub const PARQUET_FILE: &str = "data.parquet";
pub const SCHEMA_FILE: &str = "schema.json";

/// Sidecar describing a stored frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameSchema {
    /// Ordered column names, index first.
    pub columns: Vec<String>,
    pub rows: usize,
    pub content_hash: String,
}

impl FrameSchema {
    pub fn of(frame: &Frame) -> Self {
        Self {
            columns: frame.schema(),
            rows: frame.height(),
            content_hash: frame.content_hash(),
        }
    }
}

pub struct FrameMaterializer;

impl Materializer<Frame> for FrameMaterializer {
    fn name(&self) -> &str {
        "frame"
    }

    fn save(&self, frame: &Frame, uri: &Path) -> Result<(), ArtifactError> {
        let df = frame_to_dataframe(frame)?;
        write_parquet(&df, &uri.join(PARQUET_FILE))?;
        let schema = serde_json::to_string_pretty(&FrameSchema::of(frame))?;
        write_file(&uri.join(SCHEMA_FILE), schema)?;
        debug!(uri = %uri.display(), rows = frame.height(), "frame materialized");
        Ok(())
    }

    fn load(&self, uri: &Path) -> Result<Option<Frame>, ArtifactError> {
        let schema: FrameSchema = serde_json::from_str(&read_file(&uri.join(SCHEMA_FILE))?)?;
        let path = uri.join(PARQUET_FILE);
        let df = read_parquet(&path)?;
        let frame = dataframe_to_frame(&df, &schema)?;

        if frame.height() != schema.rows || frame.content_hash() != schema.content_hash {
            return Err(ArtifactError::Corrupt {
                path,
                reason: "parquet contents do not match schema.json".into(),
            });
        }
        Ok(Some(frame))
    }
}

// The parquet `Date` type counts days from 1970-01-01, which is
// `NaiveDate::default()`.
fn epoch() -> NaiveDate {
    NaiveDate::default()
}

fn parquet_err(context: &str) -> impl Fn(PolarsError) -> ArtifactError + '_ {
    move |e| ArtifactError::Parquet(format!("{context}: {e}"))
}

fn frame_to_dataframe(frame: &Frame) -> Result<DataFrame, ArtifactError> {
    let days: Vec<i32> = frame
        .timestamps()
        .iter()
        .map(|d| (*d - epoch()).num_days() as i32)
        .collect();

    let mut columns = Vec::with_capacity(frame.width() + 1);
    columns.push(
        Column::new(TIMESTAMP_COLUMN.into(), days)
            .cast(&DataType::Date)
            .map_err(parquet_err("date cast"))?,
    );
    for series in frame.columns() {
        columns.push(Column::new(series.name.as_str().into(), series.values.clone()));
    }
    DataFrame::new(columns).map_err(parquet_err("dataframe creation"))
}

fn write_parquet(df: &DataFrame, path: &Path) -> Result<(), ArtifactError> {
    let file = fs::File::create(path).map_err(|e| ArtifactError::io(path, e))?;
    ParquetWriter::new(file)
        .finish(&mut df.clone())
        .map_err(parquet_err("write parquet"))?;
    Ok(())
}

fn read_parquet(path: &Path) -> Result<DataFrame, ArtifactError> {
    let file = fs::File::open(path).map_err(|e| ArtifactError::io(path, e))?;
    ParquetReader::new(file)
        .finish()
        .map_err(parquet_err("read parquet"))
}

fn dataframe_to_frame(df: &DataFrame, schema: &FrameSchema) -> Result<Frame, ArtifactError> {
    let n = df.height();
    let dates = df
        .column(TIMESTAMP_COLUMN)
        .map_err(parquet_err("timestamp column"))?
        .date()
        .map_err(parquet_err("timestamp column type"))?;

    let mut timestamps = Vec::with_capacity(n);
    for i in 0..n {
        let days = dates
            .get(i)
            .ok_or_else(|| ArtifactError::Parquet(format!("null timestamp at row {i}")))?;
        timestamps.push(epoch() + chrono::Duration::days(days as i64));
    }

    let mut frame = Frame::new(timestamps);
    for name in schema.columns.iter().filter(|c| *c != TIMESTAMP_COLUMN) {
        let ca = df
            .column(name)
            .map_err(parquet_err("value column"))?
            .f64()
            .map_err(parquet_err("value column type"))?;
        let values = (0..n).map(|i| ca.get(i).unwrap_or(f64::NAN)).collect();
        frame.push_column(name.as_str(), values)?;
    }
    Ok(frame)
}
