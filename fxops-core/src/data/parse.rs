//! CSV → Frame parsing for provider responses.
//!
//! The header must contain `timestamp`; every other column is parsed as
//! `f64`. Empty fields become missing values. Row order is preserved
//! (Alpha Vantage returns newest first; preprocessing sorts).

use super::provider::DataError;
use crate::frame::{Frame, TIMESTAMP_COLUMN};
use chrono::{NaiveDate, NaiveDateTime};

/// Parse CSV text into a `Frame`.
pub fn parse_csv(text: &str) -> Result<Frame, DataError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    let ts_idx = headers
        .iter()
        .position(|h| h == TIMESTAMP_COLUMN)
        .ok_or_else(|| DataError::MissingColumn(TIMESTAMP_COLUMN.to_string()))?;

    let value_cols: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != ts_idx)
        .map(|(i, h)| (i, h.to_string()))
        .collect();

    let mut timestamps = Vec::new();
    let mut values: Vec<Vec<f64>> = vec![Vec::new(); value_cols.len()];

    for record in reader.records() {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);

        let raw_ts = record.get(ts_idx).unwrap_or("");
        let ts = parse_timestamp(raw_ts).ok_or_else(|| DataError::Parse {
            line,
            column: TIMESTAMP_COLUMN.to_string(),
            value: raw_ts.to_string(),
        })?;
        timestamps.push(ts);

        for (slot, (idx, name)) in values.iter_mut().zip(&value_cols) {
            let raw = record.get(*idx).unwrap_or("");
            slot.push(parse_value(raw).ok_or_else(|| DataError::Parse {
                line,
                column: name.clone(),
                value: raw.to_string(),
            })?);
        }
    }

    let mut frame = Frame::new(timestamps);
    for ((_, name), column) in value_cols.into_iter().zip(values) {
        frame.push_column(name, column)?;
    }
    Ok(frame)
}

/// Daily dates, or datetimes truncated to their date.
fn parse_timestamp(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok().or_else(|| {
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
            .ok()
            .map(|dt| dt.date())
    })
}

fn parse_value(raw: &str) -> Option<f64> {
    if raw.is_empty() {
        return Some(f64::NAN);
    }
    raw.parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FX_DAILY: &str = "timestamp,open,high,low,close\n\
        2024-01-03,83.2100,83.3500,83.1000,83.2800\n\
        2024-01-02,83.1500,83.3000,83.0500,83.2100\n";

    #[test]
    fn parses_alpha_vantage_layout() {
        let frame = parse_csv(FX_DAILY).unwrap();
        assert_eq!(frame.height(), 2);
        assert_eq!(frame.column_names(), vec!["open", "high", "low", "close"]);
        assert_eq!(
            frame.timestamps()[0],
            NaiveDate::from_ymd_opt(2024, 1, 3).unwrap()
        );
        assert_eq!(frame.column("close").unwrap(), &[83.28, 83.21]);
    }

    #[test]
    fn missing_timestamp_header_is_an_error() {
        let err = parse_csv("date,close\n2024-01-02,1.0\n").unwrap_err();
        assert!(matches!(err, DataError::MissingColumn(c) if c == "timestamp"));
    }

    #[test]
    fn empty_fields_are_missing_values() {
        let frame = parse_csv("timestamp,close\n2024-01-02,\n2024-01-03,2.5\n").unwrap();
        let close = frame.column("close").unwrap();
        assert!(close[0].is_nan());
        assert_eq!(close[1], 2.5);
    }

    #[test]
    fn bad_number_reports_line_and_column() {
        let err = parse_csv("timestamp,close\n2024-01-02,abc\n").unwrap_err();
        match err {
            DataError::Parse {
                line,
                column,
                value,
            } => {
                assert_eq!(line, 2);
                assert_eq!(column, "close");
                assert_eq!(value, "abc");
            }
            other => panic!("expected Parse error, got {other:?}"),
        }
    }

    #[test]
    fn datetime_stamps_are_truncated_to_dates() {
        let frame = parse_csv("timestamp,close\n2024-01-02 16:00:00,1.0\n").unwrap();
        assert_eq!(
            frame.timestamps()[0],
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
        );
    }

    #[test]
    fn header_only_yields_empty_frame() {
        let frame = parse_csv("timestamp,open,close\n").unwrap();
        assert!(frame.is_empty());
        assert_eq!(frame.column_names(), vec!["open", "close"]);
    }
}
