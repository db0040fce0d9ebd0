use std::{fs::File, io::Read, path::Path};

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;

use crate::errors::{Error, Result};

/// One row of a replay source.
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRecord {
    /// When the bar was observed.
    pub timestamp: DateTime<Utc>,
    /// Symbol of the bar.
    pub symbol: String,
    /// Open price.
    pub open: f64,
    /// High price.
    pub high: f64,
    /// Low price.
    pub low: f64,
    /// Close price.
    pub close: f64,
    /// Traded volume.
    pub volume: f64,
}

/// Parses a source timestamp.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS` with or without an offset,
/// `YYYY-MM-DDTHH:MM:SS` and a bare `YYYY-MM-DD` (midnight UTC).
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%:z", "%Y-%m-%d %H:%M:%S%z"] {
        if let Ok(dt) = DateTime::parse_from_str(value, format) {
            return Ok(dt.with_timezone(&Utc));
        }
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN)));
    }

    Err(Error::InvalidTimestamp(value.to_string()))
}

/// One source row as written, before timestamp parsing.
///
/// Shared by the CSV and JSON readers. Absent or empty prices are `None`.
#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(alias = "Date", alias = "timestamp", alias = "Timestamp")]
    date: String,
    #[serde(alias = "Symbol")]
    symbol: String,
    #[serde(alias = "Open", default)]
    open: Option<f64>,
    #[serde(alias = "High", default)]
    high: Option<f64>,
    #[serde(alias = "Low", default)]
    low: Option<f64>,
    #[serde(alias = "Close", default)]
    close: Option<f64>,
    #[serde(alias = "Volume", default)]
    volume: Option<f64>,
}

impl RawRecord {
    fn into_record(self, line: u64) -> Result<SourceRecord> {
        if self.symbol.is_empty() {
            return Err(Error::InvalidRecord {
                line,
                reason: "empty symbol".to_string(),
            });
        }

        Ok(SourceRecord {
            timestamp: parse_timestamp(&self.date)?,
            symbol: self.symbol,
            open: self.open.unwrap_or(f64::NAN),
            high: self.high.unwrap_or(f64::NAN),
            low: self.low.unwrap_or(f64::NAN),
            close: self.close.unwrap_or(f64::NAN),
            volume: self.volume.unwrap_or(f64::NAN),
        })
    }
}

/// Reads CSV records (`Date,Symbol,Open,High,Low,Close,Volume`) from `reader`.
/// Headers may be capitalized or lowercase, in any order; extra columns are ignored.
pub fn read_csv_records<R: Read>(reader: R) -> Result<Vec<SourceRecord>> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = reader.headers()?.clone();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let line = row.position().map_or(0, |p| p.line());
        let raw: RawRecord = row.deserialize(Some(&headers)).map_err(|err| Error::InvalidRecord {
            line,
            reason: err.to_string(),
        })?;
        records.push(raw.into_record(line)?);
    }
    Ok(records)
}

/// Reads CSV records from `filepath`.
pub fn get_records_from_csv(filepath: impl AsRef<Path>) -> Result<Vec<SourceRecord>> {
    let file = File::open(filepath)?;
    read_csv_records(file)
}

#[cfg(feature = "json")]
/// Reads a JSON array of records from `reader`. `null` or absent prices are missing data.
pub fn read_json_records<R: Read>(reader: R) -> Result<Vec<SourceRecord>> {
    let raw: Vec<RawRecord> = serde_json::from_reader(std::io::BufReader::new(reader))?;
    raw.into_iter()
        .zip(1..)
        .map(|(record, index)| record.into_record(index))
        .collect()
}

#[cfg(feature = "json")]
/// Reads a JSON array of records from `filepath`.
pub fn get_records_from_json(filepath: impl AsRef<Path>) -> Result<Vec<SourceRecord>> {
    let file = File::open(filepath)?;
    read_json_records(file)
}
