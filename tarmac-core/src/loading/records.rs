use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Error;

/// A surveillance record as delivered by the upstream parser.
///
/// Every field is optional; ingestion decides what is usable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawRecord {
    pub vehicle_id: Option<String>,
    pub timestamp: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub altitude: Option<f64>,
    pub ground_speed: Option<f64>,
    pub heading: Option<f64>,
}

/// Records read from a CSV source plus the number of rows that failed to
/// deserialize.
#[derive(Debug, Clone, Default)]
pub struct RecordSet {
    pub records: Vec<RawRecord>,
    pub unreadable: usize,
}

/// Reads `vehicle_id,timestamp,lat,lon,altitude,ground_speed,heading` rows.
///
/// Rows that fail to deserialize are skipped and counted.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or its header is unreadable.
pub fn read_records(path: &Path) -> Result<RecordSet, Error> {
    let file = File::open(path).map_err(|e| {
        std::io::Error::new(
            e.kind(),
            format!("Failed to open file '{}': {}", path.display(), e),
        )
    })?;
    read_records_from(file)
}

/// Same as [`read_records`] over any reader.
///
/// # Errors
///
/// Returns an error if the header row cannot be read.
pub fn read_records_from<R: Read>(reader: R) -> Result<RecordSet, Error> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);
    csv_reader.headers()?;

    let mut set = RecordSet::default();
    for row in csv_reader.deserialize::<RawRecord>() {
        match row {
            Ok(record) => set.records.push(record),
            Err(e) => {
                log::trace!("Skipping unreadable row: {e}");
                set.unreadable += 1;
            }
        }
    }
    Ok(set)
}

/// Parses RFC 3339, `YYYY-MM-DD HH:MM:SS[.f]` (UTC, `T` separator allowed)
/// or Unix epoch seconds.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }
    parse_epoch(text)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn parse_epoch(text: &str) -> Option<DateTime<Utc>> {
    let secs: f64 = text.parse().ok()?;
    if !secs.is_finite() {
        return None;
    }
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1e9).round().min(999_999_999.0) as u32;
    DateTime::from_timestamp(whole as i64, nanos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn timestamp_formats() {
        let expected = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        assert_eq!(parse_timestamp("2023-11-14T22:13:20Z"), Some(expected));
        assert_eq!(parse_timestamp("2023-11-14T23:13:20+01:00"), Some(expected));
        assert_eq!(parse_timestamp("2023-11-14 22:13:20"), Some(expected));
        assert_eq!(parse_timestamp(" 1700000000 "), Some(expected));
        let fractional = parse_timestamp("1700000000.5").unwrap();
        assert_eq!(fractional.nanosecond(), 500_000_000);
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp(""), None);
    }

    #[test]
    fn reads_rows_and_counts_bad_ones() {
        let data = "\
vehicle_id,timestamp,lat,lon,altitude,ground_speed,heading
AAL12,2023-11-14T22:13:20Z,40.64,-73.78,3.0,0.2,
AAL12,2023-11-14T22:13:30Z,40.64,-73.78,,0.1,90
BAD,2023-11-14T22:13:30Z,north,-73.78,,0.1,90
,2023-11-14T22:13:40Z,40.64,,,,
";
        let set = read_records_from(data.as_bytes()).unwrap();
        assert_eq!(set.records.len(), 3);
        assert_eq!(set.unreadable, 1);
        assert_eq!(set.records[0].heading, None);
        assert_eq!(set.records[1].altitude, None);
        assert_eq!(set.records[1].heading, Some(90.0));
        assert_eq!(set.records[2].vehicle_id, None);
        assert_eq!(set.records[2].lon, None);
    }
}
