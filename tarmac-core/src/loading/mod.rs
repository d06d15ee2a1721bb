//! This module is responsible for turning parsed surveillance records into
//! classified per-vehicle tracks.

mod ingest;
mod records;

pub use ingest::{Batch, ingest, ingest_set};
pub use records::{RawRecord, RecordSet, parse_timestamp, read_records, read_records_from};
