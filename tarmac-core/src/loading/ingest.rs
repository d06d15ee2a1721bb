use std::collections::BTreeMap;
use std::sync::Arc;

use log::{info, warn};
use rayon::prelude::*;

use super::records::{RawRecord, RecordSet, parse_timestamp};
use crate::algo::classify::in_speed_gap;
use crate::config::ClassifierConfig;
use crate::model::{DropReason, QualityReport, SurfacePoint, VehicleTrack};

/// Classified, per-vehicle sorted tracks and the quality counters of
/// ingestion.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    /// Ordered by vehicle id.
    pub tracks: Vec<VehicleTrack>,
    pub report: QualityReport,
}

/// Validates, classifies and groups records by vehicle.
///
/// Records without a vehicle id or a usable position are dropped and
/// counted; a missing or unparsable timestamp keeps the record but is
/// flagged. Never fails.
pub fn ingest(records: impl IntoIterator<Item = RawRecord>, config: &ClassifierConfig) -> Batch {
    let mut report = QualityReport::default();
    let mut by_vehicle: BTreeMap<String, Vec<SurfacePoint>> = BTreeMap::new();
    let mut vehicle_ids: BTreeMap<String, Arc<str>> = BTreeMap::new();

    for record in records {
        report.records_seen += 1;
        let Some(vehicle) = record
            .vehicle_id
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
        else {
            report.record_drop(DropReason::MissingVehicleId);
            continue;
        };
        let (Some(lat), Some(lon)) = (record.lat, record.lon) else {
            report.record_drop(DropReason::MissingPosition);
            continue;
        };
        if !valid_position(lat, lon) {
            report.record_drop(DropReason::InvalidPosition);
            continue;
        }

        let timestamp = record.timestamp.as_deref().and_then(parse_timestamp);
        if timestamp.is_none() {
            report.unparsable_timestamps += 1;
            report
                .vehicles_with_untimed_points
                .insert(vehicle.to_string());
        }

        let id = vehicle_ids
            .entry(vehicle.to_string())
            .or_insert_with(|| Arc::from(vehicle))
            .clone();
        let mut point = SurfacePoint::new(id, timestamp, lat, lon)
            .with_altitude(record.altitude.unwrap_or(0.0))
            .with_speed(record.ground_speed.unwrap_or(0.0));
        if let Some(heading) = record.heading.filter(|h| h.is_finite()) {
            point = point.with_heading(heading.rem_euclid(360.0));
        }
        let point = point.classified(config);

        if point.class.is_surface() && in_speed_gap(point.ground_speed, config) {
            report.ambiguous_speed_points += 1;
        }
        *report.points_by_class.entry(point.class).or_default() += 1;
        report.records_accepted += 1;

        by_vehicle.entry(vehicle.to_string()).or_default().push(point);
    }

    let grouped: Vec<(Arc<str>, Vec<SurfacePoint>)> = by_vehicle
        .into_iter()
        .filter_map(|(vehicle, points)| vehicle_ids.get(&vehicle).map(|id| (id.clone(), points)))
        .collect();
    let tracks: Vec<VehicleTrack> = grouped
        .into_par_iter()
        .map(|(id, points)| VehicleTrack::new(id, points))
        .collect();

    report.vehicles = tracks.len();
    report.degenerate_vehicles = tracks.iter().filter(|t| t.is_degenerate()).count();

    let dropped = report.dropped_total();
    if dropped > 0 {
        warn!(
            "Dropped {dropped} of {} records without a vehicle id or usable position",
            report.records_seen
        );
    }
    if report.unparsable_timestamps > 0 {
        warn!(
            "{} records have missing or unparsable timestamps",
            report.unparsable_timestamps
        );
    }
    info!(
        "Ingested {} points from {} vehicles",
        report.records_accepted, report.vehicles
    );

    Batch { tracks, report }
}

/// Ingests a CSV record set, counting its unreadable rows as dropped.
pub fn ingest_set(set: RecordSet, config: &ClassifierConfig) -> Batch {
    let mut batch = ingest(set.records, config);
    if set.unreadable > 0 {
        batch.report.records_seen += set.unreadable;
        *batch
            .report
            .dropped
            .entry(DropReason::Unreadable)
            .or_default() += set.unreadable;
    }
    batch
}

fn valid_position(lat: f64, lon: f64) -> bool {
    lat.is_finite()
        && lon.is_finite()
        && (-90.0..=90.0).contains(&lat)
        && (-180.0..=180.0).contains(&lon)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::KinematicClass;

    fn record(vehicle: Option<&str>, ts: &str, lat: Option<f64>, lon: Option<f64>) -> RawRecord {
        RawRecord {
            vehicle_id: vehicle.map(str::to_string),
            timestamp: Some(ts.to_string()),
            lat,
            lon,
            ..RawRecord::default()
        }
    }

    #[test]
    fn drops_malformed_records() {
        let records = vec![
            record(Some("A"), "1700000010", Some(1.0), Some(1.0)),
            record(None, "1700000000", Some(1.0), Some(1.0)),
            record(Some("  "), "1700000000", Some(1.0), Some(1.0)),
            record(Some("A"), "1700000000", None, Some(1.0)),
            record(Some("A"), "1700000000", Some(95.0), Some(1.0)),
            record(Some("A"), "1700000000", Some(f64::NAN), Some(1.0)),
            record(Some("A"), "1700000000", Some(1.0), Some(1.0)),
        ];
        let batch = ingest(records, &ClassifierConfig::default());
        let report = &batch.report;
        assert_eq!(report.records_seen, 7);
        assert_eq!(report.records_accepted, 2);
        assert_eq!(report.dropped[&DropReason::MissingVehicleId], 2);
        assert_eq!(report.dropped[&DropReason::MissingPosition], 1);
        assert_eq!(report.dropped[&DropReason::InvalidPosition], 2);
        assert_eq!(batch.tracks.len(), 1);
        // sorted chronologically
        let first = batch.tracks[0].points[0].timestamp.unwrap();
        let second = batch.tracks[0].points[1].timestamp.unwrap();
        assert!(first < second);
    }

    #[test]
    fn flags_bad_timestamps_and_defaults_missing_values() {
        let records = vec![
            record(Some("B"), "not a time", Some(1.0), Some(1.0)),
            RawRecord {
                vehicle_id: Some("C".into()),
                lat: Some(2.0),
                lon: Some(2.0),
                altitude: Some(900.0),
                ..RawRecord::default()
            },
        ];
        let batch = ingest(records, &ClassifierConfig::default());
        assert_eq!(batch.report.unparsable_timestamps, 2);
        assert!(batch.report.vehicles_with_untimed_points.contains("B"));
        assert_eq!(batch.report.degenerate_vehicles, 2);
        assert_eq!(batch.tracks[0].points[0].class, KinematicClass::Stationary);
        assert_eq!(batch.tracks[1].points[0].class, KinematicClass::Airborne);
        assert_eq!(batch.report.points_by_class[&KinematicClass::Airborne], 1);
    }

    #[test]
    fn unreadable_rows_are_dropped_records() {
        let set = RecordSet {
            records: vec![record(Some("A"), "1700000000", Some(1.0), Some(1.0))],
            unreadable: 2,
        };
        let batch = ingest_set(set, &ClassifierConfig::default());
        assert_eq!(batch.report.records_seen, 3);
        assert_eq!(batch.report.records_accepted, 1);
        assert_eq!(batch.report.dropped_total(), 2);
    }

    #[test]
    fn counts_gap_speeds() {
        let mut r = record(Some("A"), "1700000000", Some(1.0), Some(1.0));
        r.ground_speed = Some(25.0);
        let batch = ingest(vec![r], &ClassifierConfig::default());
        assert_eq!(batch.report.ambiguous_speed_points, 1);
    }
}
