//! Surveillance samples and per-vehicle tracks

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::algo::classify::classify;
use crate::config::ClassifierConfig;

/// Coarse movement regime of a sample.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KinematicClass {
    Stationary,
    Taxi,
    Runway,
    /// At or above the surface altitude ceiling, out of scope.
    Airborne,
    /// Speed in the taxi/runway gap under [`crate::config::SpeedGapPolicy::Unclassified`].
    #[default]
    Unclassified,
}

impl KinematicClass {
    /// Whether the sample lies on the airport surface.
    pub fn is_surface(self) -> bool {
        self != KinematicClass::Airborne
    }

    pub fn as_str(self) -> &'static str {
        match self {
            KinematicClass::Stationary => "STATIONARY",
            KinematicClass::Taxi => "TAXI",
            KinematicClass::Runway => "RUNWAY",
            KinematicClass::Airborne => "AIRBORNE",
            KinematicClass::Unclassified => "UNCLASSIFIED",
        }
    }
}

impl std::fmt::Display for KinematicClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated surveillance sample.
///
/// Built by ingestion; the kinematic class is assigned once by
/// [`SurfacePoint::classified`] and the point is not modified afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfacePoint {
    pub vehicle_id: Arc<str>,
    /// `None` when the source timestamp could not be parsed.
    pub timestamp: Option<DateTime<Utc>>,
    pub lat: f64,
    pub lon: f64,
    /// Metres
    pub altitude: f64,
    /// Metres per second
    pub ground_speed: f64,
    /// Degrees clockwise from north
    pub heading: Option<f64>,
    pub class: KinematicClass,
}

impl SurfacePoint {
    pub fn new(
        vehicle_id: impl Into<Arc<str>>,
        timestamp: Option<DateTime<Utc>>,
        lat: f64,
        lon: f64,
    ) -> Self {
        Self {
            vehicle_id: vehicle_id.into(),
            timestamp,
            lat,
            lon,
            altitude: 0.0,
            ground_speed: 0.0,
            heading: None,
            class: KinematicClass::Unclassified,
        }
    }

    #[must_use]
    pub fn with_altitude(mut self, altitude: f64) -> Self {
        self.altitude = altitude;
        self
    }

    #[must_use]
    pub fn with_speed(mut self, ground_speed: f64) -> Self {
        self.ground_speed = ground_speed;
        self
    }

    #[must_use]
    pub fn with_heading(mut self, heading: f64) -> Self {
        self.heading = Some(heading);
        self
    }

    /// Assigns the kinematic class derived from altitude and speed.
    #[must_use]
    pub fn classified(mut self, config: &ClassifierConfig) -> Self {
        self.class = classify(self.altitude, self.ground_speed, config);
        self
    }

    /// Seconds elapsed from `earlier` to `self`, if both timestamps parsed.
    #[allow(clippy::cast_precision_loss)]
    pub fn seconds_since(&self, earlier: &SurfacePoint) -> Option<f64> {
        match (self.timestamp, earlier.timestamp) {
            (Some(end), Some(start)) => {
                Some((end - start).num_milliseconds() as f64 / 1000.0)
            }
            _ => None,
        }
    }

    pub fn geometry(&self) -> geo::Point<f64> {
        geo::Point::new(self.lon, self.lat)
    }
}

/// All points of one vehicle, chronologically sorted.
#[derive(Debug, Clone)]
pub struct VehicleTrack {
    pub vehicle_id: Arc<str>,
    pub points: Vec<SurfacePoint>,
}

impl VehicleTrack {
    /// Sorts `points` by timestamp. Points without a timestamp keep their
    /// relative input order and are placed after every timed point.
    pub fn new(vehicle_id: Arc<str>, mut points: Vec<SurfacePoint>) -> Self {
        points.sort_by_key(|p| (p.timestamp.is_none(), p.timestamp));
        Self { vehicle_id, points }
    }

    /// Tracks with fewer than two points cannot form segments or edges.
    pub fn is_degenerate(&self) -> bool {
        self.points.len() < 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).single()
    }

    #[test]
    fn track_sorts_untimed_points_last() {
        let track = VehicleTrack::new(
            "V1".into(),
            vec![
                SurfacePoint::new("V1", at(20), 1.0, 1.0),
                SurfacePoint::new("V1", None, 2.0, 2.0),
                SurfacePoint::new("V1", at(10), 3.0, 3.0),
                SurfacePoint::new("V1", None, 4.0, 4.0),
            ],
        );
        let lats: Vec<f64> = track.points.iter().map(|p| p.lat).collect();
        assert_eq!(lats, vec![3.0, 1.0, 2.0, 4.0]);
    }

    #[test]
    fn seconds_since_requires_both_timestamps() {
        let a = SurfacePoint::new("V1", at(0), 0.0, 0.0);
        let b = SurfacePoint::new("V1", at(90), 0.0, 0.0);
        let c = SurfacePoint::new("V1", None, 0.0, 0.0);
        assert_eq!(b.seconds_since(&a), Some(90.0));
        assert_eq!(c.seconds_since(&a), None);
    }

    #[test]
    fn single_point_track_is_degenerate() {
        let track = VehicleTrack::new("V1".into(), vec![SurfacePoint::new("V1", at(0), 0.0, 0.0)]);
        assert!(track.is_degenerate());
    }
}
