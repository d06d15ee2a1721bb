use std::ops::Range;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::point::KinematicClass;

/// Maximal run of consecutive same-class samples of one vehicle.
#[derive(Debug, Clone, PartialEq)]
pub struct DwellSegment {
    pub vehicle_id: Arc<str>,
    pub class: KinematicClass,
    /// Centroid latitude
    pub lat: f64,
    /// Centroid longitude
    pub lon: f64,
    pub point_count: usize,
    /// Zero when `timing_valid` is false.
    pub duration_seconds: f64,
    pub avg_speed: f64,
    pub max_speed: f64,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// Member points within the vehicle's sorted track.
    pub range: Range<usize>,
    /// False if any member timestamp failed to parse.
    pub timing_valid: bool,
}
