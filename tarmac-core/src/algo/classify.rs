//! Kinematic regime from altitude and ground speed

use crate::config::{ClassifierConfig, SpeedGapPolicy};
use crate::model::KinematicClass;

/// Classifies a sample by altitude and ground speed.
///
/// Pure: the result depends only on the two inputs and the configuration.
/// NaN stands for a missing value and counts as zero, so a sample with
/// missing altitude is on the ground, never airborne. An infinite altitude
/// is a present reading and compares as is. Non-finite speeds count as zero.
/// Speeds in the gap between `taxi_max_speed` and `runway_min_speed` follow
/// `gap_policy`.
pub fn classify(altitude: f64, ground_speed: f64, config: &ClassifierConfig) -> KinematicClass {
    let altitude = if altitude.is_nan() { 0.0 } else { altitude };
    let speed = if ground_speed.is_finite() {
        ground_speed.abs()
    } else {
        0.0
    };

    if altitude >= config.surface_max_altitude {
        KinematicClass::Airborne
    } else if speed <= config.stationary_max_speed {
        KinematicClass::Stationary
    } else if speed < config.taxi_max_speed {
        KinematicClass::Taxi
    } else if speed >= config.runway_min_speed {
        KinematicClass::Runway
    } else {
        match config.gap_policy {
            SpeedGapPolicy::Taxi => KinematicClass::Taxi,
            SpeedGapPolicy::Runway => KinematicClass::Runway,
            SpeedGapPolicy::Unclassified => KinematicClass::Unclassified,
        }
    }
}

/// Whether a speed falls in the taxi/runway gap.
pub fn in_speed_gap(ground_speed: f64, config: &ClassifierConfig) -> bool {
    let speed = if ground_speed.is_finite() {
        ground_speed.abs()
    } else {
        0.0
    };
    speed >= config.taxi_max_speed && speed < config.runway_min_speed
}
