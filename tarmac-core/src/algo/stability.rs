//! Sliding-window position stability analysis
//!
//! Fallback stand detector for feeds whose speed never drops to the
//! stationary threshold. A window qualifies when it is slow on average,
//! positionally tight and long enough.

use std::sync::Arc;

use crate::algo::segment::sanitized_speed;
use crate::config::StabilityConfig;
use crate::model::SurfacePoint;
use crate::spatial::LocalProjection;

const MIN_SCORE: f64 = 1e-3;

/// A qualifying window of consecutive points.
#[derive(Debug, Clone, PartialEq)]
pub struct StabilityWindow {
    pub vehicle_id: Arc<str>,
    pub lat: f64,
    pub lon: f64,
    pub avg_speed: f64,
    /// Root-mean-square distance of members from the window centroid, metres.
    pub spread_m: f64,
    pub duration_seconds: f64,
    /// Confidence in (0, 1] that the window is a stationary location.
    pub score: f64,
    pub start_index: usize,
}

/// Scans a sorted track with windows of `config.window` points advancing
/// by `config.step`. Windows containing airborne points never qualify.
pub fn stable_windows(points: &[SurfacePoint], config: &StabilityConfig) -> Vec<StabilityWindow> {
    let size = config.window.max(2);
    if points.len() < size {
        return Vec::new();
    }

    (0..=points.len() - size)
        .step_by(config.step.max(1))
        .filter_map(|start| evaluate(&points[start..start + size], start, config))
        .collect()
}

#[allow(clippy::cast_precision_loss)]
fn evaluate(
    window: &[SurfacePoint],
    start_index: usize,
    config: &StabilityConfig,
) -> Option<StabilityWindow> {
    if window.iter().any(|p| !p.class.is_surface()) {
        return None;
    }
    let first = window.first()?;
    let last = window.last()?;
    let n = window.len() as f64;

    let avg_speed = window.iter().map(sanitized_speed).sum::<f64>() / n;
    if avg_speed >= config.max_avg_speed {
        return None;
    }

    let duration_seconds = if window.iter().all(|p| p.timestamp.is_some()) {
        last.seconds_since(first).unwrap_or(0.0).max(0.0)
    } else {
        0.0
    };
    if duration_seconds < config.min_duration_seconds {
        return None;
    }

    let lat = window.iter().map(|p| p.lat).sum::<f64>() / n;
    let lon = window.iter().map(|p| p.lon).sum::<f64>() / n;
    let projection = LocalProjection::new(lat, lon);
    let spread_m = (window
        .iter()
        .map(|p| {
            let [x, y] = projection.project(p.lat, p.lon);
            x * x + y * y
        })
        .sum::<f64>()
        / n)
        .sqrt();
    if spread_m >= config.max_spread_m {
        return None;
    }

    let score = ((1.0 - avg_speed / config.max_avg_speed)
        * (1.0 - spread_m / config.max_spread_m))
        .clamp(MIN_SCORE, 1.0);

    Some(StabilityWindow {
        vehicle_id: first.vehicle_id.clone(),
        lat,
        lon,
        avg_speed,
        spread_m,
        duration_seconds,
        score,
        start_index,
    })
}
