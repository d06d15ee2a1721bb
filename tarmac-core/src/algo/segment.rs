//! Extraction of dwell segments from a vehicle's sorted track

use crate::config::SegmentParams;
use crate::model::{DwellSegment, KinematicClass, SurfacePoint};

/// Lazily yields the dwell segments of one sorted track.
///
/// A run grows while consecutive points satisfy the predicate and share the
/// kinematic class of the first point, so a segment never spans a class
/// change. Runs shorter than `min_run_length` or `min_duration_seconds` are
/// discarded. Each point is visited once.
pub struct DwellSegmenter<'a, P> {
    points: &'a [SurfacePoint],
    predicate: P,
    params: SegmentParams,
    cursor: usize,
}

/// Segments `points` (sorted by timestamp) into runs matching `predicate`.
pub fn segment<P>(points: &[SurfacePoint], predicate: P, params: SegmentParams) -> DwellSegmenter<'_, P>
where
    P: Fn(&SurfacePoint) -> bool,
{
    DwellSegmenter {
        points,
        predicate,
        params,
        cursor: 0,
    }
}

/// Segments of a single kinematic class.
pub fn segment_class(
    points: &[SurfacePoint],
    class: KinematicClass,
    params: SegmentParams,
) -> impl Iterator<Item = DwellSegment> + '_ {
    segment(points, move |p: &SurfacePoint| p.class == class, params)
}

impl<P> Iterator for DwellSegmenter<'_, P>
where
    P: Fn(&SurfacePoint) -> bool,
{
    type Item = DwellSegment;

    fn next(&mut self) -> Option<Self::Item> {
        let len = self.points.len();
        while self.cursor < len {
            let start = self.cursor;
            let first = &self.points[start];
            if !(self.predicate)(first) {
                self.cursor += 1;
                continue;
            }

            let mut end = start + 1;
            while end < len {
                let next = &self.points[end];
                if next.class != first.class || !(self.predicate)(next) {
                    break;
                }
                end += 1;
            }
            self.cursor = end;

            if let Some(segment) = build_segment(self.points, start..end, self.params) {
                return Some(segment);
            }
        }
        None
    }
}

#[allow(clippy::cast_precision_loss)]
fn build_segment(
    points: &[SurfacePoint],
    range: std::ops::Range<usize>,
    params: SegmentParams,
) -> Option<DwellSegment> {
    let run = &points[range.clone()];
    if run.len() < params.min_run_length {
        return None;
    }
    let first = run.first()?;
    let last = run.last()?;

    let timing_valid = run.iter().all(|p| p.timestamp.is_some());
    let duration_seconds = if timing_valid {
        last.seconds_since(first).unwrap_or(0.0).max(0.0)
    } else {
        log::trace!(
            "Segment of {} at {:?} has unparsable timestamps, duration set to zero",
            first.vehicle_id,
            range
        );
        0.0
    };
    if duration_seconds < params.min_duration_seconds {
        return None;
    }

    let n = run.len() as f64;
    let (lat_sum, lon_sum, speed_sum, max_speed) =
        run.iter()
            .fold((0.0, 0.0, 0.0, 0.0_f64), |(lat, lon, sum, max), p| {
                let speed = sanitized_speed(p);
                (lat + p.lat, lon + p.lon, sum + speed, max.max(speed))
            });

    Some(DwellSegment {
        vehicle_id: first.vehicle_id.clone(),
        class: first.class,
        lat: lat_sum / n,
        lon: lon_sum / n,
        point_count: run.len(),
        duration_seconds,
        avg_speed: speed_sum / n,
        max_speed,
        start_time: first.timestamp,
        end_time: last.timestamp,
        range,
        timing_valid,
    })
}

pub(crate) fn sanitized_speed(point: &SurfacePoint) -> f64 {
    if point.ground_speed.is_finite() {
        point.ground_speed.abs()
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClassifierConfig;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(secs: i64) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).single()
    }

    fn point(secs: i64, lat: f64, lon: f64, speed: f64) -> SurfacePoint {
        SurfacePoint::new("X", at(secs), lat, lon)
            .with_speed(speed)
            .classified(&ClassifierConfig::default())
    }

    fn params(min_run_length: usize, min_duration_seconds: f64) -> SegmentParams {
        SegmentParams {
            min_run_length,
            min_duration_seconds,
        }
    }

    #[test]
    fn five_stationary_points_make_one_segment() {
        // ~1 m apart, 15 s spacing
        let points: Vec<SurfacePoint> = (0..5)
            .map(|i| point(i * 15, 51.47 + i as f64 * 1e-5, -0.45, 0.3))
            .collect();
        let segments: Vec<_> =
            segment_class(&points, KinematicClass::Stationary, params(5, 30.0)).collect();
        assert_eq!(segments.len(), 1);
        let s = &segments[0];
        assert_eq!(s.point_count, 5);
        assert!((s.duration_seconds - 60.0).abs() < 1e-9);
        assert!((s.avg_speed - 0.3).abs() < 1e-9);
        assert!(s.timing_valid);
        assert_eq!(s.range, 0..5);
    }

    #[test]
    fn class_change_splits_runs() {
        let speeds = [0.1, 0.1, 0.1, 5.0, 5.0, 5.0, 0.2, 0.2, 0.2, 0.2];
        let points: Vec<SurfacePoint> = speeds
            .iter()
            .enumerate()
            .map(|(i, &s)| point(i as i64 * 10, 0.0, 0.0, s))
            .collect();

        let all: Vec<_> = segment(&points, |p: &SurfacePoint| p.class.is_surface(), params(3, 0.0)).collect();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].class, KinematicClass::Stationary);
        assert_eq!(all[1].class, KinematicClass::Taxi);
        assert_eq!(all[1].range, 3..6);
        assert_eq!(all[2].point_count, 4);

        for s in &all {
            assert!(s.point_count >= 3);
            assert!(points[s.range.clone()].iter().all(|p| p.class == s.class));
        }
    }

    #[test]
    fn short_runs_are_discarded() {
        let speeds = [0.1, 0.1, 5.0, 0.1, 0.1, 0.1];
        let points: Vec<SurfacePoint> = speeds
            .iter()
            .enumerate()
            .map(|(i, &s)| point(i as i64 * 100, 0.0, 0.0, s))
            .collect();
        let stationary: Vec<_> =
            segment_class(&points, KinematicClass::Stationary, params(3, 0.0)).collect();
        assert_eq!(stationary.len(), 1);
        assert_eq!(stationary[0].range, 3..6);

        let long_only: Vec<_> =
            segment_class(&points, KinematicClass::Stationary, params(3, 300.0)).collect();
        assert!(long_only.is_empty());
    }

    #[test]
    fn unparsable_timestamp_zeroes_duration() {
        let mut points: Vec<SurfacePoint> = (0..4).map(|i| point(i * 20, 0.0, 0.0, 0.1)).collect();
        points[2].timestamp = None;
        let segments: Vec<_> =
            segment_class(&points, KinematicClass::Stationary, params(3, 0.0)).collect();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].duration_seconds, 0.0);
        assert!(!segments[0].timing_valid);
    }

    #[test]
    fn empty_and_single_point_input() {
        assert_eq!(
            segment_class(&[], KinematicClass::Taxi, params(1, 0.0)).count(),
            0
        );
        let one = vec![point(0, 0.0, 0.0, 0.1)];
        assert_eq!(
            segment_class(&one, KinematicClass::Stationary, params(3, 0.0)).count(),
            0
        );
    }
}
