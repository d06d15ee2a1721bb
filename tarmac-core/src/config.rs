//! Tunable parameters of the inference pipeline.
//!
//! Every section and field is optional when deserialized; missing ones fall
//! back to the defaults below, per node type or segment class for the
//! nested parameter tables. [`PipelineConfig::validate`] must be called before
//! any work is done, the pipeline entry point does so itself.

use serde::{Deserialize, Deserializer, Serialize};

use crate::Error;

/// How samples whose speed falls between `taxi_max_speed` and
/// `runway_min_speed` are classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedGapPolicy {
    #[default]
    Taxi,
    Runway,
    /// Keep the sample out of segments and clusters.
    Unclassified,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Samples at or above this altitude (metres) are airborne.
    pub surface_max_altitude: f64,
    /// m/s
    pub stationary_max_speed: f64,
    /// m/s
    pub taxi_max_speed: f64,
    /// m/s
    pub runway_min_speed: f64,
    pub gap_policy: SpeedGapPolicy,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            surface_max_altitude: 600.0,
            stationary_max_speed: 0.5,
            taxi_max_speed: 20.0,
            runway_min_speed: 30.0,
            gap_policy: SpeedGapPolicy::Taxi,
        }
    }
}

/// Minimum size of an emitted dwell segment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentParams {
    pub min_run_length: usize,
    pub min_duration_seconds: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentConfig {
    pub stand: SegmentParams,
    pub taxi: SegmentParams,
    pub runway: SegmentParams,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            stand: SegmentParams {
                min_run_length: 5,
                min_duration_seconds: 300.0,
            },
            taxi: SegmentParams {
                min_run_length: 3,
                min_duration_seconds: 30.0,
            },
            runway: SegmentParams {
                min_run_length: 3,
                min_duration_seconds: 0.0,
            },
        }
    }
}

/// Density parameters for one node type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClusterParams {
    /// Neighbourhood radius in metres.
    pub radius_m: f64,
    /// Minimum number of candidates forming a cluster.
    pub min_support: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterConfig {
    pub stand: ClusterParams,
    pub taxiway: ClusterParams,
    pub runway: ClusterParams,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            stand: ClusterParams {
                radius_m: 10.0,
                min_support: 3,
            },
            taxiway: ClusterParams {
                radius_m: 30.0,
                min_support: 5,
            },
            runway: ClusterParams {
                radius_m: 100.0,
                min_support: 2,
            },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PartialSegmentParams {
    min_run_length: Option<usize>,
    min_duration_seconds: Option<f64>,
}

impl PartialSegmentParams {
    fn or(self, fallback: SegmentParams) -> SegmentParams {
        SegmentParams {
            min_run_length: self.min_run_length.unwrap_or(fallback.min_run_length),
            min_duration_seconds: self
                .min_duration_seconds
                .unwrap_or(fallback.min_duration_seconds),
        }
    }
}

impl<'de> Deserialize<'de> for SegmentConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Default, Deserialize)]
        #[serde(default)]
        struct Tables {
            stand: PartialSegmentParams,
            taxi: PartialSegmentParams,
            runway: PartialSegmentParams,
        }

        let tables = Tables::deserialize(deserializer)?;
        let defaults = SegmentConfig::default();
        Ok(Self {
            stand: tables.stand.or(defaults.stand),
            taxi: tables.taxi.or(defaults.taxi),
            runway: tables.runway.or(defaults.runway),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PartialClusterParams {
    radius_m: Option<f64>,
    min_support: Option<usize>,
}

impl PartialClusterParams {
    fn or(self, fallback: ClusterParams) -> ClusterParams {
        ClusterParams {
            radius_m: self.radius_m.unwrap_or(fallback.radius_m),
            min_support: self.min_support.unwrap_or(fallback.min_support),
        }
    }
}

impl<'de> Deserialize<'de> for ClusterConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Default, Deserialize)]
        #[serde(default)]
        struct Tables {
            stand: PartialClusterParams,
            taxiway: PartialClusterParams,
            runway: PartialClusterParams,
        }

        let tables = Tables::deserialize(deserializer)?;
        let defaults = ClusterConfig::default();
        Ok(Self {
            stand: tables.stand.or(defaults.stand),
            taxiway: tables.taxiway.or(defaults.taxiway),
            runway: tables.runway.or(defaults.runway),
        })
    }
}

/// Which stand detectors run and how their outputs combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StandDetection {
    /// Dwell segments first, stability windows only if that finds nothing.
    #[default]
    Fallback,
    DwellOnly,
    StabilityOnly,
    /// Both detectors always run, outputs are deduplicated by the merger.
    Ensemble,
}

/// Sliding-window position stability analysis, the second stand tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilityConfig {
    /// Points per window.
    pub window: usize,
    /// Points the window advances by.
    pub step: usize,
    /// Relaxed speed ceiling, m/s.
    pub max_avg_speed: f64,
    /// Upper bound of the positional standard deviation, metres.
    pub max_spread_m: f64,
    pub min_duration_seconds: f64,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            window: 5,
            step: 1,
            max_avg_speed: 2.0,
            max_spread_m: 5.0,
            min_duration_seconds: 60.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpatialIndexKind {
    #[default]
    Rtree,
    BruteForce,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub classifier: ClassifierConfig,
    pub segments: SegmentConfig,
    pub clusters: ClusterConfig,
    pub stand_detection: StandDetection,
    pub stability: StabilityConfig,
    /// Same-type nodes closer than this (metres) are merged.
    pub merge_tolerance_m: f64,
    /// Points farther than this (metres) from every node are not linked.
    pub max_link_distance_m: f64,
    pub spatial_index: SpatialIndexKind,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            classifier: ClassifierConfig::default(),
            segments: SegmentConfig::default(),
            clusters: ClusterConfig::default(),
            stand_detection: StandDetection::default(),
            stability: StabilityConfig::default(),
            merge_tolerance_m: 5.0,
            max_link_distance_m: 200.0,
            spatial_index: SpatialIndexKind::default(),
        }
    }
}

impl PipelineConfig {
    /// Rejects inconsistent or out-of-range parameters.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] naming the first offending option.
    pub fn validate(&self) -> Result<(), Error> {
        let c = &self.classifier;
        non_negative("classifier.surface_max_altitude", c.surface_max_altitude)?;
        non_negative("classifier.stationary_max_speed", c.stationary_max_speed)?;
        non_negative("classifier.taxi_max_speed", c.taxi_max_speed)?;
        non_negative("classifier.runway_min_speed", c.runway_min_speed)?;
        if c.stationary_max_speed >= c.taxi_max_speed {
            return Err(Error::InvalidConfig(format!(
                "stationary_max_speed ({}) must be below taxi_max_speed ({})",
                c.stationary_max_speed, c.taxi_max_speed
            )));
        }
        if c.taxi_max_speed > c.runway_min_speed {
            return Err(Error::InvalidConfig(format!(
                "taxi_max_speed ({}) must not exceed runway_min_speed ({})",
                c.taxi_max_speed, c.runway_min_speed
            )));
        }

        for (name, params) in [
            ("segments.stand", &self.segments.stand),
            ("segments.taxi", &self.segments.taxi),
            ("segments.runway", &self.segments.runway),
        ] {
            if params.min_run_length == 0 {
                return Err(Error::InvalidConfig(format!(
                    "{name}.min_run_length must be at least 1"
                )));
            }
            non_negative(
                &format!("{name}.min_duration_seconds"),
                params.min_duration_seconds,
            )?;
        }

        for (name, params) in [
            ("clusters.stand", &self.clusters.stand),
            ("clusters.taxiway", &self.clusters.taxiway),
            ("clusters.runway", &self.clusters.runway),
        ] {
            positive(&format!("{name}.radius_m"), params.radius_m)?;
            if params.min_support == 0 {
                return Err(Error::InvalidConfig(format!(
                    "{name}.min_support must be at least 1"
                )));
            }
        }

        let s = &self.stability;
        if s.window < 2 {
            return Err(Error::InvalidConfig(
                "stability.window must span at least 2 points".to_string(),
            ));
        }
        if s.step == 0 {
            return Err(Error::InvalidConfig(
                "stability.step must be at least 1".to_string(),
            ));
        }
        positive("stability.max_avg_speed", s.max_avg_speed)?;
        positive("stability.max_spread_m", s.max_spread_m)?;
        non_negative("stability.min_duration_seconds", s.min_duration_seconds)?;

        non_negative("merge_tolerance_m", self.merge_tolerance_m)?;
        positive("max_link_distance_m", self.max_link_distance_m)?;
        Ok(())
    }
}

fn non_negative(name: &str, value: f64) -> Result<(), Error> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidConfig(format!(
            "{name} must be a finite non-negative number, got {value}"
        )))
    }
}

fn positive(name: &str, value: f64) -> Result<(), Error> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidConfig(format!(
            "{name} must be a finite positive number, got {value}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn stationary_above_taxi_is_rejected() {
        let mut config = PipelineConfig::default();
        config.classifier.stationary_max_speed = 25.0;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(msg) if msg.contains("stationary_max_speed")));
    }

    #[test]
    fn taxi_above_runway_is_rejected() {
        let mut config = PipelineConfig::default();
        config.classifier.taxi_max_speed = 40.0;
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn negative_merge_tolerance_is_rejected() {
        let config = PipelineConfig {
            merge_tolerance_m: -1.0,
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn nan_radius_is_rejected() {
        let mut config = PipelineConfig::default();
        config.clusters.runway.radius_m = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: PipelineConfig = serde_json::from_str(
            r#"{"merge_tolerance_m": 8.0, "classifier": {"gap_policy": "runway"}}"#,
        )
        .unwrap();
        assert_eq!(config.merge_tolerance_m, 8.0);
        assert_eq!(config.classifier.gap_policy, SpeedGapPolicy::Runway);
        assert_eq!(config.classifier.surface_max_altitude, 600.0);
        assert_eq!(config.clusters, ClusterConfig::default());
    }

    #[test]
    fn partial_parameter_tables_keep_class_defaults() {
        let config: PipelineConfig = serde_json::from_str(
            r#"{"clusters": {"stand": {"min_support": 4}}, "segments": {"runway": {"min_run_length": 6}}}"#,
        )
        .unwrap();
        let defaults = PipelineConfig::default();
        assert_eq!(config.clusters.stand.min_support, 4);
        assert_eq!(config.clusters.stand.radius_m, 10.0);
        assert_eq!(config.clusters.taxiway, defaults.clusters.taxiway);
        assert_eq!(config.segments.runway.min_run_length, 6);
        assert_eq!(config.segments.runway.min_duration_seconds, 0.0);
        assert_eq!(config.segments.stand, defaults.segments.stand);
    }
}
