use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Every engine-defined threshold, grouped by the stage that uses it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

/// Pose validity gate shared by calibration, segment creation and recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Minimum mean confidence over all 13 joints.
    pub min_mean_confidence: f32,
    /// Largest accepted absolute coordinate value.
    pub max_abs_coordinate: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Profiles scoring below this are rejected.
    pub min_quality: f32,
    /// Each shoulder and hip must be at least this confident.
    pub min_anchor_confidence: f32,
    /// Joints below this confidence cost `low_confidence_penalty` each.
    pub joint_confidence_threshold: f32,
    pub low_confidence_penalty: f32,
    /// Torso lengths shorter than this are degenerate.
    pub min_body_length: f32,
    /// Allowed shoulder or hip height difference, in torso lengths.
    pub symmetry_tolerance: f32,
    pub asymmetry_penalty: f32,
    /// Allowed relative length difference between left and right bones.
    pub bone_ratio_tolerance: f32,
    pub bone_asymmetry_penalty: f32,
    /// Largest accepted `|center_offset|` component.
    pub max_center_offset: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub completion_threshold: f32,
    /// Care joints below this confidence are down-weighted.
    pub low_confidence_threshold: f32,
    /// Multiplier applied to a down-weighted joint.
    pub low_confidence_weight: f32,
    /// Care joints below this confidence get a zero correction.
    pub correction_min_confidence: f32,
    /// Distance, in torso lengths, at which a joint's similarity reaches zero.
    pub similarity_distance_scale: f32,
    /// Care joints moving less than this between keyposes do not drive progress.
    pub min_trajectory_length: f32,
    /// Progress below this counts as the start position for repetition tracking.
    pub rest_threshold: f32,
    /// Progress must drop this far below completion before a hold is released.
    pub release_hysteresis: f32,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_mean_confidence: 0.5,
            max_abs_coordinate: 10_000.0,
        }
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            min_quality: 0.6,
            min_anchor_confidence: 0.3,
            joint_confidence_threshold: 0.7,
            low_confidence_penalty: 0.05,
            min_body_length: 1e-3,
            symmetry_tolerance: 0.2,
            asymmetry_penalty: 0.2,
            bone_ratio_tolerance: 0.25,
            bone_asymmetry_penalty: 0.1,
            max_center_offset: 10_000.0,
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            completion_threshold: 0.95,
            low_confidence_threshold: 0.5,
            low_confidence_weight: 0.25,
            correction_min_confidence: 0.1,
            similarity_distance_scale: 1.0,
            min_trajectory_length: 0.01,
            rest_threshold: 0.1,
            release_hysteresis: 0.1,
        }
    }
}

fn check_unit(name: &str, value: f32) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::Validation(format!("{} must be in [0, 1], got {}", name, value)));
    }
    Ok(())
}

fn check_positive(name: &str, value: f32) -> Result<(), ConfigError> {
    if !(value.is_finite() && value > 0.0) {
        return Err(ConfigError::Validation(format!("{} must be positive, got {}", name, value)));
    }
    Ok(())
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file, then apply `SEGMENT_*` environment overrides.
    pub fn from_file_with_env<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub(crate) fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        use std::env;

        if let Ok(val) = env::var("SEGMENT_COMPLETION_THRESHOLD") {
            self.analysis.completion_threshold = val.parse().map_err(|_| {
                ConfigError::Validation("Invalid SEGMENT_COMPLETION_THRESHOLD".to_string())
            })?;
        }
        if let Ok(val) = env::var("SEGMENT_MIN_CALIBRATION_QUALITY") {
            self.calibration.min_quality = val.parse().map_err(|_| {
                ConfigError::Validation("Invalid SEGMENT_MIN_CALIBRATION_QUALITY".to_string())
            })?;
        }
        if let Ok(val) = env::var("SEGMENT_MIN_MEAN_CONFIDENCE") {
            self.validation.min_mean_confidence = val.parse().map_err(|_| {
                ConfigError::Validation("Invalid SEGMENT_MIN_MEAN_CONFIDENCE".to_string())
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let v = &self.validation;
        check_unit("validation.min_mean_confidence", v.min_mean_confidence)?;
        check_positive("validation.max_abs_coordinate", v.max_abs_coordinate)?;

        let c = &self.calibration;
        check_unit("calibration.min_quality", c.min_quality)?;
        check_unit("calibration.min_anchor_confidence", c.min_anchor_confidence)?;
        check_unit("calibration.joint_confidence_threshold", c.joint_confidence_threshold)?;
        check_unit("calibration.low_confidence_penalty", c.low_confidence_penalty)?;
        check_unit("calibration.asymmetry_penalty", c.asymmetry_penalty)?;
        check_unit("calibration.bone_asymmetry_penalty", c.bone_asymmetry_penalty)?;
        check_positive("calibration.min_body_length", c.min_body_length)?;
        check_positive("calibration.symmetry_tolerance", c.symmetry_tolerance)?;
        check_positive("calibration.bone_ratio_tolerance", c.bone_ratio_tolerance)?;
        check_positive("calibration.max_center_offset", c.max_center_offset)?;

        let a = &self.analysis;
        check_unit("analysis.completion_threshold", a.completion_threshold)?;
        check_unit("analysis.low_confidence_threshold", a.low_confidence_threshold)?;
        check_unit("analysis.low_confidence_weight", a.low_confidence_weight)?;
        check_unit("analysis.correction_min_confidence", a.correction_min_confidence)?;
        check_unit("analysis.rest_threshold", a.rest_threshold)?;
        check_unit("analysis.release_hysteresis", a.release_hysteresis)?;
        check_positive("analysis.similarity_distance_scale", a.similarity_distance_scale)?;
        check_positive("analysis.min_trajectory_length", a.min_trajectory_length)?;

        if a.rest_threshold >= a.completion_threshold {
            return Err(ConfigError::Validation(
                "analysis.rest_threshold must be below analysis.completion_threshold".to_string(),
            ));
        }
        Ok(())
    }
}
