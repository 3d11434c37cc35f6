//! Calibration estimation and pose normalization.
//!
//! A profile maps camera coordinates into a body frame centred on the
//! shoulder/hip centroid and scaled by torso length, so that body size and
//! camera distance drop out of every later comparison.

use serde::{Deserialize, Serialize};

use crate::config::{CalibrationConfig, EngineConfig, ValidationConfig};
use crate::error::{EngineError, Result};
use crate::features::{extract_measurements, measure_bones, BoneLengths};
use crate::geometry::Vec3;
use crate::types::PoseFrame;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationProfile {
    /// Torso length of the base pose, in camera units.
    pub scale_factor: f32,
    /// Body centre of the base pose, in camera units.
    pub center_offset: Vec3,
    pub quality_score: f32,
    pub valid: bool,
    /// User bone lengths in torso units. Zeroed pairs were not visible.
    pub bone_lengths: BoneLengths,
    pub timestamp_ms: u64,
}

impl CalibrationProfile {
    pub fn normalize_point(&self, p: Vec3) -> Vec3 {
        (p - self.center_offset) / self.scale_factor
    }

    pub fn denormalize_point(&self, p: Vec3) -> Vec3 {
        p * self.scale_factor + self.center_offset
    }

    /// `position' = (position - center_offset) / scale_factor` for every joint.
    pub fn normalize(&self, raw: &PoseFrame) -> PoseFrame {
        raw.map_positions(|p| self.normalize_point(p))
    }

    /// Maps a normalized pose back into camera coordinates.
    pub fn denormalize(&self, normalized: &PoseFrame) -> PoseFrame {
        normalized.map_positions(|p| self.denormalize_point(p))
    }

    /// Whether this profile may serve as the active calibration.
    pub fn validate(&self, config: &CalibrationConfig) -> bool {
        self.valid
            && self.scale_factor.is_finite()
            && self.scale_factor > 0.0
            && self.center_offset.is_finite()
            && self.center_offset.max_abs() <= config.max_center_offset
            && (0.0..=1.0).contains(&self.quality_score)
            && self.quality_score >= config.min_quality
    }
}

/// Pose validity gate: non-zero timestamp, finite in-range coordinates,
/// confidences in `[0, 1]` and enough mean confidence.
pub fn check_pose(frame: &PoseFrame, config: &ValidationConfig) -> Result<()> {
    if frame.timestamp_ms == 0 {
        return Err(EngineError::InvalidPose("timestamp is zero".to_string()));
    }
    for (i, lm) in frame.landmarks.iter().enumerate() {
        if !lm.position.is_finite() || lm.position.max_abs() > config.max_abs_coordinate {
            return Err(EngineError::InvalidPose(format!("joint {} position out of range", i)));
        }
        if !(0.0..=1.0).contains(&lm.confidence) {
            return Err(EngineError::InvalidPose(format!(
                "joint {} confidence {} outside [0, 1]",
                i, lm.confidence
            )));
        }
    }
    let mean = frame.mean_confidence();
    if mean < config.min_mean_confidence {
        return Err(EngineError::InvalidPose(format!(
            "mean confidence {:.2} below {:.2}",
            mean, config.min_mean_confidence
        )));
    }
    Ok(())
}

/// Derives a profile from a neutral base pose.
///
/// The returned profile may carry `valid == false` when its quality is below
/// `min_quality`; callers decide whether to accept it.
pub fn estimate(base: &PoseFrame, config: &EngineConfig) -> Result<CalibrationProfile> {
    check_pose(base, &config.validation)?;
    let cfg = &config.calibration;
    let m = extract_measurements(base);

    if m.anchor_confidence < cfg.min_anchor_confidence {
        return Err(EngineError::CalibrationFailed(format!(
            "shoulders and hips not visible (confidence {:.2})",
            m.anchor_confidence
        )));
    }
    if !(m.torso_length.is_finite() && m.torso_length >= cfg.min_body_length) {
        return Err(EngineError::CalibrationFailed(format!(
            "degenerate torso length {}",
            m.torso_length
        )));
    }
    if m.body_center.max_abs() > cfg.max_center_offset {
        return Err(EngineError::CalibrationFailed("body centre out of range".to_string()));
    }

    let bone_lengths = measure_bones(base, cfg.joint_confidence_threshold).scaled(1.0 / m.torso_length);

    // Quality
    let mut quality = 1.0f32;
    let low_confidence = base
        .landmarks
        .iter()
        .filter(|lm| lm.confidence < cfg.joint_confidence_threshold)
        .count();
    quality -= low_confidence as f32 * cfg.low_confidence_penalty;

    let tilt = m.shoulder_tilt.max(m.hip_tilt) / m.torso_length;
    if tilt > cfg.symmetry_tolerance {
        log::debug!("calibration pose tilted by {:.2} torso lengths", tilt);
        quality -= cfg.asymmetry_penalty;
    }

    for (name, pair) in bone_lengths.pairs() {
        if !pair.is_known() {
            log::debug!("{} not visible on both sides, skipping symmetry check", name);
            continue;
        }
        if pair.asymmetry() > cfg.bone_ratio_tolerance {
            log::debug!("{} lengths differ by {:.0}%", name, pair.asymmetry() * 100.0);
            quality -= cfg.bone_asymmetry_penalty;
        }
    }
    let quality_score = quality.clamp(0.0, 1.0);

    Ok(CalibrationProfile {
        scale_factor: m.torso_length,
        center_offset: m.body_center,
        quality_score,
        valid: quality_score >= cfg.min_quality,
        bone_lengths,
        timestamp_ms: base.timestamp_ms,
    })
}
