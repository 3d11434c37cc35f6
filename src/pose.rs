//! Frame evaluation against an exercise segment.

use crate::config::{AnalysisConfig, EngineConfig};
use crate::error::{EngineError, Result};
use crate::features::self_normalize;
use crate::geometry::Vec3;
use crate::segment::ExerciseSegment;
use crate::types::{PoseFrame, JOINT_COUNT};

/// Output of one evaluation, before session bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameEvaluation {
    pub progress: f32,
    pub completed: bool,
    pub similarity: f32,
    pub corrections: [Vec3; JOINT_COUNT],
    /// False when no care joint carried any weight and progress was held.
    pub observed: bool,
}

pub struct FrameEvaluator<'a> {
    segment: &'a ExerciseSegment,
    config: &'a AnalysisConfig,
}

/// Rejects structurally malformed frames. Low confidence alone is accepted.
pub fn check_frame(frame: &PoseFrame) -> Result<()> {
    for (i, lm) in frame.landmarks.iter().enumerate() {
        if !lm.position.is_finite() {
            return Err(EngineError::InvalidPose(format!("joint {} position is not finite", i)));
        }
        if !(0.0..=1.0).contains(&lm.confidence) {
            return Err(EngineError::InvalidPose(format!(
                "joint {} confidence {} outside [0, 1]",
                i, lm.confidence
            )));
        }
    }
    Ok(())
}

fn joint_weight(confidence: f32, config: &AnalysisConfig) -> f32 {
    if confidence < config.low_confidence_threshold {
        confidence * config.low_confidence_weight
    } else {
        confidence
    }
}

fn joint_similarity(distance: f32, scale: f32) -> f32 {
    (1.0 - distance / scale).clamp(0.0, 1.0)
}

impl<'a> FrameEvaluator<'a> {
    pub fn new(segment: &'a ExerciseSegment, config: &'a AnalysisConfig) -> Self {
        FrameEvaluator { segment, config }
    }

    /// Evaluates a normalized frame. `fallback_progress` is reported when no
    /// moving care joint is visible at all.
    pub fn evaluate(&self, frame: &PoseFrame, fallback_progress: f32) -> FrameEvaluation {
        let (progress, observed) = match self.estimate_progress(frame) {
            Some(p) => (p, true),
            None => (fallback_progress.clamp(0.0, 1.0), false),
        };
        let similarity = self.calculate_similarity(frame, progress);
        let corrections = self.calculate_corrections(frame, progress);

        FrameEvaluation {
            progress,
            completed: progress >= self.config.completion_threshold,
            similarity,
            corrections,
            observed,
        }
    }

    /// Confidence-weighted mean of each moving care joint's projection onto its path.
    fn estimate_progress(&self, frame: &PoseFrame) -> Option<f32> {
        let mut weighted_sum = 0.0f32;
        let mut weight_total = 0.0f32;

        for path in self.segment.trajectory().moving() {
            let lm = frame.landmark(path.joint);
            let w = joint_weight(lm.confidence, self.config);
            if lm.confidence < self.config.low_confidence_threshold {
                log::trace!("{} down-weighted (confidence {:.2})", path.joint.name(), lm.confidence);
            }
            weighted_sum += w * path.project(lm.position);
            weight_total += w;
        }

        if weight_total <= f32::EPSILON {
            return None;
        }
        Some((weighted_sum / weight_total).clamp(0.0, 1.0))
    }

    fn calculate_similarity(&self, frame: &PoseFrame, progress: f32) -> f32 {
        let scale = self.config.similarity_distance_scale;
        let mut weighted_sum = 0.0f32;
        let mut weight_total = 0.0f32;

        for path in &self.segment.trajectory().paths {
            let lm = frame.landmark(path.joint);
            let w = joint_weight(lm.confidence, self.config);
            let d = lm.position.distance(path.at(progress));
            weighted_sum += w * joint_similarity(d, scale);
            weight_total += w;
        }

        if weight_total <= f32::EPSILON {
            return 0.0;
        }
        (weighted_sum / weight_total).clamp(0.0, 1.0)
    }

    fn calculate_corrections(&self, frame: &PoseFrame, progress: f32) -> [Vec3; JOINT_COUNT] {
        let mut corrections = [Vec3::ZERO; JOINT_COUNT];
        for path in &self.segment.trajectory().paths {
            let lm = frame.landmark(path.joint);
            if lm.confidence >= self.config.correction_min_confidence {
                corrections[path.joint.index()] = path.at(progress) - lm.position;
            }
        }
        corrections
    }
}

/// Calibration-independent similarity of two raw poses in `[0, 1]`.
///
/// Each pose is expressed in its own body frame first. Returns 0 when either
/// pose is malformed or degenerate, or no joint is visible in both.
pub fn pose_similarity(a: &PoseFrame, b: &PoseFrame, config: &EngineConfig) -> f32 {
    if let Err(e) = check_frame(a).and_then(|_| check_frame(b)) {
        log::debug!("similarity of malformed pose: {}", e);
        return 0.0;
    }
    let min_length = config.calibration.min_body_length;
    let (na, nb) = match (self_normalize(a, min_length), self_normalize(b, min_length)) {
        (Some(na), Some(nb)) => (na, nb),
        _ => return 0.0,
    };

    let scale = config.analysis.similarity_distance_scale;
    let mut weighted_sum = 0.0f32;
    let mut weight_total = 0.0f32;
    for (la, lb) in na.landmarks.iter().zip(nb.landmarks.iter()) {
        let w = joint_weight(la.confidence.min(lb.confidence), &config.analysis);
        weighted_sum += w * joint_similarity(la.position.distance(lb.position), scale);
        weight_total += w;
    }

    if weight_total <= f32::EPSILON {
        return 0.0;
    }
    (weighted_sum / weight_total).clamp(0.0, 1.0)
}
