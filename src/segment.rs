use serde::{Deserialize, Serialize};

use crate::calibration::{check_pose, CalibrationProfile};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::geometry::Vec3;
use crate::types::{Joint, JointSet, PoseFrame};

/// Straight-line path of one care joint from its start to its end position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointTrajectory {
    pub joint: Joint,
    pub start: Vec3,
    pub end: Vec3,
    /// Shorter than `min_trajectory_length`; does not drive progress.
    pub is_static: bool,
}

impl JointTrajectory {
    pub fn new(joint: Joint, start: Vec3, end: Vec3, min_length: f32) -> Self {
        Self {
            joint,
            start,
            end,
            is_static: start.distance(end) < min_length,
        }
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.start.lerp(self.end, t)
    }

    /// Parameter in `[0, 1]` of the point on the path closest to `p`.
    pub fn project(&self, p: Vec3) -> f32 {
        let d = self.end - self.start;
        let len_sq = d.length_squared();
        if len_sq <= f32::EPSILON {
            return 0.0;
        }
        ((p - self.start).dot(d) / len_sq).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceTrajectory {
    pub paths: Vec<JointTrajectory>,
}

impl ReferenceTrajectory {
    pub fn get(&self, joint: Joint) -> Option<&JointTrajectory> {
        self.paths.iter().find(|p| p.joint == joint)
    }

    pub fn moving(&self) -> impl Iterator<Item = &JointTrajectory> {
        self.paths.iter().filter(|p| !p.is_static)
    }
}

/// A movement from a start keypose to an end keypose, in normalized body space.
/// Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct ExerciseSegment {
    start_pose: PoseFrame,
    end_pose: PoseFrame,
    care_joints: JointSet,
    trajectory: ReferenceTrajectory,
}

fn creation_failed(err: EngineError) -> EngineError {
    match err {
        EngineError::InvalidPose(msg) => EngineError::SegmentCreationFailed(format!("invalid keypose: {}", msg)),
        other => other,
    }
}

impl ExerciseSegment {
    /// Builds a segment from raw keyposes, normalizing both with `calibration`.
    pub fn create(
        start: &PoseFrame,
        end: &PoseFrame,
        care_joints: &[usize],
        calibration: &CalibrationProfile,
        config: &EngineConfig,
    ) -> Result<Self> {
        let care = Self::care_set(care_joints)?;
        check_pose(start, &config.validation).map_err(creation_failed)?;
        check_pose(end, &config.validation).map_err(creation_failed)?;
        Self::build(calibration.normalize(start), calibration.normalize(end), care, config)
    }

    /// Builds a segment from keyposes that are already in normalized body space.
    pub fn from_normalized(
        start_pose: PoseFrame,
        end_pose: PoseFrame,
        care_joints: JointSet,
        config: &EngineConfig,
    ) -> Result<Self> {
        if care_joints.is_empty() {
            return Err(EngineError::SegmentCreationFailed("care joint set is empty".to_string()));
        }
        check_pose(&start_pose, &config.validation).map_err(creation_failed)?;
        check_pose(&end_pose, &config.validation).map_err(creation_failed)?;
        Self::build(start_pose, end_pose, care_joints, config)
    }

    fn build(
        start_pose: PoseFrame,
        end_pose: PoseFrame,
        care_joints: JointSet,
        config: &EngineConfig,
    ) -> Result<Self> {
        let min_length = config.analysis.min_trajectory_length;
        let paths: Vec<JointTrajectory> = care_joints
            .iter()
            .map(|j| JointTrajectory::new(j, start_pose.position(j), end_pose.position(j), min_length))
            .collect();

        if paths.iter().all(|p| p.is_static) {
            return Err(EngineError::SegmentCreationFailed(
                "no care joint moves between the keyposes".to_string(),
            ));
        }
        for p in paths.iter().filter(|p| p.is_static) {
            log::debug!("care joint {} is static in this segment", p.joint.name());
        }

        Ok(Self {
            start_pose,
            end_pose,
            care_joints,
            trajectory: ReferenceTrajectory { paths },
        })
    }

    pub fn care_set(indices: &[usize]) -> Result<JointSet> {
        let care = JointSet::try_from_indices(indices).map_err(|idx| {
            EngineError::SegmentCreationFailed(format!("joint index {} out of range", idx))
        })?;
        if care.is_empty() {
            return Err(EngineError::SegmentCreationFailed("care joint set is empty".to_string()));
        }
        Ok(care)
    }

    pub fn start_pose(&self) -> &PoseFrame {
        &self.start_pose
    }

    pub fn end_pose(&self) -> &PoseFrame {
        &self.end_pose
    }

    pub fn care_joints(&self) -> JointSet {
        self.care_joints
    }

    pub fn trajectory(&self) -> &ReferenceTrajectory {
        &self.trajectory
    }

    /// Expected normalized position of `joint` at progress `t`.
    pub fn reference_position(&self, joint: Joint, t: f32) -> Vec3 {
        self.start_pose.position(joint).lerp(self.end_pose.position(joint), t)
    }

    /// Whole-body reference pose at progress `t`, in normalized space.
    pub fn reference_pose(&self, t: f32, timestamp_ms: u64) -> PoseFrame {
        self.start_pose.interpolate(&self.end_pose, t, timestamp_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::types::{PoseLandmark, JOINT_COUNT};
    use approx::assert_abs_diff_eq;

    fn pose_with(knee_y: f32) -> PoseFrame {
        let mut landmarks = [PoseLandmark::new(Vec3::ZERO, 0.9); JOINT_COUNT];
        for (i, lm) in landmarks.iter_mut().enumerate() {
            lm.position = Vec3::new(i as f32 * 0.1, 0.0, 0.0);
        }
        landmarks[Joint::LeftKnee.index()].position.y = knee_y;
        landmarks[Joint::RightKnee.index()].position.y = knee_y;
        PoseFrame::new(landmarks, 10)
    }

    #[test]
    fn test_projection_clamps() {
        let path = JointTrajectory::new(Joint::LeftKnee, Vec3::ZERO, Vec3::new(0.0, 1.0, 0.0), 0.01);
        assert_abs_diff_eq!(path.project(Vec3::new(0.3, 0.25, 0.0)), 0.25, epsilon = 1e-6);
        assert_eq!(path.project(Vec3::new(0.0, -2.0, 0.0)), 0.0);
        assert_eq!(path.project(Vec3::new(0.0, 3.0, 0.0)), 1.0);
        assert_eq!(path.at(0.5), Vec3::new(0.0, 0.5, 0.0));
    }

    #[test]
    fn test_from_normalized_marks_static_joints() {
        let config = EngineConfig::default();
        let care = JointSet::try_from_indices(&[7, 9, 10]).unwrap();
        let segment = ExerciseSegment::from_normalized(pose_with(0.0), pose_with(0.5), care, &config).unwrap();
        let traj = segment.trajectory();
        assert_eq!(traj.paths.len(), 3);
        assert!(traj.get(Joint::LeftHip).unwrap().is_static);
        assert!(!traj.get(Joint::LeftKnee).unwrap().is_static);
        assert_eq!(traj.moving().count(), 2);
        assert_eq!(segment.reference_position(Joint::RightKnee, 0.5).y, 0.25);
    }

    #[test]
    fn test_rejects_bad_care_sets() {
        assert_eq!(ExerciseSegment::care_set(&[]).unwrap_err().kind(), ErrorKind::SegmentCreationFailed);
        assert_eq!(ExerciseSegment::care_set(&[0, 13]).unwrap_err().kind(), ErrorKind::SegmentCreationFailed);
        assert_eq!(ExerciseSegment::care_set(&[0, 12]).unwrap().len(), 2);
    }

    #[test]
    fn test_rejects_motionless_segment() {
        let config = EngineConfig::default();
        let care = JointSet::try_from_indices(&[9, 10]).unwrap();
        let err = ExerciseSegment::from_normalized(pose_with(0.2), pose_with(0.2), care, &config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SegmentCreationFailed);
    }

    #[test]
    fn test_rejects_invalid_keypose() {
        let config = EngineConfig::default();
        let care = JointSet::try_from_indices(&[9]).unwrap();
        let mut bad = pose_with(0.5);
        bad.timestamp_ms = 0;
        let err = ExerciseSegment::from_normalized(pose_with(0.0), bad, care, &config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SegmentCreationFailed);
    }
}
