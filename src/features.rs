use serde::{Deserialize, Serialize};

use crate::geometry::Vec3;
use crate::types::{Joint, PoseFrame};

/// Joints whose centroid anchors the body frame.
pub const ANCHOR_JOINTS: [Joint; 4] = [
    Joint::LeftShoulder,
    Joint::RightShoulder,
    Joint::LeftHip,
    Joint::RightHip,
];

/// Left and right lengths of one limb bone.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BonePair {
    pub left: f32,
    pub right: f32,
}

impl BonePair {
    /// Relative left/right difference, 0 for a perfectly symmetric pair.
    pub fn asymmetry(&self) -> f32 {
        let longest = self.left.max(self.right);
        if longest <= f32::EPSILON {
            return 0.0;
        }
        (self.left - self.right).abs() / longest
    }

    /// False for a pair that could not be measured.
    pub fn is_known(&self) -> bool {
        self.left > 0.0 && self.right > 0.0
    }

    pub fn scaled(&self, factor: f32) -> BonePair {
        BonePair { left: self.left * factor, right: self.right * factor }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoneLengths {
    pub upper_arm: BonePair,
    pub forearm: BonePair,
    pub thigh: BonePair,
    pub shin: BonePair,
}

impl BoneLengths {
    pub fn pairs(&self) -> [(&'static str, BonePair); 4] {
        [
            ("upper_arm", self.upper_arm),
            ("forearm", self.forearm),
            ("thigh", self.thigh),
            ("shin", self.shin),
        ]
    }

    pub fn scaled(&self, factor: f32) -> BoneLengths {
        BoneLengths {
            upper_arm: self.upper_arm.scaled(factor),
            forearm: self.forearm.scaled(factor),
            thigh: self.thigh.scaled(factor),
            shin: self.shin.scaled(factor),
        }
    }
}

/// Geometric summary of one pose, in the pose's own coordinate units.
#[derive(Debug, Clone, PartialEq)]
pub struct BodyMeasurements {
    pub shoulder_center: Vec3,
    pub hip_center: Vec3,
    /// Centroid of both shoulders and both hips.
    pub body_center: Vec3,
    /// Shoulder midpoint to hip midpoint.
    pub torso_length: f32,
    /// Vertical offset between the two shoulders.
    pub shoulder_tilt: f32,
    /// Vertical offset between the two hips.
    pub hip_tilt: f32,
    /// Lowest confidence among the anchor joints.
    pub anchor_confidence: f32,
}

fn bone(frame: &PoseFrame, a: Joint, b: Joint) -> f32 {
    frame.position(a).distance(frame.position(b))
}

/// Measures `(parent, child)` on both sides. The pair stays zeroed (unknown)
/// unless all four endpoints reach `min_confidence`.
fn bone_pair(frame: &PoseFrame, left: (Joint, Joint), right: (Joint, Joint), min_confidence: f32) -> BonePair {
    let visible = [left.0, left.1, right.0, right.1]
        .iter()
        .all(|j| frame.confidence(*j) >= min_confidence);
    if !visible {
        return BonePair::default();
    }
    BonePair {
        left: bone(frame, left.0, left.1),
        right: bone(frame, right.0, right.1),
    }
}

/// Left/right limb bone lengths in the pose's own units. Pairs with an
/// endpoint below `min_confidence` are reported as unknown.
pub fn measure_bones(frame: &PoseFrame, min_confidence: f32) -> BoneLengths {
    BoneLengths {
        upper_arm: bone_pair(
            frame,
            (Joint::LeftShoulder, Joint::LeftElbow),
            (Joint::RightShoulder, Joint::RightElbow),
            min_confidence,
        ),
        forearm: bone_pair(
            frame,
            (Joint::LeftElbow, Joint::LeftWrist),
            (Joint::RightElbow, Joint::RightWrist),
            min_confidence,
        ),
        thigh: bone_pair(
            frame,
            (Joint::LeftHip, Joint::LeftKnee),
            (Joint::RightHip, Joint::RightKnee),
            min_confidence,
        ),
        shin: bone_pair(
            frame,
            (Joint::LeftKnee, Joint::LeftAnkle),
            (Joint::RightKnee, Joint::RightAnkle),
            min_confidence,
        ),
    }
}

pub fn extract_measurements(frame: &PoseFrame) -> BodyMeasurements {
    let ls = frame.position(Joint::LeftShoulder);
    let rs = frame.position(Joint::RightShoulder);
    let lh = frame.position(Joint::LeftHip);
    let rh = frame.position(Joint::RightHip);

    let shoulder_center = ls.midpoint(rs);
    let hip_center = lh.midpoint(rh);
    let body_center = calculate_centroid(&[ls, rs, lh, rh]);

    let anchor_confidence = calculate_min(
        &ANCHOR_JOINTS.iter().map(|j| frame.confidence(*j)).collect::<Vec<_>>(),
    );

    BodyMeasurements {
        shoulder_center,
        hip_center,
        body_center,
        torso_length: shoulder_center.distance(hip_center),
        shoulder_tilt: (ls.y - rs.y).abs(),
        hip_tilt: (lh.y - rh.y).abs(),
        anchor_confidence,
    }
}

/// Expresses a pose in its own body frame: origin at the body centre, unit
/// torso length. Returns `None` when the torso is shorter than `min_body_length`.
pub fn self_normalize(frame: &PoseFrame, min_body_length: f32) -> Option<PoseFrame> {
    let m = extract_measurements(frame);
    if !(m.torso_length.is_finite() && m.torso_length >= min_body_length) {
        return None;
    }
    Some(frame.map_positions(|p| (p - m.body_center) / m.torso_length))
}

pub fn calculate_centroid(points: &[Vec3]) -> Vec3 {
    if points.is_empty() {
        return Vec3::ZERO;
    }
    let sum = points.iter().fold(Vec3::ZERO, |acc, p| acc + *p);
    sum / points.len() as f32
}

pub fn calculate_min(values: &[f32]) -> f32 {
    values.iter().fold(f32::INFINITY, |a, &b| a.min(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PoseLandmark, JOINT_COUNT};
    use approx::assert_abs_diff_eq;

    fn standing() -> PoseFrame {
        let pts: [(f32, f32); JOINT_COUNT] = [
            (500.0, 300.0),
            (440.0, 400.0),
            (560.0, 400.0),
            (420.0, 520.0),
            (580.0, 520.0),
            (410.0, 630.0),
            (590.0, 630.0),
            (460.0, 650.0),
            (540.0, 650.0),
            (460.0, 800.0),
            (540.0, 800.0),
            (460.0, 950.0),
            (540.0, 950.0),
        ];
        let mut landmarks = [PoseLandmark::default(); JOINT_COUNT];
        for (lm, (x, y)) in landmarks.iter_mut().zip(pts.iter()) {
            *lm = PoseLandmark::new(Vec3::new(*x, *y, 0.0), 0.9);
        }
        PoseFrame::new(landmarks, 1)
    }

    #[test]
    fn test_measurements() {
        let m = extract_measurements(&standing());
        assert_eq!(m.shoulder_center, Vec3::new(500.0, 400.0, 0.0));
        assert_eq!(m.hip_center, Vec3::new(500.0, 650.0, 0.0));
        assert_eq!(m.body_center, Vec3::new(500.0, 525.0, 0.0));
        assert_abs_diff_eq!(m.torso_length, 250.0, epsilon = 1e-3);
        assert_eq!(m.shoulder_tilt, 0.0);
        assert_abs_diff_eq!(m.anchor_confidence, 0.9, epsilon = 1e-6);
    }

    #[test]
    fn test_measure_bones() {
        let bones = measure_bones(&standing(), 0.7);
        assert_abs_diff_eq!(bones.thigh.left, 150.0, epsilon = 1e-3);
        assert_abs_diff_eq!(bones.thigh.asymmetry(), 0.0, epsilon = 1e-6);
        assert!(bones.pairs().iter().all(|(_, pair)| pair.is_known()));
    }

    #[test]
    fn test_hidden_joint_leaves_bone_pairs_unknown() {
        let mut pose = standing();
        pose.landmarks[Joint::RightElbow.index()] = PoseLandmark::default();
        let bones = measure_bones(&pose, 0.7);
        assert_eq!(bones.upper_arm, BonePair::default());
        assert_eq!(bones.forearm, BonePair::default());
        assert!(!bones.forearm.is_known());
        assert!(bones.thigh.is_known());
        assert!(bones.shin.is_known());
    }

    #[test]
    fn test_bone_asymmetry() {
        let pair = BonePair { left: 100.0, right: 80.0 };
        assert_abs_diff_eq!(pair.asymmetry(), 0.2, epsilon = 1e-6);
        assert_eq!(BonePair::default().asymmetry(), 0.0);
    }

    #[test]
    fn test_self_normalize_is_scale_invariant() {
        let pose = standing();
        let bigger = pose.map_positions(|p| p * 2.0 + Vec3::new(30.0, -10.0, 5.0));
        let a = self_normalize(&pose, 1e-3).unwrap();
        let b = self_normalize(&bigger, 1e-3).unwrap();
        for (la, lb) in a.landmarks.iter().zip(b.landmarks.iter()) {
            assert_abs_diff_eq!(la.position.distance(lb.position), 0.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_self_normalize_degenerate() {
        let collapsed = PoseFrame::new([PoseLandmark::new(Vec3::new(1.0, 1.0, 0.0), 1.0); JOINT_COUNT], 1);
        assert!(self_normalize(&collapsed, 1e-3).is_none());
    }

    #[test]
    fn test_stats_helpers() {
        assert_eq!(calculate_min(&[3.0, 1.0, 2.0]), 1.0);
        assert_eq!(calculate_centroid(&[Vec3::ZERO, Vec3::new(2.0, 4.0, 0.0)]), Vec3::new(1.0, 2.0, 0.0));
        assert_eq!(calculate_centroid(&[]), Vec3::ZERO);
    }
}
