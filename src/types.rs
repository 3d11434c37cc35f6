//! Core data types shared by every stage of the engine.
//!
//! A pose always carries exactly [`JOINT_COUNT`] landmarks in the fixed
//! joint order of the upstream detector. Missing joints are present with a
//! zero position and low confidence, never omitted.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::geometry::Vec3;
use crate::session::MovementPhase;

/// Number of tracked landmarks per pose.
pub const JOINT_COUNT: usize = 13;

/// Tracked anatomical landmark. The discriminant is the wire index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Joint {
    Nose = 0,
    LeftShoulder = 1,
    RightShoulder = 2,
    LeftElbow = 3,
    RightElbow = 4,
    LeftWrist = 5,
    RightWrist = 6,
    LeftHip = 7,
    RightHip = 8,
    LeftKnee = 9,
    RightKnee = 10,
    LeftAnkle = 11,
    RightAnkle = 12,
}

impl Joint {
    /// All joints in wire order.
    pub const ALL: [Joint; JOINT_COUNT] = [
        Joint::Nose,
        Joint::LeftShoulder,
        Joint::RightShoulder,
        Joint::LeftElbow,
        Joint::RightElbow,
        Joint::LeftWrist,
        Joint::RightWrist,
        Joint::LeftHip,
        Joint::RightHip,
        Joint::LeftKnee,
        Joint::RightKnee,
        Joint::LeftAnkle,
        Joint::RightAnkle,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Joint> {
        Self::ALL.get(index).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            Joint::Nose => "nose",
            Joint::LeftShoulder => "left_shoulder",
            Joint::RightShoulder => "right_shoulder",
            Joint::LeftElbow => "left_elbow",
            Joint::RightElbow => "right_elbow",
            Joint::LeftWrist => "left_wrist",
            Joint::RightWrist => "right_wrist",
            Joint::LeftHip => "left_hip",
            Joint::RightHip => "right_hip",
            Joint::LeftKnee => "left_knee",
            Joint::RightKnee => "right_knee",
            Joint::LeftAnkle => "left_ankle",
            Joint::RightAnkle => "right_ankle",
        }
    }
}

/// Compact set of joints, one bit per wire index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JointSet(u16);

impl JointSet {
    pub const fn empty() -> Self {
        JointSet(0)
    }

    pub fn all() -> Self {
        JointSet((1u16 << JOINT_COUNT) - 1)
    }

    /// Builds a set from wire indices. Returns the first out-of-range index on failure.
    pub fn try_from_indices(indices: &[usize]) -> Result<Self, usize> {
        let mut set = JointSet::empty();
        for &idx in indices {
            let joint = Joint::from_index(idx).ok_or(idx)?;
            set.insert(joint);
        }
        Ok(set)
    }

    pub fn insert(&mut self, joint: Joint) {
        self.0 |= 1 << joint.index();
    }

    pub fn contains(&self, joint: Joint) -> bool {
        self.0 & (1 << joint.index()) != 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Joint> + '_ {
        Joint::ALL.iter().copied().filter(move |j| self.contains(*j))
    }
}

/// One detected landmark: position plus detector confidence in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PoseLandmark {
    pub position: Vec3,
    pub confidence: f32,
}

impl PoseLandmark {
    pub const fn new(position: Vec3, confidence: f32) -> Self {
        Self { position, confidence }
    }
}

/// A full-body pose at one instant.
///
/// The fixed array makes the 13-joint arity a type-level guarantee; variable
/// length input is checked once in [`PoseFrame::from_slice`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseFrame {
    pub landmarks: [PoseLandmark; JOINT_COUNT],
    /// Capture time in milliseconds since epoch. Zero marks an unset timestamp.
    pub timestamp_ms: u64,
}

impl PoseFrame {
    pub fn new(landmarks: [PoseLandmark; JOINT_COUNT], timestamp_ms: u64) -> Self {
        Self { landmarks, timestamp_ms }
    }

    /// Checks arity at the ingress boundary.
    pub fn from_slice(landmarks: &[PoseLandmark], timestamp_ms: u64) -> Result<Self, EngineError> {
        let landmarks: [PoseLandmark; JOINT_COUNT] = landmarks.try_into().map_err(|_| {
            EngineError::InvalidParameter(format!(
                "expected {} landmarks, got {}",
                JOINT_COUNT,
                landmarks.len()
            ))
        })?;
        Ok(Self { landmarks, timestamp_ms })
    }

    /// Builds a frame from `(x, y, z, confidence)` tuples as handed over by detectors.
    pub fn from_tuples(points: &[(f32, f32, f32, f32)], timestamp_ms: u64) -> Result<Self, EngineError> {
        let landmarks: Vec<PoseLandmark> = points
            .iter()
            .map(|&(x, y, z, c)| PoseLandmark::new(Vec3::new(x, y, z), c))
            .collect();
        Self::from_slice(&landmarks, timestamp_ms)
    }

    pub fn landmark(&self, joint: Joint) -> &PoseLandmark {
        &self.landmarks[joint.index()]
    }

    pub fn position(&self, joint: Joint) -> Vec3 {
        self.landmarks[joint.index()].position
    }

    pub fn confidence(&self, joint: Joint) -> f32 {
        self.landmarks[joint.index()].confidence
    }

    pub fn mean_confidence(&self) -> f32 {
        self.landmarks.iter().map(|l| l.confidence).sum::<f32>() / JOINT_COUNT as f32
    }

    /// Applies `f` to every position, keeping confidences and timestamp.
    pub fn map_positions<F: Fn(Vec3) -> Vec3>(&self, f: F) -> PoseFrame {
        let mut out = self.clone();
        for lm in out.landmarks.iter_mut() {
            lm.position = f(lm.position);
        }
        out
    }

    /// Position-wise interpolation between two poses. Confidence takes the
    /// lower of the two endpoints.
    pub fn interpolate(&self, other: &PoseFrame, t: f32, timestamp_ms: u64) -> PoseFrame {
        let mut landmarks = self.landmarks;
        for (lm, end) in landmarks.iter_mut().zip(other.landmarks.iter()) {
            lm.position = lm.position.lerp(end.position, t);
            lm.confidence = lm.confidence.min(end.confidence);
        }
        PoseFrame { landmarks, timestamp_ms }
    }
}

/// Per-frame evaluation output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Position along the segment in `[0, 1]`.
    pub progress: f32,
    /// `progress >= completion_threshold` for this frame alone.
    pub completed: bool,
    /// Form closeness to the reference at `progress`, in `[0, 1]`.
    pub similarity: f32,
    /// Reference minus observed position per joint, in normalized body units.
    /// Zero for joints outside the care set.
    pub corrections: [Vec3; JOINT_COUNT],
    pub timestamp_ms: u64,
    pub phase: MovementPhase,
    /// Repetitions counted since the segment was created or reset.
    pub repetitions: u32,
}
