#![allow(dead_code)]

use exercise_segment::{PoseFrame, PoseLandmark, Vec3, JOINT_COUNT};

pub const STANDING: [(f32, f32); JOINT_COUNT] = [
    (500.0, 300.0), // nose
    (440.0, 400.0), // shoulders
    (560.0, 400.0),
    (420.0, 520.0), // elbows
    (580.0, 520.0),
    (410.0, 630.0), // wrists
    (590.0, 630.0),
    (460.0, 650.0), // hips
    (540.0, 650.0),
    (460.0, 800.0), // knees
    (540.0, 800.0),
    (460.0, 950.0), // ankles
    (540.0, 950.0),
];

pub const SQUAT_BOTTOM: [(f32, f32); JOINT_COUNT] = [
    (500.0, 450.0),
    (440.0, 550.0),
    (560.0, 550.0),
    (420.0, 650.0),
    (580.0, 650.0),
    (410.0, 760.0),
    (590.0, 760.0),
    (460.0, 780.0),
    (540.0, 780.0),
    (400.0, 820.0),
    (600.0, 820.0),
    (460.0, 950.0),
    (540.0, 950.0),
];

/// Hips and knees.
pub const SQUAT_CARE_JOINTS: [usize; 4] = [7, 8, 9, 10];

pub fn pose(points: &[(f32, f32); JOINT_COUNT], confidence: f32, timestamp_ms: u64) -> PoseFrame {
    let mut landmarks = [PoseLandmark::default(); JOINT_COUNT];
    for (lm, (x, y)) in landmarks.iter_mut().zip(points.iter()) {
        *lm = PoseLandmark::new(Vec3::new(*x, *y, 0.0), confidence);
    }
    PoseFrame::new(landmarks, timestamp_ms)
}

pub fn standing(timestamp_ms: u64) -> PoseFrame {
    pose(&STANDING, 0.95, timestamp_ms)
}

pub fn squat_bottom(timestamp_ms: u64) -> PoseFrame {
    pose(&SQUAT_BOTTOM, 0.95, timestamp_ms)
}

/// All-zero confidence, zero timestamp.
pub fn empty_pose() -> PoseFrame {
    PoseFrame::new([PoseLandmark::default(); JOINT_COUNT], 0)
}
