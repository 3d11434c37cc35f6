//! Workout library files: named, normalized keyposes stored as JSON.
//!
//! ```json
//! { "workout_name": "squat", "version": "1.0",
//!   "poses": [ { "name": "stand", "timestamp": 1000,
//!                "landmarks": [ { "index": 0, "position": {"x":0,"y":0,"z":0}, "confidence": 0.9 }, ... ] } ] }
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{EngineError, Result};
use crate::geometry::Vec3;
use crate::types::{PoseFrame, PoseLandmark, JOINT_COUNT};

pub const WORKOUT_FORMAT_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedLandmark {
    pub index: usize,
    pub position: Vec3,
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedPose {
    pub name: String,
    pub timestamp: u64,
    pub landmarks: Vec<RecordedLandmark>,
}

impl RecordedPose {
    pub fn from_frame(name: &str, frame: &PoseFrame) -> Self {
        RecordedPose {
            name: name.to_string(),
            timestamp: frame.timestamp_ms,
            landmarks: frame
                .landmarks
                .iter()
                .enumerate()
                .map(|(index, lm)| RecordedLandmark {
                    index,
                    position: lm.position,
                    confidence: lm.confidence,
                })
                .collect(),
        }
    }

    /// Checks arity and joint order, then converts to a frame.
    pub fn to_frame(&self) -> Result<PoseFrame> {
        if self.landmarks.len() != JOINT_COUNT {
            return Err(EngineError::InvalidParameter(format!(
                "pose '{}' has {} landmarks, expected {}",
                self.name,
                self.landmarks.len(),
                JOINT_COUNT
            )));
        }
        let mut landmarks = [PoseLandmark::default(); JOINT_COUNT];
        for (slot, (expected, lm)) in landmarks.iter_mut().zip(self.landmarks.iter().enumerate()) {
            if lm.index != expected {
                return Err(EngineError::InvalidParameter(format!(
                    "pose '{}' landmark {} has index {}",
                    self.name, expected, lm.index
                )));
            }
            *slot = PoseLandmark::new(lm.position, lm.confidence);
        }
        Ok(PoseFrame::new(landmarks, self.timestamp))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutFile {
    pub workout_name: String,
    pub version: String,
    pub poses: Vec<RecordedPose>,
}

/// Collects normalized keyposes until they are written out.
#[derive(Debug, Default)]
pub struct WorkoutRecorder {
    poses: Vec<RecordedPose>,
}

impl WorkoutRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: &str, normalized: &PoseFrame) {
        self.poses.push(RecordedPose::from_frame(name, normalized));
    }

    pub fn len(&self) -> usize {
        self.poses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }

    /// Writes the workout next to `path` and renames it into place.
    /// The recorder is emptied only once the file is in place.
    pub fn save(&mut self, workout_name: &str, path: &Path) -> Result<WorkoutFile> {
        if self.poses.is_empty() {
            return Err(EngineError::InvalidParameter("no poses recorded".to_string()));
        }
        let file = WorkoutFile {
            workout_name: workout_name.to_string(),
            version: WORKOUT_FORMAT_VERSION.to_string(),
            poses: self.poses.clone(),
        };

        let json = serde_json::to_string_pretty(&file)?;
        write_atomically(path, json.as_bytes())?;

        log::info!("saved workout '{}' with {} poses to {}", workout_name, file.poses.len(), path.display());
        self.poses.clear();
        Ok(file)
    }
}

/// Writes `contents` to a sibling temp file, then renames it over `path`.
/// The temp file is removed on any failure after it was created.
fn write_atomically(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let tmp_path = temp_path(path);
    let mut out = fs::File::create(&tmp_path)?;
    let result = (|| {
        out.write_all(contents)?;
        out.sync_all()?;
        drop(out);
        fs::rename(&tmp_path, path)
    })();
    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// A loaded workout with every pose already converted to a frame.
#[derive(Debug, Clone)]
pub struct WorkoutLibrary {
    pub name: String,
    poses: Vec<(String, PoseFrame)>,
}

impl WorkoutLibrary {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let file: WorkoutFile = serde_json::from_str(&content)?;
        Self::from_file(file)
    }

    pub fn from_file(file: WorkoutFile) -> Result<Self> {
        if file.poses.is_empty() {
            return Err(EngineError::InvalidParameter(format!(
                "workout '{}' contains no poses",
                file.workout_name
            )));
        }
        let poses = file
            .poses
            .iter()
            .map(|p| Ok((p.name.clone(), p.to_frame()?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(WorkoutLibrary { name: file.workout_name, poses })
    }

    pub fn len(&self) -> usize {
        self.poses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }

    pub fn pose(&self, index: usize) -> Option<&PoseFrame> {
        self.poses.get(index).map(|(_, frame)| frame)
    }

    pub fn pose_name(&self, index: usize) -> Option<&str> {
        self.poses.get(index).map(|(name, _)| name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::tempdir;

    fn frame(v: f32, ts: u64) -> PoseFrame {
        let mut landmarks = [PoseLandmark::default(); JOINT_COUNT];
        for (i, lm) in landmarks.iter_mut().enumerate() {
            *lm = PoseLandmark::new(Vec3::new(v, i as f32, 0.0), 0.8);
        }
        PoseFrame::new(landmarks, ts)
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("squat.json");
        let mut recorder = WorkoutRecorder::new();
        recorder.push("stand", &frame(0.0, 1));
        recorder.push("bottom", &frame(1.0, 2));
        recorder.save("squat", &path).unwrap();
        assert!(recorder.is_empty());
        assert!(!dir.path().join("squat.json.tmp").exists());

        let library = WorkoutLibrary::load(&path).unwrap();
        assert_eq!(library.name, "squat");
        assert_eq!(library.len(), 2);
        assert_eq!(library.pose_name(1), Some("bottom"));
        assert_eq!(library.pose(1), Some(&frame(1.0, 2)));
        assert!(library.pose(2).is_none());
    }

    #[test]
    fn test_json_layout() {
        let pose = RecordedPose::from_frame("stand", &frame(0.5, 7));
        let value = serde_json::to_value(&pose).unwrap();
        assert_eq!(value["timestamp"], 7);
        assert_eq!(value["landmarks"][3]["index"], 3);
        assert_eq!(value["landmarks"][3]["position"]["y"], 3.0);
    }

    #[test]
    fn test_empty_recorder_is_rejected() {
        let dir = tempdir().unwrap();
        let err = WorkoutRecorder::new().save("x", &dir.path().join("x.json")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    }

    #[test]
    fn test_failed_save_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        // A directory at the target path makes the final rename fail.
        let path = dir.path().join("taken");
        fs::create_dir(&path).unwrap();

        let mut recorder = WorkoutRecorder::new();
        recorder.push("stand", &frame(0.0, 1));
        let err = recorder.save("w", &path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
        assert!(!dir.path().join("taken.tmp").exists());
        assert_eq!(recorder.len(), 1);
        assert!(path.is_dir());
    }

    #[test]
    fn test_malformed_pose_rejected() {
        let mut pose = RecordedPose::from_frame("stand", &frame(0.0, 1));
        pose.landmarks.swap(0, 1);
        assert_eq!(pose.to_frame().unwrap_err().kind(), ErrorKind::InvalidParameter);

        pose.landmarks.pop();
        assert!(pose.to_frame().is_err());
    }

    #[test]
    fn test_garbage_file_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(WorkoutLibrary::load(&path).unwrap_err().kind(), ErrorKind::InvalidParameter);
    }
}
