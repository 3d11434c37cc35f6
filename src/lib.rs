//! Exercise segment analysis.
//!
//! Tracks one repetition-based movement from a stream of 13-joint poses:
//! calibrate on a neutral pose, define a segment from start and end
//! keyposes plus the joints that matter, then evaluate each frame for
//! progress, completion, similarity and per-joint corrections.
//!
//! ```no_run
//! use exercise_segment::{PoseFrame, SegmentEngine};
//!
//! # fn run(neutral: PoseFrame, start: PoseFrame, end: PoseFrame, frame: PoseFrame) -> exercise_segment::Result<()> {
//! let mut engine = SegmentEngine::default();
//! engine.initialize()?;
//! engine.calibrate(&neutral)?;
//! engine.create_segment(&start, &end, &[7, 8, 9, 10])?;
//! let result = engine.analyze(&frame)?;
//! println!("progress {:.2} similarity {:.2}", result.progress, result.similarity);
//! # Ok(())
//! # }
//! ```

pub mod calibration;
pub mod config;
pub mod engine;
pub mod error;
pub mod features;
pub mod geometry;
pub mod pose;
pub mod segment;
pub mod session;
pub mod types;
pub mod workout;

#[cfg(feature = "python")]
mod python;

pub use calibration::CalibrationProfile;
pub use config::{AnalysisConfig, CalibrationConfig, ConfigError, EngineConfig, ValidationConfig};
pub use engine::{EngineState, SegmentEngine};
pub use error::{EngineError, ErrorKind, Result};
pub use geometry::Vec3;
pub use segment::ExerciseSegment;
pub use session::{MovementPhase, SessionMetrics};
pub use types::{AnalysisResult, Joint, JointSet, PoseFrame, PoseLandmark, JOINT_COUNT};
