//! Session state machine for exercise segment analysis.
//!
//! A [`SegmentEngine`] owns at most one active calibration and one active
//! segment and sequences the lifecycle
//! `Uninitialized -> Initialized -> Calibrated -> SegmentReady`.
//!
//! # Concurrency
//! Every state-changing operation takes `&mut self`, so calls on one engine
//! are serialized by the borrow checker. Share an engine across threads only
//! behind a `Mutex`. Separate engines share no state and may run in parallel.

use std::path::Path;

use crate::calibration::{self, check_pose, CalibrationProfile};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::pose::{check_frame, pose_similarity, FrameEvaluator};
use crate::segment::ExerciseSegment;
use crate::session::{AnalysisSession, SessionMetrics};
use crate::types::{AnalysisResult, PoseFrame};
use crate::workout::{WorkoutLibrary, WorkoutRecorder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    Initialized,
    Calibrated,
    SegmentReady,
}

#[derive(Debug)]
pub struct SegmentEngine {
    config: EngineConfig,
    initialized: bool,
    calibration: Option<CalibrationProfile>,
    segment: Option<ExerciseSegment>,
    session: AnalysisSession,
    recorder: WorkoutRecorder,
    library: Option<WorkoutLibrary>,
}

impl Default for SegmentEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl SegmentEngine {
    pub fn new(config: EngineConfig) -> Self {
        SegmentEngine {
            config,
            initialized: false,
            calibration: None,
            segment: None,
            session: AnalysisSession::new(),
            recorder: WorkoutRecorder::new(),
            library: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> EngineState {
        match (self.initialized, &self.calibration, &self.segment) {
            (false, _, _) => EngineState::Uninitialized,
            (true, None, _) => EngineState::Initialized,
            (true, Some(_), None) => EngineState::Calibrated,
            (true, Some(_), Some(_)) => EngineState::SegmentReady,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Calling this on an initialized engine is a no-op.
    pub fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            log::debug!("initialize() called on an initialized engine");
            return Ok(());
        }
        self.initialized = true;
        log::info!("segment engine initialized");
        Ok(())
    }

    /// Discards calibration, segment, session, recorded poses and any loaded
    /// workout. Safe to call in any state, any number of times.
    pub fn cleanup(&mut self) {
        if self.initialized {
            log::info!("segment engine cleaned up");
        }
        self.initialized = false;
        self.calibration = None;
        self.segment = None;
        self.session.reset();
        self.recorder = WorkoutRecorder::new();
        self.library = None;
    }

    fn require_initialized(&self) -> Result<()> {
        if !self.initialized {
            return Err(EngineError::NotInitialized("initialize() has not been called"));
        }
        Ok(())
    }

    fn require_calibration(&self) -> Result<&CalibrationProfile> {
        self.require_initialized()?;
        self.calibration
            .as_ref()
            .ok_or(EngineError::NotInitialized("no active calibration"))
    }

    /// Estimates a calibration from a neutral pose and makes it active.
    ///
    /// Any active segment is discarded since it was built against the previous
    /// calibration. On failure nothing changes.
    pub fn calibrate(&mut self, base: &PoseFrame) -> Result<CalibrationProfile> {
        self.require_initialized()?;
        let profile = calibration::estimate(base, &self.config)?;
        if !self.validate_calibration(&profile) {
            log::warn!(
                "calibration rejected: quality {:.2} below {:.2}",
                profile.quality_score,
                self.config.calibration.min_quality
            );
            return Err(EngineError::CalibrationFailed(format!(
                "quality {:.2} below {:.2}",
                profile.quality_score, self.config.calibration.min_quality
            )));
        }

        if self.segment.take().is_some() {
            log::info!("recalibration discarded the active segment");
        }
        self.session.reset();
        log::info!(
            "calibrated: scale {:.1}, quality {:.2}",
            profile.scale_factor,
            profile.quality_score
        );
        self.calibration = Some(profile.clone());
        Ok(profile)
    }

    pub fn validate_calibration(&self, profile: &CalibrationProfile) -> bool {
        profile.validate(&self.config.calibration)
    }

    pub fn active_calibration(&self) -> Option<&CalibrationProfile> {
        self.calibration.as_ref()
    }

    /// Maps a raw pose into the active calibration's body frame.
    pub fn normalize(&self, raw: &PoseFrame) -> Result<PoseFrame> {
        Ok(self.require_calibration()?.normalize(raw))
    }

    pub fn create_segment(&mut self, start: &PoseFrame, end: &PoseFrame, care_joints: &[usize]) -> Result<()> {
        let calibration = self.require_calibration()?;
        let segment = ExerciseSegment::create(start, end, care_joints, calibration, &self.config)?;
        self.install_segment(segment);
        Ok(())
    }

    fn install_segment(&mut self, segment: ExerciseSegment) {
        log::info!(
            "segment created with {} care joints ({} moving)",
            segment.care_joints().len(),
            segment.trajectory().moving().count()
        );
        self.segment = Some(segment);
        self.session.reset();
    }

    pub fn active_segment(&self) -> Option<&ExerciseSegment> {
        self.segment.as_ref()
    }

    pub fn analyze(&mut self, frame: &PoseFrame) -> Result<AnalysisResult> {
        self.require_calibration()?;
        let (calibration, segment) = match (&self.calibration, &self.segment) {
            (Some(c), Some(s)) => (c, s),
            _ => return Err(EngineError::SegmentNotCreated),
        };
        check_frame(frame)?;

        let normalized = calibration.normalize(frame);
        let eval = FrameEvaluator::new(segment, &self.config.analysis)
            .evaluate(&normalized, self.session.last_progress());
        if !eval.observed {
            log::debug!("no care joint visible at {}, holding progress", frame.timestamp_ms);
        }

        let (phase, repetitions) =
            self.session
                .record(eval.progress, eval.similarity, frame.timestamp_ms, &self.config.analysis);

        log::trace!(
            "frame {}: progress {:.3} similarity {:.3}",
            frame.timestamp_ms,
            eval.progress,
            eval.similarity
        );

        Ok(AnalysisResult {
            progress: eval.progress,
            completed: eval.completed,
            similarity: eval.similarity,
            corrections: eval.corrections,
            timestamp_ms: frame.timestamp_ms,
            phase,
            repetitions,
        })
    }

    /// Restarts the session while keeping the segment definition.
    pub fn reset_segment(&mut self) -> Result<()> {
        self.require_initialized()?;
        if self.segment.is_none() {
            return Err(EngineError::SegmentNotCreated);
        }
        self.session.reset();
        log::debug!("segment session reset");
        Ok(())
    }

    pub fn destroy_segment(&mut self) {
        if self.segment.take().is_some() {
            log::info!("segment destroyed");
        }
        self.session.reset();
    }

    /// Calibration-independent pose similarity in `[0, 1]`.
    pub fn calculate_similarity(&self, a: &PoseFrame, b: &PoseFrame) -> f32 {
        pose_similarity(a, b, &self.config)
    }

    pub fn validate_pose(&self, frame: &PoseFrame) -> bool {
        check_pose(frame, &self.config.validation).is_ok()
    }

    pub fn session_metrics(&self) -> SessionMetrics {
        self.session.metrics()
    }

    /// Reference pose at the current progress, in camera coordinates.
    pub fn target_pose(&self) -> Result<PoseFrame> {
        let calibration = self.require_calibration()?;
        let segment = self.segment.as_ref().ok_or(EngineError::SegmentNotCreated)?;
        let timestamp = self.session.last_timestamp().unwrap_or(0);
        let reference = segment.reference_pose(self.session.last_progress(), timestamp);
        Ok(calibration.denormalize(&reference))
    }

    /// Normalizes a valid pose with the active calibration and adds it to the
    /// workout being recorded. Returns the number of recorded poses.
    pub fn record_pose(&mut self, name: &str, frame: &PoseFrame) -> Result<usize> {
        let calibration = self.require_calibration()?;
        check_pose(frame, &self.config.validation)?;
        let normalized = calibration.normalize(frame);
        self.recorder.push(name, &normalized);
        log::debug!("recorded pose '{}'", name);
        Ok(self.recorder.len())
    }

    pub fn recorded_pose_count(&self) -> usize {
        self.recorder.len()
    }

    /// Writes recorded poses to `path` as a workout file and clears the recorder.
    pub fn finalize_workout<P: AsRef<Path>>(&mut self, workout_name: &str, path: P) -> Result<()> {
        self.require_initialized()?;
        self.recorder.save(workout_name, path.as_ref())?;
        Ok(())
    }

    /// Loads a workout file, replacing any previously loaded one. Returns its pose count.
    pub fn load_workout<P: AsRef<Path>>(&mut self, path: P) -> Result<usize> {
        self.require_initialized()?;
        let library = WorkoutLibrary::load(path.as_ref())?;
        log::info!("loaded workout '{}' with {} poses", library.name, library.len());
        let count = library.len();
        self.library = Some(library);
        Ok(count)
    }

    pub fn workout_pose_count(&self) -> usize {
        self.library.as_ref().map_or(0, |l| l.len())
    }

    /// Makes the segment between two loaded workout poses active.
    pub fn select_segment(&mut self, start_index: usize, end_index: usize, care_joints: &[usize]) -> Result<()> {
        self.require_calibration()?;
        let library = self
            .library
            .as_ref()
            .ok_or(EngineError::NotInitialized("no workout loaded"))?;
        if start_index > end_index {
            return Err(EngineError::InvalidParameter(format!(
                "start index {} after end index {}",
                start_index, end_index
            )));
        }
        let (start, end) = match (library.pose(start_index), library.pose(end_index)) {
            (Some(s), Some(e)) => (s.clone(), e.clone()),
            _ => {
                return Err(EngineError::InvalidParameter(format!(
                    "pose index out of range (workout has {} poses)",
                    library.len()
                )))
            }
        };
        let care = ExerciseSegment::care_set(care_joints)?;
        let segment = ExerciseSegment::from_normalized(start, end, care, &self.config)?;
        self.install_segment(segment);
        Ok(())
    }
}

impl Drop for SegmentEngine {
    fn drop(&mut self) {
        self.cleanup();
    }
}
