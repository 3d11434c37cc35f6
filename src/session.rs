use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::AnalysisConfig;

/// Where the user is within one repetition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MovementPhase {
    #[default]
    Rest,
    Advancing, // moving toward the end keypose
    Hold,      // at or past completion
    Returning, // moving back toward the start keypose
}

/// Summary of the frames analyzed since the segment was created or reset.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SessionMetrics {
    pub frames_analyzed: u64,
    pub repetitions: u32,
    pub last_progress: f32,
    pub peak_progress: f32,
    pub mean_similarity: f32,
    pub best_similarity: f32,
}

impl SessionMetrics {
    pub fn as_map(&self) -> HashMap<String, f32> {
        let mut metrics = HashMap::new();
        metrics.insert("frames_analyzed".to_string(), self.frames_analyzed as f32);
        metrics.insert("repetitions".to_string(), self.repetitions as f32);
        metrics.insert("last_progress".to_string(), self.last_progress);
        metrics.insert("peak_progress".to_string(), self.peak_progress);
        metrics.insert("mean_similarity".to_string(), self.mean_similarity);
        metrics.insert("best_similarity".to_string(), self.best_similarity);
        metrics
    }
}

/// Mutable per-segment analysis state.
#[derive(Debug, Clone, Default)]
pub struct AnalysisSession {
    last_progress: f32,
    active: bool,
    phase: MovementPhase,
    repetitions: u32,
    frames_analyzed: u64,
    peak_progress: f32,
    similarity_sum: f64,
    best_similarity: f32,
    last_timestamp: Option<u64>,
}

impl AnalysisSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_progress(&self) -> f32 {
        self.last_progress
    }

    /// True once a frame has been analyzed since the last reset.
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn phase(&self) -> MovementPhase {
        self.phase
    }

    pub fn repetitions(&self) -> u32 {
        self.repetitions
    }

    pub fn last_timestamp(&self) -> Option<u64> {
        self.last_timestamp
    }

    /// Folds one evaluated frame into the session. Returns the phase after
    /// this frame and the repetition count.
    pub fn record(
        &mut self,
        progress: f32,
        similarity: f32,
        timestamp_ms: u64,
        config: &AnalysisConfig,
    ) -> (MovementPhase, u32) {
        if let Some(prev) = self.last_timestamp {
            if timestamp_ms < prev {
                log::warn!("frame timestamp {} precedes previous frame {}", timestamp_ms, prev);
            }
        }
        self.last_timestamp = Some(timestamp_ms);

        let (new_phase, rep_detected) = detect_phase(self.phase, progress, config);
        if new_phase != self.phase {
            log::debug!("movement phase {:?} -> {:?} at progress {:.3}", self.phase, new_phase, progress);
        }
        self.phase = new_phase;
        if rep_detected {
            self.repetitions += 1;
            log::info!("repetition {} completed", self.repetitions);
        }

        self.last_progress = progress;
        self.active = true;
        self.frames_analyzed += 1;
        self.peak_progress = self.peak_progress.max(progress);
        self.similarity_sum += similarity as f64;
        self.best_similarity = self.best_similarity.max(similarity);

        (self.phase, self.repetitions)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn metrics(&self) -> SessionMetrics {
        let mean_similarity = if self.frames_analyzed == 0 {
            0.0
        } else {
            (self.similarity_sum / self.frames_analyzed as f64) as f32
        };
        SessionMetrics {
            frames_analyzed: self.frames_analyzed,
            repetitions: self.repetitions,
            last_progress: self.last_progress,
            peak_progress: self.peak_progress,
            mean_similarity,
            best_similarity: self.best_similarity,
        }
    }
}

/// Hysteresis phase machine over progress. A repetition is counted on the
/// `Advancing -> Hold` edge.
fn detect_phase(phase: MovementPhase, progress: f32, config: &AnalysisConfig) -> (MovementPhase, bool) {
    let complete = config.completion_threshold;
    let rest = config.rest_threshold;
    let release = (complete - config.release_hysteresis).max(rest);
    let mut rep_detected = false;

    let new_phase = match phase {
        MovementPhase::Rest => {
            if progress >= complete {
                rep_detected = true;
                MovementPhase::Hold
            } else if progress > rest {
                MovementPhase::Advancing
            } else {
                MovementPhase::Rest
            }
        }
        MovementPhase::Advancing => {
            if progress >= complete {
                rep_detected = true;
                MovementPhase::Hold
            } else if progress <= rest {
                MovementPhase::Rest
            } else {
                MovementPhase::Advancing
            }
        }
        MovementPhase::Hold => {
            if progress <= rest {
                MovementPhase::Rest
            } else if progress < release {
                MovementPhase::Returning
            } else {
                MovementPhase::Hold
            }
        }
        MovementPhase::Returning => {
            if progress <= rest {
                MovementPhase::Rest
            } else if progress >= complete {
                MovementPhase::Hold
            } else {
                MovementPhase::Returning
            }
        }
    };

    (new_phase, rep_detected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn feed(session: &mut AnalysisSession, progress: &[f32]) -> Vec<MovementPhase> {
        let config = AnalysisConfig::default();
        progress
            .iter()
            .enumerate()
            .map(|(i, p)| session.record(*p, 0.8, i as u64 + 1, &config).0)
            .collect()
    }

    #[test]
    fn test_full_repetition() {
        let mut session = AnalysisSession::new();
        let phases = feed(&mut session, &[0.0, 0.3, 0.7, 0.97, 0.99, 0.6, 0.2, 0.05]);
        assert_eq!(
            phases,
            vec![
                MovementPhase::Rest,
                MovementPhase::Advancing,
                MovementPhase::Advancing,
                MovementPhase::Hold,
                MovementPhase::Hold,
                MovementPhase::Returning,
                MovementPhase::Returning,
                MovementPhase::Rest,
            ]
        );
        assert_eq!(session.repetitions(), 1);
        assert_abs_diff_eq!(session.last_progress(), 0.05, epsilon = 1e-6);
    }

    #[test]
    fn test_jitter_at_threshold_counts_once() {
        let mut session = AnalysisSession::new();
        feed(&mut session, &[0.5, 0.96, 0.94, 0.96, 0.93, 0.97]);
        assert_eq!(session.repetitions(), 1);
        assert_eq!(session.phase(), MovementPhase::Hold);
    }

    #[test]
    fn test_partial_return_does_not_count() {
        let mut session = AnalysisSession::new();
        feed(&mut session, &[0.5, 0.98, 0.5, 0.98, 0.0, 0.5, 0.98]);
        assert_eq!(session.repetitions(), 2);
    }

    #[test]
    fn test_metrics_and_reset() {
        let mut session = AnalysisSession::new();
        assert!(!session.is_active());
        feed(&mut session, &[0.2, 0.6, 0.4]);
        let metrics = session.metrics();
        assert!(session.is_active());
        assert_eq!(metrics.frames_analyzed, 3);
        assert_abs_diff_eq!(metrics.peak_progress, 0.6, epsilon = 1e-6);
        assert_abs_diff_eq!(metrics.mean_similarity, 0.8, epsilon = 1e-5);
        assert_eq!(metrics.as_map()["frames_analyzed"], 3.0);

        session.reset();
        assert!(!session.is_active());
        assert_eq!(session.last_progress(), 0.0);
        assert_eq!(session.metrics(), SessionMetrics::default());
    }
}
