use pyo3::exceptions::{PyMemoryError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use std::collections::HashMap;

use crate::config::EngineConfig;
use crate::engine::SegmentEngine;
use crate::error::{EngineError, ErrorKind};
use crate::types::PoseFrame;

type Landmarks = Vec<(f32, f32, f32, f32)>;

fn to_py_err(err: EngineError) -> PyErr {
    let kind = err.kind();
    let message = format!("[{}] {}: {}", kind.code(), kind.message(), err);
    match kind {
        ErrorKind::InvalidParameter | ErrorKind::InvalidPose => PyValueError::new_err(message),
        ErrorKind::MemoryAllocation => PyMemoryError::new_err(message),
        _ => PyRuntimeError::new_err(message),
    }
}

fn frame(landmarks: Landmarks, timestamp_ms: u64) -> PyResult<PoseFrame> {
    PoseFrame::from_tuples(&landmarks, timestamp_ms).map_err(to_py_err)
}

/// Python handle for one engine instance. PyO3's borrow tracking rejects
/// overlapping calls on the same object.
#[pyclass(name = "SegmentEngine")]
pub struct PySegmentEngine {
    engine: SegmentEngine,
}

#[pymethods]
impl PySegmentEngine {
    #[new]
    #[pyo3(signature = (config_path=None))]
    pub fn new(config_path: Option<&str>) -> PyResult<Self> {
        let config = match config_path {
            Some(path) => EngineConfig::from_file_with_env(path)
                .map_err(|e| PyValueError::new_err(format!("Failed to load config: {}", e)))?,
            None => EngineConfig::default(),
        };
        Ok(PySegmentEngine { engine: SegmentEngine::new(config) })
    }

    pub fn initialize(&mut self) -> PyResult<()> {
        self.engine.initialize().map_err(to_py_err)
    }

    pub fn cleanup(&mut self) {
        self.engine.cleanup();
    }

    pub fn calibrate(&mut self, py: Python, landmarks: Landmarks, timestamp_ms: u64) -> PyResult<PyObject> {
        let profile = self.engine.calibrate(&frame(landmarks, timestamp_ms)?).map_err(to_py_err)?;
        pythonize::pythonize(py, &profile).map_err(|e| PyValueError::new_err(e.to_string()))
    }

    pub fn is_calibrated(&self) -> bool {
        self.engine
            .active_calibration()
            .map_or(false, |p| self.engine.validate_calibration(p))
    }

    pub fn create_segment(
        &mut self,
        start: Landmarks,
        start_timestamp_ms: u64,
        end: Landmarks,
        end_timestamp_ms: u64,
        care_joints: Vec<usize>,
    ) -> PyResult<()> {
        let start = frame(start, start_timestamp_ms)?;
        let end = frame(end, end_timestamp_ms)?;
        self.engine.create_segment(&start, &end, &care_joints).map_err(to_py_err)
    }

    pub fn analyze(&mut self, py: Python, landmarks: Landmarks, timestamp_ms: u64) -> PyResult<PyObject> {
        let result = self.engine.analyze(&frame(landmarks, timestamp_ms)?).map_err(to_py_err)?;
        pythonize::pythonize(py, &result).map_err(|e| PyValueError::new_err(e.to_string()))
    }

    pub fn reset_segment(&mut self) -> PyResult<()> {
        self.engine.reset_segment().map_err(to_py_err)
    }

    pub fn destroy_segment(&mut self) {
        self.engine.destroy_segment();
    }

    pub fn calculate_similarity(&self, a: Landmarks, b: Landmarks) -> PyResult<f32> {
        let a = frame(a, 1)?;
        let b = frame(b, 1)?;
        Ok(self.engine.calculate_similarity(&a, &b))
    }

    pub fn validate_pose(&self, landmarks: Landmarks, timestamp_ms: u64) -> PyResult<bool> {
        Ok(self.engine.validate_pose(&frame(landmarks, timestamp_ms)?))
    }

    pub fn target_pose(&self) -> PyResult<Landmarks> {
        let target = self.engine.target_pose().map_err(to_py_err)?;
        Ok(target
            .landmarks
            .iter()
            .map(|lm| (lm.position.x, lm.position.y, lm.position.z, lm.confidence))
            .collect())
    }

    pub fn record_pose(&mut self, name: &str, landmarks: Landmarks, timestamp_ms: u64) -> PyResult<usize> {
        self.engine.record_pose(name, &frame(landmarks, timestamp_ms)?).map_err(to_py_err)
    }

    pub fn finalize_workout(&mut self, workout_name: &str, path: &str) -> PyResult<()> {
        self.engine.finalize_workout(workout_name, path).map_err(to_py_err)
    }

    pub fn load_workout(&mut self, path: &str) -> PyResult<usize> {
        self.engine.load_workout(path).map_err(to_py_err)
    }

    pub fn select_segment(&mut self, start_index: usize, end_index: usize, care_joints: Vec<usize>) -> PyResult<()> {
        self.engine
            .select_segment(start_index, end_index, &care_joints)
            .map_err(to_py_err)
    }

    pub fn session_metrics(&self) -> HashMap<String, f32> {
        self.engine.session_metrics().as_map()
    }
}

#[pyfunction]
fn error_message(code: i32) -> &'static str {
    if code == 0 {
        return "Success";
    }
    ErrorKind::from_code(code).message()
}

#[pymodule]
#[allow(non_local_definitions)]
fn exercise_segment(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<PySegmentEngine>()?;
    m.add_function(wrap_pyfunction!(error_message, m)?)?;
    m.add("JOINT_COUNT", crate::types::JOINT_COUNT)?;
    Ok(())
}
