use thiserror::Error;

/// Stable failure classification shared with bindings and hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotInitialized,
    InvalidPose,
    CalibrationFailed,
    SegmentNotCreated,
    SegmentCreationFailed,
    InvalidParameter,
    MemoryAllocation,
    /// Boundary code with no known meaning.
    Unknown(i32),
}

impl ErrorKind {
    /// Integer code used across language boundaries. Zero is reserved for success.
    pub fn code(self) -> i32 {
        match self {
            ErrorKind::NotInitialized => -1,
            ErrorKind::InvalidPose => -2,
            ErrorKind::CalibrationFailed => -3,
            ErrorKind::SegmentNotCreated => -4,
            ErrorKind::InvalidParameter => -5,
            ErrorKind::MemoryAllocation => -6,
            ErrorKind::SegmentCreationFailed => -7,
            ErrorKind::Unknown(code) => code,
        }
    }

    pub fn from_code(code: i32) -> ErrorKind {
        match code {
            -1 => ErrorKind::NotInitialized,
            -2 => ErrorKind::InvalidPose,
            -3 => ErrorKind::CalibrationFailed,
            -4 => ErrorKind::SegmentNotCreated,
            -5 => ErrorKind::InvalidParameter,
            -6 => ErrorKind::MemoryAllocation,
            -7 => ErrorKind::SegmentCreationFailed,
            other => ErrorKind::Unknown(other),
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            ErrorKind::NotInitialized => "System not initialized",
            ErrorKind::InvalidPose => "Invalid pose data",
            ErrorKind::CalibrationFailed => "Calibration failed",
            ErrorKind::SegmentNotCreated => "Segment not created",
            ErrorKind::SegmentCreationFailed => "Segment creation failed",
            ErrorKind::InvalidParameter => "Invalid parameter",
            ErrorKind::MemoryAllocation => "Memory allocation failed",
            ErrorKind::Unknown(_) => "Unknown error",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Unknown(code) => write!(f, "{} ({})", self.message(), code),
            _ => f.write_str(self.message()),
        }
    }
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("not initialized: {0}")]
    NotInitialized(&'static str),
    #[error("invalid pose: {0}")]
    InvalidPose(String),
    #[error("calibration failed: {0}")]
    CalibrationFailed(String),
    #[error("no active segment")]
    SegmentNotCreated,
    #[error("segment creation failed: {0}")]
    SegmentCreationFailed(String),
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("memory allocation failed")]
    MemoryAllocation,
    #[error("unknown error code {0}")]
    Unknown(i32),
    #[error("workout file IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("workout file format error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::NotInitialized(_) => ErrorKind::NotInitialized,
            EngineError::InvalidPose(_) => ErrorKind::InvalidPose,
            EngineError::CalibrationFailed(_) => ErrorKind::CalibrationFailed,
            EngineError::SegmentNotCreated => ErrorKind::SegmentNotCreated,
            EngineError::SegmentCreationFailed(_) => ErrorKind::SegmentCreationFailed,
            EngineError::InvalidParameter(_) => ErrorKind::InvalidParameter,
            EngineError::MemoryAllocation => ErrorKind::MemoryAllocation,
            EngineError::Unknown(code) => ErrorKind::Unknown(*code),
            EngineError::Io(_) | EngineError::Json(_) => ErrorKind::InvalidParameter,
        }
    }

    /// Rebuilds a typed error from a boundary code.
    pub fn from_code(code: i32) -> EngineError {
        match ErrorKind::from_code(code) {
            ErrorKind::NotInitialized => EngineError::NotInitialized("reported by host"),
            ErrorKind::InvalidPose => EngineError::InvalidPose("reported by host".into()),
            ErrorKind::CalibrationFailed => EngineError::CalibrationFailed("reported by host".into()),
            ErrorKind::SegmentNotCreated => EngineError::SegmentNotCreated,
            ErrorKind::SegmentCreationFailed => {
                EngineError::SegmentCreationFailed("reported by host".into())
            }
            ErrorKind::InvalidParameter => EngineError::InvalidParameter("reported by host".into()),
            ErrorKind::MemoryAllocation => EngineError::MemoryAllocation,
            ErrorKind::Unknown(code) => EngineError::Unknown(code),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
