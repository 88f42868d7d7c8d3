//! Error types.
//!
//! Two layers:
//!
//! - `IvError`: typed failures raised by the analysis core
//! - `AppError`: what the `ivfit` binary reports (message + process exit code)
//!
//! Exit codes follow a small convention:
//! - 2: bad configuration or unreadable input
//! - 3: data shape problems (empty/mismatched arrays, unsplittable sweeps)
//! - 4: fit or pipeline-state failures

use thiserror::Error;

/// Result alias for the analysis core.
pub type IvResult<T> = Result<T, IvError>;

/// Failures raised by the I–V analysis core.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IvError {
    /// Invalid unit/type labels or malformed scalar configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Mismatched array lengths, empty arrays, or a sweep that cannot be split.
    #[error("data shape error: {0}")]
    DataShape(String),

    /// A regression or optimization had nothing usable to work with.
    #[error("degenerate fit: {0}")]
    FitDegenerate(String),

    /// A stage ran before the stage it depends on.
    #[error("missing upstream stage: {0} has not run")]
    MissingStage(&'static str),
}

impl IvError {
    /// Process exit code used when this error reaches the binary.
    pub fn exit_code(&self) -> u8 {
        match self {
            IvError::Configuration(_) => 2,
            IvError::DataShape(_) => 3,
            IvError::FitDegenerate(_) | IvError::MissingStage(_) => 4,
        }
    }
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl From<IvError> for AppError {
    fn from(err: IvError) -> Self {
        AppError::new(err.exit_code(), err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}
