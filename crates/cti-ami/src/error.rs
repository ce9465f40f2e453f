use thiserror::Error;

/// Manager session errors
#[derive(Debug, Error)]
pub enum AmiError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Frame exceeds {0} bytes without a terminator")]
    FrameTooLarge(usize),

    #[error("Unexpected greeting: {0}")]
    InvalidGreeting(String),

    #[error("Login rejected: {0}")]
    LoginFailed(String),

    #[error("Session closed")]
    Closed,

    #[error("Timed out waiting for the PBX")]
    Timeout,
}

impl From<AmiError> for cti_core::AppError {
    fn from(err: AmiError) -> Self {
        match err {
            AmiError::Timeout => cti_core::AppError::CommandTimeout(err.to_string()),
            other => cti_core::AppError::AmiConnection(other.to_string()),
        }
    }
}
