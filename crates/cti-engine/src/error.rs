use cti_ami::AmiError;
use cti_core::AppError;
use thiserror::Error;

/// Outcome of a correlated command that did not produce a value
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),

    /// The PBX answered the token with `Response: Error`
    #[error("{0}")]
    Failed(String),

    #[error("No response for {0}")]
    Timeout(String),

    #[error("Session unavailable: {0}")]
    SessionClosed(String),

    /// The command completed but its result was unusable
    #[error("Unexpected reply: {0}")]
    Unexpected(String),
}

impl CommandError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        CommandError::InvalidArgs(msg.into())
    }

    pub fn closed() -> Self {
        CommandError::SessionClosed("connection closed".to_string())
    }
}

impl From<AmiError> for CommandError {
    fn from(err: AmiError) -> Self {
        CommandError::SessionClosed(err.to_string())
    }
}

impl From<CommandError> for AppError {
    fn from(err: CommandError) -> Self {
        match err {
            CommandError::UnknownCommand(name) => AppError::UnknownCommand(name),
            CommandError::InvalidArgs(msg) => AppError::InvalidInput(msg),
            CommandError::Failed(msg) | CommandError::Unexpected(msg) => AppError::CommandFailed(msg),
            CommandError::Timeout(token) => AppError::CommandTimeout(token),
            CommandError::SessionClosed(msg) => AppError::AmiConnection(msg),
        }
    }
}
