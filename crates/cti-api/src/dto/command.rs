//! Command DTOs

use cti_engine::{CommandArgs, CommandOutput};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::{Validate, ValidationError};

/// Upper bound on arguments accepted for one command
pub const MAX_COMMAND_ARGS: usize = 32;

/// Body of `POST /api/v1/commands/{name}`
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CommandRequest {
    /// Command arguments, scalar values only
    #[serde(default)]
    #[validate(custom(function = "validate_args"))]
    pub args: CommandArgs,
}

fn validate_args(args: &CommandArgs) -> Result<(), ValidationError> {
    if args.len() > MAX_COMMAND_ARGS {
        return Err(ValidationError::new("too_many_args"));
    }
    if args
        .iter()
        .any(|(_, value)| matches!(value, Value::Array(_) | Value::Object(_)))
    {
        return Err(ValidationError::new("args_must_be_scalar"));
    }
    Ok(())
}

/// Outcome of a command run through the correlator
#[derive(Debug, Clone, Serialize)]
pub struct CommandResponse {
    pub command: String,
    pub output: CommandOutput,
}

/// Catalog of supported commands
#[derive(Debug, Clone, Serialize)]
pub struct CommandCatalog {
    pub commands: Vec<String>,
}
