//! Data Transfer Objects (DTOs) for API requests and responses

pub mod command;
pub mod common;
pub mod system;

pub use command::*;
pub use common::*;
pub use system::*;
