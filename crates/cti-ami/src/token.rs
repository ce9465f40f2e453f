//! Correlation tokens
//!
//! A token is `<command>_<unix millis><random suffix>`. Command names are
//! camelCase, so the separator never appears inside them and the
//! originating command is whatever precedes the first separator.
//!
//! Uniqueness is probabilistic: the correlation window is a few seconds on a
//! single session, so no collision detection is done.

use chrono::Utc;
use rand::Rng;

/// Separator between the command name and the unique part
pub const SEPARATOR: char = '_';

/// Mint a token for `command`
pub fn new_token(command: &str) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..100_000);
    format!(
        "{}{}{}{:05}",
        command,
        SEPARATOR,
        Utc::now().timestamp_millis(),
        suffix
    )
}

/// Extract the originating command name
pub fn command_of(token: &str) -> Option<&str> {
    match token.split_once(SEPARATOR) {
        Some((command, _)) if !command.is_empty() => Some(command),
        _ => None,
    }
}
