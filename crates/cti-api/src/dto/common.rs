//! Common DTOs used across the API

use cti_core::{AppConfig, Privacy};
use serde::{Deserialize, Serialize};

/// Standard API response wrapper
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    /// Response data
    pub data: T,
    /// Response message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Create a success response with data
    pub fn success(data: T) -> Self {
        Self {
            data,
            message: None,
        }
    }

    /// Create a success response with data and message
    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            data,
            message: Some(message.into()),
        }
    }
}

/// Projection options shared by the model queries and the notification stream
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ViewParams {
    /// Mask phone numbers with the configured privacy rules
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub privacy: bool,
}

impl ViewParams {
    /// Privacy rules to apply, if masking was requested
    pub fn privacy<'a>(&self, config: &'a AppConfig) -> Option<&'a Privacy> {
        self.privacy.then_some(&config.privacy)
    }
}

/// Deserialize a flag from a boolean or from `1`/`true`/`yes`/`on`
fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::{self, Visitor};
    use std::fmt;

    struct FlagVisitor;

    impl<'de> Visitor<'de> for FlagVisitor {
        type Value = bool;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a boolean or a string flag")
        }

        fn visit_bool<E>(self, value: bool) -> Result<bool, E>
        where
            E: de::Error,
        {
            Ok(value)
        }

        fn visit_str<E>(self, value: &str) -> Result<bool, E>
        where
            E: de::Error,
        {
            match value.to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "" | "0" | "false" | "no" | "off" => Ok(false),
                other => Err(de::Error::custom(format!("invalid flag '{}'", other))),
            }
        }
    }

    deserializer.deserialize_any(FlagVisitor)
}
