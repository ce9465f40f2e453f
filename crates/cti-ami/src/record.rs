//! AMI record parsing and representation
//!
//! This module handles parsing manager interface records (responses and
//! events) and provides convenient access to their fields.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// Fields that may legitimately repeat inside one record
const MULTI_VALUED: &[&str] = &["chanvariable", "variable"];

/// AMI record structure
///
/// Represents one decoded unit from the session: either a response to an
/// action (tagged with `actionid`) or an event. Keys are lower-cased on
/// decode so lookups are case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AmiRecord {
    fields: HashMap<String, String>,
}

impl AmiRecord {
    /// Create a new empty record
    pub fn new() -> Self {
        Self {
            fields: HashMap::new(),
        }
    }

    /// Parse a record from raw text
    ///
    /// Records are formatted as:
    /// ```text
    /// Event: Newchannel
    /// Channel: PJSIP/214-00000012
    /// Uniqueid: 1700000000.42
    /// ```
    ///
    /// Returns `None` when no `Key: Value` line is found.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut record = Self::new();

        for line in raw.lines() {
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }

            if let Some((key, value)) = line.split_once(':') {
                record.push(key.trim(), value.trim());
            }
        }

        if record.fields.is_empty() {
            None
        } else {
            Some(record)
        }
    }

    /// Build a record from key/value pairs
    pub fn from_pairs<K: AsRef<str>, V: AsRef<str>>(pairs: &[(K, V)]) -> Self {
        let mut record = Self::new();
        for (k, v) in pairs {
            record.push(k.as_ref(), v.as_ref());
        }
        record
    }

    fn push(&mut self, key: &str, value: &str) {
        let key = key.to_lowercase();
        if MULTI_VALUED.contains(&key.as_str()) {
            if let Some(existing) = self.fields.get_mut(&key) {
                existing.push(';');
                existing.push_str(value);
                return;
            }
        }
        self.fields.insert(key, value.to_string());
    }

    /// Get a field value by name (case-insensitive)
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .get(&name.to_lowercase())
            .map(|s| s.as_str())
    }

    /// Get a non-empty field value
    pub fn get_non_empty(&self, name: &str) -> Option<&str> {
        self.get(name).filter(|v| !v.is_empty() && *v != "<unknown>")
    }

    /// Get a field value or default
    pub fn get_or(&self, name: &str, default: &str) -> String {
        self.get_non_empty(name).unwrap_or(default).to_string()
    }

    /// Parse a numeric field
    pub fn get_number<T: std::str::FromStr>(&self, name: &str) -> Option<T> {
        self.get(name).and_then(|s| s.trim().parse().ok())
    }

    /// Interpret a boolean-ish field (`1`, `true`, `yes`, `on`)
    pub fn get_flag(&self, name: &str) -> bool {
        self.get(name)
            .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
            .unwrap_or(false)
    }

    /// Set a field
    pub fn set(&mut self, key: &str, value: &str) {
        self.fields.insert(key.to_lowercase(), value.to_string());
    }

    /// Get all fields
    pub fn fields(&self) -> &HashMap<String, String> {
        &self.fields
    }

    // Common fields with convenient accessors

    /// Correlation token (`ActionID`)
    pub fn action_id(&self) -> Option<&str> {
        self.get_non_empty("actionid")
    }

    /// Event name as sent by the PBX
    pub fn event_name(&self) -> Option<&str> {
        self.get_non_empty("event")
    }

    /// Lower-cased event name, used as the event registry key
    pub fn event_key(&self) -> Option<String> {
        self.event_name().map(|e| e.to_lowercase())
    }

    /// `Response` field of an action response
    pub fn response(&self) -> Option<&str> {
        self.get_non_empty("response")
    }

    /// Check if this is an action response
    pub fn is_response(&self) -> bool {
        self.response().is_some()
    }

    /// Check if this is an event (solicited or not)
    pub fn is_event(&self) -> bool {
        self.event_name().is_some()
    }

    /// Check if the PBX reported a protocol-level failure
    pub fn is_error(&self) -> bool {
        self.response()
            .map(|r| r.eq_ignore_ascii_case("error"))
            .unwrap_or(false)
    }

    /// Check if the action was accepted
    pub fn is_success(&self) -> bool {
        self.response()
            .map(|r| r.eq_ignore_ascii_case("success") || r.eq_ignore_ascii_case("follows"))
            .unwrap_or(false)
    }

    /// Human-readable message (`Message` field)
    pub fn message(&self) -> Option<&str> {
        self.get_non_empty("message")
    }

    /// Channel field
    pub fn channel(&self) -> Option<&str> {
        self.get_non_empty("channel")
    }

    /// Unique id field
    pub fn unique_id(&self) -> Option<&str> {
        self.get_non_empty("uniqueid")
    }

    /// Queue field
    pub fn queue(&self) -> Option<&str> {
        self.get_non_empty("queue")
    }

    /// Serialize all fields as a JSON object
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.fields).unwrap_or(serde_json::Value::Null)
    }
}

impl fmt::Display for AmiRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AmiRecord {{")?;

        if let Some(event) = self.event_name() {
            write!(f, " Event: {}", event)?;
        }

        if let Some(response) = self.response() {
            write!(f, " Response: {}", response)?;
        }

        if let Some(action_id) = self.action_id() {
            write!(f, ", ActionID: {}", action_id)?;
        }

        if let Some(channel) = self.channel() {
            write!(f, ", Channel: {}", channel)?;
        }

        write!(f, ", Fields: {} }}", self.fields.len())
    }
}
