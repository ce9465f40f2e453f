//! Outgoing manager actions

use std::fmt;

/// An action to send over the manager session
///
/// Fields keep their insertion order; `ActionID` is always written right
/// after `Action`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmiAction {
    name: String,
    action_id: Option<String>,
    fields: Vec<(String, String)>,
}

impl AmiAction {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            action_id: None,
            fields: Vec::new(),
        }
    }

    /// Add a field (builder style)
    pub fn field(mut self, key: &str, value: impl Into<String>) -> Self {
        self.fields.push((key.to_string(), value.into()));
        self
    }

    /// Add a field only when a value is present
    pub fn field_opt(self, key: &str, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(v) => self.field(key, v),
            None => self,
        }
    }

    /// Attach the correlation token
    pub fn with_action_id(mut self, token: impl Into<String>) -> Self {
        self.action_id = Some(token.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn action_id(&self) -> Option<&str> {
        self.action_id.as_deref()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Wire encoding: `Key: Value` lines followed by a blank line
    pub fn encode(&self) -> String {
        let mut out = format!("Action: {}\r\n", self.name);
        if let Some(id) = &self.action_id {
            out.push_str(&format!("ActionID: {}\r\n", id));
        }
        for (key, value) in &self.fields {
            // a value can never span lines on the wire
            let value = value.replace(['\r', '\n'], " ");
            out.push_str(&format!("{}: {}\r\n", key, value));
        }
        out.push_str("\r\n");
        out
    }
}

impl fmt::Display for AmiAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AmiAction {{ Action: {}", self.name)?;
        if let Some(id) = &self.action_id {
            write!(f, ", ActionID: {}", id)?;
        }
        write!(f, ", Fields: {} }}", self.fields.len())
    }
}
