//! Meetme conference model
//!
//! A conference is identified by the extension that owns it. Users may come
//! from a remote site, in which case their key is prefixed with the site prefix.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A user inside a conference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetmeConfUser {
    /// Conference-local user number
    pub user_id: String,
    pub exten_id: String,
    pub name: String,
    pub channel: String,
    pub is_owner: bool,
    pub muted: bool,
    /// Remote site prefix and name, when the user dialed in from another site
    pub site_prefix: Option<String>,
    pub site_name: Option<String>,
}

impl MeetmeConfUser {
    /// Key used in the conference user map
    pub fn key(&self) -> String {
        site_qualified(self.site_prefix.as_deref(), &self.exten_id)
    }
}

/// `<prefix><exten>` for remote users, plain extension otherwise
pub fn site_qualified(prefix: Option<&str>, exten_id: &str) -> String {
    match prefix {
        Some(p) if !p.is_empty() => format!("{}{}", p, exten_id),
        _ => exten_id.to_string(),
    }
}

/// Conference entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetmeConference {
    pub owner_extension_id: String,
    pub users: HashMap<String, MeetmeConfUser>,
}

impl MeetmeConference {
    pub fn new(owner_extension_id: &str) -> Self {
        Self {
            owner_extension_id: owner_extension_id.to_string(),
            users: HashMap::new(),
        }
    }

    pub fn add_user(&mut self, user: MeetmeConfUser) {
        self.users.insert(user.key(), user);
    }

    pub fn remove_user_by_id(&mut self, user_id: &str) -> Option<MeetmeConfUser> {
        let key = self
            .users
            .iter()
            .find(|(_, u)| u.user_id == user_id)
            .map(|(k, _)| k.clone())?;
        self.users.remove(&key)
    }

    /// Returns true on change
    pub fn set_muted(&mut self, user_id: &str, muted: bool) -> bool {
        match self.users.values_mut().find(|u| u.user_id == user_id) {
            Some(user) if user.muted != muted => {
                user.muted = muted;
                true
            }
            _ => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}
