//! Conversation model
//!
//! A conversation is the owner-scoped view of one call, rebuilt from the
//! PBX channel list on every reconciliation round. The same logical call is
//! represented twice, once per party.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::privacy::Privacy;

/// Call direction from the owner's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    In,
    Out,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::In => write!(f, "in"),
            Direction::Out => write!(f, "out"),
        }
    }
}

/// Recording state of a conversation
///
/// This is the only piece of conversation state that outlives a
/// reconciliation round; it is kept in a side table keyed by conversation id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RecordingState {
    #[default]
    None,
    Recording,
    Muted,
}

/// One leg of a call, as reported by the PBX channel list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Channel {
    /// Channel identifier, e.g. `PJSIP/214-00000012`
    pub channel: String,

    /// PBX unique id (`<epoch>.<sequence>`)
    pub unique_id: String,

    pub caller_num: String,
    pub caller_name: String,
    pub bridged_num: String,
    pub bridged_name: String,

    /// Raw lower-cased state description (`up`, `ring`, `ringing`, `down`, ...)
    pub status: String,

    /// Extension or trunk the channel belongs to, when known
    pub owner_id: Option<String>,

    /// Counterpart resolved by the bridging pass
    pub bridged_channel: Option<String>,

    /// Channel creation time
    pub start_time: Option<DateTime<Utc>>,
}

impl Channel {
    pub fn is_up(&self) -> bool {
        self.status == "up"
    }

    fn mask(&mut self, privacy: &Privacy, through_queue: bool, hidden: &str) {
        if !hidden.is_empty() {
            if self.caller_num == hidden {
                self.caller_num = privacy.mask_number(&self.caller_num, through_queue);
            }
            if self.bridged_num == hidden {
                self.bridged_num = privacy.mask_number(&self.bridged_num, through_queue);
            }
        }
    }
}

/// Owner-scoped view of a call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    /// `<sourceChannel>><destChannel>`; either side may be empty while ringing
    pub id: String,

    /// Extension or trunk holding this view
    pub owner_id: String,

    pub source: Option<Channel>,
    pub dest: Option<Channel>,

    /// Set only if the call passed through a queue
    pub queue_id: Option<String>,

    pub direction: Direction,
    pub through_queue: bool,
    pub through_trunk: bool,
    pub connected: bool,
    pub recording: RecordingState,

    /// Number and name of the other party
    pub counterpart_num: String,
    pub counterpart_name: String,

    pub start_time: Option<DateTime<Utc>>,
}

impl Conversation {
    /// Build a conversation from a resolved channel pair.
    ///
    /// `direction` is decided here once: the call is outgoing when the owner
    /// is the caller on the source channel. `connected` is derived, never
    /// set independently: both legs present and up, or a conference.
    pub fn new(
        owner_id: &str,
        source: Option<Channel>,
        dest: Option<Channel>,
        queue_id: Option<String>,
        through_trunk: bool,
        conference: bool,
    ) -> Self {
        let id = Self::identity(
            source.as_ref().map(|c| c.channel.as_str()),
            dest.as_ref().map(|c| c.channel.as_str()),
        );

        let owner_is_source = source
            .as_ref()
            .and_then(|c| c.owner_id.as_deref())
            .map_or(false, |o| o == owner_id);
        let direction = if owner_is_source {
            Direction::Out
        } else {
            Direction::In
        };

        let connected = conference
            || matches!((&source, &dest), (Some(s), Some(d)) if s.is_up() && d.is_up());

        let (counterpart_num, counterpart_name) = match direction {
            Direction::Out => match (&dest, &source) {
                (Some(d), _) => (d.caller_num.clone(), d.caller_name.clone()),
                (None, Some(s)) => (s.bridged_num.clone(), s.bridged_name.clone()),
                _ => (String::new(), String::new()),
            },
            Direction::In => match &source {
                Some(s) => (s.caller_num.clone(), s.caller_name.clone()),
                None => dest
                    .as_ref()
                    .map(|d| (d.bridged_num.clone(), d.bridged_name.clone()))
                    .unwrap_or_default(),
            },
        };

        let start_time = source
            .as_ref()
            .and_then(|c| c.start_time)
            .or_else(|| dest.as_ref().and_then(|c| c.start_time));

        Self {
            id,
            owner_id: owner_id.to_string(),
            source,
            dest,
            through_queue: queue_id.is_some(),
            queue_id,
            direction,
            through_trunk,
            connected,
            recording: RecordingState::None,
            counterpart_num,
            counterpart_name,
            start_time,
        }
    }

    /// Conversation identity for a channel pair
    pub fn identity(source: Option<&str>, dest: Option<&str>) -> String {
        format!("{}>{}", source.unwrap_or(""), dest.unwrap_or(""))
    }

    /// Copy with the counterpart number masked
    pub fn masked(&self, privacy: &Privacy) -> Self {
        let mut masked = self.clone();
        let hidden = self.counterpart_num.clone();
        masked.counterpart_num = privacy.mask_number(&hidden, self.through_queue);
        for channel in [masked.source.as_mut(), masked.dest.as_mut()]
            .into_iter()
            .flatten()
        {
            channel.mask(privacy, self.through_queue, &hidden);
        }
        masked
    }
}

/// Conversation set of an extension or trunk
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Conversations(HashMap<String, Conversation>);

impl Conversations {
    /// Attach a conversation, replacing one with the same identity
    pub fn attach(&mut self, conversation: Conversation) {
        self.0.insert(conversation.id.clone(), conversation);
    }

    pub fn get(&self, id: &str) -> Option<&Conversation> {
        self.0.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Conversation> {
        self.0.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Conversation> {
        self.0.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn masked(&self, privacy: &Privacy) -> Self {
        Self(
            self.0
                .iter()
                .map(|(id, c)| (id.clone(), c.masked(privacy)))
                .collect(),
        )
    }
}
