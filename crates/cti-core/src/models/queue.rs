//! Queue model
//!
//! Queues with their members and waiting callers. Member reconciliation
//! rules live in the engine; this module only holds the entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::privacy::Privacy;

/// How a member joined the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MemberType {
    #[default]
    Static,
    Dynamic,
    Realtime,
}

impl fmt::Display for MemberType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberType::Static => write!(f, "static"),
            MemberType::Dynamic => write!(f, "dynamic"),
            MemberType::Realtime => write!(f, "realtime"),
        }
    }
}

impl MemberType {
    /// Parse the `Membership` field (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "static" => Some(MemberType::Static),
            "dynamic" => Some(MemberType::Dynamic),
            "realtime" => Some(MemberType::Realtime),
            _ => None,
        }
    }
}

/// Queue member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueMember {
    pub member_id: String,
    pub queue_id: String,
    pub name: String,
    pub member_type: MemberType,
    pub paused: bool,
    pub pause_reason: String,
    pub last_pause_start: Option<DateTime<Utc>>,
    pub last_pause_end: Option<DateTime<Utc>>,
    pub logged_in: bool,
    pub calls_taken: u64,

    /// Epoch seconds of the last answered call, 0 if none
    pub last_call: i64,
}

impl QueueMember {
    pub fn new(member_id: &str, queue_id: &str, name: &str, member_type: MemberType) -> Self {
        Self {
            member_id: member_id.to_string(),
            queue_id: queue_id.to_string(),
            name: name.to_string(),
            member_type,
            paused: false,
            pause_reason: String::new(),
            last_pause_start: None,
            last_pause_end: None,
            logged_in: false,
            calls_taken: 0,
            last_call: 0,
        }
    }

    /// Change the pause flag, stamping the start or end of the pause
    pub fn set_paused(&mut self, paused: bool, reason: &str, at: DateTime<Utc>) {
        if paused && !self.paused {
            self.last_pause_start = Some(at);
        } else if !paused && self.paused {
            self.last_pause_end = Some(at);
        }
        self.paused = paused;
        self.pause_reason = if paused { reason.to_string() } else { String::new() };
    }

    /// Mark as logged out. Counters are kept.
    pub fn log_out(&mut self, at: DateTime<Utc>) {
        self.logged_in = false;
        self.set_paused(false, "", at);
    }
}

/// A caller waiting in a queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueWaitingCaller {
    pub channel: String,
    pub queue_id: String,
    pub position: u32,
    pub caller_num: String,
    pub caller_name: String,
    pub wait_seconds: u64,
}

/// Aggregate queue statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueStats {
    pub avg_hold_time: u64,
    pub avg_talk_time: u64,
    pub completed: u64,
    pub abandoned: u64,
    pub service_level_window: u64,
    pub service_level_perf: f64,
}

/// Queue entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Queue {
    pub id: String,
    pub name: String,
    pub stats: QueueStats,
    pub members: HashMap<String, QueueMember>,
    pub waiting_callers: HashMap<String, QueueWaitingCaller>,
}

impl Queue {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            stats: QueueStats::default(),
            members: HashMap::new(),
            waiting_callers: HashMap::new(),
        }
    }

    pub fn member(&self, member_id: &str) -> Option<&QueueMember> {
        self.members.get(member_id)
    }

    pub fn member_mut(&mut self, member_id: &str) -> Option<&mut QueueMember> {
        self.members.get_mut(member_id)
    }

    pub fn upsert_member(&mut self, member: QueueMember) {
        self.members.insert(member.member_id.clone(), member);
    }

    /// Replace the waiting caller set wholesale
    pub fn set_waiting_callers(&mut self, callers: Vec<QueueWaitingCaller>) {
        self.waiting_callers = callers
            .into_iter()
            .map(|c| (c.channel.clone(), c))
            .collect();
    }

    pub fn snapshot(&self, privacy: Option<&Privacy>) -> serde_json::Value {
        let mut view = self.clone();
        if let Some(privacy) = privacy {
            for caller in view.waiting_callers.values_mut() {
                caller.caller_num = privacy.mask_number(&caller.caller_num, true);
            }
        }
        serde_json::to_value(view).unwrap_or(serde_json::Value::Null)
    }
}
