//! Active channel list entries
//!
//! The raw shape of one `CoreShowChannel` record, plus the helpers the
//! reconciler needs to reason about it: owner resolution from the channel
//! name, relay leg detection and unique id ordering. SIP contact addresses
//! are parsed here as well.

use chrono::{DateTime, TimeZone, Utc};
use cti_ami::AmiRecord;
use cti_core::models::Channel;
use serde::{Deserialize, Serialize};

/// Applications that turn a channel into a conference participant
pub const CONFERENCE_APPS: &[&str] = &["meetme", "confbridge"];

/// Application name the PBX reports for a caller waiting in a queue
pub const QUEUE_APP: &str = "queue";

/// One active channel as reported by the PBX
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub channel: String,
    pub unique_id: String,
    pub linked_id: String,
    /// Empty while the PBX has not assigned a bridge yet
    pub bridge_id: Option<String>,
    pub caller_num: String,
    pub caller_name: String,
    pub connected_num: String,
    pub connected_name: String,
    /// Lower-cased state description
    pub status: String,
    pub application: String,
    pub app_data: String,
    pub exten: String,
    pub context: String,
    /// Queue the call went through, filled for relay legs
    pub queue: Option<String>,
    pub duration_secs: u64,
}

impl ChannelInfo {
    pub fn from_record(record: &AmiRecord) -> Option<Self> {
        let channel = record.channel()?.to_string();

        Some(Self {
            channel,
            unique_id: record.get_or("uniqueid", ""),
            linked_id: record.get_or("linkedid", ""),
            bridge_id: record.get_non_empty("bridgeid").map(str::to_string),
            caller_num: record.get_or("calleridnum", ""),
            caller_name: record.get_or("calleridname", ""),
            connected_num: record.get_or("connectedlinenum", ""),
            connected_name: record.get_or("connectedlinename", ""),
            status: record.get_or("channelstatedesc", "").to_lowercase(),
            application: record.get_or("application", ""),
            app_data: record.get_or("applicationdata", ""),
            exten: record.get_or("exten", ""),
            context: record.get_or("context", ""),
            queue: None,
            duration_secs: record
                .get("duration")
                .map(parse_duration)
                .unwrap_or_default(),
        })
    }

    /// Owner candidate derived from the channel name
    pub fn owner_name(&self) -> Option<&str> {
        owner_name(&self.channel)
    }

    pub fn is_relay(&self, marker: &str) -> bool {
        !marker.is_empty() && self.channel.contains(marker)
    }

    /// The other half of a relay pair (`;1` <-> `;2`)
    pub fn relay_sibling_name(&self) -> Option<String> {
        let (base, leg) = self.channel.rsplit_once(';')?;
        let other = match leg {
            "1" => "2",
            "2" => "1",
            _ => return None,
        };
        Some(format!("{};{}", base, other))
    }

    pub fn is_ringing_state(&self) -> bool {
        matches!(self.status.as_str(), "ring" | "ringing" | "down")
    }

    pub fn is_conference(&self) -> bool {
        CONFERENCE_APPS.contains(&self.application.to_lowercase().as_str())
    }

    /// Queue id when this channel is waiting in or served by a queue
    pub fn queue_app_target(&self) -> Option<&str> {
        if !self.application.eq_ignore_ascii_case(QUEUE_APP) {
            return None;
        }
        self.app_data
            .split(',')
            .next()
            .map(str::trim)
            .filter(|q| !q.is_empty())
    }

    pub fn unique_key(&self) -> (u64, u64) {
        unique_id_key(&self.unique_id)
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        let (secs, _) = self.unique_key();
        i64::try_from(secs)
            .ok()
            .and_then(|s| Utc.timestamp_opt(s, 0).single())
    }

    /// Model value for a conversation endpoint
    pub fn to_model(&self, owner_id: Option<&str>, bridged: Option<&str>) -> Channel {
        Channel {
            channel: self.channel.clone(),
            unique_id: self.unique_id.clone(),
            caller_num: self.caller_num.clone(),
            caller_name: self.caller_name.clone(),
            bridged_num: self.connected_num.clone(),
            bridged_name: self.connected_name.clone(),
            status: self.status.clone(),
            owner_id: owner_id.map(str::to_string),
            bridged_channel: bridged.map(str::to_string),
            start_time: self.created_at(),
        }
    }
}

/// `PJSIP/214-00000012` -> `214`, `IAX2/provider-1234` -> `provider`
pub fn owner_name(channel: &str) -> Option<&str> {
    let (_, rest) = channel.split_once('/')?;
    let name = match rest.rsplit_once('-') {
        Some((name, _)) => name,
        None => rest,
    };
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

/// Host and port of a SIP contact, from either a URI such as
/// `sip:214@10.0.0.5:5060;transport=udp` or a bare `10.0.0.5:5060`
pub fn contact_address(uri: &str) -> Option<(String, String)> {
    let rest = match uri.split_once(':') {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("sip") || scheme.eq_ignore_ascii_case("sips") => rest,
        _ => uri,
    };
    let host_part = rest.rsplit('@').next()?;
    let host_part = host_part.split(';').next()?.trim();
    if host_part.is_empty() {
        return None;
    }

    Some(match host_part.rsplit_once(':') {
        Some((host, port)) if !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()) => {
            (host.to_string(), port.to_string())
        }
        _ => (host_part.to_string(), String::new()),
    })
}

/// Unique ids are `<epoch seconds>.<sequence>`; compare both parts numerically
pub fn unique_id_key(unique_id: &str) -> (u64, u64) {
    let (secs, seq) = unique_id.split_once('.').unwrap_or((unique_id, "0"));
    (
        secs.parse().unwrap_or(u64::MAX),
        seq.parse().unwrap_or(u64::MAX),
    )
}

/// `HH:MM:SS` or plain seconds
fn parse_duration(raw: &str) -> u64 {
    raw.split(':')
        .try_fold(0u64, |acc, part| {
            let value = part.trim().parse::<u64>().ok()?;
            acc.checked_mul(60)?.checked_add(value)
        })
        .unwrap_or(0)
}
