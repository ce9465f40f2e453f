//! Queue member reconciliation
//!
//! Keeps a queue's member map consistent with what the PBX reports, under
//! one rule: a dynamic member is only listed if it is configured for the
//! queue or currently logged in. Removed members are kept, logged out, so
//! their counters survive.

use chrono::{DateTime, Utc};
use cti_ami::AmiRecord;
use cti_core::models::{MemberType, Queue, QueueMember, QueueStats, QueueWaitingCaller};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A member as reported by a queue status listing or a member event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberReport {
    pub member_id: String,
    pub name: String,
    pub member_type: MemberType,
    pub paused: bool,
    pub pause_reason: String,
    pub calls_taken: u64,
    pub last_call: i64,
}

impl MemberReport {
    pub fn from_record(record: &AmiRecord) -> Option<Self> {
        let interface = record
            .get_non_empty("interface")
            .or_else(|| record.get_non_empty("location"))
            .or_else(|| record.get_non_empty("stateinterface"))?;
        let member_id = member_id_from_interface(interface)?.to_string();

        let name = record
            .get_non_empty("membername")
            .or_else(|| record.get_non_empty("name"))
            .unwrap_or(&member_id)
            .to_string();

        Some(Self {
            name,
            member_type: record
                .get("membership")
                .and_then(MemberType::from_str)
                .unwrap_or(MemberType::Static),
            paused: record.get_flag("paused"),
            pause_reason: record.get_or("pausedreason", ""),
            calls_taken: record.get_number("callstaken").unwrap_or(0),
            last_call: record.get_number("lastcall").unwrap_or(0),
            member_id,
        })
    }

    fn to_member(&self, queue_id: &str) -> QueueMember {
        let mut member = QueueMember::new(&self.member_id, queue_id, &self.name, self.member_type);
        member.paused = self.paused;
        member.pause_reason = self.pause_reason.clone();
        member.calls_taken = self.calls_taken;
        member.last_call = self.last_call;
        member.logged_in = true;
        member
    }
}

/// Full queue status as returned by a detail refresh
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub queue_id: String,
    pub stats: Option<QueueStats>,
    pub members: Vec<MemberReport>,
    pub entries: Vec<QueueWaitingCaller>,
}

pub fn stats_from_record(record: &AmiRecord) -> QueueStats {
    QueueStats {
        avg_hold_time: record.get_number("holdtime").unwrap_or(0),
        avg_talk_time: record.get_number("talktime").unwrap_or(0),
        completed: record.get_number("completed").unwrap_or(0),
        abandoned: record.get_number("abandoned").unwrap_or(0),
        service_level_window: record.get_number("servicelevel").unwrap_or(0),
        service_level_perf: record.get_number("servicelevelperf").unwrap_or(0.0),
    }
}

pub fn waiting_caller_from_record(record: &AmiRecord) -> Option<QueueWaitingCaller> {
    Some(QueueWaitingCaller {
        channel: record.channel()?.to_string(),
        queue_id: record.queue()?.to_string(),
        position: record.get_number("position").unwrap_or(0),
        caller_num: record.get_or("calleridnum", ""),
        caller_name: record.get_or("calleridname", ""),
        wait_seconds: record.get_number("wait").unwrap_or(0),
    })
}

/// `Local/214@from-queue/n`, `PJSIP/214` -> `214`
pub fn member_id_from_interface(interface: &str) -> Option<&str> {
    let rest = interface.split_once('/').map_or(interface, |(_, r)| r);
    let id = rest.split(['@', '/']).next()?.trim();
    if id.is_empty() {
        None
    } else {
        Some(id)
    }
}

/// Apply a full detail refresh
///
/// Reported members are (re)inserted as logged in. Configured dynamic
/// members that were not reported are listed as logged out and unpaused.
/// Anything else not reported is dropped.
pub fn apply_snapshot(
    queue: &mut Queue,
    snapshot: &QueueSnapshot,
    dynamic_members: &[String],
    now: DateTime<Utc>,
) {
    if let Some(stats) = &snapshot.stats {
        queue.stats = stats.clone();
    }

    let reported: Vec<&str> = snapshot.members.iter().map(|m| m.member_id.as_str()).collect();

    for report in &snapshot.members {
        upsert_reported(queue, report, now);
    }

    for member_id in dynamic_members {
        if reported.contains(&member_id.as_str()) {
            continue;
        }
        match queue.member_mut(member_id) {
            Some(member) => member.log_out(now),
            None => {
                let member = QueueMember::new(member_id, &queue.id, member_id, MemberType::Dynamic);
                queue.upsert_member(member);
            }
        }
    }

    queue.members.retain(|id, _| {
        reported.contains(&id.as_str()) || dynamic_members.iter().any(|d| d == id)
    });

    queue.set_waiting_callers(snapshot.entries.clone());
}

fn upsert_reported(queue: &mut Queue, report: &MemberReport, now: DateTime<Utc>) {
    match queue.member_mut(&report.member_id) {
        Some(member) => {
            member.name = report.name.clone();
            member.member_type = report.member_type;
            member.logged_in = true;
            member.calls_taken = report.calls_taken;
            member.last_call = report.last_call;
            member.set_paused(report.paused, &report.pause_reason, now);
        }
        None => {
            let member = report.to_member(&queue.id);
            queue.upsert_member(member);
        }
    }
}

/// Live "member added"; returns true when the member was inserted
pub fn member_added(
    queue: &mut Queue,
    report: &MemberReport,
    dynamic_members: &[String],
    now: DateTime<Utc>,
) -> bool {
    let allowed = report.member_type == MemberType::Static
        || dynamic_members.iter().any(|d| d == &report.member_id);
    if !allowed {
        debug!(
            "Ignoring unconfigured {:?} member {} on queue {}",
            report.member_type, report.member_id, queue.id
        );
        return false;
    }
    upsert_reported(queue, report, now);
    true
}

/// Live "member status"; returns false when nothing observable changed
pub fn member_status(queue: &mut Queue, report: &MemberReport, now: DateTime<Utc>) -> bool {
    let Some(member) = queue.member_mut(&report.member_id) else {
        return false;
    };

    if member.paused == report.paused
        && member.calls_taken == report.calls_taken
        && member.last_call == report.last_call
    {
        return false;
    }

    member.calls_taken = report.calls_taken;
    member.last_call = report.last_call;
    member.logged_in = true;
    member.set_paused(report.paused, &report.pause_reason, now);
    true
}

/// Live "member removed": kept in the map, logged out and unpaused
pub fn member_removed(queue: &mut Queue, member_id: &str, now: DateTime<Utc>) -> bool {
    match queue.member_mut(member_id) {
        Some(member) => {
            member.log_out(now);
            true
        }
        None => false,
    }
}

/// Live "member pause"; returns true on change
pub fn member_paused(
    queue: &mut Queue,
    member_id: &str,
    paused: bool,
    reason: &str,
    now: DateTime<Utc>,
) -> bool {
    match queue.member_mut(member_id) {
        Some(member) if member.paused != paused || member.pause_reason != reason => {
            member.set_paused(paused, reason, now);
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(id: &str, member_type: MemberType) -> MemberReport {
        MemberReport {
            member_id: id.to_string(),
            name: format!("Agent {}", id),
            member_type,
            paused: false,
            pause_reason: String::new(),
            calls_taken: 0,
            last_call: 0,
        }
    }

    fn dynamic(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_member_id_from_interface() {
        assert_eq!(member_id_from_interface("Local/214@from-queue/n"), Some("214"));
        assert_eq!(member_id_from_interface("PJSIP/214"), Some("214"));
        assert_eq!(member_id_from_interface("214"), Some("214"));
        assert_eq!(member_id_from_interface("PJSIP/"), None);
    }

    #[test]
    fn test_snapshot_lists_configured_dynamic_members_logged_out() {
        let mut queue = Queue::new("401", "Support");
        let snapshot = QueueSnapshot {
            queue_id: "401".to_string(),
            stats: None,
            members: vec![report("214", MemberType::Static)],
            entries: vec![],
        };

        apply_snapshot(&mut queue, &snapshot, &dynamic(&["221"]), Utc::now());

        assert!(queue.member("214").unwrap().logged_in);
        let configured = queue.member("221").unwrap();
        assert!(!configured.logged_in);
        assert!(!configured.paused);
        assert_eq!(configured.member_type, MemberType::Dynamic);
    }

    #[test]
    fn test_snapshot_drops_stale_unconfigured_members() {
        let mut queue = Queue::new("401", "Support");
        queue.upsert_member(report("300", MemberType::Dynamic).to_member("401"));

        apply_snapshot(&mut queue, &QueueSnapshot::default(), &[], Utc::now());
        assert!(queue.member("300").is_none());
    }

    #[test]
    fn test_add_is_idempotent_and_remove_keeps_counters() {
        let mut queue = Queue::new("401", "Support");
        let configured = dynamic(&["221"]);
        let mut added = report("221", MemberType::Dynamic);
        added.calls_taken = 7;

        assert!(member_added(&mut queue, &added, &configured, Utc::now()));
        assert!(member_added(&mut queue, &added, &configured, Utc::now()));
        assert_eq!(queue.members.len(), 1);

        assert!(member_removed(&mut queue, "221", Utc::now()));
        let member = queue.member("221").unwrap();
        assert!(!member.logged_in);
        assert_eq!(member.calls_taken, 7);
    }

    #[test]
    fn test_add_rejects_unconfigured_dynamic() {
        let mut queue = Queue::new("401", "Support");
        assert!(!member_added(&mut queue, &report("999", MemberType::Dynamic), &[], Utc::now()));
        assert!(member_added(&mut queue, &report("214", MemberType::Static), &[], Utc::now()));
        assert_eq!(queue.members.len(), 1);
    }

    #[test]
    fn test_status_noop_when_unchanged() {
        let mut queue = Queue::new("401", "Support");
        let r = report("214", MemberType::Static);
        member_added(&mut queue, &r, &[], Utc::now());

        assert!(!member_status(&mut queue, &r, Utc::now()));

        let mut busy = r.clone();
        busy.calls_taken = 1;
        busy.last_call = 1_700_000_000;
        assert!(member_status(&mut queue, &busy, Utc::now()));
        assert_eq!(queue.member("214").unwrap().calls_taken, 1);
    }

    #[test]
    fn test_pause_stamps() {
        let mut queue = Queue::new("401", "Support");
        member_added(&mut queue, &report("214", MemberType::Static), &[], Utc::now());

        assert!(member_paused(&mut queue, "214", true, "lunch", Utc::now()));
        assert!(!member_paused(&mut queue, "214", true, "lunch", Utc::now()));
        let member = queue.member("214").unwrap();
        assert!(member.paused);
        assert!(member.last_pause_start.is_some());
        assert!(!member_paused(&mut queue, "999", true, "", Utc::now()));
    }

    #[test]
    fn test_report_from_record() {
        let record = AmiRecord::from_pairs(&[
            ("Event", "QueueMember"),
            ("Queue", "401"),
            ("Name", "Alice"),
            ("Location", "Local/214@from-queue/n"),
            ("Membership", "dynamic"),
            ("CallsTaken", "3"),
            ("LastCall", "1700000000"),
            ("Paused", "1"),
            ("PausedReason", "break"),
        ]);
        let r = MemberReport::from_record(&record).unwrap();
        assert_eq!(r.member_id, "214");
        assert_eq!(r.name, "Alice");
        assert_eq!(r.member_type, MemberType::Dynamic);
        assert!(r.paused);
        assert_eq!(r.calls_taken, 3);
    }
}
