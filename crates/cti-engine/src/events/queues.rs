//! Queue member and caller events

use async_trait::async_trait;
use chrono::Utc;
use cti_ami::{events, AmiRecord};
use cti_core::AppResult;
use tracing::debug;

use super::EventPlugin;
use crate::bus::Notification;
use crate::commands::{names, CommandArgs};
use crate::engine::EngineContext;
use crate::queues::{
    member_added, member_id_from_interface, member_paused, member_removed, member_status, MemberReport,
};
use crate::store::Scope;

#[derive(Debug)]
enum MemberChange {
    Added(MemberReport),
    Status(MemberReport),
    Removed(String),
    Paused { member_id: String, paused: bool, reason: String },
}

impl MemberChange {
    fn from_record(key: &str, record: &AmiRecord) -> Option<Self> {
        match key {
            "queuememberadded" => MemberReport::from_record(record).map(MemberChange::Added),
            "queuememberstatus" => MemberReport::from_record(record).map(MemberChange::Status),
            _ => {
                let interface = record
                    .get_non_empty("interface")
                    .or_else(|| record.get_non_empty("location"))?;
                let member_id = member_id_from_interface(interface)?.to_string();
                if key == "queuememberremoved" {
                    Some(MemberChange::Removed(member_id))
                } else {
                    Some(MemberChange::Paused {
                        member_id,
                        paused: record.get_flag("paused"),
                        reason: record
                            .get_non_empty("pausedreason")
                            .or_else(|| record.get_non_empty("reason"))
                            .unwrap_or_default()
                            .to_string(),
                    })
                }
            }
        }
    }

    fn member_id(&self) -> &str {
        match self {
            MemberChange::Added(r) | MemberChange::Status(r) => &r.member_id,
            MemberChange::Removed(id) | MemberChange::Paused { member_id: id, .. } => id,
        }
    }
}

/// Member added, removed, paused or updated
pub struct MemberEvents;

#[async_trait]
impl EventPlugin for MemberEvents {
    fn events(&self) -> &'static [&'static str] {
        &[
            events::QUEUE_MEMBER_ADDED,
            events::QUEUE_MEMBER_REMOVED,
            events::QUEUE_MEMBER_STATUS,
            events::QUEUE_MEMBER_PAUSE,
        ]
    }

    async fn on_record(&self, ctx: &EngineContext, record: &AmiRecord) -> AppResult<()> {
        let key = record.event_key().unwrap_or_default();
        let Some(queue_id) = record.queue().map(str::to_string) else {
            return Ok(());
        };
        let Some(change) = MemberChange::from_record(&key, record) else {
            debug!("{} without usable member interface dropped", key);
            return Ok(());
        };

        ctx.store()
            .update(move |s| {
                if s.queue(&queue_id).is_none() {
                    debug!("Member event for unknown queue {}", queue_id);
                    return Ok(());
                }

                let now = Utc::now();
                let changed = s.update_queue(Scope::Live, &queue_id, |queue, dynamic| match &change {
                    MemberChange::Added(report) => member_added(queue, report, dynamic, now),
                    MemberChange::Status(report) => member_status(queue, report, now),
                    MemberChange::Removed(id) => member_removed(queue, id, now),
                    MemberChange::Paused {
                        member_id,
                        paused,
                        reason,
                    } => member_paused(queue, member_id, *paused, reason, now),
                })?;

                if changed {
                    let member = s
                        .queue(&queue_id)
                        .and_then(|q| q.member(change.member_id()))
                        .cloned();
                    if let Some(member) = member {
                        s.publish(Notification::QueueMemberChanged(member));
                    }
                }
                Ok(())
            })
            .await?
    }
}

/// Waiting-caller changes trigger a full detail refresh of the queue
pub struct CallerEvents;

#[async_trait]
impl EventPlugin for CallerEvents {
    fn events(&self) -> &'static [&'static str] {
        &[
            events::QUEUE_CALLER_JOIN,
            events::QUEUE_CALLER_LEAVE,
            events::QUEUE_CALLER_ABANDON,
        ]
    }

    async fn on_record(&self, ctx: &EngineContext, record: &AmiRecord) -> AppResult<()> {
        if let Some(queue) = record.queue() {
            ctx.spawn_run(names::QUEUE_DETAILS, CommandArgs::new().with("queue", queue));
        }
        Ok(())
    }
}
