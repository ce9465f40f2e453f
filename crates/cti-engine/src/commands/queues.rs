//! Queue commands

use chrono::Utc;
use cti_ami::{AmiAction, AmiRecord};
use cti_core::config::AppConfig;
use cti_core::AppResult;
use std::collections::BTreeSet;
use std::sync::Arc;

use super::{events_named, names, CommandArgs, CommandOutput, CommandPlugin};
use crate::error::CommandError;
use crate::queues::{apply_snapshot, stats_from_record, waiting_caller_from_record, MemberReport, QueueSnapshot};
use crate::store::{DomainStore, Scope};

/// Ids of every queue the PBX knows
pub struct ListQueues;

impl CommandPlugin for ListQueues {
    fn name(&self) -> &'static str {
        names::LIST_QUEUES
    }

    fn action(&self, _args: &CommandArgs) -> Result<AmiAction, CommandError> {
        Ok(AmiAction::new("QueueSummary"))
    }

    fn terminal_event(&self) -> Option<&'static str> {
        Some("QueueSummaryComplete")
    }

    fn collect(&self, records: Vec<AmiRecord>) -> Result<CommandOutput, CommandError> {
        let ids: BTreeSet<String> = events_named(&records, "QueueSummary")
            .filter_map(|r| r.queue())
            .filter(|q| *q != "default")
            .map(str::to_string)
            .collect();
        Ok(CommandOutput::Queues(ids.into_iter().collect()))
    }
}

/// Parameters, members and waiting callers of one queue
pub struct QueueDetails;

impl CommandPlugin for QueueDetails {
    fn name(&self) -> &'static str {
        names::QUEUE_DETAILS
    }

    fn action(&self, args: &CommandArgs) -> Result<AmiAction, CommandError> {
        Ok(AmiAction::new("QueueStatus").field("Queue", args.string("queue")?))
    }

    fn terminal_event(&self) -> Option<&'static str> {
        Some("QueueStatusComplete")
    }

    fn collect(&self, records: Vec<AmiRecord>) -> Result<CommandOutput, CommandError> {
        let params = events_named(&records, "QueueParams").next();

        let snapshot = QueueSnapshot {
            queue_id: params
                .and_then(|r| r.queue())
                .or_else(|| records.iter().find_map(|r| r.queue()))
                .unwrap_or_default()
                .to_string(),
            stats: params.map(stats_from_record),
            members: events_named(&records, "QueueMember")
                .filter_map(MemberReport::from_record)
                .collect(),
            entries: events_named(&records, "QueueEntry")
                .filter_map(waiting_caller_from_record)
                .collect(),
        };
        Ok(CommandOutput::QueueDetails(snapshot))
    }

    fn apply(&self, args: &CommandArgs, output: &CommandOutput, store: &mut DomainStore) -> AppResult<()> {
        if let CommandOutput::QueueDetails(snapshot) = output {
            let id = args.string("queue")?;
            let snapshot = snapshot.clone();
            store.update_queue(Scope::Live, &id, move |queue, dynamic| {
                let before = queue.clone();
                apply_snapshot(queue, &snapshot, dynamic, Utc::now());
                *queue != before
            })?;
        }
        Ok(())
    }
}

/// Queue interface of a member: explicit `interface`, or the relay form
/// built from `member`
fn member_interface(config: &AppConfig, args: &CommandArgs) -> Result<String, CommandError> {
    if let Some(interface) = args.opt_string("interface") {
        return Ok(interface);
    }
    let member = args.string("member")?;
    Ok(format!("Local/{}{}/n", member, config.pbx.queue_relay_marker))
}

/// Dynamic login; the PBX confirms with a member-added event
pub struct MemberAdd {
    config: Arc<AppConfig>,
}

impl MemberAdd {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self { config }
    }
}

impl CommandPlugin for MemberAdd {
    fn name(&self) -> &'static str {
        names::QUEUE_MEMBER_ADD
    }

    fn action(&self, args: &CommandArgs) -> Result<AmiAction, CommandError> {
        let interface = member_interface(&self.config, args)?;
        Ok(AmiAction::new("QueueAdd")
            .field("Queue", args.string("queue")?)
            .field("Interface", interface)
            .field_opt("MemberName", args.opt_string("name"))
            .field_opt("Penalty", args.opt_string("penalty"))
            .field("Paused", if args.flag("paused") { "true" } else { "false" }))
    }
}

pub struct MemberRemove {
    config: Arc<AppConfig>,
}

impl MemberRemove {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self { config }
    }
}

impl CommandPlugin for MemberRemove {
    fn name(&self) -> &'static str {
        names::QUEUE_MEMBER_REMOVE
    }

    fn action(&self, args: &CommandArgs) -> Result<AmiAction, CommandError> {
        let interface = member_interface(&self.config, args)?;
        Ok(AmiAction::new("QueueRemove")
            .field("Queue", args.string("queue")?)
            .field("Interface", interface))
    }
}

/// Pause or unpause; without `queue` the PBX applies it to every queue
pub struct MemberPause {
    config: Arc<AppConfig>,
}

impl MemberPause {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self { config }
    }
}

impl CommandPlugin for MemberPause {
    fn name(&self) -> &'static str {
        names::QUEUE_MEMBER_PAUSE
    }

    fn action(&self, args: &CommandArgs) -> Result<AmiAction, CommandError> {
        let interface = member_interface(&self.config, args)?;
        Ok(AmiAction::new("QueuePause")
            .field("Interface", interface)
            .field("Paused", if args.flag("paused") { "true" } else { "false" })
            .field_opt("Queue", args.opt_string("queue"))
            .field_opt("Reason", args.opt_string("reason")))
    }
}
