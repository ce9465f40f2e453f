//! Channel commands: listing, call control and recording

use chrono::Utc;
use cti_ami::{AmiAction, AmiRecord};
use cti_core::config::AppConfig;
use cti_core::models::RecordingState;
use cti_core::{AppError, AppResult};
use std::collections::HashMap;
use std::sync::Arc;

use super::{events_named, names, CommandArgs, CommandOutput, CommandPlugin};
use crate::channel::ChannelInfo;
use crate::error::CommandError;
use crate::store::DomainStore;

/// Full active channel list
pub struct ListChannels {
    config: Arc<AppConfig>,
}

impl ListChannels {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self { config }
    }
}

impl CommandPlugin for ListChannels {
    fn name(&self) -> &'static str {
        names::LIST_CHANNELS
    }

    fn action(&self, _args: &CommandArgs) -> Result<AmiAction, CommandError> {
        Ok(AmiAction::new("CoreShowChannels"))
    }

    fn terminal_event(&self) -> Option<&'static str> {
        Some("CoreShowChannelsComplete")
    }

    fn collect(&self, records: Vec<AmiRecord>) -> Result<CommandOutput, CommandError> {
        let mut channels: Vec<ChannelInfo> = events_named(&records, "CoreShowChannel")
            .filter_map(ChannelInfo::from_record)
            .collect();
        resolve_relay_queues(&mut channels, &self.config.pbx.queue_relay_marker);
        Ok(CommandOutput::Channels(channels))
    }
}

/// Fill `queue` on relay legs from the call waiting in the queue application
fn resolve_relay_queues(channels: &mut [ChannelInfo], marker: &str) {
    let by_linked: HashMap<String, String> = channels
        .iter()
        .filter_map(|c| {
            c.queue_app_target()
                .map(|q| (c.linked_id.clone(), q.to_string()))
        })
        .collect();

    for channel in channels.iter_mut().filter(|c| c.is_relay(marker)) {
        channel.queue = channel
            .queue_app_target()
            .map(str::to_string)
            .or_else(|| by_linked.get(&channel.linked_id).cloned());
    }
}

pub struct Hangup;

impl CommandPlugin for Hangup {
    fn name(&self) -> &'static str {
        names::HANGUP
    }

    fn action(&self, args: &CommandArgs) -> Result<AmiAction, CommandError> {
        Ok(AmiAction::new("Hangup")
            .field("Channel", args.string("channel")?)
            .field_opt("Cause", args.opt_string("cause")))
    }
}

/// Blind transfer
pub struct Redirect;

impl CommandPlugin for Redirect {
    fn name(&self) -> &'static str {
        names::REDIRECT
    }

    fn action(&self, args: &CommandArgs) -> Result<AmiAction, CommandError> {
        Ok(AmiAction::new("Redirect")
            .field("Channel", args.string("channel")?)
            .field_opt("ExtraChannel", args.opt_string("extra_channel"))
            .field("Exten", args.string("exten")?)
            .field("Context", args.string("context")?)
            .field("Priority", args.opt_string("priority").unwrap_or_else(|| "1".to_string())))
    }
}

/// Click-to-call; the PBX answers immediately and reports the call as events
pub struct Originate;

impl CommandPlugin for Originate {
    fn name(&self) -> &'static str {
        names::ORIGINATE
    }

    fn action(&self, args: &CommandArgs) -> Result<AmiAction, CommandError> {
        Ok(AmiAction::new("Originate")
            .field("Channel", args.string("channel")?)
            .field("Exten", args.string("exten")?)
            .field("Context", args.string("context")?)
            .field("Priority", args.opt_string("priority").unwrap_or_else(|| "1".to_string()))
            .field_opt("CallerID", args.opt_string("caller_id"))
            .field_opt("Timeout", args.opt_string("timeout_ms"))
            .field("Async", "true"))
    }
}

pub struct Park;

impl CommandPlugin for Park {
    fn name(&self) -> &'static str {
        names::PARK
    }

    fn action(&self, args: &CommandArgs) -> Result<AmiAction, CommandError> {
        Ok(AmiAction::new("Park")
            .field("Channel", args.string("channel")?)
            .field_opt("TimeoutChannel", args.opt_string("timeout_channel"))
            .field_opt("Timeout", args.opt_string("timeout_ms"))
            .field_opt("Parkinglot", args.opt_string("parkinglot")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOp {
    Start,
    Stop,
    Mute,
    Unmute,
}

impl RecordOp {
    pub const ALL: [RecordOp; 4] = [RecordOp::Start, RecordOp::Stop, RecordOp::Mute, RecordOp::Unmute];

    /// Recording state of the conversation once the PBX accepted the request
    pub fn resulting_state(&self) -> RecordingState {
        match self {
            RecordOp::Start | RecordOp::Unmute => RecordingState::Recording,
            RecordOp::Stop => RecordingState::None,
            RecordOp::Mute => RecordingState::Muted,
        }
    }
}

/// Recording control on one channel
///
/// The conversation holding the channel gets its recording state updated on
/// success, and the state survives later channel reconciliations.
pub struct Record(pub RecordOp);

fn recording_file(channel: &str) -> String {
    let base: String = channel
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    format!("{}-{}.wav", base, Utc::now().timestamp_millis())
}

impl CommandPlugin for Record {
    fn name(&self) -> &'static str {
        match self.0 {
            RecordOp::Start => names::START_RECORD,
            RecordOp::Stop => names::STOP_RECORD,
            RecordOp::Mute => names::MUTE_RECORD,
            RecordOp::Unmute => names::UNMUTE_RECORD,
        }
    }

    fn action(&self, args: &CommandArgs) -> Result<AmiAction, CommandError> {
        let channel = args.string("channel")?;
        let action = match self.0 {
            RecordOp::Start => AmiAction::new("MixMonitor")
                .field(
                    "File",
                    args.opt_string("file").unwrap_or_else(|| recording_file(&channel)),
                )
                .field_opt("Options", args.opt_string("options"))
                .field("Channel", channel),
            RecordOp::Stop => AmiAction::new("StopMixMonitor").field("Channel", channel),
            RecordOp::Mute | RecordOp::Unmute => AmiAction::new("MixMonitorMute")
                .field("Channel", channel)
                .field("Direction", "both")
                .field("State", if self.0 == RecordOp::Mute { "1" } else { "0" }),
        };
        Ok(action)
    }

    fn apply(&self, args: &CommandArgs, _output: &CommandOutput, store: &mut DomainStore) -> AppResult<()> {
        let channel = args.string("channel")?;
        let conversation = store
            .conversation_for_channel(&channel)
            .map(|c| c.id.clone())
            .ok_or_else(|| AppError::ConversationNotFound(channel.clone()))?;
        store.set_recording(&conversation, self.0.resulting_state())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::Progress;
    use crate::testing::test_config;

    fn core_show_channel(channel: &str, linked: &str, app: &str, data: &str) -> AmiRecord {
        AmiRecord::from_pairs(&[
            ("Event", "CoreShowChannel"),
            ("Channel", channel),
            ("UniqueID", "1700000000.1"),
            ("LinkedID", linked),
            ("ChannelStateDesc", "Up"),
            ("Application", app),
            ("ApplicationData", data),
        ])
    }

    #[test]
    fn test_list_channels_resolves_relay_queue() {
        let plugin = ListChannels::new(test_config());
        let mut scratch = Vec::new();

        let records = vec![
            AmiRecord::from_pairs(&[("Response", "Success"), ("EventList", "start")]),
            core_show_channel("PJSIP/provider-00000001", "L1", "Queue", "401,t"),
            core_show_channel("Local/221@from-queue-0000001;1", "L1", "AppQueue", ""),
            core_show_channel("Local/221@from-queue-0000001;2", "L1", "Dial", "PJSIP/221"),
            core_show_channel("PJSIP/214-00000002", "L2", "Dial", "PJSIP/300"),
        ];
        for record in records {
            assert!(matches!(plugin.on_record(&mut scratch, record), Progress::Pending));
        }

        let done = AmiRecord::from_pairs(&[("Event", "CoreShowChannelsComplete"), ("ListItems", "4")]);
        let channels = match plugin.on_record(&mut scratch, done) {
            Progress::Done(output) => output.into_channels().unwrap(),
            other => panic!("unexpected {:?}", other),
        };

        assert_eq!(channels.len(), 4);
        let relays: Vec<_> = channels.iter().filter(|c| c.is_relay("@from-queue")).collect();
        assert_eq!(relays.len(), 2);
        assert!(relays.iter().all(|c| c.queue.as_deref() == Some("401")));
        assert!(channels
            .iter()
            .filter(|c| !c.is_relay("@from-queue"))
            .all(|c| c.queue.is_none()));
    }

    #[test]
    fn test_call_control_actions() {
        let args = CommandArgs::new()
            .with("channel", "PJSIP/214-00000002")
            .with("exten", "300")
            .with("context", "from-internal");

        let redirect = Redirect.action(&args).unwrap();
        assert_eq!(redirect.name(), "Redirect");
        assert_eq!(redirect.get("Priority"), Some("1"));

        let originate = Originate.action(&args).unwrap();
        assert_eq!(originate.get("Async"), Some("true"));

        assert!(matches!(
            Hangup.action(&CommandArgs::new()),
            Err(CommandError::InvalidArgs(_))
        ));
    }

    #[test]
    fn test_record_actions() {
        let args = CommandArgs::new().with("channel", "PJSIP/214-00000002");

        let start = Record(RecordOp::Start).action(&args).unwrap();
        assert_eq!(start.name(), "MixMonitor");
        assert!(start.get("File").unwrap().ends_with(".wav"));

        let mute = Record(RecordOp::Mute).action(&args).unwrap();
        assert_eq!(mute.name(), "MixMonitorMute");
        assert_eq!(mute.get("State"), Some("1"));

        assert_eq!(RecordOp::Unmute.resulting_state(), RecordingState::Recording);
        assert_eq!(RecordOp::Stop.resulting_state(), RecordingState::None);
    }
}
