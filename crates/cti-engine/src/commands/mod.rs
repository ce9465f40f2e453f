//! Command plugins
//!
//! Every command the proxy can send to the PBX is one [`CommandPlugin`]
//! registered in [`CommandRegistry`]. A plugin builds the action from the
//! caller's arguments, folds the correlated records into a result, and may
//! write the outcome back into the model.
//!
//! Adding a command means adding one plugin type and one `register` line.

use cti_ami::{AmiAction, AmiRecord};
use cti_core::config::AppConfig;
use cti_core::models::{DeviceDetails, ExtensionStatus, ParkedCaller, RegistrationState};
use cti_core::AppResult;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::channel::ChannelInfo;
use crate::error::CommandError;
use crate::queues::QueueSnapshot;
use crate::store::DomainStore;

pub mod channels;
pub mod extensions;
pub mod meetme;
pub mod parkings;
pub mod queues;
pub mod trunks;

/// Command names used internally
pub mod names {
    pub const LIST_CHANNELS: &str = "listChannels";
    pub const EXTEN_DETAILS: &str = "extenDetails";
    pub const EXTEN_STATUS: &str = "extenStatus";
    pub const GET_DND: &str = "getDnd";
    pub const SET_DND: &str = "setDnd";
    pub const GET_CALL_FORWARD: &str = "getCallForward";
    pub const SET_CALL_FORWARD: &str = "setCallForward";
    pub const LIST_QUEUES: &str = "listQueues";
    pub const QUEUE_DETAILS: &str = "queueDetails";
    pub const QUEUE_MEMBER_ADD: &str = "queueMemberAdd";
    pub const QUEUE_MEMBER_REMOVE: &str = "queueMemberRemove";
    pub const QUEUE_MEMBER_PAUSE: &str = "queueMemberPause";
    pub const LIST_PARKINGS: &str = "listParkings";
    pub const LIST_PARKED_CALLS: &str = "listParkedCalls";
    pub const PJSIP_REGISTRATIONS: &str = "pjsipRegistrations";
    pub const IAX_REGISTRATIONS: &str = "iaxRegistrations";
    pub const LIST_MEETME_CONF: &str = "listMeetmeConf";
    pub const HANGUP: &str = "hangup";
    pub const REDIRECT: &str = "redirect";
    pub const ORIGINATE: &str = "originate";
    pub const PARK: &str = "park";
    pub const START_RECORD: &str = "startRecord";
    pub const STOP_RECORD: &str = "stopRecord";
    pub const MUTE_RECORD: &str = "muteRecord";
    pub const UNMUTE_RECORD: &str = "unmuteRecord";
    pub const MEETME_MUTE: &str = "meetmeMute";
    pub const MEETME_UNMUTE: &str = "meetmeUnmute";
    pub const MEETME_KICK: &str = "meetmeKick";
}

/// Arguments of a command, as a JSON object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandArgs(Map<String, Value>);

impl CommandArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    /// String argument; numbers are accepted and stringified
    pub fn opt_string(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn string(&self, key: &str) -> Result<String, CommandError> {
        self.opt_string(key)
            .ok_or_else(|| CommandError::invalid(format!("missing argument '{}'", key)))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn flag(&self, key: &str) -> bool {
        match self.0.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => matches!(s.to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
            Some(Value::Number(n)) => n.as_i64() == Some(1),
            _ => false,
        }
    }
}

/// Parking lot space as listed by the PBX
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParkingInfo {
    pub id: String,
    pub name: String,
    pub timeout_secs: u64,
}

/// Outbound registration of one trunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub trunk_id: String,
    pub state: RegistrationState,
}

/// One conference participant as listed by the PBX
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetmeUserInfo {
    pub conference: String,
    pub user_id: String,
    pub caller_num: String,
    pub caller_name: String,
    pub channel: String,
    pub admin: bool,
    pub muted: bool,
}

/// Value produced by a completed command
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum CommandOutput {
    Done,
    Channels(Vec<ChannelInfo>),
    Device(DeviceDetails),
    ExtenStatus(ExtensionStatus),
    Flag(bool),
    Forward(Option<String>),
    Queues(Vec<String>),
    QueueDetails(QueueSnapshot),
    Parkings(Vec<ParkingInfo>),
    ParkedCalls(Vec<ParkedCaller>),
    Registrations(Vec<Registration>),
    Conferences(Vec<MeetmeUserInfo>),
}

fn unexpected(expected: &str, got: &CommandOutput) -> CommandError {
    CommandError::Unexpected(format!("expected {}, got {:?}", expected, got))
}

impl CommandOutput {
    pub fn into_channels(self) -> Result<Vec<ChannelInfo>, CommandError> {
        match self {
            CommandOutput::Channels(v) => Ok(v),
            other => Err(unexpected("channels", &other)),
        }
    }

    pub fn into_device(self) -> Result<DeviceDetails, CommandError> {
        match self {
            CommandOutput::Device(v) => Ok(v),
            other => Err(unexpected("device", &other)),
        }
    }

    pub fn into_exten_status(self) -> Result<ExtensionStatus, CommandError> {
        match self {
            CommandOutput::ExtenStatus(v) => Ok(v),
            other => Err(unexpected("extension status", &other)),
        }
    }

    pub fn into_flag(self) -> Result<bool, CommandError> {
        match self {
            CommandOutput::Flag(v) => Ok(v),
            other => Err(unexpected("flag", &other)),
        }
    }

    pub fn into_forward(self) -> Result<Option<String>, CommandError> {
        match self {
            CommandOutput::Forward(v) => Ok(v),
            other => Err(unexpected("forward", &other)),
        }
    }

    pub fn into_queues(self) -> Result<Vec<String>, CommandError> {
        match self {
            CommandOutput::Queues(v) => Ok(v),
            other => Err(unexpected("queues", &other)),
        }
    }

    pub fn into_queue_details(self) -> Result<QueueSnapshot, CommandError> {
        match self {
            CommandOutput::QueueDetails(v) => Ok(v),
            other => Err(unexpected("queue details", &other)),
        }
    }

    pub fn into_parkings(self) -> Result<Vec<ParkingInfo>, CommandError> {
        match self {
            CommandOutput::Parkings(v) => Ok(v),
            other => Err(unexpected("parkings", &other)),
        }
    }

    pub fn into_parked_calls(self) -> Result<Vec<ParkedCaller>, CommandError> {
        match self {
            CommandOutput::ParkedCalls(v) => Ok(v),
            other => Err(unexpected("parked calls", &other)),
        }
    }

    pub fn into_registrations(self) -> Result<Vec<Registration>, CommandError> {
        match self {
            CommandOutput::Registrations(v) => Ok(v),
            other => Err(unexpected("registrations", &other)),
        }
    }

    pub fn into_conferences(self) -> Result<Vec<MeetmeUserInfo>, CommandError> {
        match self {
            CommandOutput::Conferences(v) => Ok(v),
            other => Err(unexpected("conferences", &other)),
        }
    }
}

/// State of a correlated command after one record
#[derive(Debug)]
pub enum Progress {
    Pending,
    Done(CommandOutput),
    Failed(CommandError),
}

impl From<Result<CommandOutput, CommandError>> for Progress {
    fn from(result: Result<CommandOutput, CommandError>) -> Self {
        match result {
            Ok(output) => Progress::Done(output),
            Err(err) => Progress::Failed(err),
        }
    }
}

pub fn refused(record: &AmiRecord) -> CommandError {
    CommandError::Failed(record.message().unwrap_or("request refused").to_string())
}

pub trait CommandPlugin: Send + Sync {
    fn name(&self) -> &'static str;

    fn action(&self, args: &CommandArgs) -> Result<AmiAction, CommandError>;

    /// Event closing a list-style reply; `None` for single-response commands
    fn terminal_event(&self) -> Option<&'static str> {
        None
    }

    /// Fold the collected records, terminal record last
    fn collect(&self, records: Vec<AmiRecord>) -> Result<CommandOutput, CommandError> {
        let _ = records;
        Ok(CommandOutput::Done)
    }

    /// Feed one correlated record
    fn on_record(&self, scratch: &mut Vec<AmiRecord>, record: AmiRecord) -> Progress {
        fold_record(self, scratch, record)
    }

    /// Write a successful outcome back into the model
    fn apply(&self, args: &CommandArgs, output: &CommandOutput, store: &mut DomainStore) -> AppResult<()> {
        let _ = (args, output, store);
        Ok(())
    }
}

/// Standard folding: an error response fails the command, single-response
/// commands finish on their response, list commands buffer events until the
/// terminal one.
pub fn fold_record<P: CommandPlugin + ?Sized>(plugin: &P, scratch: &mut Vec<AmiRecord>, record: AmiRecord) -> Progress {
    if record.is_error() {
        return Progress::Failed(refused(&record));
    }

    match plugin.terminal_event() {
        None if record.is_response() => plugin.collect(vec![record]).into(),
        None => Progress::Pending,
        Some(terminal) => {
            let is_terminal = record
                .event_name()
                .map_or(false, |e| e.eq_ignore_ascii_case(terminal));
            if is_terminal {
                let mut records = std::mem::take(scratch);
                records.push(record);
                plugin.collect(records).into()
            } else {
                if record.is_event() {
                    scratch.push(record);
                }
                Progress::Pending
            }
        }
    }
}

/// Records of `records` whose event name is `name`
pub(crate) fn events_named<'a>(records: &'a [AmiRecord], name: &'a str) -> impl Iterator<Item = &'a AmiRecord> {
    records
        .iter()
        .filter(move |r| r.event_name().map_or(false, |e| e.eq_ignore_ascii_case(name)))
}

/// Compile-time table of every supported command
pub struct CommandRegistry {
    plugins: HashMap<&'static str, Arc<dyn CommandPlugin>>,
}

impl CommandRegistry {
    pub fn empty() -> Self {
        Self {
            plugins: HashMap::new(),
        }
    }

    pub fn new(config: Arc<AppConfig>) -> Self {
        let mut registry = Self::empty();

        registry.register(Arc::new(channels::ListChannels::new(Arc::clone(&config))));
        registry.register(Arc::new(channels::Hangup));
        registry.register(Arc::new(channels::Redirect));
        registry.register(Arc::new(channels::Originate));
        registry.register(Arc::new(channels::Park));
        for op in channels::RecordOp::ALL {
            registry.register(Arc::new(channels::Record(op)));
        }

        registry.register(Arc::new(extensions::ExtenDetails));
        registry.register(Arc::new(extensions::ExtenStatus::new(Arc::clone(&config))));
        registry.register(Arc::new(extensions::GetDnd));
        registry.register(Arc::new(extensions::SetDnd));
        registry.register(Arc::new(extensions::GetCallForward));
        registry.register(Arc::new(extensions::SetCallForward));

        registry.register(Arc::new(queues::ListQueues));
        registry.register(Arc::new(queues::QueueDetails));
        registry.register(Arc::new(queues::MemberAdd::new(Arc::clone(&config))));
        registry.register(Arc::new(queues::MemberRemove::new(Arc::clone(&config))));
        registry.register(Arc::new(queues::MemberPause::new(Arc::clone(&config))));

        registry.register(Arc::new(parkings::ListParkings));
        registry.register(Arc::new(parkings::ListParkedCalls));

        registry.register(Arc::new(trunks::PjsipRegistrations::new(Arc::clone(&config))));
        registry.register(Arc::new(trunks::IaxRegistrations::new(Arc::clone(&config))));

        registry.register(Arc::new(meetme::ListMeetmeConf));
        for op in meetme::MeetmeOp::ALL {
            registry.register(Arc::new(meetme::MeetmeAction(op)));
        }

        registry
    }

    pub fn register(&mut self, plugin: Arc<dyn CommandPlugin>) {
        self.plugins.insert(plugin.name(), plugin);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn CommandPlugin>> {
        self.plugins.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.plugins.keys().copied().collect();
        names.sort_unstable();
        names
    }
}
