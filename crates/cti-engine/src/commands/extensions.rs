//! Extension commands: device details, hint state, DND and call forwarding
//!
//! DND and call-forward settings live in the PBX database (`DND/<ext>`,
//! `CF/<ext>`, `CFB/<ext>`, `CFU/<ext>`). A missing key is a normal answer
//! meaning "off", not a failure.

use cti_ami::{AmiAction, AmiRecord};
use cti_core::config::AppConfig;
use cti_core::models::{DeviceDetails, ExtensionStatus, ForwardKind, ForwardTarget};
use cti_core::AppResult;
use std::sync::Arc;

use super::{events_named, fold_record, names, refused, CommandArgs, CommandOutput, CommandPlugin, Progress};
use crate::channel::contact_address;
use crate::error::CommandError;
use crate::store::{DomainStore, Scope};

/// Value stored under `DND/<ext>` while do-not-disturb is on
pub const DND_VALUE: &str = "YES";

fn is_not_found(record: &AmiRecord) -> bool {
    record.is_error()
        && record
            .message()
            .map_or(false, |m| m.to_lowercase().contains("not found"))
}

fn forward_kind(args: &CommandArgs) -> Result<ForwardKind, CommandError> {
    let raw = args.string("kind")?;
    ForwardKind::from_str(&raw).ok_or_else(|| CommandError::invalid(format!("unknown forward kind '{}'", raw)))
}

/// `{"to": "0721..."}`, `{"to": "214", "voicemail": true}`, or no `to` for off
pub fn forward_target(args: &CommandArgs) -> ForwardTarget {
    match args.opt_string("to") {
        None => ForwardTarget::Off,
        Some(to) if args.flag("voicemail") => ForwardTarget::Voicemail(to),
        Some(to) => ForwardTarget::Number(to),
    }
}

fn db_get(family: &str, key: String) -> AmiAction {
    AmiAction::new("DBGet").field("Family", family).field("Key", key)
}

fn db_value(records: &[AmiRecord]) -> Option<String> {
    events_named(records, "DBGetResponse")
        .find_map(|r| r.get_non_empty("val"))
        .map(str::to_string)
}

/// `DBPut` for a value, `DBDel` for none
fn db_write(family: &str, key: String, value: Option<String>) -> AmiAction {
    match value {
        Some(val) => AmiAction::new("DBPut")
            .field("Family", family)
            .field("Key", key)
            .field("Val", val),
        None => AmiAction::new("DBDel").field("Family", family).field("Key", key),
    }
}

/// Completion of a database write; deleting a missing key is fine
fn db_write_progress(record: AmiRecord) -> Progress {
    if is_not_found(&record) {
        Progress::Done(CommandOutput::Done)
    } else if record.is_error() {
        Progress::Failed(refused(&record))
    } else if record.is_response() {
        Progress::Done(CommandOutput::Done)
    } else {
        Progress::Pending
    }
}

/// Endpoint details of a pjsip extension
pub struct ExtenDetails;

impl CommandPlugin for ExtenDetails {
    fn name(&self) -> &'static str {
        names::EXTEN_DETAILS
    }

    fn action(&self, args: &CommandArgs) -> Result<AmiAction, CommandError> {
        Ok(AmiAction::new("PJSIPShowEndpoint").field("Endpoint", args.string("exten")?))
    }

    fn terminal_event(&self) -> Option<&'static str> {
        Some("EndpointDetailComplete")
    }

    fn collect(&self, records: Vec<AmiRecord>) -> Result<CommandOutput, CommandError> {
        Ok(CommandOutput::Device(device_from_records(&records)))
    }

    fn apply(&self, args: &CommandArgs, output: &CommandOutput, store: &mut DomainStore) -> AppResult<()> {
        if let CommandOutput::Device(device) = output {
            let device = device.clone();
            store.update_extension(Scope::Live, &args.string("exten")?, move |e| {
                let changed = e.device != device;
                e.device = device.clone();
                changed
            })?;
        }
        Ok(())
    }
}

/// Fold the endpoint, auth and contact detail events of one endpoint
pub fn device_from_records(records: &[AmiRecord]) -> DeviceDetails {
    let mut device = DeviceDetails::default();

    if let Some(endpoint) = events_named(records, "EndpointDetail").next() {
        device.codecs = endpoint
            .get("allow")
            .map(parse_codecs)
            .unwrap_or_default();
    }

    if let Some(auth) = events_named(records, "AuthDetail").next() {
        device.username = auth.get_or("username", "");
    }

    if let Some(contact) = events_named(records, "ContactStatusDetail").next() {
        let address = contact
            .get_non_empty("viaaddress")
            .and_then(contact_address)
            .or_else(|| contact.get("uri").and_then(contact_address));
        if let Some((ip, port)) = address {
            device.ip = ip;
            device.port = port;
        }
        device.user_agent = contact.get_or("useragent", "");
    }

    device
}

/// `(ulaw|alaw|g722)` -> `["ulaw", "alaw", "g722"]`
fn parse_codecs(raw: &str) -> Vec<String> {
    raw.trim_matches(|c| c == '(' || c == ')')
        .split(['|', ','])
        .map(str::trim)
        .filter(|c| !c.is_empty() && *c != "nothing")
        .map(str::to_string)
        .collect()
}

/// Hint state lookup
pub struct ExtenStatus {
    config: Arc<AppConfig>,
}

impl ExtenStatus {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self { config }
    }
}

impl CommandPlugin for ExtenStatus {
    fn name(&self) -> &'static str {
        names::EXTEN_STATUS
    }

    fn action(&self, args: &CommandArgs) -> Result<AmiAction, CommandError> {
        Ok(AmiAction::new("ExtensionState")
            .field("Exten", args.string("exten")?)
            .field(
                "Context",
                args.opt_string("context")
                    .unwrap_or_else(|| self.config.pbx.hint_context.clone()),
            ))
    }

    fn collect(&self, records: Vec<AmiRecord>) -> Result<CommandOutput, CommandError> {
        let code = records
            .last()
            .and_then(|r| r.get_number::<i32>("status"))
            .unwrap_or(-1);
        Ok(CommandOutput::ExtenStatus(ExtensionStatus::from_hint_code(code)))
    }

    fn apply(&self, args: &CommandArgs, output: &CommandOutput, store: &mut DomainStore) -> AppResult<()> {
        if let CommandOutput::ExtenStatus(status) = output {
            let status = *status;
            store.update_extension(Scope::Live, &args.string("exten")?, move |e| e.set_status(status))?;
        }
        Ok(())
    }
}

pub struct GetDnd;

impl CommandPlugin for GetDnd {
    fn name(&self) -> &'static str {
        names::GET_DND
    }

    fn action(&self, args: &CommandArgs) -> Result<AmiAction, CommandError> {
        Ok(db_get("DND", args.string("exten")?))
    }

    fn terminal_event(&self) -> Option<&'static str> {
        Some("DBGetResponse")
    }

    fn collect(&self, records: Vec<AmiRecord>) -> Result<CommandOutput, CommandError> {
        Ok(CommandOutput::Flag(db_value(&records).is_some()))
    }

    fn on_record(&self, scratch: &mut Vec<AmiRecord>, record: AmiRecord) -> Progress {
        if is_not_found(&record) {
            return Progress::Done(CommandOutput::Flag(false));
        }
        fold_record(self, scratch, record)
    }
}

pub struct SetDnd;

impl CommandPlugin for SetDnd {
    fn name(&self) -> &'static str {
        names::SET_DND
    }

    fn action(&self, args: &CommandArgs) -> Result<AmiAction, CommandError> {
        let value = args.flag("enabled").then(|| DND_VALUE.to_string());
        Ok(db_write("DND", args.string("exten")?, value))
    }

    fn on_record(&self, _scratch: &mut Vec<AmiRecord>, record: AmiRecord) -> Progress {
        db_write_progress(record)
    }

    fn apply(&self, args: &CommandArgs, _output: &CommandOutput, store: &mut DomainStore) -> AppResult<()> {
        let enabled = args.flag("enabled");
        store.update_extension(Scope::Live, &args.string("exten")?, move |e| e.set_dnd(enabled))?;
        Ok(())
    }
}

pub struct GetCallForward;

impl CommandPlugin for GetCallForward {
    fn name(&self) -> &'static str {
        names::GET_CALL_FORWARD
    }

    fn action(&self, args: &CommandArgs) -> Result<AmiAction, CommandError> {
        Ok(db_get(forward_kind(args)?.db_family(), args.string("exten")?))
    }

    fn terminal_event(&self) -> Option<&'static str> {
        Some("DBGetResponse")
    }

    fn collect(&self, records: Vec<AmiRecord>) -> Result<CommandOutput, CommandError> {
        Ok(CommandOutput::Forward(db_value(&records)))
    }

    fn on_record(&self, scratch: &mut Vec<AmiRecord>, record: AmiRecord) -> Progress {
        if is_not_found(&record) {
            return Progress::Done(CommandOutput::Forward(None));
        }
        fold_record(self, scratch, record)
    }
}

/// Set or clear one forward condition
///
/// Number and voicemail share the same database key, so setting one always
/// replaces the other.
pub struct SetCallForward;

impl CommandPlugin for SetCallForward {
    fn name(&self) -> &'static str {
        names::SET_CALL_FORWARD
    }

    fn action(&self, args: &CommandArgs) -> Result<AmiAction, CommandError> {
        let kind = forward_kind(args)?;
        Ok(db_write(
            kind.db_family(),
            args.string("exten")?,
            forward_target(args).to_db_value(),
        ))
    }

    fn on_record(&self, _scratch: &mut Vec<AmiRecord>, record: AmiRecord) -> Progress {
        db_write_progress(record)
    }

    fn apply(&self, args: &CommandArgs, _output: &CommandOutput, store: &mut DomainStore) -> AppResult<()> {
        let kind = forward_kind(args)?;
        let target = forward_target(args);
        store.update_extension(Scope::Live, &args.string("exten")?, move |e| e.set_forward(kind, &target))?;
        Ok(())
    }
}
