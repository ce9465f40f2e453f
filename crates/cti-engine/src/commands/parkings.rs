//! Parking commands
//!
//! A parking lot is exposed as one [`cti_core::models::Parking`] per space,
//! since a space holds exactly one call.

use chrono::{Duration, Utc};
use cti_ami::{AmiAction, AmiRecord};
use cti_core::models::ParkedCaller;

use super::{events_named, names, CommandArgs, CommandOutput, CommandPlugin, ParkingInfo};
use crate::error::CommandError;

/// Spaces listed per lot at most
const MAX_SPACES_PER_LOT: u64 = 500;

const DEFAULT_PARKING_TIMEOUT_SECS: u64 = 45;

pub struct ListParkings;

impl CommandPlugin for ListParkings {
    fn name(&self) -> &'static str {
        names::LIST_PARKINGS
    }

    fn action(&self, _args: &CommandArgs) -> Result<AmiAction, CommandError> {
        Ok(AmiAction::new("Parkinglots"))
    }

    fn terminal_event(&self) -> Option<&'static str> {
        Some("ParkinglotsComplete")
    }

    fn collect(&self, records: Vec<AmiRecord>) -> Result<CommandOutput, CommandError> {
        let spaces = events_named(&records, "Parkinglot")
            .flat_map(spaces_of_lot)
            .collect();
        Ok(CommandOutput::Parkings(spaces))
    }
}

fn spaces_of_lot(lot: &AmiRecord) -> Vec<ParkingInfo> {
    let name = lot.get_or("name", "default");
    let timeout_secs = lot
        .get_number("timeout")
        .unwrap_or(DEFAULT_PARKING_TIMEOUT_SECS);
    let (Some(start), Some(stop)) = (
        lot.get_number::<u64>("startspace"),
        lot.get_number::<u64>("stopspace"),
    ) else {
        return Vec::new();
    };

    (start..=stop.min(start + MAX_SPACES_PER_LOT - 1))
        .map(|space| ParkingInfo {
            id: space.to_string(),
            name: format!("{} {}", name, space),
            timeout_secs,
        })
        .collect()
}

/// Calls currently parked
///
/// Some PBX versions close this list with an untagged completion event; the
/// dispatcher routes it here.
pub struct ListParkedCalls;

impl CommandPlugin for ListParkedCalls {
    fn name(&self) -> &'static str {
        names::LIST_PARKED_CALLS
    }

    fn action(&self, _args: &CommandArgs) -> Result<AmiAction, CommandError> {
        Ok(AmiAction::new("ParkedCalls"))
    }

    fn terminal_event(&self) -> Option<&'static str> {
        Some("ParkedCallsComplete")
    }

    fn collect(&self, records: Vec<AmiRecord>) -> Result<CommandOutput, CommandError> {
        Ok(CommandOutput::ParkedCalls(
            events_named(&records, "ParkedCall")
                .filter_map(parked_caller_from_record)
                .collect(),
        ))
    }
}

/// Parked call from a listing entry or a `ParkedCall` event
///
/// Accepts both the `Parkee*` field set and the older plain one.
pub fn parked_caller_from_record(record: &AmiRecord) -> Option<ParkedCaller> {
    let field = |modern: &str, legacy: &str| {
        record
            .get_non_empty(modern)
            .or_else(|| record.get_non_empty(legacy))
            .map(str::to_string)
    };

    let parking_id = field("parkingspace", "exten")?;
    let channel = field("parkeechannel", "channel")?;
    let timeout_secs: u64 = record
        .get_number("parkingtimeout")
        .or_else(|| record.get_number("timeout"))
        .unwrap_or(DEFAULT_PARKING_TIMEOUT_SECS);
    let elapsed: i64 = record.get_number("parkingduration").unwrap_or(0);

    Some(ParkedCaller {
        parking_id,
        channel,
        caller_num: field("parkeecalleridnum", "calleridnum").unwrap_or_default(),
        caller_name: field("parkeecalleridname", "calleridname").unwrap_or_default(),
        parker_channel: field("parkerdialstring", "from").unwrap_or_default(),
        timeout_secs,
        parked_at: Utc::now() - Duration::seconds(elapsed),
    })
}
