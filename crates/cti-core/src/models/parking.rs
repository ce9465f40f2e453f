//! Parking model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::privacy::Privacy;

/// A call held in a parking slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParkedCaller {
    pub parking_id: String,
    pub channel: String,
    pub caller_num: String,
    pub caller_name: String,
    /// Channel that parked the call
    pub parker_channel: String,
    /// Seconds left before the call returns to the parker
    pub timeout_secs: u64,
    pub parked_at: DateTime<Utc>,
}

/// Parking slot. Holds at most one call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parking {
    pub id: String,
    pub name: String,
    pub timeout_secs: u64,
    pub parked: Option<ParkedCaller>,
}

impl Parking {
    pub fn new(id: &str, name: &str, timeout_secs: u64) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            timeout_secs,
            parked: None,
        }
    }

    pub fn is_free(&self) -> bool {
        self.parked.is_none()
    }

    /// Park a call, replacing any stale occupant
    pub fn park(&mut self, caller: ParkedCaller) {
        self.parked = Some(caller);
    }

    /// Returns the call that was parked here, if any
    pub fn release(&mut self) -> Option<ParkedCaller> {
        self.parked.take()
    }

    pub fn snapshot(&self, privacy: Option<&Privacy>) -> serde_json::Value {
        let mut view = self.clone();
        if let (Some(privacy), Some(parked)) = (privacy, view.parked.as_mut()) {
            parked.caller_num = privacy.mask_number(&parked.caller_num, false);
        }
        serde_json::to_value(view).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_park_and_release() {
        let mut parking = Parking::new("71", "Parking 71", 45);
        assert!(parking.is_free());

        parking.park(ParkedCaller {
            parking_id: "71".to_string(),
            channel: "PJSIP/trunk-0001".to_string(),
            caller_num: "0721123456".to_string(),
            caller_name: "Customer".to_string(),
            parker_channel: "PJSIP/214-0002".to_string(),
            timeout_secs: 45,
            parked_at: Utc::now(),
        });
        assert!(!parking.is_free());
        assert_eq!(
            parking.snapshot(Some(&Privacy::default()))["parked"]["caller_num"],
            "0721123xxx"
        );

        let released = parking.release();
        assert_eq!(released.map(|c| c.channel), Some("PJSIP/trunk-0001".to_string()));
        assert!(parking.is_free());
    }
}
