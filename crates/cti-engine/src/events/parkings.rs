//! Parking slot events

use async_trait::async_trait;
use cti_ami::{events, AmiRecord};
use cti_core::AppResult;
use tracing::debug;

use super::EventPlugin;
use crate::commands::parkings::parked_caller_from_record;
use crate::engine::EngineContext;
use crate::store::Scope;

pub struct ParkingEvents;

#[async_trait]
impl EventPlugin for ParkingEvents {
    fn events(&self) -> &'static [&'static str] {
        &[
            events::PARKED_CALL,
            events::UNPARKED_CALL,
            events::PARKED_CALL_TIMEOUT,
            events::PARKED_CALL_GIVE_UP,
        ]
    }

    async fn on_record(&self, ctx: &EngineContext, record: &AmiRecord) -> AppResult<()> {
        if record.event_key().as_deref() == Some("parkedcall") {
            let Some(caller) = parked_caller_from_record(record) else {
                debug!("Parked call without space or channel dropped");
                return Ok(());
            };
            return ctx
                .store()
                .update(move |s| {
                    if s.parking(&caller.parking_id).is_none() {
                        debug!("Call parked in unknown space {}", caller.parking_id);
                        return Ok(());
                    }
                    s.park(Scope::Live, caller).map(|_| ())
                })
                .await?;
        }

        // unparked, timed out or given up all free the space
        let Some(space) = record
            .get_non_empty("parkingspace")
            .or_else(|| record.get_non_empty("exten"))
            .map(str::to_string)
        else {
            return Ok(());
        };

        ctx.store()
            .update(move |s| {
                if s.parking(&space).is_none() {
                    return Ok(());
                }
                s.unpark(Scope::Live, &space).map(|_| ())
            })
            .await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::Notification;
    use crate::testing::TestEngine;
    use cti_core::models::Parking;

    #[tokio::test]
    async fn test_park_and_timeout() {
        let mut engine = TestEngine::start();
        engine
            .ctx
            .store()
            .update(|s| s.set_parkings(Scope::Live, vec![Parking::new("71", "default", 45)]))
            .await
            .unwrap();

        let parked = AmiRecord::from_pairs(&[
            ("Event", "ParkedCall"),
            ("ParkingSpace", "71"),
            ("ParkeeChannel", "PJSIP/provider-00000004"),
            ("ParkeeCallerIDNum", "5551234"),
            ("ParkingTimeout", "45"),
        ]);
        ParkingEvents.on_record(&engine.ctx, &parked).await.unwrap();

        match engine.next_notification().await {
            Notification::ParkingChanged(parking) => {
                let caller = parking.parked.as_ref().unwrap();
                assert_eq!(caller.caller_num, "5551234");
            }
            other => panic!("unexpected {:?}", other),
        }

        let timeout = AmiRecord::from_pairs(&[("Event", "ParkedCallTimeOut"), ("ParkingSpace", "71")]);
        ParkingEvents.on_record(&engine.ctx, &timeout).await.unwrap();

        let free = engine
            .ctx
            .store()
            .read(|s| s.parking("71").map(|p| p.is_free()))
            .await
            .unwrap();
        assert_eq!(free, Some(true));
    }

    #[tokio::test]
    async fn test_unknown_space_is_ignored() {
        let mut engine = TestEngine::start();

        let parked = AmiRecord::from_pairs(&[
            ("Event", "ParkedCall"),
            ("ParkingSpace", "99"),
            ("ParkeeChannel", "PJSIP/214-00000001"),
        ]);
        ParkingEvents.on_record(&engine.ctx, &parked).await.unwrap();
        assert!(engine.try_notification().is_none());
    }
}
