//! Extension and device events

use async_trait::async_trait;
use cti_ami::{events, AmiRecord};
use cti_core::models::{DeviceDetails, ExtensionStatus};
use cti_core::AppResult;
use tracing::debug;

use super::EventPlugin;
use crate::bus::Notification;
use crate::channel::{contact_address, owner_name};
use crate::engine::EngineContext;
use crate::reconciler::OwnerKind;
use crate::store::Scope;

/// Hint state change of a configured extension
pub struct ExtensionStatusEvent;

#[async_trait]
impl EventPlugin for ExtensionStatusEvent {
    fn events(&self) -> &'static [&'static str] {
        &[events::EXTENSION_STATUS]
    }

    async fn on_record(&self, ctx: &EngineContext, record: &AmiRecord) -> AppResult<()> {
        let Some(exten) = record.get_non_empty("exten").map(str::to_string) else {
            return Ok(());
        };
        if !ctx.config().pbx.is_extension(&exten) {
            debug!("Status of unmonitored extension {} ignored", exten);
            return Ok(());
        }

        let status = ExtensionStatus::from_hint_code(record.get_number("status").unwrap_or(-1));
        ctx.store()
            .update(move |s| s.update_extension(Scope::Live, &exten, |e| e.set_status(status)))
            .await??;
        Ok(())
    }
}

fn set_address(device: &mut DeviceDetails, address: Option<&(String, String)>) -> bool {
    let (ip, port) = address.cloned().unwrap_or_default();
    if device.ip == ip && device.port == port {
        return false;
    }
    device.ip = ip;
    device.port = port;
    true
}

/// Contact and peer reachability: refreshes device address, and trunk status
pub struct ContactEvents;

#[async_trait]
impl EventPlugin for ContactEvents {
    fn events(&self) -> &'static [&'static str] {
        &[events::CONTACT_STATUS, events::PEER_STATUS]
    }

    async fn on_record(&self, ctx: &EngineContext, record: &AmiRecord) -> AppResult<()> {
        let (id, status, address) = if record.event_key().as_deref() == Some("contactstatus") {
            let Some(aor) = record.get_non_empty("aor") else {
                return Ok(());
            };
            let status = record.get_or("contactstatus", "").to_lowercase();
            let address = match status.as_str() {
                "removed" | "unreachable" => None,
                _ => record.get_non_empty("uri").and_then(contact_address),
            };
            (aor.to_string(), status, address)
        } else {
            let Some(peer) = record.get_non_empty("peer") else {
                return Ok(());
            };
            let id = owner_name(peer).unwrap_or(peer).to_string();
            let status = record.get_or("peerstatus", "").to_lowercase();
            let address = record.get_non_empty("address").and_then(contact_address);
            (id, status, address)
        };

        ctx.store()
            .update(move |s| {
                let reachable = match status.as_str() {
                    "reachable" | "registered" | "created" => Some(true),
                    "unreachable" | "unregistered" | "removed" => Some(false),
                    _ => None,
                };
                let address = address.as_ref();

                let kind = if s.extension(&id).is_some() {
                    Some(OwnerKind::Extension)
                } else if s.trunk(&id).is_some() {
                    Some(OwnerKind::Trunk)
                } else {
                    None
                };

                match kind {
                    Some(OwnerKind::Extension) => s
                        .update_extension(Scope::Live, &id, |e| set_address(&mut e.device, address))
                        .map(|_| ()),
                    Some(OwnerKind::Trunk) => s
                        .update_trunk(Scope::Live, &id, |t| {
                            let moved = set_address(&mut t.device, address);
                            let status = match reachable {
                                Some(true) => t.set_status(ExtensionStatus::Online),
                                Some(false) => t.set_status(ExtensionStatus::Offline),
                                None => false,
                            };
                            moved || status
                        })
                        .map(|_| ()),
                    None => {
                        debug!("Contact change for unmonitored endpoint {}", id);
                        Ok(())
                    }
                }
            })
            .await?
    }
}

/// Mailbox counters, reported as `214@default`
pub struct MessageWaiting;

#[async_trait]
impl EventPlugin for MessageWaiting {
    fn events(&self) -> &'static [&'static str] {
        &[events::MESSAGE_WAITING]
    }

    async fn on_record(&self, ctx: &EngineContext, record: &AmiRecord) -> AppResult<()> {
        let Some(mailbox) = record.get_non_empty("mailbox") else {
            return Ok(());
        };
        let extension = mailbox.split('@').next().unwrap_or(mailbox).to_string();
        if !ctx.config().pbx.is_extension(&extension) {
            return Ok(());
        }

        let notification = Notification::VoicemailCount {
            extension,
            new_messages: record.get_number("new").unwrap_or(0),
            old_messages: record.get_number("old").unwrap_or(0),
        };
        ctx.store().read(move |s| s.publish(notification)).await
    }
}

/// Call detail records are forwarded untouched
pub struct Cdr;

#[async_trait]
impl EventPlugin for Cdr {
    fn events(&self) -> &'static [&'static str] {
        &[events::CDR]
    }

    async fn on_record(&self, ctx: &EngineContext, record: &AmiRecord) -> AppResult<()> {
        let payload = record.to_json();
        ctx.store().read(move |s| s.publish(Notification::NewCdr(payload))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestEngine;

    #[tokio::test]
    async fn test_extension_status_known_only() {
        let engine = TestEngine::start();

        let ringing = AmiRecord::from_pairs(&[("Event", "ExtensionStatus"), ("Exten", "214"), ("Status", "8")]);
        ExtensionStatusEvent.on_record(&engine.ctx, &ringing).await.unwrap();

        let stranger = AmiRecord::from_pairs(&[("Event", "ExtensionStatus"), ("Exten", "999"), ("Status", "0")]);
        ExtensionStatusEvent.on_record(&engine.ctx, &stranger).await.unwrap();

        let status = engine
            .ctx
            .store()
            .read(|s| s.extension("214").map(|e| e.status))
            .await
            .unwrap();
        assert_eq!(status, Some(ExtensionStatus::Ringing));
    }

    #[tokio::test]
    async fn test_contact_status_updates_device() {
        let engine = TestEngine::start();

        let created = AmiRecord::from_pairs(&[
            ("Event", "ContactStatus"),
            ("AOR", "221"),
            ("URI", "sip:221@192.168.1.40:5062"),
            ("ContactStatus", "Reachable"),
        ]);
        ContactEvents.on_record(&engine.ctx, &created).await.unwrap();

        let device = engine
            .ctx
            .store()
            .read(|s| s.extension("221").map(|e| e.device.clone()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(device.ip, "192.168.1.40");
        assert_eq!(device.port, "5062");

        let removed = AmiRecord::from_pairs(&[
            ("Event", "ContactStatus"),
            ("AOR", "221"),
            ("ContactStatus", "Removed"),
        ]);
        ContactEvents.on_record(&engine.ctx, &removed).await.unwrap();
        let ip = engine
            .ctx
            .store()
            .read(|s| s.extension("221").map(|e| e.device.ip.clone()))
            .await
            .unwrap();
        assert_eq!(ip.as_deref(), Some(""));
    }

    #[tokio::test]
    async fn test_peer_status_sets_trunk_status() {
        let engine = TestEngine::start();

        let reachable = AmiRecord::from_pairs(&[
            ("Event", "PeerStatus"),
            ("Peer", "PJSIP/provider"),
            ("PeerStatus", "Reachable"),
            ("Address", "203.0.113.7:5060"),
        ]);
        ContactEvents.on_record(&engine.ctx, &reachable).await.unwrap();

        let trunk = engine
            .ctx
            .store()
            .read(|s| s.trunk("provider").cloned())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(trunk.status, ExtensionStatus::Online);
        assert_eq!(trunk.device.ip, "203.0.113.7");
    }

    #[tokio::test]
    async fn test_message_waiting_and_cdr_are_forwarded() {
        let mut engine = TestEngine::start();

        let mwi = AmiRecord::from_pairs(&[
            ("Event", "MessageWaiting"),
            ("Mailbox", "214@default"),
            ("New", "2"),
            ("Old", "5"),
        ]);
        MessageWaiting.on_record(&engine.ctx, &mwi).await.unwrap();
        match engine.next_notification().await {
            Notification::VoicemailCount {
                extension,
                new_messages,
                old_messages,
            } => {
                assert_eq!(extension, "214");
                assert_eq!((new_messages, old_messages), (2, 5));
            }
            other => panic!("unexpected {:?}", other),
        }

        let cdr = AmiRecord::from_pairs(&[("Event", "Cdr"), ("Source", "214"), ("Destination", "221")]);
        Cdr.on_record(&engine.ctx, &cdr).await.unwrap();
        match engine.next_notification().await {
            Notification::NewCdr(payload) => assert_eq!(payload["source"], "214"),
            other => panic!("unexpected {:?}", other),
        }
    }
}
