//! Channel lifecycle and recording events
//!
//! Bridging-relevant events never patch conversations from their own
//! fields; they schedule a full channel list reconciliation instead. A few
//! of them also raise a per-extension notification right away.

use async_trait::async_trait;
use cti_ami::{events, AmiRecord};
use cti_core::models::RecordingState;
use cti_core::AppResult;
use tracing::debug;

use super::EventPlugin;
use crate::bus::Notification;
use crate::engine::EngineContext;
use crate::reconciler::OwnerKind;

pub struct ChannelEvents;

/// Publish the notification built for the extension owning `channel`
async fn notify_extension<F>(ctx: &EngineContext, channel: String, build: F) -> AppResult<()>
where
    F: FnOnce(String, String) -> Notification + Send + 'static,
{
    ctx.store()
        .update(move |s| {
            if let Some((owner, OwnerKind::Extension)) = s.owner_of_channel(&channel) {
                s.publish(build(owner, channel));
            }
        })
        .await
}

#[async_trait]
impl EventPlugin for ChannelEvents {
    fn events(&self) -> &'static [&'static str] {
        &[
            events::NEWCHANNEL,
            events::NEWSTATE,
            events::HANGUP,
            events::BRIDGE_ENTER,
            events::BRIDGE_LEAVE,
            events::HOLD,
            events::UNHOLD,
            events::RENAME,
            events::ATTENDED_TRANSFER,
            events::BLIND_TRANSFER,
            events::DIAL_BEGIN,
            events::DIAL_END,
        ]
    }

    async fn on_record(&self, ctx: &EngineContext, record: &AmiRecord) -> AppResult<()> {
        let key = record.event_key().unwrap_or_default();
        let channel = record.channel().unwrap_or_default().to_string();

        match key.as_str() {
            "dialbegin" => {
                let destination = record
                    .get_non_empty("destcalleridnum")
                    .or_else(|| record.get_non_empty("dialstring"))
                    .unwrap_or_default()
                    .to_string();
                return notify_extension(ctx, channel, move |extension, channel| {
                    Notification::ExtensionDialing {
                        extension,
                        channel,
                        destination,
                    }
                })
                .await;
            }
            "newstate" if record.get("channelstatedesc").map_or(false, |s| s.eq_ignore_ascii_case("up")) => {
                let counterpart = record.get_or("connectedlinenum", "");
                notify_extension(ctx, channel, move |extension, channel| Notification::ExtensionConnected {
                    extension,
                    channel,
                    counterpart,
                })
                .await?;
            }
            "hangup" => {
                let cause = record
                    .get_non_empty("cause-txt")
                    .or_else(|| record.get_non_empty("cause"))
                    .unwrap_or_default()
                    .to_string();
                notify_extension(ctx, channel, move |extension, channel| Notification::ExtensionHangup {
                    extension,
                    channel,
                    cause,
                })
                .await?;
            }
            _ => {}
        }

        ctx.refresh_channels();
        Ok(())
    }
}

/// Recording started, stopped or muted, from any source
pub struct RecordingEvents;

#[async_trait]
impl EventPlugin for RecordingEvents {
    fn events(&self) -> &'static [&'static str] {
        &[
            events::MIX_MONITOR_START,
            events::MIX_MONITOR_STOP,
            events::MIX_MONITOR_MUTE,
        ]
    }

    async fn on_record(&self, ctx: &EngineContext, record: &AmiRecord) -> AppResult<()> {
        let Some(channel) = record.channel().map(str::to_string) else {
            debug!("Recording event without channel dropped");
            return Ok(());
        };

        let state = match record.event_key().as_deref() {
            Some("mixmonitorstart") => RecordingState::Recording,
            Some("mixmonitorstop") => RecordingState::None,
            _ if record.get_flag("state") => RecordingState::Muted,
            _ => RecordingState::Recording,
        };

        ctx.store()
            .update(move |s| match s.conversation_for_channel(&channel).map(|c| c.id.clone()) {
                Some(id) => s.set_recording(&id, state),
                None => {
                    debug!("Recording change on {} before its conversation exists", channel);
                    Ok(())
                }
            })
            .await?
    }
}
