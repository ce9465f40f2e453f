//! Conference room events

use async_trait::async_trait;
use cti_ami::{events, AmiRecord};
use cti_core::AppResult;
use tracing::debug;

use super::EventPlugin;
use crate::commands::MeetmeUserInfo;
use crate::engine::EngineContext;
use crate::store::Scope;

pub struct MeetmeEvents;

fn user_number(record: &AmiRecord) -> Option<String> {
    record
        .get_non_empty("usernum")
        .or_else(|| record.get_non_empty("user"))
        .map(str::to_string)
}

#[async_trait]
impl EventPlugin for MeetmeEvents {
    fn events(&self) -> &'static [&'static str] {
        &[
            events::MEETME_JOIN,
            events::MEETME_LEAVE,
            events::MEETME_MUTE,
            events::MEETME_END,
        ]
    }

    async fn on_record(&self, ctx: &EngineContext, record: &AmiRecord) -> AppResult<()> {
        let Some(conference) = record.get_non_empty("meetme").map(str::to_string) else {
            return Ok(());
        };
        let key = record.event_key().unwrap_or_default();

        if key == "meetmeend" {
            return ctx
                .store()
                .update(move |s| {
                    if !s.conference_end(Scope::Live, &conference) {
                        debug!("End of untracked conference {}", conference);
                    }
                })
                .await;
        }

        let Some(user_id) = user_number(record) else {
            debug!("{} without user number dropped", key);
            return Ok(());
        };

        match key.as_str() {
            "meetmejoin" => {
                let info = MeetmeUserInfo {
                    conference: conference.clone(),
                    user_id,
                    caller_num: record.get_or("calleridnum", ""),
                    caller_name: record.get_or("calleridname", ""),
                    channel: record.get_or("channel", ""),
                    admin: false,
                    muted: false,
                };
                let user = info.to_user(&ctx.config().pbx);
                ctx.store()
                    .update(move |s| s.conference_join(Scope::Live, &conference, user))
                    .await
            }
            "meetmeleave" => {
                ctx.store()
                    .update(move |s| match s.conference(&conference) {
                        Some(_) => s.conference_leave(Scope::Live, &conference, &user_id).map(|_| ()),
                        None => Ok(()),
                    })
                    .await?
            }
            _ => {
                let muted = record.get_flag("status");
                ctx.store()
                    .update(move |s| match s.conference(&conference) {
                        Some(_) => s
                            .conference_mute(Scope::Live, &conference, &user_id, muted)
                            .map(|_| ()),
                        None => Ok(()),
                    })
                    .await?
            }
        }
    }
}
