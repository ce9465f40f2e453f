//! Meetme conference commands

use cti_ami::{AmiAction, AmiRecord};
use cti_core::config::PbxConfig;
use cti_core::models::MeetmeConfUser;

use super::{events_named, fold_record, names, CommandArgs, CommandOutput, CommandPlugin, MeetmeUserInfo, Progress};
use crate::error::CommandError;

/// Participants of every running conference
pub struct ListMeetmeConf;

impl CommandPlugin for ListMeetmeConf {
    fn name(&self) -> &'static str {
        names::LIST_MEETME_CONF
    }

    fn action(&self, _args: &CommandArgs) -> Result<AmiAction, CommandError> {
        Ok(AmiAction::new("MeetmeList"))
    }

    fn terminal_event(&self) -> Option<&'static str> {
        Some("MeetmeListComplete")
    }

    fn collect(&self, records: Vec<AmiRecord>) -> Result<CommandOutput, CommandError> {
        Ok(CommandOutput::Conferences(
            events_named(&records, "MeetmeList")
                .filter_map(MeetmeUserInfo::from_record)
                .collect(),
        ))
    }

    fn on_record(&self, scratch: &mut Vec<AmiRecord>, record: AmiRecord) -> Progress {
        // An empty listing is reported as an error
        let nothing_running = record.is_error()
            && record
                .message()
                .map_or(false, |m| m.to_lowercase().contains("no active conferences"));
        if nothing_running {
            return Progress::Done(CommandOutput::Conferences(Vec::new()));
        }
        fold_record(self, scratch, record)
    }
}

impl MeetmeUserInfo {
    pub fn from_record(record: &AmiRecord) -> Option<Self> {
        Some(Self {
            conference: record.get_non_empty("conference")?.to_string(),
            user_id: record.get_non_empty("usernumber")?.to_string(),
            caller_num: record.get_or("calleridnum", ""),
            caller_name: record.get_or("calleridname", ""),
            channel: record.get_or("channel", ""),
            admin: record.get_flag("admin"),
            muted: record
                .get("muted")
                .map_or(false, |m| !m.eq_ignore_ascii_case("no")),
        })
    }

    /// Model user; numbers carrying a remote site prefix are split into
    /// prefix and extension
    pub fn to_user(&self, pbx: &PbxConfig) -> MeetmeConfUser {
        let remote = (!pbx.is_extension(&self.caller_num))
            .then(|| {
                pbx.remote_sites.iter().find(|site| {
                    !site.prefix.is_empty()
                        && self.caller_num.len() > site.prefix.len()
                        && self.caller_num.starts_with(&site.prefix)
                })
            })
            .flatten();

        let exten_id = match remote {
            Some(site) => self.caller_num[site.prefix.len()..].to_string(),
            None => self.caller_num.clone(),
        };

        MeetmeConfUser {
            user_id: self.user_id.clone(),
            is_owner: remote.is_none() && exten_id == self.conference,
            exten_id,
            name: self.caller_name.clone(),
            channel: self.channel.clone(),
            muted: self.muted,
            site_prefix: remote.map(|s| s.prefix.clone()),
            site_name: remote.map(|s| s.name.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeetmeOp {
    Mute,
    Unmute,
    Kick,
}

impl MeetmeOp {
    pub const ALL: [MeetmeOp; 3] = [MeetmeOp::Mute, MeetmeOp::Unmute, MeetmeOp::Kick];
}

/// Participant control; the PBX reports the effect as conference events
pub struct MeetmeAction(pub MeetmeOp);

impl CommandPlugin for MeetmeAction {
    fn name(&self) -> &'static str {
        match self.0 {
            MeetmeOp::Mute => names::MEETME_MUTE,
            MeetmeOp::Unmute => names::MEETME_UNMUTE,
            MeetmeOp::Kick => names::MEETME_KICK,
        }
    }

    fn action(&self, args: &CommandArgs) -> Result<AmiAction, CommandError> {
        let conference = args.string("conference")?;
        let user = args.string("user")?;
        let action = match self.0 {
            MeetmeOp::Mute => AmiAction::new("MeetmeMute")
                .field("Meetme", conference)
                .field("Usernum", user),
            MeetmeOp::Unmute => AmiAction::new("MeetmeUnmute")
                .field("Meetme", conference)
                .field("Usernum", user),
            // No dedicated manager action exists for kicking
            MeetmeOp::Kick => {
                AmiAction::new("Command").field("Command", format!("meetme kick {} {}", conference, user))
            }
        };
        Ok(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_config;
    use cti_core::config::RemoteSiteConfig;

    fn info(conference: &str, user: &str, num: &str) -> MeetmeUserInfo {
        MeetmeUserInfo {
            conference: conference.to_string(),
            user_id: user.to_string(),
            caller_num: num.to_string(),
            caller_name: String::new(),
            channel: format!("PJSIP/{}-0001", num),
            admin: false,
            muted: false,
        }
    }

    #[test]
    fn test_empty_listing_is_not_a_failure() {
        let err = AmiRecord::from_pairs(&[("Response", "Error"), ("Message", "No active conferences.")]);
        assert!(matches!(
            ListMeetmeConf.on_record(&mut Vec::new(), err),
            Progress::Done(CommandOutput::Conferences(v)) if v.is_empty()
        ));
    }

    #[test]
    fn test_listing() {
        let records = vec![
            AmiRecord::from_pairs(&[
                ("Event", "MeetmeList"),
                ("Conference", "214"),
                ("UserNumber", "1"),
                ("CallerIDNum", "214"),
                ("Admin", "Yes"),
                ("Muted", "By admin"),
            ]),
            AmiRecord::from_pairs(&[("Event", "MeetmeList"), ("Conference", "214")]),
            AmiRecord::from_pairs(&[("Event", "MeetmeListComplete")]),
        ];
        let users = ListMeetmeConf.collect(records).unwrap().into_conferences().unwrap();
        assert_eq!(users.len(), 1);
        assert!(users[0].admin);
        assert!(users[0].muted);
    }

    #[test]
    fn test_remote_site_user() {
        let mut config = (*test_config()).clone();
        config.pbx.remote_sites.push(RemoteSiteConfig {
            prefix: "8".to_string(),
            name: "Branch".to_string(),
        });

        let owner = info("214", "1", "214").to_user(&config.pbx);
        assert!(owner.is_owner);
        assert_eq!(owner.key(), "214");

        let remote = info("214", "2", "8214").to_user(&config.pbx);
        assert!(!remote.is_owner);
        assert_eq!(remote.exten_id, "214");
        assert_eq!(remote.site_name.as_deref(), Some("Branch"));
        assert_eq!(remote.key(), "8214");
    }

    #[test]
    fn test_kick_uses_cli_command() {
        let args = CommandArgs::new().with("conference", "214").with("user", "2");
        let action = MeetmeAction(MeetmeOp::Kick).action(&args).unwrap();
        assert_eq!(action.get("Command"), Some("meetme kick 214 2"));
    }
}
