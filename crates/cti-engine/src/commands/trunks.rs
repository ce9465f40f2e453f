//! Trunk registration listings

use cti_ami::{AmiAction, AmiRecord};
use cti_core::config::AppConfig;
use cti_core::models::RegistrationState;
use cti_core::AppResult;
use std::sync::Arc;

use super::{events_named, names, CommandArgs, CommandOutput, CommandPlugin, Registration};
use crate::error::CommandError;
use crate::store::{DomainStore, Scope};

/// First candidate naming a configured trunk, else the first non-empty one
pub(crate) fn trunk_id(config: &AppConfig, candidates: &[Option<&str>]) -> Option<String> {
    let present: Vec<&str> = candidates.iter().flatten().copied().filter(|c| !c.is_empty()).collect();
    present
        .iter()
        .find(|c| config.pbx.is_trunk(c))
        .or_else(|| present.first())
        .map(|c| c.to_string())
}

fn apply_registrations(output: &CommandOutput, store: &mut DomainStore) -> AppResult<()> {
    if let CommandOutput::Registrations(registrations) = output {
        for registration in registrations {
            if store.trunk(&registration.trunk_id).is_none() {
                continue;
            }
            let state = registration.state;
            store.update_trunk(Scope::Live, &registration.trunk_id, move |t| t.set_registration(state))?;
        }
    }
    Ok(())
}

pub struct PjsipRegistrations {
    config: Arc<AppConfig>,
}

impl PjsipRegistrations {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self { config }
    }
}

impl CommandPlugin for PjsipRegistrations {
    fn name(&self) -> &'static str {
        names::PJSIP_REGISTRATIONS
    }

    fn action(&self, _args: &CommandArgs) -> Result<AmiAction, CommandError> {
        Ok(AmiAction::new("PJSIPShowRegistrationsOutbound"))
    }

    fn terminal_event(&self) -> Option<&'static str> {
        Some("OutboundRegistrationDetailComplete")
    }

    fn collect(&self, records: Vec<AmiRecord>) -> Result<CommandOutput, CommandError> {
        let registrations = events_named(&records, "OutboundRegistrationDetail")
            .filter_map(|r| {
                Some(Registration {
                    trunk_id: trunk_id(&self.config, &[r.get("endpoint"), r.get("objectname")])?,
                    state: r
                        .get("status")
                        .and_then(RegistrationState::from_str)
                        .unwrap_or_default(),
                })
            })
            .collect();
        Ok(CommandOutput::Registrations(registrations))
    }

    fn apply(&self, _args: &CommandArgs, output: &CommandOutput, store: &mut DomainStore) -> AppResult<()> {
        apply_registrations(output, store)
    }
}

pub struct IaxRegistrations {
    config: Arc<AppConfig>,
}

impl IaxRegistrations {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self { config }
    }
}

impl CommandPlugin for IaxRegistrations {
    fn name(&self) -> &'static str {
        names::IAX_REGISTRATIONS
    }

    fn action(&self, _args: &CommandArgs) -> Result<AmiAction, CommandError> {
        Ok(AmiAction::new("IAXregistry"))
    }

    fn terminal_event(&self) -> Option<&'static str> {
        Some("RegistrationsComplete")
    }

    fn collect(&self, records: Vec<AmiRecord>) -> Result<CommandOutput, CommandError> {
        let registrations = events_named(&records, "RegistryEntry")
            .filter_map(|r| {
                Some(Registration {
                    trunk_id: trunk_id(&self.config, &[r.get("username"), r.get("host")])?,
                    state: r
                        .get("state")
                        .and_then(RegistrationState::from_str)
                        .unwrap_or_default(),
                })
            })
            .collect();
        Ok(CommandOutput::Registrations(registrations))
    }

    fn apply(&self, _args: &CommandArgs, output: &CommandOutput, store: &mut DomainStore) -> AppResult<()> {
        apply_registrations(output, store)
    }
}
