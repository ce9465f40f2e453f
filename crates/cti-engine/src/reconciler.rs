//! Channel-bridging reconciliation
//!
//! Turns the flat list of active channels into owner-scoped conversations.
//! The pass is a pure function of its input: the same channel list always
//! yields the same conversation sets, which are then swapped wholesale into
//! the store.
//!
//! Pairing rules, applied to every unordered pair not yet paired:
//!
//! 1. both channels share a non-empty bridge id, or
//! 2. neither has a bridge id yet, both are in a ring/ringing/down state and
//!    they belong to the same linked call.
//!
//! A channel is paired with at most one counterpart. Relay legs (channel
//! names containing the queue relay marker) never become endpoints; when an
//! owner's counterpart is a relay leg, the sibling leg supplies the queue id
//! and its own counterpart becomes the far end of the call.

use cti_core::models::Conversation;
use std::collections::{BTreeMap, HashMap};

use crate::channel::ChannelInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerKind {
    Extension,
    Trunk,
}

/// Result of one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// Resolved counterpart for every paired endpoint channel
    pub bridged: HashMap<String, String>,
    /// Fresh conversation set per owner that has at least one channel
    pub conversations: BTreeMap<String, Vec<Conversation>>,
}

impl Reconciliation {
    pub fn for_owner(&self, owner_id: &str) -> &[Conversation] {
        self.conversations
            .get(owner_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

fn bridged_together(a: &ChannelInfo, b: &ChannelInfo) -> bool {
    if a.channel == b.channel {
        return false;
    }
    match (&a.bridge_id, &b.bridge_id) {
        (Some(x), Some(y)) => x == y,
        (None, None) => {
            a.is_ringing_state()
                && b.is_ringing_state()
                && !a.linked_id.is_empty()
                && a.linked_id == b.linked_id
        }
        _ => false,
    }
}

/// Counterpart index for every channel, first match wins
fn pair_channels(channels: &[ChannelInfo]) -> Vec<Option<usize>> {
    let mut partner = vec![None; channels.len()];
    for i in 0..channels.len() {
        if partner[i].is_some() {
            continue;
        }
        for j in (i + 1)..channels.len() {
            if partner[j].is_none() && bridged_together(&channels[i], &channels[j]) {
                partner[i] = Some(j);
                partner[j] = Some(i);
                break;
            }
        }
    }
    partner
}

/// Decide whether `own` is the leg that started the call
///
/// A leg in `ring` state is dialing out, a leg in `ringing` state is being
/// called. When neither side says so, the older unique id wins.
fn own_is_source(own: &ChannelInfo, other: Option<&ChannelInfo>) -> bool {
    let Some(other) = other else {
        return own.status != "ringing";
    };
    if own.status == "ring" {
        true
    } else if other.status == "ring" {
        false
    } else if own.status == "ringing" {
        false
    } else if other.status == "ringing" {
        true
    } else {
        own.unique_key() <= other.unique_key()
    }
}

struct Pass<'a> {
    channels: &'a [ChannelInfo],
    owners: &'a HashMap<String, OwnerKind>,
    marker: &'a str,
    partner: Vec<Option<usize>>,
    by_name: HashMap<&'a str, usize>,
}

impl<'a> Pass<'a> {
    fn owner_of(&self, idx: usize) -> Option<(&'a str, OwnerKind)> {
        let channel = &self.channels[idx];
        if channel.is_relay(self.marker) {
            return None;
        }
        let name = channel.owner_name()?;
        self.owners
            .get_key_value(name)
            .map(|(id, kind)| (id.as_str(), *kind))
    }

    /// Far end of the call plus the queue recovered from a relay pair
    fn counterpart(&self, idx: usize) -> (Option<usize>, Option<String>) {
        let Some(other) = self.partner[idx] else {
            return (None, None);
        };
        let relay = &self.channels[other];
        if !relay.is_relay(self.marker) {
            return (Some(other), None);
        }

        let sibling = relay
            .relay_sibling_name()
            .and_then(|name| self.by_name.get(name.as_str()).copied());
        let queue = sibling
            .and_then(|s| self.channels[s].queue.clone())
            .or_else(|| relay.queue.clone());
        let far = sibling
            .and_then(|s| self.partner[s])
            .filter(|&k| k != idx && !self.channels[k].is_relay(self.marker));

        (far, queue)
    }

    fn conversation(&self, idx: usize, owner_id: &str, kind: OwnerKind) -> (Conversation, Option<usize>) {
        let own = &self.channels[idx];
        let (other_idx, relay_queue) = self.counterpart(idx);
        let other = other_idx.map(|j| &self.channels[j]);
        let other_owner = other_idx.and_then(|j| self.owner_of(j));

        let queue_id = relay_queue
            .or_else(|| own.queue_app_target().map(str::to_string))
            .or_else(|| other.and_then(|o| o.queue_app_target()).map(str::to_string));

        let own_model = own.to_model(Some(owner_id), other.map(|o| o.channel.as_str()));
        let other_model =
            other.map(|o| o.to_model(other_owner.map(|(id, _)| id), Some(own.channel.as_str())));

        let (source, dest) = if own_is_source(own, other) {
            (Some(own_model), other_model)
        } else {
            (other_model, Some(own_model))
        };

        let through_trunk =
            kind == OwnerKind::Trunk || other_owner.map(|(_, k)| k) == Some(OwnerKind::Trunk);

        (
            Conversation::new(owner_id, source, dest, queue_id, through_trunk, own.is_conference()),
            other_idx,
        )
    }
}

/// Run one reconciliation pass
///
/// `owners` maps every extension and trunk id of interest to its kind;
/// `relay_marker` identifies queue relay legs.
pub fn reconcile(
    channels: &[ChannelInfo],
    owners: &HashMap<String, OwnerKind>,
    relay_marker: &str,
) -> Reconciliation {
    let pass = Pass {
        channels,
        owners,
        marker: relay_marker,
        partner: pair_channels(channels),
        by_name: channels
            .iter()
            .enumerate()
            .map(|(i, c)| (c.channel.as_str(), i))
            .collect(),
    };

    let mut result = Reconciliation::default();

    for idx in 0..channels.len() {
        let Some((owner_id, kind)) = pass.owner_of(idx) else {
            continue;
        };

        let (conversation, other) = pass.conversation(idx, owner_id, kind);
        if let Some(j) = other {
            result
                .bridged
                .insert(channels[idx].channel.clone(), channels[j].channel.clone());
        }

        let set = result.conversations.entry(owner_id.to_string()).or_default();
        // same identity replaces the previous one
        set.retain(|c| c.id != conversation.id);
        set.push(conversation);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use cti_core::models::Direction;
    use proptest::prelude::*;

    const MARKER: &str = "@from-queue";

    fn ch(name: &str, uid: &str, linked: &str, bridge: Option<&str>, status: &str, num: &str) -> ChannelInfo {
        ChannelInfo {
            channel: name.to_string(),
            unique_id: uid.to_string(),
            linked_id: linked.to_string(),
            bridge_id: bridge.map(str::to_string),
            caller_num: num.to_string(),
            status: status.to_string(),
            ..Default::default()
        }
    }

    fn owners() -> HashMap<String, OwnerKind> {
        let mut map = HashMap::new();
        for ext in ["214", "221", "300", "301"] {
            map.insert(ext.to_string(), OwnerKind::Extension);
        }
        map.insert("provider".to_string(), OwnerKind::Trunk);
        map
    }

    #[test]
    fn test_bridged_pair_outgoing() {
        let channels = vec![
            ch("PJSIP/214-00000001", "1700000000.1", "1700000000.1", Some("b1"), "up", "214"),
            ch("PJSIP/221-00000002", "1700000000.2", "1700000000.1", Some("b1"), "up", "221"),
        ];
        let result = reconcile(&channels, &owners(), MARKER);

        let convs = result.for_owner("214");
        assert_eq!(convs.len(), 1);
        assert_eq!(convs[0].id, "PJSIP/214-00000001>PJSIP/221-00000002");
        assert_eq!(convs[0].direction, Direction::Out);
        assert!(convs[0].connected);

        let other = result.for_owner("221");
        assert_eq!(other[0].id, convs[0].id);
        assert_eq!(other[0].direction, Direction::In);
        assert_eq!(other[0].counterpart_num, "214");
        assert_eq!(
            result.bridged.get("PJSIP/221-00000002").map(String::as_str),
            Some("PJSIP/214-00000001")
        );
    }

    #[test]
    fn test_ringing_pair_without_bridge() {
        let channels = vec![
            ch("PJSIP/300-00000010", "1700000100.10", "1700000100.10", None, "ring", "300"),
            ch("PJSIP/301-00000011", "1700000100.11", "1700000100.10", None, "ringing", "300"),
        ];
        let result = reconcile(&channels, &owners(), MARKER);

        let convs = result.for_owner("300");
        assert_eq!(convs.len(), 1);
        assert!(!convs[0].connected);
        assert_eq!(convs[0].direction, Direction::Out);
        assert_eq!(convs[0].id, "PJSIP/300-00000010>PJSIP/301-00000011");
    }

    #[test]
    fn test_ringing_rule_needs_same_linked_call() {
        let channels = vec![
            ch("PJSIP/300-00000010", "1700000100.10", "1700000100.10", None, "ring", "300"),
            ch("PJSIP/301-00000011", "1700000100.11", "1700000100.99", None, "ringing", "301"),
        ];
        let result = reconcile(&channels, &owners(), MARKER);

        assert!(result.bridged.is_empty());
        assert_eq!(result.for_owner("300")[0].id, "PJSIP/300-00000010>");
        assert_eq!(result.for_owner("301")[0].id, ">PJSIP/301-00000011");
    }

    #[test]
    fn test_each_channel_paired_once() {
        let channels = vec![
            ch("PJSIP/214-00000001", "1700000000.1", "l1", Some("b1"), "up", "214"),
            ch("PJSIP/221-00000002", "1700000000.2", "l1", Some("b1"), "up", "221"),
            ch("PJSIP/300-00000003", "1700000000.3", "l1", Some("b1"), "up", "300"),
        ];
        let result = reconcile(&channels, &owners(), MARKER);

        assert_eq!(result.bridged.len(), 2);
        assert_eq!(result.for_owner("300")[0].id, "PJSIP/300-00000003>");
    }

    #[test]
    fn test_relay_leg_recovers_queue() {
        let mut relay_in = ch(
            "Local/214@from-queue-00000005;1",
            "1700000200.6",
            "1700000200.5",
            Some("bq"),
            "up",
            "0721123456",
        );
        relay_in.queue = Some("401".to_string());
        let relay_out = ch(
            "Local/214@from-queue-00000005;2",
            "1700000200.7",
            "1700000200.5",
            Some("ba"),
            "up",
            "0721123456",
        );
        let mut trunk = ch(
            "PJSIP/provider-00000004",
            "1700000200.5",
            "1700000200.5",
            Some("bq"),
            "up",
            "0721123456",
        );
        trunk.application = "Queue".to_string();
        trunk.app_data = "401,t".to_string();
        let agent = ch("PJSIP/214-00000008", "1700000200.8", "1700000200.5", Some("ba"), "up", "214");

        let channels = vec![trunk, relay_in, relay_out, agent];
        let result = reconcile(&channels, &owners(), MARKER);

        let convs = result.for_owner("214");
        assert_eq!(convs.len(), 1);
        assert_eq!(convs[0].queue_id.as_deref(), Some("401"));
        assert!(convs[0].through_queue);
        assert!(convs[0].through_trunk);
        assert_eq!(convs[0].direction, Direction::In);
        assert_eq!(convs[0].counterpart_num, "0721123456");
        assert_eq!(convs[0].id, "PJSIP/provider-00000004>PJSIP/214-00000008");

        let trunk_convs = result.for_owner("provider");
        assert_eq!(trunk_convs[0].id, convs[0].id);
        assert!(result.for_owner("Local").is_empty());
    }

    #[test]
    fn test_unknown_owners_ignored() {
        let channels = vec![ch("PJSIP/999-00000001", "1.1", "1.1", None, "up", "999")];
        let result = reconcile(&channels, &owners(), MARKER);
        assert!(result.conversations.is_empty());
    }

    fn arb_channel() -> impl Strategy<Value = ChannelInfo> {
        (
            prop::sample::select(vec!["214", "221", "300", "301", "provider", "999"]),
            0u32..50,
            prop::option::of(prop::sample::select(vec!["b1", "b2"])),
            prop::sample::select(vec!["up", "ring", "ringing", "down"]),
            prop::sample::select(vec!["l1", "l2"]),
        )
            .prop_map(|(owner, seq, bridge, status, linked)| {
                ch(
                    &format!("PJSIP/{}-{:08}", owner, seq),
                    &format!("1700000000.{}", seq),
                    linked,
                    bridge,
                    status,
                    owner,
                )
            })
    }

    proptest! {
        #[test]
        fn prop_reconcile_is_idempotent(channels in prop::collection::vec(arb_channel(), 0..8)) {
            let first = reconcile(&channels, &owners(), MARKER);
            let second = reconcile(&channels, &owners(), MARKER);
            prop_assert_eq!(&first, &second);

            for convs in first.conversations.values() {
                let mut ids: Vec<_> = convs.iter().map(|c| c.id.clone()).collect();
                ids.sort();
                ids.dedup();
                prop_assert_eq!(ids.len(), convs.len());
            }
        }
    }
}
