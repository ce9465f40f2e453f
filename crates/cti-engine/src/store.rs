//! Domain model store
//!
//! Owns every entity collection plus the lifecycle bookkeeping: the
//! bootstrap/reload state, the discovery milestones, the reload shadow and
//! the recording side table. The store is owned by a single worker task
//! (see [`crate::handle::StoreHandle`]); nothing else ever holds a reference
//! to it.
//!
//! Writes name a [`Scope`]. Event handlers write [`Scope::Live`]. Discovery
//! writes [`Scope::Discovery`], which lands in the shadow while a reload is
//! in progress and in the live model otherwise. Only live writes raise
//! notifications. While a reload is open, live entity writes are replayed on
//! the shadow too, so events landing before the swap survive it.

use chrono::Utc;
use cti_core::config::{AppConfig, PbxConfig};
use cti_core::models::{
    Conversation, Direction, Extension, MeetmeConfUser, MeetmeConference, Parking, ParkedCaller,
    Queue, RecordingState, Trunk,
};
use cti_core::{AppError, AppResult, Privacy};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::bus::{Notification, NotificationBus};
use crate::channel::{owner_name, ChannelInfo};
use crate::reconciler::{reconcile, OwnerKind};

/// Model lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Booting,
    Ready,
    Reloading,
}

/// Top-level discovery categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Milestone {
    Extensions,
    Queues,
    Parkings,
    Trunks,
    Conferences,
}

impl Milestone {
    pub const ALL: [Milestone; 5] = [
        Milestone::Extensions,
        Milestone::Queues,
        Milestone::Parkings,
        Milestone::Trunks,
        Milestone::Conferences,
    ];
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Milestones {
    pub extensions: bool,
    pub queues: bool,
    pub parkings: bool,
    pub trunks: bool,
    pub conferences: bool,
}

impl Milestones {
    pub fn set(&mut self, milestone: Milestone) {
        match milestone {
            Milestone::Extensions => self.extensions = true,
            Milestone::Queues => self.queues = true,
            Milestone::Parkings => self.parkings = true,
            Milestone::Trunks => self.trunks = true,
            Milestone::Conferences => self.conferences = true,
        }
    }

    pub fn all(&self) -> bool {
        self.extensions && self.queues && self.parkings && self.trunks && self.conferences
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Target of a write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Live,
    Discovery,
}

/// One complete set of entity collections
#[derive(Debug, Clone, Default)]
pub struct ModelSet {
    pub extensions: HashMap<String, Extension>,
    pub trunks: HashMap<String, Trunk>,
    pub queues: HashMap<String, Queue>,
    pub parkings: HashMap<String, Parking>,
    pub conferences: HashMap<String, MeetmeConference>,
}

impl ModelSet {
    /// Skeleton built from static configuration
    pub fn from_config(pbx: &PbxConfig) -> Self {
        Self {
            extensions: pbx
                .extensions
                .iter()
                .map(|e| (e.id.clone(), Extension::new(&e.id, &e.name, &e.tech)))
                .collect(),
            trunks: pbx
                .trunks
                .iter()
                .map(|t| (t.id.clone(), Trunk::new(&t.id, &t.name, &t.tech, t.max_channels)))
                .collect(),
            queues: pbx
                .queues
                .iter()
                .map(|q| (q.id.clone(), Queue::new(&q.id, &q.name)))
                .collect(),
            parkings: HashMap::new(),
            conferences: HashMap::new(),
        }
    }

    fn owners(&self) -> HashMap<String, OwnerKind> {
        self.extensions
            .keys()
            .map(|id| (id.clone(), OwnerKind::Extension))
            .chain(self.trunks.keys().map(|id| (id.clone(), OwnerKind::Trunk)))
            .collect()
    }

    /// Swap in fresh conversation sets for every owner
    ///
    /// Returns the owners whose set changed and the notifications a live
    /// write should raise.
    fn rebuild_conversations(
        &mut self,
        channels: &[ChannelInfo],
        relay_marker: &str,
        recordings: &HashMap<String, RecordingState>,
    ) -> (Vec<String>, Vec<Notification>) {
        let result = reconcile(channels, &self.owners(), relay_marker);

        let rebuild = |owner_id: &str| {
            result.for_owner(owner_id).iter().cloned().map(move |mut c| {
                c.recording = recordings.get(&c.id).copied().unwrap_or_default();
                c
            })
        };

        let mut changed = Vec::new();
        let mut notifications = Vec::new();

        for (id, ext) in self.extensions.iter_mut() {
            let before = std::mem::take(&mut ext.conversations);
            for conversation in rebuild(id) {
                ext.conversations.attach(conversation);
            }
            if before != ext.conversations {
                changed.push(id.clone());
                notifications.push(Notification::ExtensionChanged(Box::new(ext.clone())));
            }
        }

        for (id, trunk) in self.trunks.iter_mut() {
            let before = std::mem::take(&mut trunk.conversations);
            for conversation in rebuild(id) {
                if conversation.direction == Direction::Out && !before.contains(&conversation.id) {
                    notifications.push(inbound_call(id, &conversation));
                }
                trunk.conversations.attach(conversation);
            }
            if before != trunk.conversations {
                changed.push(id.clone());
                notifications.push(Notification::TrunkChanged(Box::new(trunk.clone())));
            }
        }

        (changed, notifications)
    }

    /// Re-apply the recording side table to rebuilt conversations
    fn restore_recordings(&mut self, recordings: &HashMap<String, RecordingState>) {
        let sets = self
            .extensions
            .values_mut()
            .map(|e| &mut e.conversations)
            .chain(self.trunks.values_mut().map(|t| &mut t.conversations));
        for conversations in sets {
            for (id, state) in recordings {
                if let Some(conversation) = conversations.get_mut(id) {
                    conversation.recording = *state;
                }
            }
        }
    }

    fn conversation_ids(&self) -> impl Iterator<Item = &String> {
        self.extensions
            .values()
            .flat_map(|e| e.conversations.ids())
            .chain(self.trunks.values().flat_map(|t| t.conversations.ids()))
    }
}

fn sorted_values<T, F>(map: &HashMap<String, T>, f: F) -> Vec<Value>
where
    F: Fn(&T) -> Value,
{
    let mut ids: Vec<&String> = map.keys().collect();
    ids.sort();
    ids.into_iter().filter_map(|id| map.get(id)).map(f).collect()
}

pub struct DomainStore {
    config: Arc<AppConfig>,
    bus: NotificationBus,
    live: ModelSet,
    shadow: Option<ModelSet>,
    recordings: HashMap<String, RecordingState>,
    state: LifecycleState,
    milestones: Milestones,
}

impl DomainStore {
    pub fn new(config: Arc<AppConfig>, bus: NotificationBus) -> Self {
        let live = ModelSet::from_config(&config.pbx);
        Self {
            config,
            bus,
            live,
            shadow: None,
            recordings: HashMap::new(),
            state: LifecycleState::Booting,
            milestones: Milestones::default(),
        }
    }

    // ==================== Lifecycle ====================

    /// Start over from the configuration skeleton
    pub fn reset(&mut self) {
        self.live = ModelSet::from_config(&self.config.pbx);
        self.shadow = None;
        self.recordings.clear();
        self.milestones.reset();
        self.state = LifecycleState::Booting;
    }

    /// Open a shadow model for discovery to fill
    ///
    /// A model that never became ready has nothing worth keeping, so in that
    /// case this falls back to [`DomainStore::reset`] and returns false.
    pub fn begin_reload(&mut self) -> bool {
        if self.state == LifecycleState::Booting {
            self.reset();
            return false;
        }
        self.shadow = Some(ModelSet::from_config(&self.config.pbx));
        self.milestones.reset();
        self.state = LifecycleState::Reloading;
        info!("Reload started, discovery writes go to the shadow model");
        true
    }

    /// Swap the shadow in. No-op when no reload is open.
    pub fn commit_reload(&mut self) -> bool {
        let Some(shadow) = self.shadow.take() else {
            return false;
        };
        self.live = shadow;
        self.live.restore_recordings(&self.recordings);
        self.prune_recordings();
        self.state = LifecycleState::Ready;
        info!(
            "Reload committed: {} extensions, {} trunks, {} queues",
            self.live.extensions.len(),
            self.live.trunks.len(),
            self.live.queues.len()
        );
        self.bus.publish(Notification::Reloaded);
        true
    }

    pub fn is_reloading(&self) -> bool {
        self.shadow.is_some()
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn milestones(&self) -> &Milestones {
        &self.milestones
    }

    /// Record a finished discovery category and run the readiness check
    ///
    /// Returns the new state when this milestone completed the set.
    pub fn complete(&mut self, milestone: Milestone) -> Option<LifecycleState> {
        self.milestones.set(milestone);
        debug!("Milestone reached: {:?}", milestone);

        if !self.milestones.all() {
            return None;
        }
        self.milestones.reset();

        if self.is_reloading() {
            self.commit_reload();
        } else {
            self.state = LifecycleState::Ready;
            info!("Model ready");
            self.bus.publish(Notification::Ready);
        }
        Some(self.state)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn bus(&self) -> &NotificationBus {
        &self.bus
    }

    pub fn publish(&self, notification: Notification) {
        self.bus.publish(notification);
    }

    fn writes_live(&self, scope: Scope) -> bool {
        scope == Scope::Live || self.shadow.is_none()
    }

    /// Shadow a live write must be replayed on, if a reload is open
    fn mirror(&mut self, scope: Scope) -> Option<&mut ModelSet> {
        match scope {
            Scope::Live => self.shadow.as_mut(),
            Scope::Discovery => None,
        }
    }

    fn models(&mut self, scope: Scope) -> &mut ModelSet {
        match (scope, self.shadow.as_mut()) {
            (Scope::Discovery, Some(shadow)) => shadow,
            _ => &mut self.live,
        }
    }

    pub fn live(&self) -> &ModelSet {
        &self.live
    }

    // ==================== Lookups ====================

    pub fn extension(&self, id: &str) -> Option<&Extension> {
        self.live.extensions.get(id)
    }

    pub fn trunk(&self, id: &str) -> Option<&Trunk> {
        self.live.trunks.get(id)
    }

    pub fn queue(&self, id: &str) -> Option<&Queue> {
        self.live.queues.get(id)
    }

    pub fn parking(&self, id: &str) -> Option<&Parking> {
        self.live.parkings.get(id)
    }

    pub fn conference(&self, id: &str) -> Option<&MeetmeConference> {
        self.live.conferences.get(id)
    }

    /// Extension or trunk a channel name belongs to
    pub fn owner_of_channel(&self, channel: &str) -> Option<(String, OwnerKind)> {
        let name = owner_name(channel)?;
        if self.live.extensions.contains_key(name) {
            Some((name.to_string(), OwnerKind::Extension))
        } else if self.live.trunks.contains_key(name) {
            Some((name.to_string(), OwnerKind::Trunk))
        } else {
            None
        }
    }

    pub fn find_conversation(&self, id: &str) -> Option<&Conversation> {
        self.live
            .extensions
            .values()
            .find_map(|e| e.conversations.get(id))
            .or_else(|| self.live.trunks.values().find_map(|t| t.conversations.get(id)))
    }

    /// Conversation one of whose endpoints is `channel`
    pub fn conversation_for_channel(&self, channel: &str) -> Option<&Conversation> {
        let matches = |c: &&Conversation| {
            [c.source.as_ref(), c.dest.as_ref()]
                .into_iter()
                .flatten()
                .any(|ch| ch.channel == channel)
        };
        self.live
            .extensions
            .values()
            .flat_map(|e| e.conversations.iter())
            .chain(self.live.trunks.values().flat_map(|t| t.conversations.iter()))
            .find(matches)
    }

    pub fn recording_state(&self, conversation_id: &str) -> RecordingState {
        self.recordings
            .get(conversation_id)
            .copied()
            .unwrap_or_default()
    }

    // ==================== Entity updates ====================

    /// Mutate an extension; `f` returns whether something visible changed
    pub fn update_extension<F>(&mut self, scope: Scope, id: &str, mut f: F) -> AppResult<bool>
    where
        F: FnMut(&mut Extension) -> bool,
    {
        let live = self.writes_live(scope);
        let ext = self
            .models(scope)
            .extensions
            .get_mut(id)
            .ok_or_else(|| AppError::ExtensionNotFound(id.to_string()))?;
        let changed = f(ext);
        let snapshot = (changed && live).then(|| ext.clone());
        if let Some(shadowed) = self.mirror(scope).and_then(|m| m.extensions.get_mut(id)) {
            f(shadowed);
        }
        if let Some(ext) = snapshot {
            self.bus.publish(Notification::ExtensionChanged(Box::new(ext)));
        }
        Ok(changed)
    }

    pub fn update_trunk<F>(&mut self, scope: Scope, id: &str, mut f: F) -> AppResult<bool>
    where
        F: FnMut(&mut Trunk) -> bool,
    {
        let live = self.writes_live(scope);
        let trunk = self
            .models(scope)
            .trunks
            .get_mut(id)
            .ok_or_else(|| AppError::TrunkNotFound(id.to_string()))?;
        let changed = f(trunk);
        let snapshot = (changed && live).then(|| trunk.clone());
        if let Some(shadowed) = self.mirror(scope).and_then(|m| m.trunks.get_mut(id)) {
            f(shadowed);
        }
        if let Some(trunk) = snapshot {
            self.bus.publish(Notification::TrunkChanged(Box::new(trunk)));
        }
        Ok(changed)
    }

    /// Mutate a queue; `f` also receives the configured dynamic members
    pub fn update_queue<F>(&mut self, scope: Scope, id: &str, mut f: F) -> AppResult<bool>
    where
        F: FnMut(&mut Queue, &[String]) -> bool,
    {
        let config = Arc::clone(&self.config);
        let dynamic = config
            .pbx
            .queue(id)
            .map(|q| q.dynamic_members.as_slice())
            .unwrap_or(&[]);

        let live = self.writes_live(scope);
        let queue = self
            .models(scope)
            .queues
            .get_mut(id)
            .ok_or_else(|| AppError::QueueNotFound(id.to_string()))?;
        let changed = f(queue, dynamic);
        let snapshot = (changed && live).then(|| queue.clone());
        if let Some(shadowed) = self.mirror(scope).and_then(|m| m.queues.get_mut(id)) {
            f(shadowed, dynamic);
        }
        if let Some(queue) = snapshot {
            self.bus.publish(Notification::QueueChanged(Box::new(queue)));
        }
        Ok(changed)
    }

    /// Make sure a discovered queue exists, even if it is not configured
    pub fn ensure_queue(&mut self, scope: Scope, id: &str) {
        let name = self
            .config
            .pbx
            .queue(id)
            .map(|q| q.name.clone())
            .unwrap_or_else(|| id.to_string());
        self.models(scope)
            .queues
            .entry(id.to_string())
            .or_insert_with(|| Queue::new(id, &name));
    }

    pub fn queue_ids(&mut self, scope: Scope) -> Vec<String> {
        let mut ids: Vec<String> = self.models(scope).queues.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn update_parking<F>(&mut self, scope: Scope, id: &str, mut f: F) -> AppResult<bool>
    where
        F: FnMut(&mut Parking) -> bool,
    {
        let live = self.writes_live(scope);
        let parking = self
            .models(scope)
            .parkings
            .get_mut(id)
            .ok_or_else(|| AppError::ParkingNotFound(id.to_string()))?;
        let changed = f(parking);
        let snapshot = (changed && live).then(|| parking.clone());
        if let Some(shadowed) = self.mirror(scope).and_then(|m| m.parkings.get_mut(id)) {
            f(shadowed);
        }
        if let Some(parking) = snapshot {
            self.bus.publish(Notification::ParkingChanged(Box::new(parking)));
        }
        Ok(changed)
    }

    /// Replace the parking collection, keeping nothing from before
    pub fn set_parkings(&mut self, scope: Scope, parkings: Vec<Parking>) {
        self.models(scope).parkings = parkings.into_iter().map(|p| (p.id.clone(), p)).collect();
    }

    pub fn park(&mut self, scope: Scope, caller: ParkedCaller) -> AppResult<bool> {
        let id = caller.parking_id.clone();
        self.update_parking(scope, &id, |p| {
            let changed = p.parked.as_ref() != Some(&caller);
            p.park(caller.clone());
            changed
        })
    }

    pub fn unpark(&mut self, scope: Scope, parking_id: &str) -> AppResult<bool> {
        self.update_parking(scope, parking_id, |p| p.release().is_some())
    }

    // ==================== Conferences ====================

    pub fn set_conferences(&mut self, scope: Scope, conferences: Vec<MeetmeConference>) {
        self.models(scope).conferences = conferences
            .into_iter()
            .map(|c| (c.owner_extension_id.clone(), c))
            .collect();
    }

    pub fn conference_join(&mut self, scope: Scope, conference_id: &str, user: MeetmeConfUser) {
        let live = self.writes_live(scope);
        let conf = self
            .models(scope)
            .conferences
            .entry(conference_id.to_string())
            .or_insert_with(|| MeetmeConference::new(conference_id));
        conf.add_user(user.clone());
        let snapshot = live.then(|| conf.clone());
        if let Some(shadow) = self.mirror(scope) {
            shadow
                .conferences
                .entry(conference_id.to_string())
                .or_insert_with(|| MeetmeConference::new(conference_id))
                .add_user(user);
        }
        if let Some(conf) = snapshot {
            self.bus.publish(Notification::ConferenceChanged(Box::new(conf)));
        }
    }

    /// Remove a user; an emptied conference is dropped and reported ended
    pub fn conference_leave(&mut self, scope: Scope, conference_id: &str, user_id: &str) -> AppResult<bool> {
        if let Some(shadow) = self.mirror(scope) {
            let emptied = shadow
                .conferences
                .get_mut(conference_id)
                .map(|c| c.remove_user_by_id(user_id).is_some() && c.is_empty())
                .unwrap_or(false);
            if emptied {
                shadow.conferences.remove(conference_id);
            }
        }

        let live = self.writes_live(scope);
        let models = self.models(scope);
        let conf = models
            .conferences
            .get_mut(conference_id)
            .ok_or_else(|| AppError::ConferenceNotFound(conference_id.to_string()))?;

        if conf.remove_user_by_id(user_id).is_none() {
            return Ok(false);
        }

        if conf.is_empty() {
            models.conferences.remove(conference_id);
            if live {
                self.bus.publish(Notification::ConferenceEnded {
                    conference: conference_id.to_string(),
                });
            }
        } else if live {
            let snapshot = conf.clone();
            self.bus.publish(Notification::ConferenceChanged(Box::new(snapshot)));
        }
        Ok(true)
    }

    pub fn conference_mute(&mut self, scope: Scope, conference_id: &str, user_id: &str, muted: bool) -> AppResult<bool> {
        let live = self.writes_live(scope);
        let conf = self
            .models(scope)
            .conferences
            .get_mut(conference_id)
            .ok_or_else(|| AppError::ConferenceNotFound(conference_id.to_string()))?;
        let changed = conf.set_muted(user_id, muted);
        let snapshot = (changed && live).then(|| conf.clone());
        if let Some(shadowed) = self.mirror(scope).and_then(|m| m.conferences.get_mut(conference_id)) {
            shadowed.set_muted(user_id, muted);
        }
        if let Some(conf) = snapshot {
            self.bus.publish(Notification::ConferenceChanged(Box::new(conf)));
        }
        Ok(changed)
    }

    pub fn conference_end(&mut self, scope: Scope, conference_id: &str) -> bool {
        let live = self.writes_live(scope);
        if let Some(shadow) = self.mirror(scope) {
            shadow.conferences.remove(conference_id);
        }
        let removed = self.models(scope).conferences.remove(conference_id).is_some();
        if removed && live {
            self.bus.publish(Notification::ConferenceEnded {
                conference: conference_id.to_string(),
            });
        }
        removed
    }

    // ==================== Reconciliation ====================

    /// Rebuild every owner's conversations from a full channel list
    ///
    /// Returns the ids of owners whose conversation set changed.
    pub fn apply_channels(&mut self, scope: Scope, channels: &[ChannelInfo]) -> Vec<String> {
        let live = self.writes_live(scope);
        let marker = self.config.pbx.queue_relay_marker.clone();
        let Self {
            live: live_set,
            shadow,
            recordings,
            ..
        } = self;

        let (models, mirror) = match (scope, shadow.as_mut()) {
            (Scope::Discovery, Some(shadow)) => (shadow, None),
            (Scope::Live, shadow) => (live_set, shadow),
            (Scope::Discovery, None) => (live_set, None),
        };

        let (changed, notifications) = models.rebuild_conversations(channels, &marker, recordings);
        if let Some(shadow) = mirror {
            shadow.rebuild_conversations(channels, &marker, recordings);
        }

        if live {
            self.prune_recordings();
            for notification in notifications {
                self.bus.publish(notification);
            }
        }

        changed
    }

    /// Drop side-table entries whose conversation no longer exists
    fn prune_recordings(&mut self) {
        if self.recordings.is_empty() {
            return;
        }
        let present: std::collections::HashSet<&String> = self.live.conversation_ids().collect();
        self.recordings.retain(|id, _| present.contains(id));
    }

    /// Set the recording state of a live conversation
    pub fn set_recording(&mut self, conversation_id: &str, state: RecordingState) -> AppResult<()> {
        let mut touched = Vec::new();

        for ext in self.live.extensions.values_mut() {
            if let Some(conv) = ext.conversations.get_mut(conversation_id) {
                conv.recording = state;
                touched.push(Notification::ExtensionChanged(Box::new(ext.clone())));
            }
        }
        for trunk in self.live.trunks.values_mut() {
            if let Some(conv) = trunk.conversations.get_mut(conversation_id) {
                conv.recording = state;
                touched.push(Notification::TrunkChanged(Box::new(trunk.clone())));
            }
        }

        if touched.is_empty() {
            warn!("Recording change for unknown conversation {}", conversation_id);
            return Err(AppError::ConversationNotFound(conversation_id.to_string()));
        }

        match state {
            RecordingState::None => self.recordings.remove(conversation_id),
            other => self.recordings.insert(conversation_id.to_string(), other),
        };

        for notification in touched {
            self.bus.publish(notification);
        }
        Ok(())
    }

    // ==================== Snapshots ====================

    pub fn extensions_snapshot(&self, privacy: Option<&Privacy>) -> Vec<Value> {
        sorted_values(&self.live.extensions, |e| e.snapshot(privacy))
    }

    pub fn extension_snapshot(&self, id: &str, privacy: Option<&Privacy>) -> AppResult<Value> {
        self.extension(id)
            .map(|e| e.snapshot(privacy))
            .ok_or_else(|| AppError::ExtensionNotFound(id.to_string()))
    }

    pub fn trunks_snapshot(&self, privacy: Option<&Privacy>) -> Vec<Value> {
        sorted_values(&self.live.trunks, |t| t.snapshot(privacy))
    }

    pub fn queues_snapshot(&self, privacy: Option<&Privacy>) -> Vec<Value> {
        sorted_values(&self.live.queues, |q| q.snapshot(privacy))
    }

    pub fn queue_snapshot(&self, id: &str, privacy: Option<&Privacy>) -> AppResult<Value> {
        self.queue(id)
            .map(|q| q.snapshot(privacy))
            .ok_or_else(|| AppError::QueueNotFound(id.to_string()))
    }

    pub fn parkings_snapshot(&self, privacy: Option<&Privacy>) -> Vec<Value> {
        sorted_values(&self.live.parkings, |p| p.snapshot(privacy))
    }

    pub fn conferences_snapshot(&self) -> Vec<Value> {
        sorted_values(&self.live.conferences, |c| {
            serde_json::to_value(c).unwrap_or(Value::Null)
        })
    }

    /// Lifecycle summary for status endpoints
    pub fn summary(&self) -> Value {
        json!({
            "state": self.state,
            "reloading": self.is_reloading(),
            "milestones": self.milestones,
            "extensions": self.live.extensions.len(),
            "trunks": self.live.trunks.len(),
            "queues": self.live.queues.len(),
            "parkings": self.live.parkings.len(),
            "conferences": self.live.conferences.len(),
            "recordings": self.recordings.len(),
            "at": Utc::now(),
        })
    }
}

fn inbound_call(trunk_id: &str, conversation: &Conversation) -> Notification {
    let dest = conversation
        .dest
        .as_ref()
        .map(|d| d.owner_id.clone().unwrap_or_else(|| d.caller_num.clone()))
        .unwrap_or_default();
    Notification::InboundCallByTrunk {
        trunk: trunk_id.to_string(),
        conversation: conversation.id.clone(),
        caller_num: conversation
            .source
            .as_ref()
            .map(|s| s.caller_num.clone())
            .unwrap_or_default(),
        dest,
    }
}
