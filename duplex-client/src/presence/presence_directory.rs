use dashmap::DashMap;
use duplex_core::{Availability, PeerId, PeerIdentity, PresenceEntry, RelayMessage};
use std::sync::Arc;
use tracing::debug;

/// Presence notification as broadcast by the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceEvent {
    /// `user:new` or `user:available`.
    Available(PeerIdentity),
    /// `user:unavailable`, keyed by id or display name.
    Unavailable(String),
    /// `user:deleted`, keyed by display name.
    Deleted(String),
}

impl PresenceEvent {
    pub fn from_relay(msg: &RelayMessage) -> Option<Self> {
        match msg {
            RelayMessage::UserNew(identity) | RelayMessage::UserAvailable(identity) => {
                Some(PresenceEvent::Available(identity.clone()))
            }
            RelayMessage::UserUnavailable(key) => Some(PresenceEvent::Unavailable(key.clone())),
            RelayMessage::UserDeleted(name) => Some(PresenceEvent::Deleted(name.clone())),
            _ => None,
        }
    }
}

/// Reachable peers and their availability, fed only by relay notifications.
/// Clones share the same map, so UI tasks can read it while the call
/// controller keeps it up to date.
#[derive(Clone, Default)]
pub struct PresenceDirectory {
    entries: Arc<DashMap<PeerId, PresenceEntry>>,
}

impl PresenceDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&self, event: PresenceEvent) {
        match event {
            PresenceEvent::Available(identity) => self.upsert_available(identity),
            PresenceEvent::Unavailable(key) => self.mark_unavailable(&key),
            PresenceEvent::Deleted(name) => self.remove(&name),
        }
    }

    pub fn apply_batch<I>(&self, events: I)
    where
        I: IntoIterator<Item = PresenceEvent>,
    {
        for event in events {
            self.apply(event);
        }
    }

    pub fn upsert_available(&self, identity: PeerIdentity) {
        debug!("Peer {} ({}) available", identity.id, identity.display_name);
        self.entries.insert(
            identity.id.clone(),
            PresenceEntry {
                identity,
                availability: Availability::Available,
            },
        );
    }

    /// Marks the peer whose id, or failing that display name, equals `key`.
    /// Unknown peers are ignored: there is no identity to record them under.
    pub fn mark_unavailable(&self, key: &str) {
        let Some(id) = self.resolve(key) else {
            debug!("Unavailable notice for unknown peer '{}'", key);
            return;
        };
        if let Some(mut entry) = self.entries.get_mut(&id) {
            entry.availability = Availability::Unavailable;
        }
    }

    /// Drops every entry registered under display name (or id) `key`.
    pub fn remove(&self, key: &str) {
        self.entries
            .retain(|id, entry| id.as_str() != key && entry.identity.display_name != key);
    }

    pub fn get(&self, id: &PeerId) -> Option<PresenceEntry> {
        self.entries.get(id).map(|entry| entry.value().clone())
    }

    pub fn is_available(&self, id: &PeerId) -> bool {
        self.entries
            .get(id)
            .is_some_and(|entry| entry.is_available())
    }

    /// Finds the peer registered under display name (or id) `key`.
    pub fn find(&self, key: &str) -> Option<PresenceEntry> {
        self.resolve(key).and_then(|id| self.get(&id))
    }

    /// Snapshot sorted by id.
    pub fn list(&self) -> Vec<PresenceEntry> {
        let mut entries: Vec<_> = self.entries.iter().map(|e| e.value().clone()).collect();
        entries.sort_by(|a, b| a.identity.id.cmp(&b.identity.id));
        entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn resolve(&self, key: &str) -> Option<PeerId> {
        let by_id = PeerId::from(key);
        if self.entries.contains_key(&by_id) {
            return Some(by_id);
        }
        // Several peers may share a name; the lowest id wins.
        self.entries
            .iter()
            .filter(|entry| entry.identity.display_name == key)
            .map(|entry| entry.key().clone())
            .min()
    }
}
