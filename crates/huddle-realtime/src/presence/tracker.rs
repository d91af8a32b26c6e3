//! Clients currently present on the active channel.

use dashmap::DashMap;

use huddle_core::types::{PresenceAction, PresenceMember};

/// Live set of present members keyed by client id.
#[derive(Debug, Default)]
pub struct PresenceSet {
    /// Client id → latest member record
    members: DashMap<String, PresenceMember>,
}

impl PresenceSet {
    /// Create an empty presence set
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one presence event.
    ///
    /// Enter/present/update insert or refresh the member, leave removes it.
    /// Returns `true` if membership changed.
    pub fn apply(&self, member: PresenceMember) -> bool {
        if member.last_event == PresenceAction::Leave {
            return self.members.remove(&member.client_id).is_some();
        }
        self.members
            .insert(member.client_id.clone(), member)
            .is_none()
    }

    /// Replace the whole set with a fetched member list
    pub fn reset(&self, members: Vec<PresenceMember>) {
        self.members.clear();
        for member in members.into_iter().filter(|m| m.last_event.is_present()) {
            self.members.insert(member.client_id.clone(), member);
        }
    }

    /// Remove everyone
    pub fn clear(&self) {
        self.members.clear();
    }

    /// Whether a client is present
    pub fn contains(&self, client_id: &str) -> bool {
        self.members.contains_key(client_id)
    }

    /// Sorted client ids
    pub fn client_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.members.iter().map(|r| r.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Member records, sorted by client id
    pub fn members(&self) -> Vec<PresenceMember> {
        let mut members: Vec<PresenceMember> =
            self.members.iter().map(|r| r.value().clone()).collect();
        members.sort_by(|a, b| a.client_id.cmp(&b.client_id));
        members
    }

    /// Member count
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether nobody is present
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
