use std::collections::HashSet;

use chrono::{DateTime, Utc};
use dashmap::DashMap;

/// Public view of a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub name: String,
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub member_count: usize,
}

#[derive(Debug)]
struct ChannelEntry {
    display_name: Option<String>,
    created_at: DateTime<Utc>,
    members: HashSet<String>,
}

impl ChannelEntry {
    fn new(display_name: Option<String>) -> Self {
        Self {
            display_name,
            created_at: Utc::now(),
            members: HashSet::new(),
        }
    }

    fn info(&self, name: &str) -> ChannelInfo {
        ChannelInfo {
            name: name.to_string(),
            display_name: self.display_name.clone(),
            created_at: self.created_at,
            member_count: self.members.len(),
        }
    }
}

/// Channel/room index: channel name -> member connection ids.
///
/// The reverse side (connection -> channels) lives on the connection record
/// in the registry; `ConnectionHub` keeps both sides in step.
#[derive(Default)]
pub struct ChannelIndex {
    channels: DashMap<String, ChannelEntry>,
}

impl ChannelIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the channel if absent. A given display name replaces the old one.
    pub fn create(&self, name: &str, display_name: Option<String>) -> ChannelInfo {
        let mut entry = self
            .channels
            .entry(name.to_string())
            .or_insert_with(|| ChannelEntry::new(None));
        if display_name.is_some() {
            entry.display_name = display_name;
        }
        entry.info(name)
    }

    /// Returns true if the member was newly added.
    pub fn add_member(&self, name: &str, connection_id: &str) -> bool {
        self.channels
            .entry(name.to_string())
            .or_insert_with(|| ChannelEntry::new(None))
            .members
            .insert(connection_id.to_string())
    }

    /// Returns true if the member was present. Deletes the channel once empty.
    pub fn remove_member(&self, name: &str, connection_id: &str) -> bool {
        let removed = match self.channels.get_mut(name) {
            Some(mut entry) => entry.members.remove(connection_id),
            None => return false,
        };
        if removed {
            self.channels.remove_if(name, |_, e| e.members.is_empty());
        }
        removed
    }

    pub fn members_of(&self, name: &str) -> HashSet<String> {
        self.channels
            .get(name)
            .map(|e| e.members.clone())
            .unwrap_or_default()
    }

    pub fn member_count(&self, name: &str) -> usize {
        self.channels.get(name).map(|e| e.members.len()).unwrap_or(0)
    }

    pub fn is_member(&self, name: &str, connection_id: &str) -> bool {
        self.channels
            .get(name)
            .is_some_and(|e| e.members.contains(connection_id))
    }

    pub fn info(&self, name: &str) -> Option<ChannelInfo> {
        self.channels.get(name).map(|e| e.info(name))
    }

    /// All channels, sorted by name.
    pub fn list(&self) -> Vec<ChannelInfo> {
        let mut out: Vec<ChannelInfo> = self
            .channels
            .iter()
            .map(|e| e.value().info(e.key()))
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn clear(&self) {
        self.channels.clear();
    }
}
