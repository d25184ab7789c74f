use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use serde_json::Value;
use tokio::time::{Duration, Instant};

use wshub_core::error::{HubError, Result};

use super::sink::ConnectionSink;

/// Snapshot of one live connection.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub connection_id: String,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub connected_at: DateTime<Utc>,
    pub last_heartbeat: Instant,
    pub subscribed_channels: BTreeSet<String>,
    pub metadata: HashMap<String, Value>,
}

/// Optional attributes supplied at registration.
#[derive(Debug, Clone, Default)]
pub struct ConnectionOptions {
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub metadata: HashMap<String, Value>,
}

impl ConnectionOptions {
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Self::default()
        }
    }
}

struct ConnectionEntry {
    info: ConnectionInfo,
    sink: Arc<dyn ConnectionSink>,
}

/// Connection registry:
/// - `connection_id -> (record, sink)`
/// - `user_id -> {connection_id...}`
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: DashMap<String, ConnectionEntry>,
    user_index: DashMap<String, DashSet<String>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new record. Rejects an id that is already live.
    pub fn insert(
        &self,
        connection_id: &str,
        sink: Arc<dyn ConnectionSink>,
        opts: ConnectionOptions,
    ) -> Result<()> {
        match self.connections.entry(connection_id.to_string()) {
            Entry::Occupied(_) => {
                return Err(HubError::DuplicateConnection(connection_id.to_string()));
            }
            Entry::Vacant(slot) => {
                // Indexed under the shard lock so a racing remove sees it.
                if let Some(user) = opts.user_id.as_deref() {
                    self.user_index
                        .entry(user.to_string())
                        .or_insert_with(DashSet::new)
                        .insert(connection_id.to_string());
                }
                slot.insert(ConnectionEntry {
                    info: ConnectionInfo {
                        connection_id: connection_id.to_string(),
                        user_id: opts.user_id,
                        session_id: opts.session_id,
                        connected_at: Utc::now(),
                        last_heartbeat: Instant::now(),
                        subscribed_channels: BTreeSet::new(),
                        metadata: opts.metadata,
                    },
                    sink,
                });
            }
        }

        Ok(())
    }

    /// Remove a record, returning it with its sink.
    pub fn remove(&self, connection_id: &str) -> Option<(ConnectionInfo, Arc<dyn ConnectionSink>)> {
        let (_, entry) = self.connections.remove(connection_id)?;
        self.unindex_user(&entry.info);
        Some((entry.info, entry.sink))
    }

    /// Remove a record only if it is still stale at `now`. A heartbeat racing
    /// with the liveness scan keeps the connection.
    pub fn remove_if_stale(
        &self,
        connection_id: &str,
        now: Instant,
        timeout: Duration,
    ) -> Option<(ConnectionInfo, Arc<dyn ConnectionSink>)> {
        let (_, entry) = self
            .connections
            .remove_if(connection_id, |_, e| is_stale(&e.info, now, timeout))?;
        self.unindex_user(&entry.info);
        Some((entry.info, entry.sink))
    }

    /// Remove a record only if it still holds `sink`. A failed write on an
    /// old handle must not tear down a newer connection that reused the id.
    pub fn remove_if_sink(
        &self,
        connection_id: &str,
        sink: &Arc<dyn ConnectionSink>,
    ) -> Option<(ConnectionInfo, Arc<dyn ConnectionSink>)> {
        let (_, entry) = self
            .connections
            .remove_if(connection_id, |_, e| Arc::ptr_eq(&e.sink, sink))?;
        self.unindex_user(&entry.info);
        Some((entry.info, entry.sink))
    }

    fn unindex_user(&self, info: &ConnectionInfo) {
        let Some(user) = info.user_id.as_deref() else { return };
        if let Some(set) = self.user_index.get(user) {
            set.remove(&info.connection_id);
        }
        self.user_index.remove_if(user, |_, set| set.is_empty());
    }

    /// Refresh `last_heartbeat`. Returns false if the connection is gone.
    pub fn touch(&self, connection_id: &str, now: Instant) -> bool {
        match self.connections.get_mut(connection_id) {
            Some(mut e) => {
                e.info.last_heartbeat = now;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, connection_id: &str) -> Option<ConnectionInfo> {
        self.connections.get(connection_id).map(|e| e.info.clone())
    }

    pub fn sink(&self, connection_id: &str) -> Option<Arc<dyn ConnectionSink>> {
        self.connections
            .get(connection_id)
            .map(|e| Arc::clone(&e.sink))
    }

    /// Run `f` on the record while its shard is write-locked.
    pub fn update<R>(&self, connection_id: &str, f: impl FnOnce(&mut ConnectionInfo) -> R) -> Option<R> {
        self.connections
            .get_mut(connection_id)
            .map(|mut e| f(&mut e.info))
    }

    pub fn contains(&self, connection_id: &str) -> bool {
        self.connections.contains_key(connection_id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn ids(&self) -> Vec<String> {
        self.connections.iter().map(|e| e.key().clone()).collect()
    }

    pub fn ids_for_user(&self, user_id: &str) -> Vec<String> {
        self.user_index
            .get(user_id)
            .map(|set| set.iter().map(|s| s.key().clone()).collect())
            .unwrap_or_default()
    }

    /// Every (id, sink) pair except `exclude`.
    pub fn all_sinks(&self, exclude: Option<&str>) -> Vec<(String, Arc<dyn ConnectionSink>)> {
        self.connections
            .iter()
            .filter(|e| Some(e.key().as_str()) != exclude)
            .map(|e| (e.key().clone(), Arc::clone(&e.sink)))
            .collect()
    }

    pub fn stale_ids(&self, now: Instant, timeout: Duration) -> Vec<String> {
        self.connections
            .iter()
            .filter(|e| is_stale(&e.info, now, timeout))
            .map(|e| e.key().clone())
            .collect()
    }

    /// Drop everything, returning the sinks so the caller can close them.
    pub fn drain(&self) -> Vec<Arc<dyn ConnectionSink>> {
        let ids = self.ids();
        let sinks = ids
            .iter()
            .filter_map(|id| self.connections.remove(id).map(|(_, e)| e.sink))
            .collect();
        self.user_index.clear();
        sinks
    }
}

fn is_stale(info: &ConnectionInfo, now: Instant, timeout: Duration) -> bool {
    now.saturating_duration_since(info.last_heartbeat) > timeout
}
