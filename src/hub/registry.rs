/// Connection registry
///
/// Tracks which live connections subscribe to which channel, per
/// application. Layout:
///
/// ```text
/// apps: app_id -> AppNamespace
///     shards[hash(channel) % n]: channel -> { connection_id -> connection }
///     memberships:               connection_id -> { channels }
/// ```
///
/// Fan-out only takes one shard's read lock, long enough to clone the
/// subscriber list. Writers take the app's membership lock, then the shard
/// write lock (always in that order), so removing a connection from every
/// channel cannot race with it being added to a new one.
use parking_lot::{Mutex, RwLock};
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::connection::{Connection, ConnectionId};
use crate::errors::FanoutError;
use crate::logger::{self, LogTag};

type Subscribers = HashMap<ConnectionId, Arc<dyn Connection>>;
type Shard = RwLock<HashMap<String, Subscribers>>;

struct MemberRecord {
    connection: Arc<dyn Connection>,
    channels: HashSet<String>,
}

struct AppNamespace {
    shards: Vec<Shard>,
    memberships: Mutex<HashMap<ConnectionId, MemberRecord>>,
}

/// Outcome of `register`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Registration {
    /// The channel had no subscribers before this call
    pub channel_created: bool,
    /// The connection was not already subscribed
    pub added: bool,
}

/// Outcome of `unregister`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Unregistration {
    pub removed: bool,
    /// The channel became empty and was dropped
    pub channel_pruned: bool,
}

/// Outcome of `remove_connection`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemovedConnection {
    /// Channels the connection was removed from
    pub channels: Vec<String>,
    /// Subset of `channels` that became empty and were dropped
    pub pruned: Vec<String>,
}

impl AppNamespace {
    fn new(num_shards: usize) -> Self {
        Self {
            shards: (0..num_shards).map(|_| RwLock::new(HashMap::new())).collect(),
            memberships: Mutex::new(HashMap::new()),
        }
    }

    fn shard_for(&self, channel: &str) -> &Shard {
        &self.shards[shard_index(channel, self.shards.len())]
    }

    /// Remove one connection from one channel. Caller holds the membership lock.
    fn remove_from_channel(&self, channel: &str, id: ConnectionId) -> Unregistration {
        let mut shard = self.shard_for(channel).write();
        let Some(subscribers) = shard.get_mut(channel) else {
            return Unregistration::default();
        };

        let removed = subscribers.remove(&id).is_some();
        let channel_pruned = subscribers.is_empty();
        if channel_pruned {
            shard.remove(channel);
        }

        Unregistration {
            removed,
            channel_pruned,
        }
    }
}

/// Deterministic shard index for a channel name
pub fn shard_index(channel: &str, num_shards: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    channel.hash(&mut hasher);
    (hasher.finish() % num_shards.max(1) as u64) as usize
}

// ============================================================================
// REGISTRY
// ============================================================================

pub struct ConnectionRegistry {
    apps: RwLock<HashMap<String, Arc<AppNamespace>>>,
    num_shards: usize,
    shut_down: AtomicBool,
}

impl ConnectionRegistry {
    pub fn new(num_shards: usize) -> Self {
        Self {
            apps: RwLock::new(HashMap::new()),
            num_shards: num_shards.clamp(1, 64),
            shut_down: AtomicBool::new(false),
        }
    }

    pub fn num_shards(&self) -> usize {
        self.num_shards
    }

    fn namespace(&self, app_id: &str) -> Option<Arc<AppNamespace>> {
        self.apps.read().get(app_id).cloned()
    }

    /// Get or create an application namespace
    fn namespace_or_create(&self, app_id: &str) -> Arc<AppNamespace> {
        if let Some(ns) = self.namespace(app_id) {
            return ns;
        }

        let mut apps = self.apps.write();
        apps.entry(app_id.to_string())
            .or_insert_with(|| {
                logger::debug(
                    LogTag::Registry,
                    &format!("application namespace created: {}", app_id),
                );
                Arc::new(AppNamespace::new(self.num_shards))
            })
            .clone()
    }

    /// Subscribe a connection to a channel
    ///
    /// Subscribing the same connection twice is a no-op (`added == false`).
    pub fn register(
        &self,
        app_id: &str,
        channel: &str,
        connection: Arc<dyn Connection>,
    ) -> Result<Registration, FanoutError> {
        if self.is_shut_down() {
            return Err(FanoutError::StructuralFailure(
                "registry is shut down".to_string(),
            ));
        }

        let ns = self.namespace_or_create(app_id);
        let id = connection.id();

        let mut memberships = ns.memberships.lock();
        let registration = {
            let mut shard = ns.shard_for(channel).write();
            let channel_created = !shard.contains_key(channel);
            let subscribers = shard.entry(channel.to_string()).or_default();
            let added = !subscribers.contains_key(&id);
            if added {
                subscribers.insert(id, Arc::clone(&connection));
            }
            Registration {
                channel_created,
                added,
            }
        };

        memberships
            .entry(id)
            .or_insert_with(|| MemberRecord {
                connection,
                channels: HashSet::new(),
            })
            .channels
            .insert(channel.to_string());

        Ok(registration)
    }

    /// Remove a connection from one channel, pruning the channel if it empties
    pub fn unregister(&self, app_id: &str, channel: &str, id: ConnectionId) -> Unregistration {
        let Some(ns) = self.namespace(app_id) else {
            return Unregistration::default();
        };

        let mut memberships = ns.memberships.lock();
        let result = ns.remove_from_channel(channel, id);

        if let Some(record) = memberships.get_mut(&id) {
            record.channels.remove(channel);
            if record.channels.is_empty() {
                memberships.remove(&id);
            }
        }

        result
    }

    /// Remove a connection from every channel of an application
    pub fn remove_connection(&self, app_id: &str, id: ConnectionId) -> RemovedConnection {
        let Some(ns) = self.namespace(app_id) else {
            return RemovedConnection::default();
        };

        let mut memberships = ns.memberships.lock();
        let Some(record) = memberships.remove(&id) else {
            return RemovedConnection::default();
        };

        let mut removed = RemovedConnection::default();
        for channel in record.channels {
            let result = ns.remove_from_channel(&channel, id);
            if result.channel_pruned {
                removed.pruned.push(channel.clone());
            }
            removed.channels.push(channel);
        }
        removed.channels.sort();
        removed.pruned.sort();
        removed
    }

    /// Snapshot of a channel's subscribers (empty for unknown app or channel)
    pub fn subscribers_of(&self, app_id: &str, channel: &str) -> Vec<Arc<dyn Connection>> {
        let Some(ns) = self.namespace(app_id) else {
            return Vec::new();
        };

        let shard = ns.shard_for(channel).read();
        shard
            .get(channel)
            .map(|subscribers| subscribers.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn subscriber_count(&self, app_id: &str, channel: &str) -> usize {
        self.namespace(app_id)
            .map(|ns| {
                ns.shard_for(channel)
                    .read()
                    .get(channel)
                    .map(HashMap::len)
                    .unwrap_or(0)
            })
            .unwrap_or(0)
    }

    pub fn is_subscribed(&self, app_id: &str, channel: &str, id: ConnectionId) -> bool {
        self.namespace(app_id)
            .map(|ns| {
                ns.shard_for(channel)
                    .read()
                    .get(channel)
                    .map(|subscribers| subscribers.contains_key(&id))
                    .unwrap_or(false)
            })
            .unwrap_or(false)
    }

    /// Channels a connection is subscribed to, sorted
    pub fn channels_of(&self, app_id: &str, id: ConnectionId) -> Vec<String> {
        let Some(ns) = self.namespace(app_id) else {
            return Vec::new();
        };
        let memberships = ns.memberships.lock();
        let mut channels: Vec<String> = memberships
            .get(&id)
            .map(|record| record.channels.iter().cloned().collect())
            .unwrap_or_default();
        channels.sort();
        channels
    }

    /// Occupied channels in an application, sorted
    pub fn channel_names(&self, app_id: &str) -> Vec<String> {
        let Some(ns) = self.namespace(app_id) else {
            return Vec::new();
        };
        let mut names: Vec<String> = ns
            .shards
            .iter()
            .flat_map(|shard| shard.read().keys().cloned().collect::<Vec<_>>())
            .collect();
        names.sort();
        names
    }

    pub fn channel_count(&self, app_id: &str) -> usize {
        self.namespace(app_id)
            .map(|ns| ns.shards.iter().map(|shard| shard.read().len()).sum())
            .unwrap_or(0)
    }

    pub fn has_app(&self, app_id: &str) -> bool {
        self.apps.read().contains_key(app_id)
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Tear down all state and close every subscribed connection
    ///
    /// Returns the number of connections closed. Later registrations fail
    /// with `StructuralFailure`.
    pub fn shutdown(&self) -> usize {
        self.shut_down.store(true, Ordering::Release);

        let apps: Vec<Arc<AppNamespace>> = self.apps.write().drain().map(|(_, ns)| ns).collect();

        let mut closed = 0;
        for ns in apps {
            let records: Vec<MemberRecord> =
                ns.memberships.lock().drain().map(|(_, record)| record).collect();
            for shard in &ns.shards {
                shard.write().clear();
            }
            for record in records {
                record.connection.close();
                closed += 1;
            }
        }

        logger::info(
            LogTag::Registry,
            &format!("registry shut down, {} connections closed", closed),
        );
        closed
    }
}
