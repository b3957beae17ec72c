//! Message cache lookup and an in-memory implementation
//!
//! The cache belongs to the gateway source: the source records snapshots as
//! it observes creates and updates, the router only reads.

use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::event::{ChannelId, LifecycleEvent, MessageBody, MessageId, MessageSnapshot};

/// Outcome of a cache lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// The cache holds a snapshot for the message
    Found(MessageSnapshot),
    /// The message is unknown to the cache
    Absent,
    /// The cache could not answer
    Failed(String),
}

impl Lookup {
    /// The snapshot, if the lookup found one. Absent and failed lookups
    /// both resolve to `None`.
    pub fn into_snapshot(self) -> Option<MessageSnapshot> {
        match self {
            Lookup::Found(snapshot) => Some(snapshot),
            Lookup::Absent | Lookup::Failed(_) => None,
        }
    }
}

/// Read-only view of a message cache
///
/// # Example
///
/// ```rust,ignore
/// use msglog::{ChannelId, Lookup, MessageCache, MessageId};
///
/// struct RemoteCache { client: KvClient }
///
/// impl MessageCache for RemoteCache {
///     fn lookup(&self, channel: ChannelId, message: MessageId) -> Lookup {
///         match self.client.get(&format!("{channel}:{message}")) {
///             Ok(Some(raw)) => Lookup::Found(decode(raw)),
///             Ok(None) => Lookup::Absent,
///             Err(e) => Lookup::Failed(e.to_string()),
///         }
///     }
///
///     fn name(&self) -> &'static str { "Remote" }
/// }
/// ```
pub trait MessageCache: Send + Sync + 'static {
    /// Look up the last known snapshot of a message
    fn lookup(&self, channel: ChannelId, message: MessageId) -> Lookup;

    /// Return the cache name (for logging)
    fn name(&self) -> &'static str;
}

/// In-memory message cache bounded per channel
///
/// When a channel exceeds its capacity the oldest messages are evicted.
#[derive(Clone)]
pub struct MemoryCache {
    channels: Arc<DashMap<ChannelId, VecDeque<(MessageId, MessageSnapshot)>>>,
    max_per_channel: usize,
}

impl MemoryCache {
    /// Create a new memory cache with specified capacity per channel
    pub fn new(max_per_channel: usize) -> Self {
        Self {
            channels: Arc::new(DashMap::new()),
            max_per_channel,
        }
    }

    /// Record or replace a message snapshot
    pub fn insert(&self, channel: ChannelId, message: MessageId, snapshot: MessageSnapshot) {
        if self.max_per_channel == 0 {
            return;
        }

        let mut entries = self.channels.entry(channel).or_default();
        if let Some(slot) = entries.iter_mut().find(|(id, _)| *id == message) {
            slot.1 = snapshot;
            return;
        }

        entries.push_back((message, snapshot));
        while entries.len() > self.max_per_channel {
            entries.pop_front();
        }
    }

    /// Drop a message from the cache. A channel left without messages is
    /// dropped as well.
    pub fn remove(&self, channel: ChannelId, message: MessageId) -> Option<MessageSnapshot> {
        let removed = {
            let mut entries = self.channels.get_mut(&channel)?;
            let pos = entries.iter().position(|(id, _)| *id == message)?;
            entries.remove(pos).map(|(_, snapshot)| snapshot)
        };
        self.channels.remove_if(&channel, |_, entries| entries.is_empty());
        removed
    }

    /// Snapshot of a message, if cached
    pub fn get(&self, channel: ChannelId, message: MessageId) -> Option<MessageSnapshot> {
        self.channels
            .get(&channel)?
            .iter()
            .find(|(id, _)| *id == message)
            .map(|(_, snapshot)| snapshot.clone())
    }

    /// Record the message carried by a create or update event
    pub fn observe(&self, event: &LifecycleEvent) {
        if let LifecycleEvent::Created(body) | LifecycleEvent::Updated(body) = event {
            let MessageBody { id, channel_id, snapshot, .. } = body;
            self.insert(*channel_id, *id, snapshot.clone());
        }
    }

    /// Drop the messages removed by a delete event
    pub fn forget(&self, event: &LifecycleEvent) {
        match event {
            LifecycleEvent::Deleted { id, channel_id, .. } => {
                self.remove(*channel_id, *id);
            }
            LifecycleEvent::BulkDeleted { ids, channel_id, .. } => {
                for id in ids {
                    self.remove(*channel_id, *id);
                }
            }
            _ => {}
        }
    }

    /// Number of cached messages across all channels
    pub fn len(&self) -> usize {
        self.channels.iter().map(|e| e.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of channels holding at least one message
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(100)
    }
}

impl MessageCache for MemoryCache {
    fn lookup(&self, channel: ChannelId, message: MessageId) -> Lookup {
        match self.get(channel, message) {
            Some(snapshot) => Lookup::Found(snapshot),
            None => Lookup::Absent,
        }
    }

    fn name(&self) -> &'static str {
        "Memory"
    }
}

/// A cache that never knows any message
#[derive(Clone, Default)]
pub struct NoopCache;

impl MessageCache for NoopCache {
    fn lookup(&self, _channel: ChannelId, _message: MessageId) -> Lookup {
        Lookup::Absent
    }

    fn name(&self) -> &'static str {
        "Noop (disabled)"
    }
}
