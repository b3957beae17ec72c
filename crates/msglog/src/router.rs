//! Event routing: turns lifecycle events into audit records

use std::sync::Arc;

use crate::cache::{Lookup, MessageCache};
use crate::emitter::RecordEmitter;
use crate::event::{ChannelId, GuildId, LifecycleEvent, MessageBody, MessageId};
use crate::record::{Action, LogRecord};

/// Resolve a lifecycle event into audit records.
///
/// Creates and updates yield exactly one record built from the event body.
/// A single delete yields one record, a bulk delete one record per id in
/// delivery order. Deletions consult `cache`; a miss and a failed lookup
/// both produce a minimal record carrying only the identifiers.
pub fn resolve(event: &LifecycleEvent, cache: &dyn MessageCache) -> Vec<LogRecord> {
    match event {
        LifecycleEvent::Created(body) => vec![from_body(Action::Create, body)],
        LifecycleEvent::Updated(body) => vec![from_body(Action::Update, body)],
        LifecycleEvent::Deleted {
            id,
            channel_id,
            guild_id,
        } => vec![resolve_delete(cache, *id, *channel_id, *guild_id)],
        LifecycleEvent::BulkDeleted {
            ids,
            channel_id,
            guild_id,
        } => ids
            .iter()
            .map(|id| resolve_delete(cache, *id, *channel_id, *guild_id))
            .collect(),
    }
}

fn from_body(action: Action, body: &MessageBody) -> LogRecord {
    LogRecord::full(
        action,
        body.id,
        body.channel_id,
        body.guild_id,
        body.snapshot.clone(),
    )
}

fn resolve_delete(
    cache: &dyn MessageCache,
    id: MessageId,
    channel_id: ChannelId,
    guild_id: Option<GuildId>,
) -> LogRecord {
    let lookup = cache.lookup(channel_id, id);
    if let Lookup::Failed(reason) = &lookup {
        tracing::debug!(
            cache = cache.name(),
            message_id = %id,
            channel_id = %channel_id,
            reason = %reason,
            "Cache lookup failed, emitting minimal record"
        );
    }

    match lookup.into_snapshot() {
        Some(snapshot) => LogRecord::full(Action::Delete, id, channel_id, guild_id, snapshot),
        None => LogRecord::minimal(id, channel_id, guild_id),
    }
}

/// Routes events from a source's cache to the record emitter
#[derive(Clone)]
pub struct EventRouter {
    cache: Arc<dyn MessageCache>,
    emitter: RecordEmitter,
}

impl EventRouter {
    pub fn new(cache: Arc<dyn MessageCache>, emitter: RecordEmitter) -> Self {
        Self { cache, emitter }
    }

    /// Resolve `event` and emit every resulting record.
    ///
    /// Returns the number of records produced.
    pub fn route(&self, event: &LifecycleEvent) -> usize {
        let records = resolve(event, self.cache.as_ref());
        for record in &records {
            let written = self.emitter.emit(record);
            tracing::trace!(
                action = record.action.as_str(),
                message_id = %record.id,
                resolved = record.is_resolved(),
                written,
                "Record emitted"
            );
        }
        records.len()
    }
}
