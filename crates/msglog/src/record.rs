//! Normalized audit records

use serde::Serialize;

use crate::event::{ChannelId, GuildId, MessageId, MessageSnapshot};

/// Action tag of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Update,
    Delete,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }
}

/// One audit record, ready for emission
///
/// Identifiers are always present. `snapshot` is `None` only for deletions
/// whose original content could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub action: Action,
    pub id: MessageId,
    pub channel_id: ChannelId,
    pub guild_id: Option<GuildId>,
    pub snapshot: Option<MessageSnapshot>,
}

impl LogRecord {
    /// A record carrying the full message snapshot
    pub fn full(
        action: Action,
        id: MessageId,
        channel_id: ChannelId,
        guild_id: Option<GuildId>,
        snapshot: MessageSnapshot,
    ) -> Self {
        Self {
            action,
            id,
            channel_id,
            guild_id,
            snapshot: Some(snapshot),
        }
    }

    /// A deletion record with identifiers only
    pub fn minimal(id: MessageId, channel_id: ChannelId, guild_id: Option<GuildId>) -> Self {
        Self {
            action: Action::Delete,
            id,
            channel_id,
            guild_id,
            snapshot: None,
        }
    }

    /// Whether the message content was resolved
    pub fn is_resolved(&self) -> bool {
        self.snapshot.is_some()
    }

    /// Guild as emitted: zero for direct messages
    pub fn guild(&self) -> u64 {
        self.guild_id.map_or(0, GuildId::get)
    }
}
