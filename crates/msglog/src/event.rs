//! Message lifecycle events delivered by a gateway source

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! snowflake {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// Raw numeric value
            pub fn get(self) -> u64 {
                self.0
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

snowflake!(
    /// Message identifier
    MessageId
);
snowflake!(
    /// Channel identifier
    ChannelId
);
snowflake!(
    /// Guild identifier. Direct messages have none.
    GuildId
);

/// Last known content and metadata of a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSnapshot {
    /// Author display name
    pub author: String,
    /// Message text
    pub content: String,
    /// Numeric message type
    pub kind: u8,
    /// Message flag bits
    pub flags: u64,
    /// Creation time
    pub timestamp: DateTime<Utc>,
    /// Last edit time, if the message was ever edited
    pub edited: Option<DateTime<Utc>>,
}

impl MessageSnapshot {
    /// Create a snapshot for a plain, unedited message
    pub fn new(author: impl Into<String>, content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            author: author.into(),
            content: content.into(),
            kind: 0,
            flags: 0,
            timestamp,
            edited: None,
        }
    }

    /// Set the edit timestamp
    pub fn with_edited(mut self, edited: DateTime<Utc>) -> Self {
        self.edited = Some(edited);
        self
    }

    /// Set the message type
    pub fn with_kind(mut self, kind: u8) -> Self {
        self.kind = kind;
        self
    }

    /// Set the flag bits
    pub fn with_flags(mut self, flags: u64) -> Self {
        self.flags = flags;
        self
    }
}

/// A message carried by a create or update event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageBody {
    pub id: MessageId,
    pub channel_id: ChannelId,
    pub guild_id: Option<GuildId>,
    pub snapshot: MessageSnapshot,
}

/// Kind of a lifecycle event, used to subscribe handlers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Created,
    Updated,
    Deleted,
    BulkDeleted,
}

impl EventKind {
    /// All event kinds, in declaration order
    pub const ALL: [EventKind; 4] = [
        EventKind::Created,
        EventKind::Updated,
        EventKind::Deleted,
        EventKind::BulkDeleted,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Created => "created",
            EventKind::Updated => "updated",
            EventKind::Deleted => "deleted",
            EventKind::BulkDeleted => "bulk_deleted",
        }
    }
}

/// A message lifecycle event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// A message was posted
    Created(MessageBody),
    /// A message was edited
    Updated(MessageBody),
    /// A single message was deleted. Only identifiers are known.
    Deleted {
        id: MessageId,
        channel_id: ChannelId,
        guild_id: Option<GuildId>,
    },
    /// Several messages in one channel were deleted at once
    BulkDeleted {
        ids: Vec<MessageId>,
        channel_id: ChannelId,
        guild_id: Option<GuildId>,
    },
}

impl LifecycleEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            LifecycleEvent::Created(_) => EventKind::Created,
            LifecycleEvent::Updated(_) => EventKind::Updated,
            LifecycleEvent::Deleted { .. } => EventKind::Deleted,
            LifecycleEvent::BulkDeleted { .. } => EventKind::BulkDeleted,
        }
    }

    pub fn channel_id(&self) -> ChannelId {
        match self {
            LifecycleEvent::Created(body) | LifecycleEvent::Updated(body) => body.channel_id,
            LifecycleEvent::Deleted { channel_id, .. }
            | LifecycleEvent::BulkDeleted { channel_id, .. } => *channel_id,
        }
    }

    pub fn guild_id(&self) -> Option<GuildId> {
        match self {
            LifecycleEvent::Created(body) | LifecycleEvent::Updated(body) => body.guild_id,
            LifecycleEvent::Deleted { guild_id, .. }
            | LifecycleEvent::BulkDeleted { guild_id, .. } => *guild_id,
        }
    }
}
