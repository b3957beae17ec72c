//! Conversion from serenity models to lifecycle events

use chrono::{DateTime, Utc};
use msglog::emitter::zero_time;
use msglog::{ChannelId, GuildId, LifecycleEvent, MessageBody, MessageId, MessageSnapshot};
use serenity::all as discord;

pub(crate) fn message_id(id: discord::MessageId) -> MessageId {
    MessageId(id.get())
}

pub(crate) fn channel_id(id: discord::ChannelId) -> ChannelId {
    ChannelId(id.get())
}

pub(crate) fn guild_id(id: Option<discord::GuildId>) -> Option<GuildId> {
    id.map(|g| GuildId(g.get()))
}

pub(crate) fn to_utc(ts: &discord::Timestamp) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&ts.to_string())
        .map(|t| t.with_timezone(&Utc))
        .ok()
        .or_else(|| DateTime::from_timestamp(ts.unix_timestamp(), 0))
        .unwrap_or_default()
}

/// Body of a complete message
pub(crate) fn body_from_message(msg: &discord::Message) -> MessageBody {
    MessageBody {
        id: message_id(msg.id),
        channel_id: channel_id(msg.channel_id),
        guild_id: guild_id(msg.guild_id),
        snapshot: MessageSnapshot {
            author: msg.author.name.clone(),
            content: msg.content.clone(),
            kind: u8::from(msg.kind),
            flags: msg.flags.map_or(0, |f| f.bits()),
            timestamp: to_utc(&msg.timestamp),
            edited: msg.edited_timestamp.as_ref().map(to_utc),
        },
    }
}

pub(crate) fn created(msg: &discord::Message) -> LifecycleEvent {
    LifecycleEvent::Created(body_from_message(msg))
}

/// Fields carried by a message update. The gateway only sends what changed.
#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct PartialUpdate {
    pub author: Option<String>,
    pub content: Option<String>,
    pub kind: Option<u8>,
    pub flags: Option<u64>,
    pub timestamp: Option<DateTime<Utc>>,
    pub edited: Option<DateTime<Utc>>,
}

impl PartialUpdate {
    pub fn from_event(event: &discord::MessageUpdateEvent) -> Self {
        Self {
            author: event.author.as_ref().map(|u| u.name.clone()),
            content: event.content.clone(),
            kind: event.kind.map(u8::from),
            flags: event.flags.map(|f| f.map_or(0, |f| f.bits())),
            timestamp: event.timestamp.as_ref().map(to_utc),
            edited: event.edited_timestamp.as_ref().map(to_utc),
        }
    }

    /// Merge over the previously known snapshot. Missing fields keep their
    /// previous value, or the zero value when the message was never seen.
    pub fn apply(self, previous: Option<MessageSnapshot>) -> MessageSnapshot {
        let base = previous.unwrap_or_else(|| MessageSnapshot::new("", "", zero_time()));
        MessageSnapshot {
            author: self.author.unwrap_or(base.author),
            content: self.content.unwrap_or(base.content),
            kind: self.kind.unwrap_or(base.kind),
            flags: self.flags.unwrap_or(base.flags),
            timestamp: self.timestamp.unwrap_or(base.timestamp),
            edited: self.edited.or(base.edited),
        }
    }
}

pub(crate) fn updated(
    event: &discord::MessageUpdateEvent,
    previous: Option<MessageSnapshot>,
) -> LifecycleEvent {
    LifecycleEvent::Updated(MessageBody {
        id: message_id(event.id),
        channel_id: channel_id(event.channel_id),
        guild_id: guild_id(event.guild_id),
        snapshot: PartialUpdate::from_event(event).apply(previous),
    })
}
