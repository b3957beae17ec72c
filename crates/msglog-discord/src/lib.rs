//! Discord gateway source for msglog
//!
//! Connects a bot account with serenity and relays message creates, updates
//! and deletions to the audit pipeline. The source keeps its own bounded
//! message cache: serenity drops a deleted message from its cache before the
//! delete handler runs, which would leave every deletion unresolved.

mod convert;

use async_trait::async_trait;
use msglog::{
    EventHandlers, EventSource, LifecycleEvent, MemoryCache, MessageCache, SessionInfo,
};
use serenity::all as discord;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Gateway intents needed to observe guild and direct messages with content
pub fn intents() -> discord::GatewayIntents {
    discord::GatewayIntents::GUILDS
        | discord::GatewayIntents::GUILD_MESSAGES
        | discord::GatewayIntents::DIRECT_MESSAGES
        | discord::GatewayIntents::MESSAGE_CONTENT
}

/// Event source backed by a Discord bot session
pub struct DiscordSource {
    token: String,
    cache: MemoryCache,
}

impl DiscordSource {
    /// Create a source for the bot `token`, caching up to `max_per_channel`
    /// messages per channel
    pub fn new(token: impl Into<String>, max_per_channel: usize) -> Self {
        Self {
            token: token.into(),
            cache: MemoryCache::new(max_per_channel),
        }
    }
}

#[async_trait]
impl EventSource for DiscordSource {
    async fn start(&self, handlers: EventHandlers, cancel: CancellationToken) -> anyhow::Result<()> {
        let relay = Relay {
            handlers,
            cache: self.cache.clone(),
        };

        let mut client = discord::Client::builder(&self.token, intents())
            .event_handler(relay)
            .await?;

        let shard_manager = client.shard_manager.clone();
        let watcher = tokio::spawn(async move {
            cancel.cancelled().await;
            info!("Closing Discord session");
            shard_manager.shutdown_all().await;
        });

        info!("Connecting to Discord gateway");
        let result = client.start().await;
        watcher.abort();

        result?;
        info!("Discord session ended");
        Ok(())
    }

    fn cache(&self) -> Arc<dyn MessageCache> {
        Arc::new(self.cache.clone())
    }

    fn name(&self) -> &'static str {
        "Discord"
    }
}

/// Bridges serenity callbacks to the pipeline handlers
struct Relay {
    handlers: EventHandlers,
    cache: MemoryCache,
}

impl Relay {
    fn deliver(&self, event: LifecycleEvent) {
        self.cache.observe(&event);
        let invoked = self.handlers.dispatch(&event);
        self.cache.forget(&event);
        debug!(kind = event.kind().as_str(), handlers = invoked, "Relayed event");
    }
}

#[async_trait]
impl discord::EventHandler for Relay {
    async fn ready(&self, _ctx: discord::Context, ready: discord::Ready) {
        self.handlers
            .ready(&SessionInfo::new(ready.user.name.clone(), ready.guilds.len()));
    }

    async fn message(&self, _ctx: discord::Context, message: discord::Message) {
        self.deliver(convert::created(&message));
    }

    async fn message_update(
        &self,
        _ctx: discord::Context,
        _old: Option<discord::Message>,
        _new: Option<discord::Message>,
        event: discord::MessageUpdateEvent,
    ) {
        let previous = self.cache.get(
            convert::channel_id(event.channel_id),
            convert::message_id(event.id),
        );
        if previous.is_none() {
            debug!(id = %event.id, "Update for a message that was never cached");
        }
        self.deliver(convert::updated(&event, previous));
    }

    async fn message_delete(
        &self,
        _ctx: discord::Context,
        channel_id: discord::ChannelId,
        message_id: discord::MessageId,
        guild_id: Option<discord::GuildId>,
    ) {
        self.deliver(LifecycleEvent::Deleted {
            id: convert::message_id(message_id),
            channel_id: convert::channel_id(channel_id),
            guild_id: convert::guild_id(guild_id),
        });
    }

    async fn message_delete_bulk(
        &self,
        _ctx: discord::Context,
        channel_id: discord::ChannelId,
        message_ids: Vec<discord::MessageId>,
        guild_id: Option<discord::GuildId>,
    ) {
        if message_ids.is_empty() {
            warn!(channel = %channel_id, "Bulk delete without message ids");
        }
        self.deliver(LifecycleEvent::BulkDeleted {
            ids: message_ids.into_iter().map(convert::message_id).collect(),
            channel_id: convert::channel_id(channel_id),
            guild_id: convert::guild_id(guild_id),
        });
    }
}
