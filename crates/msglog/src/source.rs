//! Event Source trait and implementations
//!
//! Implement `EventSource` to deliver message lifecycle events from any gateway.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::cache::{MemoryCache, MessageCache};
use crate::event::{EventKind, LifecycleEvent};

/// Details of an established gateway session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    /// Name of the account the session runs as
    pub user: String,
    /// Number of guilds visible to the session
    pub guilds: usize,
}

impl SessionInfo {
    pub fn new(user: impl Into<String>, guilds: usize) -> Self {
        Self {
            user: user.into(),
            guilds,
        }
    }
}

/// Lifecycle event callback type
pub type EventHandler = Arc<dyn Fn(&LifecycleEvent) + Send + Sync>;

/// Session established callback type
pub type ReadyHandler = Arc<dyn Fn(&SessionInfo) + Send + Sync>;

#[derive(Default)]
struct Registry {
    events: HashMap<EventKind, Vec<EventHandler>>,
    ready: Vec<ReadyHandler>,
}

/// Handlers subscribed per event kind
///
/// Sources call [`EventHandlers::dispatch`] for every event and
/// [`EventHandlers::ready`] each time a session is established. Handlers may
/// be invoked concurrently.
#[derive(Clone, Default)]
pub struct EventHandlers {
    registry: Arc<Registry>,
}

impl EventHandlers {
    pub fn builder() -> EventHandlersBuilder {
        EventHandlersBuilder::default()
    }

    /// Deliver an event to the handlers subscribed to its kind.
    ///
    /// Returns the number of handlers invoked.
    pub fn dispatch(&self, event: &LifecycleEvent) -> usize {
        let Some(handlers) = self.registry.events.get(&event.kind()) else {
            tracing::trace!(kind = event.kind().as_str(), "No handler subscribed");
            return 0;
        };

        for handler in handlers {
            handler(event);
        }
        handlers.len()
    }

    /// Announce an established session
    pub fn ready(&self, info: &SessionInfo) {
        for handler in &self.registry.ready {
            handler(info);
        }
    }

    /// Whether any handler is subscribed to `kind`
    pub fn is_subscribed(&self, kind: EventKind) -> bool {
        self.registry.events.get(&kind).is_some_and(|h| !h.is_empty())
    }
}

/// Builder for [`EventHandlers`]
#[derive(Default)]
pub struct EventHandlersBuilder {
    registry: Registry,
}

impl EventHandlersBuilder {
    /// Subscribe a handler to one event kind
    pub fn on<F>(mut self, kind: EventKind, handler: F) -> Self
    where
        F: Fn(&LifecycleEvent) + Send + Sync + 'static,
    {
        self.registry
            .events
            .entry(kind)
            .or_default()
            .push(Arc::new(handler));
        self
    }

    /// Subscribe a handler to session establishment
    pub fn on_ready<F>(mut self, handler: F) -> Self
    where
        F: Fn(&SessionInfo) + Send + Sync + 'static,
    {
        self.registry.ready.push(Arc::new(handler));
        self
    }

    pub fn build(self) -> EventHandlers {
        EventHandlers {
            registry: Arc::new(self.registry),
        }
    }
}

/// Trait for gateway event sources
///
/// A source owns the live session and its message cache. It keeps the cache
/// current as it observes creates and updates, and only forgets a deleted
/// message after the delete has been dispatched.
///
/// # Example
///
/// ```rust,ignore
/// use msglog::{EventHandlers, EventSource, MemoryCache, MessageCache, SessionInfo};
/// use async_trait::async_trait;
/// use std::sync::Arc;
/// use tokio_util::sync::CancellationToken;
///
/// struct MySource {
///     cache: MemoryCache,
/// }
///
/// #[async_trait]
/// impl EventSource for MySource {
///     async fn start(&self, handlers: EventHandlers, cancel: CancellationToken) -> anyhow::Result<()> {
///         handlers.ready(&SessionInfo::new("me", 0));
///         loop {
///             tokio::select! {
///                 _ = cancel.cancelled() => break,
///                 // event = next_event() => {
///                 //     self.cache.observe(&event);
///                 //     handlers.dispatch(&event);
///                 //     self.cache.forget(&event);
///                 // }
///             }
///         }
///         Ok(())
///     }
///
///     fn cache(&self) -> Arc<dyn MessageCache> { Arc::new(self.cache.clone()) }
///     fn name(&self) -> &'static str { "MySource" }
/// }
/// ```
#[async_trait]
pub trait EventSource: Send + Sync + 'static {
    /// Run the session
    ///
    /// Blocks until the session ends or the cancellation token is triggered.
    /// Returns an error if the session failed.
    async fn start(&self, handlers: EventHandlers, cancel: CancellationToken) -> anyhow::Result<()>;

    /// Read-only view of the cache this source maintains
    fn cache(&self) -> Arc<dyn MessageCache>;

    /// Return the source name (for logging)
    fn name(&self) -> &'static str;
}

/// A no-op source that never delivers events (for testing)
pub struct NoopSource;

#[async_trait]
impl EventSource for NoopSource {
    async fn start(&self, handlers: EventHandlers, cancel: CancellationToken) -> anyhow::Result<()> {
        tracing::info!("NoopSource started (no events will be received)");
        handlers.ready(&SessionInfo::new("noop", 0));
        cancel.cancelled().await;
        Ok(())
    }

    fn cache(&self) -> Arc<dyn MessageCache> {
        Arc::new(crate::cache::NoopCache)
    }

    fn name(&self) -> &'static str {
        "Noop"
    }
}

/// A channel-based source for programmatic event delivery
///
/// Useful for testing or for replaying events produced by your own code. The
/// session ends when every sender is dropped.
pub struct ChannelSource {
    receiver: tokio::sync::Mutex<Option<tokio::sync::mpsc::Receiver<LifecycleEvent>>>,
    cache: MemoryCache,
}

impl ChannelSource {
    /// Create a new channel source with a default sized cache
    pub fn new() -> (Self, tokio::sync::mpsc::Sender<LifecycleEvent>) {
        Self::with_cache(MemoryCache::default())
    }

    /// Create a new channel source maintaining `cache`
    pub fn with_cache(cache: MemoryCache) -> (Self, tokio::sync::mpsc::Sender<LifecycleEvent>) {
        let (tx, rx) = tokio::sync::mpsc::channel(1000);
        (
            Self {
                receiver: tokio::sync::Mutex::new(Some(rx)),
                cache,
            },
            tx,
        )
    }
}

#[async_trait]
impl EventSource for ChannelSource {
    async fn start(&self, handlers: EventHandlers, cancel: CancellationToken) -> anyhow::Result<()> {
        let mut receiver = self
            .receiver
            .lock()
            .await
            .take()
            .ok_or_else(|| anyhow::anyhow!("ChannelSource can only be started once"))?;

        tracing::info!("ChannelSource started");
        handlers.ready(&SessionInfo::new("channel", 0));

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                event = receiver.recv() => {
                    match event {
                        Some(event) => {
                            self.cache.observe(&event);
                            handlers.dispatch(&event);
                            self.cache.forget(&event);
                        }
                        None => break,
                    }
                }
            }
        }

        tracing::info!("ChannelSource stopped");
        Ok(())
    }

    fn cache(&self) -> Arc<dyn MessageCache> {
        Arc::new(self.cache.clone())
    }

    fn name(&self) -> &'static str {
        "Channel"
    }
}
