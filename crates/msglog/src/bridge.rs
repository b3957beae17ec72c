//! Bridge builder and runner

use crate::emitter::{RecordEmitter, SinkWriter};
use crate::error::{Error, Result};
use crate::event::EventKind;
use crate::lifecycle::{CleanupFn, LifecycleManager, ShutdownCause};
use crate::router::EventRouter;
use crate::source::{EventHandlers, EventSource, NoopSource};

/// Bridge configuration and runner
pub struct Bridge<Source: EventSource> {
    source: Source,
    emitter: RecordEmitter,
    lifecycle: LifecycleManager,
    handle_signals: bool,
    cleanups: Vec<(String, CleanupFn)>,
}

impl<Source: EventSource> Bridge<Source> {
    /// Lifecycle of this run, for observing state or requesting shutdown
    pub fn lifecycle(&self) -> LifecycleManager {
        self.lifecycle.clone()
    }

    /// Run the bridge until the gateway session ends
    ///
    /// Returns [`Error::Connection`] only when the session failed on its own;
    /// an error surfacing after shutdown was requested is logged instead.
    pub async fn run(self) -> Result<()> {
        let Bridge {
            source,
            emitter,
            lifecycle,
            handle_signals,
            cleanups,
        } = self;
        let cache = source.cache();

        tracing::info!(
            source = source.name(),
            cache = cache.name(),
            sinks = ?emitter.sink_names(),
            "Starting message log bridge"
        );

        for (name, action) in cleanups {
            lifecycle.register_cleanup(name, action);
        }

        if handle_signals {
            let listener = lifecycle.spawn_signal_listener();
            lifecycle.register_cleanup("signal listener", move || {
                listener.abort();
                Ok(())
            });
        }

        let router = EventRouter::new(cache, emitter.clone());
        let handlers = subscribe(router, lifecycle.clone());

        tracing::info!(source = source.name(), "Connecting to gateway");
        let failure = match source.start(handlers, lifecycle.token()).await {
            Ok(()) => {
                lifecycle.shutdown(ShutdownCause::SessionEnded);
                None
            }
            Err(e) => {
                if lifecycle.shutdown(ShutdownCause::ConnectionFailed(format!("{:#}", e))) {
                    tracing::error!(error = %e, source = source.name(), "Gateway session failed");
                    Some(e)
                } else {
                    tracing::warn!(error = %e, source = source.name(), "Gateway session error during shutdown");
                    None
                }
            }
        };

        let cause = lifecycle.cause().unwrap_or(ShutdownCause::SessionEnded);
        tracing::info!(cause = %cause, "Gateway closed");

        // The run loop has returned; close() still waits out handlers mid-write.
        let closer = emitter.clone();
        lifecycle.register_cleanup("record emitter", move || closer.close().map_err(anyhow::Error::from));

        let report = lifecycle.teardown();
        if !report.failed.is_empty() {
            tracing::warn!(failed = ?report.failed, "Some cleanup actions failed");
        }
        tracing::info!("Bridge shutdown complete");

        match failure {
            Some(e) => Err(Error::Connection(e)),
            None => Ok(()),
        }
    }
}

/// Subscribe the router to every event kind, gated on the lifecycle
fn subscribe(router: EventRouter, lifecycle: LifecycleManager) -> EventHandlers {
    let mut builder = EventHandlers::builder();

    for kind in EventKind::ALL {
        let router = router.clone();
        let lifecycle = lifecycle.clone();
        builder = builder.on(kind, move |event| {
            if lifecycle.is_shutting_down() {
                tracing::debug!(kind = event.kind().as_str(), "Shutting down, event dropped");
                return;
            }
            router.route(event);
        });
    }

    builder
        .on_ready(move |info| {
            if lifecycle.mark_connected() {
                tracing::info!(user = %info.user, guilds = info.guilds, "Connected");
            } else {
                tracing::info!(user = %info.user, "Session resumed");
            }
        })
        .build()
}

/// Builder for Bridge
pub struct BridgeBuilder<Source = NoopSource> {
    source: Option<Source>,
    sinks: Vec<Box<dyn SinkWriter>>,
    lifecycle: Option<LifecycleManager>,
    handle_signals: bool,
    cleanups: Vec<(String, CleanupFn)>,
}

impl Default for BridgeBuilder {
    fn default() -> Self {
        Self {
            source: None,
            sinks: Vec::new(),
            lifecycle: None,
            handle_signals: true,
            cleanups: Vec::new(),
        }
    }
}

impl Bridge<NoopSource> {
    /// Create a new bridge builder
    pub fn builder() -> BridgeBuilder {
        BridgeBuilder::default()
    }
}

impl<Source> BridgeBuilder<Source> {
    /// Set the event source
    pub fn source<S: EventSource>(self, source: S) -> BridgeBuilder<S> {
        BridgeBuilder {
            source: Some(source),
            sinks: self.sinks,
            lifecycle: self.lifecycle,
            handle_signals: self.handle_signals,
            cleanups: self.cleanups,
        }
    }

    /// Add a sink writer. Every record is written to every sink.
    pub fn sink<W: SinkWriter>(mut self, writer: W) -> Self {
        self.sinks.push(Box::new(writer));
        self
    }

    /// Use an existing lifecycle manager
    pub fn lifecycle(mut self, lifecycle: LifecycleManager) -> Self {
        self.lifecycle = Some(lifecycle);
        self
    }

    /// Enable or disable shutdown on Ctrl+C / SIGTERM
    pub fn signals(mut self, enable: bool) -> Self {
        self.handle_signals = enable;
        self
    }

    /// Register a teardown step run after the sinks are closed
    pub fn on_shutdown<F>(mut self, name: impl Into<String>, action: F) -> Self
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        self.cleanups.push((name.into(), Box::new(action)));
        self
    }
}

impl<Source: EventSource> BridgeBuilder<Source> {
    /// Build the bridge
    pub fn build(self) -> Result<Bridge<Source>> {
        let source = self
            .source
            .ok_or_else(|| Error::Config("Source is required".to_string()))?;

        if self.sinks.is_empty() {
            tracing::warn!("No sink configured, records will be dropped");
        }

        Ok(Bridge {
            source,
            emitter: RecordEmitter::new(self.sinks),
            lifecycle: self.lifecycle.unwrap_or_default(),
            handle_signals: self.handle_signals,
            cleanups: self.cleanups,
        })
    }
}
