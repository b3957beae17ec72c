//! # msglog
//!
//! Audit pipeline that turns chat message lifecycle events into structured
//! log records.
//!
//! ## Features
//!
//! - **Pluggable Event Sources**: Implement `EventSource` to receive message events from any gateway
//! - **Cache Fallback**: Deletions are resolved against the source's message cache; unresolved
//!   deletions still produce a record with the identifiers
//! - **Fixed Record Schema**: Every sink receives the same ordered fields, with `level` renamed
//!   to `severity`
//! - **Ordered Teardown**: Cleanup actions run once, last registered first, even when some fail
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use msglog::{Bridge, JsonLinesWriter, NoopSource};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     Bridge::builder()
//!         .source(NoopSource)
//!         .sink(JsonLinesWriter::stdout())
//!         .build()?
//!         .run()
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Resolving Without A Connection
//!
//! ```rust
//! use msglog::{resolve, ChannelId, LifecycleEvent, MemoryCache, MessageId};
//!
//! let cache = MemoryCache::default();
//! let event = LifecycleEvent::Deleted {
//!     id: MessageId(42),
//!     channel_id: ChannelId(7),
//!     guild_id: None,
//! };
//! let records = resolve(&event, &cache);
//! assert_eq!(records.len(), 1);
//! assert!(!records[0].is_resolved());
//! ```

mod bridge;
pub mod cache;
pub mod emitter;
mod error;
mod event;
pub mod lifecycle;
mod record;
mod router;
pub mod source;

// Re-exports
pub use bridge::{Bridge, BridgeBuilder};
pub use cache::{Lookup, MemoryCache, MessageCache, NoopCache};
pub use emitter::{Entry, JsonLinesWriter, RecordEmitter, SinkWriter, FIELD_RENAMES};
pub use error::{Error, Result};
pub use event::{
    ChannelId, EventKind, GuildId, LifecycleEvent, MessageBody, MessageId, MessageSnapshot,
};
pub use lifecycle::{LifecycleManager, LifecycleState, ShutdownCause, TeardownReport};
pub use record::{Action, LogRecord};
pub use router::{resolve, EventRouter};
pub use source::{ChannelSource, EventHandlers, EventSource, NoopSource, SessionInfo};

// Re-export commonly used types from dependencies
pub use async_trait::async_trait;
pub use tokio_util::sync::CancellationToken;
