//! Record emission to sink writers
//!
//! Every record becomes one [`Entry`] with a fixed field order. The entry is
//! written once to each configured sink; a failing sink is logged and skipped.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use crate::error::{Error, Result};
use crate::record::LogRecord;

/// Field renames applied to every entry before it reaches a sink.
///
/// The collector reads the record severity from `severity`.
pub const FIELD_RENAMES: &[(&str, &str)] = &[("level", "severity")];

const LEVEL_INFO: &str = "INFO";

/// Seconds between 0001-01-01T00:00:00Z and the Unix epoch
const ZERO_INSTANT_SECS: i64 = -62_135_596_800;

/// The zero instant, emitted for absent timestamps
pub fn zero_time() -> DateTime<Utc> {
    DateTime::from_timestamp(ZERO_INSTANT_SECS, 0).unwrap_or_default()
}

fn format_time(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn rename(key: &'static str) -> &'static str {
    FIELD_RENAMES
        .iter()
        .find(|(from, _)| *from == key)
        .map_or(key, |(_, to)| to)
}

/// A structured log entry with ordered fields
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    fields: Vec<(&'static str, Value)>,
}

impl Entry {
    /// Build the entry for a record, stamped with `time`
    pub fn from_record(record: &LogRecord, time: DateTime<Utc>) -> Self {
        let action = record.action.as_str();
        let mut fields: Vec<(&'static str, Value)> = vec![
            ("time", format_time(time).into()),
            ("level", LEVEL_INFO.into()),
            ("msg", action.into()),
            ("action", action.into()),
            ("id", record.id.get().into()),
            ("channel", record.channel_id.get().into()),
            ("guild", record.guild().into()),
        ];

        if let Some(snapshot) = &record.snapshot {
            fields.extend([
                ("type", Value::from(snapshot.kind)),
                ("flags", snapshot.flags.into()),
                ("timestamp", format_time(snapshot.timestamp).into()),
                ("edited", format_time(snapshot.edited.unwrap_or_else(zero_time)).into()),
                ("author", snapshot.author.clone().into()),
                ("content", snapshot.content.clone().into()),
            ]);
        }

        Self {
            fields: fields
                .into_iter()
                .map(|(key, value)| (rename(key), value))
                .collect(),
        }
    }

    /// Value of a field
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    /// Fields in emission order
    pub fn fields(&self) -> impl Iterator<Item = (&'static str, &Value)> {
        self.fields.iter().map(|(k, v)| (*k, v))
    }

    /// Field names in emission order
    pub fn keys(&self) -> Vec<&'static str> {
        self.fields.iter().map(|(k, _)| *k).collect()
    }

    /// JSON object with fields in emission order
    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        Value::Object(map)
    }
}

/// Destination for log entries
///
/// Writes happen synchronously while the emitter holds the writer's lock, so
/// implementations need not be safe for concurrent use.
pub trait SinkWriter: Send + 'static {
    /// Write one entry
    fn write_entry(&mut self, entry: &Entry) -> std::io::Result<()>;

    /// Flush and release the underlying transport
    fn close(&mut self) -> std::io::Result<()> {
        Ok(())
    }

    /// Return the sink name (for logging)
    fn name(&self) -> &'static str;
}

/// Writes one JSON object per line
pub struct JsonLinesWriter<W: Write + Send + 'static> {
    writer: W,
    name: &'static str,
}

impl<W: Write + Send + 'static> JsonLinesWriter<W> {
    pub fn new(writer: W, name: &'static str) -> Self {
        Self { writer, name }
    }
}

impl JsonLinesWriter<std::io::Stdout> {
    /// JSON lines on standard output
    pub fn stdout() -> Self {
        Self::new(std::io::stdout(), "stdout")
    }
}

impl<W: Write + Send + 'static> SinkWriter for JsonLinesWriter<W> {
    fn write_entry(&mut self, entry: &Entry) -> std::io::Result<()> {
        serde_json::to_writer(&mut self.writer, &entry.to_json())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }

    fn close(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

struct SinkSlot {
    name: &'static str,
    writer: Mutex<Box<dyn SinkWriter>>,
}

impl SinkSlot {
    fn lock(&self) -> MutexGuard<'_, Box<dyn SinkWriter>> {
        self.writer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

struct EmitterInner {
    sinks: Vec<SinkSlot>,
    /// Held shared for a whole emit and exclusively by close
    closed: RwLock<bool>,
}

/// Writes audit records to every configured sink
#[derive(Clone)]
pub struct RecordEmitter {
    inner: Arc<EmitterInner>,
}

impl RecordEmitter {
    /// Create an emitter over the given sinks
    pub fn new(sinks: Vec<Box<dyn SinkWriter>>) -> Self {
        let sinks = sinks
            .into_iter()
            .map(|writer| SinkSlot {
                name: writer.name(),
                writer: Mutex::new(writer),
            })
            .collect();

        Self {
            inner: Arc::new(EmitterInner {
                sinks,
                closed: RwLock::new(false),
            }),
        }
    }

    /// Emit a record to every sink, returning the number of successful writes.
    ///
    /// Sink failures are logged and never returned. A record reaches either
    /// every sink or none: once the emitter is closed, records are dropped.
    pub fn emit(&self, record: &LogRecord) -> usize {
        let closed = self
            .inner
            .closed
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if *closed {
            tracing::debug!(
                message_id = %record.id,
                action = record.action.as_str(),
                "Emitter closed, record dropped"
            );
            return 0;
        }

        let entry = Entry::from_record(record, Utc::now());
        let mut written = 0;

        for slot in &self.inner.sinks {
            match slot.lock().write_entry(&entry) {
                Ok(()) => written += 1,
                Err(e) => tracing::warn!(
                    sink = slot.name,
                    error = %e,
                    message_id = %record.id,
                    "Failed to write record"
                ),
            }
        }

        written
    }

    /// Stop accepting records and close every sink.
    ///
    /// Waits for in-flight emits, closes all sinks even if one fails and
    /// reports the first failure. Closing twice is a no-op.
    pub fn close(&self) -> Result<()> {
        let mut closed = self
            .inner
            .closed
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if *closed {
            return Ok(());
        }
        *closed = true;

        let mut first_error = None;
        for slot in &self.inner.sinks {
            let mut writer = slot.lock();
            match writer.close() {
                Ok(()) => tracing::debug!(sink = slot.name, "Sink closed"),
                Err(e) => {
                    tracing::warn!(sink = slot.name, error = %e, "Failed to close sink");
                    if first_error.is_none() {
                        first_error = Some(Error::Sink(format!("{}: {}", slot.name, e)));
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub fn is_closed(&self) -> bool {
        *self
            .inner
            .closed
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Names of the configured sinks
    pub fn sink_names(&self) -> Vec<&'static str> {
        self.inner.sinks.iter().map(|s| s.name).collect()
    }
}
