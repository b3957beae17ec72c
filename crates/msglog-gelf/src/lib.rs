//! GELF sink for msglog
//!
//! Sends every entry as one GELF 1.1 message over UDP. Entries are mapped as
//! follows:
//!
//! - `msg` becomes `short_message`
//! - `time` becomes the numeric `timestamp`
//! - `severity` becomes the numeric syslog `level`
//! - every other field becomes an additional `_field`; `id` is sent as
//!   `_message_id` because `_id` is reserved
//!
//! # Example
//!
//! ```rust,ignore
//! use msglog::Bridge;
//! use msglog_gelf::GelfWriter;
//!
//! Bridge::builder()
//!     .source(source)
//!     .sink(GelfWriter::connect("10.0.0.5:12201".parse()?, "auditor")?)
//!     .build()?
//!     .run()
//!     .await
//! ```

mod chunk;

pub use chunk::{split, CHUNK_HEADER_LEN, CHUNK_MAGIC, DEFAULT_CHUNK_SIZE, MAX_CHUNKS};

use chrono::{DateTime, Utc};
use msglog::{Entry, SinkWriter};
use serde_json::{Map, Value};
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use tracing::info;

const GELF_VERSION: &str = "1.1";

/// Syslog level used when the severity is unknown
const LEVEL_INFORMATIONAL: u8 = 6;

/// Entry fields with a dedicated GELF counterpart
const RESERVED_FIELDS: &[&str] = &["time", "severity", "msg"];

/// Additional fields that would collide with reserved GELF names
const ADDITIONAL_RENAMES: &[(&str, &str)] = &[("id", "_message_id")];

fn syslog_level(severity: &str) -> u8 {
    match severity {
        "ERROR" => 3,
        "WARN" => 4,
        "INFO" => 6,
        "DEBUG" => 7,
        _ => LEVEL_INFORMATIONAL,
    }
}

fn additional_field(key: &str) -> String {
    ADDITIONAL_RENAMES
        .iter()
        .find(|(from, _)| *from == key)
        .map_or_else(|| format!("_{}", key), |(_, to)| to.to_string())
}

fn unix_seconds(entry: &Entry) -> f64 {
    let time = entry
        .get("time")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);
    time.timestamp_millis() as f64 / 1000.0
}

/// Build the GELF message for an entry
pub fn encode(entry: &Entry, host: &str) -> Value {
    let mut message = Map::new();
    message.insert("version".into(), GELF_VERSION.into());
    message.insert("host".into(), host.into());
    message.insert(
        "short_message".into(),
        entry.get("msg").cloned().unwrap_or_else(|| "".into()),
    );
    message.insert("timestamp".into(), unix_seconds(entry).into());
    message.insert(
        "level".into(),
        entry
            .get("severity")
            .and_then(Value::as_str)
            .map_or(LEVEL_INFORMATIONAL, syslog_level)
            .into(),
    );

    for (key, value) in entry.fields() {
        if RESERVED_FIELDS.contains(&key) {
            continue;
        }
        message.insert(additional_field(key), value.clone());
    }

    Value::Object(message)
}

fn message_id() -> [u8; 8] {
    let uuid = uuid::Uuid::new_v4();
    let mut id = [0u8; 8];
    id.copy_from_slice(&uuid.as_bytes()[..8]);
    id
}

/// Writes entries to a GELF UDP input
pub struct GelfWriter {
    socket: Option<UdpSocket>,
    addr: SocketAddr,
    host: String,
    chunk_size: usize,
}

impl GelfWriter {
    /// Open a UDP socket towards `addr`. `host` names this process in Graylog.
    pub fn connect(addr: SocketAddr, host: impl Into<String>) -> io::Result<Self> {
        let local = if addr.is_ipv4() {
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
        } else {
            SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
        };
        let socket = UdpSocket::bind(local)?;
        socket.connect(addr)?;

        let host = host.into();
        info!(address = %addr, host = %host, "GELF writer ready");

        Ok(Self {
            socket: Some(socket),
            addr,
            host,
            chunk_size: DEFAULT_CHUNK_SIZE,
        })
    }

    /// Set the maximum datagram size
    pub fn with_chunk_size(mut self, chunk_size: usize) -> io::Result<Self> {
        if chunk_size <= CHUNK_HEADER_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("chunk size must exceed {} bytes", CHUNK_HEADER_LEN),
            ));
        }
        self.chunk_size = chunk_size;
        Ok(self)
    }

    /// Collector address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

impl SinkWriter for GelfWriter {
    fn write_entry(&mut self, entry: &Entry) -> io::Result<()> {
        let socket = self
            .socket
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "GELF writer closed"))?;

        let payload = serde_json::to_vec(&encode(entry, &self.host))?;
        for datagram in split(&payload, self.chunk_size, message_id())? {
            socket.send(&datagram)?;
        }
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        if self.socket.take().is_some() {
            info!(address = %self.addr, "GELF writer closed");
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "gelf"
    }
}
