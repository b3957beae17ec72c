use serde::{Deserialize, Serialize};
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::Path;

const BOT_PREFIX: &str = "Bot ";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub graylog: GraylogConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscordConfig {
    /// Bot token, with or without the `Bot ` prefix
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraylogConfig {
    /// GELF UDP input as `host:port`
    #[serde(default)]
    pub address: String,
    /// Host name reported in every GELF message
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl Default for GraylogConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            source: default_source(),
            chunk_size: default_chunk_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Also write entries as JSON lines to stdout
    #[serde(default = "default_true")]
    pub stdout: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { stdout: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_max_per_channel")]
    pub max_per_channel: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_per_channel: default_max_per_channel(),
        }
    }
}

fn default_source() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.trim().is_empty())
        .unwrap_or_else(|| "msglog-bridge".to_string())
}

fn default_chunk_size() -> usize {
    msglog_gelf::DEFAULT_CHUNK_SIZE
}

fn default_true() -> bool {
    true
}

fn default_max_per_channel() -> usize {
    100
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Settings ready for use by the bridge
#[derive(Debug, Clone)]
pub struct Settings {
    pub token: String,
    pub graylog_addr: SocketAddr,
    pub graylog_source: String,
    pub chunk_size: usize,
    pub stdout: bool,
    pub max_per_channel: usize,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let config_path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.yaml".to_string());

        let mut config = if Path::new(&config_path).exists() {
            let content = std::fs::read_to_string(&config_path)?;
            serde_yaml::from_str(&content)?
        } else {
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Environment variables take precedence over the file
    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        if let Some(token) = var("DISCORD_TOKEN") {
            self.discord.token = token;
        }
        if let Some(address) = var("GRAYLOG_ADDRESS") {
            self.graylog.address = address;
        }
        if let Some(source) = var("GRAYLOG_SOURCE") {
            self.graylog.source = source;
        }
        if let Some(size) = var("GRAYLOG_CHUNK_SIZE") {
            self.graylog.chunk_size = size
                .trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("GRAYLOG_CHUNK_SIZE is not a number: {}", e))?;
        }
        if let Some(stdout) = var("OUTPUT_STDOUT") {
            self.output.stdout = parse_bool(&stdout)
                .ok_or_else(|| anyhow::anyhow!("OUTPUT_STDOUT is not a boolean: {}", stdout))?;
        }
        if let Some(max) = var("CACHE_MAX_MESSAGES") {
            self.cache.max_per_channel = max
                .trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("CACHE_MAX_MESSAGES is not a number: {}", e))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<Settings> {
        let token = self.discord.token.trim();
        let token = token.strip_prefix(BOT_PREFIX).unwrap_or(token).trim();
        if token.is_empty() {
            anyhow::bail!("DISCORD_TOKEN environment variable is required");
        }

        let address = self.graylog.address.trim();
        if address.is_empty() {
            anyhow::bail!("GRAYLOG_ADDRESS environment variable is required");
        }

        Ok(Settings {
            token: token.to_string(),
            graylog_addr: resolve_address(address)?,
            graylog_source: self.graylog.source.clone(),
            chunk_size: self.graylog.chunk_size,
            stdout: self.output.stdout,
            max_per_channel: self.cache.max_per_channel,
        })
    }
}

/// Resolve `host:port` once, preferring an IPv4 address
fn resolve_address(address: &str) -> anyhow::Result<SocketAddr> {
    let (host, port) = address
        .rsplit_once(':')
        .ok_or_else(|| anyhow::anyhow!("Graylog address must be host:port, got {}", address))?;
    if host.is_empty() {
        anyhow::bail!("Graylog address {} has no host", address);
    }
    let port: u16 = port
        .parse()
        .map_err(|_| anyhow::anyhow!("Graylog address {} has an invalid port", address))?;

    let host = host.trim_start_matches('[').trim_end_matches(']');
    let candidates: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|e| anyhow::anyhow!("Failed to resolve Graylog host {}: {}", host, e))?
        .collect();

    candidates
        .iter()
        .find(|a| a.is_ipv4())
        .or_else(|| candidates.first())
        .copied()
        .ok_or_else(|| anyhow::anyhow!("Graylog host {} resolved to no address", host))
}
