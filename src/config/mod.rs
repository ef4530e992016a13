mod file_config;

pub use file_config::{ConnectionConfig, FileConfig, RestConfig};

use anyhow::{bail, Context, Result};
use reqwest::Url;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const DEFAULT_WS_PATH: &str = "/ws/notifications/websocket";

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub api_base_url: Option<String>,
    pub ws_url: Option<String>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct NotifyConfig {
    pub api_base_url: String,
    pub ws_url: String,
    pub page_size: u32,

    pub connection: ConnectionSettings,
    pub rest: RestSettings,
}

impl NotifyConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let api_base_url = file
            .api_base_url
            .or_else(|| cli.api_base_url.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("api_base_url must be specified via --api-url or in config file")
            })?;
        let api = parse_url(&api_base_url, &["http", "https"])
            .context("Invalid api_base_url")?;

        let ws_url = match file.ws_url.or_else(|| cli.ws_url.clone()) {
            Some(ws_url) => {
                parse_url(&ws_url, &["ws", "wss"]).context("Invalid ws_url")?;
                ws_url
            }
            None => derive_ws_url(&api)?,
        };

        let page_size = file
            .page_size
            .or(cli.page_size)
            .unwrap_or(DEFAULT_PAGE_SIZE);
        if page_size == 0 {
            bail!("page_size must be greater than 0");
        }

        let conn_file = file.connection.unwrap_or_default();
        let defaults = ConnectionSettings::default();
        let connection = ConnectionSettings {
            reconnect_base_delay_ms: conn_file
                .reconnect_base_delay_ms
                .unwrap_or(defaults.reconnect_base_delay_ms),
            max_reconnect_attempts: conn_file
                .max_reconnect_attempts
                .unwrap_or(defaults.max_reconnect_attempts),
            heartbeat_interval_ms: conn_file
                .heartbeat_interval_ms
                .unwrap_or(defaults.heartbeat_interval_ms),
            handshake_timeout_ms: conn_file
                .handshake_timeout_ms
                .unwrap_or(defaults.handshake_timeout_ms),
        };
        if connection.max_reconnect_attempts == 0 {
            bail!("connection.max_reconnect_attempts must be greater than 0");
        }
        if connection.handshake_timeout_ms == 0 {
            bail!("connection.handshake_timeout_ms must be greater than 0");
        }

        let rest_file = file.rest.unwrap_or_default();
        let rest = RestSettings {
            request_timeout_sec: rest_file
                .request_timeout_sec
                .unwrap_or(RestSettings::default().request_timeout_sec),
        };

        Ok(Self {
            api_base_url,
            ws_url,
            page_size,
            connection,
            rest,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub reconnect_base_delay_ms: u64,
    pub max_reconnect_attempts: u32,
    /// 0 disables outgoing heart-beats.
    pub heartbeat_interval_ms: u64,
    pub handshake_timeout_ms: u64,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            reconnect_base_delay_ms: 3000,
            max_reconnect_attempts: 5,
            heartbeat_interval_ms: 4000,
            handshake_timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestSettings {
    pub request_timeout_sec: u64,
}

impl Default for RestSettings {
    fn default() -> Self {
        Self {
            request_timeout_sec: 30,
        }
    }
}

fn parse_url(raw: &str, schemes: &[&str]) -> Result<Url> {
    let url = Url::parse(raw).with_context(|| format!("Not a valid URL: {}", raw))?;
    if !schemes.contains(&url.scheme()) {
        bail!(
            "Unsupported scheme '{}' in {} (expected one of {:?})",
            url.scheme(),
            raw,
            schemes
        );
    }
    Ok(url)
}

/// Push endpoint on the same host as the REST API.
fn derive_ws_url(api: &Url) -> Result<String> {
    let host = api
        .host_str()
        .ok_or_else(|| anyhow::anyhow!("api_base_url has no host: {}", api))?;
    let scheme = if api.scheme() == "https" { "wss" } else { "ws" };
    let authority = match api.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };
    Ok(format!("{}://{}{}", scheme, authority, DEFAULT_WS_PATH))
}
