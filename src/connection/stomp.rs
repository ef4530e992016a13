//! STOMP 1.2 over websocket push transport.
//!
//! Only the client frames the notification channel needs are produced:
//! `CONNECT`, `SUBSCRIBE`, `DISCONNECT` and heart-beats. Inbound `MESSAGE`
//! bodies are handed to the connection manager untouched.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::transport::{PushLink, PushTransport};
use crate::error::{NotifyError, Result};

/// A single STOMP frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StompFrame {
    pub command: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl StompFrame {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// First value of header `name`. Repeated headers keep the first entry.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Whether header values use the STOMP 1.2 escaping rules.
    fn escapes_headers(command: &str) -> bool {
        command != "CONNECT" && command != "CONNECTED"
    }

    pub fn encode(&self) -> String {
        let escape = Self::escapes_headers(&self.command);
        let mut out = String::with_capacity(self.body.len() + 64);
        out.push_str(&self.command);
        out.push('\n');
        for (name, value) in &self.headers {
            if escape {
                out.push_str(&escape_header(name));
                out.push(':');
                out.push_str(&escape_header(value));
            } else {
                out.push_str(name);
                out.push(':');
                out.push_str(value);
            }
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }

    /// Parse one frame. Returns `Ok(None)` for a heart-beat.
    pub fn parse(raw: &str) -> Result<Option<Self>> {
        let raw = raw.trim_start_matches(['\r', '\n']);
        let raw = raw.strip_suffix('\0').unwrap_or(raw);
        let raw = raw.trim_end_matches('\0');
        if raw.trim().is_empty() {
            return Ok(None);
        }

        let (head, body) = match raw.find("\n\n") {
            Some(idx) => (&raw[..idx], &raw[idx + 2..]),
            None => match raw.find("\r\n\r\n") {
                Some(idx) => (&raw[..idx], &raw[idx + 4..]),
                None => (raw, ""),
            },
        };

        let mut lines = head.lines();
        let command = lines
            .next()
            .map(|line| line.trim_end_matches('\r').to_string())
            .filter(|command| !command.is_empty())
            .ok_or_else(|| NotifyError::Transport("STOMP frame without command".to_string()))?;

        let escape = Self::escapes_headers(&command);
        let mut headers = Vec::new();
        for line in lines {
            let line = line.trim_end_matches('\r');
            let (name, value) = line.split_once(':').ok_or_else(|| {
                NotifyError::Transport(format!("Malformed STOMP header: {}", line))
            })?;
            if escape {
                headers.push((unescape_header(name), unescape_header(value)));
            } else {
                headers.push((name.to_string(), value.to_string()));
            }
        }

        Ok(Some(Self {
            command,
            headers,
            body: body.to_string(),
        }))
    }
}

fn escape_header(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            c => out.push(c),
        }
    }
    out
}

fn unescape_header(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Push transport speaking STOMP over a raw websocket endpoint.
pub struct StompTransport {
    ws_url: String,
    heartbeat_ms: u64,
}

impl StompTransport {
    pub fn new(ws_url: impl Into<String>, heartbeat_ms: u64) -> Self {
        Self {
            ws_url: ws_url.into(),
            heartbeat_ms,
        }
    }

    fn connect_frame(&self, identity: &str, credential: &str) -> StompFrame {
        StompFrame::new("CONNECT")
            .header("accept-version", "1.2")
            .header("host", host_of(&self.ws_url))
            .header(
                "heart-beat",
                format!("{},{}", self.heartbeat_ms, self.heartbeat_ms),
            )
            .header("login", identity)
            .header("Authorization", format!("Bearer {}", credential))
    }
}

fn host_of(url: &str) -> &str {
    let rest = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
    rest.split(['/', '?']).next().unwrap_or(rest)
}

/// Read the next STOMP frame, skipping heart-beats and websocket control
/// messages. `None` when the socket closed.
async fn next_frame(stream: &mut WsStream) -> Option<Result<StompFrame>> {
    while let Some(msg) = stream.next().await {
        let text = match msg {
            Ok(Message::Text(text)) => text.as_str().to_string(),
            Ok(Message::Binary(data)) => String::from_utf8_lossy(&data).into_owned(),
            Ok(Message::Ping(data)) => {
                if let Err(e) = stream.send(Message::Pong(data)).await {
                    return Some(Err(NotifyError::Transport(format!(
                        "Failed to send pong: {}",
                        e
                    ))));
                }
                continue;
            }
            Ok(Message::Close(_)) => return None,
            Ok(_) => continue,
            Err(e) => return Some(Err(NotifyError::Transport(e.to_string()))),
        };
        match StompFrame::parse(&text) {
            Ok(Some(frame)) => return Some(Ok(frame)),
            Ok(None) => continue,
            Err(e) => return Some(Err(e)),
        }
    }
    None
}

#[async_trait]
impl PushTransport for StompTransport {
    async fn handshake(&self, identity: &str, credential: &str) -> Result<Box<dyn PushLink>> {
        let url = format!("{}?token={}", self.ws_url, urlencoding::encode(credential));
        info!("Connecting to notification push channel: {}", self.ws_url);

        let (mut stream, _) = connect_async(url)
            .await
            .map_err(|e| NotifyError::Transport(format!("WebSocket connection failed: {}", e)))?;

        let connect = self.connect_frame(identity, credential);
        stream
            .send(Message::text(connect.encode()))
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        match next_frame(&mut stream).await {
            Some(Ok(frame)) if frame.command == "CONNECTED" => {
                debug!(
                    "STOMP session established (version {})",
                    frame.get("version").unwrap_or("?")
                );
                Ok(Box::new(StompLink {
                    stream,
                    next_subscription: 0,
                }))
            }
            Some(Ok(frame)) if frame.command == "ERROR" => {
                let message = frame
                    .get("message")
                    .map(str::to_string)
                    .unwrap_or_else(|| frame.body.clone());
                Err(NotifyError::Protocol(message))
            }
            Some(Ok(frame)) => Err(NotifyError::Protocol(format!(
                "Unexpected {} frame during handshake",
                frame.command
            ))),
            Some(Err(e)) => Err(e),
            None => Err(NotifyError::Transport(
                "Connection closed during handshake".to_string(),
            )),
        }
    }
}

struct StompLink {
    stream: WsStream,
    next_subscription: u32,
}

impl StompLink {
    async fn send_frame(&mut self, frame: StompFrame) -> Result<()> {
        self.stream
            .send(Message::text(frame.encode()))
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))
    }
}

#[async_trait]
impl PushLink for StompLink {
    async fn subscribe(&mut self, destination: &str) -> Result<()> {
        let id = format!("sub-{}", self.next_subscription);
        self.next_subscription += 1;
        debug!("Subscribing to {} as {}", destination, id);
        self.send_frame(
            StompFrame::new("SUBSCRIBE")
                .header("id", id)
                .header("destination", destination)
                .header("ack", "auto"),
        )
        .await
    }

    async fn recv(&mut self) -> Option<Result<String>> {
        loop {
            let frame = match next_frame(&mut self.stream).await? {
                Ok(frame) => frame,
                Err(e) => return Some(Err(e)),
            };
            match frame.command.as_str() {
                "MESSAGE" => return Some(Ok(frame.body)),
                "ERROR" => {
                    let message = frame.get("message").unwrap_or("server error").to_string();
                    return Some(Err(NotifyError::Transport(message)));
                }
                other => debug!("Ignoring STOMP {} frame", other),
            }
        }
    }

    async fn heartbeat(&mut self) -> Result<()> {
        self.stream
            .send(Message::text("\n"))
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))
    }

    async fn close(&mut self) {
        if let Err(e) = self.send_frame(StompFrame::new("DISCONNECT")).await {
            debug!("Failed to send DISCONNECT: {}", e);
        }
        if let Err(e) = self.stream.close(None).await {
            warn!("Error closing push channel: {}", e);
        }
    }
}
