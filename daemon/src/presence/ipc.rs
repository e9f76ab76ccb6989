//! Discord Rich Presence over the desktop client's local IPC socket.
//!
//! Wire format: every frame is `opcode: u32 LE | length: u32 LE | JSON payload`.
//! A session starts with a HANDSHAKE carrying the application id, which Discord answers
//! with a READY dispatch.  Commands are FRAMEs tagged with a nonce; the reply bearing
//! the same nonce tells whether the command succeeded.
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::{Activity, PresenceClient, PresenceError};

const RPC_VERSION: u32 = 1;
/// Discord listens on the first free slot of `discord-ipc-0` … `discord-ipc-9`.
const MAX_PIPE_INDEX: u32 = 10;
const MAX_FRAME_LEN: u32 = 64 * 1024;
/// Discord rejects details/state strings longer than this.
const MAX_TEXT_CHARS: usize = 128;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Handshake = 0,
    Frame = 1,
    Close = 2,
    Ping = 3,
    Pong = 4,
}

impl TryFrom<u32> for Opcode {
    type Error = PresenceError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Opcode::Handshake,
            1 => Opcode::Frame,
            2 => Opcode::Close,
            3 => Opcode::Ping,
            4 => Opcode::Pong,
            other => return Err(PresenceError::Protocol(format!("unknown opcode {other}"))),
        })
    }
}

/// Any duplex byte stream the IPC protocol can run over.
pub trait IpcStream: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> IpcStream for T {}

type BoxedStream = Box<dyn IpcStream>;

// ── Framing ───────────────────────────────────────────────────────────────────

pub async fn write_frame<W>(
    writer: &mut W,
    op: Opcode,
    payload: &Value,
) -> Result<(), PresenceError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let body = serde_json::to_vec(payload)?;
    let len = u32::try_from(body.len())
        .map_err(|_| PresenceError::Protocol("outgoing frame too large".into()))?;
    let mut frame = Vec::with_capacity(8 + body.len());
    frame.extend_from_slice(&(op as u32).to_le_bytes());
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(&body);
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

pub async fn read_frame<R>(reader: &mut R) -> Result<(Opcode, Value), PresenceError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut header = [0u8; 8];
    reader.read_exact(&mut header).await?;
    let op = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    let len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
    if len > MAX_FRAME_LEN {
        return Err(PresenceError::Protocol(format!("frame of {len} bytes exceeds limit")));
    }
    let op = Opcode::try_from(op)?;

    let mut body = vec![0u8; len as usize];
    reader.read_exact(&mut body).await?;
    let payload = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body)?
    };
    Ok((op, payload))
}

async fn with_timeout<F, T>(timeout: Duration, fut: F) -> Result<T, PresenceError>
where
    F: std::future::Future<Output = Result<T, PresenceError>>,
{
    tokio::time::timeout(timeout, fut)
        .await
        .unwrap_or(Err(PresenceError::Timeout))
}

fn close_error(payload: &Value) -> PresenceError {
    PresenceError::Closed {
        code: payload["code"].as_i64().unwrap_or_default(),
        message: payload["message"].as_str().unwrap_or_default().to_string(),
    }
}

// ── Protocol steps ────────────────────────────────────────────────────────────

/// Sends the handshake and waits for READY.
pub async fn handshake<S>(stream: &mut S, client_id: &str) -> Result<(), PresenceError>
where
    S: AsyncRead + AsyncWrite + Unpin + ?Sized,
{
    let hello = json!({ "v": RPC_VERSION, "client_id": client_id });
    write_frame(stream, Opcode::Handshake, &hello).await?;
    loop {
        let (op, payload) = read_frame(stream).await?;
        match op {
            Opcode::Frame if payload["evt"] == "READY" => return Ok(()),
            Opcode::Close => return Err(close_error(&payload)),
            Opcode::Ping => write_frame(stream, Opcode::Pong, &payload).await?,
            _ => {
                return Err(PresenceError::Protocol(format!(
                    "expected READY, got {op:?} {payload}"
                )))
            }
        }
    }
}

/// Issues `SET_ACTIVITY` (or clears it with `None`) and waits for the matching reply.
pub async fn set_activity<S>(
    stream: &mut S,
    pid: u32,
    activity: Option<&Activity>,
) -> Result<(), PresenceError>
where
    S: AsyncRead + AsyncWrite + Unpin + ?Sized,
{
    let nonce = uuid::Uuid::new_v4().to_string();
    let command = json!({
        "cmd": "SET_ACTIVITY",
        "args": {
            "pid": pid,
            "activity": activity.map(WireActivity::from),
        },
        "nonce": nonce,
    });
    write_frame(stream, Opcode::Frame, &command).await?;

    loop {
        let (op, payload) = read_frame(stream).await?;
        match op {
            Opcode::Frame if payload["nonce"] == nonce.as_str() => {
                if payload["evt"] == "ERROR" {
                    let message = payload["data"]["message"]
                        .as_str()
                        .unwrap_or("unknown error")
                        .to_string();
                    return Err(PresenceError::Rejected(message));
                }
                return Ok(());
            }
            Opcode::Close => return Err(close_error(&payload)),
            Opcode::Ping => write_frame(stream, Opcode::Pong, &payload).await?,
            // Unrelated dispatches.
            _ => {}
        }
    }
}

// ── Activity wire shape ───────────────────────────────────────────────────────

#[derive(Serialize)]
struct WireActivity {
    details: String,
    state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamps: Option<WireTimestamps>,
    assets: WireAssets,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    buttons: Vec<WireButton>,
}

#[derive(Serialize)]
struct WireTimestamps {
    /// Milliseconds since the Unix epoch.
    start: i64,
}

#[derive(Serialize)]
struct WireAssets {
    large_image: String,
    large_text: String,
    small_image: String,
    small_text: String,
}

#[derive(Serialize)]
struct WireButton {
    label: String,
    url: String,
}

impl From<&Activity> for WireActivity {
    fn from(a: &Activity) -> Self {
        Self {
            details: clip(&a.details),
            state: clip(&a.state),
            timestamps: a
                .start_timestamp
                .map(|secs| WireTimestamps { start: secs.saturating_mul(1000) }),
            assets: WireAssets {
                large_image: a.large_image.clone(),
                large_text: clip(&a.large_text),
                small_image: a.small_image.clone(),
                small_text: clip(&a.small_text),
            },
            buttons: a
                .buttons
                .iter()
                .map(|b| WireButton {
                    label: clip(&b.label),
                    url: b.url.clone(),
                })
                .collect(),
        }
    }
}

fn clip(s: &str) -> String {
    s.chars().take(MAX_TEXT_CHARS).collect()
}

// ── Socket discovery ──────────────────────────────────────────────────────────

#[cfg(unix)]
fn candidate_paths() -> Vec<std::path::PathBuf> {
    use std::path::PathBuf;

    let base = ["XDG_RUNTIME_DIR", "TMPDIR", "TMP", "TEMP"]
        .iter()
        .find_map(|var| std::env::var_os(var).filter(|v| !v.is_empty()))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/tmp"));

    // Flatpak and Snap builds of Discord put the socket in a sandbox subdirectory.
    let dirs = [
        base.clone(),
        base.join("app/com.discordapp.Discord"),
        base.join("snap.discord"),
    ];
    dirs.iter()
        .flat_map(|dir| (0..MAX_PIPE_INDEX).map(move |i| dir.join(format!("discord-ipc-{i}"))))
        .collect()
}

#[cfg(unix)]
async fn open_socket() -> Result<BoxedStream, PresenceError> {
    for path in candidate_paths() {
        match tokio::net::UnixStream::connect(&path).await {
            Ok(stream) => {
                tracing::debug!(path = %path.display(), "connected to Discord IPC socket");
                return Ok(Box::new(stream));
            }
            Err(e) => tracing::trace!(path = %path.display(), "IPC socket unavailable: {e}"),
        }
    }
    Err(PresenceError::NotAvailable)
}

#[cfg(windows)]
async fn open_socket() -> Result<BoxedStream, PresenceError> {
    use tokio::net::windows::named_pipe::ClientOptions;

    for i in 0..MAX_PIPE_INDEX {
        let path = format!(r"\\?\pipe\discord-ipc-{i}");
        match ClientOptions::new().open(&path) {
            Ok(pipe) => {
                tracing::debug!(%path, "connected to Discord IPC pipe");
                return Ok(Box::new(pipe));
            }
            Err(e) => tracing::trace!(%path, "IPC pipe unavailable: {e}"),
        }
    }
    Err(PresenceError::NotAvailable)
}

// ── Client ────────────────────────────────────────────────────────────────────

/// [`PresenceClient`] speaking to the local Discord desktop app.
///
/// Connects lazily on the first update.  Any transport failure drops the connection;
/// the next update reconnects from scratch.
pub struct DiscordIpcClient {
    client_id: String,
    conn: Option<BoxedStream>,
    timeout: Duration,
}

impl DiscordIpcClient {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            conn: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Handshakes over an already-open stream and adopts it as the connection.
    #[cfg(test)]
    pub async fn connect_with(
        client_id: impl Into<String>,
        mut stream: BoxedStream,
    ) -> Result<Self, PresenceError> {
        let mut client = Self::new(client_id);
        with_timeout(client.timeout, handshake(&mut stream, &client.client_id)).await?;
        client.conn = Some(stream);
        Ok(client)
    }

    async fn connection(&mut self) -> Result<&mut BoxedStream, PresenceError> {
        let stream = match self.conn.take() {
            Some(stream) => stream,
            None => {
                let mut stream = open_socket().await?;
                with_timeout(self.timeout, handshake(&mut stream, &self.client_id)).await?;
                tracing::info!("connected to Discord");
                stream
            }
        };
        Ok(self.conn.insert(stream))
    }

    async fn send(&mut self, activity: Option<&Activity>) -> Result<(), PresenceError> {
        let timeout = self.timeout;
        let pid = std::process::id();
        let stream = self.connection().await?;
        let result = with_timeout(timeout, set_activity(stream, pid, activity)).await;

        // A rejected payload leaves the session usable; anything else does not.
        if let Err(e) = &result {
            if !matches!(e, PresenceError::Rejected(_)) {
                tracing::debug!("dropping Discord connection: {e}");
                self.conn = None;
            }
        }
        result
    }
}

#[async_trait]
impl PresenceClient for DiscordIpcClient {
    async fn update_activity(&mut self, activity: &Activity) -> Result<(), PresenceError> {
        self.send(Some(activity)).await
    }

    async fn clear_activity(&mut self) -> Result<(), PresenceError> {
        if self.conn.is_none() {
            return Ok(());
        }
        self.send(None).await
    }

    fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    async fn shutdown(&mut self) {
        if self.conn.is_none() {
            return;
        }
        if let Err(e) = self.clear_activity().await {
            tracing::debug!("failed to clear presence on shutdown: {e}");
        }
        if let Some(mut stream) = self.conn.take() {
            let _ = write_frame(&mut stream, Opcode::Close, &json!({})).await;
            let _ = stream.shutdown().await;
        }
        tracing::info!("disconnected from Discord");
    }
}
