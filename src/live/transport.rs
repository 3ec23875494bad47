//! Transport seam between the session controller and the remote endpoint.
//!
//! [`LiveConnector`] opens a connection and yields a [`LiveConnection`]: a
//! [`LiveSink`] for outbound JSON plus a channel of [`Inbound`] frames fed by
//! a reader task.  Splitting the two halves lets the controller `select!` on
//! inbound traffic while still owning the sink mutably.
//!
//! [`WsConnector`] is the production implementation on `tokio-tungstenite`;
//! tests plug in channel-backed doubles.

use async_trait::async_trait;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// Capacity of the inbound frame channel.
const INBOUND_QUEUE: usize = 256;

// ---------------------------------------------------------------------------
// LiveError
// ---------------------------------------------------------------------------

/// Errors raised by the transport.
#[derive(Debug, Error)]
pub enum LiveError {
    /// The handshake failed (DNS, TLS, HTTP status, ...).
    #[error("failed to connect: {0}")]
    Connect(String),

    /// The handshake did not finish in time.
    #[error("connection attempt timed out")]
    Timeout,

    /// No API key was configured or found in the environment.
    #[error("no API key configured (set live.api_key or the {0} environment variable)")]
    MissingApiKey(String),

    /// Writing to an open connection failed.
    #[error("failed to send: {0}")]
    Send(String),

    /// The connection is already closed.
    #[error("connection closed")]
    Closed,
}

impl From<tokio_tungstenite::tungstenite::Error> for LiveError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;
        match e {
            WsError::ConnectionClosed | WsError::AlreadyClosed => LiveError::Closed,
            other => LiveError::Send(other.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Something delivered by the reader task.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// A text frame, or a binary frame holding UTF-8 JSON.
    Message(String),
    /// The remote side closed the channel (with its reason, if any).
    Closed(Option<String>),
    /// A read error; the connection may still be usable.
    Error(String),
}

/// Outbound half of a connection.
#[async_trait]
pub trait LiveSink: Send {
    async fn send(&mut self, message: serde_json::Value) -> Result<(), LiveError>;
    async fn close(&mut self) -> Result<(), LiveError>;
}

/// An open connection.
pub struct LiveConnection {
    pub sink: Box<dyn LiveSink>,
    pub inbound: mpsc::Receiver<Inbound>,
}

/// Opens connections to the remote endpoint.
///
/// Implementors must be `Send + Sync` so they can be shared across threads
/// (e.g. wrapped in `Arc<dyn LiveConnector>`).
#[async_trait]
pub trait LiveConnector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<LiveConnection, LiveError>;
}

// ---------------------------------------------------------------------------
// WsConnector
// ---------------------------------------------------------------------------

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket connector built on `tokio-tungstenite`.
#[derive(Debug, Default, Clone)]
pub struct WsConnector;

#[async_trait]
impl LiveConnector for WsConnector {
    async fn connect(&self, url: &str) -> Result<LiveConnection, LiveError> {
        let (stream, response) = connect_async(url)
            .await
            .map_err(|e| LiveError::Connect(e.to_string()))?;
        log::debug!("session: websocket handshake status {}", response.status());

        let (sink, mut read) = stream.split();
        let (tx, rx) = mpsc::channel(INBOUND_QUEUE);

        tokio::spawn(async move {
            while let Some(item) = read.next().await {
                let inbound = match item {
                    Ok(Message::Text(text)) => Inbound::Message(text.to_string()),
                    Ok(Message::Binary(bytes)) => match String::from_utf8(bytes.to_vec()) {
                        Ok(text) => Inbound::Message(text),
                        Err(e) => Inbound::Error(format!("non-UTF-8 binary frame: {e}")),
                    },
                    Ok(Message::Close(frame)) => {
                        let reason = frame.map(|f| format!("{} {}", f.code, f.reason));
                        let _ = tx.send(Inbound::Closed(reason)).await;
                        return;
                    }
                    // Ping/pong are answered by tungstenite itself.
                    Ok(_) => continue,
                    Err(e) => {
                        let closed = matches!(
                            e,
                            tokio_tungstenite::tungstenite::Error::ConnectionClosed
                                | tokio_tungstenite::tungstenite::Error::AlreadyClosed
                        );
                        if closed {
                            let _ = tx.send(Inbound::Closed(None)).await;
                            return;
                        }
                        Inbound::Error(e.to_string())
                    }
                };
                if tx.send(inbound).await.is_err() {
                    return;
                }
            }
            let _ = tx.send(Inbound::Closed(None)).await;
        });

        Ok(LiveConnection {
            sink: Box::new(WsSink { sink }),
            inbound: rx,
        })
    }
}

struct WsSink {
    sink: SplitSink<WsStream, Message>,
}

#[async_trait]
impl LiveSink for WsSink {
    async fn send(&mut self, message: serde_json::Value) -> Result<(), LiveError> {
        self.sink.send(Message::Text(message.to_string().into())).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), LiveError> {
        self.sink.close().await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
