//! Transport seam for the push channel.
//!
//! A [`Connector`] opens a [`Link`]: a pair of queues carrying text frames in
//! each direction. The WebSocket implementation pumps those queues from two
//! background tasks, so the channel manager never touches the socket itself.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

use crate::error::{ClientError, Result};

/// Frame queued for the remote end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text(String),
    /// Close with the normal-closure code.
    Close,
}

/// Event received from the remote end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Text(String),
    /// The link is gone. Carries the close reason.
    Closed(String),
}

/// An open connection.
#[derive(Debug)]
pub struct Link {
    pub outbound: mpsc::UnboundedSender<Outbound>,
    pub inbound: mpsc::UnboundedReceiver<Inbound>,
}

/// The far side of an in-memory [`Link`].
#[derive(Debug)]
pub struct RemoteEnd {
    pub outbound: mpsc::UnboundedReceiver<Outbound>,
    pub inbound: mpsc::UnboundedSender<Inbound>,
}

impl Link {
    /// Create a connected in-memory link.
    pub fn pair() -> (Link, RemoteEnd) {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        (
            Link {
                outbound: out_tx,
                inbound: in_rx,
            },
            RemoteEnd {
                outbound: out_rx,
                inbound: in_tx,
            },
        )
    }
}

impl RemoteEnd {
    /// Push a text frame to the client. Returns false if the link is gone.
    pub fn push(&self, text: impl Into<String>) -> bool {
        self.inbound.send(Inbound::Text(text.into())).is_ok()
    }

    /// Close the link from the remote side.
    pub fn close(&self, reason: impl Into<String>) -> bool {
        self.inbound.send(Inbound::Closed(reason.into())).is_ok()
    }

    /// Next frame the client sent, or `None` once the client dropped the link.
    pub async fn recv(&mut self) -> Option<Outbound> {
        self.outbound.recv().await
    }
}

/// Opens links to the backend.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn open(&self) -> Result<Link>;
}

/// Longest a single WebSocket open may take, handshake included.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// WebSocket connector.
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
    connect_timeout: Duration,
}

impl WsConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn open(&self) -> Result<Link> {
        let (ws_stream, _) = tokio::time::timeout(self.connect_timeout, connect_async(self.url.as_str()))
            .await
            .map_err(|_| ClientError::Timeout)??;
        tracing::debug!(url = %self.url, "WebSocket opened");

        let (mut ws_sender, mut ws_receiver) = ws_stream.split();
        let (link, remote) = Link::pair();
        let RemoteEnd {
            outbound: mut outgoing,
            inbound,
        } = remote;

        // Writer: forwards queued frames until the client drops the link.
        tokio::spawn(async move {
            while let Some(frame) = outgoing.recv().await {
                let message = match frame {
                    Outbound::Text(text) => Message::text(text),
                    Outbound::Close => Message::Close(Some(CloseFrame {
                        code: CloseCode::Normal,
                        reason: "client disconnect".into(),
                    })),
                };
                let closing = matches!(message, Message::Close(_));
                if ws_sender.send(message).await.is_err() || closing {
                    break;
                }
            }
            let _ = ws_sender.close().await;
        });

        // Reader: forwards text frames and reports the close reason once.
        tokio::spawn(async move {
            let reason = loop {
                match ws_receiver.next().await {
                    Some(Ok(Message::Text(text))) => {
                        if inbound.send(Inbound::Text(text.to_string())).is_err() {
                            return;
                        }
                    }
                    Some(Ok(Message::Binary(data))) => match String::from_utf8(data.to_vec()) {
                        Ok(text) => {
                            if inbound.send(Inbound::Text(text)).is_err() {
                                return;
                            }
                        }
                        Err(_) => tracing::warn!("Dropping non-UTF-8 binary frame"),
                    },
                    Some(Ok(Message::Close(frame))) => {
                        break frame
                            .map(|f| f.reason.to_string())
                            .filter(|r| !r.is_empty())
                            .unwrap_or_else(|| "closed by server".to_string());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break e.to_string(),
                    None => break "connection reset".to_string(),
                }
            };
            let _ = inbound.send(Inbound::Closed(reason));
        });

        Ok(link)
    }
}
