//! `ClusterWsClient` (spec.md 6.2) and a concrete `tokio-tungstenite`
//! binding. Grounded on the reconnect/backoff shape in
//! `other_examples/`'s `ws_stream.rs` sample and the teacher's own
//! `tokio-tungstenite` dependency (already present, unused by the MEV bot's
//! shredstream path but pinned in `Cargo.toml`).

use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, warn};

/// Events surfaced to a `ClusterWsClient` consumer (spec.md 6.2:
/// onOpen/onMessage/onClose/onError). Modeled as a channel of events rather
/// than raw callbacks, which reads more naturally against tokio's
/// `select!`-driven dispatcher loops (spec.md 4.1, 5) than a
/// callback-registration API would.
#[derive(Debug)]
pub enum WsEvent {
    Open,
    Message(String),
    Close,
    Error(String),
}

#[async_trait]
pub trait ClusterWsClient: Send + Sync {
    async fn send(&self, text: &str) -> Result<()>;
    async fn close(&self) -> Result<()>;
}

/// Concrete `ClusterWsClient` over `tokio-tungstenite`. `connect` spawns the
/// read loop and returns both the client handle and the event receiver;
/// `log_stream.rs` owns the receiver and drives reconnects.
pub struct TungsteniteWsClient {
    writer: Arc<Mutex<futures_util::stream::SplitSink<
        tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
        WsMessage,
    >>>,
}

impl TungsteniteWsClient {
    pub async fn connect(url: &str) -> Result<(Self, mpsc::UnboundedReceiver<WsEvent>)> {
        let (stream, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| anyhow!("ws connect to {url} failed: {e}"))?;
        let (writer, mut reader) = stream.split();
        let (tx, rx) = mpsc::unbounded_channel();

        tx.send(WsEvent::Open).ok();
        tokio::spawn(async move {
            loop {
                match reader.next().await {
                    Some(Ok(WsMessage::Text(text))) => {
                        if tx.send(WsEvent::Message(text)).is_err() {
                            break;
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) | None => {
                        tx.send(WsEvent::Close).ok();
                        break;
                    }
                    Some(Ok(_)) => {} // binary/ping/pong frames carry no logsSubscribe payload.
                    Some(Err(err)) => {
                        tx.send(WsEvent::Error(err.to_string())).ok();
                        break;
                    }
                }
            }
            debug!("ws read loop exited");
        });

        Ok((Self { writer: Arc::new(Mutex::new(writer)) }, rx))
    }
}

#[async_trait]
impl ClusterWsClient for TungsteniteWsClient {
    async fn send(&self, text: &str) -> Result<()> {
        self.writer.lock().await.send(WsMessage::Text(text.to_string())).await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if let Err(err) = self.writer.lock().await.send(WsMessage::Close(None)).await {
            warn!("error sending ws close frame: {err}");
        }
        Ok(())
    }
}
