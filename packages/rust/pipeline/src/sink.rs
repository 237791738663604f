//! Downstream record sink.
//!
//! The consumer speaks a small event protocol over a WebSocket: one frame
//! per normalized record, then a terminal frame, each acknowledged by the
//! receiver before the next is sent.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info};

use chordsync_shared::{ChordsyncError, Result};

/// Event name for a normalized record frame.
pub const RECORD_EVENT: &str = "new parsed song";

/// Event name for the terminal frame closing a run.
pub const TERMINAL_EVENT: &str = "last parsed song";

/// Downstream consumer of normalized records.
#[async_trait::async_trait]
pub trait RecordSink: Send {
    /// (Re-)establish the connection.
    async fn connect(&mut self) -> Result<()>;

    /// Send one event and wait for the consumer's acknowledgement.
    async fn emit(&mut self, event: &str, payload: serde_json::Value) -> Result<()>;

    /// Close the connection.
    async fn disconnect(&mut self) -> Result<()>;
}

// ---------------------------------------------------------------------------
// WebSocket implementation
// ---------------------------------------------------------------------------

/// WebSocket sink speaking `{event, data}` JSON text frames.
pub struct WsSink {
    address: String,
    ack_timeout: Duration,
    socket: Option<WebSocketStream<MaybeTlsStream<TcpStream>>>,
}

impl WsSink {
    pub fn new(address: impl Into<String>, ack_timeout: Duration) -> Self {
        Self {
            address: address.into(),
            ack_timeout,
            socket: None,
        }
    }
}

#[async_trait::async_trait]
impl RecordSink for WsSink {
    async fn connect(&mut self) -> Result<()> {
        // Reconnect semantics: an existing connection is dropped first.
        self.socket = None;

        let (socket, _) = connect_async(self.address.as_str())
            .await
            .map_err(|e| ChordsyncError::Sink(format!("connect to {} failed: {e}", self.address)))?;

        info!(address = %self.address, "sink connected");
        self.socket = Some(socket);
        Ok(())
    }

    async fn emit(&mut self, event: &str, payload: serde_json::Value) -> Result<()> {
        let socket = self
            .socket
            .as_mut()
            .ok_or_else(|| ChordsyncError::Sink("emit before connect".into()))?;

        let frame = serde_json::json!({ "event": event, "data": payload }).to_string();
        socket
            .send(Message::Text(frame))
            .await
            .map_err(|e| ChordsyncError::Sink(format!("send failed: {e}")))?;

        // The consumer acknowledges every frame; any inbound frame counts.
        match tokio::time::timeout(self.ack_timeout, socket.next()).await {
            Ok(Some(Ok(ack))) => {
                debug!(event, ack = %ack, "frame acknowledged");
                Ok(())
            }
            Ok(Some(Err(e))) => Err(ChordsyncError::Sink(format!(
                "acknowledgement read failed: {e}"
            ))),
            Ok(None) => Err(ChordsyncError::Sink(
                "connection closed before acknowledgement".into(),
            )),
            Err(_) => Err(ChordsyncError::Sink("acknowledgement timed out".into())),
        }
    }

    async fn disconnect(&mut self) -> Result<()> {
        if let Some(mut socket) = self.socket.take() {
            socket
                .close(None)
                .await
                .map_err(|e| ChordsyncError::Sink(format!("close failed: {e}")))?;
            info!("sink disconnected");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use tokio::net::TcpListener;
    use tokio::sync::Mutex;
    use tokio_tungstenite::accept_async;

    /// Minimal acknowledging consumer: records every text frame, replies "ok".
    async fn spawn_consumer() -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let address = format!("ws://{}", listener.local_addr().expect("addr"));
        let received = Arc::new(Mutex::new(Vec::new()));

        let log = Arc::clone(&received);
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let mut socket = accept_async(stream).await.expect("handshake");
            while let Some(Ok(message)) = socket.next().await {
                if let Message::Text(text) = message {
                    log.lock().await.push(text.to_string());
                    let _ = socket.send(Message::Text("ok".into())).await;
                }
            }
        });

        (address, received)
    }

    #[tokio::test]
    async fn emits_event_frames_and_awaits_acks() {
        let (address, received) = spawn_consumer().await;
        let mut sink = WsSink::new(address, Duration::from_secs(2));

        sink.connect().await.expect("connect");
        sink.emit(RECORD_EVENT, serde_json::json!({"title": "Oceans"}))
            .await
            .expect("emit record");
        sink.emit(TERMINAL_EVENT, serde_json::json!({}))
            .await
            .expect("emit terminal");
        sink.disconnect().await.expect("disconnect");

        let frames = received.lock().await;
        assert_eq!(frames.len(), 2);

        let first: serde_json::Value = serde_json::from_str(&frames[0]).expect("json");
        assert_eq!(first["event"], RECORD_EVENT);
        assert_eq!(first["data"]["title"], "Oceans");

        let last: serde_json::Value = serde_json::from_str(&frames[1]).expect("json");
        assert_eq!(last["event"], TERMINAL_EVENT);
        assert_eq!(last["data"], serde_json::json!({}));
    }

    #[tokio::test]
    async fn emit_before_connect_is_an_error() {
        let mut sink = WsSink::new("ws://127.0.0.1:1", Duration::from_secs(1));
        let result = sink.emit(RECORD_EVENT, serde_json::json!({})).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn connect_failure_surfaces_as_sink_error() {
        // Nothing listens on this port.
        let mut sink = WsSink::new("ws://127.0.0.1:9", Duration::from_secs(1));
        let result = sink.connect().await;
        assert!(matches!(result, Err(ChordsyncError::Sink(_))));
    }
}
