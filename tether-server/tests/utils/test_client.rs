use anyhow::{Context, Result, bail};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use std::time::Duration;
use tether_core::RelayFrame;
use tether_server::{AssetStore, CredentialBundle};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{Connector, MaybeTlsStream, WebSocketStream};

/// Timeout for a single frame to arrive (ms).
pub const FRAME_TIMEOUT_MS: u64 = 5000;

/// A browser or hardware participant dialling the relay endpoint directly.
pub struct TestClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl TestClient {
    pub async fn browser(port: u16, room_id: &str) -> Result<Self> {
        Self::connect(&format!("ws://127.0.0.1:{port}/relay?roomId={room_id}")).await
    }

    pub async fn hardware(port: u16) -> Result<Self> {
        Self::connect(&format!("ws://127.0.0.1:{port}/relay?childServer=true")).await
    }

    /// Browser dialling a TLS host, trusting the CAs of `assets`.
    pub async fn browser_tls(port: u16, room_id: &str, assets: &AssetStore) -> Result<Self> {
        let url = format!("wss://localhost:{port}/relay?roomId={room_id}");
        let connector = CredentialBundle::load(assets)?.connector()?;
        let (ws, _) = tokio_tungstenite::connect_async_tls_with_config(
            url.as_str(),
            None,
            false,
            Some(Connector::NativeTls(connector)),
        )
        .await
        .with_context(|| format!("Failed to connect to {url}"))?;
        Ok(Self { ws })
    }

    async fn connect(url: &str) -> Result<Self> {
        let (ws, _) = tokio_tungstenite::connect_async(url)
            .await
            .with_context(|| format!("Failed to connect to {url}"))?;
        Ok(Self { ws })
    }

    pub async fn send(&mut self, frame: &RelayFrame) -> Result<()> {
        let json = serde_json::to_string(frame)?;
        self.ws
            .send(Message::Text(json.into()))
            .await
            .context("Failed to send frame")
    }

    pub async fn send_data(&mut self, data: Value) -> Result<()> {
        self.send(&RelayFrame::data(data)).await
    }

    /// Next relay frame, answering heartbeats on the way.
    pub async fn recv(&mut self) -> Result<RelayFrame> {
        self.recv_within(Duration::from_millis(FRAME_TIMEOUT_MS))
            .await?
            .context("Timed out waiting for a frame")
    }

    /// Fails if a relay frame arrives within `ms`.
    pub async fn expect_silence(&mut self, ms: u64) -> Result<()> {
        match self.recv_within(Duration::from_millis(ms)).await {
            Ok(Some(frame)) => bail!("Expected silence, got {:?}", frame),
            Ok(None) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Waits until the host closes this connection.
    pub async fn expect_closed(&mut self) -> Result<()> {
        let wait = async {
            loop {
                match self.ws.next().await {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return,
                    Some(Ok(_)) => {}
                }
            }
        };
        tokio::time::timeout(Duration::from_millis(FRAME_TIMEOUT_MS), wait)
            .await
            .context("Connection was not closed by the host")
    }

    pub async fn close(mut self) -> Result<()> {
        self.ws.close(None).await.context("Failed to close websocket")
    }

    async fn recv_within(&mut self, timeout: Duration) -> Result<Option<RelayFrame>> {
        let wait = async {
            loop {
                match self.ws.next().await {
                    Some(Ok(Message::Text(text))) => {
                        return serde_json::from_str::<RelayFrame>(text.as_str())
                            .context("Host sent an invalid frame");
                    }
                    Some(Ok(Message::Close(_))) | None => bail!("Connection closed"),
                    Some(Err(e)) => bail!("WebSocket error: {e}"),
                    Some(Ok(_)) => {}
                }
            }
        };

        match tokio::time::timeout(timeout, wait).await {
            Ok(frame) => frame.map(Some),
            Err(_) => Ok(None),
        }
    }
}
