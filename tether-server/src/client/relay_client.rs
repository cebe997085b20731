use crate::client::ClientEvent;
use crate::config::ReconnectConfig;
use crate::error::Result;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use std::time::Duration;
use tether_core::RelayFrame;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{Connector, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const CLOSE_GRACE: Duration = Duration::from_millis(500);

/// Where and how the relay client dials the rendezvous host.
#[derive(Clone)]
pub struct ClientTarget {
    pub url: String,
    /// Present when the election ran over TLS.
    pub tls: Option<native_tls::TlsConnector>,
    pub reconnect: ReconnectConfig,
}

enum ClientCommand {
    Upstream(Value),
    AnnounceRoom(String),
}

/// Hardware-side session with a remote rendezvous host.
pub struct RelayClient {
    generation: u64,
    commands: mpsc::UnboundedSender<ClientCommand>,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl RelayClient {
    /// Starts dialling `target`. `room_id`, if any, is announced on every successful connect.
    pub fn connect(
        target: ClientTarget,
        room_id: Option<String>,
        generation: u64,
        events: mpsc::Sender<ClientEvent>,
    ) -> Self {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = oneshot::channel();

        let task = tokio::spawn(run_client(
            target,
            room_id,
            generation,
            command_rx,
            shutdown_rx,
            events,
        ));

        Self {
            generation,
            commands,
            shutdown: Some(shutdown),
            task,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Sends `{data}` to the host. Queued until the session is up.
    pub fn send_upstream(&self, data: Value) {
        let _ = self.commands.send(ClientCommand::Upstream(data));
    }

    pub fn announce_room(&self, room_id: &str) {
        let _ = self
            .commands
            .send(ClientCommand::AnnounceRoom(room_id.to_owned()));
    }

    pub async fn close(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if tokio::time::timeout(CLOSE_GRACE, &mut self.task)
            .await
            .is_err()
        {
            self.task.abort();
        }
    }
}

impl Drop for RelayClient {
    fn drop(&mut self) {
        self.task.abort();
    }
}

enum SessionEnd {
    Shutdown,
    Disconnected(String),
}

async fn run_client(
    target: ClientTarget,
    mut room_id: Option<String>,
    generation: u64,
    mut commands: mpsc::UnboundedReceiver<ClientCommand>,
    mut shutdown: oneshot::Receiver<()>,
    events: mpsc::Sender<ClientEvent>,
) {
    info!("Init socket client to {}", target.url);

    let ws = match connect_with_retries(&target, &mut shutdown).await {
        Some(Ok(ws)) => ws,
        Some(Err(reason)) => {
            warn!("Giving up on {}: {}", target.url, reason);
            let _ = events.send(ClientEvent::Lost { generation, reason }).await;
            return;
        }
        None => return,
    };

    info!("Client successfully connected with server");
    let _ = events.send(ClientEvent::Connected { generation }).await;

    let end = relay_session(
        ws,
        &mut room_id,
        generation,
        &mut commands,
        &mut shutdown,
        &events,
    )
    .await;

    match end {
        SessionEnd::Shutdown => info!("Relay client shutting down"),
        SessionEnd::Disconnected(reason) => {
            warn!("Relay connection lost: {}", reason);
            let _ = events.send(ClientEvent::Lost { generation, reason }).await;
        }
    }
}

/// One initial attempt plus `reconnect.attempts` retries.
/// `None` means shutdown was requested meanwhile.
async fn connect_with_retries(
    target: &ClientTarget,
    shutdown: &mut oneshot::Receiver<()>,
) -> Option<std::result::Result<WsStream, String>> {
    let mut retries = 0;

    loop {
        let attempt = tokio::select! {
            result = tokio::time::timeout(CONNECT_TIMEOUT, connect_once(target)) => result,
            _ = &mut *shutdown => return None,
        };

        let failure = match attempt {
            Ok(Ok(ws)) => return Some(Ok(ws)),
            Ok(Err(e)) => e.to_string(),
            Err(_) => "connect timed out".to_owned(),
        };
        warn!("Failed to connect to {}: {}", target.url, failure);

        if retries >= target.reconnect.attempts {
            return Some(Err(format!(
                "reconnection attempts exhausted ({failure})"
            )));
        }
        retries += 1;

        tokio::select! {
            _ = tokio::time::sleep(target.reconnect.delay) => {}
            _ = &mut *shutdown => return None,
        }
        debug!("Reconnect attempt {} to {}", retries, target.url);
    }
}

async fn connect_once(target: &ClientTarget) -> Result<WsStream> {
    let connector = target.tls.clone().map(Connector::NativeTls);
    let (ws, _) =
        tokio_tungstenite::connect_async_tls_with_config(target.url.as_str(), None, false, connector)
            .await?;
    Ok(ws)
}

async fn relay_session(
    ws: WsStream,
    room_id: &mut Option<String>,
    generation: u64,
    commands: &mut mpsc::UnboundedReceiver<ClientCommand>,
    shutdown: &mut oneshot::Receiver<()>,
    events: &mpsc::Sender<ClientEvent>,
) -> SessionEnd {
    let (mut sink, mut stream) = ws.split();

    // Re-announce the room this instance was serving before a failover.
    if let Some(room) = room_id.as_deref() {
        info!("Requesting browser target match for room '{}'", room);
        if send_frame(&mut sink, &RelayFrame::match_target(room))
            .await
            .is_err()
        {
            return SessionEnd::Disconnected("failed to announce room".into());
        }
    }

    loop {
        tokio::select! {
            _ = &mut *shutdown => {
                let _ = sink.send(Message::Close(None)).await;
                return SessionEnd::Shutdown;
            }

            command = commands.recv() => {
                let frame = match command {
                    Some(ClientCommand::Upstream(data)) => RelayFrame::data(data),
                    Some(ClientCommand::AnnounceRoom(room)) => {
                        let frame = RelayFrame::match_target(room.as_str());
                        *room_id = Some(room);
                        frame
                    }
                    None => {
                        let _ = sink.send(Message::Close(None)).await;
                        return SessionEnd::Shutdown;
                    }
                };
                if let Err(e) = send_frame(&mut sink, &frame).await {
                    return SessionEnd::Disconnected(format!("send failed: {e}"));
                }
            }

            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<RelayFrame>(text.as_str()) {
                        Ok(RelayFrame::Message { payload, .. }) => {
                            let _ = events.send(ClientEvent::Data { generation, payload }).await;
                        }
                        Ok(other) => debug!("Ignoring {:?} from host", other),
                        Err(e) => warn!("Invalid relay frame from host: {}", e),
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    return SessionEnd::Disconnected("closed by host".into());
                }
                Some(Err(e)) => return SessionEnd::Disconnected(e.to_string()),
                Some(Ok(_)) => {}
            }
        }
    }
}

async fn send_frame(
    sink: &mut futures::stream::SplitSink<WsStream, Message>,
    frame: &RelayFrame,
) -> Result<()> {
    let json = serde_json::to_string(frame).map_err(std::io::Error::other)?;
    sink.send(Message::Text(json.into())).await?;
    Ok(())
}
