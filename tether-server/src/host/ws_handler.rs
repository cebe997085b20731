use crate::config::HeartbeatConfig;
use crate::host::{HostEvent, Outbound, SocketTasks};
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use bytes::Bytes;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use std::path::PathBuf;
use std::sync::Arc;
use tether_core::{ConnectionId, HandshakeQuery, RelayFrame};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Shared state of the rendezvous listener's handlers.
#[derive(Clone)]
pub struct HostState {
    pub(crate) events: mpsc::Sender<HostEvent>,
    pub(crate) generation: u64,
    pub(crate) heartbeat: HeartbeatConfig,
    pub(crate) modules_dir: Arc<PathBuf>,
    pub(crate) sockets: SocketTasks,
}

impl HostState {
    pub fn new(
        events: mpsc::Sender<HostEvent>,
        generation: u64,
        heartbeat: HeartbeatConfig,
        modules_dir: PathBuf,
    ) -> Self {
        Self {
            events,
            generation,
            heartbeat,
            modules_dir: Arc::new(modules_dir),
            sockets: SocketTasks::new(),
        }
    }

    pub fn sockets(&self) -> &SocketTasks {
        &self.sockets
    }
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<HandshakeQuery>,
    State(state): State<HostState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        let sockets = state.sockets.clone();
        if !sockets.spawn(handle_socket(socket, query, state)) {
            debug!("Listener is shutting down, dropping upgraded socket");
        }
    })
}

/// Writes one message, giving up on a peer that stopped reading.
async fn write(
    sender: &mut SplitSink<WebSocket, Message>,
    message: Message,
    heartbeat: &HeartbeatConfig,
) -> bool {
    match tokio::time::timeout(heartbeat.timeout, sender.send(message)).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            debug!("WS write failed: {}", e);
            false
        }
        Err(_) => {
            info!("WS write stalled for {:?}", heartbeat.timeout);
            false
        }
    }
}

async fn handle_socket(socket: WebSocket, query: HandshakeQuery, state: HostState) {
    let id = ConnectionId::new();
    info!("New WebSocket connection: {} ({:?})", id, query.role());

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let generation = state.generation;
    let accepted = HostEvent::Accepted {
        generation,
        id,
        outbound: tx,
        query,
    };
    if state.events.send(accepted).await.is_err() {
        warn!("Host is gone, refusing connection {}", id);
        return;
    }

    let mut heartbeat = tokio::time::interval(state.heartbeat.interval);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_seen = Instant::now();

    loop {
        tokio::select! {
            outbound = rx.recv() => match outbound {
                Some(Outbound::Frame(frame)) => {
                    let json = match serde_json::to_string(&frame) {
                        Ok(json) => json,
                        Err(e) => {
                            error!("Failed to serialize relay frame: {}", e);
                            continue;
                        }
                    };
                    if !write(&mut sender, Message::Text(json.into()), &state.heartbeat).await {
                        break;
                    }
                }
                Some(Outbound::Close) | None => {
                    write(&mut sender, Message::Close(None), &state.heartbeat).await;
                    break;
                }
            },

            inbound = receiver.next() => match inbound {
                Some(Ok(msg)) => {
                    last_seen = Instant::now();
                    match msg {
                        Message::Text(text) => match serde_json::from_str::<RelayFrame>(text.as_str()) {
                            Ok(frame) => {
                                if state.events.send(HostEvent::Frame { generation, id, frame }).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => warn!("Invalid relay frame from {}: {}", id, e),
                        },
                        Message::Close(_) => break,
                        _ => {}
                    }
                }
                Some(Err(e)) => {
                    debug!("WS error on {}: {}", id, e);
                    break;
                }
                None => break,
            },

            _ = heartbeat.tick() => {
                if last_seen.elapsed() > state.heartbeat.timeout {
                    info!("Connection {} missed its heartbeat", id);
                    break;
                }
                if !write(&mut sender, Message::Ping(Bytes::new()), &state.heartbeat).await {
                    break;
                }
            }
        }
    }

    let _ = state.events.send(HostEvent::Closed { generation, id }).await;
    info!("WebSocket disconnected: {}", id);
}
