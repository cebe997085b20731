use crate::client::{ClientEvent, ClientTarget, RelayClient};
use crate::config::RelayConfig;
use crate::control::EventSink;
use crate::coordinator::{Command, CoordinatorHandle, ElectionState, EngineStatus};
use crate::error::Result;
use crate::host::{HostEvent, HostServer, HostState, RelayHost};
use crate::transport::{AssetStore, TransportSecurity};
use serde_json::Value;
use std::net::SocketAddr;
use tether_core::{
    CloudMode, ControlCommand, DISCONNECT_HARDWARE_SENTINEL, EngineEvent, HARDWARE_QUERY,
    RELAY_PATH, RunningMode,
};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

struct ActiveHost {
    relay: RelayHost,
    server: HostServer,
    generation: u64,
}

/// Elects and runs the role of this instance.
///
/// Owns every piece of mutable engine state. Commands, host connection events
/// and relay client events are all processed by [`Coordinator::run`] one at a time.
pub struct Coordinator {
    config: RelayConfig,
    assets: AssetStore,
    state: ElectionState,
    running_mode: RunningMode,
    cloud_mode: CloudMode,
    port: u16,
    host: Option<ActiveHost>,
    client: Option<RelayClient>,
    host_generation: u64,
    client_generation: u64,
    /// Room this instance's own hardware serves; re-announced after failover.
    client_room_id: Option<String>,
    master_room_ids: Vec<String>,
    /// Consecutive role losses, drives the re-election backoff.
    failovers: u32,
    reelect_at: Option<Instant>,
    events: EventSink,
    command_rx: mpsc::Receiver<Command>,
    host_tx: mpsc::Sender<HostEvent>,
    host_rx: mpsc::Receiver<HostEvent>,
    client_tx: mpsc::Sender<ClientEvent>,
    client_rx: mpsc::Receiver<ClientEvent>,
}

impl Coordinator {
    pub fn new(
        config: RelayConfig,
        assets: AssetStore,
        events: EventSink,
    ) -> (Self, CoordinatorHandle) {
        let (command_tx, command_rx) = mpsc::channel(64);
        let (host_tx, host_rx) = mpsc::channel(256);
        let (client_tx, client_rx) = mpsc::channel(64);

        let coordinator = Self {
            port: config.port,
            config,
            assets,
            state: ElectionState::Idle,
            running_mode: RunningMode::Server,
            cloud_mode: CloudMode::Single,
            host: None,
            client: None,
            host_generation: 0,
            client_generation: 0,
            client_room_id: None,
            master_room_ids: Vec::new(),
            failovers: 0,
            reelect_at: None,
            events,
            command_rx,
            host_tx,
            host_rx,
            client_tx,
            client_rx,
        };

        (coordinator, CoordinatorHandle::new(command_tx))
    }

    /// Starts the actor on its own task.
    pub fn spawn(
        config: RelayConfig,
        assets: AssetStore,
        events: EventSink,
    ) -> (CoordinatorHandle, JoinHandle<()>) {
        let (coordinator, handle) = Self::new(config, assets, events);
        let task = tokio::spawn(coordinator.run());
        (handle, task)
    }

    pub async fn run(mut self) {
        info!("Relay coordinator started");

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(c) => self.handle_command(c).await,
                        None => {
                            info!("Command channel closed. Shutting down relay engine.");
                            self.close().await;
                            break;
                        }
                    }
                }

                Some(evt) = self.host_rx.recv() => self.handle_host_event(evt),

                Some(evt) = self.client_rx.recv() => self.handle_client_event(evt).await,

                _ = wait_until(self.reelect_at) => {
                    self.reelect_at = None;
                    self.elect().await;
                }
            }
        }

        info!("Relay coordinator finished");
    }

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Control(control) => self.handle_control(control).await,
            Command::Status(reply) => {
                let _ = reply.send(self.status());
            }
            Command::Close(reply) => {
                self.close().await;
                let _ = reply.send(());
            }
        }
    }

    async fn handle_control(&mut self, control: ControlCommand) {
        match control {
            ControlCommand::Open { port } => self.open(port).await,
            ControlCommand::AddRoomId(Some(room_id)) => self.register_room(room_id),
            ControlCommand::AddRoomId(None) => debug!("Ignoring addRoomId without a room"),
            ControlCommand::Send(data) => self.send(data),
            ControlCommand::DisconnectHardware => {
                self.send(Value::String(DISCONNECT_HARDWARE_SENTINEL.to_owned()))
            }
        }
    }

    async fn open(&mut self, port: Option<u16>) {
        if !matches!(self.state, ElectionState::Idle | ElectionState::Closed) {
            warn!("Ignoring open while {:?}", self.state);
            return;
        }

        self.port = port.unwrap_or(self.config.port);
        self.failovers = 0;
        self.elect().await;
    }

    /// Claims the port or, when it is taken, joins whoever holds it.
    async fn elect(&mut self) {
        self.state = ElectionState::Electing;
        let security = TransportSecurity::resolve(&self.assets, self.config.plaintext_only);
        let addr = SocketAddr::new(self.config.bind_address, self.port);

        match TcpListener::bind(addr).await {
            Ok(listener) => {
                if let Err(e) = self.start_host(listener, &security) {
                    warn!("Failed to start listener on {}: {}", addr, e);
                    self.start_client(&security);
                }
            }
            Err(e) => {
                info!("Port {} is taken ({}), joining its owner", self.port, e);
                self.start_client(&security);
            }
        }
    }

    fn start_host(&mut self, listener: TcpListener, security: &TransportSecurity) -> Result<()> {
        self.host_generation += 1;
        let generation = self.host_generation;
        let state = HostState::new(
            self.host_tx.clone(),
            generation,
            self.config.heartbeat,
            self.config.modules_dir.clone(),
        );
        let server = HostServer::start(listener, security, state)?;
        let relay = RelayHost::new(self.events.clone());

        self.host = Some(ActiveHost {
            relay,
            server,
            generation,
        });
        self.state = ElectionState::RunningAsServer;
        self.failovers = 0;
        self.enter_role(RunningMode::Server, CloudMode::Single);
        Ok(())
    }

    fn start_client(&mut self, security: &TransportSecurity) {
        let target = self.client_target(security);
        self.client_generation += 1;

        let client = RelayClient::connect(
            target,
            self.client_room_id.clone(),
            self.client_generation,
            self.client_tx.clone(),
        );

        self.client = Some(client);
        self.state = ElectionState::RunningAsClient;
        self.enter_role(RunningMode::Client, CloudMode::Cloud);
    }

    fn client_target(&self, security: &TransportSecurity) -> ClientTarget {
        let (scheme, host, tls) = match security {
            TransportSecurity::Plain => ("ws", &self.config.plain_host, None),
            TransportSecurity::Tls { connector, .. } => {
                ("wss", &self.config.tls_host, Some(connector.clone()))
            }
        };

        ClientTarget {
            url: format!(
                "{scheme}://{host}:{}{RELAY_PATH}?{HARDWARE_QUERY}",
                self.port
            ),
            tls,
            reconnect: self.config.reconnect,
        }
    }

    fn enter_role(&mut self, running_mode: RunningMode, cloud_mode: CloudMode) {
        info!("Running as {}, {}", running_mode, cloud_mode);
        self.running_mode = running_mode;
        self.cloud_mode = cloud_mode;
        self.events
            .emit(EngineEvent::RunningModeChanged(running_mode));
        self.events.emit(EngineEvent::CloudModeChanged(cloud_mode));
    }

    fn register_room(&mut self, room_id: String) {
        if !self.master_room_ids.contains(&room_id) {
            self.master_room_ids.push(room_id.clone());
        }

        if let (ElectionState::RunningAsClient, Some(client)) = (self.state, &self.client) {
            client.announce_room(&room_id);
        }

        info!("Local hardware serves room '{}'", room_id);
        self.client_room_id = Some(room_id);
    }

    /// Data from the local hardware owner, towards the browsers.
    fn send(&self, data: Value) {
        if let Some(host) = &self.host {
            host.relay
                .relay_outbound(data, self.client_room_id.as_deref());
        } else if let Some(client) = &self.client {
            client.send_upstream(data);
        } else if self.state == ElectionState::Electing {
            warn!("Dropping data while electing a role");
        } else {
            error!("Cannot relay data: neither server nor client role is active");
        }
    }

    fn handle_host_event(&mut self, event: HostEvent) {
        match &mut self.host {
            Some(host) if host.generation == event.generation() => host
                .relay
                .handle_event(event, self.client_room_id.as_deref()),
            Some(_) => debug!("Ignoring event from discarded listener: {:?}", event),
            None => debug!("No active host, dropping {:?}", event),
        }
    }

    async fn handle_client_event(&mut self, event: ClientEvent) {
        let current = self.client.as_ref().map(RelayClient::generation);
        if current != Some(event.generation()) {
            debug!("Ignoring event from discarded relay client: {:?}", event);
            return;
        }

        match event {
            ClientEvent::Connected { .. } => {
                self.failovers = 0;
                self.events.emit(EngineEvent::Connection);
            }
            ClientEvent::Data { payload, .. } => self.events.emit(EngineEvent::Data(payload)),
            ClientEvent::Lost { reason, .. } => {
                warn!("Lost the rendezvous host ({}), re-electing", reason);
                if let Some(client) = self.client.take() {
                    client.close().await;
                }
                self.failovers = self.failovers.saturating_add(1);
                self.state = ElectionState::Electing;

                let delay = self.config.reelect_delay(self.failovers);
                if !delay.is_zero() {
                    info!("Re-election #{} in {:?}", self.failovers, delay);
                }
                self.reelect_at = Some(Instant::now() + delay);
            }
        }
    }

    async fn close(&mut self) {
        if self.state == ElectionState::Closed {
            debug!("Relay engine already closed");
            return;
        }

        self.reelect_at = None;
        if let Some(mut host) = self.host.take() {
            host.relay.shutdown();
            host.server.shutdown().await;
        }
        if let Some(client) = self.client.take() {
            client.close().await;
        }

        self.state = ElectionState::Closed;
        info!("Relay engine closed");
        self.events.emit(EngineEvent::Close);
    }

    fn status(&self) -> EngineStatus {
        EngineStatus {
            state: self.state,
            running_mode: self.running_mode,
            cloud_mode: self.current_cloud_mode(),
            client_room_id: self.client_room_id.clone(),
            master_room_ids: self.master_room_ids.clone(),
            host: self.host.as_ref().map(|h| h.relay.snapshot()),
            local_addr: self.host.as_ref().map(|h| h.server.local_addr()),
        }
    }

    fn current_cloud_mode(&self) -> CloudMode {
        match &self.host {
            Some(host) => host.relay.cloud_mode(),
            None => self.cloud_mode,
        }
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
