use crate::coordinator::EngineStatus;
use crate::error::{RelayError, Result};
use serde_json::Value;
use tether_core::ControlCommand;
use tokio::sync::{mpsc, oneshot};

/// Requests handled by the coordinator actor.
#[derive(Debug)]
pub enum Command {
    Control(ControlCommand),
    Status(oneshot::Sender<EngineStatus>),
    /// Replies once the listener and every connection are released.
    Close(oneshot::Sender<()>),
}

/// Cloneable front door to a running coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::Sender<Command>,
}

impl CoordinatorHandle {
    pub(crate) fn new(tx: mpsc::Sender<Command>) -> Self {
        Self { tx }
    }

    pub async fn open(&self, port: Option<u16>) -> Result<()> {
        self.control(ControlCommand::Open { port }).await
    }

    pub async fn register_room(&self, room_id: impl Into<String>) -> Result<()> {
        self.control(ControlCommand::AddRoomId(Some(room_id.into())))
            .await
    }

    pub async fn send(&self, data: Value) -> Result<()> {
        self.control(ControlCommand::Send(data)).await
    }

    pub async fn disconnect_hardware(&self) -> Result<()> {
        self.control(ControlCommand::DisconnectHardware).await
    }

    pub async fn control(&self, command: ControlCommand) -> Result<()> {
        self.tx
            .send(Command::Control(command))
            .await
            .map_err(|_| RelayError::EngineStopped)
    }

    pub async fn status(&self) -> Result<EngineStatus> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Status(reply))
            .await
            .map_err(|_| RelayError::EngineStopped)?;
        rx.await.map_err(|_| RelayError::EngineStopped)
    }

    pub async fn close(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Close(reply))
            .await
            .map_err(|_| RelayError::EngineStopped)?;
        rx.await.map_err(|_| RelayError::EngineStopped)
    }
}
