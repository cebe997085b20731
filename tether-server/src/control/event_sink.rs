use tether_core::EngineEvent;
use tokio::sync::mpsc;
use tracing::debug;

/// Upward half of the control channel. Emitting never blocks the engine.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<EngineEvent>,
}

impl EventSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<EngineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn emit(&self, event: EngineEvent) {
        if let Err(e) = self.tx.send(event) {
            debug!("Control channel gone, dropping {:?}", e.0);
        }
    }
}
