use async_trait::async_trait;
use std::sync::Arc;
use tether_core::EngineEvent;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, error};

/// Trait the parent-facing side implements so the engine can report
/// mode changes, relayed data and lifecycle events.
#[async_trait]
pub trait ControlOutput: Send + Sync {
    async fn emit(&self, event: EngineEvent);
}

/// Writes every event as one JSON object per line.
pub struct JsonLinesOutput<W> {
    writer: Mutex<W>,
}

impl<W> JsonLinesOutput<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

#[async_trait]
impl<W> ControlOutput for JsonLinesOutput<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn emit(&self, event: EngineEvent) {
        let mut line = match serde_json::to_vec(&event) {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to serialize control event: {}", e);
                return;
            }
        };
        line.push(b'\n');

        let mut writer = self.writer.lock().await;
        if let Err(e) = writer.write_all(&line).await {
            debug!("Control output closed: {}", e);
            return;
        }
        if let Err(e) = writer.flush().await {
            debug!("Control output flush failed: {}", e);
        }
    }
}

/// Pumps engine events into `output` until every `EventSink` is dropped.
pub async fn forward_events(
    mut events: mpsc::UnboundedReceiver<EngineEvent>,
    output: Arc<dyn ControlOutput>,
) {
    while let Some(event) = events.recv().await {
        output.emit(event).await;
    }
}
