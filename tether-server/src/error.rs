use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("credential artifact `{0}` is not registered")]
    UnregisteredArtifact(String),

    #[error("failed to read credential artifact `{name}`: {source}")]
    UnreadableArtifact {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("unsupported private key: {0}")]
    UnsupportedKey(String),

    #[error("tls setup failed: {0}")]
    Tls(#[from] native_tls::Error),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("relay engine is no longer running")]
    EngineStopped,
}

pub type Result<T, E = RelayError> = std::result::Result<T, E>;
