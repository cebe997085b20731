use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;
use tether_core::DEFAULT_PORT;

/// Runtime settings of the relay engine.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Port claimed when `open` does not name one.
    pub port: u16,
    pub bind_address: IpAddr,
    /// Skip the credential bundle and always serve plaintext.
    pub plaintext_only: bool,
    /// Directory holding the certificate artifacts.
    pub asset_dir: PathBuf,
    /// Directory served by the module download responder.
    pub modules_dir: PathBuf,
    /// Host dialled by the relay client when the election ran over TLS.
    /// Must match the certificate's subject.
    pub tls_host: String,
    /// Host dialled by the relay client on plaintext elections.
    pub plain_host: String,
    pub heartbeat: HeartbeatConfig,
    pub reconnect: ReconnectConfig,
    pub reelect_backoff_base: Duration,
    pub reelect_backoff_max: Duration,
}

#[derive(Debug, Clone, Copy)]
pub struct HeartbeatConfig {
    pub interval: Duration,
    /// A peer silent for longer than this is dropped.
    pub timeout: Duration,
}

#[derive(Debug, Clone, Copy)]
pub struct ReconnectConfig {
    /// Retries after the initial connect attempt.
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            plaintext_only: false,
            asset_dir: PathBuf::from("assets"),
            modules_dir: PathBuf::from("modules"),
            tls_host: "localhost".to_owned(),
            plain_host: "127.0.0.1".to_owned(),
            heartbeat: HeartbeatConfig::default(),
            reconnect: ReconnectConfig::default(),
            reelect_backoff_base: Duration::from_millis(250),
            reelect_backoff_max: Duration::from_secs(5),
        }
    }
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            timeout: Duration::from_secs(5),
        }
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

impl RelayConfig {
    /// Delay before the `failovers`-th consecutive re-election (1-based).
    /// The first one is immediate.
    pub fn reelect_delay(&self, failovers: u32) -> Duration {
        if failovers <= 1 {
            return Duration::ZERO;
        }
        let factor = 1u32 << (failovers - 2).min(16);
        self.reelect_backoff_base
            .saturating_mul(factor)
            .min(self.reelect_backoff_max)
    }
}
