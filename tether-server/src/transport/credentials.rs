use crate::error::{RelayError, Result};
use crate::transport::to_pkcs8_pem;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const PRIVATE_KEY: &str = "hardware.key";
pub const LEAF_CERT: &str = "cert.pem";
pub const CHAIN_CA1: &str = "ChainCA1.crt";
pub const CHAIN_CA2: &str = "ChainCA2.crt";
pub const ROOT_CA: &str = "RootCA.crt";

/// Every artifact a TLS listener needs, in assembly order.
pub const BUNDLE_ARTIFACTS: [&str; 5] = [PRIVATE_KEY, LEAF_CERT, CHAIN_CA1, CHAIN_CA2, ROOT_CA];

/// Maps logical artifact names to files.
///
/// The default registry does not contain `ChainCA2.crt`, so bundle assembly
/// fails and the listener runs plaintext unless the caller registers it.
#[derive(Debug, Clone, Default)]
pub struct AssetStore {
    entries: HashMap<String, PathBuf>,
}

impl AssetStore {
    pub fn new(asset_dir: impl AsRef<Path>) -> Self {
        let dir = asset_dir.as_ref();
        let mut store = Self::default();
        for name in [PRIVATE_KEY, LEAF_CERT, CHAIN_CA1, ROOT_CA] {
            store.register(name, dir.join(name));
        }
        store
    }

    pub fn register(&mut self, name: impl Into<String>, path: impl Into<PathBuf>) {
        self.entries.insert(name.into(), path.into());
    }

    pub fn get(&self, name: &str) -> Option<&Path> {
        self.entries.get(name).map(PathBuf::as_path)
    }
}

/// Raw PEM contents of a complete certificate bundle.
#[derive(Debug, Clone)]
pub struct CredentialBundle {
    pub key: Vec<u8>,
    pub cert: Vec<u8>,
    /// Chain CA 1, chain CA 2, root CA.
    pub ca: Vec<Vec<u8>>,
}

impl CredentialBundle {
    /// Reads all five artifacts. The first missing or unreadable one aborts.
    pub fn load(store: &AssetStore) -> Result<Self> {
        let read = |name: &str| -> Result<Vec<u8>> {
            let path = store
                .get(name)
                .ok_or_else(|| RelayError::UnregisteredArtifact(name.to_owned()))?;
            std::fs::read(path).map_err(|source| RelayError::UnreadableArtifact {
                name: name.to_owned(),
                source,
            })
        };

        Ok(Self {
            key: read(PRIVATE_KEY)?,
            cert: read(LEAF_CERT)?,
            ca: vec![read(CHAIN_CA1)?, read(CHAIN_CA2)?, read(ROOT_CA)?],
        })
    }

    /// Leaf certificate followed by the intermediate CAs, as one PEM chain.
    fn certificate_chain(&self) -> Vec<u8> {
        let mut chain = self.cert.clone();
        for intermediate in self.ca.iter().take(2) {
            if !chain.ends_with(b"\n") {
                chain.push(b'\n');
            }
            chain.extend_from_slice(intermediate);
        }
        chain
    }

    /// Accepts PKCS#8 keys as well as traditional RSA (PKCS#1) ones.
    pub fn acceptor(&self) -> Result<tokio_native_tls::TlsAcceptor> {
        let key = to_pkcs8_pem(&self.key)?;
        let identity = native_tls::Identity::from_pkcs8(&self.certificate_chain(), &key)?;
        let acceptor = native_tls::TlsAcceptor::new(identity)?;
        Ok(tokio_native_tls::TlsAcceptor::from(acceptor))
    }

    /// Client-side connector that trusts the bundle's root CA.
    pub fn connector(&self) -> Result<native_tls::TlsConnector> {
        let mut builder = native_tls::TlsConnector::builder();
        for ca in &self.ca {
            builder.add_root_certificate(native_tls::Certificate::from_pem(ca)?);
        }
        Ok(builder.build()?)
    }
}

/// Transport chosen for one election.
#[derive(Clone)]
pub enum TransportSecurity {
    Plain,
    Tls {
        acceptor: tokio_native_tls::TlsAcceptor,
        connector: native_tls::TlsConnector,
    },
}

impl TransportSecurity {
    /// Never fails: an incomplete or unusable bundle downgrades to plaintext.
    pub fn resolve(store: &AssetStore, plaintext_only: bool) -> Self {
        if plaintext_only {
            info!("Plaintext transport forced by configuration");
            return TransportSecurity::Plain;
        }

        let bundle = match CredentialBundle::load(store) {
            Ok(bundle) => bundle,
            Err(e) => {
                info!("Credential bundle incomplete ({}), server runs on http", e);
                return TransportSecurity::Plain;
            }
        };

        match (bundle.acceptor(), bundle.connector()) {
            (Ok(acceptor), Ok(connector)) => {
                info!("Credential bundle loaded, server runs on https");
                TransportSecurity::Tls {
                    acceptor,
                    connector,
                }
            }
            (Err(e), _) | (_, Err(e)) => {
                warn!("Unusable credential bundle ({}), server runs on http", e);
                TransportSecurity::Plain
            }
        }
    }

    pub fn is_tls(&self) -> bool {
        matches!(self, TransportSecurity::Tls { .. })
    }
}
