mod credentials;
mod private_key;
mod tls_listener;

pub use credentials::*;
pub use private_key::*;
pub use tls_listener::*;
