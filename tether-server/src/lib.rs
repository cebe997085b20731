pub mod client;
pub mod config;
pub mod control;
pub mod coordinator;
pub mod error;
pub mod host;
pub mod transport;

pub use client::*;
pub use config::*;
pub use control::*;
pub use coordinator::*;
pub use error::*;
pub use host::*;
pub use transport::*;
