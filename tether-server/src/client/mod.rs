mod client_event;
mod relay_client;

pub use client_event::*;
pub use relay_client::*;
