mod connection;
mod host_event;
mod http;
mod relay_host;
mod server;
mod socket_tasks;
mod ws_handler;

pub use connection::*;
pub use host_event::*;
pub use http::*;
pub use relay_host::*;
pub use server::*;
pub use socket_tasks::*;
pub use ws_handler::*;
