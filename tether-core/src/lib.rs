pub mod model;

pub use model::*;

/// Well-known rendezvous port every instance tries to claim.
pub const DEFAULT_PORT: u16 = 23518;

/// Path of the relay websocket endpoint on the rendezvous listener.
pub const RELAY_PATH: &str = "/relay";

/// Query string a hardware participant dials the relay endpoint with.
pub const HARDWARE_QUERY: &str = "childServer=true";
