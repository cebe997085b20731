mod connection;
mod control;
mod frame;
mod mode;

pub use connection::{ConnectionId, ParticipantRole};
pub use control::{ControlCommand, DISCONNECT_HARDWARE_SENTINEL, EngineEvent};
pub use frame::{HandshakeQuery, RelayFrame, RoomTarget, ack_value};
pub use mode::{CloudMode, RunningMode};
