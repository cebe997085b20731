mod control_input;
mod control_output;
mod event_sink;

pub use control_input::*;
pub use control_output::*;
pub use event_sink::*;
