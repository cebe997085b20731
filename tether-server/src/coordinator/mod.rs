#[allow(clippy::module_inception)]
mod coordinator;
mod handle;
mod status;

pub use coordinator::*;
pub use handle::*;
pub use status::*;
