pub mod test_client;

pub use engine_helpers::*;
pub use mock_control::*;
pub use test_client::*;
