pub use duplex_core::model::{CallState, PeerId, ShareMode};

pub mod model {
    pub use duplex_core::model::*;
}

#[cfg(feature = "client")]
pub mod client {
    pub use duplex_client::*;
}
