pub mod call;
pub mod error;
pub mod media;
pub mod messaging;
pub mod presence;
pub mod signaling;
pub mod transport;

pub use call::*;
pub use error::CallError;
pub use media::*;
pub use messaging::*;
pub use presence::*;
pub use signaling::*;
pub use transport::*;
