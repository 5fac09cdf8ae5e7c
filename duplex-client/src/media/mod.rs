mod capture;
mod media_stream;
mod track_manager;

pub use capture::*;
pub use media_stream::*;
pub use track_manager::*;
