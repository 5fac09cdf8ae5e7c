mod chat_log;
mod messenger;

pub use chat_log::*;
pub use messenger::*;
