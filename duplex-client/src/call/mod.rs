mod call_command;
mod call_controller;
mod call_observer;
mod call_session;

pub use call_command::*;
pub use call_controller::*;
pub use call_observer::*;
pub use call_session::*;
