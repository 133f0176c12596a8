//! Message handling - frame parsing and built-in command dispatch

pub mod dispatcher;
pub mod handlers;
pub mod parser;

pub use dispatcher::{Builtin, Dispatcher};
pub use parser::{split_frame, MessageParser};
