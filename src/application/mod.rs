//! Application layer - session runtime
//!
//! This layer contains:
//! - Bot: the shared context driving one server session
//! - Messaging: frame parsing and built-in handlers
//! - State: the room/user registry
//! - Sync: named locks and cancellation tokens
//! - Errors: error types for every layer

pub mod bot;
pub mod errors;
pub mod messaging;
pub mod session;
pub mod state;
pub mod sync;

pub use bot::Bot;
pub use session::{Outbound, Session};
