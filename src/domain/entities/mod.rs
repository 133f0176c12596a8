//! Domain entities - Core business objects with no external dependencies

pub mod user;
pub mod room;
pub mod message;

pub use user::{auth, sanitize, User};
pub use room::Room;
pub use message::{Message, Target};
