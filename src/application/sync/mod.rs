//! Concurrency primitives shared by the connection, registry and plugins

pub mod cancellation;
pub mod named_lock;

pub use cancellation::CancellationToken;
pub use named_lock::NamedLocks;
pub(crate) use named_lock::{ROOM_DOMAIN, USER_DOMAIN};
