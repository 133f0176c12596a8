//! Shared room/user state

pub mod registry;

pub use registry::StateRegistry;
