//! Adapters - Transport integrations

pub mod showdown;

pub use showdown::{Connection, ConnectionHandle, ConnectionState};
