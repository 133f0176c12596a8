//! Domain traits - Abstractions for infrastructure implementations

pub mod authenticator;

pub use authenticator::{Authenticator, Challenge};
