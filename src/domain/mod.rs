//! Domain layer - Core business logic with no external dependencies
//!
//! This layer contains:
//! - Entities: Core business objects (User, Room, Message)
//! - Traits: Abstractions for infrastructure (Authenticator)

pub mod entities;
pub mod traits;
