//! Infrastructure layer - External concerns
//!
//! This layer contains:
//! - Config: Configuration loading
//! - Auth: Login server client
//! - Adapters: The websocket connection

pub mod adapters;
pub mod auth;
pub mod config;
