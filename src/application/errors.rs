//! Application layer errors

use thiserror::Error;

/// General bot errors
#[derive(Error, Debug)]
pub enum BotError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Plugin error: {0}")]
    Plugin(#[from] PluginError),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Websocket transport errors. Always fatal to the session.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Failed to connect to {url}: {reason}")]
    Connect { url: String, reason: String },

    #[error("Unexpected {0} frame from the websocket")]
    UnexpectedFrame(&'static str),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Outbound queue closed")]
    Closed,
}

/// Protocol line parse errors. The offending line is dropped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid timestamp '{value}' in '{command}' line")]
    InvalidTimestamp { command: String, value: String },

    #[error("Missing segment {index} in '{command}' line")]
    MissingSegment { command: String, index: usize },
}

/// Plugin registration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PluginError {
    #[error("Plugin '{0}' already registered")]
    NameConflict(String),

    #[error("Handler of plugin '{0}' is already registered under another name")]
    DuplicateInstance(String),

    #[error("Invalid pattern for plugin '{name}': {reason}")]
    InvalidPattern { name: String, reason: String },

    #[error("Plugin '{0}' has no event handler")]
    MissingHandler(String),

    #[error("Timed plugin '{0}' needs a non-zero period")]
    InvalidPeriod(String),

    #[error("Plugin '{0}' not found")]
    NotFound(String),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Parse error: {0}")]
    Parse(String),
}
