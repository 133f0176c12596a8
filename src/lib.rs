//! Client runtime for the Pokemon Showdown chat protocol
//!
//! Layers:
//! - `domain`: users, rooms, messages and the authenticator seam
//! - `application`: the bot context, parser, dispatcher, state and sync primitives
//! - `plugins`: reactive and timed plugins
//! - `infrastructure`: config, login client and the websocket connection

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod plugins;

pub use application::errors::{BotError, ConfigError, ParseError, PluginError, TransportError};
pub use application::{Bot, Session};
pub use infrastructure::adapters::{Connection, ConnectionHandle, ConnectionState};
pub use infrastructure::config::Config;
