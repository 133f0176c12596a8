//! Plugin system
//!
//! Reactive plugins match chat/private messages by prefix, command,
//! argument count and suffix; timed plugins fire on a fixed period.

pub mod builtin;
pub mod manager;
pub mod pattern;
pub mod trait_def;

pub use manager::{PluginDefaults, PluginManager};
pub use pattern::Matcher;
pub use trait_def::{EventHandler, EventKind, Plugin, PluginEvent, TimedEventHandler, TimedPlugin};
