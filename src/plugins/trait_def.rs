//! Plugin trait definitions

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::application::errors::BotError;
use crate::application::session::Session;
use crate::domain::entities::Message;

/// Which channel an event arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Chat,
    Private,
}

/// A matched message handed to a plugin handler
#[derive(Debug, Clone)]
pub struct PluginEvent {
    pub kind: EventKind,
    pub message: Arc<Message>,
    /// The prefix literal that matched
    pub prefix: String,
    /// One entry per expected argument
    pub args: Vec<String>,
    /// Whatever followed the expected arguments
    pub rest: String,
}

/// Handler of a reactive plugin. Each matched event runs on its own task,
/// so implementations must be safe for concurrent use; use
/// [`Session::synchronize`] around shared mutable state.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, session: &Session, event: &PluginEvent) -> Result<(), BotError>;
}

/// Handler of a periodic plugin. Every tick spawns a new call whether or
/// not the previous one finished; keep the work bounded.
#[async_trait]
pub trait TimedEventHandler: Send + Sync {
    async fn tick(&self, session: &Session) -> Result<(), BotError>;
}

/// A reactive plugin matched against chat and private messages
#[derive(Clone)]
pub struct Plugin {
    pub name: String,
    pub command: String,
    pub num_args: usize,
    pub cooldown: Duration,
    /// Empty means "use the configured prefixes"
    pub prefixes: Vec<String>,
    /// Empty means "use the configured suffixes"
    pub suffixes: Vec<String>,
    pub handler: Option<Arc<dyn EventHandler>>,
}

impl Plugin {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            num_args: 0,
            cooldown: Duration::ZERO,
            prefixes: Vec::new(),
            suffixes: Vec::new(),
            handler: None,
        }
    }

    pub fn with_args(mut self, num_args: usize) -> Self {
        self.num_args = num_args;
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn with_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_suffixes<I, S>(mut self, suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.suffixes = suffixes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_handler<H: EventHandler + 'static>(mut self, handler: H) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Share one handler instance; registering it twice is rejected.
    pub fn with_shared_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.handler = Some(handler);
        self
    }
}

impl std::fmt::Debug for Plugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Plugin")
            .field("name", &self.name)
            .field("command", &self.command)
            .field("num_args", &self.num_args)
            .field("cooldown", &self.cooldown)
            .finish()
    }
}

/// A periodic plugin
#[derive(Clone)]
pub struct TimedPlugin {
    pub name: String,
    pub period: Duration,
    pub handler: Arc<dyn TimedEventHandler>,
}

impl TimedPlugin {
    pub fn new<H: TimedEventHandler + 'static>(
        name: impl Into<String>,
        period: Duration,
        handler: H,
    ) -> Self {
        Self {
            name: name.into(),
            period,
            handler: Arc::new(handler),
        }
    }
}

impl std::fmt::Debug for TimedPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimedPlugin")
            .field("name", &self.name)
            .field("period", &self.period)
            .finish()
    }
}
