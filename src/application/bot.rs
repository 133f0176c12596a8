//! The bot context
//!
//! One `Bot` owns the configuration, the session (outbound queue, registry,
//! locks), the parser and the plugin manager. It is shared as `Arc<Bot>`
//! between the connection loops.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::application::errors::PluginError;
use crate::application::messaging::parser::split_frame;
use crate::application::messaging::{Dispatcher, MessageParser};
use crate::application::session::{Outbound, Session};
use crate::application::state::StateRegistry;
use crate::application::sync::NamedLocks;
use crate::domain::entities::sanitize;
use crate::domain::traits::Authenticator;
use crate::infrastructure::config::Config;
use crate::plugins::{Plugin, PluginManager, TimedPlugin};

pub struct Bot {
    config: Arc<Config>,
    session: Session,
    parser: MessageParser,
    plugins: PluginManager,
    authenticator: Arc<dyn Authenticator>,
    login_time: Mutex<Option<i64>>,
    timed_started: AtomicBool,
}

impl Bot {
    /// Build the bot. The returned receiver is the consumer side of the
    /// outbound queue and belongs to the connection.
    pub fn new(
        config: Config,
        authenticator: Arc<dyn Authenticator>,
    ) -> (Self, mpsc::Receiver<String>) {
        let locks = Arc::new(NamedLocks::new());
        let state = Arc::new(StateRegistry::new(locks));
        let (outbound, outbound_rx) = Outbound::channel(config.bot.queue_capacity);
        let session = Session::new(outbound, Arc::clone(&state), config.bot.nick.clone());
        let plugins = PluginManager::new(config.plugin_defaults());

        let bot = Self {
            config: Arc::new(config),
            session,
            parser: MessageParser::new(state),
            plugins,
            authenticator,
            login_time: Mutex::new(None),
            timed_started: AtomicBool::new(false),
        };
        (bot, outbound_rx)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn state(&self) -> &Arc<StateRegistry> {
        self.session.state()
    }

    pub fn parser(&self) -> &MessageParser {
        &self.parser
    }

    pub fn plugins(&self) -> &PluginManager {
        &self.plugins
    }

    pub fn authenticator(&self) -> &Arc<dyn Authenticator> {
        &self.authenticator
    }

    pub fn register_plugin(&self, plugin: Plugin) -> Result<(), PluginError> {
        self.plugins.register(plugin, self.session.clone())
    }

    pub fn register_timed_plugin(&self, plugin: TimedPlugin) -> Result<(), PluginError> {
        self.plugins.register_timed(plugin)
    }

    /// Start timed plugins; only the first call per bot does anything.
    pub fn start_timed_plugins(&self) {
        if !self.timed_started.swap(true, Ordering::AcqRel) {
            self.plugins.start_timed(&self.session);
        }
    }

    /// Stop timed plugins and unregister every reactive plugin.
    pub async fn shutdown_plugins(&self) {
        self.plugins.stop_timed().await;
        self.plugins.unregister_all().await;
    }

    /// Server timestamp of the session start, once announced
    pub fn login_time(&self) -> Option<i64> {
        *self.login_time.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_login_time(&self, timestamp: i64) {
        *self.login_time.lock().unwrap_or_else(PoisonError::into_inner) = Some(timestamp);
        debug!("LoginTime: {}", timestamp);
    }

    /// Whether `name` refers to the bot itself
    pub fn is_self(&self, name: &str) -> bool {
        sanitize(name) == sanitize(&self.session.nick())
    }

    /// Parse and dispatch every line of one inbound frame, in order.
    /// Bad lines are logged and dropped. A frame holding only a room id
    /// still yields one empty line for that room.
    pub async fn handle_frame(&self, frame: &str) {
        let (room, mut lines) = split_frame(frame);
        lines.retain(|line| !line.trim().is_empty());
        if room.is_some() && lines.is_empty() {
            lines.push("");
        }

        for line in lines {
            match self.parser.parse_line(room, line) {
                Ok(Some(message)) => {
                    if let Err(e) = Dispatcher::dispatch(self, Arc::new(message)).await {
                        error!("Dropping line {:?}: {}", line, e);
                    }
                }
                Ok(None) => {}
                Err(e) => error!("Dropping line {:?}: {}", line, e),
            }
        }
    }
}

impl std::fmt::Debug for Bot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bot")
            .field("nick", &self.session.nick())
            .field("plugins", &self.plugins.names())
            .field("timed_plugins", &self.plugins.timed_names())
            .field("login_time", &self.login_time())
            .finish()
    }
}
