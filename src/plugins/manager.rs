//! Plugin manager - handles plugin lifecycle and execution
//!
//! Every reactive plugin gets its own listen loop fed by a chat and a
//! private channel. A match that passes the cooldown gate runs the handler
//! on a fresh task. Timed plugins get one tick loop each.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::application::errors::{BotError, PluginError};
use crate::application::session::Session;
use crate::application::sync::CancellationToken;
use crate::domain::entities::Message;
use crate::plugins::pattern::Matcher;
use crate::plugins::trait_def::{
    EventHandler, EventKind, Plugin, PluginEvent, TimedEventHandler, TimedPlugin,
};

/// Capacity of each plugin's chat and private channels
const CHANNEL_CAPACITY: usize = 64;

/// Prefix/suffix settings applied to plugins that don't bring their own
#[derive(Debug, Clone)]
pub struct PluginDefaults {
    pub prefixes: Vec<String>,
    pub suffixes: Vec<String>,
    pub case_insensitive: bool,
}

impl Default for PluginDefaults {
    fn default() -> Self {
        Self {
            prefixes: vec!["!".to_string()],
            suffixes: Vec::new(),
            case_insensitive: false,
        }
    }
}

struct Registration {
    name: String,
    handler: Arc<dyn EventHandler>,
    chat_tx: mpsc::Sender<Arc<Message>>,
    private_tx: mpsc::Sender<Arc<Message>>,
    token: CancellationToken,
}

struct TimedRegistration {
    plugin: TimedPlugin,
    token: Option<CancellationToken>,
}

/// Manages all plugins for the bot
pub struct PluginManager {
    defaults: PluginDefaults,
    plugins: Mutex<Vec<Registration>>,
    timed: Mutex<Vec<TimedRegistration>>,
}

fn same_handler(a: &Arc<dyn EventHandler>, b: &Arc<dyn EventHandler>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

/// Whether a message received at `now` may fire a plugin last fired at `last`
pub fn cooldown_elapsed(
    last: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    cooldown: Duration,
) -> bool {
    match last {
        None => true,
        Some(_) if cooldown.is_zero() => true,
        Some(last) => (now - last).to_std().map(|e| e > cooldown).unwrap_or(false),
    }
}

impl PluginManager {
    pub fn new(defaults: PluginDefaults) -> Self {
        Self {
            defaults,
            plugins: Mutex::new(Vec::new()),
            timed: Mutex::new(Vec::new()),
        }
    }

    pub fn defaults(&self) -> &PluginDefaults {
        &self.defaults
    }

    /// Register a plugin and start its listen loop. Must be called from
    /// within a Tokio runtime. Nothing is changed if registration fails.
    pub fn register(&self, plugin: Plugin, session: Session) -> Result<(), PluginError> {
        let handler = plugin
            .handler
            .clone()
            .ok_or_else(|| PluginError::MissingHandler(plugin.name.clone()))?;

        let mut plugins = self.plugins.lock().unwrap_or_else(PoisonError::into_inner);

        if plugins.iter().any(|r| r.name == plugin.name) {
            return Err(PluginError::NameConflict(plugin.name));
        }
        if plugins.iter().any(|r| same_handler(&r.handler, &handler)) {
            return Err(PluginError::DuplicateInstance(plugin.name));
        }

        let prefixes = if plugin.prefixes.is_empty() {
            &self.defaults.prefixes
        } else {
            &plugin.prefixes
        };
        let suffixes = if plugin.suffixes.is_empty() {
            &self.defaults.suffixes
        } else {
            &plugin.suffixes
        };
        let matcher = Matcher::compile(
            prefixes,
            &plugin.command,
            plugin.num_args,
            suffixes,
            self.defaults.case_insensitive,
        )
        .map_err(|e| PluginError::InvalidPattern {
            name: plugin.name.clone(),
            reason: e.to_string(),
        })?;

        let (chat_tx, chat_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (private_tx, private_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let token = CancellationToken::new();

        info!("Registering plugin: {} ({})", plugin.name, matcher.as_str());
        let listener = Listener {
            name: plugin.name.clone(),
            matcher,
            cooldown: plugin.cooldown,
            handler: Arc::clone(&handler),
            session,
            token: token.clone(),
        };
        tokio::spawn(listener.run(chat_rx, private_rx));

        plugins.push(Registration {
            name: plugin.name,
            handler,
            chat_tx,
            private_tx,
            token,
        });
        Ok(())
    }

    /// Stop a plugin's listen loop and forget it.
    pub async fn unregister(&self, name: &str) -> Result<(), PluginError> {
        let registration = {
            let mut plugins = self.plugins.lock().unwrap_or_else(PoisonError::into_inner);
            let index = plugins
                .iter()
                .position(|r| r.name == name)
                .ok_or_else(|| PluginError::NotFound(name.to_string()))?;
            plugins.remove(index)
        };
        registration.token.stop().await;
        info!("Unregistered plugin: {}", name);
        Ok(())
    }

    /// Unregister every reactive plugin.
    pub async fn unregister_all(&self) {
        let drained: Vec<Registration> = {
            let mut plugins = self.plugins.lock().unwrap_or_else(PoisonError::into_inner);
            plugins.drain(..).collect()
        };
        for registration in &drained {
            registration.token.signal_stop();
        }
        for registration in drained {
            registration.token.stopped().await;
            debug!("Unregistered plugin: {}", registration.name);
        }
    }

    /// Names of the registered reactive plugins, in registration order
    pub fn names(&self) -> Vec<String> {
        self.plugins
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|r| r.name.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forward a chat message to every plugin's chat channel.
    pub async fn dispatch_chat(&self, message: Arc<Message>) {
        let senders = self.senders(EventKind::Chat);
        Self::fan_out(senders, message).await;
    }

    /// Forward a private message to every plugin's private channel.
    pub async fn dispatch_private(&self, message: Arc<Message>) {
        let senders = self.senders(EventKind::Private);
        Self::fan_out(senders, message).await;
    }

    fn senders(&self, kind: EventKind) -> Vec<mpsc::Sender<Arc<Message>>> {
        let plugins = self.plugins.lock().unwrap_or_else(PoisonError::into_inner);
        plugins
            .iter()
            .map(|r| match kind {
                EventKind::Chat => r.chat_tx.clone(),
                EventKind::Private => r.private_tx.clone(),
            })
            .collect()
    }

    async fn fan_out(senders: Vec<mpsc::Sender<Arc<Message>>>, message: Arc<Message>) {
        for tx in senders {
            // A closed channel means the plugin is being unregistered.
            let _ = tx.send(Arc::clone(&message)).await;
        }
    }

    /// Register a periodic plugin. It starts ticking on [`start_timed`](Self::start_timed).
    pub fn register_timed(&self, plugin: TimedPlugin) -> Result<(), PluginError> {
        if plugin.period.is_zero() {
            return Err(PluginError::InvalidPeriod(plugin.name));
        }
        let mut timed = self.timed.lock().unwrap_or_else(PoisonError::into_inner);
        if timed.iter().any(|t| t.plugin.name == plugin.name) {
            return Err(PluginError::NameConflict(plugin.name));
        }
        info!("Registering timed plugin: {} every {:?}", plugin.name, plugin.period);
        timed.push(TimedRegistration { plugin, token: None });
        Ok(())
    }

    /// Start every timed plugin that isn't already running.
    pub fn start_timed(&self, session: &Session) {
        let mut timed = self.timed.lock().unwrap_or_else(PoisonError::into_inner);
        for registration in timed.iter_mut().filter(|t| t.token.is_none()) {
            let token = CancellationToken::new();
            tokio::spawn(tick_loop(
                registration.plugin.clone(),
                session.clone(),
                token.clone(),
            ));
            registration.token = Some(token);
        }
    }

    /// Stop every running timed plugin and wait for their loops to exit.
    pub async fn stop_timed(&self) {
        let tokens: Vec<CancellationToken> = {
            let mut timed = self.timed.lock().unwrap_or_else(PoisonError::into_inner);
            timed.iter_mut().filter_map(|t| t.token.take()).collect()
        };
        for token in &tokens {
            token.signal_stop();
        }
        for token in tokens {
            token.stopped().await;
        }
    }

    pub fn timed_names(&self) -> Vec<String> {
        self.timed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|t| t.plugin.name.clone())
            .collect()
    }
}

impl Default for PluginManager {
    fn default() -> Self {
        Self::new(PluginDefaults::default())
    }
}

/// State owned by one plugin's listen loop
struct Listener {
    name: String,
    matcher: Matcher,
    cooldown: Duration,
    handler: Arc<dyn EventHandler>,
    session: Session,
    token: CancellationToken,
}

impl Listener {
    async fn run(
        self,
        mut chat_rx: mpsc::Receiver<Arc<Message>>,
        mut private_rx: mpsc::Receiver<Arc<Message>>,
    ) {
        let mut last_fired: Option<DateTime<Utc>> = None;

        loop {
            let (kind, message) = tokio::select! {
                _ = self.token.stopping() => break,
                Some(m) = chat_rx.recv() => (EventKind::Chat, m),
                Some(m) = private_rx.recv() => (EventKind::Private, m),
                else => break,
            };

            let Some(caps) = self.matcher.captures(&message.body) else {
                continue;
            };

            if !cooldown_elapsed(last_fired, message.received_at, self.cooldown) {
                debug!("[{}] On cooldown, ignoring: {}", self.name, message.body);
                continue;
            }
            last_fired = Some(message.received_at);

            debug!(
                "[{}] Matched on [prefix={}] [args={:?}] [rest={}]",
                self.name, caps.prefix, caps.args, caps.rest
            );
            let event = PluginEvent {
                kind,
                message,
                prefix: caps.prefix,
                args: caps.args,
                rest: caps.rest,
            };

            let handler = Arc::clone(&self.handler);
            let session = self.session.clone();
            let task = tokio::spawn(async move { handler.handle(&session, &event).await });
            supervise(self.name.clone(), task);
        }

        self.token.confirm_stopped();
        debug!("[{}] Listen loop stopped", self.name);
    }
}

async fn tick_loop(plugin: TimedPlugin, session: Session, token: CancellationToken) {
    let start = tokio::time::Instant::now() + plugin.period;
    let mut ticker = tokio::time::interval_at(start, plugin.period);

    loop {
        tokio::select! {
            _ = token.stopping() => break,
            _ = ticker.tick() => {
                let handler: Arc<dyn TimedEventHandler> = Arc::clone(&plugin.handler);
                let session = session.clone();
                let task = tokio::spawn(async move { handler.tick(&session).await });
                supervise(plugin.name.clone(), task);
            }
        }
    }

    token.confirm_stopped();
    debug!("[{}] Timed loop stopped", plugin.name);
}

/// Log the outcome of a handler task. Faults stop here.
fn supervise(name: String, task: JoinHandle<Result<(), BotError>>) {
    tokio::spawn(async move {
        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Plugin '{}' handler failed: {}", name, e),
            Err(e) if e.is_panic() => error!("Plugin '{}' handler panicked: {:?}", name, e),
            Err(e) => warn!("Plugin '{}' handler cancelled: {}", name, e),
        }
    });
}
