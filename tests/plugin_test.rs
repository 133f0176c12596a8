//! Plugin Engine Integration Tests
//! Run with: cargo test --test plugin_test

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::timeout;

use showdown_bot::domain::traits::{Authenticator, Challenge};
use showdown_bot::plugins::builtin::{count_plugin, echo_plugin, hello_plugin};
use showdown_bot::plugins::{EventHandler, Plugin, PluginEvent, TimedPlugin};
use showdown_bot::{Bot, BotError, Config, PluginError, Session};

static INIT: Once = Once::new();

fn ensure_init() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    });
}

struct NoLogin;

#[async_trait]
impl Authenticator for NoLogin {
    async fn login(&self, _challenge: &Challenge) -> Result<String, BotError> {
        Err(BotError::Auth("offline".to_string()))
    }
}

/// Counts invocations; fails every call to exercise fault isolation
struct Flaky {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl EventHandler for Flaky {
    async fn handle(&self, _session: &Session, _event: &PluginEvent) -> Result<(), BotError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(BotError::Internal("boom".to_string()))
    }
}

struct Noop;

#[async_trait]
impl EventHandler for Noop {
    async fn handle(&self, _session: &Session, _event: &PluginEvent) -> Result<(), BotError> {
        Ok(())
    }
}

/// A bot that is already past session start
async fn logged_in_bot(extra_yaml: &str) -> (Bot, mpsc::Receiver<String>) {
    ensure_init();
    let yaml = format!("bot:\n  nick: MyBot\n{}", extra_yaml);
    let config = Config::from_yaml(&yaml).expect("valid config");
    let (bot, rx) = Bot::new(config, Arc::new(NoLogin));
    bot.handle_frame("|:|100").await;
    (bot, rx)
}

async fn next(rx: &mut mpsc::Receiver<String>) -> String {
    timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out waiting for outbound message")
        .expect("queue closed")
}

async fn nothing(rx: &mut mpsc::Receiver<String>) -> bool {
    timeout(Duration::from_millis(200), rx.recv()).await.is_err()
}

#[tokio::test]
async fn test_echo_replies_in_room() {
    let (bot, mut rx) = logged_in_bot("").await;
    bot.register_plugin(echo_plugin()).expect("register echo");

    bot.handle_frame(">lobby\n|c:|101| Alice|!echo hello").await;
    assert_eq!(next(&mut rx).await, "lobby|(Alice) hello");

    // Missing argument: no match
    bot.handle_frame(">lobby\n|c:|102| Alice|!echo").await;
    assert!(nothing(&mut rx).await);

    bot.shutdown_plugins().await;
}

#[tokio::test]
async fn test_echo_replies_privately() {
    let (bot, mut rx) = logged_in_bot("").await;
    bot.register_plugin(echo_plugin()).expect("register echo");

    bot.handle_frame("|pm| Alice| MyBot|!echo hello, world").await;
    assert_eq!(next(&mut rx).await, "|/pm Alice, hello, world");

    bot.shutdown_plugins().await;
}

#[tokio::test]
async fn test_cooldown_suppresses_repeat() {
    let (bot, mut rx) = logged_in_bot("").await;
    bot.register_plugin(hello_plugin()).expect("register hello");

    bot.handle_frame(">lobby\n|c:|101| Alice|!hi").await;
    assert_eq!(next(&mut rx).await, "lobby|(Alice) hi :)");

    bot.handle_frame(">lobby\n|c:|102| Bob|!hi").await;
    assert!(nothing(&mut rx).await);

    bot.shutdown_plugins().await;
}

#[tokio::test]
async fn test_configured_prefixes_and_case() {
    let yaml = "plugins:\n  prefixes: [\".\", \"?\"]\n  case-insensitive: true\n";
    let (bot, mut rx) = logged_in_bot(yaml).await;
    bot.register_plugin(echo_plugin()).expect("register echo");

    bot.handle_frame(">lobby\n|c:|101| Alice|?ECHO loud").await;
    assert_eq!(next(&mut rx).await, "lobby|(Alice) loud");

    bot.handle_frame(">lobby\n|c:|102| Alice|!echo old").await;
    assert!(nothing(&mut rx).await);

    bot.shutdown_plugins().await;
}

#[tokio::test]
async fn test_registration_conflicts_leave_no_trace() {
    let (bot, _rx) = logged_in_bot("").await;
    bot.register_plugin(echo_plugin()).expect("register echo");

    assert_eq!(
        bot.register_plugin(echo_plugin()),
        Err(PluginError::NameConflict("echo".to_string()))
    );

    let shared: Arc<dyn EventHandler> = Arc::new(Noop);
    bot.register_plugin(Plugin::new("a", "a").with_shared_handler(Arc::clone(&shared)))
        .expect("register a");
    assert_eq!(
        bot.register_plugin(Plugin::new("b", "b").with_shared_handler(shared)),
        Err(PluginError::DuplicateInstance("b".to_string()))
    );

    assert_eq!(
        bot.register_plugin(Plugin::new("bare", "bare")),
        Err(PluginError::MissingHandler("bare".to_string()))
    );
    assert_eq!(bot.plugins().names(), vec!["echo", "a"]);

    bot.shutdown_plugins().await;
    assert!(bot.plugins().is_empty());
}

#[tokio::test]
async fn test_unregister_stops_matching() {
    let (bot, mut rx) = logged_in_bot("").await;
    bot.register_plugin(echo_plugin()).expect("register echo");
    bot.plugins().unregister("echo").await.expect("unregister");

    bot.handle_frame(">lobby\n|c:|101| Alice|!echo hello").await;
    assert!(nothing(&mut rx).await);
    assert_eq!(
        bot.plugins().unregister("echo").await,
        Err(PluginError::NotFound("echo".to_string()))
    );
}

#[tokio::test]
async fn test_handler_faults_are_contained() {
    let (bot, _rx) = logged_in_bot("").await;
    let calls = Arc::new(AtomicUsize::new(0));
    let flaky = Flaky {
        calls: Arc::clone(&calls),
    };
    bot.register_plugin(Plugin::new("flaky", "boom").with_handler(flaky))
        .expect("register flaky");

    bot.handle_frame(">lobby\n|c:|101| Alice|!boom").await;
    bot.handle_frame(">lobby\n|c:|102| Alice|!boom").await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(bot.plugins().names(), vec!["flaky"]);

    bot.shutdown_plugins().await;
}

#[tokio::test]
async fn test_timed_plugin_ticks_after_login() {
    let (bot, mut rx) = logged_in_bot("  rooms: []\n").await;
    bot.register_timed_plugin(count_plugin(Duration::from_millis(50)))
        .expect("register count");
    assert_eq!(
        bot.register_timed_plugin(count_plugin(Duration::from_millis(50))),
        Err(PluginError::NameConflict("count".to_string()))
    );
    assert_eq!(bot.plugins().timed_names(), vec!["count"]);

    // Nothing ticks before the login completes
    assert!(nothing(&mut rx).await);

    bot.handle_frame("|updateuser| MyBot|1|1|{}").await;
    assert_eq!(next(&mut rx).await, "|/pm MyBot, 0");
    assert_eq!(next(&mut rx).await, "|/pm MyBot, 1");

    // A second login does not start another tick loop
    bot.handle_frame("|updateuser| MyBot|1|1|{}").await;

    bot.shutdown_plugins().await;
    drain_until_quiet(&mut rx).await;
    assert!(nothing(&mut rx).await);
}

#[tokio::test]
async fn test_zero_period_is_rejected() {
    let (bot, _rx) = logged_in_bot("").await;
    let err = bot.register_timed_plugin(TimedPlugin::new("fast", Duration::ZERO, Tick));
    assert_eq!(err, Err(PluginError::InvalidPeriod("fast".to_string())));
    assert!(bot.plugins().timed_names().is_empty());
}

struct Tick;

#[async_trait]
impl showdown_bot::plugins::TimedEventHandler for Tick {
    async fn tick(&self, _session: &Session) -> Result<(), BotError> {
        Ok(())
    }
}

/// Swallow messages from handler tasks that were already in flight
async fn drain_until_quiet(rx: &mut mpsc::Receiver<String>) {
    while timeout(Duration::from_millis(100), rx.recv()).await.is_ok_and(|m| m.is_some()) {}
}
