//! Small plugins registered by the binary

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::application::errors::BotError;
use crate::application::session::Session;
use crate::plugins::trait_def::{EventHandler, Plugin, PluginEvent, TimedEventHandler, TimedPlugin};

/// Repeats its single argument back
pub struct Echo;

#[async_trait]
impl EventHandler for Echo {
    async fn handle(&self, session: &Session, event: &PluginEvent) -> Result<(), BotError> {
        let text = match event.rest.as_str() {
            "" => event.args.join(", "),
            rest => format!("{}, {}", event.args.join(", "), rest),
        };
        session.reply(&event.message, &text).await
    }
}

pub fn echo_plugin() -> Plugin {
    Plugin::new("echo", "echo").with_args(1).with_handler(Echo)
}

/// Says hi, at most once every five seconds
pub struct Hello;

#[async_trait]
impl EventHandler for Hello {
    async fn handle(&self, session: &Session, event: &PluginEvent) -> Result<(), BotError> {
        session.reply(&event.message, "hi :)").await
    }
}

pub fn hello_plugin() -> Plugin {
    Plugin::new("hello", "hi")
        .with_cooldown(Duration::from_secs(5))
        .with_handler(Hello)
}

/// Private-messages the bot an increasing counter
#[derive(Default)]
pub struct Count {
    count: AtomicU64,
}

#[async_trait]
impl TimedEventHandler for Count {
    async fn tick(&self, session: &Session) -> Result<(), BotError> {
        let n = self.count.fetch_add(1, Ordering::Relaxed);
        session.send_private(&session.nick(), &n.to_string()).await
    }
}

pub fn count_plugin(period: Duration) -> TimedPlugin {
    TimedPlugin::new("count", period, Count::default())
}
