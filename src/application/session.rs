//! Session handle shared with plugin handlers
//!
//! Bundles everything a handler may touch: the rate-limited outbound queue,
//! the room/user registry and the named lock table.

use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::mpsc;

use crate::application::errors::{BotError, TransportError};
use crate::application::state::StateRegistry;
use crate::application::sync::NamedLocks;
use crate::domain::entities::{Message, Target};

/// Producer side of the bounded outbound queue
#[derive(Clone, Debug)]
pub struct Outbound {
    tx: mpsc::Sender<String>,
}

impl Outbound {
    /// Create the queue. The receiver belongs to the connection's
    /// outbound loop.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Append a raw protocol string. Waits while the queue is full.
    pub async fn queue(&self, msg: impl Into<String>) -> Result<(), BotError> {
        self.tx
            .send(msg.into())
            .await
            .map_err(|_| TransportError::Closed.into())
    }
}

#[derive(Clone)]
pub struct Session {
    outbound: Outbound,
    state: Arc<StateRegistry>,
    nick: Arc<RwLock<String>>,
}

impl Session {
    pub fn new(outbound: Outbound, state: Arc<StateRegistry>, nick: impl Into<String>) -> Self {
        Self {
            outbound,
            state,
            nick: Arc::new(RwLock::new(nick.into())),
        }
    }

    pub fn state(&self) -> &Arc<StateRegistry> {
        &self.state
    }

    pub fn locks(&self) -> &Arc<NamedLocks> {
        self.state.locks()
    }

    /// The nick the server currently knows us by
    pub fn nick(&self) -> String {
        self.nick.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn set_nick(&self, nick: impl Into<String>) {
        *self.nick.write().unwrap_or_else(PoisonError::into_inner) = nick.into();
    }

    /// Queue a raw protocol string (`ROOM|TEXT` or `|/COMMAND`).
    pub async fn queue_message(&self, msg: impl Into<String>) -> Result<(), BotError> {
        self.outbound.queue(msg).await
    }

    pub async fn send_to_room(&self, room: &str, text: &str) -> Result<(), BotError> {
        self.queue_message(format!("{}|{}", room, text)).await
    }

    pub async fn send_private(&self, user: &str, text: &str) -> Result<(), BotError> {
        self.queue_message(format!("|/pm {}, {}", user, text)).await
    }

    /// Reply to the message's target, addressing its author by name in rooms.
    pub async fn reply(&self, message: &Message, text: &str) -> Result<(), BotError> {
        match (&message.target, message.user_name()) {
            (Target::Room(room), Some(user)) => {
                self.send_to_room(room, &format!("({}) {}", user, text)).await
            }
            _ => self.raw_reply(message, text).await,
        }
    }

    /// Reply to the message's target without naming the author.
    pub async fn raw_reply(&self, message: &Message, text: &str) -> Result<(), BotError> {
        match &message.target {
            Target::Room(room) => self.send_to_room(room, text).await,
            Target::User(user) => self.send_private(user, text).await,
        }
    }

    pub async fn join_room(&self, room: &str) -> Result<(), BotError> {
        self.queue_message(format!("|/join {}", room)).await
    }

    pub async fn leave_room(&self, room: &str) -> Result<(), BotError> {
        self.queue_message(format!("{}|/leave", room)).await
    }

    /// Run `f` under the named lock, serializing it against every other
    /// caller using the same name.
    ///
    /// Locks are not re-entrant. `f` must not call `synchronize` with the
    /// same name again, and must not touch the state registry while holding
    /// the registry's own `user` or `room` lock name, or it deadlocks.
    pub fn synchronize<R>(&self, name: &str, f: impl FnOnce() -> R) -> R {
        self.locks().with_lock(name, f)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").field("nick", &self.nick()).finish()
    }
}
