//! Dispatcher - Routes parsed messages to built-in handlers

use std::sync::Arc;

use crate::application::bot::Bot;
use crate::application::errors::BotError;
use crate::domain::entities::Message;

use super::handlers;

/// Closed set of commands the bot reacts to itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Challstr,
    SessionStart,
    UpdateUser,
    Init,
    Deinit,
    Join,
    Leave,
    Rename,
    Users,
    Popup,
    Chat,
    Private,
}

impl Builtin {
    /// Look up a lower-cased command token
    pub fn from_command(command: &str) -> Option<Self> {
        let builtin = match command {
            "challstr" => Self::Challstr,
            ":" => Self::SessionStart,
            "updateuser" => Self::UpdateUser,
            "init" => Self::Init,
            "deinit" => Self::Deinit,
            "j" | "join" => Self::Join,
            "l" | "leave" => Self::Leave,
            "n" | "name" => Self::Rename,
            "users" => Self::Users,
            "popup" => Self::Popup,
            "c:" => Self::Chat,
            "pm" => Self::Private,
            _ => return None,
        };
        Some(builtin)
    }

    async fn run(self, bot: &Bot, msg: &Arc<Message>) -> Result<(), BotError> {
        match self {
            Self::Challstr => handlers::on_challstr(bot, msg).await,
            Self::SessionStart => handlers::on_session_start(bot, msg).await,
            Self::UpdateUser => handlers::on_updateuser(bot, msg).await,
            Self::Init => handlers::on_init(bot, msg).await,
            Self::Deinit => handlers::on_deinit(bot, msg).await,
            Self::Join => handlers::on_join(bot, msg).await,
            Self::Leave => handlers::on_leave(bot, msg).await,
            Self::Rename => handlers::on_rename(bot, msg).await,
            Self::Users => handlers::on_users(bot, msg).await,
            Self::Popup => handlers::on_popup(bot, msg).await,
            Self::Chat => handlers::on_chat(bot, msg).await,
            Self::Private => handlers::on_private(bot, msg).await,
        }
    }
}

pub struct Dispatcher;

impl Dispatcher {
    /// Run the built-in handler for the message's command, if any.
    /// Commands without a handler are ignored.
    pub async fn dispatch(bot: &Bot, message: Arc<Message>) -> Result<(), BotError> {
        match Builtin::from_command(&message.command) {
            Some(builtin) => {
                tracing::trace!("Dispatching {:?}", builtin);
                builtin.run(bot, &message).await
            }
            None => Ok(()),
        }
    }
}
