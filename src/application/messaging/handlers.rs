//! Built-in protocol handlers
//!
//! Every handler runs on the inbound task, so none of them may block. Work
//! that waits on the network (login) is spawned.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use regex_lite::Regex;
use tracing::{debug, error, info, warn};

use crate::application::bot::Bot;
use crate::application::errors::{BotError, ParseError};
use crate::domain::entities::Message;
use crate::domain::traits::Challenge;

/// Required parameter, or a loud failure naming the missing segment
fn required<'a>(msg: &'a Message, index: usize) -> Result<&'a str, ParseError> {
    msg.param(index).ok_or_else(|| ParseError::MissingSegment {
        command: msg.command.clone(),
        // params start after `|command|`
        index: index + 2,
    })
}

/// Strip the rank symbol and the `@!` status suffix from a displayed name.
pub fn display_name(raw: &str) -> &str {
    let raw = raw.trim();
    let raw = match raw.chars().next() {
        Some(c) if !c.is_ascii_alphanumeric() => &raw[c.len_utf8()..],
        _ => raw,
    };
    raw.split('@').next().unwrap_or(raw).trim()
}

/// Parse a `users` list: `COUNT,@Alice,+Bob@!`. The first element is the
/// member count and is skipped.
pub fn parse_user_list(list: &str) -> Vec<(char, String)> {
    list.split(',')
        .skip(1)
        .filter_map(|entry| {
            let mut chars = entry.chars();
            let rank = chars.next()?;
            let name = chars.as_str().split('@').next().unwrap_or("").trim();
            if name.is_empty() {
                None
            } else {
                Some((rank, name.to_string()))
            }
        })
        .collect()
}

/// Pause before trying to rejoin a room we were banned from. The server does
/// not announce unbans, and a short ban is often only a kick.
const BAN_REJOIN_DELAY: Duration = Duration::from_secs(1);

fn ban_pattern() -> Option<&'static Regex> {
    static BAN: OnceLock<Option<Regex>> = OnceLock::new();
    BAN.get_or_init(|| Regex::new(r"([^ >]+) has banned you from the room ([^ .<]*)").ok())
        .as_ref()
}

/// `(banning user, room)` from a popup announcing a room ban
pub fn parse_ban_notice(text: &str) -> Option<(String, String)> {
    let caps = ban_pattern()?.captures(text)?;
    Some((caps.get(1)?.as_str().to_string(), caps.get(2)?.as_str().to_string()))
}

pub async fn on_challstr(bot: &Bot, msg: &Arc<Message>) -> Result<(), BotError> {
    let challenge = Challenge::new(required(msg, 0)?, required(msg, 1)?);
    info!("Attempting to log in as {}", bot.config().bot.nick);

    let authenticator = Arc::clone(bot.authenticator());
    let session = bot.session().clone();
    tokio::spawn(async move {
        match authenticator.login(&challenge).await {
            Ok(command) => {
                if let Err(e) = session.queue_message(command).await {
                    error!("Failed to queue login command: {}", e);
                }
            }
            Err(e) => error!("Login failed: {}", e),
        }
    });
    Ok(())
}

pub async fn on_session_start(bot: &Bot, msg: &Arc<Message>) -> Result<(), BotError> {
    let timestamp = msg.timestamp.ok_or_else(|| ParseError::MissingSegment {
        command: msg.command.clone(),
        index: 2,
    })?;
    bot.set_login_time(timestamp);
    Ok(())
}

pub async fn on_updateuser(bot: &Bot, msg: &Arc<Message>) -> Result<(), BotError> {
    let name = display_name(required(msg, 0)?).to_string();
    let named = required(msg, 1)?;
    bot.session().set_nick(name.as_str());

    if named != "1" {
        debug!("Connected as unnamed user {}", name);
        return Ok(());
    }

    info!("Logged in as {}", name);
    let session = bot.session();
    if let Some(avatar) = bot.config().bot.avatar {
        session.queue_message(format!("|/avatar {}", avatar)).await?;
    }
    for room in &bot.config().bot.rooms {
        session.join_room(room).await?;
    }
    bot.start_timed_plugins();
    Ok(())
}

/// Leave a room we were put in without asking for it, then re-request every
/// configured room. Re-joining a room we are already in is a no-op.
async fn redirect_if_unconfigured(bot: &Bot, room: &str) -> Result<(), BotError> {
    if bot.config().is_configured_room(room) {
        return Ok(());
    }
    warn!("Joined unconfigured room {}, leaving", room);
    let session = bot.session();
    session.leave_room(room).await?;
    for configured in &bot.config().bot.rooms {
        session.join_room(configured).await?;
    }
    Ok(())
}

pub async fn on_init(bot: &Bot, msg: &Arc<Message>) -> Result<(), BotError> {
    let Some(room) = msg.room.as_deref() else {
        return Ok(());
    };
    if msg.param(0) == Some("battle") {
        return Ok(());
    }
    bot.state().join(room, &bot.session().nick(), None);
    redirect_if_unconfigured(bot, room).await
}

pub async fn on_deinit(bot: &Bot, msg: &Arc<Message>) -> Result<(), BotError> {
    if let Some(room) = msg.room.as_deref() {
        debug!("Left room {}", room);
        bot.state().clear_room(room);
    }
    Ok(())
}

pub async fn on_join(bot: &Bot, msg: &Arc<Message>) -> Result<(), BotError> {
    let (Some(room), Some(user)) = (msg.room.as_deref(), msg.user.as_ref()) else {
        return Ok(());
    };
    let name = display_name(&user.name);
    bot.state().join(room, name, msg.auth);
    if bot.is_self(name) {
        redirect_if_unconfigured(bot, room).await?;
    }
    Ok(())
}

pub async fn on_leave(bot: &Bot, msg: &Arc<Message>) -> Result<(), BotError> {
    if let (Some(room), Some(user)) = (msg.room.as_deref(), msg.user.as_ref()) {
        bot.state().leave(room, display_name(&user.name));
    }
    Ok(())
}

pub async fn on_rename(bot: &Bot, msg: &Arc<Message>) -> Result<(), BotError> {
    let old = required(msg, 1)?;
    let Some(user) = msg.user.as_ref() else {
        return Ok(());
    };
    let new = display_name(&user.name);

    if bot.is_self(old) {
        bot.session().set_nick(new);
        return Ok(());
    }
    // Global renames only touch the user record
    let room = msg.room.as_deref().unwrap_or_default();
    bot.state().rename(old, new, room, msg.auth);
    Ok(())
}

pub async fn on_users(bot: &Bot, msg: &Arc<Message>) -> Result<(), BotError> {
    let list = required(msg, 0)?;
    let Some(room) = msg.room.as_deref() else {
        return Ok(());
    };
    let entries = parse_user_list(list);
    debug!("{} users in {}", entries.len(), room);
    bot.state().populate(room, &entries);
    Ok(())
}

pub async fn on_popup(bot: &Bot, msg: &Arc<Message>) -> Result<(), BotError> {
    let text = msg.params.join("|");
    let Some((user, room)) = parse_ban_notice(&text) else {
        return Ok(());
    };
    warn!("Banned from room {} by {}", room, user);
    if room.is_empty() {
        return Ok(());
    }

    let session = bot.session().clone();
    tokio::spawn(async move {
        tokio::time::sleep(BAN_REJOIN_DELAY).await;
        debug!("Trying to rejoin {}", room);
        if let Err(e) = session.join_room(&room).await {
            error!("Failed to queue rejoin of {}: {}", room, e);
        }
    });
    Ok(())
}

pub async fn on_chat(bot: &Bot, msg: &Arc<Message>) -> Result<(), BotError> {
    let Some(login_time) = bot.login_time() else {
        return Ok(());
    };
    if bot.config().plugins.ignore_chat || msg.body.is_empty() {
        return Ok(());
    }
    if msg.timestamp.map_or(true, |t| t < login_time) {
        return Ok(());
    }
    if msg.user_name().is_some_and(|name| bot.is_self(name)) {
        return Ok(());
    }
    bot.plugins().dispatch_chat(Arc::clone(msg)).await;
    Ok(())
}

pub async fn on_private(bot: &Bot, msg: &Arc<Message>) -> Result<(), BotError> {
    if bot.login_time().is_none() || bot.config().plugins.ignore_private {
        return Ok(());
    }
    if msg.user_name().is_some_and(|name| bot.is_self(name)) {
        return Ok(());
    }
    bot.plugins().dispatch_private(Arc::clone(msg)).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::auth;

    #[test]
    fn test_display_name() {
        assert_eq!(display_name(" MyBot"), "MyBot");
        assert_eq!(display_name("@Mod@!"), "Mod");
        assert_eq!(display_name("Plain"), "Plain");
    }

    #[test]
    fn test_parse_user_list_skips_count() {
        let users = parse_user_list("3,@Alice,+Bob@!, Carol");
        assert_eq!(
            users,
            vec![
                (auth::MODERATOR, "Alice".to_string()),
                (auth::VOICED, "Bob".to_string()),
                (auth::REGULAR, "Carol".to_string()),
            ]
        );
        assert!(parse_user_list("0").is_empty());
    }

    #[test]
    fn test_parse_ban_notice() {
        let text = "<p>Bully has banned you from the room lobby.</p><p>To appeal the ban...</p>";
        assert_eq!(
            parse_ban_notice(text),
            Some(("Bully".to_string(), "lobby".to_string()))
        );
        assert_eq!(parse_ban_notice("You were kicked"), None);
    }
}
