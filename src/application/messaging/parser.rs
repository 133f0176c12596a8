//! Message parser - Parses raw protocol lines into structured messages
//!
//! A frame looks like:
//!
//! ```text
//! >roomid
//! |c:|1467521429|+Mystifi|hello
//! |j| Tympy
//! ```
//!
//! The optional `>roomid` line gives the room context shared by every
//! following line. Each line is `|`-separated with the command token in
//! segment 1.

use std::sync::Arc;

use chrono::Utc;

use crate::application::errors::ParseError;
use crate::application::state::StateRegistry;
use crate::domain::entities::{Message, Target};

/// Split a frame into its room context and protocol lines.
pub fn split_frame(frame: &str) -> (Option<&str>, Vec<&str>) {
    let mut lines: Vec<&str> = frame.split('\n').collect();
    match lines.first() {
        Some(first) if first.starts_with('>') => {
            let room = first[1..].trim_end_matches('\r');
            lines.remove(0);
            (Some(room), lines)
        }
        _ => (None, lines),
    }
}

/// Segment index holding `AUTH+NAME` for actor-bearing commands
fn actor_segment(command: &str) -> Option<usize> {
    match command {
        "c:" => Some(3),
        "c" | "chat" | "j" | "join" | "l" | "leave" | "n" | "name" | "pm" => Some(2),
        _ => None,
    }
}

/// Parses incoming lines into [`Message`]s, registering any room or user
/// they mention.
pub struct MessageParser {
    state: Arc<StateRegistry>,
}

impl MessageParser {
    pub fn new(state: Arc<StateRegistry>) -> Self {
        Self { state }
    }

    /// Parse a single-line frame: an optional `>roomid` line, a newline,
    /// and one protocol line. Blank frames yield `Ok(None)`.
    pub fn parse(&self, frame: &str) -> Result<Option<Message>, ParseError> {
        if frame.trim().is_empty() {
            return Ok(None);
        }
        let (room, lines) = split_frame(frame);
        let line = lines.last().copied().unwrap_or("");
        self.parse_line(room, line)
    }

    /// Parse one protocol line under the given room context.
    pub fn parse_line(
        &self,
        room: Option<&str>,
        line: &str,
    ) -> Result<Option<Message>, ParseError> {
        if room.is_none() && line.trim().is_empty() {
            return Ok(None);
        }

        let room = room.filter(|r| !r.is_empty()).map(|name| {
            self.state.find_or_create_room(name);
            name.to_string()
        });

        let segments: Vec<&str> = line.split('|').collect();

        // The command is always after the first vertical bar.
        let command = if segments.len() < 2 {
            Message::NONE.to_string()
        } else {
            segments[1].to_lowercase()
        };

        let params: Vec<String> = segments.iter().skip(2).map(|s| s.to_string()).collect();

        let timestamp = if command.contains(':') {
            let raw = params.first().ok_or_else(|| ParseError::MissingSegment {
                command: command.clone(),
                index: 2,
            })?;
            let value = raw.trim().parse::<i64>().map_err(|_| ParseError::InvalidTimestamp {
                command: command.clone(),
                value: raw.clone(),
            })?;
            Some(value)
        } else {
            None
        };

        let (auth, user) = match actor_segment(&command) {
            Some(index) => {
                let segment = segments
                    .get(index)
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| ParseError::MissingSegment {
                        command: command.clone(),
                        index,
                    })?;
                let mut chars = segment.chars();
                let auth = chars.next();
                let name = chars.as_str();
                let user = if name.trim().is_empty() {
                    None
                } else {
                    Some(self.state.find_or_create_user(name))
                };
                (auth, user)
            }
            None => (None, None),
        };

        let body = match command.as_str() {
            "c:" | "pm" => segments.get(4..).map(|rest| rest.join("|")).unwrap_or_default(),
            Message::NONE => line.to_string(),
            _ => String::new(),
        };

        let target = match (&command[..], &user) {
            ("pm", Some(user)) => Target::User(user.name.clone()),
            _ => Target::Room(room.clone().unwrap_or_default()),
        };

        Ok(Some(Message {
            command,
            params,
            timestamp,
            room,
            user,
            auth,
            target,
            body,
            received_at: Utc::now(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::sync::NamedLocks;

    fn parser() -> (MessageParser, Arc<StateRegistry>) {
        let state = Arc::new(StateRegistry::new(Arc::new(NamedLocks::new())));
        (MessageParser::new(Arc::clone(&state)), state)
    }

    #[test]
    fn test_parse_chat_message() {
        let (parser, _) = parser();
        let m = parser
            .parse(">testroom\n|c:|100|+Mystifi|ayylmao")
            .unwrap()
            .unwrap();

        assert_eq!(m.command, "c:");
        assert_eq!(m.params, vec!["100", "+Mystifi", "ayylmao"]);
        assert_eq!(m.timestamp, Some(100));
        assert_eq!(m.room.as_deref(), Some("testroom"));
        assert_eq!(m.user_name(), Some("Mystifi"));
        assert_eq!(m.auth, Some('+'));
        assert_eq!(m.body, "ayylmao");
        assert_eq!(m.body, m.params[2]);
        assert_eq!(m.target, Target::Room("testroom".to_string()));
    }

    #[test]
    fn test_chat_body_keeps_vertical_bars() {
        let (parser, _) = parser();
        let m = parser.parse(">lobby\n|c:|5| Bob|a|b||c").unwrap().unwrap();
        assert_eq!(m.body, "a|b||c");
        assert_eq!(m.auth, Some(' '));
        assert_eq!(m.user_name(), Some("Bob"));
    }

    #[test]
    fn test_private_message_targets_sender() {
        let (parser, _) = parser();
        let m = parser.parse("|pm| Alice| MyBot|hi there").unwrap().unwrap();
        assert_eq!(m.room, None);
        assert_eq!(m.target, Target::User("Alice".to_string()));
        assert_eq!(m.body, "hi there");
        assert_eq!(m.timestamp, None);
    }

    #[test]
    fn test_join_registers_user_in_room() {
        let (parser, state) = parser();
        let m = parser.parse(">testroom\n|J|+Tympy").unwrap().unwrap();
        assert_eq!(m.command, "j");
        assert_eq!(m.auth, Some('+'));
        assert!(state.user("tympy").is_some());
        assert!(state.room("testroom").is_some());
    }

    #[test]
    fn test_line_without_command_is_none() {
        let (parser, _) = parser();
        let m = parser.parse(">lobby\nplain text line").unwrap().unwrap();
        assert_eq!(m.command, Message::NONE);
        assert_eq!(m.body, "plain text line");
        assert!(m.params.is_empty());
    }

    #[test]
    fn test_room_with_empty_content() {
        let (parser, _) = parser();
        let m = parser.parse(">testroom\n").unwrap().unwrap();
        assert_eq!(m.command, Message::NONE);
        assert_eq!(m.body, "");
        assert_eq!(m.room.as_deref(), Some("testroom"));
    }

    #[test]
    fn test_blank_frame_yields_nothing() {
        let (parser, _) = parser();
        assert!(parser.parse("").unwrap().is_none());
        assert!(parser.parse("  \n ").unwrap().is_none());
    }

    #[test]
    fn test_bad_timestamp_is_an_error() {
        let (parser, _) = parser();
        let err = parser.parse(">lobby\n|c:|soon|+Bob|hi").unwrap_err();
        assert!(matches!(err, ParseError::InvalidTimestamp { .. }));

        let err = parser.parse("|:|").unwrap_err();
        assert!(matches!(err, ParseError::InvalidTimestamp { .. }));
    }

    #[test]
    fn test_missing_actor_is_an_error() {
        let (parser, _) = parser();
        let err = parser.parse(">lobby\n|j").unwrap_err();
        assert_eq!(
            err,
            ParseError::MissingSegment { command: "j".to_string(), index: 2 }
        );
    }

    #[test]
    fn test_split_frame() {
        let (room, lines) = split_frame(">lobby\n|j|+A\n|l|+B");
        assert_eq!(room, Some("lobby"));
        assert_eq!(lines, vec!["|j|+A", "|l|+B"]);

        let (room, lines) = split_frame("|updateuser| Guest|0|1");
        assert_eq!(room, None);
        assert_eq!(lines.len(), 1);
    }
}
