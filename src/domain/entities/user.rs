use std::collections::HashMap;
use std::fmt;

/// Returns the canonical lookup key for a user or room name: lower-cased
/// with every non-alphanumeric character removed.
///
/// Showdown names are not case sensitive, so two names with the same
/// sanitized form refer to the same account.
pub fn sanitize(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Auth-level codes as sent by the server in front of a username
pub mod auth {
    pub const REGULAR: char = ' ';
    pub const VOICED: char = '+';
    pub const DRIVER: char = '%';
    pub const MODERATOR: char = '@';
    pub const BOT: char = '*';
    pub const ROOM_OWNER: char = '#';
    pub const ADMINISTRATOR: char = '&';
    pub const LEADER: char = '~';
    pub const LOCKED: char = '!';
    pub const MUTED: char = '\u{203d}';
}

/// Represents a user seen on the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Sanitized identifier, the registry key
    pub id: String,
    /// Display name as last seen, original casing preserved
    pub name: String,
    /// Sanitized room id -> auth-level code in that room
    pub auths: HashMap<String, char>,
}

impl User {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: sanitize(&name),
            name,
            auths: HashMap::new(),
        }
    }

    pub fn with_auth(mut self, room: &str, auth: char) -> Self {
        self.set_auth(room, auth);
        self
    }

    pub fn set_auth(&mut self, room: &str, auth: char) {
        self.auths.insert(sanitize(room), auth);
    }

    /// Auth-level code in the given room, if known
    pub fn auth_in(&self, room: &str) -> Option<char> {
        self.auths.get(&sanitize(room)).copied()
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
