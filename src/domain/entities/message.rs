use super::User;
use chrono::{DateTime, Utc};

/// Where a reply to a message should go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A room by name. The empty name is the global room.
    Room(String),
    /// A user by display name, replied to through private messages
    User(String),
}

impl Target {
    pub fn is_user(&self) -> bool {
        matches!(self, Target::User(_))
    }

    pub fn name(&self) -> &str {
        match self {
            Target::Room(name) | Target::User(name) => name,
        }
    }
}

/// One parsed protocol line. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct Message {
    /// Lower-cased command token, `none` for lines without one
    pub command: String,
    /// Every `|`-separated segment after the command token
    pub params: Vec<String>,
    /// Server timestamp, present only for timestamped commands
    pub timestamp: Option<i64>,
    /// Name of the originating room, `None` for global lines
    pub room: Option<String>,
    /// The acting user for actor-bearing commands
    pub user: Option<User>,
    /// Auth-level code of the acting user
    pub auth: Option<char>,
    pub target: Target,
    /// Extracted chat/pm text
    pub body: String,
    /// Local receive time
    pub received_at: DateTime<Utc>,
}

impl Message {
    /// Command used for lines that carry no `|command|` token
    pub const NONE: &'static str = "none";

    pub fn room_name(&self) -> &str {
        self.room.as_deref().unwrap_or("")
    }

    pub fn user_name(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.name.as_str())
    }

    /// Parameter at `index`, if the line had that many segments
    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }
}
