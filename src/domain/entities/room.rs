use std::collections::HashSet;
use std::fmt;

use super::user::sanitize;

/// Represents a chat room. Membership is a best-effort cache built from
/// join/leave/users events, not an authoritative list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Room {
    /// Sanitized identifier, the registry key
    pub id: String,
    /// Room name as referenced by the server, used when sending
    pub name: String,
    /// Sanitized ids of the users believed to be present
    pub members: HashSet<String>,
}

impl Room {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: sanitize(&name),
            name,
            members: HashSet::new(),
        }
    }

    /// Adds a member by name. Returns false if already present.
    pub fn add_member(&mut self, user: &str) -> bool {
        self.members.insert(sanitize(user))
    }

    /// Removes a member by name. Returns false if not present.
    pub fn remove_member(&mut self, user: &str) -> bool {
        self.members.remove(&sanitize(user))
    }

    pub fn has_member(&self, user: &str) -> bool {
        self.members.contains(&sanitize(user))
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
