//! Room and user registry
//!
//! Maps sanitized identifiers to owned records. Every read-modify-write goes
//! through [`NamedLocks`] on the `user`/`room` domains. When both are
//! needed they are taken user first, then room.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::application::sync::{NamedLocks, ROOM_DOMAIN, USER_DOMAIN};
use crate::domain::entities::{sanitize, Room, User};

pub struct StateRegistry {
    locks: Arc<NamedLocks>,
    users: RwLock<HashMap<String, User>>,
    rooms: RwLock<HashMap<String, Room>>,
}

impl StateRegistry {
    pub fn new(locks: Arc<NamedLocks>) -> Self {
        Self {
            locks,
            users: RwLock::new(HashMap::new()),
            rooms: RwLock::new(HashMap::new()),
        }
    }

    pub fn locks(&self) -> &Arc<NamedLocks> {
        &self.locks
    }

    /// Look up a user by any spelling of their name, creating the record on
    /// first sighting. The stored display name keeps the original casing.
    pub fn find_or_create_user(&self, name: &str) -> User {
        self.locks.with_lock(USER_DOMAIN, || self.ensure_user(name))
    }

    /// Look up a room by name, creating it on first reference.
    pub fn find_or_create_room(&self, name: &str) -> Room {
        self.locks.with_lock(ROOM_DOMAIN, || self.ensure_room(name))
    }

    pub fn user(&self, name: &str) -> Option<User> {
        self.users_read().get(&sanitize(name)).cloned()
    }

    pub fn room(&self, name: &str) -> Option<Room> {
        self.rooms_read().get(&sanitize(name)).cloned()
    }

    pub fn user_count(&self) -> usize {
        self.users_read().len()
    }

    pub fn room_count(&self) -> usize {
        self.rooms_read().len()
    }

    /// Record `user` as present in `room` with the given auth-level code.
    pub fn join(&self, room: &str, user: &str, auth: Option<char>) {
        self.locks.with_lock(USER_DOMAIN, || {
            self.ensure_user(user);
            if let Some(auth) = auth {
                self.update_user(user, |u| u.set_auth(room, auth));
            }
        });
        self.locks.with_lock(ROOM_DOMAIN, || {
            self.ensure_room(room);
            self.update_room(room, |r| {
                r.add_member(user);
            });
        });
    }

    /// Drop `user` from the membership cache of `room`. The user record
    /// itself is kept.
    pub fn leave(&self, room: &str, user: &str) {
        self.locks.with_lock(ROOM_DOMAIN, || {
            self.update_room(room, |r| {
                r.remove_member(user);
            });
        });
    }

    /// Set a user's auth-level code in a room.
    pub fn set_auth(&self, user: &str, room: &str, auth: char) {
        self.locks.with_lock(USER_DOMAIN, || {
            self.ensure_user(user);
            self.update_user(user, |u| u.set_auth(room, auth));
        });
    }

    /// Apply a rename seen in `room`.
    ///
    /// If both names sanitize to the same id only the display name changes.
    /// Otherwise the old id leaves the room, the new id joins it, and the
    /// new user record receives `auth` for that room. An empty `room`
    /// renames the user record only.
    pub fn rename(&self, old: &str, new: &str, room: &str, auth: Option<char>) {
        let old_id = sanitize(old);
        let new_id = sanitize(new);

        self.locks.with_lock(USER_DOMAIN, || {
            if old_id == new_id {
                self.ensure_user(new);
                self.update_user(new, |u| u.name = new.to_string());
                return;
            }

            let room = room.trim();
            if !room.is_empty() {
                self.locks.with_lock(ROOM_DOMAIN, || {
                    self.ensure_room(room);
                    self.update_room(room, |r| {
                        r.members.remove(&old_id);
                        r.members.insert(new_id.clone());
                    });
                });
            }

            self.ensure_user(new);
            self.update_user(new, |u| {
                u.name = new.to_string();
                if let Some(auth) = auth.filter(|_| !room.is_empty()) {
                    u.set_auth(room, auth);
                }
            });
        });
    }

    /// Replace a room's membership from a server user list of
    /// `(auth, name)` pairs.
    pub fn populate(&self, room: &str, entries: &[(char, String)]) {
        self.locks.with_lock(USER_DOMAIN, || {
            for (auth, name) in entries {
                self.ensure_user(name);
                self.update_user(name, |u| u.set_auth(room, *auth));
            }
        });
        self.locks.with_lock(ROOM_DOMAIN, || {
            self.ensure_room(room);
            self.update_room(room, |r| {
                r.members = entries.iter().map(|(_, name)| sanitize(name)).collect();
            });
        });
    }

    /// Forget every member of a room, e.g. after leaving it.
    pub fn clear_room(&self, room: &str) {
        self.locks.with_lock(ROOM_DOMAIN, || {
            self.update_room(room, |r| r.members.clear());
        });
    }

    // Helpers below assume the caller holds the matching domain lock.

    fn ensure_user(&self, name: &str) -> User {
        let mut users = self.users.write().unwrap_or_else(PoisonError::into_inner);
        users
            .entry(sanitize(name))
            .or_insert_with(|| {
                tracing::debug!("New user: {}", name);
                User::new(name)
            })
            .clone()
    }

    fn ensure_room(&self, name: &str) -> Room {
        let mut rooms = self.rooms.write().unwrap_or_else(PoisonError::into_inner);
        rooms
            .entry(sanitize(name))
            .or_insert_with(|| {
                tracing::debug!("New room: {}", name);
                Room::new(name)
            })
            .clone()
    }

    fn update_user(&self, name: &str, f: impl FnOnce(&mut User)) {
        let mut users = self.users.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(user) = users.get_mut(&sanitize(name)) {
            f(user);
        }
    }

    fn update_room(&self, name: &str, f: impl FnOnce(&mut Room)) {
        let mut rooms = self.rooms.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(room) = rooms.get_mut(&sanitize(name)) {
            f(room);
        }
    }

    fn users_read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, User>> {
        self.users.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn rooms_read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Room>> {
        self.rooms.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for StateRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateRegistry")
            .field("users", &self.user_count())
            .field("rooms", &self.room_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> StateRegistry {
        StateRegistry::new(Arc::new(NamedLocks::new()))
    }

    #[test]
    fn test_same_sanitized_name_is_same_user() {
        let state = registry();
        let a = state.find_or_create_user("Mystifi");
        let b = state.find_or_create_user("my stifi!");
        assert_eq!(a, b);
        assert_eq!(b.name, "Mystifi");
        assert_eq!(state.user_count(), 1);
    }

    #[test]
    fn test_rename_to_other_identity() {
        let state = registry();
        state.find_or_create_user("tympy");
        state.join("test", "tympy", None);
        state.rename("tympy", "tympani", "test", None);

        assert!(state.user("tympani").is_some());
        let room = state.room("test").unwrap();
        assert_eq!(room.member_count(), 1);
        assert!(room.has_member("tympani"));

        state.join("test", "randomuser1", None);
        state.join("test", "randomuser2", None);
        state.rename("tympani", "tympy", "test", Some('+'));

        let room = state.room("test").unwrap();
        assert_eq!(room.member_count(), 3);
        assert!(room.has_member("tympy"));
        assert!(!room.has_member("tympani"));
        assert_eq!(state.user("tympy").unwrap().auth_in("test"), Some('+'));
    }

    #[test]
    fn test_rename_same_identity_updates_display_name_only() {
        let state = registry();
        state.join("test", "tympy", Some('+'));
        state.join("test", "other", None);

        let renamed = "T\\%\\%\\%ympy";
        state.rename("tympy", renamed, "test", Some('@'));

        let user = state.find_or_create_user("tympy");
        assert_eq!(user.name, renamed);
        assert_eq!(user.auth_in("test"), Some('+'));
        assert_eq!(state.room("test").unwrap().member_count(), 2);
    }

    #[test]
    fn test_rename_without_room_touches_no_room() {
        let state = registry();
        state.rename("alice", "Bob", "", Some('+'));

        assert_eq!(state.room_count(), 0);
        assert!(state.room("").is_none());
        let bob = state.user("bob").unwrap();
        assert_eq!(bob.name, "Bob");
        assert!(bob.auths.is_empty());
    }

    #[test]
    fn test_concurrent_find_or_create_yields_one_record() {
        let state = Arc::new(registry());
        let spellings = ["Mystifi", "mystifi", "MYSTIFI", "My Stifi", "my-stifi!", "mYsTiFi"];

        let handles: Vec<_> = (0..24)
            .map(|i| {
                let state = Arc::clone(&state);
                let name = spellings[i % spellings.len()];
                std::thread::spawn(move || state.find_or_create_user(name))
            })
            .collect();
        let users: Vec<User> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(state.user_count(), 1);
        assert!(users.iter().all(|u| u.id == "mystifi"));
        // Whoever created the record fixed its display name for everyone
        assert!(users.iter().all(|u| u.name == users[0].name));
    }

    #[test]
    fn test_leave_keeps_user_record() {
        let state = registry();
        state.join("lobby", "Zarel", Some('~'));
        state.leave("lobby", "zarel");
        assert_eq!(state.room("lobby").unwrap().member_count(), 0);
        assert_eq!(state.user("zarel").unwrap().auth_in("lobby"), Some('~'));
    }

    #[test]
    fn test_populate_replaces_membership() {
        let state = registry();
        state.join("lobby", "ghost", None);
        state.populate(
            "lobby",
            &[('@', "Alice".to_string()), (' ', "Bob".to_string())],
        );
        let room = state.room("lobby").unwrap();
        assert_eq!(room.member_count(), 2);
        assert!(!room.has_member("ghost"));
        assert_eq!(state.user("alice").unwrap().auth_in("lobby"), Some('@'));
    }
}
