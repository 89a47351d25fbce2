//! Persistent store: user directory, message log, and current session.
//!
//! Three namespaces on a [`KvBackend`], each holding one whole JSON document. Every write
//! re-serializes the full structure (no deltas) and nothing is transactional across
//! namespaces; contacts are derived on read so a partially applied update never leaves
//! stale derived state behind.

mod kv;

pub use kv::{FileKv, KvBackend, MemoryKv};

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::conversation;
use crate::model::{Contact, Message, User};

/// Namespace for the user directory (object keyed by email).
pub const USERS_KEY: &str = "nexus_users";
/// Namespace for the append-only message log (array).
pub const MESSAGES_KEY: &str = "nexus_messages";
/// Namespace for the logged-in user (object, absent when logged out).
pub const CURRENT_USER_KEY: &str = "nexus_current_user";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage io error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed record under '{key}': {source}")]
    Deserialization {
        key: String,
        source: serde_json::Error,
    },
    #[error("serializing record for '{key}': {source}")]
    Serialization {
        key: String,
        source: serde_json::Error,
    },
    #[error("invalid record under '{key}': {reason}")]
    Invalid { key: String, reason: String },
    #[error("storage lock poisoned")]
    Poisoned,
}

impl StoreError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Typed access to the three namespaces.
pub struct Store {
    kv: Box<dyn KvBackend>,
}

impl Store {
    pub fn new(kv: impl KvBackend + 'static) -> Self {
        Self { kv: Box::new(kv) }
    }

    /// File-backed store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        Ok(Self::new(FileKv::open(dir)?))
    }

    /// Store that forgets everything when dropped.
    pub fn in_memory() -> Self {
        Self::new(MemoryKv::new())
    }

    fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.kv.get(key)? {
            None => Ok(None),
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|source| StoreError::Deserialization {
                    key: key.to_string(),
                    source,
                }),
        }
    }

    fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let s = serde_json::to_string(value).map_err(|source| StoreError::Serialization {
            key: key.to_string(),
            source,
        })?;
        self.kv.set(key, &s)
    }

    /// All known users in directory order. A store with no directory yet holds only the
    /// assistant; a persisted directory missing the assistant gets it back at the front.
    pub fn users(&self) -> Result<Vec<User>, StoreError> {
        let Some(map) = self.read::<serde_json::Map<String, serde_json::Value>>(USERS_KEY)? else {
            return Ok(vec![User::assistant()]);
        };
        let mut users = Vec::with_capacity(map.len() + 1);
        for (email, value) in map {
            let user: User =
                serde_json::from_value(value).map_err(|source| StoreError::Deserialization {
                    key: USERS_KEY.to_string(),
                    source,
                })?;
            if user.email != email {
                return Err(StoreError::Invalid {
                    key: USERS_KEY.to_string(),
                    reason: format!("entry '{}' holds user '{}'", email, user.email),
                });
            }
            users.push(user);
        }
        if !users.iter().any(User::is_assistant) {
            log::debug!("store: assistant missing from user directory, reseeding");
            users.insert(0, User::assistant());
        }
        Ok(users)
    }

    fn write_users(&self, users: &[User]) -> Result<(), StoreError> {
        let mut map = serde_json::Map::with_capacity(users.len());
        for u in users {
            let value = serde_json::to_value(u).map_err(|source| StoreError::Serialization {
                key: USERS_KEY.to_string(),
                source,
            })?;
            map.insert(u.email.clone(), value);
        }
        self.write(USERS_KEY, &map)
    }

    pub fn user(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users()?.into_iter().find(|u| u.email == email))
    }

    /// Insert or overwrite by email; an existing entry keeps its position in the directory.
    pub fn save_user(&self, user: &User) -> Result<(), StoreError> {
        let mut users = self.users()?;
        match users.iter_mut().find(|u| u.email == user.email) {
            Some(existing) => *existing = user.clone(),
            None => users.push(user.clone()),
        }
        self.write_users(&users)
    }

    /// The full message log in append order.
    pub fn messages(&self) -> Result<Vec<Message>, StoreError> {
        Ok(self.read(MESSAGES_KEY)?.unwrap_or_default())
    }

    /// Append one message. Rejects a message whose id is already in the log.
    pub fn save_message(&self, message: &Message) -> Result<(), StoreError> {
        let mut messages = self.messages()?;
        if messages.iter().any(|m| m.id == message.id) {
            return Err(StoreError::Invalid {
                key: MESSAGES_KEY.to_string(),
                reason: format!("duplicate message id '{}'", message.id),
            });
        }
        messages.push(message.clone());
        self.write(MESSAGES_KEY, &messages)
    }

    pub fn current_user(&self) -> Result<Option<User>, StoreError> {
        self.read(CURRENT_USER_KEY)
    }

    /// `Some` records the session and saves the user into the directory; `None` clears it.
    pub fn set_current_user(&self, user: Option<&User>) -> Result<(), StoreError> {
        match user {
            Some(u) => {
                self.write(CURRENT_USER_KEY, u)?;
                self.save_user(u)
            }
            None => self.kv.remove(CURRENT_USER_KEY),
        }
    }

    /// Messages between `a` and `b` (either direction), oldest first.
    pub fn conversation(&self, a: &str, b: &str) -> Result<Vec<Message>, StoreError> {
        Ok(conversation::conversation(&self.messages()?, a, b))
    }

    /// Contact list for `viewer`, most recent conversation first.
    pub fn contacts_for_user(&self, viewer: &str) -> Result<Vec<Contact>, StoreError> {
        let users = self.users()?;
        let messages = self.messages()?;
        Ok(conversation::contacts_for_user(&users, &messages, viewer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MessageKind, ASSISTANT_EMAIL};

    #[test]
    fn fresh_store_has_only_the_assistant() {
        let store = Store::in_memory();
        let users = store.users().unwrap();
        assert_eq!(users, vec![User::assistant()]);
        assert!(store.messages().unwrap().is_empty());
        assert_eq!(store.current_user().unwrap(), None);
    }

    #[test]
    fn save_user_twice_keeps_one_entry_with_latest_fields() {
        let store = Store::in_memory();
        store.save_user(&User::new("a@x.com", "Alice")).unwrap();
        store.save_user(&User::new("a@x.com", "Alicia")).unwrap();
        let users = store.users().unwrap();
        let alices: Vec<_> = users.iter().filter(|u| u.email == "a@x.com").collect();
        assert_eq!(alices.len(), 1);
        assert_eq!(alices[0].name, "Alicia");
        assert_eq!(users.len(), 2);
    }

    #[test]
    fn save_user_preserves_directory_order() {
        let store = Store::in_memory();
        store.save_user(&User::new("z@x.com", "Zed")).unwrap();
        store.save_user(&User::new("b@x.com", "Bob")).unwrap();
        store.save_user(&User::new("z@x.com", "Zed2")).unwrap();
        let emails: Vec<_> = store.users().unwrap().into_iter().map(|u| u.email).collect();
        assert_eq!(emails, vec![ASSISTANT_EMAIL, "z@x.com", "b@x.com"]);
    }

    #[test]
    fn saved_message_reads_back_unchanged() {
        let store = Store::in_memory();
        let m = Message::new("a@x.com", "b@x.com", "hello", MessageKind::Image);
        store.save_message(&m).unwrap();
        assert_eq!(store.messages().unwrap(), vec![m]);
    }

    #[test]
    fn duplicate_message_id_is_rejected() {
        let store = Store::in_memory();
        let m = Message::new("a@x.com", "b@x.com", "hello", MessageKind::Text);
        store.save_message(&m).unwrap();
        let err = store.save_message(&m).unwrap_err();
        assert!(matches!(err, StoreError::Invalid { .. }));
        assert_eq!(store.messages().unwrap().len(), 1);
    }

    #[test]
    fn session_set_and_clear() {
        let store = Store::in_memory();
        let alice = User::new("a@x.com", "Alice");
        store.set_current_user(Some(&alice)).unwrap();
        assert_eq!(store.current_user().unwrap(), Some(alice.clone()));
        assert_eq!(store.user("a@x.com").unwrap(), Some(alice));
        store.set_current_user(None).unwrap();
        assert_eq!(store.current_user().unwrap(), None);
        assert!(store.user("a@x.com").unwrap().is_some());
    }

    #[test]
    fn malformed_messages_surface_deserialization_error() {
        let kv = MemoryKv::new();
        kv.set(MESSAGES_KEY, "{not json").unwrap();
        let store = Store::new(kv);
        let err = store.messages().unwrap_err();
        assert!(matches!(err, StoreError::Deserialization { ref key, .. } if key == MESSAGES_KEY));
    }

    #[test]
    fn user_entry_with_mismatched_key_is_invalid() {
        let kv = MemoryKv::new();
        kv.set(USERS_KEY, r#"{"a@x.com":{"email":"b@x.com","name":"Bob"}}"#)
            .unwrap();
        let store = Store::new(kv);
        assert!(matches!(store.users().unwrap_err(), StoreError::Invalid { .. }));
    }

    #[test]
    fn persisted_directory_without_assistant_is_reseeded() {
        let kv = MemoryKv::new();
        kv.set(USERS_KEY, r#"{"a@x.com":{"email":"a@x.com","name":"Alice"}}"#)
            .unwrap();
        let store = Store::new(kv);
        let users = store.users().unwrap();
        assert_eq!(users[0], User::assistant());
        assert_eq!(users[1].email, "a@x.com");
    }
}
