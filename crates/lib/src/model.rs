//! Records shared by the store, the derivation engine, and the controller.
//!
//! `User` and `Message` are persisted; `Contact` is derived per viewer and never stored.

use serde::{Deserialize, Serialize};

/// Reserved email of the AI correspondent. Always present in the user directory.
pub const ASSISTANT_EMAIL: &str = "gemini@ai.bot";

/// Display name of the AI correspondent.
pub const ASSISTANT_NAME: &str = "Gemini AI Assistant";

/// Avatar reference seeded with the assistant identity.
pub const ASSISTANT_AVATAR: &str = "https://picsum.photos/id/20/200/200";

/// Appended to the display name of the contact that is the viewer themself.
pub const SELF_SUFFIX: &str = " (self)";

/// Avatar reference derived from an email (stable per user).
pub fn default_avatar(email: &str) -> String {
    format!("https://picsum.photos/seed/{}/200/200", email)
}

/// A known user, keyed by email in the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub email: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl User {
    pub fn new(email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: name.into(),
            avatar: None,
        }
    }

    /// New user with the generated avatar the login form assigns.
    pub fn with_default_avatar(email: impl Into<String>, name: impl Into<String>) -> Self {
        let email = email.into();
        let avatar = default_avatar(&email);
        Self {
            email,
            name: name.into(),
            avatar: Some(avatar),
        }
    }

    /// The reserved assistant identity.
    pub fn assistant() -> Self {
        Self {
            email: ASSISTANT_EMAIL.to_string(),
            name: ASSISTANT_NAME.to_string(),
            avatar: Some(ASSISTANT_AVATAR.to_string()),
        }
    }

    pub fn is_assistant(&self) -> bool {
        self.email == ASSISTANT_EMAIL
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    /// `content` holds an image reference (URL or data URI).
    Image,
}

/// One message in the shared append-only log. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub sender_email: String,
    pub receiver_email: String,
    pub content: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    #[serde(rename = "type")]
    pub kind: MessageKind,
}

impl Message {
    /// New message with a fresh id, stamped with the current time.
    pub fn new(
        sender_email: impl Into<String>,
        receiver_email: impl Into<String>,
        content: impl Into<String>,
        kind: MessageKind,
    ) -> Self {
        Self {
            id: crate::ids::new_message_id(),
            sender_email: sender_email.into(),
            receiver_email: receiver_email.into(),
            content: content.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            kind,
        }
    }

    /// True when {sender, receiver} == {a, b} as an unordered pair (a == b is the self-chat case).
    pub fn involves_pair(&self, a: &str, b: &str) -> bool {
        (self.sender_email == a && self.receiver_email == b)
            || (self.sender_email == b && self.receiver_email == a)
    }
}

/// Per-viewer summary of a known user plus that pair's latest message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    pub email: String,
    pub name: String,
    pub last_message: Option<Message>,
    /// Not tracked; always zero.
    pub unread_count: u32,
    pub is_assistant: bool,
}

impl Contact {
    /// Contact with no messages yet (e.g. one just added).
    pub fn empty(email: impl Into<String>, name: impl Into<String>) -> Self {
        let email = email.into();
        let is_assistant = email == ASSISTANT_EMAIL;
        Self {
            email,
            name: name.into(),
            last_message: None,
            unread_count: 0,
            is_assistant,
        }
    }

    /// Timestamp used for ordering; contacts without messages sort as zero.
    pub fn last_activity(&self) -> i64 {
        self.last_message.as_ref().map(|m| m.timestamp).unwrap_or(0)
    }
}
