//! Derived views over the message log: pairwise conversations and per-viewer contact lists.
//!
//! Pure functions of the store's contents; recomputed on every read. Contact derivation is
//! O(users × messages), fine for a local single-user data set.

use crate::model::{Contact, Message, User, ASSISTANT_EMAIL, SELF_SUFFIX};

/// Messages exchanged between `a` and `b` in either direction, ascending by timestamp.
/// Equal timestamps keep their log order. `a == b` yields the viewer's notes to self.
pub fn conversation(messages: &[Message], a: &str, b: &str) -> Vec<Message> {
    let mut out: Vec<Message> = messages
        .iter()
        .filter(|m| m.involves_pair(a, b))
        .cloned()
        .collect();
    out.sort_by_key(|m| m.timestamp);
    out
}

/// Most recent message between `a` and `b`, if any.
pub fn last_message(messages: &[Message], a: &str, b: &str) -> Option<Message> {
    conversation(messages, a, b).pop()
}

/// One contact per known user, annotated with that pair's last message.
///
/// Every user in the directory is visible to every viewer. The viewer's own entry has
/// [`SELF_SUFFIX`] appended to its name. Sorted by last-message time, newest first; users with
/// no messages count as time zero and keep directory order among themselves.
pub fn contacts_for_user(users: &[User], messages: &[Message], viewer: &str) -> Vec<Contact> {
    let mut contacts: Vec<Contact> = users
        .iter()
        .map(|u| {
            let name = if u.email == viewer {
                format!("{}{}", u.name, SELF_SUFFIX)
            } else {
                u.name.clone()
            };
            Contact {
                email: u.email.clone(),
                name,
                last_message: last_message(messages, viewer, &u.email),
                unread_count: 0,
                is_assistant: u.email == ASSISTANT_EMAIL,
            }
        })
        .collect();
    contacts.sort_by(|a, b| b.last_activity().cmp(&a.last_activity()));
    contacts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MessageKind;

    fn msg(id: &str, from: &str, to: &str, ts: i64) -> Message {
        Message {
            id: id.to_string(),
            sender_email: from.to_string(),
            receiver_email: to.to_string(),
            content: format!("content {}", id),
            timestamp: ts,
            kind: MessageKind::Text,
        }
    }

    fn sample() -> Vec<Message> {
        vec![
            msg("1", "a", "b", 30),
            msg("2", "b", "a", 10),
            msg("3", "a", "c", 20),
            msg("4", "a", "a", 5),
            msg("5", "c", "b", 40),
            msg("6", "a", "b", 20),
        ]
    }

    #[test]
    fn conversation_is_symmetric_and_sorted() {
        let log = sample();
        let ab = conversation(&log, "a", "b");
        assert_eq!(ab, conversation(&log, "b", "a"));
        let ids: Vec<_> = ab.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "6", "1"]);
        assert!(ab.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn self_conversation_only_contains_self_messages() {
        let log = sample();
        let aa = conversation(&log, "a", "a");
        assert_eq!(aa.len(), 1);
        assert_eq!(aa[0].id, "4");
    }

    #[test]
    fn equal_timestamps_keep_log_order() {
        let log = vec![msg("x", "a", "b", 7), msg("y", "b", "a", 7), msg("z", "a", "b", 7)];
        let ids: Vec<_> = conversation(&log, "a", "b").into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec!["x", "y", "z"]);
    }

    #[test]
    fn contacts_sorted_by_recency_with_silent_users_last() {
        let users = vec![
            User::assistant(),
            User::new("a", "Alice"),
            User::new("b", "Bob"),
            User::new("c", "Carol"),
            User::new("d", "Dan"),
        ];
        let contacts = contacts_for_user(&users, &sample(), "a");
        let emails: Vec<_> = contacts.iter().map(|c| c.email.as_str()).collect();
        assert_eq!(emails, vec!["b", "c", "a", ASSISTANT_EMAIL, "d"]);
        assert_eq!(contacts[0].last_message.as_ref().map(|m| m.id.as_str()), Some("1"));
        assert_eq!(contacts[2].name, "Alice (self)");
        assert!(contacts.iter().all(|c| c.unread_count == 0));
    }

    #[test]
    fn assistant_listed_without_any_messages() {
        let users = vec![User::assistant(), User::new("a", "Alice")];
        let contacts = contacts_for_user(&users, &[], "a");
        let ai = contacts.iter().find(|c| c.is_assistant).unwrap();
        assert_eq!(ai.email, ASSISTANT_EMAIL);
        assert!(ai.last_message.is_none());
    }

    #[test]
    fn last_message_ignores_other_pairs() {
        let log = sample();
        assert_eq!(last_message(&log, "b", "c").map(|m| m.id), Some("5".to_string()));
        assert_eq!(last_message(&log, "c", "d"), None);
    }
}
