//! Identifier generation for stored records.

/// Fresh message id (`msg-<uuid v4>`). Unique across the whole message log.
pub fn new_message_id() -> String {
    format!("msg-{}", uuid::Uuid::new_v4())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn message_ids_are_prefixed_and_distinct() {
        let ids: HashSet<String> = (0..256).map(|_| new_message_id()).collect();
        assert_eq!(ids.len(), 256);
        assert!(ids.iter().all(|id| id.starts_with("msg-")));
    }
}
