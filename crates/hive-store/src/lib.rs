//! Typed repository for every persisted entity in the system (spec §3, C1).

mod credentials;
mod debug_log;
mod files;
mod identities;
mod reminders;
mod schedules;
mod schema;
mod skills;
mod store;
mod workflows;

pub mod types;

pub use store::Store;

#[cfg(test)]
mod tests {
    use super::*;
    use types::MessageRole;

    #[test]
    fn ensure_user_is_idempotent() {
        let store = Store::open_in_memory().unwrap();
        let a = store.ensure_user("alice").unwrap();
        let b = store.ensure_user("alice").unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(a.created_at, b.created_at);
    }

    #[test]
    fn append_message_bumps_conversation_updated_at() {
        let store = Store::open_in_memory().unwrap();
        store.ensure_user("alice").unwrap();
        let conv = store.create_conversation("alice", None).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        store
            .append_message(&conv.id, MessageRole::User, "hi")
            .unwrap();
        let reloaded = store.get_conversation(&conv.id).unwrap().unwrap();
        assert!(reloaded.updated_at >= conv.updated_at);
    }

    #[test]
    fn recent_messages_are_ordered_oldest_first() {
        let store = Store::open_in_memory().unwrap();
        store.ensure_user("alice").unwrap();
        let conv = store.create_conversation("alice", None).unwrap();
        for i in 0..5 {
            store
                .append_message(&conv.id, MessageRole::User, &format!("msg {i}"))
                .unwrap();
        }
        let msgs = store.recent_messages(&conv.id, 3).unwrap();
        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[0].content, "msg 2");
        assert_eq!(msgs[2].content, "msg 4");
    }

    #[test]
    fn reminder_notified_at_set_at_most_once() {
        let store = Store::open_in_memory().unwrap();
        store.ensure_user("alice").unwrap();
        let r = store.add_reminder("alice", "drink water", Some("2020-01-01T00:00:00Z")).unwrap();
        assert!(store.mark_reminder_notified(&r.id).unwrap());
        assert!(!store.mark_reminder_notified(&r.id).unwrap());
    }

    #[test]
    fn credential_resolve_denies_cross_user_access() {
        let store = Store::open_in_memory().unwrap();
        store.ensure_user("alice").unwrap();
        store
            .store_credential("alice", "github", "github", "ciphertext")
            .unwrap();
        let err = store
            .resolve_credential("mallory", "alice", "github")
            .unwrap_err();
        assert_eq!(err.code(), "UNAUTHORIZED");
    }

    #[test]
    fn workflow_lookup_fails_fast_when_missing() {
        let store = Store::open_in_memory().unwrap();
        let err = store.require_workflow("nonexistent").unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }
}
