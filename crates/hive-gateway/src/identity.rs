//! Identity resolution (spec §4.6 step 1, §9 "Identity prefixes vs user
//! records"): turns a raw inbound id into an owning user id, creating the
//! user record and per-user workspace subtree on first contact.

use std::path::Path;

use hive_core::{split_channel_prefix, sanitize_user_id, Result};
use hive_store::Store;

/// Resolves `raw_user_id` to the owning user id. If the id carries a
/// recognized channel prefix (`tg:42`) and a `ChannelIdentity` already links
/// it to an owner, the owner id is substituted; otherwise the prefixed id
/// itself becomes (and remains) the user id. Always passes the result
/// through `ensure_user` and creates `<dataDir>/users/<sanitized>/{skills,files}`.
pub fn resolve_user_id(store: &Store, data_dir: &Path, raw_user_id: &str) -> Result<String> {
    let (channel, external_id) = split_channel_prefix(raw_user_id);

    let owner_id = match channel {
        Some(channel) => match store.find_identity(channel.as_str(), external_id)? {
            Some(identity) => identity.owner_id,
            None => raw_user_id.to_string(),
        },
        None => raw_user_id.to_string(),
    };

    store.ensure_user(&owner_id)?;
    ensure_workspace(data_dir, &owner_id)?;
    Ok(owner_id)
}

/// Creates `<dataDir>/users/<sanitized>/{skills,files}` if missing.
pub fn ensure_workspace(data_dir: &Path, user_id: &str) -> Result<()> {
    let root = data_dir.join("users").join(sanitize_user_id(user_id));
    std::fs::create_dir_all(root.join("skills"))?;
    std::fs::create_dir_all(root.join("files"))?;
    Ok(())
}

/// `<dataDir>/users/<sanitized>/skills`.
pub fn user_skills_dir(data_dir: &Path, user_id: &str) -> std::path::PathBuf {
    data_dir.join("users").join(sanitize_user_id(user_id)).join("skills")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn unrecognized_prefix_keeps_raw_id_as_owner() {
        let store = Store::open_in_memory().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let owner = resolve_user_id(&store, dir.path(), "alice").unwrap();
        assert_eq!(owner, "alice");
        assert!(dir.path().join("users/alice/skills").is_dir());
        assert!(dir.path().join("users/alice/files").is_dir());
    }

    #[test]
    fn channel_prefixed_id_resolves_through_linked_identity() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let dir = tempfile::tempdir().unwrap();
        store.ensure_user("alice").unwrap();
        store.link_identity("alice", "telegram", "42").unwrap();

        let owner = resolve_user_id(&store, dir.path(), "tg:42").unwrap();
        assert_eq!(owner, "alice");
    }

    #[test]
    fn channel_prefixed_id_without_link_keeps_prefix() {
        let store = Store::open_in_memory().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let owner = resolve_user_id(&store, dir.path(), "tg:99").unwrap();
        assert_eq!(owner, "tg:99");
    }
}
