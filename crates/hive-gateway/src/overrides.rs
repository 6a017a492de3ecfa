//! Per-user overrides (spec §4.6 step 10, §5 "the deliberate parallel fetch
//! of per-user soul/identity/profile prompts"): soul prompt, basic identity
//! and profile prompt live in `User.config`'s free-form JSON bag; the
//! `fileContext` field of `hive_agent::Overrides` is a bullet list built
//! from tracked file metadata for `file_operation` turns.

use hive_agent::Overrides;
use hive_core::Result;
use hive_store::Store;

fn from_config(config: &serde_json::Value) -> Overrides {
    let field = |key: &str| {
        config
            .get(key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    Overrides {
        soul_prompt: field("soulPrompt"),
        basic_identity: field("basicIdentity"),
        profile_prompt: field("profilePrompt"),
        file_context: None,
    }
}

/// `fileContext` bullet list: filename, tracked flag, and last-upload
/// timestamp for every file the user has uploaded. `FileMetadata` carries
/// no size field, so size is omitted from the bullet.
fn file_context(store: &Store, user_id: &str) -> Result<Option<String>> {
    let files = store.list_files(user_id)?;
    if files.is_empty() {
        return Ok(None);
    }
    let mut out = String::from("Files in your workspace:\n");
    for file in files {
        let tracked = if file.tracked { "tracked" } else { "untracked" };
        out.push_str(&format!("- {} ({tracked}, uploaded {})\n", file.filename, file.last_uploaded_at));
    }
    Ok(Some(out))
}

/// Composes the per-user overrides for a turn (spec §4.6 step 10). Fetching
/// collapses to one `get_user` round trip — all three prompt fields live in
/// the same config bag — plus a second, independent `fileContext` query
/// gated on `needs_file_context`.
pub fn compose(store: &Store, user_id: &str, needs_file_context: bool) -> Result<Overrides> {
    let user = store.get_user(user_id)?;
    let config = user.map(|u| u.config).unwrap_or_else(|| serde_json::json!({}));
    let mut overrides = from_config(&config);
    if needs_file_context {
        overrides.file_context = file_context(store, user_id)?;
    }
    Ok(overrides)
}

/// The user's configured timezone (`config.timezone`), defaulting to UTC.
/// No dedicated spec field for this; `User.config` is explicitly the
/// free-form bag per-user settings live in, so it's read the same way as
/// the three prompt overrides.
pub fn timezone(store: &Store, user_id: &str) -> Result<String> {
    let user = store.get_user(user_id)?;
    Ok(user
        .and_then(|u| u.config.get("timezone").and_then(|v| v.as_str()).map(str::to_string))
        .unwrap_or_else(|| "UTC".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_fields_resolve_to_none() {
        let store = Store::open_in_memory().unwrap();
        store.ensure_user("alice").unwrap();
        let overrides = compose(&store, "alice", false).unwrap();
        assert!(overrides.soul_prompt.is_none());
        assert!(overrides.basic_identity.is_none());
        assert!(overrides.profile_prompt.is_none());
        assert!(overrides.file_context.is_none());
    }

    #[test]
    fn config_fields_round_trip() {
        let store = Store::open_in_memory().unwrap();
        store.ensure_user("alice").unwrap();
        store
            .update_user_config(
                "alice",
                &serde_json::json!({"soulPrompt": "be warm", "basicIdentity": "Hive", "profilePrompt": "likes rust"}),
            )
            .unwrap();

        let overrides = compose(&store, "alice", false).unwrap();
        assert_eq!(overrides.soul_prompt.as_deref(), Some("be warm"));
        assert_eq!(overrides.basic_identity.as_deref(), Some("Hive"));
        assert_eq!(overrides.profile_prompt.as_deref(), Some("likes rust"));
    }

    #[test]
    fn file_context_only_populated_when_requested() {
        let store = Store::open_in_memory().unwrap();
        store.ensure_user("alice").unwrap();
        store.record_upload("alice", "notes.txt", true).unwrap();

        assert!(compose(&store, "alice", false).unwrap().file_context.is_none());

        let ctx = compose(&store, "alice", true).unwrap().file_context.unwrap();
        assert!(ctx.contains("notes.txt"));
        assert!(ctx.contains("tracked"));
    }
}
