//! Skill resolver (spec §4.6 step 8, §5 "the `skills` cache of the
//! resolver"): resolves a skill name through the precedence user's stored
//! skills → user's filesystem skills → shared stored skills → global
//! filesystem skills, first by-name match wins, the user tiers cached 60 s.
//!
//! `hive-store` has no "list all shared skills" query (only an exact-name
//! lookup), so the enumerable candidate set used for routing summaries
//! (spec §4.6 step 6, "the user's resolved skill list") covers only the
//! user's own stored and filesystem skills — shared stored skills
//! participate solely in step 8's by-name resolution. Recorded in DESIGN.md.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use hive_core::{sanitize_user_id, Result, SYSTEM_USER_ID};
use hive_store::Store;
use serde::Deserialize;

use hive_agent::SkillSummary;

const CACHE_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Deserialize)]
struct SkillFrontmatter {
    name: String,
    description: String,
}

#[derive(Debug, Clone)]
struct ResolvedSkill {
    name: String,
    description: String,
    content: String,
}

struct CacheEntry {
    fetched_at: Instant,
    own: Vec<ResolvedSkill>,
}

pub struct SkillResolver {
    store: Arc<Store>,
    data_dir: PathBuf,
    cache: DashMap<String, CacheEntry>,
}

impl SkillResolver {
    pub fn new(store: Arc<Store>, data_dir: impl Into<PathBuf>) -> Self {
        Self { store, data_dir: data_dir.into(), cache: DashMap::new() }
    }

    /// The enumerable skill set available to `user_id` — their own stored
    /// and filesystem skills — for the Orchestrator's routing prompt.
    pub fn summaries(&self, user_id: &str) -> Result<Vec<SkillSummary>> {
        let own = self.own_skills(user_id)?;
        Ok(own
            .iter()
            .map(|s| SkillSummary { name: s.name.clone(), description: s.description.clone() })
            .collect())
    }

    /// Resolves `name` through the full four-tier precedence.
    pub fn resolve(&self, user_id: &str, name: &str) -> Result<Option<String>> {
        let own = self.own_skills(user_id)?;
        if let Some(skill) = own.iter().find(|s| s.name.eq_ignore_ascii_case(name)) {
            return Ok(Some(skill.content.clone()));
        }

        if let Some(skill) = self.store.find_shared_skill(name)? {
            return Ok(Some(skill.content));
        }

        let global_dir = skills_dir(&self.data_dir, SYSTEM_USER_ID);
        if let Some(content) = find_filesystem_skill(&global_dir, name) {
            return Ok(Some(content));
        }

        Ok(None)
    }

    fn own_skills(&self, user_id: &str) -> Result<Vec<ResolvedSkill>> {
        if let Some(entry) = self.cache.get(user_id) {
            if entry.fetched_at.elapsed() < CACHE_TTL {
                return Ok(entry.own.clone());
            }
        }

        let mut seen = std::collections::HashSet::new();
        let mut own = Vec::new();

        for skill in self.store.list_skills_for_owner(user_id)? {
            if seen.insert(skill.name.to_lowercase()) {
                own.push(ResolvedSkill { name: skill.name, description: skill.description, content: skill.content });
            }
        }

        for skill in load_filesystem_skills(&skills_dir(&self.data_dir, user_id)) {
            if seen.insert(skill.name.to_lowercase()) {
                own.push(skill);
            }
        }

        self.cache.insert(user_id.to_string(), CacheEntry { fetched_at: Instant::now(), own: own.clone() });
        Ok(own)
    }
}

fn skills_dir(data_dir: &Path, user_id: &str) -> PathBuf {
    data_dir.join("users").join(sanitize_user_id(user_id)).join("skills")
}

/// Parses a SKILL.md's YAML frontmatter (`--- name: … description: … ---`)
/// and returns `(meta, body)`.
fn parse_skill_md(content: &str) -> Option<(SkillFrontmatter, String)> {
    let trimmed = content.trim_start();
    if !trimmed.starts_with("---") {
        return None;
    }
    let after_first = &trimmed[3..];
    let closing_idx = after_first.find("\n---")?;
    let yaml_block = &after_first[..closing_idx];
    let body_start = closing_idx + 4;
    let body = if body_start < after_first.len() {
        after_first[body_start..].trim_start_matches('\n').to_string()
    } else {
        String::new()
    };
    let meta: SkillFrontmatter = serde_yaml::from_str(yaml_block).ok()?;
    Some((meta, body))
}

/// One level of `<dir>/<skill-name>/SKILL.md` subdirectories.
fn load_filesystem_skills(dir: &Path) -> Vec<ResolvedSkill> {
    let mut out = Vec::new();
    let Ok(entries) = std::fs::read_dir(dir) else {
        return out;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let skill_file = path.join("SKILL.md");
        let Ok(raw) = std::fs::read_to_string(&skill_file) else {
            continue;
        };
        if let Some((meta, body)) = parse_skill_md(&raw) {
            out.push(ResolvedSkill { name: meta.name, description: meta.description, content: body });
        }
    }
    out
}

fn find_filesystem_skill(dir: &Path, name: &str) -> Option<String> {
    load_filesystem_skills(dir)
        .into_iter()
        .find(|s| s.name.eq_ignore_ascii_case(name))
        .map(|s| s.content)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_skill(dir: &Path, slug: &str, name: &str, description: &str, body: &str) {
        let skill_dir = dir.join(slug);
        std::fs::create_dir_all(&skill_dir).unwrap();
        std::fs::write(
            skill_dir.join("SKILL.md"),
            format!("---\nname: {name}\ndescription: {description}\n---\n{body}"),
        )
        .unwrap();
    }

    #[test]
    fn stored_skill_wins_over_filesystem_skill_with_same_name() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        store.ensure_user("alice").unwrap();
        store.create_skill(Some("alice"), "greeter", "stored desc", "stored body", false).unwrap();

        let data_dir = tempfile::tempdir().unwrap();
        write_skill(&skills_dir(data_dir.path(), "alice"), "greeter", "greeter", "fs desc", "fs body");

        let resolver = SkillResolver::new(store, data_dir.path());
        let content = resolver.resolve("alice", "greeter").unwrap();
        assert_eq!(content.as_deref(), Some("stored body"));
    }

    #[test]
    fn falls_back_to_shared_stored_skill() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        store.ensure_user("alice").unwrap();
        store.create_skill(Some("bob"), "shared-thing", "shared desc", "shared body", true).unwrap();

        let data_dir = tempfile::tempdir().unwrap();
        let resolver = SkillResolver::new(store, data_dir.path());
        let content = resolver.resolve("alice", "shared-thing").unwrap();
        assert_eq!(content.as_deref(), Some("shared body"));
    }

    #[test]
    fn falls_back_to_global_filesystem_skill() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        store.ensure_user("alice").unwrap();

        let data_dir = tempfile::tempdir().unwrap();
        write_skill(&skills_dir(data_dir.path(), SYSTEM_USER_ID), "global-thing", "global-thing", "g desc", "g body");

        let resolver = SkillResolver::new(store, data_dir.path());
        let content = resolver.resolve("alice", "global-thing").unwrap();
        assert_eq!(content.as_deref(), Some("g body"));
    }

    #[test]
    fn unknown_skill_resolves_to_none() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        store.ensure_user("alice").unwrap();
        let data_dir = tempfile::tempdir().unwrap();
        let resolver = SkillResolver::new(store, data_dir.path());
        assert!(resolver.resolve("alice", "nope").unwrap().is_none());
    }
}
