use hive_core::{time::now_rfc3339, Result};
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use crate::store::Store;
use crate::types::Skill;

impl Store {
    /// Case-insensitive name match among `owner_id`'s own stored skills.
    pub fn find_owned_skill(&self, owner_id: &str, name: &str) -> Result<Option<Skill>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, owner_id, name, description, content, is_shared, created_at, updated_at
             FROM skills WHERE owner_id = ?1 AND name = ?2 COLLATE NOCASE",
            params![owner_id, name],
            Self::row_to_skill,
        )
        .optional()
        .map_err(Into::into)
    }

    /// Case-insensitive name match among globally shared stored skills.
    pub fn find_shared_skill(&self, name: &str) -> Result<Option<Skill>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, owner_id, name, description, content, is_shared, created_at, updated_at
             FROM skills WHERE is_shared = 1 AND name = ?1 COLLATE NOCASE
             ORDER BY updated_at DESC LIMIT 1",
            params![name],
            Self::row_to_skill,
        )
        .optional()
        .map_err(Into::into)
    }

    pub fn list_skills_for_owner(&self, owner_id: &str) -> Result<Vec<Skill>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, owner_id, name, description, content, is_shared, created_at, updated_at
             FROM skills WHERE owner_id = ?1 ORDER BY name",
        )?;
        let rows = stmt
            .query_map(params![owner_id], Self::row_to_skill)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn create_skill(
        &self,
        owner_id: Option<&str>,
        name: &str,
        description: &str,
        content: &str,
        is_shared: bool,
    ) -> Result<Skill> {
        let now = now_rfc3339();
        let id = Uuid::now_v7().to_string();
        let conn = self.conn();
        conn.execute(
            "INSERT INTO skills (id, owner_id, name, description, content, is_shared, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            params![id, owner_id, name, description, content, is_shared as i32, now],
        )?;
        Ok(Skill {
            id,
            owner_id: owner_id.map(String::from),
            name: name.to_string(),
            description: description.to_string(),
            content: content.to_string(),
            is_shared,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    fn row_to_skill(row: &rusqlite::Row) -> rusqlite::Result<Skill> {
        let is_shared: i32 = row.get(5)?;
        Ok(Skill {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            name: row.get(2)?,
            description: row.get(3)?,
            content: row.get(4)?,
            is_shared: is_shared != 0,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }
}
