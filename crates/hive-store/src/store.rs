use std::sync::Mutex;

use hive_core::{time::now_rfc3339, HiveError, Result};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::types::*;

/// Typed repository for every persisted entity in the system (spec §3, C1).
///
/// Thread-safe: the SQLite connection is behind a `Mutex` (WAL mode permits
/// concurrent readers at the file level, but `rusqlite::Connection` itself
/// is `!Sync`, so writers still serialize through the mutex).
pub struct Store {
    db: Mutex<Connection>,
}

impl Store {
    /// Opens (or creates) the database at `path` and runs schema migrations.
    pub fn open(path: &str) -> Result<Self> {
        if let Some(parent) = std::path::Path::new(path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        crate::schema::init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    /// In-memory store, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        crate::schema::init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    pub(crate) fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.db.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ---------------------------------------------------------------
    // Users
    // ---------------------------------------------------------------

    /// Ensures a `User` record exists for `user_id`, creating one with an
    /// empty config bag if absent. Returns the (possibly newly created) row.
    pub fn ensure_user(&self, user_id: &str) -> Result<User> {
        if let Some(user) = self.get_user(user_id)? {
            return Ok(user);
        }
        let now = now_rfc3339();
        let conn = self.conn();
        conn.execute(
            "INSERT INTO users (id, email, config, created_at, updated_at)
             VALUES (?1, NULL, '{}', ?2, ?2)
             ON CONFLICT(id) DO NOTHING",
            params![user_id, now],
        )?;
        Ok(User {
            id: user_id.to_string(),
            email: None,
            config: serde_json::json!({}),
            created_at: now.clone(),
            updated_at: now,
        })
    }

    pub fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, email, config, created_at, updated_at FROM users WHERE id = ?1",
            params![user_id],
            |row| {
                let config_str: String = row.get(2)?;
                Ok(User {
                    id: row.get(0)?,
                    email: row.get(1)?,
                    config: serde_json::from_str(&config_str).unwrap_or(serde_json::json!({})),
                    created_at: row.get(3)?,
                    updated_at: row.get(4)?,
                })
            },
        )
        .optional()
        .map_err(HiveError::from)
    }

    pub fn update_user_config(&self, user_id: &str, config: &serde_json::Value) -> Result<()> {
        let now = now_rfc3339();
        let conn = self.conn();
        let n = conn.execute(
            "UPDATE users SET config = ?1, updated_at = ?2 WHERE id = ?3",
            params![config.to_string(), now, user_id],
        )?;
        if n == 0 {
            return Err(HiveError::NotFound(format!("user {user_id}")));
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // Conversations
    // ---------------------------------------------------------------

    pub fn get_conversation(&self, id: &str) -> Result<Option<Conversation>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, user_id, title, summary, created_at, updated_at
             FROM conversations WHERE id = ?1",
            params![id],
            Self::row_to_conversation,
        )
        .optional()
        .map_err(HiveError::from)
    }

    /// Most recently updated conversation owned by `user_id`, if any.
    pub fn latest_conversation(&self, user_id: &str) -> Result<Option<Conversation>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, user_id, title, summary, created_at, updated_at
             FROM conversations WHERE user_id = ?1
             ORDER BY updated_at DESC LIMIT 1",
            params![user_id],
            Self::row_to_conversation,
        )
        .optional()
        .map_err(HiveError::from)
    }

    pub fn create_conversation(&self, user_id: &str, title: Option<&str>) -> Result<Conversation> {
        let now = now_rfc3339();
        let id = Uuid::now_v7().to_string();
        let conn = self.conn();
        conn.execute(
            "INSERT INTO conversations (id, user_id, title, summary, created_at, updated_at)
             VALUES (?1, ?2, ?3, NULL, ?4, ?4)",
            params![id, user_id, title, now],
        )?;
        Ok(Conversation {
            id,
            user_id: user_id.to_string(),
            title: title.map(String::from),
            summary: None,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// Resolves the conversation for a Gateway turn (spec §4.6 step 2):
    /// the supplied id, else the user's most recent conversation, else a
    /// freshly created one.
    pub fn open_or_create_conversation(
        &self,
        user_id: &str,
        conversation_id: Option<&str>,
    ) -> Result<Conversation> {
        if let Some(id) = conversation_id {
            if let Some(conv) = self.get_conversation(id)? {
                return Ok(conv);
            }
        }
        if let Some(conv) = self.latest_conversation(user_id)? {
            return Ok(conv);
        }
        self.create_conversation(user_id, None)
    }

    pub fn set_conversation_summary(&self, conversation_id: &str, summary: &str) -> Result<()> {
        let now = now_rfc3339();
        let conn = self.conn();
        conn.execute(
            "UPDATE conversations SET summary = ?1, updated_at = ?2 WHERE id = ?3",
            params![summary, now, conversation_id],
        )?;
        Ok(())
    }

    fn row_to_conversation(row: &rusqlite::Row) -> rusqlite::Result<Conversation> {
        Ok(Conversation {
            id: row.get(0)?,
            user_id: row.get(1)?,
            title: row.get(2)?,
            summary: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }

    // ---------------------------------------------------------------
    // Messages
    // ---------------------------------------------------------------

    /// Appends a message and bumps the parent conversation's `updatedAt`
    /// (spec §3: "each append bumps the parent conversation's updatedAt").
    pub fn append_message(
        &self,
        conversation_id: &str,
        role: MessageRole,
        content: &str,
    ) -> Result<Message> {
        let now = now_rfc3339();
        let id = Uuid::now_v7().to_string();
        let conn = self.conn();
        conn.execute(
            "INSERT INTO messages (id, conversation_id, role, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, conversation_id, role.as_str(), content, now],
        )?;
        conn.execute(
            "UPDATE conversations SET updated_at = ?1 WHERE id = ?2",
            params![now, conversation_id],
        )?;
        Ok(Message {
            id,
            conversation_id: conversation_id.to_string(),
            role,
            content: content.to_string(),
            created_at: now,
        })
    }

    /// Last 20 persisted messages for a conversation, oldest first (spec §4.6 step 4).
    pub fn recent_messages(&self, conversation_id: &str, limit: u32) -> Result<Vec<Message>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, conversation_id, role, content, created_at FROM (
                SELECT id, conversation_id, role, content, created_at
                FROM messages WHERE conversation_id = ?1
                ORDER BY created_at DESC LIMIT ?2
             ) ORDER BY created_at ASC",
        )?;
        let rows = stmt
            .query_map(params![conversation_id, limit], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        let mut out = Vec::with_capacity(rows.len());
        for (id, conversation_id, role_str, content, created_at) in rows {
            let role: MessageRole = role_str
                .parse()
                .map_err(|e: HiveError| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
            out.push(Message {
                id,
                conversation_id,
                role,
                content,
                created_at,
            });
        }
        Ok(out)
    }

    pub fn message_count(&self, conversation_id: &str) -> Result<u32> {
        let conn = self.conn();
        let count: u32 = conn.query_row(
            "SELECT COUNT(*) FROM messages WHERE conversation_id = ?1",
            params![conversation_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// All but the most recent `keep_last` messages, oldest first — the set
    /// the Summarizer condenses (spec §4.4).
    pub fn messages_to_condense(
        &self,
        conversation_id: &str,
        keep_last: u32,
    ) -> Result<Vec<Message>> {
        let total = self.message_count(conversation_id)?;
        if total <= keep_last {
            return Ok(Vec::new());
        }
        let all = self.recent_messages(conversation_id, total)?;
        let cut = (total - keep_last) as usize;
        Ok(all.into_iter().take(cut).collect())
    }

    // ---------------------------------------------------------------
    // Usage log
    // ---------------------------------------------------------------

    pub fn log_usage(
        &self,
        user_id: &str,
        model: &str,
        tokens_in: u32,
        tokens_out: u32,
        cost_cents: f64,
    ) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO usage_log (id, user_id, model, tokens_in, tokens_out, cost_cents, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                Uuid::now_v7().to_string(),
                user_id,
                model,
                tokens_in,
                tokens_out,
                cost_cents,
                now_rfc3339()
            ],
        )?;
        Ok(())
    }
}
