use hive_core::{time::now_rfc3339, HiveError, Result};
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use crate::store::Store;
use crate::types::Reminder;

impl Store {
    pub fn add_reminder(&self, user_id: &str, text: &str, due_at: Option<&str>) -> Result<Reminder> {
        let now = now_rfc3339();
        let id = Uuid::now_v7().to_string();
        let conn = self.conn();
        conn.execute(
            "INSERT INTO reminders (id, user_id, text, is_complete, created_at, completed_at, due_at, notified_at)
             VALUES (?1, ?2, ?3, 0, ?4, NULL, ?5, NULL)",
            params![id, user_id, text, now, due_at],
        )?;
        Ok(Reminder {
            id,
            user_id: user_id.to_string(),
            text: text.to_string(),
            is_complete: false,
            created_at: now,
            completed_at: None,
            due_at: due_at.map(String::from),
            notified_at: None,
        })
    }

    pub fn list_reminders(&self, user_id: &str, include_complete: bool) -> Result<Vec<Reminder>> {
        let conn = self.conn();
        let mut stmt = if include_complete {
            conn.prepare(
                "SELECT id, user_id, text, is_complete, created_at, completed_at, due_at, notified_at
                 FROM reminders WHERE user_id = ?1 ORDER BY created_at DESC",
            )?
        } else {
            conn.prepare(
                "SELECT id, user_id, text, is_complete, created_at, completed_at, due_at, notified_at
                 FROM reminders WHERE user_id = ?1 AND is_complete = 0 ORDER BY created_at DESC",
            )?
        };
        let rows = stmt
            .query_map(params![user_id], Self::row_to_reminder)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn get_reminder(&self, id: &str) -> Result<Option<Reminder>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, user_id, text, is_complete, created_at, completed_at, due_at, notified_at
             FROM reminders WHERE id = ?1",
            params![id],
            Self::row_to_reminder,
        )
        .optional()
        .map_err(Into::into)
    }

    pub fn complete_reminder(&self, user_id: &str, id: &str) -> Result<()> {
        let now = now_rfc3339();
        let conn = self.conn();
        let n = conn.execute(
            "UPDATE reminders SET is_complete = 1, completed_at = ?1
             WHERE id = ?2 AND user_id = ?3",
            params![now, id, user_id],
        )?;
        if n == 0 {
            return Err(HiveError::NotFound(format!("reminder {id}")));
        }
        Ok(())
    }

    pub fn remove_reminder(&self, user_id: &str, id: &str) -> Result<()> {
        let conn = self.conn();
        let n = conn.execute(
            "DELETE FROM reminders WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        if n == 0 {
            return Err(HiveError::NotFound(format!("reminder {id}")));
        }
        Ok(())
    }

    pub fn set_reminder_due(&self, user_id: &str, id: &str, due_at: &str) -> Result<()> {
        let conn = self.conn();
        let n = conn.execute(
            "UPDATE reminders SET due_at = ?1 WHERE id = ?2 AND user_id = ?3",
            params![due_at, id, user_id],
        )?;
        if n == 0 {
            return Err(HiveError::NotFound(format!("reminder {id}")));
        }
        Ok(())
    }

    /// Reminders whose `dueAt <= now` and that have not yet been notified.
    pub fn due_reminders(&self, now: &str) -> Result<Vec<Reminder>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, user_id, text, is_complete, created_at, completed_at, due_at, notified_at
             FROM reminders
             WHERE notified_at IS NULL AND is_complete = 0
               AND due_at IS NOT NULL AND due_at <= ?1",
        )?;
        let rows = stmt
            .query_map(params![now], Self::row_to_reminder)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Marks a reminder notified, but only if it hasn't been already — the
    /// unique-winner transition described in spec §3 for exactly-once delivery.
    pub fn mark_reminder_notified(&self, id: &str) -> Result<bool> {
        let now = now_rfc3339();
        let conn = self.conn();
        let n = conn.execute(
            "UPDATE reminders SET notified_at = ?1 WHERE id = ?2 AND notified_at IS NULL",
            params![now, id],
        )?;
        Ok(n == 1)
    }

    fn row_to_reminder(row: &rusqlite::Row) -> rusqlite::Result<Reminder> {
        let is_complete: i32 = row.get(3)?;
        Ok(Reminder {
            id: row.get(0)?,
            user_id: row.get(1)?,
            text: row.get(2)?,
            is_complete: is_complete != 0,
            created_at: row.get(4)?,
            completed_at: row.get(5)?,
            due_at: row.get(6)?,
            notified_at: row.get(7)?,
        })
    }
}
