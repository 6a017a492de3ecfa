use hive_core::{time::now_rfc3339, Result};
use rusqlite::params;
use uuid::Uuid;

use crate::store::Store;

impl Store {
    /// Fire-and-forget capture of a Gateway turn (spec §4.6 step 16). Errors
    /// here are always swallowed by the caller, never propagated.
    pub fn append_debug_log(
        &self,
        user_id: &str,
        conversation_id: &str,
        payload: &serde_json::Value,
    ) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO debug_log (id, user_id, conversation_id, payload_json, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                Uuid::now_v7().to_string(),
                user_id,
                conversation_id,
                payload.to_string(),
                now_rfc3339()
            ],
        )?;
        Ok(())
    }
}
