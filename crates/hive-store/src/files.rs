use hive_core::{time::now_rfc3339, Result};
use rusqlite::params;

use crate::store::Store;
use crate::types::FileMetadata;

impl Store {
    pub fn record_upload(&self, user_id: &str, filename: &str, tracked: bool) -> Result<()> {
        let now = now_rfc3339();
        let conn = self.conn();
        conn.execute(
            "INSERT INTO file_metadata (user_id, filename, tracked, last_uploaded_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id, filename) DO UPDATE SET
                tracked = excluded.tracked,
                last_uploaded_at = excluded.last_uploaded_at",
            params![user_id, filename, tracked as i32, now],
        )?;
        Ok(())
    }

    /// Bullet-list source for `fileContext` (spec §4.6 step 10).
    pub fn list_files(&self, user_id: &str) -> Result<Vec<FileMetadata>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT user_id, filename, tracked, last_uploaded_at
             FROM file_metadata WHERE user_id = ?1 ORDER BY filename",
        )?;
        let rows = stmt
            .query_map(params![user_id], |row| {
                let tracked: i32 = row.get(2)?;
                Ok(FileMetadata {
                    user_id: row.get(0)?,
                    filename: row.get(1)?,
                    tracked: tracked != 0,
                    last_uploaded_at: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}
