use hive_core::{time::now_rfc3339, HiveError, Result};
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use crate::store::Store;
use crate::types::Schedule;

impl Store {
    pub fn create_schedule(
        &self,
        owner_id: &str,
        workflow_id: &str,
        cron_expression: &str,
        timezone: &str,
    ) -> Result<Schedule> {
        let id = Uuid::now_v7().to_string();
        let conn = self.conn();
        conn.execute(
            "INSERT INTO schedules (id, owner_id, workflow_id, cron_expression, timezone, is_active, last_run_at, next_run_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 1, NULL, NULL)",
            params![id, owner_id, workflow_id, cron_expression, timezone],
        )?;
        Ok(Schedule {
            id,
            owner_id: owner_id.to_string(),
            workflow_id: workflow_id.to_string(),
            cron_expression: cron_expression.to_string(),
            timezone: timezone.to_string(),
            is_active: true,
            last_run_at: None,
            next_run_at: None,
        })
    }

    pub fn list_active_schedules(&self) -> Result<Vec<Schedule>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, owner_id, workflow_id, cron_expression, timezone, is_active, last_run_at, next_run_at
             FROM schedules WHERE is_active = 1",
        )?;
        let rows = stmt
            .query_map(params![], Self::row_to_schedule)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn get_schedule(&self, id: &str) -> Result<Option<Schedule>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, owner_id, workflow_id, cron_expression, timezone, is_active, last_run_at, next_run_at
             FROM schedules WHERE id = ?1",
            params![id],
            Self::row_to_schedule,
        )
        .optional()
        .map_err(Into::into)
    }

    pub fn deactivate_schedule(&self, id: &str) -> Result<()> {
        let conn = self.conn();
        let n = conn.execute("UPDATE schedules SET is_active = 0 WHERE id = ?1", params![id])?;
        if n == 0 {
            return Err(HiveError::NotFound(format!("schedule {id}")));
        }
        Ok(())
    }

    /// Atomically records a completed tick (spec §4.8 step 3): `lastRunAt=now,
    /// nextRunAt=<next tick>`.
    pub fn record_tick(&self, id: &str, next_run_at: &str) -> Result<()> {
        let now = now_rfc3339();
        let conn = self.conn();
        conn.execute(
            "UPDATE schedules SET last_run_at = ?1, next_run_at = ?2 WHERE id = ?3",
            params![now, next_run_at, id],
        )?;
        Ok(())
    }

    fn row_to_schedule(row: &rusqlite::Row) -> rusqlite::Result<Schedule> {
        let is_active: i32 = row.get(5)?;
        Ok(Schedule {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            workflow_id: row.get(2)?,
            cron_expression: row.get(3)?,
            timezone: row.get(4)?,
            is_active: is_active != 0,
            last_run_at: row.get(6)?,
            next_run_at: row.get(7)?,
        })
    }
}
