use hive_core::{time::now_rfc3339, HiveError, Result};
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use crate::store::Store;
use crate::types::{RunStatus, Workflow, WorkflowRun};

impl Store {
    pub fn create_workflow(&self, owner_id: &str, name: &str, steps_json: &str) -> Result<Workflow> {
        let now = now_rfc3339();
        let id = Uuid::now_v7().to_string();
        let conn = self.conn();
        conn.execute(
            "INSERT INTO workflows (id, owner_id, name, steps_json, is_active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, 1, ?5, ?5)",
            params![id, owner_id, name, steps_json, now],
        )?;
        Ok(Workflow {
            id,
            owner_id: owner_id.to_string(),
            name: name.to_string(),
            steps_json: steps_json.to_string(),
            is_active: true,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    pub fn get_workflow(&self, id: &str) -> Result<Option<Workflow>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, owner_id, name, steps_json, is_active, created_at, updated_at
             FROM workflows WHERE id = ?1",
            params![id],
            Self::row_to_workflow,
        )
        .optional()
        .map_err(Into::into)
    }

    /// Fails fast if the workflow does not exist (spec §4.7: "fail fast if missing").
    pub fn require_workflow(&self, id: &str) -> Result<Workflow> {
        self.get_workflow(id)?
            .ok_or_else(|| HiveError::NotFound(format!("workflow {id}")))
    }

    pub fn list_active_workflows_for_owner(&self, owner_id: &str) -> Result<Vec<Workflow>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, owner_id, name, steps_json, is_active, created_at, updated_at
             FROM workflows WHERE owner_id = ?1 AND is_active = 1 ORDER BY name",
        )?;
        let rows = stmt
            .query_map(params![owner_id], Self::row_to_workflow)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Used by the trigger service's 0-match path to look for an inactive
    /// exact match (spec §4.9).
    pub fn find_workflow_by_name(&self, owner_id: &str, name: &str) -> Result<Option<Workflow>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, owner_id, name, steps_json, is_active, created_at, updated_at
             FROM workflows WHERE owner_id = ?1 AND name = ?2 COLLATE NOCASE",
            params![owner_id, name],
            Self::row_to_workflow,
        )
        .optional()
        .map_err(Into::into)
    }

    fn row_to_workflow(row: &rusqlite::Row) -> rusqlite::Result<Workflow> {
        let is_active: i32 = row.get(4)?;
        Ok(Workflow {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            name: row.get(2)?,
            steps_json: row.get(3)?,
            is_active: is_active != 0,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    // ---------------------------------------------------------------
    // Workflow runs
    // ---------------------------------------------------------------

    pub fn create_run(&self, workflow_id: &str, owner_id: &str) -> Result<WorkflowRun> {
        let now = now_rfc3339();
        let id = Uuid::now_v7().to_string();
        let conn = self.conn();
        conn.execute(
            "INSERT INTO workflow_runs (id, workflow_id, owner_id, status, steps_result_json, started_at, completed_at, error)
             VALUES (?1, ?2, ?3, 'running', '[]', ?4, NULL, NULL)",
            params![id, workflow_id, owner_id, now],
        )?;
        Ok(WorkflowRun {
            id,
            workflow_id: workflow_id.to_string(),
            owner_id: owner_id.to_string(),
            status: RunStatus::Running,
            steps_result_json: "[]".to_string(),
            started_at: now,
            completed_at: None,
            error: None,
        })
    }

    /// Overwrites the run's step-result list — called after every step so a
    /// crash mid-run leaves a consistent partial record (spec §4.7).
    pub fn update_run_steps(&self, run_id: &str, steps_result_json: &str) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "UPDATE workflow_runs SET steps_result_json = ?1 WHERE id = ?2",
            params![steps_result_json, run_id],
        )?;
        Ok(())
    }

    pub fn finish_run(
        &self,
        run_id: &str,
        status: RunStatus,
        steps_result_json: &str,
        error: Option<&str>,
    ) -> Result<()> {
        let now = now_rfc3339();
        let conn = self.conn();
        conn.execute(
            "UPDATE workflow_runs SET status = ?1, steps_result_json = ?2, completed_at = ?3, error = ?4
             WHERE id = ?5",
            params![status.as_str(), steps_result_json, now, error, run_id],
        )?;
        Ok(())
    }

    pub fn get_run(&self, id: &str) -> Result<Option<WorkflowRun>> {
        let conn = self.conn();
        let raw = conn
            .query_row(
                "SELECT id, workflow_id, owner_id, status, steps_result_json, started_at, completed_at, error
                 FROM workflow_runs WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, Option<String>>(6)?,
                        row.get::<_, Option<String>>(7)?,
                    ))
                },
            )
            .optional()?;
        let Some((id, workflow_id, owner_id, status_str, steps_result_json, started_at, completed_at, error)) = raw else {
            return Ok(None);
        };
        let status: RunStatus = status_str
            .parse()
            .map_err(|e| HiveError::Internal(format!("bad run status: {e}")))?;
        Ok(Some(WorkflowRun {
            id,
            workflow_id,
            owner_id,
            status,
            steps_result_json,
            started_at,
            completed_at,
            error,
        }))
    }
}
