use hive_core::{time::now_rfc3339, HiveError, Result};
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use crate::store::Store;
use crate::types::{CredentialMetadata, UserCredential};

impl Store {
    pub fn store_credential(
        &self,
        owner_id: &str,
        name: &str,
        service: &str,
        encrypted_value: &str,
    ) -> Result<UserCredential> {
        let now = now_rfc3339();
        let id = Uuid::now_v7().to_string();
        let conn = self.conn();
        conn.execute(
            "INSERT INTO credentials (id, owner_id, name, service, encrypted_value, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
             ON CONFLICT(owner_id, name) DO UPDATE SET
                service = excluded.service,
                encrypted_value = excluded.encrypted_value,
                updated_at = excluded.updated_at",
            params![id, owner_id, name, service, encrypted_value, now],
        )?;
        self.resolve_credential_raw(owner_id, name)?
            .ok_or_else(|| HiveError::Internal("credential vanished after insert".into()))
    }

    /// All retrieves verify `ownerId == requesterId` (spec §4.10).
    pub fn resolve_credential(
        &self,
        requester_id: &str,
        owner_id: &str,
        name: &str,
    ) -> Result<UserCredential> {
        if requester_id != owner_id {
            return Err(HiveError::Unauthorized("access denied".into()));
        }
        self.resolve_credential_raw(owner_id, name)?
            .ok_or_else(|| HiveError::NotFound(format!("credential \"{name}\" not found")))
    }

    fn resolve_credential_raw(&self, owner_id: &str, name: &str) -> Result<Option<UserCredential>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, owner_id, name, service, encrypted_value, created_at, updated_at
             FROM credentials WHERE owner_id = ?1 AND name = ?2",
            params![owner_id, name],
            Self::row_to_credential,
        )
        .optional()
        .map_err(Into::into)
    }

    /// Metadata only, never the ciphertext (spec §4.10).
    pub fn list_credentials(&self, owner_id: &str) -> Result<Vec<CredentialMetadata>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, name, service, created_at, updated_at
             FROM credentials WHERE owner_id = ?1 ORDER BY name",
        )?;
        let rows = stmt
            .query_map(params![owner_id], |row| {
                Ok(CredentialMetadata {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    service: row.get(2)?,
                    created_at: row.get(3)?,
                    updated_at: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn delete_credential(&self, owner_id: &str, name: &str) -> Result<()> {
        let conn = self.conn();
        let n = conn.execute(
            "DELETE FROM credentials WHERE owner_id = ?1 AND name = ?2",
            params![owner_id, name],
        )?;
        if n == 0 {
            return Err(HiveError::NotFound(format!("credential \"{name}\" not found")));
        }
        Ok(())
    }

    fn row_to_credential(row: &rusqlite::Row) -> rusqlite::Result<UserCredential> {
        Ok(UserCredential {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            name: row.get(2)?,
            service: row.get(3)?,
            encrypted_value: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }
}
