use hive_core::{HiveError, Result};
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use crate::store::Store;
use crate::types::ChannelIdentity;

impl Store {
    pub fn find_identity(&self, channel: &str, channel_user_id: &str) -> Result<Option<ChannelIdentity>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, owner_id, channel, channel_user_id FROM channel_identities
             WHERE channel = ?1 AND channel_user_id = ?2",
            params![channel, channel_user_id],
            Self::row_to_identity,
        )
        .optional()
        .map_err(Into::into)
    }

    pub fn link_identity(
        &self,
        owner_id: &str,
        channel: &str,
        channel_user_id: &str,
    ) -> Result<ChannelIdentity> {
        let id = Uuid::now_v7().to_string();
        let conn = self.conn();
        conn.execute(
            "INSERT INTO channel_identities (id, owner_id, channel, channel_user_id)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(channel, channel_user_id) DO UPDATE SET owner_id = excluded.owner_id",
            params![id, owner_id, channel, channel_user_id],
        )?;
        self.find_identity(channel, channel_user_id)?
            .ok_or_else(|| HiveError::Internal("identity vanished after insert".into()))
    }

    /// Looked up by id for the notify step's recipient-resolution tier 2
    /// (spec §4.7); callers must separately check `owner_id` ownership.
    pub fn get_identity(&self, id: &str) -> Result<Option<ChannelIdentity>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, owner_id, channel, channel_user_id FROM channel_identities WHERE id = ?1",
            params![id],
            Self::row_to_identity,
        )
        .optional()
        .map_err(Into::into)
    }

    /// First linked identity for `owner_id` on `channel` — used by the
    /// notify step's recipient-resolution tier 3 (spec §4.7).
    pub fn first_identity_for_channel(&self, owner_id: &str, channel: &str) -> Result<Option<ChannelIdentity>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, owner_id, channel, channel_user_id FROM channel_identities
             WHERE owner_id = ?1 AND channel = ?2 LIMIT 1",
            params![owner_id, channel],
            Self::row_to_identity,
        )
        .optional()
        .map_err(Into::into)
    }

    fn row_to_identity(row: &rusqlite::Row) -> rusqlite::Result<ChannelIdentity> {
        Ok(ChannelIdentity {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            channel: row.get(2)?,
            channel_user_id: row.get(3)?,
        })
    }
}
