use chrono::{DateTime, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use crate::models::{ChannelRow, fmt_ts};
use crate::{Database, OptionalExt, StoreError, is_unique_violation};

impl Database {
    pub fn create_channel(
        &self,
        id: Uuid,
        name: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO channels (id, name, created_at) VALUES (?1, ?2, ?3)",
                (id.to_string(), name, fmt_ts(now)),
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::NameTaken(name.to_string())
                } else {
                    e.into()
                }
            })?;
            Ok(())
        })
    }

    pub fn rename_channel(&self, id: Uuid, name: &str) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            let n = conn
                .execute(
                    "UPDATE channels SET name = ?1 WHERE id = ?2",
                    (name, id.to_string()),
                )
                .map_err(|e| {
                    if is_unique_violation(&e) {
                        StoreError::NameTaken(name.to_string())
                    } else {
                        StoreError::from(e)
                    }
                })?;
            if n == 0 {
                return Err(StoreError::NotFound);
            }
            Ok(())
        })
    }

    /// Deletes the channel; memberships, invitations, messages and pins go
    /// with it via ON DELETE CASCADE.
    pub fn delete_channel(&self, id: Uuid) -> Result<bool, StoreError> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM channels WHERE id = ?1", [id.to_string()])?;
            Ok(n > 0)
        })
    }

    pub fn get_channel(&self, id: Uuid) -> Result<Option<ChannelRow>, StoreError> {
        self.with_conn(|conn| query_channel(conn, id))
    }

    pub fn channel_exists(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.get_channel(id)?.is_some())
    }

    /// Channels the user belongs to, oldest first.
    pub fn channels_for_user(&self, user_id: Uuid) -> Result<Vec<ChannelRow>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.name, c.created_at
                 FROM channels c
                 JOIN channel_members m ON m.channel_id = c.id
                 WHERE m.user_id = ?1
                 ORDER BY c.created_at ASC",
            )?;

            let rows = stmt
                .query_map([user_id.to_string()], |row| {
                    Ok(ChannelRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        created_at: row.get(2)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

fn query_channel(conn: &Connection, id: Uuid) -> Result<Option<ChannelRow>, StoreError> {
    let mut stmt = conn.prepare("SELECT id, name, created_at FROM channels WHERE id = ?1")?;

    let row = stmt
        .query_row([id.to_string()], |row| {
            Ok(ChannelRow {
                id: row.get(0)?,
                name: row.get(1)?,
                created_at: row.get(2)?,
            })
        })
        .optional()?;

    Ok(row)
}
