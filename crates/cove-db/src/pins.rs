use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{PinRow, fmt_ts};
use crate::{Database, StoreError, is_fk_violation, is_unique_violation};

impl Database {
    pub fn insert_pin(
        &self,
        id: Uuid,
        message_id: Uuid,
        channel_id: Uuid,
        pinned_by: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO pinned_messages (id, message_id, channel_id, pinned_by, pinned_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                (
                    id.to_string(),
                    message_id.to_string(),
                    channel_id.to_string(),
                    pinned_by.to_string(),
                    fmt_ts(now),
                ),
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::AlreadyPinned
                } else if is_fk_violation(&e) {
                    StoreError::NotFound
                } else {
                    e.into()
                }
            })?;
            Ok(())
        })
    }

    pub fn delete_pin(&self, message_id: Uuid, channel_id: Uuid) -> Result<bool, StoreError> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "DELETE FROM pinned_messages WHERE message_id = ?1 AND channel_id = ?2",
                (message_id.to_string(), channel_id.to_string()),
            )?;
            Ok(n > 0)
        })
    }

    pub fn is_pinned(&self, message_id: Uuid, channel_id: Uuid) -> Result<bool, StoreError> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row(
                "SELECT COUNT(*) FROM pinned_messages WHERE message_id = ?1 AND channel_id = ?2",
                (message_id.to_string(), channel_id.to_string()),
                |row| row.get(0),
            )?;
            Ok(n > 0)
        })
    }

    /// Pins for a channel with message content and the involved user names,
    /// newest pin first.
    pub fn pins_for_channel(&self, channel_id: Uuid) -> Result<Vec<PinRow>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT p.id, p.message_id, p.channel_id, m.content, a.name, p.pinned_by,
                        u.name, p.pinned_at
                 FROM pinned_messages p
                 JOIN messages m ON m.id = p.message_id
                 LEFT JOIN users a ON a.id = m.author_id
                 LEFT JOIN users u ON u.id = p.pinned_by
                 WHERE p.channel_id = ?1
                 ORDER BY p.pinned_at DESC, p.id",
            )?;

            let rows = stmt
                .query_map([channel_id.to_string()], |row| {
                    Ok(PinRow {
                        id: row.get(0)?,
                        message_id: row.get(1)?,
                        channel_id: row.get(2)?,
                        content: row.get(3)?,
                        author_name: row
                            .get::<_, Option<String>>(4)?
                            .unwrap_or_else(|| "unknown".to_string()),
                        pinned_by: row.get(5)?,
                        pinned_by_name: row
                            .get::<_, Option<String>>(6)?
                            .unwrap_or_else(|| "unknown".to_string()),
                        pinned_at: row.get(7)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}
