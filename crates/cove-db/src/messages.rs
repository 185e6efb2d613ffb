use chrono::{DateTime, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use crate::models::{MessageRow, fmt_ts};
use crate::{Database, OptionalExt, StoreError, is_fk_violation};

const MESSAGE_SELECT: &str = "SELECT m.id, m.channel_id, m.author_id, u.name, m.content,
        m.created_at, m.edited_at, m.deleted_at
 FROM messages m
 LEFT JOIN users u ON u.id = m.author_id";

impl Database {
    pub fn insert_message(
        &self,
        id: Uuid,
        channel_id: Uuid,
        author_id: Uuid,
        content: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, channel_id, author_id, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                (
                    id.to_string(),
                    channel_id.to_string(),
                    author_id.to_string(),
                    content,
                    fmt_ts(now),
                ),
            )
            .map_err(|e| {
                if is_fk_violation(&e) {
                    StoreError::NotFound
                } else {
                    StoreError::from(e)
                }
            })?;
            Ok(())
        })
    }

    /// Fetches a message regardless of soft-deletion; callers decide whether
    /// a deleted row counts (restore needs it, display does not).
    pub fn get_message(&self, id: Uuid) -> Result<Option<MessageRow>, StoreError> {
        self.with_conn(|conn| {
            let sql = format!("{MESSAGE_SELECT} WHERE m.id = ?1");
            let mut stmt = conn.prepare(&sql)?;
            let row = stmt.query_row([id.to_string()], message_from_row).optional()?;
            Ok(row)
        })
    }

    /// Channel history, newest first, soft-deleted rows excluded. `before`
    /// is a cursor: pass the `created_at` of the oldest message from the
    /// previous page to fetch older ones.
    pub fn list_messages(
        &self,
        channel_id: Uuid,
        limit: u32,
        before: Option<&str>,
    ) -> Result<Vec<MessageRow>, StoreError> {
        self.with_conn(|conn| {
            let rows = match before {
                Some(cursor) => {
                    let sql = format!(
                        "{MESSAGE_SELECT}
                         WHERE m.channel_id = ?1 AND m.deleted_at IS NULL AND m.created_at < ?2
                         ORDER BY m.created_at DESC, m.id LIMIT ?3"
                    );
                    let mut stmt = conn.prepare(&sql)?;
                    stmt.query_map(
                        rusqlite::params![channel_id.to_string(), cursor, limit],
                        message_from_row,
                    )?
                    .collect::<Result<Vec<_>, _>>()?
                }
                None => {
                    let sql = format!(
                        "{MESSAGE_SELECT}
                         WHERE m.channel_id = ?1 AND m.deleted_at IS NULL
                         ORDER BY m.created_at DESC, m.id LIMIT ?2"
                    );
                    let mut stmt = conn.prepare(&sql)?;
                    stmt.query_map(
                        rusqlite::params![channel_id.to_string(), limit],
                        message_from_row,
                    )?
                    .collect::<Result<Vec<_>, _>>()?
                }
            };

            Ok(rows)
        })
    }

    pub fn update_message_content(
        &self,
        id: Uuid,
        content: &str,
        edited_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE messages SET content = ?1, edited_at = ?2
                 WHERE id = ?3 AND deleted_at IS NULL",
                (content, fmt_ts(edited_at), id.to_string()),
            )?;
            if n == 0 {
                return Err(StoreError::NotFound);
            }
            Ok(())
        })
    }

    pub fn soft_delete_message(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE messages SET deleted_at = ?1 WHERE id = ?2 AND deleted_at IS NULL",
                (fmt_ts(now), id.to_string()),
            )?;
            if n == 0 {
                return Err(StoreError::NotFound);
            }
            Ok(())
        })
    }

    pub fn restore_message(&self, id: Uuid) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE messages SET deleted_at = NULL WHERE id = ?1",
                [id.to_string()],
            )?;
            if n == 0 {
                return Err(StoreError::NotFound);
            }
            Ok(())
        })
    }

    /// Substring search within one channel, newest first.
    pub fn search_messages(
        &self,
        channel_id: Uuid,
        query: &str,
        limit: u32,
    ) -> Result<Vec<MessageRow>, StoreError> {
        self.with_conn(|conn| {
            let sql = format!(
                "{MESSAGE_SELECT}
                 WHERE m.channel_id = ?1 AND m.deleted_at IS NULL AND m.content LIKE ?2 ESCAPE '\\'
                 ORDER BY m.created_at DESC, m.id LIMIT ?3"
            );
            let mut stmt = conn.prepare(&sql)?;

            let pattern = format!("%{}%", escape_like(query));
            let rows = stmt
                .query_map(
                    rusqlite::params![channel_id.to_string(), pattern, limit],
                    message_from_row,
                )?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

fn message_from_row(row: &rusqlite::Row<'_>) -> Result<MessageRow, rusqlite::Error> {
    Ok(MessageRow {
        id: row.get(0)?,
        channel_id: row.get(1)?,
        author_id: row.get(2)?,
        author_name: row
            .get::<_, Option<String>>(3)?
            .unwrap_or_else(|| "unknown".to_string()),
        content: row.get(4)?,
        created_at: row.get(5)?,
        edited_at: row.get(6)?,
        deleted_at: row.get(7)?,
    })
}

fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}
