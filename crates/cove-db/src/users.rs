use chrono::{DateTime, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use crate::models::{UserRow, fmt_ts};
use crate::{Database, OptionalExt, StoreError, is_unique_violation};

impl Database {
    pub fn create_user(
        &self,
        id: Uuid,
        name: &str,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, name, email, created_at) VALUES (?1, ?2, ?3, ?4)",
                (id.to_string(), name, email, fmt_ts(now)),
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::EmailTaken(email.to_string())
                } else {
                    e.into()
                }
            })?;
            Ok(())
        })
    }

    pub fn get_user_by_id(&self, id: Uuid) -> Result<Option<UserRow>, StoreError> {
        self.with_conn(|conn| query_user(conn, "id = ?1", &id.to_string()))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>, StoreError> {
        self.with_conn(|conn| query_user(conn, "email = ?1", email))
    }
}

fn query_user(conn: &Connection, filter: &str, param: &str) -> Result<Option<UserRow>, StoreError> {
    let sql = format!("SELECT id, name, email, created_at FROM users WHERE {filter}");
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt
        .query_row([param], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                name: row.get(1)?,
                email: row.get(2)?,
                created_at: row.get(3)?,
            })
        })
        .optional()?;

    Ok(row)
}
