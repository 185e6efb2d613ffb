use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{DirectMessageRow, fmt_ts};
use crate::{Database, OptionalExt, StoreError, is_fk_violation};

impl Database {
    pub fn insert_direct_message(
        &self,
        id: Uuid,
        sender_id: Uuid,
        receiver_id: Uuid,
        content: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO direct_messages (id, sender_id, receiver_id, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                (
                    id.to_string(),
                    sender_id.to_string(),
                    receiver_id.to_string(),
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

    /// Both directions of a two-party conversation, oldest first,
    /// soft-deleted rows excluded.
    pub fn conversation(
        &self,
        a: Uuid,
        b: Uuid,
        limit: u32,
    ) -> Result<Vec<DirectMessageRow>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, sender_id, receiver_id, content, read_at, created_at
                 FROM direct_messages
                 WHERE deleted_at IS NULL
                   AND ((sender_id = ?1 AND receiver_id = ?2)
                        OR (sender_id = ?2 AND receiver_id = ?1))
                 ORDER BY created_at ASC, id
                 LIMIT ?3",
            )?;

            let rows = stmt
                .query_map(
                    rusqlite::params![a.to_string(), b.to_string(), limit],
                    |row| {
                        Ok(DirectMessageRow {
                            id: row.get(0)?,
                            sender_id: row.get(1)?,
                            receiver_id: row.get(2)?,
                            content: row.get(3)?,
                            read_at: row.get(4)?,
                            created_at: row.get(5)?,
                        })
                    },
                )?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Stamps every unread message from `sender` to `receiver`. Returns how
    /// many were marked.
    pub fn mark_read(
        &self,
        receiver_id: Uuid,
        sender_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE direct_messages SET read_at = ?1
                 WHERE receiver_id = ?2 AND sender_id = ?3
                   AND read_at IS NULL AND deleted_at IS NULL",
                (fmt_ts(now), receiver_id.to_string(), sender_id.to_string()),
            )?;
            Ok(n)
        })
    }

    pub fn unread_count(&self, receiver_id: Uuid) -> Result<i64, StoreError> {
        self.with_conn(|conn| {
            let n = conn.query_row(
                "SELECT COUNT(*) FROM direct_messages
                 WHERE receiver_id = ?1 AND read_at IS NULL AND deleted_at IS NULL",
                [receiver_id.to_string()],
                |row| row.get(0),
            )?;
            Ok(n)
        })
    }

    pub fn get_direct_message(&self, id: Uuid) -> Result<Option<DirectMessageRow>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, sender_id, receiver_id, content, read_at, created_at
                 FROM direct_messages WHERE id = ?1 AND deleted_at IS NULL",
            )?;

            let row = stmt
                .query_row([id.to_string()], |row| {
                    Ok(DirectMessageRow {
                        id: row.get(0)?,
                        sender_id: row.get(1)?,
                        receiver_id: row.get(2)?,
                        content: row.get(3)?,
                        read_at: row.get(4)?,
                        created_at: row.get(5)?,
                    })
                })
                .optional()?;

            Ok(row)
        })
    }

    pub fn soft_delete_direct_message(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE direct_messages SET deleted_at = ?1
                 WHERE id = ?2 AND deleted_at IS NULL",
                (fmt_ts(now), id.to_string()),
            )?;
            if n == 0 {
                return Err(StoreError::NotFound);
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn setup() -> (Database, Uuid, Uuid) {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        db.create_user(alice, "alice", "alice@example.com", now).unwrap();
        db.create_user(bob, "bob", "bob@example.com", now).unwrap();
        (db, alice, bob)
    }

    #[test]
    fn conversation_interleaves_both_directions() {
        let (db, alice, bob) = setup();
        let base = Utc::now() - Duration::minutes(5);

        db.insert_direct_message(Uuid::new_v4(), alice, bob, "hi", base).unwrap();
        db.insert_direct_message(Uuid::new_v4(), bob, alice, "hey", base + Duration::minutes(1))
            .unwrap();
        db.insert_direct_message(
            Uuid::new_v4(),
            alice,
            bob,
            "lunch?",
            base + Duration::minutes(2),
        )
        .unwrap();

        let convo = db.conversation(alice, bob, 50).unwrap();
        let contents: Vec<&str> = convo.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["hi", "hey", "lunch?"]);
    }

    #[test]
    fn mark_read_only_touches_unread_incoming() {
        let (db, alice, bob) = setup();
        let now = Utc::now();

        db.insert_direct_message(Uuid::new_v4(), alice, bob, "one", now).unwrap();
        db.insert_direct_message(Uuid::new_v4(), alice, bob, "two", now).unwrap();
        db.insert_direct_message(Uuid::new_v4(), bob, alice, "reply", now).unwrap();

        assert_eq!(db.unread_count(bob).unwrap(), 2);
        assert_eq!(db.mark_read(bob, alice, now).unwrap(), 2);
        assert_eq!(db.mark_read(bob, alice, now).unwrap(), 0);
        assert_eq!(db.unread_count(bob).unwrap(), 0);
        // Bob's reply to Alice is untouched.
        assert_eq!(db.unread_count(alice).unwrap(), 1);
    }
}
