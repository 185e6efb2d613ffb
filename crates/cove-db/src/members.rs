//! Membership store.
//!
//! Tracks (channel, user, role) rows. Uniqueness is the composite primary
//! key; the minimum-one-admin rule is enforced here, inside a transaction,
//! so two admins leaving at once cannot race past the count check.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use cove_types::models::Role;

use crate::models::{MemberRow, fmt_ts};
use crate::{Database, OptionalExt, StoreError, is_fk_violation, is_unique_violation};

impl Database {
    pub fn add_member(
        &self,
        channel_id: Uuid,
        user_id: Uuid,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO channel_members (channel_id, user_id, role, joined_at)
                 VALUES (?1, ?2, ?3, ?4)",
                (
                    channel_id.to_string(),
                    user_id.to_string(),
                    role.as_str(),
                    fmt_ts(now),
                ),
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::AlreadyMember
                } else if is_fk_violation(&e) {
                    StoreError::NotFound
                } else {
                    e.into()
                }
            })?;
            Ok(())
        })
    }

    /// Removes a membership row. Fails with `LastAdminViolation` when the
    /// target is the sole admin of a channel that would still have members —
    /// whole-channel deletion is the path that bypasses this.
    pub fn remove_member(&self, channel_id: Uuid, user_id: Uuid) -> Result<(), StoreError> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let role = query_role(&tx, channel_id, user_id)?.ok_or(StoreError::NotAMember)?;

            if role == Role::Admin
                && count_role(&tx, channel_id, "admin")? <= 1
                && count_members(&tx, channel_id)? > 1
            {
                return Err(StoreError::LastAdminViolation);
            }

            tx.execute(
                "DELETE FROM channel_members WHERE channel_id = ?1 AND user_id = ?2",
                (channel_id.to_string(), user_id.to_string()),
            )?;

            tx.commit()?;
            Ok(())
        })
    }

    /// Changes a member's role. Demoting the only admin is rejected while
    /// the channel has any members, since the row itself stays behind.
    pub fn set_role(&self, channel_id: Uuid, user_id: Uuid, role: Role) -> Result<(), StoreError> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let current = query_role(&tx, channel_id, user_id)?.ok_or(StoreError::NotAMember)?;

            if current == Role::Admin
                && role == Role::Member
                && count_role(&tx, channel_id, "admin")? <= 1
            {
                return Err(StoreError::LastAdminViolation);
            }

            tx.execute(
                "UPDATE channel_members SET role = ?1 WHERE channel_id = ?2 AND user_id = ?3",
                (role.as_str(), channel_id.to_string(), user_id.to_string()),
            )?;

            tx.commit()?;
            Ok(())
        })
    }

    pub fn is_member(&self, channel_id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        self.with_conn(|conn| Ok(query_role(conn, channel_id, user_id)?.is_some()))
    }

    pub fn is_admin(&self, channel_id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        self.with_conn(|conn| Ok(query_role(conn, channel_id, user_id)? == Some(Role::Admin)))
    }

    pub fn admin_count(&self, channel_id: Uuid) -> Result<i64, StoreError> {
        self.with_conn(|conn| count_role(conn, channel_id, "admin"))
    }

    pub fn list_members(&self, channel_id: Uuid) -> Result<Vec<MemberRow>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT m.channel_id, m.user_id, u.name, m.role, m.joined_at
                 FROM channel_members m
                 JOIN users u ON u.id = m.user_id
                 WHERE m.channel_id = ?1
                 ORDER BY m.joined_at ASC",
            )?;

            let rows = stmt
                .query_map([channel_id.to_string()], |row| {
                    Ok(MemberRow {
                        channel_id: row.get(0)?,
                        user_id: row.get(1)?,
                        user_name: row.get(2)?,
                        role: row.get(3)?,
                        joined_at: row.get(4)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

fn query_role(
    conn: &Connection,
    channel_id: Uuid,
    user_id: Uuid,
) -> Result<Option<Role>, StoreError> {
    let role: Option<String> = conn
        .query_row(
            "SELECT role FROM channel_members WHERE channel_id = ?1 AND user_id = ?2",
            (channel_id.to_string(), user_id.to_string()),
            |row| row.get(0),
        )
        .optional()?;

    Ok(role.as_deref().and_then(Role::from_str))
}

fn count_role(conn: &Connection, channel_id: Uuid, role: &str) -> Result<i64, StoreError> {
    let n = conn.query_row(
        "SELECT COUNT(*) FROM channel_members WHERE channel_id = ?1 AND role = ?2",
        (channel_id.to_string(), role),
        |row| row.get(0),
    )?;
    Ok(n)
}

fn count_members(conn: &Connection, channel_id: Uuid) -> Result<i64, StoreError> {
    let n = conn.query_row(
        "SELECT COUNT(*) FROM channel_members WHERE channel_id = ?1",
        [channel_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn setup() -> (Database, Uuid, Uuid, Uuid) {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        let channel = Uuid::new_v4();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        db.create_user(alice, "alice", "alice@example.com", now).unwrap();
        db.create_user(bob, "bob", "bob@example.com", now).unwrap();
        db.create_channel(channel, "general", now).unwrap();
        (db, channel, alice, bob)
    }

    #[test]
    fn duplicate_membership_is_rejected() {
        let (db, channel, alice, _) = setup();
        let now = Utc::now();

        db.add_member(channel, alice, Role::Admin, now).unwrap();
        let err = db.add_member(channel, alice, Role::Member, now).unwrap_err();
        assert!(matches!(err, StoreError::AlreadyMember));
    }

    #[test]
    fn missing_channel_surfaces_not_found() {
        let (db, _, alice, _) = setup();
        let err = db
            .add_member(Uuid::new_v4(), alice, Role::Member, Utc::now())
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[test]
    fn sole_admin_cannot_leave_a_populated_channel() {
        let (db, channel, alice, bob) = setup();
        let now = Utc::now();

        db.add_member(channel, alice, Role::Admin, now).unwrap();
        db.add_member(channel, bob, Role::Member, now).unwrap();

        let err = db.remove_member(channel, alice).unwrap_err();
        assert!(matches!(err, StoreError::LastAdminViolation));

        // Promote bob, then alice can go.
        db.set_role(channel, bob, Role::Admin).unwrap();
        db.remove_member(channel, alice).unwrap();
    }

    #[test]
    fn last_member_may_leave_even_as_admin() {
        let (db, channel, alice, _) = setup();
        db.add_member(channel, alice, Role::Admin, Utc::now()).unwrap();

        db.remove_member(channel, alice).unwrap();
        assert_eq!(db.admin_count(channel).unwrap(), 0);
        assert!(db.list_members(channel).unwrap().is_empty());
    }

    #[test]
    fn sole_admin_cannot_be_demoted() {
        let (db, channel, alice, _) = setup();
        db.add_member(channel, alice, Role::Admin, Utc::now()).unwrap();

        let err = db.set_role(channel, alice, Role::Member).unwrap_err();
        assert!(matches!(err, StoreError::LastAdminViolation));
    }

    #[test]
    fn channel_deletion_bypasses_the_admin_rule() {
        let (db, channel, alice, bob) = setup();
        let now = Utc::now();
        db.add_member(channel, alice, Role::Admin, now).unwrap();
        db.add_member(channel, bob, Role::Member, now).unwrap();

        assert!(db.delete_channel(channel).unwrap());
        assert!(db.list_members(channel).unwrap().is_empty());
    }

    #[test]
    fn removing_a_non_member_fails() {
        let (db, channel, _, bob) = setup();
        let err = db.remove_member(channel, bob).unwrap_err();
        assert!(matches!(err, StoreError::NotAMember));
    }
}
