//! Invitation ledger.
//!
//! Owns the invitation state machine: `pending → accepted | declined |
//! expired`, with terminal states immutable. Every transition out of
//! `pending` is a conditional UPDATE guarded on `status = 'pending'`, so a
//! response racing an expiry sweep resolves to whichever write commits
//! first; the loser sees zero affected rows. Duplicate-pending detection is
//! the partial unique indexes in the schema, not an application pre-check.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use cove_types::models::{InvitationStatus, InviteTarget};

use crate::models::{InboxRow, InvitationRow, fmt_ts};
use crate::{Database, OptionalExt, StoreError, is_fk_violation, is_unique_violation};

const INVITATION_COLUMNS: &str =
    "id, channel_id, inviter_id, invitee_id, invitee_email, status, expires_at, created_at";

impl Database {
    pub fn insert_invitation(
        &self,
        id: Uuid,
        channel_id: Uuid,
        inviter_id: Uuid,
        target: &InviteTarget,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let (invitee_id, invitee_email) = match target {
            InviteTarget::User(user_id) => (Some(user_id.to_string()), None),
            InviteTarget::Email(email) => (None, Some(email.clone())),
        };

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO invitations
                     (id, channel_id, inviter_id, invitee_id, invitee_email,
                      status, expires_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 'pending', ?6, ?7)",
                (
                    id.to_string(),
                    channel_id.to_string(),
                    inviter_id.to_string(),
                    invitee_id,
                    invitee_email,
                    fmt_ts(expires_at),
                    fmt_ts(now),
                ),
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::DuplicatePending
                } else if is_fk_violation(&e) {
                    StoreError::NotFound
                } else {
                    e.into()
                }
            })?;
            Ok(())
        })
    }

    pub fn get_invitation(&self, id: Uuid) -> Result<Option<InvitationRow>, StoreError> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {INVITATION_COLUMNS} FROM invitations WHERE id = ?1");
            let mut stmt = conn.prepare(&sql)?;

            let row = stmt
                .query_row([id.to_string()], invitation_from_row)
                .optional()?;

            Ok(row)
        })
    }

    /// All invitations for a channel, newest first — the admin's view.
    pub fn invitations_for_channel(
        &self,
        channel_id: Uuid,
    ) -> Result<Vec<InvitationRow>, StoreError> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {INVITATION_COLUMNS} FROM invitations
                 WHERE channel_id = ?1
                 ORDER BY created_at DESC, id"
            );
            let mut stmt = conn.prepare(&sql)?;

            let rows = stmt
                .query_map([channel_id.to_string()], invitation_from_row)?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Pending, unexpired invitations addressed to the user's id or email,
    /// newest first. A single query over both target shapes deduplicates by
    /// construction.
    pub fn pending_inbox(
        &self,
        user_id: Uuid,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<InboxRow>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT i.id, i.channel_id, c.name, i.inviter_id, u.name,
                        i.expires_at, i.created_at
                 FROM invitations i
                 JOIN channels c ON c.id = i.channel_id
                 JOIN users u ON u.id = i.inviter_id
                 WHERE i.status = 'pending'
                   AND i.expires_at > ?1
                   AND (i.invitee_id = ?2
                        OR (i.invitee_id IS NULL AND i.invitee_email = ?3))
                 ORDER BY i.created_at DESC, i.id",
            )?;

            let rows = stmt
                .query_map(
                    (fmt_ts(now), user_id.to_string(), email),
                    |row| {
                        Ok(InboxRow {
                            id: row.get(0)?,
                            channel_id: row.get(1)?,
                            channel_name: row.get(2)?,
                            inviter_id: row.get(3)?,
                            inviter_name: row.get(4)?,
                            expires_at: row.get(5)?,
                            created_at: row.get(6)?,
                        })
                    },
                )?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Accept a pending invitation as `actor`, in one transaction:
    /// the conditional UPDATE both flips the status and promotes an
    /// email-only target to the actor's account (COALESCE leaves an already
    /// resolved target alone), then the membership row is inserted
    /// idempotently — an actor who joined through another path still gets an
    /// accepted invitation and no duplicate row.
    ///
    /// Returns false when the invitation was not pending anymore; the caller
    /// re-reads the row to report what happened.
    pub fn accept_pending(
        &self,
        id: Uuid,
        actor_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let n = tx.execute(
                "UPDATE invitations
                 SET status = 'accepted', invitee_id = COALESCE(invitee_id, ?1)
                 WHERE id = ?2 AND status = 'pending'",
                (actor_id.to_string(), id.to_string()),
            )?;
            if n == 0 {
                return Ok(false);
            }

            tx.execute(
                "INSERT OR IGNORE INTO channel_members (channel_id, user_id, role, joined_at)
                 SELECT channel_id, ?1, 'member', ?2 FROM invitations WHERE id = ?3",
                (actor_id.to_string(), fmt_ts(now), id.to_string()),
            )?;

            tx.commit()?;
            Ok(true)
        })
    }

    /// CAS transition `pending → declined`. No membership side effect and no
    /// promotion: the record stays addressed as it was, terminally.
    pub fn decline_pending(&self, id: Uuid) -> Result<bool, StoreError> {
        self.transition_pending(id, InvitationStatus::Declined)
    }

    /// CAS transition `pending → expired`, used for lazy expiry at respond
    /// time as well as by the sweep.
    pub fn expire_pending(&self, id: Uuid) -> Result<bool, StoreError> {
        self.transition_pending(id, InvitationStatus::Expired)
    }

    fn transition_pending(&self, id: Uuid, to: InvitationStatus) -> Result<bool, StoreError> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE invitations SET status = ?1 WHERE id = ?2 AND status = 'pending'",
                (to.as_str(), id.to_string()),
            )?;
            Ok(n > 0)
        })
    }

    /// Cancellation is a removal, not a terminal state: the row is deleted
    /// and the (channel, target) slot frees up immediately. Only pending
    /// rows can be cancelled.
    pub fn delete_pending(&self, id: Uuid) -> Result<bool, StoreError> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "DELETE FROM invitations WHERE id = ?1 AND status = 'pending'",
                [id.to_string()],
            )?;
            Ok(n > 0)
        })
    }

    /// Set-based sweep: every pending invitation past its deadline becomes
    /// expired. Rows that transitioned since being scanned are simply not
    /// matched — losing that race is expected, not an error.
    pub fn expire_before(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE invitations SET status = 'expired'
                 WHERE status = 'pending' AND expires_at < ?1",
                [fmt_ts(now)],
            )?;
            Ok(n)
        })
    }
}

fn invitation_from_row(row: &rusqlite::Row<'_>) -> Result<InvitationRow, rusqlite::Error> {
    Ok(InvitationRow {
        id: row.get(0)?,
        channel_id: row.get(1)?,
        inviter_id: row.get(2)?,
        invitee_id: row.get(3)?,
        invitee_email: row.get(4)?,
        status: row.get(5)?,
        expires_at: row.get(6)?,
        created_at: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use cove_types::models::Role;

    struct Fixture {
        db: Database,
        channel: Uuid,
        admin: Uuid,
        invitee: Uuid,
    }

    fn setup() -> Fixture {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        let channel = Uuid::new_v4();
        let admin = Uuid::new_v4();
        let invitee = Uuid::new_v4();
        db.create_user(admin, "admin", "admin@example.com", now).unwrap();
        db.create_user(invitee, "carol", "carol@example.com", now).unwrap();
        db.create_channel(channel, "design", now).unwrap();
        db.add_member(channel, admin, Role::Admin, now).unwrap();
        Fixture { db, channel, admin, invitee }
    }

    fn invite(f: &Fixture, target: InviteTarget, ttl_days: i64) -> Uuid {
        let id = Uuid::new_v4();
        let now = Utc::now();
        f.db.insert_invitation(id, f.channel, f.admin, &target, now + Duration::days(ttl_days), now)
            .unwrap();
        id
    }

    #[test]
    fn second_pending_for_same_user_target_is_rejected() {
        let f = setup();
        invite(&f, InviteTarget::User(f.invitee), 7);

        let err = f
            .db
            .insert_invitation(
                Uuid::new_v4(),
                f.channel,
                f.admin,
                &InviteTarget::User(f.invitee),
                Utc::now() + Duration::days(7),
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicatePending));
    }

    #[test]
    fn second_pending_for_same_email_target_is_rejected() {
        let f = setup();
        invite(&f, InviteTarget::Email("new@example.com".into()), 7);

        let err = f
            .db
            .insert_invitation(
                Uuid::new_v4(),
                f.channel,
                f.admin,
                &InviteTarget::Email("new@example.com".into()),
                Utc::now() + Duration::days(7),
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicatePending));
    }

    #[test]
    fn declined_rows_do_not_block_a_new_invitation() {
        let f = setup();
        let first = invite(&f, InviteTarget::User(f.invitee), 7);
        assert!(f.db.decline_pending(first).unwrap());

        // Same (channel, target) again — the partial index only covers
        // pending rows, so this must succeed.
        invite(&f, InviteTarget::User(f.invitee), 7);
    }

    #[test]
    fn accept_promotes_and_joins_in_one_step() {
        let f = setup();
        let id = invite(&f, InviteTarget::Email("carol@example.com".into()), 7);

        assert!(f.db.accept_pending(id, f.invitee, Utc::now()).unwrap());

        let row = f.db.get_invitation(id).unwrap().unwrap();
        assert_eq!(row.status, "accepted");
        assert_eq!(row.invitee_id.as_deref(), Some(f.invitee.to_string().as_str()));
        assert!(f.db.is_member(f.channel, f.invitee).unwrap());
    }

    #[test]
    fn accept_is_idempotent_for_existing_members() {
        let f = setup();
        let now = Utc::now();
        f.db.add_member(f.channel, f.invitee, Role::Member, now).unwrap();

        let id = invite(&f, InviteTarget::User(f.invitee), 7);
        assert!(f.db.accept_pending(id, f.invitee, now).unwrap());

        let row = f.db.get_invitation(id).unwrap().unwrap();
        assert_eq!(row.status, "accepted");
        let members = f.db.list_members(f.channel).unwrap();
        assert_eq!(
            members.iter().filter(|m| m.user_id == f.invitee.to_string()).count(),
            1
        );
    }

    #[test]
    fn terminal_rows_lose_the_cas() {
        let f = setup();
        let id = invite(&f, InviteTarget::User(f.invitee), 7);

        assert!(f.db.decline_pending(id).unwrap());
        assert!(!f.db.accept_pending(id, f.invitee, Utc::now()).unwrap());
        assert!(!f.db.decline_pending(id).unwrap());
        assert!(!f.db.expire_pending(id).unwrap());

        let row = f.db.get_invitation(id).unwrap().unwrap();
        assert_eq!(row.status, "declined");
    }

    #[test]
    fn sweep_is_idempotent_and_skips_terminal_rows() {
        let f = setup();
        let now = Utc::now();

        // One already past due, one fresh, one declined.
        let stale = invite(&f, InviteTarget::User(f.invitee), -1);
        invite(&f, InviteTarget::Email("fresh@example.com".into()), 7);
        let declined = invite(&f, InviteTarget::Email("gone@example.com".into()), -2);
        f.db.decline_pending(declined).unwrap();

        assert_eq!(f.db.expire_before(now).unwrap(), 1);
        assert_eq!(f.db.expire_before(now).unwrap(), 0);

        let row = f.db.get_invitation(stale).unwrap().unwrap();
        assert_eq!(row.status, "expired");
        let row = f.db.get_invitation(declined).unwrap().unwrap();
        assert_eq!(row.status, "declined");
    }

    #[test]
    fn cancellation_frees_the_pending_slot() {
        let f = setup();
        let id = invite(&f, InviteTarget::User(f.invitee), 7);

        assert!(f.db.delete_pending(id).unwrap());
        assert!(f.db.get_invitation(id).unwrap().is_none());

        // Slot is free again.
        invite(&f, InviteTarget::User(f.invitee), 7);
    }

    #[test]
    fn inbox_merges_id_and_email_targets() {
        let f = setup();
        let now = Utc::now();
        let by_id = invite(&f, InviteTarget::User(f.invitee), 7);
        let by_email = invite(&f, InviteTarget::Email("carol@example.com".into()), 7);
        invite(&f, InviteTarget::Email("other@example.com".into()), 7);

        // A past-due invitation in another channel stays out of the inbox
        // even before any sweep has run.
        let side_channel = Uuid::new_v4();
        f.db.create_channel(side_channel, "archive", now).unwrap();
        f.db.insert_invitation(
            Uuid::new_v4(),
            side_channel,
            f.admin,
            &InviteTarget::User(f.invitee),
            now - Duration::days(1),
            now - Duration::days(8),
        )
        .unwrap();

        let inbox = f.db.pending_inbox(f.invitee, "carol@example.com", now).unwrap();
        let ids: Vec<String> = inbox.iter().map(|r| r.id.clone()).collect();
        assert_eq!(inbox.len(), 2);
        assert!(ids.contains(&by_id.to_string()));
        assert!(ids.contains(&by_email.to_string()));
        assert_eq!(inbox[0].channel_name, "design");
        assert_eq!(inbox[0].inviter_name, "admin");
    }
}
