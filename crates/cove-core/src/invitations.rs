//! Invitation orchestration.
//!
//! Coordinates the resolver, the membership store and the invitation ledger
//! for the four caller-facing flows: batch invite, respond, cancel and the
//! post-registration auto-accept, plus the inbox and the expiry sweep.

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};
use uuid::Uuid;

use cove_types::api::{InboxEntry, InviteBatchOutcome, InviteFailure, InviteSpec, RespondAction};
use cove_types::error::CoreError;
use cove_types::models::{Invitation, InvitationStatus, InviteTarget, User};

use crate::App;
use crate::resolver::{Resolution, normalize_email};

impl App {
    /// Invites a batch of targets to a channel. Admin-ship is checked once
    /// for the whole batch; after that every target stands alone — a
    /// duplicate or an already-member in the list never sinks the rest.
    pub fn invite_batch(
        &self,
        channel_id: Uuid,
        inviter_id: Uuid,
        targets: &[InviteSpec],
        now: DateTime<Utc>,
    ) -> Result<InviteBatchOutcome, CoreError> {
        let channel = self
            .db
            .get_channel(channel_id)?
            .ok_or(CoreError::NotFound)?
            .into_channel();

        if !self.db.is_admin(channel_id, inviter_id)? {
            return Err(CoreError::Unauthorized);
        }

        let mut outcome = InviteBatchOutcome::default();

        for spec in targets {
            match self.invite_one(channel_id, inviter_id, spec, now) {
                Ok((invitation, notify_to)) => {
                    // Best-effort: a failed notification is logged, never
                    // unwound into the already-committed invitation.
                    if let Err(e) =
                        self.notifier
                            .send_invitation(&notify_to, &invitation, &channel.name)
                    {
                        error!(
                            invitation_id = %invitation.id,
                            to = %notify_to,
                            error = %e,
                            "failed to send invitation email"
                        );
                    }
                    outcome.invited.push(invitation);
                }
                Err(error) => {
                    warn!(
                        channel_id = %channel_id,
                        target = %spec,
                        code = error.error_code(),
                        "invitation target skipped"
                    );
                    outcome.errors.push(InviteFailure {
                        target: spec.clone(),
                        error,
                    });
                }
            }
        }

        info!(
            channel_id = %channel_id,
            inviter_id = %inviter_id,
            invited = outcome.invited.len(),
            errors = outcome.errors.len(),
            "channel invitations processed"
        );

        Ok(outcome)
    }

    fn invite_one(
        &self,
        channel_id: Uuid,
        inviter_id: Uuid,
        spec: &InviteSpec,
        now: DateTime<Utc>,
    ) -> Result<(Invitation, String), CoreError> {
        let (target, notify_to) = match self.resolve_target(spec)? {
            Resolution::Known(user) => {
                if self.db.is_member(channel_id, user.id)? {
                    return Err(CoreError::AlreadyMember);
                }
                (InviteTarget::User(user.id), user.email)
            }
            Resolution::Unresolved(email) => (InviteTarget::Email(email.clone()), email),
        };

        let id = Uuid::new_v4();
        let expires_at = now + self.invite_ttl;
        // Duplicate-pending detection happens here, at the storage
        // constraint — a pre-check would race a concurrent create.
        self.db
            .insert_invitation(id, channel_id, inviter_id, &target, expires_at, now)?;

        let invitation = Invitation {
            id,
            channel_id,
            inviter_id,
            target,
            status: InvitationStatus::Pending,
            expires_at,
            created_at: now,
        };

        Ok((invitation, notify_to))
    }

    /// Accept or decline an invitation as `actor`. Expiry is checked lazily
    /// here, not only by the sweep: a pending-but-past-due invitation is
    /// expired on the spot and reported as such.
    pub fn respond(
        &self,
        invitation_id: Uuid,
        actor: &User,
        action: RespondAction,
        now: DateTime<Utc>,
    ) -> Result<Invitation, CoreError> {
        let invitation = self
            .db
            .get_invitation(invitation_id)?
            .ok_or(CoreError::NotFound)?
            .into_invitation();

        let addressed_to_actor = match &invitation.target {
            InviteTarget::User(user_id) => *user_id == actor.id,
            InviteTarget::Email(email) => normalize_email(&actor.email) == *email,
        };
        if !addressed_to_actor {
            return Err(CoreError::Unauthorized);
        }

        match invitation.status {
            InvitationStatus::Pending => {}
            InvitationStatus::Expired => return Err(CoreError::Expired),
            InvitationStatus::Accepted | InvitationStatus::Declined => {
                return Err(CoreError::InvalidTransition);
            }
        }

        if now > invitation.expires_at {
            self.db.expire_pending(invitation_id)?;
            return Err(CoreError::Expired);
        }

        let won = match action {
            RespondAction::Accept => self.db.accept_pending(invitation_id, actor.id, now)?,
            RespondAction::Decline => self.db.decline_pending(invitation_id)?,
        };
        if !won {
            // A sweep or another response committed first; report what the
            // row became instead of overwriting it.
            return Err(self.non_pending_error(invitation_id)?);
        }

        info!(
            invitation_id = %invitation_id,
            user_id = %actor.id,
            channel_id = %invitation.channel_id,
            action = ?action,
            "invitation response recorded"
        );

        let updated = self
            .db
            .get_invitation(invitation_id)?
            .ok_or(CoreError::NotFound)?
            .into_invitation();
        Ok(updated)
    }

    /// What to report when a CAS on `pending` found the row already moved.
    fn non_pending_error(&self, invitation_id: Uuid) -> Result<CoreError, CoreError> {
        let Some(row) = self.db.get_invitation(invitation_id)? else {
            return Ok(CoreError::NotFound);
        };
        Ok(match row.into_invitation().status {
            InvitationStatus::Expired => CoreError::Expired,
            _ => CoreError::InvalidTransition,
        })
    }

    /// Withdraw a pending invitation. Allowed for the inviter and for any
    /// admin of the channel; the row is removed outright.
    pub fn cancel(&self, invitation_id: Uuid, actor_id: Uuid) -> Result<(), CoreError> {
        let invitation = self
            .db
            .get_invitation(invitation_id)?
            .ok_or(CoreError::NotFound)?
            .into_invitation();

        if invitation.inviter_id != actor_id
            && !self.db.is_admin(invitation.channel_id, actor_id)?
        {
            return Err(CoreError::Unauthorized);
        }

        if invitation.status.is_terminal() {
            return Err(CoreError::InvalidTransition);
        }

        if !self.db.delete_pending(invitation_id)? {
            return Err(self.non_pending_error(invitation_id)?);
        }

        info!(
            invitation_id = %invitation_id,
            cancelled_by = %actor_id,
            "invitation cancelled"
        );
        Ok(())
    }

    /// Runs once after an account is created, with an optional invitation
    /// hint from the signup flow. The hinted invitation is accepted under
    /// the same rules as `respond`; any failure is swallowed — registration
    /// never fails because an invitation went stale.
    pub fn process_registration(
        &self,
        user: &User,
        invitation_hint: Option<Uuid>,
        now: DateTime<Utc>,
    ) {
        let Some(invitation_id) = invitation_hint else {
            return;
        };

        match self.respond(invitation_id, user, RespondAction::Accept, now) {
            Ok(invitation) => {
                info!(
                    invitation_id = %invitation_id,
                    user_id = %user.id,
                    channel_id = %invitation.channel_id,
                    "invitation auto-accepted after registration"
                );
            }
            Err(e) => {
                warn!(
                    invitation_id = %invitation_id,
                    user_id = %user.id,
                    code = e.error_code(),
                    "invitation auto-accept skipped"
                );
            }
        }
    }

    /// Pending, unexpired invitations addressed to the user — by account id
    /// or by email (an unpromoted invitation is still visible to the account
    /// that since claimed the address), deduplicated, newest first.
    pub fn inbox(&self, user: &User, now: DateTime<Utc>) -> Result<Vec<InboxEntry>, CoreError> {
        let rows = self
            .db
            .pending_inbox(user.id, &normalize_email(&user.email), now)?;
        Ok(rows.into_iter().map(|r| r.into_entry()).collect())
    }

    /// Every invitation for a channel, for its admins.
    pub fn invitations_for(
        &self,
        channel_id: Uuid,
        actor_id: Uuid,
    ) -> Result<Vec<Invitation>, CoreError> {
        if !self.db.channel_exists(channel_id)? {
            return Err(CoreError::NotFound);
        }
        if !self.db.is_admin(channel_id, actor_id)? {
            return Err(CoreError::Unauthorized);
        }

        let rows = self.db.invitations_for_channel(channel_id)?;
        Ok(rows.into_iter().map(|r| r.into_invitation()).collect())
    }

    /// Transition every pending invitation past its deadline to expired.
    /// Already-transitioned rows are skipped silently; running the sweep
    /// twice in a row transitions nothing the second time.
    pub fn expire_sweep(&self, now: DateTime<Utc>) -> Result<usize, CoreError> {
        let count = self.db.expire_before(now)?;
        if count > 0 {
            info!(count, "expired stale invitations");
        }
        Ok(count)
    }
}
