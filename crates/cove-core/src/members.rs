//! Membership operations: joining is invitation-driven (see
//! `invitations`); everything here is management — listing, leaving,
//! removal, role changes. The minimum-one-admin rule itself lives in the
//! store; this layer adds the authorization checks.

use tracing::info;
use uuid::Uuid;

use chrono::{DateTime, Utc};
use cove_types::error::CoreError;
use cove_types::models::{ChannelMember, Role};

use crate::App;

impl App {
    pub fn members(&self, channel_id: Uuid, actor_id: Uuid) -> Result<Vec<ChannelMember>, CoreError> {
        if !self.db.channel_exists(channel_id)? {
            return Err(CoreError::NotFound);
        }
        if !self.db.is_member(channel_id, actor_id)? {
            return Err(CoreError::Unauthorized);
        }

        let rows = self.db.list_members(channel_id)?;
        Ok(rows.into_iter().map(|r| r.into_member()).collect())
    }

    /// Leave a channel. The sole admin of a channel that still has other
    /// members cannot leave — transfer the role or delete the channel.
    pub fn leave_channel(&self, channel_id: Uuid, actor_id: Uuid) -> Result<(), CoreError> {
        if !self.db.channel_exists(channel_id)? {
            return Err(CoreError::NotFound);
        }

        self.db.remove_member(channel_id, actor_id)?;

        info!(user_id = %actor_id, channel_id = %channel_id, "user left channel");
        Ok(())
    }

    /// Admin-only removal of another member; the same last-admin guard
    /// applies to removing a fellow admin.
    pub fn remove_member(
        &self,
        channel_id: Uuid,
        actor_id: Uuid,
        user_id: Uuid,
    ) -> Result<(), CoreError> {
        if !self.db.is_admin(channel_id, actor_id)? {
            return Err(CoreError::Unauthorized);
        }

        self.db.remove_member(channel_id, user_id)?;

        info!(
            user_id = %user_id,
            channel_id = %channel_id,
            removed_by = %actor_id,
            "member removed from channel"
        );
        Ok(())
    }

    /// Admin-only role change. Demoting the last admin is rejected by the
    /// store, so admin rights can only be handed off, never dropped.
    pub fn set_member_role(
        &self,
        channel_id: Uuid,
        actor_id: Uuid,
        user_id: Uuid,
        role: Role,
    ) -> Result<(), CoreError> {
        if !self.db.is_admin(channel_id, actor_id)? {
            return Err(CoreError::Unauthorized);
        }

        self.db.set_role(channel_id, user_id, role)?;

        info!(
            user_id = %user_id,
            channel_id = %channel_id,
            role = role.as_str(),
            changed_by = %actor_id,
            "member role changed"
        );
        Ok(())
    }

    /// Admin-only direct add, bypassing the invitation flow — the
    /// operational path for bootstrapping a channel.
    pub fn add_member(
        &self,
        channel_id: Uuid,
        actor_id: Uuid,
        user_id: Uuid,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        if !self.db.is_admin(channel_id, actor_id)? {
            return Err(CoreError::Unauthorized);
        }

        self.db.add_member(channel_id, user_id, role, now)?;

        info!(
            user_id = %user_id,
            channel_id = %channel_id,
            role = role.as_str(),
            added_by = %actor_id,
            "member added to channel"
        );
        Ok(())
    }
}
