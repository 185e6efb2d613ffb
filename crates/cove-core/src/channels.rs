use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use cove_types::error::CoreError;
use cove_types::models::{Channel, Role};

use crate::App;

const MAX_CHANNEL_NAME: usize = 255;

impl App {
    /// Creates a channel and seats the creator as its admin.
    pub fn create_channel(
        &self,
        name: &str,
        creator_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Channel, CoreError> {
        let name = valid_channel_name(name)?;

        let id = Uuid::new_v4();
        self.db.create_channel(id, name, now)?;
        self.db.add_member(id, creator_id, Role::Admin, now)?;

        info!(channel_id = %id, name, creator = %creator_id, "channel created");

        Ok(Channel {
            id,
            name: name.to_string(),
            created_at: now,
        })
    }

    /// Renames a channel; the name stays globally unique.
    pub fn rename_channel(
        &self,
        channel_id: Uuid,
        actor_id: Uuid,
        name: &str,
    ) -> Result<(), CoreError> {
        let name = valid_channel_name(name)?;

        if !self.db.channel_exists(channel_id)? {
            return Err(CoreError::NotFound);
        }
        if !self.db.is_admin(channel_id, actor_id)? {
            return Err(CoreError::Unauthorized);
        }

        self.db.rename_channel(channel_id, name)?;
        info!(channel_id = %channel_id, name, "channel renamed");
        Ok(())
    }

    /// Deletes a channel; memberships, invitations, messages and pins
    /// cascade away. This is the one path that may remove the last admin.
    pub fn delete_channel(&self, channel_id: Uuid, actor_id: Uuid) -> Result<(), CoreError> {
        if !self.db.channel_exists(channel_id)? {
            return Err(CoreError::NotFound);
        }
        if !self.db.is_admin(channel_id, actor_id)? {
            return Err(CoreError::Unauthorized);
        }

        self.db.delete_channel(channel_id)?;
        info!(channel_id = %channel_id, deleted_by = %actor_id, "channel deleted");
        Ok(())
    }

    /// The channels the user belongs to.
    pub fn channels_for(&self, user_id: Uuid) -> Result<Vec<Channel>, CoreError> {
        let rows = self.db.channels_for_user(user_id)?;
        Ok(rows.into_iter().map(|r| r.into_channel()).collect())
    }
}

fn valid_channel_name(name: &str) -> Result<&str, CoreError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CoreError::Validation("channel name must not be empty".into()));
    }
    if name.len() > MAX_CHANNEL_NAME {
        return Err(CoreError::Validation(format!(
            "channel name must be at most {MAX_CHANNEL_NAME} characters"
        )));
    }
    Ok(name)
}
