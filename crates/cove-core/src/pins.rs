use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use cove_types::error::CoreError;
use cove_types::models::PinnedMessage;

use crate::App;

impl App {
    /// Pin a message in its channel. Members only; a message can be pinned
    /// once per channel.
    pub fn pin_message(
        &self,
        message_id: Uuid,
        channel_id: Uuid,
        actor_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        if !self.db.is_member(channel_id, actor_id)? {
            return Err(CoreError::Unauthorized);
        }

        let message = self.db.get_message(message_id)?.ok_or(CoreError::NotFound)?;
        if message.deleted_at.is_some() {
            return Err(CoreError::NotFound);
        }
        if message.channel_id != channel_id.to_string() {
            return Err(CoreError::Validation(
                "message does not belong to this channel".into(),
            ));
        }

        self.db
            .insert_pin(Uuid::new_v4(), message_id, channel_id, actor_id, now)?;

        info!(message_id = %message_id, channel_id = %channel_id, "message pinned");
        Ok(())
    }

    pub fn unpin_message(
        &self,
        message_id: Uuid,
        channel_id: Uuid,
        actor_id: Uuid,
    ) -> Result<(), CoreError> {
        if !self.db.is_member(channel_id, actor_id)? {
            return Err(CoreError::Unauthorized);
        }

        if !self.db.delete_pin(message_id, channel_id)? {
            return Err(CoreError::NotFound);
        }
        Ok(())
    }

    pub fn pinned_messages(
        &self,
        channel_id: Uuid,
        actor_id: Uuid,
    ) -> Result<Vec<PinnedMessage>, CoreError> {
        if !self.db.is_member(channel_id, actor_id)? {
            return Err(CoreError::Unauthorized);
        }

        let rows = self.db.pins_for_channel(channel_id)?;
        Ok(rows.into_iter().map(|r| r.into_pin()).collect())
    }

    pub fn is_pinned(
        &self,
        message_id: Uuid,
        channel_id: Uuid,
        actor_id: Uuid,
    ) -> Result<bool, CoreError> {
        if !self.db.is_member(channel_id, actor_id)? {
            return Err(CoreError::Unauthorized);
        }

        Ok(self.db.is_pinned(message_id, channel_id)?)
    }
}
