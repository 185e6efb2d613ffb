use chrono::{DateTime, Utc};
use uuid::Uuid;

use cove_types::error::CoreError;
use cove_types::models::DirectMessage;

use crate::App;

const MAX_DM_LEN: usize = 1000;
const MAX_PAGE: u32 = 200;

impl App {
    pub fn send_direct_message(
        &self,
        sender_id: Uuid,
        receiver_id: Uuid,
        content: &str,
        now: DateTime<Utc>,
    ) -> Result<DirectMessage, CoreError> {
        if sender_id == receiver_id {
            return Err(CoreError::Validation(
                "cannot send a direct message to yourself".into(),
            ));
        }
        if self.db.get_user_by_id(receiver_id)?.is_none() {
            return Err(CoreError::NotFound);
        }

        let content = content.trim();
        if content.is_empty() {
            return Err(CoreError::Validation("message must not be empty".into()));
        }
        if content.chars().count() > MAX_DM_LEN {
            return Err(CoreError::Validation(format!(
                "message must be at most {MAX_DM_LEN} characters"
            )));
        }

        let id = Uuid::new_v4();
        self.db
            .insert_direct_message(id, sender_id, receiver_id, content, now)?;

        let row = self
            .db
            .get_direct_message(id)?
            .ok_or(CoreError::NotFound)?;
        Ok(row.into_direct_message())
    }

    /// The conversation between the actor and a partner, oldest first.
    pub fn conversation(
        &self,
        actor_id: Uuid,
        partner_id: Uuid,
        limit: u32,
    ) -> Result<Vec<DirectMessage>, CoreError> {
        if self.db.get_user_by_id(partner_id)?.is_none() {
            return Err(CoreError::NotFound);
        }

        let rows = self.db.conversation(actor_id, partner_id, limit.min(MAX_PAGE))?;
        Ok(rows.into_iter().map(|r| r.into_direct_message()).collect())
    }

    /// Marks everything the partner sent the actor as read. Returns the
    /// number of messages stamped.
    pub fn mark_conversation_read(
        &self,
        actor_id: Uuid,
        partner_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<usize, CoreError> {
        Ok(self.db.mark_read(actor_id, partner_id, now)?)
    }

    pub fn unread_direct_messages(&self, actor_id: Uuid) -> Result<i64, CoreError> {
        Ok(self.db.unread_count(actor_id)?)
    }

    /// Senders may take back their own messages; soft delete, like channel
    /// messages.
    pub fn delete_direct_message(
        &self,
        dm_id: Uuid,
        actor_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        let row = self
            .db
            .get_direct_message(dm_id)?
            .ok_or(CoreError::NotFound)?;
        if row.sender_id != actor_id.to_string() {
            return Err(CoreError::Unauthorized);
        }

        self.db.soft_delete_direct_message(dm_id, now)?;
        Ok(())
    }
}
