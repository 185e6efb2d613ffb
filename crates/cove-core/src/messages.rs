use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use cove_types::error::CoreError;
use cove_types::models::Message;

use crate::App;

const MAX_MESSAGE_LEN: usize = 1000;
const MAX_PAGE: u32 = 200;

impl App {
    /// Post to a channel. Members only.
    pub fn post_message(
        &self,
        channel_id: Uuid,
        author_id: Uuid,
        content: &str,
        now: DateTime<Utc>,
    ) -> Result<Message, CoreError> {
        if !self.db.channel_exists(channel_id)? {
            return Err(CoreError::NotFound);
        }
        if !self.db.is_member(channel_id, author_id)? {
            return Err(CoreError::Unauthorized);
        }
        let content = valid_content(content)?;

        let id = Uuid::new_v4();
        self.db.insert_message(id, channel_id, author_id, content, now)?;

        let row = self.db.get_message(id)?.ok_or(CoreError::NotFound)?;
        Ok(row.into_message())
    }

    /// Channel history, newest first; `before` pages backwards from a
    /// previous page's oldest `created_at`.
    pub fn messages(
        &self,
        channel_id: Uuid,
        actor_id: Uuid,
        limit: u32,
        before: Option<&str>,
    ) -> Result<Vec<Message>, CoreError> {
        if !self.db.is_member(channel_id, actor_id)? {
            return Err(CoreError::Unauthorized);
        }

        let rows = self.db.list_messages(channel_id, limit.min(MAX_PAGE), before)?;
        Ok(rows.into_iter().map(|r| r.into_message()).collect())
    }

    /// Authors may edit their own live messages.
    pub fn edit_message(
        &self,
        message_id: Uuid,
        actor_id: Uuid,
        content: &str,
        now: DateTime<Utc>,
    ) -> Result<Message, CoreError> {
        let row = self.db.get_message(message_id)?.ok_or(CoreError::NotFound)?;
        if row.deleted_at.is_some() {
            return Err(CoreError::NotFound);
        }
        if row.author_id != actor_id.to_string() {
            return Err(CoreError::Unauthorized);
        }
        let content = valid_content(content)?;

        self.db.update_message_content(message_id, content, now)?;

        let row = self.db.get_message(message_id)?.ok_or(CoreError::NotFound)?;
        Ok(row.into_message())
    }

    /// Soft delete — the row stays for restore.
    pub fn delete_message(
        &self,
        message_id: Uuid,
        actor_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        let row = self.db.get_message(message_id)?.ok_or(CoreError::NotFound)?;
        if row.author_id != actor_id.to_string() {
            return Err(CoreError::Unauthorized);
        }

        self.db.soft_delete_message(message_id, now)?;
        info!(message_id = %message_id, "message deleted");
        Ok(())
    }

    pub fn restore_message(&self, message_id: Uuid, actor_id: Uuid) -> Result<Message, CoreError> {
        let row = self.db.get_message(message_id)?.ok_or(CoreError::NotFound)?;
        if row.author_id != actor_id.to_string() {
            return Err(CoreError::Unauthorized);
        }

        self.db.restore_message(message_id)?;

        let row = self.db.get_message(message_id)?.ok_or(CoreError::NotFound)?;
        Ok(row.into_message())
    }

    pub fn search_messages(
        &self,
        channel_id: Uuid,
        actor_id: Uuid,
        query: &str,
        limit: u32,
    ) -> Result<Vec<Message>, CoreError> {
        if !self.db.is_member(channel_id, actor_id)? {
            return Err(CoreError::Unauthorized);
        }

        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let rows = self.db.search_messages(channel_id, query, limit.min(MAX_PAGE))?;
        Ok(rows.into_iter().map(|r| r.into_message()).collect())
    }
}

fn valid_content(content: &str) -> Result<&str, CoreError> {
    if content.trim().is_empty() {
        return Err(CoreError::Validation("message must not be empty".into()));
    }
    if content.chars().count() > MAX_MESSAGE_LEN {
        return Err(CoreError::Validation(format!(
            "message must be at most {MAX_MESSAGE_LEN} characters"
        )));
    }
    Ok(content)
}
