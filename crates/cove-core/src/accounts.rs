use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use cove_types::error::CoreError;
use cove_types::models::User;

use crate::App;
use crate::resolver::{normalize_email, validate_email};

const MAX_NAME: usize = 255;

impl App {
    /// Creates an account and, when the signup carried an invitation hint,
    /// auto-accepts it. The account always comes into existence regardless
    /// of what happens to the invitation.
    pub fn register(
        &self,
        name: &str,
        email: &str,
        invitation_hint: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<User, CoreError> {
        let name = name.trim();
        if name.is_empty() || name.len() > MAX_NAME {
            return Err(CoreError::Validation(
                "name must be between 1 and 255 characters".into(),
            ));
        }

        let email = normalize_email(email);
        validate_email(&email)?;

        let user = User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email,
            created_at: now,
        };
        self.db.create_user(user.id, &user.name, &user.email, now)?;

        info!(user_id = %user.id, "account created");

        self.process_registration(&user, invitation_hint, now);

        Ok(user)
    }

    pub fn find_account_by_id(&self, id: Uuid) -> Result<Option<User>, CoreError> {
        Ok(self.db.get_user_by_id(id)?.map(|r| r.into_user()))
    }

    pub fn find_account_by_email(&self, email: &str) -> Result<Option<User>, CoreError> {
        Ok(self
            .db
            .get_user_by_email(&normalize_email(email))?
            .map(|r| r.into_user()))
    }
}
