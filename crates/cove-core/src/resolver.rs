//! Identity resolution for invitation targets.
//!
//! Classifies a requested target as a known account or a bare email before
//! anything is written. Pure reads; the same lookup decides at creation
//! time whether an invitation stores a user id or an email, and at respond
//! time whether an actor's email claims an unpromoted invitation.

use cove_types::api::InviteSpec;
use cove_types::error::CoreError;
use cove_types::models::User;

use crate::App;

#[derive(Debug, Clone)]
pub enum Resolution {
    /// The target is an existing account.
    Known(User),
    /// No account matches; the normalized email stands in until one does.
    Unresolved(String),
}

impl App {
    pub(crate) fn resolve_target(&self, spec: &InviteSpec) -> Result<Resolution, CoreError> {
        match spec {
            InviteSpec::UserId(id) => {
                let row = self.db.get_user_by_id(*id)?.ok_or(CoreError::NotFound)?;
                Ok(Resolution::Known(row.into_user()))
            }
            InviteSpec::Email(raw) => {
                let email = normalize_email(raw);
                validate_email(&email)?;

                match self.db.get_user_by_email(&email)? {
                    Some(row) => Ok(Resolution::Known(row.into_user())),
                    None => Ok(Resolution::Unresolved(email)),
                }
            }
        }
    }
}

pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Structural check only: one '@', non-empty local part, dotted domain.
/// Deliverability is the notifier's problem.
pub fn validate_email(email: &str) -> Result<(), CoreError> {
    let invalid = || CoreError::Validation(format!("not a valid email address: {email}"));

    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.is_empty() || email.contains(char::is_whitespace) {
        return Err(invalid());
    }
    let (host, tld) = domain.rsplit_once('.').ok_or_else(invalid)?;
    if host.is_empty() || tld.is_empty() {
        return Err(invalid());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_trims_and_lowercases() {
        assert_eq!(normalize_email("  Carol@Example.COM "), "carol@example.com");
    }

    #[test]
    fn structural_validation() {
        assert!(validate_email("carol@example.com").is_ok());
        assert!(validate_email("c.arol+tag@sub.example.co").is_ok());

        for bad in ["", "carol", "@example.com", "carol@", "carol@example", "a b@example.com", "carol@.com"] {
            assert!(validate_email(bad).is_err(), "{bad:?} should be rejected");
        }
    }
}
