use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;
use crate::models::Invitation;

// -- Invitations --

/// An invitation target as requested by a caller, before identity
/// resolution. A `UserId` must name an existing account; an `Email` may or
/// may not — that distinction is the resolver's job, not the caller's.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum InviteSpec {
    UserId(Uuid),
    Email(String),
}

impl std::fmt::Display for InviteSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InviteSpec::UserId(id) => write!(f, "user {id}"),
            InviteSpec::Email(email) => write!(f, "{email}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InviteFailure {
    pub target: InviteSpec,
    pub error: CoreError,
}

/// Partial-success result of a batch invite: every target is processed
/// independently and failures never abort the rest of the batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InviteBatchOutcome {
    pub invited: Vec<Invitation>,
    pub errors: Vec<InviteFailure>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RespondAction {
    Accept,
    Decline,
}

/// A pending invitation as seen from the invitee's side, with the channel
/// and inviter names resolved for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboxEntry {
    pub id: Uuid,
    pub channel_id: Uuid,
    pub channel_name: String,
    pub inviter_id: Uuid,
    pub inviter_name: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
