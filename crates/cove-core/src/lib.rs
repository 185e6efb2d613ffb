//! Service layer over the store: the invitation orchestrator plus the
//! channel, membership, account, message, DM and pin operations.
//!
//! Every operation takes the acting user and, where time matters, the
//! current instant as explicit parameters — there is no ambient "current
//! user" or wall-clock read inside the core, which keeps it testable
//! without a simulated request environment.

pub mod accounts;
pub mod channels;
pub mod direct_messages;
pub mod invitations;
pub mod members;
pub mod messages;
pub mod notifier;
pub mod pins;
pub mod resolver;

use std::sync::Arc;

use chrono::Duration;

use cove_db::Database;

pub use cove_types::api::{
    InboxEntry, InviteBatchOutcome, InviteFailure, InviteSpec, RespondAction,
};
pub use cove_types::error::CoreError;
pub use notifier::{LogNotifier, Notifier};

/// Default invitation lifetime.
const INVITE_TTL_DAYS: i64 = 7;

pub struct App {
    db: Database,
    notifier: Arc<dyn Notifier>,
    invite_ttl: Duration,
}

impl App {
    pub fn new(db: Database, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            db,
            notifier,
            invite_ttl: Duration::days(INVITE_TTL_DAYS),
        }
    }

    pub fn with_invite_ttl(mut self, ttl: Duration) -> Self {
        self.invite_ttl = ttl;
        self
    }

    pub fn db(&self) -> &Database {
        &self.db
    }
}
