//! Database row types — these map directly to SQLite rows.
//! Distinct from the cove-types domain models to keep the DB layer
//! independent; conversions parse ids and timestamps on the way out.

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use cove_types::api::InboxEntry;
use cove_types::models::{
    Channel, ChannelMember, DirectMessage, Invitation, InvitationStatus, InviteTarget, Message,
    PinnedMessage, Role, User,
};

/// Timestamp column format. SQLite's `datetime('now')` produces the same
/// shape, so stored values stay lexicographically comparable.
const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn fmt_ts(t: DateTime<Utc>) -> String {
    t.format(TS_FORMAT).to_string()
}

/// Parse a stored timestamp, accepting either RFC 3339 or the naive
/// `datetime('now')` shape. Corrupt values fall back to the epoch with a
/// warning rather than failing the whole query.
pub fn parse_ts(s: &str) -> DateTime<Utc> {
    s.parse::<DateTime<Utc>>()
        .or_else(|_| NaiveDateTime::parse_from_str(s, TS_FORMAT).map(|ndt| ndt.and_utc()))
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", s, e);
            DateTime::default()
        })
}

fn parse_id(s: &str, what: &str) -> Uuid {
    s.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}': {}", what, s, e);
        Uuid::default()
    })
}

pub struct UserRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub created_at: String,
}

impl UserRow {
    pub fn into_user(self) -> User {
        User {
            id: parse_id(&self.id, "user id"),
            name: self.name,
            email: self.email,
            created_at: parse_ts(&self.created_at),
        }
    }
}

pub struct ChannelRow {
    pub id: String,
    pub name: String,
    pub created_at: String,
}

impl ChannelRow {
    pub fn into_channel(self) -> Channel {
        Channel {
            id: parse_id(&self.id, "channel id"),
            name: self.name,
            created_at: parse_ts(&self.created_at),
        }
    }
}

pub struct MemberRow {
    pub channel_id: String,
    pub user_id: String,
    pub user_name: String,
    pub role: String,
    pub joined_at: String,
}

impl MemberRow {
    pub fn into_member(self) -> ChannelMember {
        ChannelMember {
            channel_id: parse_id(&self.channel_id, "channel id"),
            user_id: parse_id(&self.user_id, "user id"),
            name: self.user_name,
            role: Role::from_str(&self.role).unwrap_or_else(|| {
                warn!("Corrupt role '{}' for user '{}'", self.role, self.user_id);
                Role::Member
            }),
            joined_at: parse_ts(&self.joined_at),
        }
    }
}

pub struct InvitationRow {
    pub id: String,
    pub channel_id: String,
    pub inviter_id: String,
    pub invitee_id: Option<String>,
    pub invitee_email: Option<String>,
    pub status: String,
    pub expires_at: String,
    pub created_at: String,
}

impl InvitationRow {
    pub fn into_invitation(self) -> Invitation {
        // A non-null invitee_id means the target is (or has been promoted
        // to) a concrete account; the email column is only authoritative
        // before promotion.
        let target = match &self.invitee_id {
            Some(id) => InviteTarget::User(parse_id(id, "invitee id")),
            None => InviteTarget::Email(self.invitee_email.clone().unwrap_or_else(|| {
                warn!("Invitation '{}' has neither invitee_id nor email", self.id);
                String::new()
            })),
        };

        Invitation {
            id: parse_id(&self.id, "invitation id"),
            channel_id: parse_id(&self.channel_id, "channel id"),
            inviter_id: parse_id(&self.inviter_id, "inviter id"),
            target,
            status: InvitationStatus::from_str(&self.status).unwrap_or_else(|| {
                warn!("Corrupt status '{}' on invitation '{}'", self.status, self.id);
                InvitationStatus::Expired
            }),
            expires_at: parse_ts(&self.expires_at),
            created_at: parse_ts(&self.created_at),
        }
    }
}

pub struct InboxRow {
    pub id: String,
    pub channel_id: String,
    pub channel_name: String,
    pub inviter_id: String,
    pub inviter_name: String,
    pub expires_at: String,
    pub created_at: String,
}

impl InboxRow {
    pub fn into_entry(self) -> InboxEntry {
        InboxEntry {
            id: parse_id(&self.id, "invitation id"),
            channel_id: parse_id(&self.channel_id, "channel id"),
            channel_name: self.channel_name,
            inviter_id: parse_id(&self.inviter_id, "inviter id"),
            inviter_name: self.inviter_name,
            expires_at: parse_ts(&self.expires_at),
            created_at: parse_ts(&self.created_at),
        }
    }
}

pub struct MessageRow {
    pub id: String,
    pub channel_id: String,
    pub author_id: String,
    pub author_name: String,
    pub content: String,
    pub created_at: String,
    pub edited_at: Option<String>,
    pub deleted_at: Option<String>,
}

impl MessageRow {
    pub fn into_message(self) -> Message {
        Message {
            id: parse_id(&self.id, "message id"),
            channel_id: parse_id(&self.channel_id, "channel id"),
            author_id: parse_id(&self.author_id, "author id"),
            author_name: self.author_name,
            content: self.content,
            created_at: parse_ts(&self.created_at),
            edited_at: self.edited_at.as_deref().map(parse_ts),
        }
    }
}

pub struct DirectMessageRow {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    pub read_at: Option<String>,
    pub created_at: String,
}

impl DirectMessageRow {
    pub fn into_direct_message(self) -> DirectMessage {
        DirectMessage {
            id: parse_id(&self.id, "dm id"),
            sender_id: parse_id(&self.sender_id, "sender id"),
            receiver_id: parse_id(&self.receiver_id, "receiver id"),
            content: self.content,
            read_at: self.read_at.as_deref().map(parse_ts),
            created_at: parse_ts(&self.created_at),
        }
    }
}

pub struct PinRow {
    pub id: String,
    pub message_id: String,
    pub channel_id: String,
    pub content: String,
    pub author_name: String,
    pub pinned_by: String,
    pub pinned_by_name: String,
    pub pinned_at: String,
}

impl PinRow {
    pub fn into_pin(self) -> PinnedMessage {
        PinnedMessage {
            id: parse_id(&self.id, "pin id"),
            message_id: parse_id(&self.message_id, "message id"),
            channel_id: parse_id(&self.channel_id, "channel id"),
            content: self.content,
            author_name: self.author_name,
            pinned_by: parse_id(&self.pinned_by, "pinner id"),
            pinned_by_name: self.pinned_by_name,
            pinned_at: parse_ts(&self.pinned_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_roundtrip_through_the_column_format() {
        let now = Utc::now();
        let parsed = parse_ts(&fmt_ts(now));
        assert_eq!(parsed.timestamp(), now.timestamp());
    }

    #[test]
    fn sqlite_default_timestamps_parse() {
        let t = parse_ts("2026-08-07 12:30:00");
        assert_eq!(fmt_ts(t), "2026-08-07 12:30:00");
    }
}
