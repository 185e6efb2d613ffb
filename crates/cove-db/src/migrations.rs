use rusqlite::Connection;
use tracing::info;

use crate::StoreError;

pub fn run(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY,
            name        TEXT NOT NULL,
            email       TEXT NOT NULL UNIQUE,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS channels (
            id          TEXT PRIMARY KEY,
            name        TEXT NOT NULL UNIQUE,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS channel_members (
            channel_id  TEXT NOT NULL REFERENCES channels(id) ON DELETE CASCADE,
            user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            role        TEXT NOT NULL DEFAULT 'member'
                        CHECK (role IN ('member', 'admin')),
            joined_at   TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (channel_id, user_id)
        );

        CREATE INDEX IF NOT EXISTS idx_members_channel_role
            ON channel_members(channel_id, role);

        CREATE TABLE IF NOT EXISTS invitations (
            id            TEXT PRIMARY KEY,
            channel_id    TEXT NOT NULL REFERENCES channels(id) ON DELETE CASCADE,
            inviter_id    TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            invitee_id    TEXT REFERENCES users(id) ON DELETE CASCADE,
            invitee_email TEXT,
            status        TEXT NOT NULL DEFAULT 'pending'
                          CHECK (status IN ('pending', 'accepted', 'declined', 'expired')),
            expires_at    TEXT NOT NULL,
            created_at    TEXT NOT NULL DEFAULT (datetime('now')),
            CHECK (invitee_id IS NOT NULL OR invitee_email IS NOT NULL)
        );

        -- At most one pending invitation per (channel, target). Scoped to
        -- status='pending' so declined/expired rows never block a re-invite.
        CREATE UNIQUE INDEX IF NOT EXISTS idx_invitations_pending_user
            ON invitations(channel_id, invitee_id)
            WHERE status = 'pending' AND invitee_id IS NOT NULL;

        CREATE UNIQUE INDEX IF NOT EXISTS idx_invitations_pending_email
            ON invitations(channel_id, invitee_email)
            WHERE status = 'pending' AND invitee_id IS NULL;

        CREATE INDEX IF NOT EXISTS idx_invitations_channel
            ON invitations(channel_id, status);
        CREATE INDEX IF NOT EXISTS idx_invitations_invitee
            ON invitations(invitee_id, status);
        CREATE INDEX IF NOT EXISTS idx_invitations_email
            ON invitations(invitee_email, status);

        CREATE TABLE IF NOT EXISTS messages (
            id          TEXT PRIMARY KEY,
            channel_id  TEXT NOT NULL REFERENCES channels(id) ON DELETE CASCADE,
            author_id   TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            content     TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            edited_at   TEXT,
            deleted_at  TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_messages_channel
            ON messages(channel_id, created_at);

        CREATE TABLE IF NOT EXISTS direct_messages (
            id          TEXT PRIMARY KEY,
            sender_id   TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            receiver_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            content     TEXT NOT NULL,
            read_at     TEXT,
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            deleted_at  TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_dm_pair
            ON direct_messages(sender_id, receiver_id, created_at);
        CREATE INDEX IF NOT EXISTS idx_dm_receiver
            ON direct_messages(receiver_id, sender_id);

        CREATE TABLE IF NOT EXISTS pinned_messages (
            id          TEXT PRIMARY KEY,
            message_id  TEXT NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
            channel_id  TEXT NOT NULL REFERENCES channels(id) ON DELETE CASCADE,
            pinned_by   TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            pinned_at   TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(message_id, channel_id)
        );

        CREATE INDEX IF NOT EXISTS idx_pins_channel
            ON pinned_messages(channel_id);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
