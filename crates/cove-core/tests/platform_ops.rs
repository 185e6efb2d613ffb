//! Service-level tests for channels, memberships, messages, direct
//! messages and pins.

mod common;

use chrono::{Duration, Utc};

use common::{fixture, make_user};
use cove_core::CoreError;
use cove_types::models::Role;

#[test]
fn channel_names_are_unique_across_create_and_rename() {
    let f = fixture();
    let now = Utc::now();
    let alice = make_user(&f.app, "alice", "alice@example.com", now);

    f.app.create_channel("design", alice.id, now).unwrap();
    let err = f.app.create_channel("design", alice.id, now).unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));

    let ops = f.app.create_channel("ops", alice.id, now).unwrap();
    let err = f.app.rename_channel(ops.id, alice.id, "design").unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));

    f.app.rename_channel(ops.id, alice.id, "operations").unwrap();
}

#[test]
fn creator_becomes_admin_and_the_last_admin_cannot_leave() {
    let f = fixture();
    let now = Utc::now();
    let alice = make_user(&f.app, "alice", "alice@example.com", now);
    let bob = make_user(&f.app, "bob", "bob@example.com", now);
    let channel = f.app.create_channel("design", alice.id, now).unwrap();

    let members = f.app.members(channel.id, alice.id).unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].role, Role::Admin);

    f.app
        .add_member(channel.id, alice.id, bob.id, Role::Member, now)
        .unwrap();

    let err = f.app.leave_channel(channel.id, alice.id).unwrap_err();
    assert_eq!(err, CoreError::LastAdminViolation);

    // Handing the role off unblocks the exit.
    f.app
        .set_member_role(channel.id, alice.id, bob.id, Role::Admin)
        .unwrap();
    f.app.leave_channel(channel.id, alice.id).unwrap();

    let members = f.app.members(channel.id, bob.id).unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].user_id, bob.id);
}

#[test]
fn deleting_a_channel_removes_every_membership() {
    let f = fixture();
    let now = Utc::now();
    let alice = make_user(&f.app, "alice", "alice@example.com", now);
    let bob = make_user(&f.app, "bob", "bob@example.com", now);
    let channel = f.app.create_channel("design", alice.id, now).unwrap();
    f.app
        .add_member(channel.id, alice.id, bob.id, Role::Member, now)
        .unwrap();

    let err = f.app.delete_channel(channel.id, bob.id).unwrap_err();
    assert_eq!(err, CoreError::Unauthorized);

    // The sole admin may delete outright even though they could not leave.
    f.app.delete_channel(channel.id, alice.id).unwrap();
    assert!(f.app.channels_for(bob.id).unwrap().is_empty());
    assert_eq!(
        f.app.members(channel.id, alice.id).unwrap_err(),
        CoreError::NotFound
    );
}

#[test]
fn posting_requires_membership_and_editing_requires_authorship() {
    let f = fixture();
    let now = Utc::now();
    let alice = make_user(&f.app, "alice", "alice@example.com", now);
    let bob = make_user(&f.app, "bob", "bob@example.com", now);
    let channel = f.app.create_channel("design", alice.id, now).unwrap();

    let err = f
        .app
        .post_message(channel.id, bob.id, "hello", now)
        .unwrap_err();
    assert_eq!(err, CoreError::Unauthorized);

    let message = f.app.post_message(channel.id, alice.id, "hello", now).unwrap();
    assert_eq!(message.author_name, "alice");

    f.app
        .add_member(channel.id, alice.id, bob.id, Role::Member, now)
        .unwrap();
    let err = f
        .app
        .edit_message(message.id, bob.id, "hijacked", now)
        .unwrap_err();
    assert_eq!(err, CoreError::Unauthorized);

    let edited = f
        .app
        .edit_message(message.id, alice.id, "hello, world", now + Duration::minutes(1))
        .unwrap();
    assert_eq!(edited.content, "hello, world");
    assert!(edited.edited_at.is_some());
}

#[test]
fn soft_deleted_messages_can_be_restored_by_their_author() {
    let f = fixture();
    let now = Utc::now();
    let alice = make_user(&f.app, "alice", "alice@example.com", now);
    let channel = f.app.create_channel("design", alice.id, now).unwrap();
    let message = f.app.post_message(channel.id, alice.id, "oops", now).unwrap();

    f.app.delete_message(message.id, alice.id, now).unwrap();
    assert!(f.app.messages(channel.id, alice.id, 50, None).unwrap().is_empty());

    // Editing a deleted message is a miss, not a resurrection.
    let err = f
        .app
        .edit_message(message.id, alice.id, "new text", now)
        .unwrap_err();
    assert_eq!(err, CoreError::NotFound);

    let restored = f.app.restore_message(message.id, alice.id).unwrap();
    assert_eq!(restored.content, "oops");
    assert_eq!(f.app.messages(channel.id, alice.id, 50, None).unwrap().len(), 1);
}

#[test]
fn message_search_is_member_only() {
    let f = fixture();
    let now = Utc::now();
    let alice = make_user(&f.app, "alice", "alice@example.com", now);
    let bob = make_user(&f.app, "bob", "bob@example.com", now);
    let channel = f.app.create_channel("design", alice.id, now).unwrap();
    f.app.post_message(channel.id, alice.id, "ship the release", now).unwrap();

    let err = f
        .app
        .search_messages(channel.id, bob.id, "release", 10)
        .unwrap_err();
    assert_eq!(err, CoreError::Unauthorized);

    let hits = f.app.search_messages(channel.id, alice.id, "release", 10).unwrap();
    assert_eq!(hits.len(), 1);
    assert!(f.app.search_messages(channel.id, alice.id, "  ", 10).unwrap().is_empty());
}

#[test]
fn direct_messages_reject_self_and_unknown_receivers() {
    let f = fixture();
    let now = Utc::now();
    let alice = make_user(&f.app, "alice", "alice@example.com", now);
    let bob = make_user(&f.app, "bob", "bob@example.com", now);

    let err = f
        .app
        .send_direct_message(alice.id, alice.id, "hi me", now)
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));

    let err = f
        .app
        .send_direct_message(alice.id, uuid::Uuid::new_v4(), "hi", now)
        .unwrap_err();
    assert_eq!(err, CoreError::NotFound);

    f.app.send_direct_message(alice.id, bob.id, "hi bob", now).unwrap();
    f.app
        .send_direct_message(bob.id, alice.id, "hi alice", now + Duration::seconds(1))
        .unwrap();

    let convo = f.app.conversation(alice.id, bob.id, 50).unwrap();
    assert_eq!(convo.len(), 2);
    assert_eq!(convo[0].content, "hi bob");

    assert_eq!(f.app.unread_direct_messages(bob.id).unwrap(), 1);
    assert_eq!(
        f.app
            .mark_conversation_read(bob.id, alice.id, now + Duration::minutes(1))
            .unwrap(),
        1
    );
    assert_eq!(f.app.unread_direct_messages(bob.id).unwrap(), 0);
}

#[test]
fn senders_may_take_back_their_own_direct_messages() {
    let f = fixture();
    let now = Utc::now();
    let alice = make_user(&f.app, "alice", "alice@example.com", now);
    let bob = make_user(&f.app, "bob", "bob@example.com", now);

    let dm = f.app.send_direct_message(alice.id, bob.id, "typo", now).unwrap();

    let err = f.app.delete_direct_message(dm.id, bob.id, now).unwrap_err();
    assert_eq!(err, CoreError::Unauthorized);

    f.app.delete_direct_message(dm.id, alice.id, now).unwrap();
    assert!(f.app.conversation(alice.id, bob.id, 50).unwrap().is_empty());
}

#[test]
fn pins_are_member_only_and_unique_per_channel() {
    let f = fixture();
    let now = Utc::now();
    let alice = make_user(&f.app, "alice", "alice@example.com", now);
    let bob = make_user(&f.app, "bob", "bob@example.com", now);
    let channel = f.app.create_channel("design", alice.id, now).unwrap();
    let message = f.app.post_message(channel.id, alice.id, "important", now).unwrap();

    let err = f
        .app
        .pin_message(message.id, channel.id, bob.id, now)
        .unwrap_err();
    assert_eq!(err, CoreError::Unauthorized);

    f.app.pin_message(message.id, channel.id, alice.id, now).unwrap();
    let err = f
        .app
        .pin_message(message.id, channel.id, alice.id, now)
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));

    assert!(f.app.is_pinned(message.id, channel.id, alice.id).unwrap());
    let pins = f.app.pinned_messages(channel.id, alice.id).unwrap();
    assert_eq!(pins.len(), 1);
    assert_eq!(pins[0].content, "important");
    assert_eq!(pins[0].pinned_by_name, "alice");

    f.app.unpin_message(message.id, channel.id, alice.id).unwrap();
    let err = f
        .app
        .unpin_message(message.id, channel.id, alice.id)
        .unwrap_err();
    assert_eq!(err, CoreError::NotFound);
}

#[test]
fn pinning_checks_the_message_channel_pair() {
    let f = fixture();
    let now = Utc::now();
    let alice = make_user(&f.app, "alice", "alice@example.com", now);
    let design = f.app.create_channel("design", alice.id, now).unwrap();
    let ops = f.app.create_channel("ops", alice.id, now).unwrap();
    let message = f.app.post_message(design.id, alice.id, "design note", now).unwrap();

    let err = f
        .app
        .pin_message(message.id, ops.id, alice.id, now)
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));
}
