//! Shared fixtures for the service-layer tests.
#![allow(dead_code)] // not every test binary uses every helper

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use cove_core::{App, Notifier};
use cove_db::Database;
use cove_types::models::{Invitation, User};

/// Notifier that records every send for assertions.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(String, Uuid)>>,
}

impl Notifier for RecordingNotifier {
    fn send_invitation(
        &self,
        to: &str,
        invitation: &Invitation,
        _channel_name: &str,
    ) -> anyhow::Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), invitation.id));
        Ok(())
    }
}

/// Notifier whose transport is down.
pub struct FailingNotifier;

impl Notifier for FailingNotifier {
    fn send_invitation(
        &self,
        _to: &str,
        _invitation: &Invitation,
        _channel_name: &str,
    ) -> anyhow::Result<()> {
        anyhow::bail!("smtp connection refused")
    }
}

pub struct Fixture {
    pub app: App,
    pub notifier: Arc<RecordingNotifier>,
}

pub fn fixture() -> Fixture {
    let notifier = Arc::new(RecordingNotifier::default());
    let app = App::new(
        Database::open_in_memory().expect("in-memory db"),
        notifier.clone(),
    );
    Fixture { app, notifier }
}

pub fn fixture_with_failing_notifier() -> App {
    App::new(
        Database::open_in_memory().expect("in-memory db"),
        Arc::new(FailingNotifier),
    )
}

pub fn make_user(app: &App, name: &str, email: &str, now: DateTime<Utc>) -> User {
    app.register(name, email, None, now).expect("register user")
}
