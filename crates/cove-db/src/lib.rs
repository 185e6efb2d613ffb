pub mod migrations;
pub mod models;

mod channels;
mod direct_messages;
mod invitations;
mod members;
mod messages;
mod pins;
mod users;

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use thiserror::Error;
use tracing::info;

use cove_types::error::CoreError;

/// Storage-layer errors.
///
/// Lives here rather than in cove-types because the rusqlite conversion
/// needs the driver in scope. Service code flattens this into `CoreError`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("row not found")]
    NotFound,
    #[error("already a member of this channel")]
    AlreadyMember,
    #[error("not a member of this channel")]
    NotAMember,
    #[error("a pending invitation already exists for this target")]
    DuplicatePending,
    #[error("invitation is not pending")]
    InvalidTransition,
    #[error("channel would be left without an admin")]
    LastAdminViolation,
    #[error("message is already pinned in this channel")]
    AlreadyPinned,
    #[error("name already taken: {0}")]
    NameTaken(String),
    #[error("email already registered: {0}")]
    EmailTaken(String),
    #[error("database lock poisoned")]
    LockPoisoned,
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound | StoreError::NotAMember => CoreError::NotFound,
            StoreError::AlreadyMember => CoreError::AlreadyMember,
            StoreError::DuplicatePending => CoreError::DuplicatePending,
            StoreError::InvalidTransition => CoreError::InvalidTransition,
            StoreError::LastAdminViolation => CoreError::LastAdminViolation,
            StoreError::AlreadyPinned => {
                CoreError::Validation("message is already pinned".into())
            }
            StoreError::NameTaken(name) => {
                CoreError::Validation(format!("name already taken: {name}"))
            }
            StoreError::EmailTaken(email) => {
                CoreError::Validation(format!("email already registered: {email}"))
            }
            StoreError::LockPoisoned | StoreError::Sqlite(_) => {
                CoreError::Internal(err.to_string())
            }
        }
    }
}

/// True when the error is a UNIQUE or PRIMARY KEY constraint failure.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

/// True when the error is a FOREIGN KEY constraint failure — the referenced
/// channel or user row is gone.
pub(crate) fn is_fk_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY
    )
}

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::configure(&conn)?;

        info!("Database opened at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory database for tests; same pragmas and schema as `open`.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::configure(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn configure(conn: &Connection) -> Result<(), StoreError> {
        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        migrations::run(conn)?;
        Ok(())
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError>,
    {
        let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        f(&conn)
    }

    /// Mutable access, for operations that need a transaction.
    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StoreError>,
    {
        let mut conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        f(&mut conn)
    }
}

/// Extension trait for optional query results
pub(crate) trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>, StoreError>;
}

impl<T> OptionalExt<T> for Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>, StoreError> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
