//! Library providing the storage and blog logic behind Quill.
//!
//! Quill is a multi-user blog. This crate holds everything that does not
//! depend on HTTP: the data model, the two interchangeable storage
//! backends (a relational SQLite store and an in-process document store),
//! schema migrations, post filters, pagination, slugs, password hashing,
//! form validation, authorization and the [`actions`] that combine them.
#![deny(missing_docs)]

use thiserror::Error as ThisError;

pub mod actions;
pub mod auth;
pub mod db;
pub mod forms;
pub mod migrations;
pub mod models;
pub mod page;
pub mod password;
pub mod query;
pub mod slug;
pub mod validate;

pub use models::{Category, Comment, Id, NewComment, NewPost, NewUser, Post, Tag, User};
pub use page::{Page, PageRequest, PageWindow};
pub use query::{CommentFilter, PostFilter};
pub use validate::FormErrors;

/// Result type that uses [`crate::Error`].
pub type Result<T> = std::result::Result<T, crate::Error>;

/// Quill errors.
#[allow(missing_docs)]
#[derive(Debug, ThisError)]
pub enum Error {
    #[error("No such object exists")]
    NoSuchObject,
    #[error("Not authorized to modify this object")]
    NotAuthorized,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Validation failed: {0}")]
    Validation(FormErrors),
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),
    #[error("Unknown backend {0}")]
    UnknownBackend(String),
    #[error("Unknown connect string {0}")]
    UnknownConnectString(String),
    #[error("Migration error {0}")]
    MigrationError(String),
    #[error("Operation {0} is not supported by backend {1}")]
    Unsupported(&'static str, &'static str),
    #[error("Password hashing error {0}")]
    Password(String),
    #[error("Store lock was poisoned by a panicking writer")]
    PoisonedConnection,
    #[error("Internal logic error {0}")]
    Internal(String),
    #[error("(De)serialization error {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("IO error {0}")]
    IO(#[from] std::io::Error),
    #[cfg(feature = "sqlite")]
    #[error("Sqlite error {0}")]
    SQLite(rusqlite::Error),
    #[cfg(feature = "r2d2")]
    #[error("Connection pool error {0}")]
    Pool(#[from] r2d2::Error),
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        match e.sqlite_error_code() {
            Some(rusqlite::ErrorCode::ConstraintViolation) => {
                let detail = match &e {
                    rusqlite::Error::SqliteFailure(_, Some(msg)) => msg.clone(),
                    _ => e.to_string(),
                };
                // Foreign key failures are also constraint violations but
                // mean a referenced row is missing.
                if detail.contains("FOREIGN KEY") {
                    Error::NoSuchObject
                } else {
                    Error::UniqueViolation(detail)
                }
            }
            _ => Error::SQLite(e),
        }
    }
}

impl From<argon2::password_hash::Error> for Error {
    fn from(e: argon2::password_hash::Error) -> Self {
        Error::Password(e.to_string())
    }
}
