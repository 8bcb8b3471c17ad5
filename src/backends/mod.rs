//! Database backend implementations
//!
//! This module contains the SQLite implementations of the Driver trait: one
//! running statements inline, one running them on a serialized worker queue.

#[cfg(feature = "sqlite")]
pub mod queued_sqlite;
#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "sqlite")]
pub use queued_sqlite::QueuedSqliteDriver;
#[cfg(feature = "sqlite")]
pub use sqlite::{open_connection, SqliteDriver};
