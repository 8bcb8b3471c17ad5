//! Core transaction engine types
//!
//! This module provides the building blocks shared by every backend: values
//! and result sets, the driver interface, transactions and statements, and
//! the database handle that ties them together.

pub mod config;
pub mod database;
pub mod driver;
pub mod error;
pub mod execution_mode;
pub(crate) mod queue;
pub mod result_set;
pub mod statement;
pub mod transaction;
pub mod value;

// Re-export commonly used types
pub use config::{DatabaseConfig, MEMORY_DATABASE};
pub use database::{Database, TransactionOutcome};
pub use driver::{Completion, Driver, DriverRequest, Job};
pub use error::{DatabaseError, Result, SqlErrorCode};
pub use execution_mode::ExecutionMode;
pub use result_set::{RawResult, ResultSet};
pub use statement::SqlStatement;
pub use transaction::{SqlTransaction, TransactionCallbacks, TransactionPhase};
pub use value::{Row, SqlValue};
