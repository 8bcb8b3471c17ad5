//! # Rust WebSQL
//!
//! Transactional, callback-based SQL execution in the style of the legacy
//! browser database API, backed by an embedded SQLite engine.
//!
//! Statements are registered on a transaction by a builder closure and run in
//! registration order. The first failing statement stops the transaction; a
//! read-write transaction is bracketed by `BEGIN`/`COMMIT` and rolled back on
//! failure. Outcomes are reported through callbacks, exactly once.
//!
//! ## Features
//!
//! - **Two execution models**: `Immediate` runs statements on the calling
//!   thread; `Queued` runs them on a dedicated connection worker
//! - **One contract**: the same callback order and error short-circuit with
//!   either model
//! - **Serialized transactions**: transactions on one handle never interleave
//! - **Legacy shapes**: result sets and error codes match the legacy API
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! rust_websql = { version = "0.1", features = ["sqlite"] }
//! ```
//!
//! ### Basic Usage
//!
//! ```rust
//! use rust_websql::prelude::*;
//!
//! fn main() -> Result<()> {
//!     let db = Database::open_with(DatabaseConfig::in_memory(), |conn| {
//!         conn.execute_batch("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)")?;
//!         Ok(())
//!     })?;
//!
//!     db.transaction(
//!         |tx| {
//!             tx.execute_sql("INSERT INTO users (name) VALUES (?)", sql_params!["Alice"])?;
//!             tx.execute_sql("INSERT INTO users (name) VALUES (?)", sql_params!["Bob"])
//!         },
//!         TransactionCallbacks::new()
//!             .on_error(|e| eprintln!("insert failed: {} (code {})", e, e.code().as_u16()))
//!             .on_success(|| println!("inserted")),
//!     );
//!
//!     db.read_transaction(
//!         |tx| {
//!             tx.execute(SqlStatement::new("SELECT * FROM users").on_success(|_tx, rs| {
//!                 for row in rs.rows() {
//!                     println!("{:?}", row.get("name"));
//!                 }
//!             }))
//!         },
//!         TransactionCallbacks::new(),
//!     );
//!
//!     Ok(())
//! }
//! ```
//!
//! ### Queued Execution
//!
//! ```rust,no_run
//! use rust_websql::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = DatabaseConfig::new("app.db").with_mode(ExecutionMode::Queued);
//!     let db = Database::open(config)?;
//!
//!     db.transaction_async(|tx| {
//!         tx.execute_sql("CREATE TABLE IF NOT EXISTS kv (k TEXT PRIMARY KEY, v TEXT)", sql_params![])?;
//!         tx.execute_sql("INSERT OR REPLACE INTO kv VALUES (?, ?)", sql_params!["a", "1"])
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Project Structure
//!
//! ```text
//! rust_websql/
//! ├── src/
//! │   ├── core/                # Engine-independent types
//! │   │   ├── config.rs        # Connection configuration
//! │   │   ├── database.rs      # Database handle
//! │   │   ├── driver.rs        # Driver trait
//! │   │   ├── error.rs         # Error types and legacy codes
//! │   │   ├── execution_mode.rs
//! │   │   ├── queue.rs         # Per-connection transaction queue
//! │   │   ├── result_set.rs    # Result adapter
//! │   │   ├── statement.rs     # Statement builder
//! │   │   ├── transaction.rs   # Transaction controller
//! │   │   └── value.rs         # Values and rows
//! │   ├── backends/
//! │   │   ├── sqlite.rs        # Synchronous driver
//! │   │   └── queued_sqlite.rs # Worker-queue driver
//! │   └── lib.rs
//! ├── tests/
//! └── benches/
//! ```

/// Core transaction engine types
pub mod core;

/// Driver implementations
pub mod backends;

/// Prelude for convenient imports
///
/// ```rust
/// use rust_websql::prelude::*;
///
/// # fn main() -> Result<()> {
/// let db = Database::open(DatabaseConfig::in_memory())?;
/// assert_eq!(db.mode(), ExecutionMode::Immediate);
/// # Ok(())
/// # }
/// ```
pub mod prelude {
    pub use crate::core::{
        Database, DatabaseConfig, DatabaseError, ExecutionMode, ResultSet, Result, Row,
        SqlErrorCode, SqlStatement, SqlTransaction, SqlValue, TransactionCallbacks,
        TransactionPhase,
    };
    pub use crate::sql_params;
}

// Re-export at root level for convenience
pub use core::{
    Completion, Database, DatabaseConfig, DatabaseError, Driver, DriverRequest, ExecutionMode,
    Job, RawResult, Result, ResultSet, Row, SqlErrorCode, SqlStatement, SqlTransaction,
    SqlValue, TransactionCallbacks, TransactionOutcome, TransactionPhase, MEMORY_DATABASE,
};

#[cfg(feature = "sqlite")]
pub use backends::{QueuedSqliteDriver, SqliteDriver};
