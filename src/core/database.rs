//! Database handle
//!
//! [`Database`] is the entry point of the legacy API: it owns the connection
//! (through its driver) and starts transactions on it.

use super::driver::Driver;
use super::error::{DatabaseError, Result};
use super::execution_mode::ExecutionMode;
use super::queue::TransactionQueue;
use super::transaction::{SqlTransaction, TransactionCallbacks};
use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use tokio::sync::oneshot;

#[cfg(feature = "sqlite")]
use super::config::DatabaseConfig;

/// Handle to one database connection
///
/// Clones share the connection and its transaction queue: transactions from
/// any clone run one at a time, in the order they were started.
///
/// # Example
///
/// ```rust
/// use rust_websql::prelude::*;
///
/// # fn main() -> Result<()> {
/// let db = Database::open(DatabaseConfig::in_memory())?;
///
/// db.transaction(
///     |tx| {
///         tx.execute_sql("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)", sql_params![])?;
///         tx.execute_sql("INSERT INTO users (name) VALUES (?)", sql_params!["Alice"])?;
///         Ok(())
///     },
///     TransactionCallbacks::new().on_error(|e| eprintln!("failed: {}", e)),
/// );
///
/// db.read_transaction(
///     |tx| {
///         tx.execute(SqlStatement::new("SELECT * FROM users").on_success(|_tx, rs| {
///             assert_eq!(rs.row_count(), 1);
///         }))
///     },
///     TransactionCallbacks::new(),
/// );
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Database {
    name: Arc<str>,
    queue: Arc<TransactionQueue>,
}

impl Database {
    /// Open the database described by `config`
    ///
    /// # Errors
    ///
    /// Returns a connection error if the database cannot be opened.
    #[cfg(feature = "sqlite")]
    pub fn open(config: DatabaseConfig) -> Result<Self> {
        Self::open_with(config, |_| Ok(()))
    }

    /// Open the database and run `on_create` once with the raw connection
    /// before any transaction can start
    ///
    /// # Errors
    ///
    /// Returns the connection error, or the error returned by `on_create`.
    #[cfg(feature = "sqlite")]
    pub fn open_with<F>(config: DatabaseConfig, on_create: F) -> Result<Self>
    where
        F: FnOnce(&rusqlite::Connection) -> Result<()>,
    {
        use crate::backends::{open_connection, QueuedSqliteDriver, SqliteDriver};

        let connection = open_connection(&config)?;
        on_create(&connection)?;

        let driver: Arc<dyn Driver> = match config.mode {
            ExecutionMode::Immediate => Arc::new(SqliteDriver::new(connection)),
            ExecutionMode::Queued => Arc::new(QueuedSqliteDriver::spawn(connection, &config.name)?),
        };

        log::info!("opened database '{}' ({} mode)", config.name, config.mode);
        Ok(Self::from_driver(config.name, driver))
    }

    /// Bind a handle to an already constructed driver
    pub fn from_driver(name: impl Into<String>, driver: Arc<dyn Driver>) -> Self {
        let name: String = name.into();
        Self {
            name: Arc::from(name),
            queue: TransactionQueue::new(driver),
        }
    }

    /// Name the database was opened with
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Execution model of the bound driver
    pub fn mode(&self) -> ExecutionMode {
        self.queue.driver().mode()
    }

    /// Transactions waiting for the connection
    pub fn pending_transactions(&self) -> usize {
        self.queue.pending()
    }

    /// Start a read-write transaction
    ///
    /// `builder` runs immediately and registers statements. If it returns an
    /// error no statement runs and `callbacks.on_error` receives that error.
    /// Outcomes are reported only through callbacks.
    pub fn transaction<F>(&self, builder: F, callbacks: TransactionCallbacks)
    where
        F: FnOnce(&SqlTransaction) -> Result<()>,
    {
        self.start(false, builder, callbacks);
    }

    /// Start a read-only transaction: no BEGIN/COMMIT is sent and statements
    /// that would write fail
    pub fn read_transaction<F>(&self, builder: F, callbacks: TransactionCallbacks)
    where
        F: FnOnce(&SqlTransaction) -> Result<()>,
    {
        self.start(true, builder, callbacks);
    }

    /// Start a read-write transaction and get a future for its outcome
    ///
    /// The transaction is registered when this is called, not when the future
    /// is first polled.
    pub fn transaction_async<F>(&self, builder: F) -> TransactionOutcome
    where
        F: FnOnce(&SqlTransaction) -> Result<()>,
    {
        self.start_async(false, builder)
    }

    /// Start a read-only transaction and get a future for its outcome
    pub fn read_transaction_async<F>(&self, builder: F) -> TransactionOutcome
    where
        F: FnOnce(&SqlTransaction) -> Result<()>,
    {
        self.start_async(true, builder)
    }

    fn start<F>(&self, read_only: bool, builder: F, callbacks: TransactionCallbacks)
    where
        F: FnOnce(&SqlTransaction) -> Result<()>,
    {
        let tx = self.queue.create(read_only, callbacks);
        if let Err(e) = builder(&tx) {
            log::debug!("transaction {}: builder failed: {}", tx.id(), e);
            tx.fail(e);
        }
        self.queue.submit(tx);
    }

    fn start_async<F>(&self, read_only: bool, builder: F) -> TransactionOutcome
    where
        F: FnOnce(&SqlTransaction) -> Result<()>,
    {
        let (sender, receiver) = oneshot::channel();
        let sender = Arc::new(Mutex::new(Some(sender)));
        let on_error = Arc::clone(&sender);

        let callbacks = TransactionCallbacks::new()
            .on_error(move |e| {
                if let Some(sender) = on_error.lock().take() {
                    let _ = sender.send(Err(e));
                }
            })
            .on_success(move || {
                if let Some(sender) = sender.lock().take() {
                    let _ = sender.send(Ok(()));
                }
            });
        self.start(read_only, builder, callbacks);

        TransactionOutcome { receiver }
    }
}

/// Future resolving to the outcome of a transaction started with
/// [`Database::transaction_async`] or [`Database::read_transaction_async`]
#[derive(Debug)]
#[must_use = "the outcome is only observed by awaiting it"]
pub struct TransactionOutcome {
    receiver: oneshot::Receiver<Result<()>>,
}

impl Future for TransactionOutcome {
    type Output = Result<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let outcome = ready!(Pin::new(&mut self.receiver).poll(cx));
        Poll::Ready(outcome.unwrap_or_else(|_| {
            Err(DatabaseError::transaction(
                "transaction dropped before it completed",
            ))
        }))
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.name)
            .field("mode", &self.mode())
            .field("pending_transactions", &self.pending_transactions())
            .finish()
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use crate::core::statement::SqlStatement;
    use crate::core::transaction::TransactionPhase;
    use crate::core::value::SqlValue;
    use crate::sql_params;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn users(mode: ExecutionMode) -> Database {
        Database::open_with(DatabaseConfig::in_memory().with_mode(mode), |conn| {
            conn.execute_batch("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)")?;
            Ok(())
        })
        .unwrap()
    }

    #[test]
    fn test_creation_callback_runs_once_before_return() {
        let calls = AtomicUsize::new(0);
        let db = Database::open_with(DatabaseConfig::in_memory(), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(db.name(), ":memory:");
        assert_eq!(db.mode(), ExecutionMode::Immediate);
    }

    #[test]
    fn test_creation_callback_error_fails_open() {
        let result = Database::open_with(DatabaseConfig::in_memory(), |_| {
            Err(DatabaseError::other("bootstrap failed"))
        });
        assert!(matches!(result, Err(DatabaseError::Other(_))));
    }

    #[test]
    fn test_immediate_callbacks_fire_before_return() {
        let db = users(ExecutionMode::Immediate);
        let done = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&done);
        db.transaction(
            |tx| tx.execute_sql("INSERT INTO users (name) VALUES (?)", sql_params!["Alice"]),
            TransactionCallbacks::new().on_success(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        assert_eq!(done.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_builder_error_reaches_error_callback() {
        let db = users(ExecutionMode::Immediate);
        let seen = Arc::new(Mutex::new(None));

        let sink = Arc::clone(&seen);
        db.transaction(
            |tx| {
                tx.execute_sql("INSERT INTO users (name) VALUES ('never')", sql_params![])?;
                Err(DatabaseError::other("validation failed"))
            },
            TransactionCallbacks::new().on_error(move |e| *sink.lock() = Some(e.to_string())),
        );

        assert_eq!(seen.lock().as_deref(), Some("validation failed"));

        let count = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&count);
        db.read_transaction(
            |tx| {
                tx.execute(
                    SqlStatement::new("SELECT COUNT(*) AS n FROM users").on_success(
                        move |_, rs| *sink.lock() = rs.item(0).and_then(|r| r.get("n").cloned()),
                    ),
                )
            },
            TransactionCallbacks::new(),
        );
        assert_eq!(*count.lock(), Some(SqlValue::Integer(0)));
    }

    #[test]
    fn test_statement_handle_rejects_late_registration() {
        let db = users(ExecutionMode::Immediate);
        let kept = Arc::new(Mutex::new(None));

        let slot = Arc::clone(&kept);
        db.read_transaction(
            move |tx| {
                *slot.lock() = Some(tx.clone());
                Ok(())
            },
            TransactionCallbacks::new(),
        );

        let tx = kept.lock().take().unwrap();
        assert_eq!(tx.phase(), TransactionPhase::Committed);
        assert!(tx.execute_sql("SELECT 1", sql_params![]).is_err());
    }

    #[tokio::test]
    async fn test_async_outcomes_in_both_modes() {
        for mode in [ExecutionMode::Immediate, ExecutionMode::Queued] {
            let db = users(mode);

            db.transaction_async(|tx| {
                tx.execute_sql("INSERT INTO users (id, name) VALUES (1, 'Alice')", sql_params![])
            })
            .await
            .unwrap();

            let err = db
                .transaction_async(|tx| {
                    tx.execute_sql("INSERT INTO users (id, name) VALUES (1, 'Dup')", sql_params![])
                })
                .await
                .unwrap_err();
            assert_eq!(err.code(), crate::core::error::SqlErrorCode::Constraint);

            db.read_transaction_async(|tx| tx.execute_sql("SELECT * FROM users", sql_params![]))
                .await
                .unwrap();
        }
    }
}
