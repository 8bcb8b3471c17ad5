//! Queued SQLite database backend implementation
//!
//! The connection lives on a dedicated worker thread. Every statement and
//! every scheduled job is sent to that worker through one FIFO channel, so all
//! work on the connection is serialized in submission order and completions
//! fire on the worker, after the submitting call has returned.

use super::sqlite::{open_connection, run_statement};
use crate::core::{
    config::DatabaseConfig,
    driver::{Completion, Driver, DriverRequest, Job},
    error::{DatabaseError, Result},
    execution_mode::ExecutionMode,
};
use rusqlite::Connection;
use std::panic::{self, AssertUnwindSafe};
use tokio::sync::mpsc;

/// Commands processed by the connection worker
enum WorkerCommand {
    /// Run a statement and hand the outcome to the completion
    Execute {
        request: DriverRequest,
        done: Completion,
    },
    /// Run a job once everything queued before it has finished
    Run(Job),
    /// Stop accepting work; commands already queued are refused
    Shutdown,
}

/// SQLite driver backed by a serialized operation queue
///
/// # Example
///
/// ```no_run
/// use rust_websql::backends::QueuedSqliteDriver;
/// use rust_websql::{Database, DatabaseConfig};
/// use std::sync::Arc;
///
/// # fn example() -> rust_websql::Result<()> {
/// let driver = QueuedSqliteDriver::open(&DatabaseConfig::new("app.db"))?;
/// let db = Database::from_driver("app.db", Arc::new(driver));
/// # Ok(())
/// # }
/// ```
pub struct QueuedSqliteDriver {
    sender: mpsc::UnboundedSender<WorkerCommand>,
}

impl QueuedSqliteDriver {
    /// Move `connection` onto a new worker thread
    ///
    /// The worker stops, closing the connection, once the driver is dropped
    /// and every queued command has run.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the worker thread cannot be spawned.
    pub fn spawn(connection: Connection, name: &str) -> Result<Self> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let label = name.to_string();

        std::thread::Builder::new()
            .name(format!("websql-worker:{}", name))
            .spawn(move || run_worker(receiver, connection, label))?;

        Ok(Self { sender })
    }

    /// Open a connection as described by `config` and start its worker
    ///
    /// # Errors
    ///
    /// Returns a connection error if the database cannot be opened.
    pub fn open(config: &DatabaseConfig) -> Result<Self> {
        let connection = open_connection(config)?;
        Self::spawn(connection, &config.name)
    }

    /// Whether the worker is still accepting commands
    pub fn is_running(&self) -> bool {
        !self.sender.is_closed()
    }

    /// Stop the worker once the commands queued so far have been handled
    ///
    /// Statements queued behind the shutdown complete with
    /// [`DatabaseError::QueueClosed`]; later ones fail the same way.
    pub fn shutdown(&self) {
        let _ = self.sender.send(WorkerCommand::Shutdown);
    }
}

fn run_worker(
    mut receiver: mpsc::UnboundedReceiver<WorkerCommand>,
    connection: Connection,
    name: String,
) {
    log::debug!("worker for '{}' started", name);

    while let Some(command) = receiver.blocking_recv() {
        match command {
            WorkerCommand::Execute { request, done } => {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    let result = run_statement(&connection, &request);
                    done(result);
                }));
                if outcome.is_err() {
                    log::error!("worker for '{}': completion of `{}` panicked", name, request.sql);
                }
            }
            WorkerCommand::Run(job) => {
                if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                    log::error!("worker for '{}': scheduled job panicked", name);
                }
            }
            WorkerCommand::Shutdown => {
                receiver.close();
                break;
            }
        }
    }

    // Refuse whatever was queued behind the shutdown
    while let Ok(command) = receiver.try_recv() {
        match command {
            WorkerCommand::Execute { request, done } => done(Err(closed(&request))),
            WorkerCommand::Run(job) => {
                let _ = panic::catch_unwind(AssertUnwindSafe(job));
            }
            WorkerCommand::Shutdown => {}
        }
    }

    if !connection.is_autocommit() {
        log::warn!("worker for '{}' closing with an open transaction, rolling back", name);
        let _ = connection.execute_batch("ROLLBACK");
    }
    log::debug!("worker for '{}' stopped", name);
}

fn closed(request: &DriverRequest) -> DatabaseError {
    DatabaseError::queue_closed(format!("worker stopped before `{}` could run", request.sql))
}

impl Driver for QueuedSqliteDriver {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Queued
    }

    fn execute(&self, request: DriverRequest, done: Completion) {
        if let Err(mpsc::error::SendError(command)) =
            self.sender.send(WorkerCommand::Execute { request, done })
        {
            if let WorkerCommand::Execute { request, done } = command {
                done(Err(closed(&request)));
            }
        }
    }

    fn schedule(&self, job: Job) {
        // With the worker gone the job still has to run so the transaction
        // it starts can fail through `execute` and report its outcome
        if let Err(mpsc::error::SendError(command)) = self.sender.send(WorkerCommand::Run(job)) {
            if let WorkerCommand::Run(job) = command {
                log::warn!("worker stopped; running scheduled job inline");
                job();
            }
        }
    }
}
