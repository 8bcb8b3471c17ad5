//! Transaction controller
//!
//! A [`SqlTransaction`] collects statements while its builder runs, then an
//! `Execution` drives them through the bound [`Driver`]:
//!
//! ```text
//! Open -> Scheduled -> Executing -> Committed | RolledBack | Failed
//! ```
//!
//! Read-write transactions are bracketed by `BEGIN` / `COMMIT`; the first
//! failing statement stops dispatch and the transaction is rolled back.
//! Read-only transactions send neither. Whatever the driver's execution model,
//! the transaction-level callback fires exactly once, after the last statement
//! resolved.

use super::driver::{Driver, DriverRequest};
use super::error::{DatabaseError, Result};
use super::queue::TransactionQueue;
use super::result_set::{adapt, RawResult};
use super::statement::{SqlStatement, StatementFailure, StatementSuccess};
use super::value::SqlValue;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Lifecycle of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionPhase {
    /// The builder is registering statements
    Open,
    /// Registration finished; waiting for the connection
    Scheduled,
    /// Statements are being dispatched
    Executing,
    /// Every statement succeeded (and COMMIT did, for read-write)
    Committed,
    /// A read-write transaction failed and was rolled back
    RolledBack,
    /// Failed without a BEGIN to undo (read-only, or BEGIN itself failed)
    Failed,
}

impl TransactionPhase {
    /// Whether the transaction has resolved
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionPhase::Committed | TransactionPhase::RolledBack | TransactionPhase::Failed
        )
    }
}

/// Transaction-level callbacks
///
/// ```
/// use rust_websql::TransactionCallbacks;
///
/// let callbacks = TransactionCallbacks::new()
///     .on_error(|e| eprintln!("transaction failed: {}", e))
///     .on_success(|| println!("committed"));
/// # drop(callbacks);
/// ```
#[derive(Default)]
pub struct TransactionCallbacks {
    on_error: Option<Box<dyn FnOnce(DatabaseError) + Send + 'static>>,
    on_success: Option<Box<dyn FnOnce() + Send + 'static>>,
}

impl TransactionCallbacks {
    /// No callbacks; outcomes are dropped
    pub fn new() -> Self {
        Self::default()
    }

    /// Called once with the error that failed the transaction
    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(DatabaseError) + Send + 'static,
    {
        self.on_error = Some(Box::new(callback));
        self
    }

    /// Called once after the transaction completed without error
    pub fn on_success<F>(mut self, callback: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.on_success = Some(Box::new(callback));
        self
    }
}

impl std::fmt::Debug for TransactionCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionCallbacks")
            .field("on_error", &self.on_error.is_some())
            .field("on_success", &self.on_success.is_some())
            .finish()
    }
}

struct TransactionState {
    phase: TransactionPhase,
    statements: VecDeque<SqlStatement>,
    error: Option<DatabaseError>,
    callbacks: TransactionCallbacks,
}

struct TransactionInner {
    id: u64,
    read_only: bool,
    state: Mutex<TransactionState>,
}

/// Handle to one transaction, passed to the builder and to statement callbacks
///
/// Cloning is cheap; all clones refer to the same transaction.
#[derive(Clone)]
pub struct SqlTransaction {
    inner: Arc<TransactionInner>,
}

impl SqlTransaction {
    pub(crate) fn new(id: u64, read_only: bool, callbacks: TransactionCallbacks) -> Self {
        Self {
            inner: Arc::new(TransactionInner {
                id,
                read_only,
                state: Mutex::new(TransactionState {
                    phase: TransactionPhase::Open,
                    statements: VecDeque::new(),
                    error: None,
                    callbacks,
                }),
            }),
        }
    }

    /// Identifier, unique per database handle
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Whether this is a read-only transaction
    pub fn is_read_only(&self) -> bool {
        self.inner.read_only
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> TransactionPhase {
        self.inner.state.lock().phase
    }

    /// Queue a statement with positional parameters and no callbacks
    ///
    /// # Errors
    ///
    /// Returns a transaction error unless called from the builder or from a
    /// callback of this transaction while it executes.
    pub fn execute_sql(&self, sql: impl Into<String>, params: Vec<SqlValue>) -> Result<()> {
        self.execute(SqlStatement::new(sql).params(params))
    }

    /// Queue a statement built with [`SqlStatement`]
    ///
    /// # Errors
    ///
    /// Same as [`execute_sql`](Self::execute_sql).
    pub fn execute(&self, statement: SqlStatement) -> Result<()> {
        let mut state = self.inner.state.lock();
        match state.phase {
            TransactionPhase::Open | TransactionPhase::Executing => {
                state.statements.push_back(statement);
                Ok(())
            }
            phase => Err(DatabaseError::transaction(format!(
                "cannot queue `{}` on transaction {} in phase {:?}",
                statement.sql, self.inner.id, phase
            ))),
        }
    }

    /// Number of statements queued but not yet dispatched
    pub fn pending_statements(&self) -> usize {
        self.inner.state.lock().statements.len()
    }

    pub(crate) fn set_phase(&self, phase: TransactionPhase) {
        self.inner.state.lock().phase = phase;
    }

    /// Record a failure; the first error is the one reported
    pub(crate) fn fail(&self, error: DatabaseError) {
        let mut state = self.inner.state.lock();
        if state.error.is_none() {
            state.error = Some(error);
        } else {
            log::debug!(
                "transaction {}: additional error after failure: {}",
                self.inner.id,
                error
            );
        }
    }

    pub(crate) fn has_failed(&self) -> bool {
        self.inner.state.lock().error.is_some()
    }

    fn next_statement(&self) -> Option<SqlStatement> {
        self.inner.state.lock().statements.pop_front()
    }

    /// Move to a terminal phase and fire the transaction-level callback
    fn complete(&self, phase: TransactionPhase) {
        let (error, callbacks, skipped) = {
            let mut state = self.inner.state.lock();
            if state.phase.is_terminal() {
                return;
            }
            state.phase = phase;
            let skipped = state.statements.len();
            state.statements.clear();
            (state.error.take(), std::mem::take(&mut state.callbacks), skipped)
        };

        let outcome = match error {
            Some(error) => {
                log::warn!(
                    "transaction {} {:?} ({} statement(s) skipped): {}",
                    self.inner.id,
                    phase,
                    skipped,
                    error
                );
                callbacks.on_error.map(|callback| catch_callback(move || callback(error)))
            }
            None => {
                log::debug!("transaction {} {:?}", self.inner.id, phase);
                callbacks.on_success.map(catch_callback)
            }
        };

        if let Some(Err(message)) = outcome {
            log::error!(
                "transaction {}: transaction callback panicked: {}",
                self.inner.id,
                message
            );
        }
    }

    /// Resolve without running user callbacks, for a transaction torn down
    /// by a panic
    fn abandon(&self, phase: TransactionPhase) {
        let mut state = self.inner.state.lock();
        if state.phase.is_terminal() {
            return;
        }
        state.phase = phase;
        state.statements.clear();
        state.callbacks = TransactionCallbacks::default();
        log::error!("transaction {} abandoned while unwinding", self.inner.id);
    }
}

/// Run a user callback, turning a panic into its message
fn catch_callback<F: FnOnce()>(callback: F) -> std::result::Result<(), String> {
    panic::catch_unwind(AssertUnwindSafe(callback)).map_err(panic_message)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl std::fmt::Debug for SqlTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("SqlTransaction")
            .field("id", &self.inner.id)
            .field("read_only", &self.inner.read_only)
            .field("phase", &state.phase)
            .field("pending", &state.statements.len())
            .finish()
    }
}

/// Request currently owned by the driver
enum InFlight {
    Begin,
    Statement {
        sql: String,
        on_success: Option<StatementSuccess>,
        on_error: Option<StatementFailure>,
    },
    Commit,
    Rollback,
}

/// Meeting point between `drive` and a completion
///
/// A completion that arrives while `drive` is still inside `execute` parks its
/// result here and the loop picks it up; one that arrives after `drive`
/// returned resumes driving itself. Synchronous drivers therefore run a whole
/// transaction in one loop instead of recursing once per statement.
enum Handoff {
    Waiting,
    Ready(InFlight, Result<RawResult>),
    Detached,
}

/// Runs one scheduled transaction against the driver
///
/// If it is dropped before resolving (its completion was lost or a panic
/// unwound through it) it still releases the connection and the queue.
pub(crate) struct Execution {
    tx: SqlTransaction,
    driver: Arc<dyn Driver>,
    queue: Arc<TransactionQueue>,
    begun: AtomicBool,
    finished: AtomicBool,
}

impl Execution {
    pub(crate) fn new(
        tx: SqlTransaction,
        driver: Arc<dyn Driver>,
        queue: Arc<TransactionQueue>,
    ) -> Self {
        Self {
            tx,
            driver,
            queue,
            begun: AtomicBool::new(false),
            finished: AtomicBool::new(false),
        }
    }

    pub(crate) fn start(self: Arc<Self>) {
        self.drive(None);
    }

    fn drive(self: Arc<Self>, mut input: Option<(InFlight, Result<RawResult>)>) {
        loop {
            let (in_flight, request) = match self.advance(input.take()) {
                Some(next) => next,
                None => return,
            };

            let handoff = Arc::new(Mutex::new(Handoff::Waiting));
            let done = {
                let handoff = Arc::clone(&handoff);
                let execution = Arc::clone(&self);
                Box::new(move |result: Result<RawResult>| {
                    let mut slot = handoff.lock();
                    if matches!(*slot, Handoff::Detached) {
                        drop(slot);
                        execution.drive(Some((in_flight, result)));
                    } else {
                        *slot = Handoff::Ready(in_flight, result);
                    }
                })
            };

            self.driver.execute(request, done);

            let mut slot = handoff.lock();
            match std::mem::replace(&mut *slot, Handoff::Detached) {
                Handoff::Ready(in_flight, result) => input = Some((in_flight, result)),
                _ => return,
            }
        }
    }

    /// Consume the last completion and pick the next request, if any
    fn advance(
        &self,
        input: Option<(InFlight, Result<RawResult>)>,
    ) -> Option<(InFlight, DriverRequest)> {
        let Some((in_flight, result)) = input else {
            return self.begin();
        };

        match (in_flight, result) {
            (InFlight::Begin, Ok(_)) => {
                self.begun.store(true, Ordering::SeqCst);
                self.next_statement()
            }
            (InFlight::Begin, Err(e)) => {
                self.tx.fail(e);
                self.finish(TransactionPhase::Failed);
                None
            }
            (
                InFlight::Statement {
                    sql,
                    on_success,
                    on_error,
                },
                result,
            ) => {
                self.resolve_statement(&sql, result, on_success, on_error);
                self.next_statement()
            }
            (InFlight::Commit, Ok(_)) => {
                self.begun.store(false, Ordering::SeqCst);
                self.finish(TransactionPhase::Committed);
                None
            }
            (InFlight::Commit, Err(e)) => {
                self.tx.fail(e);
                Some((InFlight::Rollback, DriverRequest::control("ROLLBACK")))
            }
            (InFlight::Rollback, result) => {
                self.begun.store(false, Ordering::SeqCst);
                if let Err(e) = result {
                    log::error!("transaction {}: rollback failed: {}", self.tx.id(), e);
                }
                self.finish(TransactionPhase::RolledBack);
                None
            }
        }
    }

    fn begin(&self) -> Option<(InFlight, DriverRequest)> {
        self.tx.set_phase(TransactionPhase::Executing);

        // The builder itself failed; nothing was started on the connection
        if self.tx.has_failed() {
            self.finish(TransactionPhase::Failed);
            return None;
        }

        if self.tx.is_read_only() {
            self.next_statement()
        } else {
            Some((InFlight::Begin, DriverRequest::control("BEGIN")))
        }
    }

    fn next_statement(&self) -> Option<(InFlight, DriverRequest)> {
        if self.tx.has_failed() {
            if self.tx.is_read_only() {
                self.finish(TransactionPhase::Failed);
                return None;
            }
            return Some((InFlight::Rollback, DriverRequest::control("ROLLBACK")));
        }

        match self.tx.next_statement() {
            Some(statement) => {
                let SqlStatement {
                    sql,
                    params,
                    on_success,
                    on_error,
                } = statement;
                log::debug!("transaction {}: dispatching {}", self.tx.id(), sql);

                let request =
                    DriverRequest::new(sql.clone(), params).read_only(self.tx.is_read_only());
                let in_flight = InFlight::Statement {
                    sql,
                    on_success,
                    on_error,
                };
                Some((in_flight, request))
            }
            None if self.tx.is_read_only() => {
                self.finish(TransactionPhase::Committed);
                None
            }
            None => Some((InFlight::Commit, DriverRequest::control("COMMIT"))),
        }
    }

    fn resolve_statement(
        &self,
        sql: &str,
        result: Result<RawResult>,
        on_success: Option<StatementSuccess>,
        on_error: Option<StatementFailure>,
    ) {
        match result.and_then(adapt) {
            Ok(result_set) => {
                log::debug!(
                    "transaction {}: `{}` returned {} row(s), {} affected",
                    self.tx.id(),
                    sql,
                    result_set.row_count(),
                    result_set.rows_affected()
                );
                if let Some(callback) = on_success {
                    let tx = &self.tx;
                    if let Err(message) = catch_callback(move || callback(tx, result_set)) {
                        // A panicking success callback fails the transaction
                        self.tx.fail(DatabaseError::callback_panic(format!(
                            "success callback of `{}`: {}",
                            sql, message
                        )));
                    }
                }
            }
            Err(error) => {
                log::debug!("transaction {}: `{}` failed: {}", self.tx.id(), sql, error);
                if let Some(callback) = on_error {
                    if let Err(message) = catch_callback(|| callback(&error)) {
                        log::error!(
                            "transaction {}: error callback of `{}` panicked: {}",
                            self.tx.id(),
                            sql,
                            message
                        );
                    }
                }
                self.tx.fail(error);
            }
        }
    }

    fn finish(&self, phase: TransactionPhase) {
        if self.finished.swap(true, Ordering::SeqCst) {
            return;
        }
        self.tx.complete(phase);
        self.queue.finish();
    }
}

impl Drop for Execution {
    fn drop(&mut self) {
        if self.finished.load(Ordering::SeqCst) {
            return;
        }

        let phase = if self.begun.load(Ordering::SeqCst) {
            let id = self.tx.id();
            self.driver.execute(
                DriverRequest::control("ROLLBACK"),
                Box::new(move |result| {
                    if let Err(e) = result {
                        log::error!("transaction {}: rollback failed: {}", id, e);
                    }
                }),
            );
            TransactionPhase::RolledBack
        } else {
            TransactionPhase::Failed
        };

        if std::thread::panicking() {
            // User code must not run while unwinding
            self.finished.store(true, Ordering::SeqCst);
            self.tx.abandon(phase);
            self.queue.finish();
        } else {
            self.tx.fail(DatabaseError::transaction(
                "transaction dropped by its driver before it resolved",
            ));
            self.finish(phase);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::execution_mode::ExecutionMode;
    use crate::core::driver::{Completion, Job};
    use std::sync::atomic::AtomicUsize;

    /// Records every request; fails the ones whose SQL contains "FAIL"
    #[derive(Default)]
    struct ScriptedDriver {
        log: Mutex<Vec<String>>,
    }

    impl ScriptedDriver {
        fn log(&self) -> Vec<String> {
            self.log.lock().clone()
        }
    }

    impl Driver for ScriptedDriver {
        fn mode(&self) -> ExecutionMode {
            ExecutionMode::Immediate
        }

        fn execute(&self, request: DriverRequest, done: Completion) {
            self.log.lock().push(request.sql.clone());
            if request.sql.contains("FAIL") {
                done(Err(DatabaseError::statement(request.sql, "scripted failure")));
            } else {
                done(Ok(RawResult::empty()));
            }
        }

        fn schedule(&self, job: Job) {
            job();
        }
    }

    fn setup() -> (Arc<ScriptedDriver>, Arc<TransactionQueue>) {
        let driver = Arc::new(ScriptedDriver::default());
        let queue = TransactionQueue::new(driver.clone());
        (driver, queue)
    }

    #[test]
    fn test_read_write_brackets_statements() {
        let (driver, queue) = setup();
        let successes = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&successes);
        let tx = queue.create(
            false,
            TransactionCallbacks::new().on_success(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        tx.execute_sql("one", vec![]).unwrap();
        tx.execute_sql("two", vec![]).unwrap();
        queue.submit(tx.clone());

        assert_eq!(driver.log(), vec!["BEGIN", "one", "two", "COMMIT"]);
        assert_eq!(successes.load(Ordering::SeqCst), 1);
        assert_eq!(tx.phase(), TransactionPhase::Committed);
    }

    #[test]
    fn test_failure_skips_rest_and_rolls_back() {
        let (driver, queue) = setup();
        let errors = Arc::new(Mutex::new(Vec::new()));
        let skipped_success = Arc::new(AtomicUsize::new(0));

        let sink = Arc::clone(&errors);
        let tx = queue.create(
            false,
            TransactionCallbacks::new()
                .on_error(move |e| sink.lock().push(e.to_string()))
                .on_success(|| panic!("success must not fire")),
        );
        tx.execute_sql("one", vec![]).unwrap();
        tx.execute_sql("FAIL two", vec![]).unwrap();
        let counter = Arc::clone(&skipped_success);
        tx.execute(SqlStatement::new("three").on_success(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        }))
        .unwrap();
        queue.submit(tx.clone());

        assert_eq!(driver.log(), vec!["BEGIN", "one", "FAIL two", "ROLLBACK"]);
        assert_eq!(errors.lock().len(), 1);
        assert!(errors.lock()[0].contains("FAIL two"));
        assert_eq!(skipped_success.load(Ordering::SeqCst), 0);
        assert_eq!(tx.phase(), TransactionPhase::RolledBack);
    }

    #[test]
    fn test_read_only_sends_no_brackets() {
        let (driver, queue) = setup();
        let tx = queue.create(true, TransactionCallbacks::new());
        tx.execute_sql("SELECT 1", vec![]).unwrap();
        queue.submit(tx.clone());

        assert_eq!(driver.log(), vec!["SELECT 1"]);
        assert_eq!(tx.phase(), TransactionPhase::Committed);
    }

    #[test]
    fn test_read_only_failure_has_no_rollback() {
        let (driver, queue) = setup();
        let tx = queue.create(true, TransactionCallbacks::new());
        tx.execute_sql("FAIL", vec![]).unwrap();
        tx.execute_sql("SELECT 2", vec![]).unwrap();
        queue.submit(tx.clone());

        assert_eq!(driver.log(), vec!["FAIL"]);
        assert_eq!(tx.phase(), TransactionPhase::Failed);
    }

    /// Fails one control statement, and drops the completion of "lost"
    struct FailsOn {
        sql: &'static str,
        log: Mutex<Vec<String>>,
    }

    impl FailsOn {
        fn new(sql: &'static str) -> Arc<Self> {
            Arc::new(Self {
                sql,
                log: Mutex::new(Vec::new()),
            })
        }
    }

    impl Driver for FailsOn {
        fn mode(&self) -> ExecutionMode {
            ExecutionMode::Immediate
        }

        fn execute(&self, request: DriverRequest, done: Completion) {
            self.log.lock().push(request.sql.clone());
            if request.sql == "lost" {
                drop(done);
            } else if request.sql == self.sql {
                done(Err(DatabaseError::statement(request.sql, "disk I/O error")));
            } else {
                done(Ok(RawResult::empty()));
            }
        }

        fn schedule(&self, job: Job) {
            job();
        }
    }

    fn error_sink() -> (Arc<Mutex<Vec<DatabaseError>>>, TransactionCallbacks) {
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&errors);
        let callbacks = TransactionCallbacks::new().on_error(move |e| sink.lock().push(e));
        (errors, callbacks)
    }

    #[test]
    fn test_commit_failure_reports_error_once() {
        let driver = FailsOn::new("COMMIT");
        let queue = TransactionQueue::new(driver.clone());
        let (errors, callbacks) = error_sink();
        let tx = queue.create(false, callbacks);
        tx.execute_sql("INSERT", vec![]).unwrap();
        queue.submit(tx.clone());

        assert_eq!(
            *driver.log.lock(),
            vec!["BEGIN", "INSERT", "COMMIT", "ROLLBACK"]
        );
        assert_eq!(errors.lock().len(), 1);
        assert_eq!(tx.phase(), TransactionPhase::RolledBack);
    }

    #[test]
    fn test_begin_failure_fails_without_statements() {
        let driver = FailsOn::new("BEGIN");
        let queue = TransactionQueue::new(driver.clone());
        let (errors, callbacks) = error_sink();
        let tx = queue.create(false, callbacks);
        tx.execute_sql("INSERT", vec![]).unwrap();
        queue.submit(tx.clone());

        assert_eq!(*driver.log.lock(), vec!["BEGIN"]);
        assert_eq!(errors.lock().len(), 1);
        assert!(errors.lock()[0].to_string().contains("disk I/O error"));
        assert_eq!(tx.phase(), TransactionPhase::Failed);
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn test_lost_completion_rolls_back_and_releases_queue() {
        let driver = FailsOn::new("");
        let queue = TransactionQueue::new(driver.clone());
        let (errors, callbacks) = error_sink();
        let tx = queue.create(false, callbacks);
        tx.execute_sql("lost", vec![]).unwrap();
        tx.execute_sql("never", vec![]).unwrap();
        queue.submit(tx.clone());

        assert_eq!(*driver.log.lock(), vec!["BEGIN", "lost", "ROLLBACK"]);
        assert!(matches!(errors.lock()[0], DatabaseError::TransactionError(_)));
        assert_eq!(tx.phase(), TransactionPhase::RolledBack);

        let next = queue.create(true, TransactionCallbacks::new());
        next.execute_sql("after", vec![]).unwrap();
        queue.submit(next.clone());
        assert_eq!(next.phase(), TransactionPhase::Committed);
    }

    #[test]
    fn test_panicking_callbacks_do_not_stall_the_queue() {
        let (driver, queue) = setup();

        let first = queue.create(
            true,
            TransactionCallbacks::new().on_success(|| panic!("transaction callback")),
        );
        first.execute_sql("one", vec![]).unwrap();
        queue.submit(first.clone());
        assert_eq!(first.phase(), TransactionPhase::Committed);

        let (errors, callbacks) = error_sink();
        let second = queue.create(false, callbacks);
        second
            .execute(SqlStatement::new("two").on_success(|_, _| panic!("statement callback")))
            .unwrap();
        second.execute_sql("three", vec![]).unwrap();
        queue.submit(second.clone());

        assert_eq!(second.phase(), TransactionPhase::RolledBack);
        assert!(matches!(errors.lock()[0], DatabaseError::CallbackPanic(_)));
        assert!(errors.lock()[0].to_string().contains("statement callback"));

        let successes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&successes);
        let third = queue.create(
            true,
            TransactionCallbacks::new().on_success(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        queue.submit(third);

        assert_eq!(successes.load(Ordering::SeqCst), 1);
        assert_eq!(queue.pending(), 0);
        assert_eq!(
            driver.log(),
            vec!["one", "BEGIN", "two", "ROLLBACK"]
        );
    }

    #[test]
    fn test_statement_callback_can_queue_more() {
        let (driver, queue) = setup();
        let tx = queue.create(false, TransactionCallbacks::new());
        tx.execute(SqlStatement::new("first").on_success(|tx, _| {
            tx.execute_sql("follow-up", vec![]).unwrap();
        }))
        .unwrap();
        tx.execute_sql("second", vec![]).unwrap();
        queue.submit(tx);

        assert_eq!(
            driver.log(),
            vec!["BEGIN", "first", "second", "follow-up", "COMMIT"]
        );
    }

    #[test]
    fn test_execute_after_completion_is_rejected() {
        let (_driver, queue) = setup();
        let tx = queue.create(true, TransactionCallbacks::new());
        queue.submit(tx.clone());

        assert!(tx.phase().is_terminal());
        let err = tx.execute_sql("SELECT 1", vec![]).unwrap_err();
        assert!(matches!(err, DatabaseError::TransactionError(_)));
    }

    #[test]
    fn test_builder_failure_skips_begin() {
        let (driver, queue) = setup();
        let errors = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&errors);
        let tx = queue.create(
            false,
            TransactionCallbacks::new().on_error(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        tx.execute_sql("never", vec![]).unwrap();
        tx.fail(DatabaseError::other("builder failed"));
        queue.submit(tx.clone());

        assert!(driver.log().is_empty());
        assert_eq!(errors.load(Ordering::SeqCst), 1);
        assert_eq!(tx.phase(), TransactionPhase::Failed);
    }
}
