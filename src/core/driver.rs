//! Backend driver interface
//!
//! A driver is the only thing the transaction controller knows about the
//! engine. Each implementation decides *when* a request completes: the
//! synchronous driver calls the completion before `execute` returns, the queued
//! driver calls it later from its worker. The controller is written against
//! this trait once and behaves the same with either.

use super::error::Result;
use super::execution_mode::ExecutionMode;
use super::result_set::RawResult;
use super::value::SqlValue;

/// Continuation receiving the outcome of one request
pub type Completion = Box<dyn FnOnce(Result<RawResult>) + Send + 'static>;

/// Unit of work handed to [`Driver::schedule`]
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// One statement to run against the engine
#[derive(Debug, Clone, PartialEq)]
pub struct DriverRequest {
    /// SQL text
    pub sql: String,
    /// Positional bind parameters
    pub params: Vec<SqlValue>,
    /// Reject the statement if it would write
    pub read_only: bool,
}

impl DriverRequest {
    /// Create a read-write request
    pub fn new(sql: impl Into<String>, params: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
            read_only: false,
        }
    }

    /// Transaction control statement (BEGIN, COMMIT, ROLLBACK)
    pub fn control(sql: &str) -> Self {
        Self::new(sql, Vec::new())
    }

    /// Mark the request as part of a read-only transaction
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }
}

/// Capability surface every backend provides
///
/// # Contract
///
/// - `execute` calls `done` exactly once, even when the request cannot be run
///   (the error is passed instead).
/// - Requests complete in submission order.
/// - `schedule` runs `job` after every request submitted before it has
///   completed. For a synchronous driver that means right away.
pub trait Driver: Send + Sync {
    /// Execution model of this driver
    fn mode(&self) -> ExecutionMode;

    /// Run one statement and report the outcome through `done`
    fn execute(&self, request: DriverRequest, done: Completion);

    /// Run `job` in this driver's completion order
    fn schedule(&self, job: Job);
}
