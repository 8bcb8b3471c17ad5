//! Statement requests queued on a transaction

use super::error::DatabaseError;
use super::result_set::ResultSet;
use super::transaction::SqlTransaction;
use super::value::SqlValue;

/// Called with the owning transaction and the statement's result set
pub type StatementSuccess = Box<dyn FnOnce(&SqlTransaction, ResultSet) + Send + 'static>;

/// Called with the error that failed the statement
pub type StatementFailure = Box<dyn FnOnce(&DatabaseError) + Send + 'static>;

/// One SQL statement with its bind parameters and callbacks
///
/// # Example
///
/// ```
/// use rust_websql::{sql_params, SqlStatement};
///
/// let statement = SqlStatement::new("INSERT INTO users (name) VALUES (?)")
///     .params(sql_params!["Alice"])
///     .on_success(|_tx, rs| println!("inserted row {:?}", rs.insert_id()))
///     .on_error(|e| eprintln!("insert failed: {}", e));
/// assert_eq!(statement.sql(), "INSERT INTO users (name) VALUES (?)");
/// ```
pub struct SqlStatement {
    pub(crate) sql: String,
    pub(crate) params: Vec<SqlValue>,
    pub(crate) on_success: Option<StatementSuccess>,
    pub(crate) on_error: Option<StatementFailure>,
}

impl SqlStatement {
    /// Create a statement without parameters or callbacks
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
            on_success: None,
            on_error: None,
        }
    }

    /// Set the positional bind parameters
    pub fn params(mut self, params: Vec<SqlValue>) -> Self {
        self.params = params;
        self
    }

    /// Append one bind parameter
    pub fn bind(mut self, value: impl Into<SqlValue>) -> Self {
        self.params.push(value.into());
        self
    }

    /// Callback fired when the statement succeeds
    pub fn on_success<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(&SqlTransaction, ResultSet) + Send + 'static,
    {
        self.on_success = Some(Box::new(callback));
        self
    }

    /// Callback fired when the statement fails
    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(&DatabaseError) + Send + 'static,
    {
        self.on_error = Some(Box::new(callback));
        self
    }

    /// SQL text
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Bind parameters
    pub fn bound_params(&self) -> &[SqlValue] {
        &self.params
    }
}

impl std::fmt::Debug for SqlStatement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlStatement")
            .field("sql", &self.sql)
            .field("params", &self.params)
            .field("on_success", &self.on_success.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}
