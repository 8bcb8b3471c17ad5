//! Database handle configuration

use super::execution_mode::ExecutionMode;
use serde::{Deserialize, Serialize};

/// Name that opens a private in-memory store
pub const MEMORY_DATABASE: &str = ":memory:";

/// Configuration for opening a [`Database`](crate::Database) handle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// File name, or `":memory:"` for an in-memory store
    pub name: String,
    /// How statements reach the engine
    pub mode: ExecutionMode,
    /// Enforce foreign key constraints on the connection
    pub foreign_keys: bool,
    /// Journal mode pragma applied at open (engine default when `None`)
    pub journal_mode: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            name: MEMORY_DATABASE.to_string(),
            mode: ExecutionMode::default(),
            foreign_keys: true,
            journal_mode: None,
        }
    }
}

impl DatabaseConfig {
    /// Create a configuration for the named database
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Configuration for a private in-memory database
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Set the execution mode
    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Enable or disable foreign key enforcement
    pub fn with_foreign_keys(mut self, enabled: bool) -> Self {
        self.foreign_keys = enabled;
        self
    }

    /// Set the journal mode pragma (e.g. `"WAL"`)
    pub fn with_journal_mode(mut self, mode: impl Into<String>) -> Self {
        self.journal_mode = Some(mode.into());
        self
    }

    /// Whether the name refers to an in-memory store
    pub fn is_in_memory(&self) -> bool {
        self.name.is_empty() || self.name == MEMORY_DATABASE
    }
}
