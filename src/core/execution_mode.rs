//! Execution model definitions
//!
//! This module defines how a driver runs statements relative to the caller.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// How statements reach the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// The engine runs in-process; every statement completes before the
    /// dispatching call returns and callbacks fire inline
    #[default]
    Immediate,
    /// Statements go through the connection's serialized operation queue and
    /// complete later, on the queue's worker
    Queued,
}

impl ExecutionMode {
    /// Convert the mode to its string representation
    pub fn to_str(&self) -> &'static str {
        match self {
            ExecutionMode::Immediate => "immediate",
            ExecutionMode::Queued => "queued",
        }
    }

    /// Check if callbacks fire before the scheduling call returns
    pub fn is_synchronous(&self) -> bool {
        matches!(self, ExecutionMode::Immediate)
    }
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_str())
    }
}

impl FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "immediate" | "sync" | "synchronous" => Ok(ExecutionMode::Immediate),
            "queued" | "async" | "asynchronous" => Ok(ExecutionMode::Queued),
            _ => Err(format!("Invalid execution mode: '{}'", s)),
        }
    }
}
