//! Error types for database parsing and resource identification.

use thiserror::Error;

use crate::db::{Operator, ValueType};

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, MagicError>;

/// Error type for the magic database and matching engine.
#[derive(Error, Debug)]
pub enum MagicError {
    /// The rule database is malformed. Always fatal to initialization.
    #[error("invalid magic database near line {line}: {reason}")]
    Format { line: usize, reason: String },

    /// A comparison operator was applied to a type that does not support it.
    #[error("operator '{operator}' cannot be applied to {value_type} (rule at line {line})")]
    Type {
        line: usize,
        operator: Operator,
        value_type: ValueType,
    },

    /// Fewer bytes remain in the resource than a read requires.
    #[error("end of data: needed {needed} bytes, {available} available")]
    EndOfData { needed: u64, available: u64 },

    /// A numeric property expression could not be evaluated.
    #[error("invalid numeric value for property '{key}': {expression:?} ({reason})")]
    NumberFormat {
        key: String,
        expression: String,
        reason: String,
    },

    /// I/O error from the underlying resource or database file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MagicError {
    /// Creates a new Format error.
    pub fn format(line: usize, reason: impl Into<String>) -> Self {
        Self::Format {
            line,
            reason: reason.into(),
        }
    }

    /// Creates a new EndOfData error.
    pub fn end_of_data(needed: u64, available: u64) -> Self {
        Self::EndOfData { needed, available }
    }

    /// True for conditions that only disqualify the current rule.
    pub fn is_end_of_data(&self) -> bool {
        matches!(self, Self::EndOfData { .. })
    }
}
