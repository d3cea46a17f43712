//! magicdb Library
//!
//! Signature-driven file format identification. A text rule database in the
//! `FILE_ID DB` magic format is compiled once into an immutable rule set,
//! which is then matched against files, buffers or streams.
//!
//! # Features
//!
//! - **Typed Signatures**: byte, 16/32-bit little/big-endian values and
//!   strings, with masks and seven comparison operators
//! - **Indirect Offsets**: read a pointer from the resource, then follow it
//! - **Longest Signature Wins**: the most specific matching rule is reported
//! - **Metadata Extraction**: bracketed `key=value` properties in rule
//!   descriptions, with arithmetic on numeric properties
//! - **Read-Only**: resources are memory mapped or streamed, never written
//!
//! # Example
//!
//! ```no_run
//! use magicdb::{MagicEngine, RuleSet};
//! use std::path::Path;
//!
//! fn main() -> anyhow::Result<()> {
//!     let engine = MagicEngine::new(RuleSet::builtin()?);
//!
//!     let id = engine.identify_path(Path::new("photo.png"))?;
//!     if id.identified {
//!         println!("{} ({})", id.comment, id.mime().unwrap_or("unknown"));
//!     }
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod db;
pub mod error;
pub mod props;

// Re-export commonly used types
pub use config::Config;
pub use crate::core::{ByteSource, Identification, MagicEngine, MarkReset, RandomAccess, Value};
pub use db::{Offset, Operator, RuleSet, RuleSetStats, SignatureRule, ValueType};
pub use error::{MagicError, Result};
pub use props::{ExpressionEvaluator, InfixEvaluator, PropertyExtractor};
