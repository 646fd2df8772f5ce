//! # x12-engine
//!
//! Engine façade for schema-driven X12 → JSON conversion.
//!
//! This crate ties the pipeline together for a single parse call
//! (tokenize, hierarchical parse, serialize) and owns the boundary surface
//! a binding layer wraps: schema handles, output buffers, and a stable
//! numeric error-code contract. A loaded [`SchemaHandle`] is immutable and
//! cheap to clone; any number of concurrent parses may share one.

pub mod codes;
pub mod engine;
pub mod handle;

pub use codes::ErrorCode;
pub use engine::{Engine, SchemaSource, load_schema_bytes, load_schema_file, parse};
pub use handle::{OutputBuffer, SchemaHandle};

use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// Errors surfaced by the engine façade
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Schema(#[from] x12_schema::Error),

    #[error(transparent)]
    Parser(#[from] x12_parser::Error),

    #[error(transparent)]
    Document(#[from] x12_ir::Error),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    /// The stable numeric code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::Schema(x12_schema::Error::NotFound(_)) => ErrorCode::FileNotFound,
            Error::Schema(_) => ErrorCode::SchemaLoadError,
            Error::Parser(x12_parser::Error::InvalidHeader { .. }) => ErrorCode::InvalidEnvelope,
            Error::Parser(x12_parser::Error::UnknownHierarchyLevel { .. }) => {
                ErrorCode::UnknownHierarchyLevel
            }
            Error::Parser(x12_parser::Error::PathConflict { .. }) => ErrorCode::PathConflict,
            Error::Parser(_) => ErrorCode::ParseError,
            Error::Document(_) => ErrorCode::UnknownError,
            Error::FileNotFound(_) => ErrorCode::FileNotFound,
            Error::Io(e) if e.kind() == std::io::ErrorKind::NotFound => ErrorCode::FileNotFound,
            Error::Io(_) => ErrorCode::UnknownError,
            Error::InvalidArgument(_) => ErrorCode::InvalidArgument,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initialize process-wide engine state.
///
/// The engine keeps no process-wide state beyond caller-held schema
/// handles, so this is a no-op kept for the boundary contract. Safe to
/// call multiple times.
pub fn init() -> std::result::Result<(), ErrorCode> {
    INITIALIZED.store(true, Ordering::SeqCst);
    Ok(())
}

/// Tear down process-wide engine state. Idempotent.
pub fn deinit() {
    INITIALIZED.store(false, Ordering::SeqCst);
}

/// Engine version string
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        assert!(init().is_ok());
        assert!(init().is_ok());
        deinit();
        deinit();
        assert!(init().is_ok());
    }

    #[test]
    fn test_version_is_semver_like() {
        let version = version();
        assert_eq!(version.split('.').count(), 3);
    }
}
