//! # x12-schema
//!
//! Schema model and loader for schema-driven X12 parsing.
//!
//! A schema describes how a transaction set's flat segment stream maps onto
//! a nested loop tree: which segments open loops (by qualifier or by HL
//! hierarchy level), which element positions map to which output fields,
//! and how values are coerced. Schemas are immutable once loaded and can be
//! shared across any number of concurrent parses.

pub mod loader;
pub mod model;

pub use loader::SchemaLoader;
pub use model::{FieldMapping, LoopDef, Qualifier, Schema, SegmentMapping, ValueKind};

use thiserror::Error;

/// Errors that can occur when loading or validating schemas
#[derive(Error, Debug)]
pub enum Error {
    #[error("Schema file not found: {0}")]
    NotFound(String),

    #[error("Invalid schema format: {0}")]
    InvalidFormat(String),

    #[error("Schema validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
