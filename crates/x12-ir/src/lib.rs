#![deny(rust_2018_idioms)]
#![warn(clippy::all)]

//! # x12-ir
//!
//! Structured document tree for parsed X12 transactions.
//!
//! This crate provides the output model of the parsing engine: an ordered
//! tree of loop instances and field values, plus deterministic JSON
//! serialization. Entry order inside an object is significant: the parser
//! writes entries in schema-declared field order and the serializer emits
//! them unchanged, so the same document always serializes identically.

/// Document container and document-level metadata.
pub mod document;
/// Deterministic JSON rendering of document trees.
pub mod json;
/// Ordered value tree primitives.
pub mod value;

pub use document::{Document, DocumentMetadata};
pub use json::{to_json, to_json_pretty};
pub use value::{ObjectNode, Value};

use thiserror::Error;

/// Errors that can occur when working with document trees
#[derive(Error, Debug)]
pub enum Error {
    #[error("Serialization error: {0}")]
    Serialize(String),
}

/// Crate-local result type for document operations.
pub type Result<T> = std::result::Result<T, Error>;
