//! Deterministic JSON rendering of document trees
//!
//! Serialization is a pure function of the document: entries are emitted in
//! the order the tree stores them, so the same tree always produces the
//! same bytes.

use crate::document::Document;
use crate::{Error, Result};

/// Render a document as compact JSON
pub fn to_json(document: &Document) -> Result<String> {
    serde_json::to_string(&document.root).map_err(|e| Error::Serialize(e.to_string()))
}

/// Render a document as pretty-printed JSON
pub fn to_json_pretty(document: &Document) -> Result<String> {
    serde_json::to_string_pretty(&document.root).map_err(|e| Error::Serialize(e.to_string()))
}
