//! Document container for parsed X12 transactions

use crate::value::ObjectNode;
use serde::{Deserialize, Serialize};

/// A fully parsed X12 document
#[derive(Debug, Clone, Default)]
pub struct Document {
    /// Root object holding envelope fields and top-level loop instances
    pub root: ObjectNode,

    /// Document-level metadata gathered from the envelope segments
    pub metadata: DocumentMetadata,
}

/// Envelope metadata collected while parsing.
///
/// Exposed so callers can route or index a document without walking the
/// JSON output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Interchange control number (ISA13)
    pub interchange_control: Option<String>,

    /// Functional group control number (GS06)
    pub group_control: Option<String>,

    /// Transaction set identifier (ST01, e.g. "837")
    pub transaction_set: Option<String>,

    /// Transaction set control number (ST02)
    pub transaction_control: Option<String>,

    /// Number of segments consumed, envelope included
    pub segment_count: usize,

    /// Name of the schema the document was parsed against
    pub schema_name: Option<String>,
}

impl Document {
    /// Create an empty document
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a document from a root object and metadata
    pub fn with_metadata(root: ObjectNode, metadata: DocumentMetadata) -> Self {
        Self { root, metadata }
    }
}
