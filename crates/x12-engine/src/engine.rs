//! Parse orchestration
//!
//! One synchronous pipeline per call: tokenize → hierarchical parse →
//! serialize. All allocations are owned by the call and released on every
//! exit path, success or error.

use crate::handle::{OutputBuffer, SchemaHandle};
use crate::{Error, Result};
use std::path::Path;
use tracing::{debug, info};
use x12_ir::Document;
use x12_parser::HierarchicalParser;
use x12_schema::SchemaLoader;

/// Schema input for a parse call: a pre-loaded handle (reusable across
/// calls) or a file path (load-per-call convenience)
#[derive(Debug, Clone, Copy)]
pub enum SchemaSource<'a> {
    /// Pre-loaded schema handle
    Handle(&'a SchemaHandle),
    /// Schema file to load for this call
    Path(&'a Path),
}

/// Engine façade orchestrating single parse calls
#[derive(Debug, Default)]
pub struct Engine;

impl Engine {
    /// Create an engine
    pub fn new() -> Self {
        Self
    }

    /// Parse an X12 file into JSON
    pub fn parse_file(&self, path: impl AsRef<Path>, schema: SchemaSource<'_>) -> Result<OutputBuffer> {
        let data = read_input(path.as_ref())?;
        self.parse_bytes(&data, schema)
    }

    /// Parse in-memory X12 bytes into JSON
    pub fn parse_bytes(&self, data: &[u8], schema: SchemaSource<'_>) -> Result<OutputBuffer> {
        let document = self.parse_document(data, schema)?;
        let json = x12_ir::to_json(&document)?;

        info!(
            schema = document.metadata.schema_name.as_deref().unwrap_or(""),
            segments = document.metadata.segment_count,
            output_bytes = json.len(),
            "parse complete"
        );

        Ok(OutputBuffer::new(json))
    }

    /// Parse in-memory X12 bytes into the structured document tree.
    ///
    /// For embedders that want the tree and envelope metadata rather than
    /// serialized JSON.
    pub fn parse_document(&self, data: &[u8], schema: SchemaSource<'_>) -> Result<Document> {
        if data.is_empty() {
            return Err(Error::InvalidArgument("input buffer is empty".to_string()));
        }

        let loaded;
        let schema = match schema {
            SchemaSource::Handle(handle) => handle.schema(),
            SchemaSource::Path(path) => {
                loaded = load_schema_file(path)?;
                loaded.schema()
            }
        };

        debug!(schema = %schema.name, input_bytes = data.len(), "parsing document");
        let document = HierarchicalParser::new(schema).parse(data)?;
        Ok(document)
    }
}

/// Load a schema from a file into a reusable handle
pub fn load_schema_file(path: impl AsRef<Path>) -> Result<SchemaHandle> {
    let path = path.as_ref();
    if path.as_os_str().is_empty() {
        return Err(Error::InvalidArgument("schema path is empty".to_string()));
    }

    let schema = SchemaLoader::new().load_from_file(path)?;
    Ok(SchemaHandle::new(schema))
}

/// Load a schema from in-memory JSON bytes into a reusable handle
pub fn load_schema_bytes(bytes: &[u8]) -> Result<SchemaHandle> {
    if bytes.is_empty() {
        return Err(Error::InvalidArgument("schema buffer is empty".to_string()));
    }

    let json = std::str::from_utf8(bytes)
        .map_err(|e| Error::InvalidArgument(format!("schema buffer is not UTF-8: {e}")))?;
    let schema = SchemaLoader::new().load_from_json(json)?;
    Ok(SchemaHandle::new(schema))
}

/// Parse in-memory X12 bytes against a pre-loaded schema
pub fn parse(data: &[u8], schema: &SchemaHandle) -> Result<OutputBuffer> {
    Engine::new().parse_bytes(data, SchemaSource::Handle(schema))
}

fn read_input(path: &Path) -> Result<Vec<u8>> {
    if path.as_os_str().is_empty() {
        return Err(Error::InvalidArgument("input path is empty".to_string()));
    }

    std::fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::FileNotFound(path.display().to_string())
        } else {
            Error::Io(e)
        }
    })
}
