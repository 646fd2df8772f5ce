//! Schema and output ownership handles
//!
//! A [`SchemaHandle`] is the load-once-parse-many form of a schema: an
//! `Arc` around the immutable model, so concurrent parses on independent
//! threads share it without locking and the schema outlives every parse
//! holding a clone. An [`OutputBuffer`] exclusively owns one parse's
//! serialized JSON until the caller drops it.

use std::sync::Arc;
use x12_schema::Schema;

/// Shared, immutable handle to a loaded schema
#[derive(Debug, Clone)]
pub struct SchemaHandle {
    inner: Arc<Schema>,
}

impl SchemaHandle {
    /// Wrap a validated schema in a shareable handle
    pub fn new(schema: Schema) -> Self {
        Self {
            inner: Arc::new(schema),
        }
    }

    /// Borrow the underlying schema
    pub fn schema(&self) -> &Schema {
        &self.inner
    }

    /// Schema name (e.g. "837P")
    pub fn name(&self) -> &str {
        &self.inner.name
    }
}

/// Owned buffer holding one parse's serialized JSON output
#[derive(Debug)]
pub struct OutputBuffer {
    json: String,
}

impl OutputBuffer {
    pub(crate) fn new(json: String) -> Self {
        Self { json }
    }

    /// Output bytes, UTF-8 JSON without a trailing terminator
    pub fn as_bytes(&self) -> &[u8] {
        self.json.as_bytes()
    }

    /// Output as a string slice
    pub fn as_str(&self) -> &str {
        &self.json
    }

    /// Output length in bytes
    pub fn len(&self) -> usize {
        self.json.len()
    }

    /// Whether the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.json.is_empty()
    }

    /// Consume the buffer, taking ownership of the JSON string
    pub fn into_string(self) -> String {
        self.json
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_handle_is_shared() {
        let handle = SchemaHandle::new(Schema::new("837P", "005010X222A1"));
        let clone = handle.clone();

        assert_eq!(handle.name(), "837P");
        assert_eq!(clone.schema().version, "005010X222A1");
    }

    #[test]
    fn test_output_buffer_ownership() {
        let buffer = OutputBuffer::new(r#"{"a":1}"#.to_string());

        assert_eq!(buffer.len(), 7);
        assert!(!buffer.is_empty());
        assert_eq!(buffer.as_str(), r#"{"a":1}"#);
        assert_eq!(buffer.as_bytes(), br#"{"a":1}"#);
        assert_eq!(buffer.into_string(), r#"{"a":1}"#);
    }
}
