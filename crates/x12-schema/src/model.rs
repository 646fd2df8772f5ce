//! Schema model definitions
//!
//! The model is deliberately read-only: the loader builds it once, callers
//! share it behind an `Arc`, and parsing never mutates it.

use std::collections::HashMap;

/// A complete, immutable X12 transaction schema
#[derive(Debug, Clone)]
pub struct Schema {
    /// Schema name (e.g. "837P")
    pub name: String,
    /// Implementation guide version (e.g. "005010X222A1")
    pub version: String,
    /// HL level code -> loop name (e.g. "20" -> "billing_provider")
    pub hl_levels: HashMap<String, String>,
    /// Root-scope segment mappings (envelope and transaction headers)
    pub segments: Vec<SegmentMapping>,
    /// Top-level loop definitions
    pub loops: Vec<LoopDef>,
}

/// Definition of one loop in the transaction structure
#[derive(Debug, Clone)]
pub struct LoopDef {
    /// Output field name for instances of this loop
    pub name: String,
    /// Segment id that opens the loop
    pub trigger: String,
    /// HL level code for hierarchy-driven loops; None for qualifier loops
    pub hl_level: Option<String>,
    /// Qualifier restricting which trigger segments open this loop
    pub qualifier: Option<Qualifier>,
    /// Whether instances collect into an array
    pub repeating: bool,
    /// Segment mappings recognized inside this loop
    pub segments: Vec<SegmentMapping>,
    /// Child loop definitions
    pub loops: Vec<LoopDef>,
}

/// A qualifier condition on a segment: element at `element` equals `value`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Qualifier {
    /// 1-based element index within the segment
    pub element: usize,
    /// Expected element value
    pub value: String,
}

/// Mapping of one segment's elements to output fields
#[derive(Debug, Clone)]
pub struct SegmentMapping {
    /// Segment id (e.g. "NM1", "CLM")
    pub id: String,
    /// Qualifier distinguishing this mapping from others with the same id
    pub qualifier: Option<Qualifier>,
    /// Whether occurrences collect into an array
    pub repeating: bool,
    /// Element-index-to-field-name mappings
    pub fields: Vec<FieldMapping>,
}

/// Mapping of one element position to an output field
#[derive(Debug, Clone)]
pub struct FieldMapping {
    /// 1-based element index within the segment
    pub element: usize,
    /// Output field name
    pub name: String,
    /// Declared coercion
    pub kind: ValueKind,
    /// Component field names for `ValueKind::Composite` expansion
    pub components: Vec<String>,
}

/// Declared value coercion for a mapped field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueKind {
    /// Keep the raw element text
    #[default]
    Text,
    /// Parse as a decimal number
    Number,
    /// Reformat CCYYMMDD / YYMMDD dates as ISO 8601
    Date,
    /// Expand sub-elements into a named object
    Composite,
}

impl Schema {
    /// Create an empty schema shell
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            hl_levels: HashMap::new(),
            segments: Vec::new(),
            loops: Vec::new(),
        }
    }

    /// Resolve an HL level code to the loop name it declares
    pub fn hl_loop_name(&self, level_code: &str) -> Option<&str> {
        self.hl_levels.get(level_code).map(String::as_str)
    }
}

impl LoopDef {
    /// Whether this loop is opened by HL hierarchy rather than a qualifier
    pub fn is_hierarchical(&self) -> bool {
        self.hl_level.is_some()
    }

    /// Find a child loop by name
    pub fn child_by_name(&self, name: &str) -> Option<&LoopDef> {
        self.loops.iter().find(|l| l.name == name)
    }
}

impl SegmentMapping {
    /// Find the field mapped to a 1-based element index
    pub fn field_for_element(&self, element: usize) -> Option<&FieldMapping> {
        self.fields.iter().find(|f| f.element == element)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hl_loop_name_lookup() {
        let mut schema = Schema::new("837P", "005010X222A1");
        schema
            .hl_levels
            .insert("20".to_string(), "billing_provider".to_string());

        assert_eq!(schema.hl_loop_name("20"), Some("billing_provider"));
        assert_eq!(schema.hl_loop_name("99"), None);
    }

    #[test]
    fn test_loop_is_hierarchical() {
        let hl_loop = LoopDef {
            name: "subscriber".to_string(),
            trigger: "HL".to_string(),
            hl_level: Some("22".to_string()),
            qualifier: None,
            repeating: true,
            segments: vec![],
            loops: vec![],
        };
        assert!(hl_loop.is_hierarchical());

        let qual_loop = LoopDef {
            name: "submitter".to_string(),
            trigger: "NM1".to_string(),
            hl_level: None,
            qualifier: Some(Qualifier {
                element: 1,
                value: "41".to_string(),
            }),
            repeating: false,
            segments: vec![],
            loops: vec![],
        };
        assert!(!qual_loop.is_hierarchical());
    }

    #[test]
    fn test_field_for_element() {
        let mapping = SegmentMapping {
            id: "CLM".to_string(),
            qualifier: None,
            repeating: false,
            fields: vec![
                FieldMapping {
                    element: 1,
                    name: "claim_id".to_string(),
                    kind: ValueKind::Text,
                    components: vec![],
                },
                FieldMapping {
                    element: 2,
                    name: "charge_amount".to_string(),
                    kind: ValueKind::Number,
                    components: vec![],
                },
            ],
        };

        assert_eq!(
            mapping.field_for_element(2).map(|f| f.name.as_str()),
            Some("charge_amount")
        );
        assert!(mapping.field_for_element(3).is_none());
    }
}
