//! Schema loader and load-time validation
//!
//! Loads schema documents from JSON or YAML (extension-driven) and rejects
//! structurally incomplete schemas before any parse can observe them:
//! duplicate triggers within a scope, undeclared hierarchy level codes, and
//! loop definitions that cycle back to an ancestor all fail here.

use crate::model::{FieldMapping, LoopDef, Qualifier, Schema, SegmentMapping, ValueKind};
use crate::{Error, Result};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{debug, trace};

/// Serializable schema format for loading from files
#[derive(Debug, Deserialize)]
struct SchemaFile {
    name: String,
    version: String,
    #[serde(default)]
    hl_levels: HashMap<String, String>,
    #[serde(default)]
    segments: Vec<SegmentFile>,
    #[serde(default)]
    loops: Vec<LoopFile>,
}

#[derive(Debug, Deserialize)]
struct LoopFile {
    name: String,
    trigger: String,
    #[serde(default)]
    hl_level: Option<String>,
    #[serde(default)]
    qualifier: Option<QualifierFile>,
    #[serde(default)]
    repeating: bool,
    #[serde(default)]
    segments: Vec<SegmentFile>,
    #[serde(default)]
    loops: Vec<LoopFile>,
}

#[derive(Debug, Deserialize, Clone)]
struct QualifierFile {
    element: usize,
    value: String,
}

#[derive(Debug, Deserialize)]
struct SegmentFile {
    id: String,
    #[serde(default)]
    qualifier: Option<QualifierFile>,
    #[serde(default)]
    repeating: bool,
    #[serde(default)]
    fields: Vec<FieldFile>,
}

#[derive(Debug, Deserialize)]
struct FieldFile {
    element: usize,
    name: String,
    #[serde(default, rename = "type")]
    kind: FieldKindFile,
    #[serde(default)]
    components: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
enum FieldKindFile {
    #[default]
    String,
    Number,
    Date,
    Composite,
}

impl From<FieldKindFile> for ValueKind {
    fn from(kind: FieldKindFile) -> Self {
        match kind {
            FieldKindFile::String => ValueKind::Text,
            FieldKindFile::Number => ValueKind::Number,
            FieldKindFile::Date => ValueKind::Date,
            FieldKindFile::Composite => ValueKind::Composite,
        }
    }
}

impl From<QualifierFile> for Qualifier {
    fn from(file: QualifierFile) -> Self {
        Self {
            element: file.element,
            value: file.value,
        }
    }
}

/// Loader producing immutable, validated schemas
pub struct SchemaLoader;

impl SchemaLoader {
    /// Create a new schema loader
    pub fn new() -> Self {
        Self
    }

    /// Load and validate a schema from a file path
    pub fn load_from_file(&self, path: &Path) -> Result<Schema> {
        if !path.exists() {
            return Err(Error::NotFound(path.display().to_string()));
        }

        trace!("Loading schema from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;

        if path
            .extension()
            .map(|e| e == "yaml" || e == "yml")
            .unwrap_or(false)
        {
            self.load_from_yaml(&content)
        } else {
            self.load_from_json(&content)
        }
    }

    /// Load and validate a schema from a JSON string
    pub fn load_from_json(&self, json: &str) -> Result<Schema> {
        let schema_file: SchemaFile = serde_json::from_str(json)
            .map_err(|e| Error::InvalidFormat(format!("JSON parse error: {e}")))?;

        self.convert_and_validate(schema_file)
    }

    /// Load and validate a schema from a YAML string
    pub fn load_from_yaml(&self, yaml: &str) -> Result<Schema> {
        let schema_file: SchemaFile = serde_yaml::from_str(yaml)
            .map_err(|e| Error::InvalidFormat(format!("YAML parse error: {e}")))?;

        self.convert_and_validate(schema_file)
    }

    fn convert_and_validate(&self, file: SchemaFile) -> Result<Schema> {
        let schema = Schema {
            name: file.name,
            version: file.version,
            hl_levels: file.hl_levels,
            segments: file.segments.into_iter().map(convert_segment).collect(),
            loops: file.loops.into_iter().map(convert_loop).collect(),
        };

        validate(&schema)?;

        debug!(
            schema = %schema.name,
            version = %schema.version,
            loops = schema.loops.len(),
            "Schema loaded"
        );

        Ok(schema)
    }
}

impl Default for SchemaLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn convert_loop(file: LoopFile) -> LoopDef {
    LoopDef {
        name: file.name,
        trigger: file.trigger,
        hl_level: file.hl_level,
        qualifier: file.qualifier.map(Into::into),
        repeating: file.repeating,
        segments: file.segments.into_iter().map(convert_segment).collect(),
        loops: file.loops.into_iter().map(convert_loop).collect(),
    }
}

fn convert_segment(file: SegmentFile) -> SegmentMapping {
    SegmentMapping {
        id: file.id,
        qualifier: file.qualifier.map(Into::into),
        repeating: file.repeating,
        fields: file
            .fields
            .into_iter()
            .map(|f| FieldMapping {
                element: f.element,
                name: f.name,
                kind: f.kind.into(),
                components: f.components,
            })
            .collect(),
    }
}

fn validate(schema: &Schema) -> Result<()> {
    let mut ancestors: Vec<&str> = Vec::new();
    validate_scope(&schema.loops, schema, &mut ancestors)?;
    validate_segment_mappings(&schema.segments, "root scope")?;

    // Every declared level code must point at a defined hierarchical loop.
    let mut hl_loop_names = HashSet::new();
    collect_hl_loop_names(&schema.loops, &mut hl_loop_names);
    for (code, loop_name) in &schema.hl_levels {
        if !hl_loop_names.contains(loop_name.as_str()) {
            return Err(Error::Validation(format!(
                "hierarchy level '{code}' names loop '{loop_name}' which is not defined as a hierarchical loop"
            )));
        }
    }

    Ok(())
}

fn validate_scope<'a>(
    loops: &'a [LoopDef],
    schema: &Schema,
    ancestors: &mut Vec<&'a str>,
) -> Result<()> {
    let mut seen_triggers: HashSet<(
        &str,
        Option<&str>,
        Option<(usize, &str)>,
    )> = HashSet::new();

    for loop_def in loops {
        let trigger_key = (
            loop_def.trigger.as_str(),
            loop_def.hl_level.as_deref(),
            loop_def
                .qualifier
                .as_ref()
                .map(|q| (q.element, q.value.as_str())),
        );
        if !seen_triggers.insert(trigger_key) {
            return Err(Error::Validation(format!(
                "duplicate trigger '{}' for loop '{}' within the same scope",
                loop_def.trigger, loop_def.name
            )));
        }

        if ancestors.contains(&loop_def.name.as_str()) {
            return Err(Error::Validation(format!(
                "loop '{}' cycles back to an ancestor definition",
                loop_def.name
            )));
        }

        if let Some(code) = &loop_def.hl_level {
            if loop_def.trigger != "HL" {
                return Err(Error::Validation(format!(
                    "loop '{}' declares hl_level '{code}' but triggers on '{}', not HL",
                    loop_def.name, loop_def.trigger
                )));
            }
            match schema.hl_levels.get(code) {
                Some(declared) if *declared == loop_def.name => {}
                Some(declared) => {
                    return Err(Error::Validation(format!(
                        "hierarchy level '{code}' is declared for loop '{declared}' but referenced by loop '{}'",
                        loop_def.name
                    )));
                }
                None => {
                    return Err(Error::Validation(format!(
                        "loop '{}' references undeclared hierarchy level '{code}'",
                        loop_def.name
                    )));
                }
            }
        }

        validate_segment_mappings(&loop_def.segments, &loop_def.name)?;

        ancestors.push(loop_def.name.as_str());
        validate_scope(&loop_def.loops, schema, ancestors)?;
        ancestors.pop();
    }

    Ok(())
}

fn validate_segment_mappings(segments: &[SegmentMapping], scope: &str) -> Result<()> {
    for mapping in segments {
        for field in &mapping.fields {
            if field.element == 0 {
                return Err(Error::Validation(format!(
                    "segment '{}' in {scope}: field '{}' uses element index 0 (indices are 1-based)",
                    mapping.id, field.name
                )));
            }
            if field.kind == ValueKind::Composite && field.components.is_empty() {
                return Err(Error::Validation(format!(
                    "segment '{}' in {scope}: composite field '{}' declares no component names",
                    mapping.id, field.name
                )));
            }
        }
    }
    Ok(())
}

fn collect_hl_loop_names<'a>(loops: &'a [LoopDef], names: &mut HashSet<&'a str>) {
    for loop_def in loops {
        if loop_def.is_hierarchical() {
            names.insert(loop_def.name.as_str());
        }
        collect_hl_loop_names(&loop_def.loops, names);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
    {
        "name": "837P",
        "version": "005010X222A1",
        "hl_levels": { "20": "billing_provider", "22": "subscriber" },
        "loops": [
            {
                "name": "billing_provider",
                "trigger": "HL",
                "hl_level": "20",
                "repeating": true,
                "segments": [
                    {
                        "id": "NM1",
                        "qualifier": { "element": 1, "value": "85" },
                        "fields": [
                            { "element": 3, "name": "name" },
                            { "element": 9, "name": "npi" }
                        ]
                    }
                ],
                "loops": [
                    {
                        "name": "subscriber",
                        "trigger": "HL",
                        "hl_level": "22",
                        "repeating": true,
                        "segments": [
                            {
                                "id": "CLM",
                                "fields": [
                                    { "element": 1, "name": "claim_id" },
                                    { "element": 2, "name": "charge_amount", "type": "number" }
                                ]
                            }
                        ]
                    }
                ]
            }
        ]
    }
    "#;

    #[test]
    fn test_load_minimal_schema() {
        let loader = SchemaLoader::new();
        let schema = loader.load_from_json(MINIMAL).unwrap();

        assert_eq!(schema.name, "837P");
        assert_eq!(schema.version, "005010X222A1");
        assert_eq!(schema.hl_loop_name("20"), Some("billing_provider"));
        assert_eq!(schema.loops.len(), 1);

        let billing = &schema.loops[0];
        assert!(billing.is_hierarchical());
        assert_eq!(billing.loops.len(), 1);
        assert_eq!(billing.loops[0].name, "subscriber");
    }

    #[test]
    fn test_field_kind_parsing() {
        let loader = SchemaLoader::new();
        let schema = loader.load_from_json(MINIMAL).unwrap();

        let clm = &schema.loops[0].loops[0].segments[0];
        assert_eq!(clm.fields[0].kind, ValueKind::Text);
        assert_eq!(clm.fields[1].kind, ValueKind::Number);
    }

    #[test]
    fn test_duplicate_trigger_in_scope_rejected() {
        let json = r#"
        {
            "name": "TEST", "version": "1",
            "loops": [
                {
                    "name": "payer",
                    "trigger": "NM1",
                    "qualifier": { "element": 1, "value": "PR" }
                },
                {
                    "name": "payer_copy",
                    "trigger": "NM1",
                    "qualifier": { "element": 1, "value": "PR" }
                }
            ]
        }
        "#;

        let result = SchemaLoader::new().load_from_json(json);
        match result {
            Err(Error::Validation(msg)) => assert!(msg.contains("duplicate trigger")),
            other => panic!("Expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_same_trigger_different_qualifier_allowed() {
        let json = r#"
        {
            "name": "TEST", "version": "1",
            "loops": [
                {
                    "name": "submitter",
                    "trigger": "NM1",
                    "qualifier": { "element": 1, "value": "41" }
                },
                {
                    "name": "receiver",
                    "trigger": "NM1",
                    "qualifier": { "element": 1, "value": "40" }
                }
            ]
        }
        "#;

        assert!(SchemaLoader::new().load_from_json(json).is_ok());
    }

    #[test]
    fn test_undeclared_hl_level_rejected() {
        let json = r#"
        {
            "name": "TEST", "version": "1",
            "hl_levels": { "20": "billing_provider" },
            "loops": [
                { "name": "billing_provider", "trigger": "HL", "hl_level": "20" },
                { "name": "patient", "trigger": "HL", "hl_level": "23" }
            ]
        }
        "#;

        let result = SchemaLoader::new().load_from_json(json);
        match result {
            Err(Error::Validation(msg)) => {
                assert!(msg.contains("undeclared hierarchy level"));
            }
            other => panic!("Expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_hl_level_name_mismatch_rejected() {
        let json = r#"
        {
            "name": "TEST", "version": "1",
            "hl_levels": { "20": "billing_provider" },
            "loops": [
                { "name": "rendering_provider", "trigger": "HL", "hl_level": "20" }
            ]
        }
        "#;

        let result = SchemaLoader::new().load_from_json(json);
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_hl_level_without_hl_trigger_rejected() {
        let json = r#"
        {
            "name": "TEST", "version": "1",
            "hl_levels": { "20": "billing_provider" },
            "loops": [
                { "name": "billing_provider", "trigger": "NM1", "hl_level": "20" }
            ]
        }
        "#;

        let result = SchemaLoader::new().load_from_json(json);
        match result {
            Err(Error::Validation(msg)) => assert!(msg.contains("not HL")),
            other => panic!("Expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_loop_cycling_to_ancestor_rejected() {
        let json = r#"
        {
            "name": "TEST", "version": "1",
            "loops": [
                {
                    "name": "service_line",
                    "trigger": "LX",
                    "loops": [
                        { "name": "service_line", "trigger": "LX" }
                    ]
                }
            ]
        }
        "#;

        let result = SchemaLoader::new().load_from_json(json);
        match result {
            Err(Error::Validation(msg)) => assert!(msg.contains("cycles back")),
            other => panic!("Expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_composite_without_components_rejected() {
        let json = r#"
        {
            "name": "TEST", "version": "1",
            "segments": [
                {
                    "id": "HI",
                    "fields": [
                        { "element": 1, "name": "diagnosis", "type": "composite" }
                    ]
                }
            ]
        }
        "#;

        let result = SchemaLoader::new().load_from_json(json);
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_zero_element_index_rejected() {
        let json = r#"
        {
            "name": "TEST", "version": "1",
            "segments": [
                { "id": "ST", "fields": [ { "element": 0, "name": "broken" } ] }
            ]
        }
        "#;

        let result = SchemaLoader::new().load_from_json(json);
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_load_from_yaml() {
        let yaml = r#"
name: "837P"
version: "005010X222A1"
hl_levels:
  "20": billing_provider
loops:
  - name: billing_provider
    trigger: HL
    hl_level: "20"
    repeating: true
"#;

        let schema = SchemaLoader::new().load_from_yaml(yaml).unwrap();
        assert_eq!(schema.name, "837P");
        assert_eq!(schema.loops[0].hl_level.as_deref(), Some("20"));
    }

    #[test]
    fn test_load_invalid_json() {
        let result = SchemaLoader::new().load_from_json("not valid json");
        assert!(matches!(result, Err(Error::InvalidFormat(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let result = SchemaLoader::new().load_from_file(Path::new("tests/data/nope.json"));
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_load_fixture_file() {
        let loader = SchemaLoader::new();
        let schema = loader
            .load_from_file(Path::new("tests/data/837p.json"))
            .unwrap();

        assert_eq!(schema.name, "837P");
        assert!(!schema.loops.is_empty());
        assert!(schema.hl_loop_name("22").is_some());
    }
}
