//! Element-to-field mapping and value coercion
//!
//! Applies a schema's field mappings to a tokenized segment: element index
//! lookup, numeric and date coercion, and qualified-composite expansion
//! into named component objects. Empty elements coerce to nothing; absence
//! is preserved structurally by simply not writing the field.

use crate::tokenizer::{Element, Segment};
use crate::{Error, Result};
use chrono::NaiveDate;
use x12_ir::{ObjectNode, Value};
use x12_schema::{FieldMapping, ValueKind};

/// Coerce the mapped element of `segment` into an output value.
///
/// Returns `Ok(None)` when the element is absent or empty.
pub fn coerce_field(segment: &Segment, mapping: &FieldMapping) -> Result<Option<Value>> {
    let Some(element) = segment.element(mapping.element) else {
        return Ok(None);
    };
    if element.is_empty() {
        return Ok(None);
    }

    coerce_element(segment, element, mapping).map(Some)
}

fn coerce_element(segment: &Segment, element: &Element, mapping: &FieldMapping) -> Result<Value> {
    match element {
        Element::Repeated(items) => {
            let mut values = Vec::new();
            for item in items {
                if item.is_empty() {
                    continue;
                }
                values.push(coerce_element(segment, item, mapping)?);
            }
            Ok(Value::Array(values))
        }
        _ => coerce_scalar(segment, element, mapping),
    }
}

fn coerce_scalar(segment: &Segment, element: &Element, mapping: &FieldMapping) -> Result<Value> {
    match mapping.kind {
        ValueKind::Text => Ok(match element {
            // A composite where the schema expects plain text keeps every
            // sub-element rather than silently dropping the tail.
            Element::Composite(parts) => {
                if parts.iter().filter(|p| !p.is_empty()).count() > 1 {
                    Value::Array(parts.iter().map(|p| Value::Text(p.clone())).collect())
                } else {
                    Value::Text(element.first_value().to_string())
                }
            }
            _ => Value::Text(element.first_value().to_string()),
        }),
        ValueKind::Number => parse_number(segment, element.first_value(), &mapping.name),
        ValueKind::Date => parse_date(segment, element.first_value(), &mapping.name),
        ValueKind::Composite => Ok(Value::Object(expand_composite(element, mapping))),
    }
}

fn parse_number(segment: &Segment, raw: &str, field: &str) -> Result<Value> {
    raw.parse::<f64>()
        .map(Value::Number)
        .map_err(|_| Error::Parse {
            segment_index: segment.position.index,
            reason: format!(
                "{} field '{field}' is not numeric: '{raw}'",
                segment.id
            ),
        })
}

fn parse_date(segment: &Segment, raw: &str, field: &str) -> Result<Value> {
    let parsed = match raw.len() {
        8 => NaiveDate::parse_from_str(raw, "%Y%m%d"),
        6 => NaiveDate::parse_from_str(raw, "%y%m%d"),
        _ => {
            return Err(Error::Parse {
                segment_index: segment.position.index,
                reason: format!(
                    "{} field '{field}' is not a CCYYMMDD or YYMMDD date: '{raw}'",
                    segment.id
                ),
            });
        }
    };

    parsed
        .map(|date| Value::Text(date.format("%Y-%m-%d").to_string()))
        .map_err(|_| Error::Parse {
            segment_index: segment.position.index,
            reason: format!("{} field '{field}' is not a valid date: '{raw}'", segment.id),
        })
}

fn expand_composite(element: &Element, mapping: &FieldMapping) -> ObjectNode {
    let mut object = ObjectNode::new();

    match element {
        Element::Composite(parts) => {
            for (name, part) in mapping.components.iter().zip(parts.iter()) {
                if !part.is_empty() {
                    object.insert(name.clone(), Value::Text(part.clone()));
                }
            }
        }
        // A plain value against a composite mapping fills the first
        // component position.
        _ => {
            if let Some(name) = mapping.components.first() {
                let value = element.first_value();
                if !value.is_empty() {
                    object.insert(name.clone(), Value::Text(value.to_string()));
                }
            }
        }
    }

    object
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::Delimiters;
    use crate::tokenizer::SegmentTokenizer;

    fn segment(data: &[u8]) -> Segment {
        let delims = Delimiters {
            segment: b'~',
            element: b'*',
            component: b':',
            repetition: b'^',
        };
        SegmentTokenizer::new(data, delims)
            .next()
            .unwrap()
            .unwrap()
    }

    fn mapping(element: usize, kind: ValueKind, components: &[&str]) -> FieldMapping {
        FieldMapping {
            element,
            name: "field".to_string(),
            kind,
            components: components.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[test]
    fn test_text_coercion() {
        let seg = segment(b"NM1*IL*1*SMITH~");
        let value = coerce_field(&seg, &mapping(3, ValueKind::Text, &[]))
            .unwrap()
            .unwrap();
        assert_eq!(value, Value::Text("SMITH".to_string()));
    }

    #[test]
    fn test_absent_element_is_none() {
        let seg = segment(b"NM1*IL~");
        assert!(coerce_field(&seg, &mapping(5, ValueKind::Text, &[]))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_empty_element_is_none() {
        let seg = segment(b"CLM*A**C~");
        assert!(coerce_field(&seg, &mapping(2, ValueKind::Text, &[]))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_number_coercion() {
        let seg = segment(b"CLM*4567832*25000~");
        let value = coerce_field(&seg, &mapping(2, ValueKind::Number, &[]))
            .unwrap()
            .unwrap();
        assert_eq!(value, Value::Number(25000.0));
    }

    #[test]
    fn test_number_with_decimals() {
        let seg = segment(b"SV1*HC:99213*125.75~");
        let value = coerce_field(&seg, &mapping(2, ValueKind::Number, &[]))
            .unwrap()
            .unwrap();
        assert_eq!(value, Value::Number(125.75));
    }

    #[test]
    fn test_non_numeric_fails() {
        let seg = segment(b"CLM*A*XYZ~");
        let err = coerce_field(&seg, &mapping(2, ValueKind::Number, &[])).unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[test]
    fn test_date_coercion_ccyymmdd() {
        let seg = segment(b"BHT*0019*00*244579*20260201~");
        let value = coerce_field(&seg, &mapping(4, ValueKind::Date, &[]))
            .unwrap()
            .unwrap();
        assert_eq!(value, Value::Text("2026-02-01".to_string()));
    }

    #[test]
    fn test_date_coercion_yymmdd() {
        let seg = segment(b"DTP*472*D8*260201~");
        let value = coerce_field(&seg, &mapping(3, ValueKind::Date, &[]))
            .unwrap()
            .unwrap();
        assert_eq!(value, Value::Text("2026-02-01".to_string()));
    }

    #[test]
    fn test_invalid_date_fails() {
        let seg = segment(b"DTP*472*D8*20269999~");
        let err = coerce_field(&seg, &mapping(3, ValueKind::Date, &[])).unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[test]
    fn test_composite_expansion() {
        let seg = segment(b"HI*ABK:I10~");
        let value = coerce_field(&seg, &mapping(1, ValueKind::Composite, &["qualifier", "code"]))
            .unwrap()
            .unwrap();

        let object = value.as_object().unwrap();
        assert_eq!(object.get("qualifier").and_then(Value::as_text), Some("ABK"));
        assert_eq!(object.get("code").and_then(Value::as_text), Some("I10"));
    }

    #[test]
    fn test_composite_with_missing_tail() {
        let seg = segment(b"CLM*A*1***11:B~");
        let value = coerce_field(
            &seg,
            &mapping(
                5,
                ValueKind::Composite,
                &["facility_code", "facility_qualifier", "claim_frequency"],
            ),
        )
        .unwrap()
        .unwrap();

        let object = value.as_object().unwrap();
        assert_eq!(
            object.get("facility_code").and_then(Value::as_text),
            Some("11")
        );
        assert!(object.get("claim_frequency").is_none());
    }

    #[test]
    fn test_repeated_composite_expansion() {
        let seg = segment(b"HI*ABK:I10^ABF:E119~");
        let value = coerce_field(&seg, &mapping(1, ValueKind::Composite, &["qualifier", "code"]))
            .unwrap()
            .unwrap();

        let items = value.as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(
            items[1].as_object().unwrap().get("code").and_then(Value::as_text),
            Some("E119")
        );
    }
}
