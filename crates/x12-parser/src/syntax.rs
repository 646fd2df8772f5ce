//! X12 delimiter resolution from the interchange header
//!
//! X12 carries no service string advice; the ISA segment is fixed-width and
//! the standard reserves byte offsets inside it for the delimiters every
//! later segment uses. All four must be resolved before any tokenization.

use crate::{Error, Result};

/// Fixed length of the ISA segment, terminator excluded
pub const ISA_SEGMENT_LENGTH: usize = 105;

/// Offset of the element separator, immediately after the "ISA" tag
const ELEMENT_SEPARATOR_OFFSET: usize = 3;
/// Offset of the repetition separator (ISA11)
const REPETITION_SEPARATOR_OFFSET: usize = 82;
/// Offset of the component separator (ISA16)
const COMPONENT_SEPARATOR_OFFSET: usize = 104;
/// Lookahead window searched for the segment terminator
const TERMINATOR_WINDOW: usize = 4;

/// The four structural delimiters of one X12 document.
///
/// Resolved once per document and immutable for that document's parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delimiters {
    /// Segment terminator (commonly '~')
    pub segment: u8,
    /// Element separator (commonly '*')
    pub element: u8,
    /// Component separator (commonly ':')
    pub component: u8,
    /// Repetition separator (commonly '^')
    pub repetition: u8,
}

impl Delimiters {
    /// Resolve the delimiter set from the start of an X12 document.
    ///
    /// `data` must begin with the ISA segment. Fails with `InvalidHeader`
    /// when the input is shorter than the fixed ISA length, when the four
    /// delimiters are not pairwise-distinct printable characters, or when
    /// no terminator is found in the lookahead window after ISA16.
    pub fn from_isa(data: &[u8]) -> Result<Self> {
        if data.len() < ISA_SEGMENT_LENGTH + 1 {
            return Err(Error::InvalidHeader {
                reason: format!(
                    "interchange header requires at least {} bytes, got {}",
                    ISA_SEGMENT_LENGTH + 1,
                    data.len()
                ),
            });
        }

        if &data[0..3] != b"ISA" {
            return Err(Error::InvalidHeader {
                reason: "document does not start with an ISA segment".to_string(),
            });
        }

        let element = data[ELEMENT_SEPARATOR_OFFSET];
        let repetition = data[REPETITION_SEPARATOR_OFFSET];
        let component = data[COMPONENT_SEPARATOR_OFFSET];

        for (name, byte) in [
            ("element separator", element),
            ("repetition separator", repetition),
            ("component separator", component),
        ] {
            if !byte.is_ascii_graphic() {
                return Err(Error::InvalidHeader {
                    reason: format!("{name} 0x{byte:02x} is not a printable character"),
                });
            }
        }

        if element == repetition || element == component || repetition == component {
            return Err(Error::InvalidHeader {
                reason: "element, repetition, and component separators must be distinct"
                    .to_string(),
            });
        }

        let window_end = (ISA_SEGMENT_LENGTH + TERMINATOR_WINDOW).min(data.len());
        let segment = data[ISA_SEGMENT_LENGTH..window_end]
            .iter()
            .copied()
            .find(|&b| b != element && b != repetition && b != component)
            .ok_or_else(|| Error::InvalidHeader {
                reason: "no segment terminator found after ISA16".to_string(),
            })?;

        if !segment.is_ascii_graphic() {
            return Err(Error::InvalidHeader {
                reason: format!("segment terminator 0x{segment:02x} is not a printable character"),
            });
        }

        Ok(Self {
            segment,
            element,
            component,
            repetition,
        })
    }

    /// Whether a byte is one of the four delimiters
    pub fn is_delimiter(&self, byte: u8) -> bool {
        byte == self.segment
            || byte == self.element
            || byte == self.component
            || byte == self.repetition
    }
}
