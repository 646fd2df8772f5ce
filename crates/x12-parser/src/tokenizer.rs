//! Segment tokenization
//!
//! Splits raw X12 bytes into a lazy, forward-only stream of segments using
//! the delimiter set resolved from the interchange header. Tokenization is
//! tolerant: it preserves empty elements positionally and defers all value
//! validation to the hierarchical parser, which has schema context.

use crate::syntax::Delimiters;
use crate::{Error, Result};

/// A tokenized X12 segment
#[derive(Debug, Clone)]
pub struct Segment {
    /// Segment identifier (e.g. "NM1", "HL", "CLM")
    pub id: String,
    /// Data elements following the identifier
    pub elements: Vec<Element>,
    /// Source position
    pub position: Position,
}

/// One data element of a segment
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    /// Plain value
    Simple(String),
    /// Sub-elements split on the component separator
    Composite(Vec<String>),
    /// Values split on the repetition separator
    Repeated(Vec<Element>),
}

/// Source position of a segment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Position {
    /// Byte offset of the segment start
    pub offset: usize,
    /// Zero-based segment ordinal in the stream
    pub index: usize,
}

impl Segment {
    /// Element at a 1-based index
    pub fn element(&self, index: usize) -> Option<&Element> {
        if index == 0 {
            return None;
        }
        self.elements.get(index - 1)
    }

    /// Scalar text of the element at a 1-based index.
    ///
    /// Composite and repeated elements yield their first scalar, which is
    /// what envelope control numbers and qualifier checks need.
    pub fn value(&self, index: usize) -> Option<&str> {
        self.element(index).map(Element::first_value)
    }
}

impl Element {
    /// First scalar value of this element
    pub fn first_value(&self) -> &str {
        match self {
            Element::Simple(v) => v,
            Element::Composite(parts) => parts.first().map(String::as_str).unwrap_or(""),
            Element::Repeated(items) => items.first().map(Element::first_value).unwrap_or(""),
        }
    }

    /// Whether the element holds no content at all
    pub fn is_empty(&self) -> bool {
        match self {
            Element::Simple(v) => v.is_empty(),
            Element::Composite(parts) => parts.iter().all(String::is_empty),
            Element::Repeated(items) => items.iter().all(Element::is_empty),
        }
    }
}

/// Lazy tokenizer over raw X12 bytes
pub struct SegmentTokenizer<'a> {
    data: &'a [u8],
    pos: usize,
    delimiters: Delimiters,
    next_index: usize,
}

impl<'a> SegmentTokenizer<'a> {
    /// Create a tokenizer over `data` with a resolved delimiter set
    pub fn new(data: &'a [u8], delimiters: Delimiters) -> Self {
        Self {
            data,
            pos: 0,
            delimiters,
            next_index: 0,
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(&b) = self.data.get(self.pos) {
            if b == b' ' || b == b'\t' || b == b'\r' || b == b'\n' {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn split_element(&self, raw: &str) -> Element {
        let repetition = self.delimiters.repetition as char;
        let component = self.delimiters.component as char;

        if raw.contains(repetition) {
            let items = raw
                .split(repetition)
                .map(|part| self.split_component(part, component))
                .collect();
            Element::Repeated(items)
        } else {
            self.split_component(raw, component)
        }
    }

    fn split_component(&self, raw: &str, component: char) -> Element {
        if raw.contains(component) {
            Element::Composite(raw.split(component).map(str::to_string).collect())
        } else {
            Element::Simple(raw.to_string())
        }
    }
}

impl Iterator for SegmentTokenizer<'_> {
    type Item = Result<Segment>;

    fn next(&mut self) -> Option<Self::Item> {
        self.skip_whitespace();

        if self.pos >= self.data.len() {
            return None;
        }

        let start = self.pos;
        let terminator = self.delimiters.segment;
        let end = self.data[self.pos..]
            .iter()
            .position(|&b| b == terminator)
            .map(|rel| self.pos + rel);

        let (raw, next_pos) = match end {
            Some(end) => (&self.data[self.pos..end], end + 1),
            // Final segment may legitimately lack a terminator.
            None => (&self.data[self.pos..], self.data.len()),
        };
        self.pos = next_pos;

        let text = String::from_utf8_lossy(raw);
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Some(Err(Error::MalformedSegment {
                offset: start,
                reason: "segment is empty".to_string(),
            }));
        }

        let separator = self.delimiters.element as char;
        let mut parts = trimmed.split(separator);
        let id = parts.next().unwrap_or("").to_string();
        let elements = parts.map(|raw| self.split_element(raw)).collect();

        let position = Position {
            offset: start,
            index: self.next_index,
        };
        self.next_index += 1;

        Some(Ok(Segment {
            id,
            elements,
            position,
        }))
    }
}
