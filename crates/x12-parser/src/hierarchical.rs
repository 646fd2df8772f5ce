//! Schema-guided hierarchical parsing
//!
//! The core state machine: one forward pass over the segment stream,
//! reconciling it against the schema's nested loop tree. Two independent
//! mechanisms drive loop entry: qualifier-triggered loops (segment id plus
//! a designated element value) and HL-driven loops (each HL segment names
//! its parent node, and the parser pops the hierarchy stack until that
//! parent is on top). Envelope control segments are validated for matching
//! control numbers as their levels close.

use crate::envelopes::{self, GroupHeader, InterchangeHeader, TransactionHeader};
use crate::fields::coerce_field;
use crate::syntax::Delimiters;
use crate::tokenizer::{Segment, SegmentTokenizer};
use crate::{Error, Result};
use tracing::{debug, trace};
use x12_ir::{Document, DocumentMetadata, ObjectNode, Value};
use x12_schema::{LoopDef, Schema, SegmentMapping};

/// Parser states, entered strictly in envelope order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParserState {
    AwaitingEnvelope,
    InInterchange,
    InFunctionalGroup,
    InTransaction,
    InLoop(usize),
    Complete,
    Failed,
}

/// One HL segment's position in the implied hierarchy tree
#[derive(Debug, Clone)]
pub struct HlNode {
    /// Hierarchical id (HL01)
    pub id: String,
    /// Parent hierarchical id (HL02), None for a root node
    pub parent_id: Option<String>,
    /// Hierarchical level code (HL03)
    pub level_code: String,
    /// Whether the segment declares child nodes (HL04 = "1")
    pub has_children: bool,
}

/// Schema-driven parser for one transaction schema.
///
/// The parser itself is stateless; per-document state lives in the parse
/// call, so one instance may serve any number of sequential documents and
/// a failed document never affects the next.
pub struct HierarchicalParser<'a> {
    schema: &'a Schema,
}

impl<'a> HierarchicalParser<'a> {
    /// Create a parser over a loaded schema
    pub fn new(schema: &'a Schema) -> Self {
        Self { schema }
    }

    /// Parse a complete X12 document into a structured document
    pub fn parse(&self, data: &[u8]) -> Result<Document> {
        let delimiters = Delimiters::from_isa(data)?;
        let mut run = ParseRun::new(self.schema);

        for result in SegmentTokenizer::new(data, delimiters) {
            let segment = match result {
                Ok(segment) => segment,
                Err(e) => {
                    run.state = ParserState::Failed;
                    return Err(e);
                }
            };
            if let Err(e) = run.handle_segment(&segment) {
                run.state = ParserState::Failed;
                return Err(e);
            }
        }

        run.finish()
    }
}

struct LoopFrame<'a> {
    def: &'a LoopDef,
    node: ObjectNode,
    hl: Option<HlNode>,
}

enum Action<'a> {
    /// The segment re-triggers an open loop: close it, open a sibling
    Reopen(usize, &'a LoopDef),
    /// The segment opens a child loop of the scope at the given depth
    OpenChild(usize, &'a LoopDef),
    /// The segment maps in place at the scope at the given depth
    Map(usize, &'a SegmentMapping),
}

struct ParseRun<'a> {
    schema: &'a Schema,
    state: ParserState,
    root: ObjectNode,
    metadata: DocumentMetadata,
    stack: Vec<LoopFrame<'a>>,
    isa: Option<InterchangeHeader>,
    gs: Option<GroupHeader>,
    st: Option<TransactionHeader>,
    groups_closed: usize,
    transactions_closed: usize,
    transaction_segments: usize,
    total_segments: usize,
}

impl<'a> ParseRun<'a> {
    fn new(schema: &'a Schema) -> Self {
        let metadata = DocumentMetadata {
            schema_name: Some(schema.name.clone()),
            ..DocumentMetadata::default()
        };

        Self {
            schema,
            state: ParserState::AwaitingEnvelope,
            root: ObjectNode::new(),
            metadata,
            stack: Vec::new(),
            isa: None,
            gs: None,
            st: None,
            groups_closed: 0,
            transactions_closed: 0,
            transaction_segments: 0,
            total_segments: 0,
        }
    }

    fn handle_segment(&mut self, segment: &Segment) -> Result<()> {
        self.total_segments += 1;
        if self.st.is_some() {
            self.transaction_segments += 1;
        }

        if self.state == ParserState::Complete {
            return Err(Error::Parse {
                segment_index: segment.position.index,
                reason: format!("unexpected {} after the interchange trailer", segment.id),
            });
        }

        match segment.id.as_str() {
            "ISA" => self.open_interchange(segment),
            "GS" => self.open_group(segment),
            "ST" => self.open_transaction(segment),
            "SE" => self.close_transaction(segment),
            "GE" => self.close_group(segment),
            "IEA" => self.close_interchange(segment),
            "HL" => self.handle_hl(segment),
            _ => self.handle_data_segment(segment),
        }
    }

    fn open_interchange(&mut self, segment: &Segment) -> Result<()> {
        if self.state != ParserState::AwaitingEnvelope {
            return Err(Error::Envelope {
                segment_index: segment.position.index,
                reason: "ISA while an interchange is already open".to_string(),
            });
        }

        let header = envelopes::parse_isa(segment)?;
        self.metadata.interchange_control = Some(header.control_number.clone());
        self.isa = Some(header);
        self.map_root(segment)?;
        self.groups_closed = 0;
        self.state = ParserState::InInterchange;
        Ok(())
    }

    fn open_group(&mut self, segment: &Segment) -> Result<()> {
        if self.state != ParserState::InInterchange {
            return Err(Error::Envelope {
                segment_index: segment.position.index,
                reason: "GS outside an open interchange".to_string(),
            });
        }

        let header = envelopes::parse_gs(segment)?;
        self.metadata.group_control = Some(header.control_number.clone());
        self.gs = Some(header);
        self.map_root(segment)?;
        self.transactions_closed = 0;
        self.state = ParserState::InFunctionalGroup;
        Ok(())
    }

    fn open_transaction(&mut self, segment: &Segment) -> Result<()> {
        if self.state != ParserState::InFunctionalGroup {
            return Err(Error::Envelope {
                segment_index: segment.position.index,
                reason: "ST outside an open functional group".to_string(),
            });
        }

        let header = envelopes::parse_st(segment)?;
        self.metadata.transaction_set = Some(header.set_id.clone());
        self.metadata.transaction_control = Some(header.control_number.clone());
        self.st = Some(header);
        self.map_root(segment)?;
        self.transaction_segments = 1;
        self.state = ParserState::InTransaction;
        Ok(())
    }

    fn close_transaction(&mut self, segment: &Segment) -> Result<()> {
        let Some(header) = self.st.take() else {
            return Err(Error::Envelope {
                segment_index: segment.position.index,
                reason: "SE without an open transaction set".to_string(),
            });
        };

        while !self.stack.is_empty() {
            self.close_top_frame();
        }

        envelopes::check_se(&header, segment, self.transaction_segments)?;
        self.transactions_closed += 1;
        self.state = ParserState::InFunctionalGroup;
        Ok(())
    }

    fn close_group(&mut self, segment: &Segment) -> Result<()> {
        if let Some(open) = &self.st {
            return Err(Error::ControlMismatch {
                open_segment: "ST",
                close_segment: "SE",
                segment_index: segment.position.index,
                reason: format!(
                    "transaction '{}' was not closed before GE",
                    open.control_number
                ),
            });
        }
        let Some(header) = self.gs.take() else {
            return Err(Error::Envelope {
                segment_index: segment.position.index,
                reason: "GE without an open functional group".to_string(),
            });
        };

        envelopes::check_ge(&header, segment, self.transactions_closed)?;
        self.groups_closed += 1;
        self.state = ParserState::InInterchange;
        Ok(())
    }

    fn close_interchange(&mut self, segment: &Segment) -> Result<()> {
        if let Some(open) = &self.st {
            return Err(Error::ControlMismatch {
                open_segment: "ST",
                close_segment: "SE",
                segment_index: segment.position.index,
                reason: format!(
                    "transaction '{}' was not closed before IEA",
                    open.control_number
                ),
            });
        }
        if let Some(open) = &self.gs {
            return Err(Error::ControlMismatch {
                open_segment: "GS",
                close_segment: "GE",
                segment_index: segment.position.index,
                reason: format!("group '{}' was not closed before IEA", open.control_number),
            });
        }
        let Some(header) = &self.isa else {
            return Err(Error::Envelope {
                segment_index: segment.position.index,
                reason: "IEA without an open interchange".to_string(),
            });
        };

        envelopes::check_iea(header, segment, self.groups_closed)?;
        self.state = ParserState::Complete;
        Ok(())
    }

    fn handle_hl(&mut self, segment: &Segment) -> Result<()> {
        if self.st.is_none() {
            return Err(Error::Envelope {
                segment_index: segment.position.index,
                reason: "HL segment outside a transaction set".to_string(),
            });
        }

        let index = segment.position.index;
        let id = required_hl_value(segment, 1, "hierarchical id (HL01)")?;
        let parent_id = segment
            .value(2)
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        let level_code = required_hl_value(segment, 3, "level code (HL03)")?;
        let has_children = segment.value(4) == Some("1");

        let Some(loop_name) = self.schema.hl_loop_name(&level_code) else {
            return Err(Error::PathConflict {
                segment_index: index,
                reason: format!("hierarchy level code '{level_code}' is not declared in the schema"),
            });
        };

        let def = match &parent_id {
            None => {
                // Root of the hierarchy: everything open belongs to an
                // earlier tree and closes here.
                while !self.stack.is_empty() {
                    self.close_top_frame();
                }
                self.schema
                    .loops
                    .iter()
                    .find(|l| l.is_hierarchical() && l.name == loop_name)
                    .ok_or_else(|| Error::PathConflict {
                        segment_index: index,
                        reason: format!(
                            "hierarchy level '{level_code}' ('{loop_name}') is not defined at the transaction root"
                        ),
                    })?
            }
            Some(parent) => {
                let Some(parent_pos) = self
                    .stack
                    .iter()
                    .rposition(|f| f.hl.as_ref().is_some_and(|h| h.id == *parent))
                else {
                    return Err(Error::UnknownHierarchyLevel {
                        segment_index: index,
                        reason: format!(
                            "HL parent id '{parent}' does not resolve to any open hierarchy node"
                        ),
                    });
                };

                while self.stack.len() > parent_pos + 1 {
                    self.close_top_frame();
                }

                let parent_def = self.stack[parent_pos].def;
                parent_def
                    .loops
                    .iter()
                    .find(|l| l.is_hierarchical() && l.name == loop_name)
                    .ok_or_else(|| Error::PathConflict {
                        segment_index: index,
                        reason: format!(
                            "hierarchy level '{level_code}' ('{loop_name}') is not declared under loop '{}'",
                            parent_def.name
                        ),
                    })?
            }
        };

        let hl = HlNode {
            id,
            parent_id,
            level_code,
            has_children,
        };
        self.open_loop(def, segment, Some(hl))
    }

    fn handle_data_segment(&mut self, segment: &Segment) -> Result<()> {
        if self.isa.is_none() {
            return Err(Error::Envelope {
                segment_index: segment.position.index,
                reason: format!("segment {} before the interchange header", segment.id),
            });
        }

        let Some(action) = self.decide(segment) else {
            // No mapping at any level of the stack: skip for forward
            // compatibility with schema subsets.
            trace!(
                segment = %segment.id,
                index = segment.position.index,
                "skipping unrecognized segment"
            );
            return Ok(());
        };

        match action {
            Action::Reopen(frame_index, def) => {
                while self.stack.len() > frame_index {
                    self.close_top_frame();
                }
                self.open_loop(def, segment, None)
            }
            Action::OpenChild(scope, def) => {
                while self.stack.len() > scope {
                    self.close_top_frame();
                }
                self.open_loop(def, segment, None)
            }
            Action::Map(scope, mapping) => {
                while self.stack.len() > scope {
                    self.close_top_frame();
                }
                let node = match self.stack.last_mut() {
                    Some(frame) => &mut frame.node,
                    None => &mut self.root,
                };
                map_segment_into(node, mapping, segment)
            }
        }
    }

    /// Find the innermost scope that recognizes the segment, walking up
    /// exactly as far as needed and no further.
    fn decide(&self, segment: &Segment) -> Option<Action<'a>> {
        for scope in (0..=self.stack.len()).rev() {
            if scope > 0 {
                let frame = &self.stack[scope - 1];
                if !frame.def.is_hierarchical() && trigger_matches(frame.def, segment) {
                    return Some(Action::Reopen(scope - 1, frame.def));
                }
            }

            let (segments, loops) = self.scope_defs(scope);
            if let Some(def) = find_child_loop(loops, segment) {
                return Some(Action::OpenChild(scope, def));
            }
            if let Some(mapping) = find_mapping(segments, segment) {
                return Some(Action::Map(scope, mapping));
            }
        }
        None
    }

    fn scope_defs(&self, scope: usize) -> (&'a [SegmentMapping], &'a [LoopDef]) {
        if scope == 0 {
            (&self.schema.segments, &self.schema.loops)
        } else {
            let def = self.stack[scope - 1].def;
            (&def.segments, &def.loops)
        }
    }

    fn open_loop(&mut self, def: &'a LoopDef, segment: &Segment, hl: Option<HlNode>) -> Result<()> {
        trace!(loop_name = %def.name, segment = %segment.id, "opening loop");

        let mut frame = LoopFrame {
            def,
            node: ObjectNode::new(),
            hl,
        };
        if let Some(mapping) = find_mapping(&def.segments, segment) {
            map_segment_into(&mut frame.node, mapping, segment)?;
        }
        self.stack.push(frame);
        self.state = self.loop_state();
        Ok(())
    }

    fn close_top_frame(&mut self) {
        if let Some(frame) = self.stack.pop() {
            let node = reorder(frame.node, declared_order(&frame.def.segments, &frame.def.loops));
            let parent = match self.stack.last_mut() {
                Some(parent) => &mut parent.node,
                None => &mut self.root,
            };
            attach_loop(parent, frame.def, node);
        }
        self.state = self.loop_state();
    }

    fn loop_state(&self) -> ParserState {
        if self.stack.is_empty() {
            ParserState::InTransaction
        } else {
            ParserState::InLoop(self.stack.len())
        }
    }

    fn map_root(&mut self, segment: &Segment) -> Result<()> {
        if let Some(mapping) = find_mapping(&self.schema.segments, segment) {
            map_segment_into(&mut self.root, mapping, segment)?;
        }
        Ok(())
    }

    fn finish(mut self) -> Result<Document> {
        let last_index = self.total_segments.saturating_sub(1);

        if let Some(open) = &self.st {
            return Err(Error::ControlMismatch {
                open_segment: "ST",
                close_segment: "SE",
                segment_index: last_index,
                reason: format!(
                    "input ended before transaction '{}' was closed",
                    open.control_number
                ),
            });
        }
        if let Some(open) = &self.gs {
            return Err(Error::ControlMismatch {
                open_segment: "GS",
                close_segment: "GE",
                segment_index: last_index,
                reason: format!("input ended before group '{}' was closed", open.control_number),
            });
        }
        if self.state != ParserState::Complete {
            let reason = match &self.isa {
                Some(open) => format!(
                    "input ended before interchange '{}' was closed",
                    open.control_number
                ),
                None => "input contained no interchange".to_string(),
            };
            return Err(Error::ControlMismatch {
                open_segment: "ISA",
                close_segment: "IEA",
                segment_index: last_index,
                reason,
            });
        }

        let order = declared_order(&self.schema.segments, &self.schema.loops);
        let root = reorder(std::mem::take(&mut self.root), order);
        self.metadata.segment_count = self.total_segments;
        Ok(Document::with_metadata(root, self.metadata))
    }
}

fn required_hl_value(segment: &Segment, index: usize, what: &str) -> Result<String> {
    segment
        .value(index)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| Error::Parse {
            segment_index: segment.position.index,
            reason: format!("HL segment is missing its {what}"),
        })
}

fn qualifier_matches(segment: &Segment, qualifier: Option<&x12_schema::Qualifier>) -> bool {
    match qualifier {
        None => true,
        Some(q) => segment.value(q.element) == Some(q.value.as_str()),
    }
}

fn trigger_matches(def: &LoopDef, segment: &Segment) -> bool {
    def.trigger == segment.id && qualifier_matches(segment, def.qualifier.as_ref())
}

fn find_child_loop<'a>(loops: &'a [LoopDef], segment: &Segment) -> Option<&'a LoopDef> {
    loops
        .iter()
        .find(|l| !l.is_hierarchical() && trigger_matches(l, segment))
}

fn find_mapping<'a>(segments: &'a [SegmentMapping], segment: &Segment) -> Option<&'a SegmentMapping> {
    segments
        .iter()
        .find(|m| m.id == segment.id && qualifier_matches(segment, m.qualifier.as_ref()))
}

fn map_segment_into(node: &mut ObjectNode, mapping: &SegmentMapping, segment: &Segment) -> Result<()> {
    for field in &mapping.fields {
        if let Some(value) = coerce_field(segment, field)? {
            if mapping.repeating {
                push_array_entry(node, &field.name, value);
            } else {
                if node.contains(&field.name) {
                    // Tolerant read: the schema marks this segment
                    // non-repeating, but the input repeats it.
                    debug!(
                        segment = %segment.id,
                        field = %field.name,
                        "non-repeating segment repeated in input; appending"
                    );
                }
                node.append(field.name.clone(), value);
            }
        }
    }
    Ok(())
}

fn attach_loop(parent: &mut ObjectNode, def: &LoopDef, node: ObjectNode) {
    if def.repeating {
        push_array_entry(parent, &def.name, Value::Object(node));
    } else {
        if parent.contains(&def.name) {
            debug!(loop_name = %def.name, "non-repeating loop repeated in input; appending");
        }
        parent.append(def.name.clone(), Value::Object(node));
    }
}

fn push_array_entry(node: &mut ObjectNode, name: &str, value: Value) {
    match node.get_mut(name) {
        Some(Value::Array(items)) => items.push(value),
        Some(_) => node.append(name.to_string(), value),
        None => node.insert(name.to_string(), Value::Array(vec![value])),
    }
}

/// Field and child-loop names in schema-declared order
fn declared_order<'s>(segments: &'s [SegmentMapping], loops: &'s [LoopDef]) -> Vec<&'s str> {
    let mut order: Vec<&str> = Vec::new();
    for mapping in segments {
        for field in &mapping.fields {
            if !order.contains(&field.name.as_str()) {
                order.push(field.name.as_str());
            }
        }
    }
    for loop_def in loops {
        if !order.contains(&loop_def.name.as_str()) {
            order.push(loop_def.name.as_str());
        }
    }
    order
}

/// Rebuild an object with entries in schema-declared order; entries outside
/// the declared order keep their arrival order at the end.
fn reorder(node: ObjectNode, order: Vec<&str>) -> ObjectNode {
    let mut source = node;
    let mut ordered = ObjectNode::new();
    for key in order {
        if let Some(value) = source.remove(key) {
            ordered.insert(key, value);
        }
    }
    for (key, value) in source.into_entries() {
        ordered.insert(key, value);
    }
    ordered
}
