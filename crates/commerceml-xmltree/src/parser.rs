//! Streaming XML parser: token events in, [`Node`] tree out
//!
//! Single forward pass over a `quick_xml` event stream. Recursive descent:
//! each element start recurses to build the subtree, so the call stack
//! mirrors the XML ancestor chain and no explicit open-element stack is
//! needed. Allocation happens only for names, text and the per-element maps.

use crate::{normalize, Node, Slot};
use indexmap::IndexMap;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

// ============================================================================
// Errors
// ============================================================================

/// A file-level parse failure. Callers treat this as skip-and-log for the
/// offending file, never as batch-fatal.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed xml: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("malformed attribute: {0}")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),

    #[error("element or attribute name is not valid utf-8")]
    NonUtf8Name(#[from] std::str::Utf8Error),

    #[error("text content is not valid utf-8")]
    NonUtf8Text(#[from] std::string::FromUtf8Error),

    #[error("unexpected end of document inside <{0}>")]
    UnexpectedEof(String),

    #[error("document contains no root element")]
    NoRootElement,
}

// ============================================================================
// Entry Points
// ============================================================================

/// Parse a complete XML document into the raw (un-normalized) tree.
///
/// The returned node is the document container: a map holding the root
/// element under its own name, so `doc.first("КоммерческаяИнформация")`
/// works the same way as any nested lookup.
pub fn parse_str(xml: &str) -> Result<Node, ParseError> {
    let mut reader = Reader::from_str(xml);
    let mut doc = Accumulator::new();

    loop {
        match reader.read_event()? {
            Event::Start(start) => {
                let (name, attrs) = name_and_attrs(&start)?;
                let body = parse_element(&mut reader, &name)?;
                doc.push_child(name, merge_attrs(body, attrs));
            }
            Event::Empty(start) => {
                let (name, attrs) = name_and_attrs(&start)?;
                doc.push_child(name, merge_attrs(Node::Text(String::new()), attrs));
            }
            // Prolog, comments and inter-element whitespace at document level
            Event::Decl(_) | Event::Comment(_) | Event::DocType(_) | Event::PI(_) => {}
            Event::Text(_) | Event::CData(_) => {}
            Event::End(_) => {}
            Event::Eof => break,
        }
    }

    if !doc.has_element {
        return Err(ParseError::NoRootElement);
    }
    Ok(Node::Element(doc.children))
}

/// Parse and run the singleton-collapse pass in one step.
///
/// This is the form the domain extractors require: single-valued fields are
/// bare rather than one-element lists.
pub fn parse_normalized(xml: &str) -> Result<Node, ParseError> {
    let mut node = parse_str(xml)?;
    normalize(&mut node);
    Ok(node)
}

// ============================================================================
// Recursive Descent
// ============================================================================

/// Per-depth container being filled while the element is open.
struct Accumulator {
    children: IndexMap<String, Slot>,
    /// Next positional key for interleaved text/CDATA chunks.
    text_index: usize,
    has_element: bool,
}

impl Accumulator {
    fn new() -> Self {
        Self {
            children: IndexMap::new(),
            text_index: 0,
            has_element: false,
        }
    }

    /// Build rule: bare on first occurrence, promoted to a list on the
    /// second, appended from then on.
    fn push_child(&mut self, name: String, value: Node) {
        self.has_element = true;
        match self.children.entry(name) {
            indexmap::map::Entry::Vacant(entry) => {
                entry.insert(Slot::One(value));
            }
            indexmap::map::Entry::Occupied(mut entry) => {
                match std::mem::replace(entry.get_mut(), Slot::Many(Vec::new())) {
                    Slot::One(prev) => *entry.get_mut() = Slot::Many(vec![prev, value]),
                    Slot::Many(mut nodes) => {
                        nodes.push(value);
                        *entry.get_mut() = Slot::Many(nodes);
                    }
                }
            }
        }
    }

    fn push_text(&mut self, text: &str) {
        // XMLReader-style: whitespace between elements is not content.
        if text.trim().is_empty() {
            return;
        }
        self.children.insert(
            self.text_index.to_string(),
            Slot::One(Node::Text(text.to_string())),
        );
        self.text_index += 1;
    }

    /// Collapse on element close: no children at all is the empty string,
    /// pure character data is a text leaf, anything else keeps map shape.
    fn finish(self) -> Node {
        if self.has_element {
            return Node::Element(self.children);
        }
        let mut text = String::new();
        for slot in self.children.into_values() {
            if let Slot::One(Node::Text(chunk)) = slot {
                text.push_str(&chunk);
            }
        }
        Node::Text(text)
    }
}

/// Consume events up to (and including) the matching end tag of the element
/// named `name`, returning its body.
fn parse_element(reader: &mut Reader<&[u8]>, name: &str) -> Result<Node, ParseError> {
    let mut acc = Accumulator::new();

    loop {
        match reader.read_event()? {
            Event::Start(start) => {
                let (child_name, attrs) = name_and_attrs(&start)?;
                let body = parse_element(reader, &child_name)?;
                acc.push_child(child_name, merge_attrs(body, attrs));
            }
            Event::Empty(start) => {
                let (child_name, attrs) = name_and_attrs(&start)?;
                acc.push_child(child_name, merge_attrs(Node::Text(String::new()), attrs));
            }
            Event::Text(text) => acc.push_text(&text.unescape()?),
            Event::CData(cdata) => {
                let raw = String::from_utf8(cdata.into_inner().into_owned())?;
                acc.push_text(&raw);
            }
            Event::Comment(_) | Event::PI(_) | Event::Decl(_) | Event::DocType(_) => {}
            // Mismatched end tags are rejected by the reader itself before
            // we ever see the event.
            Event::End(_) => return Ok(acc.finish()),
            Event::Eof => return Err(ParseError::UnexpectedEof(name.to_string())),
        }
    }
}

fn name_and_attrs(start: &BytesStart<'_>) -> Result<(String, Vec<(String, String)>), ParseError> {
    let name = std::str::from_utf8(start.name().as_ref())?.to_string();

    let mut attrs = Vec::new();
    for attr in start.attributes() {
        let attr = attr?;
        let key = std::str::from_utf8(attr.key.as_ref())?.to_string();
        let value = attr.unescape_value()?.into_owned();
        attrs.push((key, value));
    }
    Ok((name, attrs))
}

/// Copy attributes into the element's own map entry, after the child value
/// has been computed. An attribute name that collides with a child element
/// name overwrites that child's entry; feeds in the wild depend on the
/// current behavior, so it stays.
fn merge_attrs(body: Node, attrs: Vec<(String, String)>) -> Node {
    if attrs.is_empty() {
        return body;
    }

    let mut map = match body {
        Node::Element(map) => map,
        Node::Text(text) => {
            let mut map = IndexMap::new();
            if !text.is_empty() {
                map.insert("0".to_string(), Slot::One(Node::Text(text)));
            }
            map
        }
    };
    for (key, value) in attrs {
        map.insert(key, Slot::One(Node::Text(value)));
    }
    Node::Element(map)
}

// ============================================================================
// Tests
// ============================================================================
