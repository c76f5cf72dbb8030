//! Schema-less XML-to-tree parsing for vendor exchange feeds
//!
//! Converts an arbitrary XML document into a nested, order-preserving
//! map/array structure without knowing its schema:
//!
//! ```text
//! ┌───────────┐     ┌────────────┐     ┌────────────┐
//! │  XML feed │────►│ TreeParser │────►│ normalize  │────► Node tree
//! │ (tokens)  │     │ (1 pass)   │     │ (opt pass) │
//! └───────────┘     └────────────┘     └────────────┘
//! ```
//!
//! ## Shape rules
//!
//! - An element name seen once at a level is stored bare; the second
//!   occurrence promotes the entry to a list. Repetition is therefore never
//!   lost, but a genuinely single occurrence of a repeatable element is
//!   indistinguishable from a true singleton after [`normalize`].
//! - Attributes are merged into the element's own map. An attribute whose
//!   name collides with a child element name overwrites that child's entry;
//!   existing feeds rely on this, so it is documented and tested rather than
//!   fixed.
//! - Text/CDATA interleaved with child elements lands in numerically-indexed
//!   slots (`"0"`, `"1"`, ...) of the same map, in document order.
//!
//! Downstream readers should use the uniform accessors ([`Node::get`],
//! [`Node::first_text`]) which present every entry as a slice, so the
//! bare-vs-singleton ambiguity never leaks out of this crate.

pub mod normalize;
pub mod parser;

use indexmap::IndexMap;
use serde::Serialize;
use std::slice;

pub use normalize::normalize;
pub use parser::{parse_normalized, parse_str, ParseError};

// ============================================================================
// Tree Types
// ============================================================================

/// One entry of an element map: bare until a sibling with the same name
/// appears, a list from the second occurrence on.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Slot {
    One(Node),
    Many(Vec<Node>),
}

/// A parsed XML value: a text leaf or an ordered element map.
///
/// Empty elements parse as `Text("")`; elements carrying only attributes
/// parse as an `Element` mapping attribute names to text leaves.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Node {
    Text(String),
    Element(IndexMap<String, Slot>),
}

impl Node {
    /// Empty element map, the container the parser starts from.
    pub fn empty() -> Self {
        Node::Element(IndexMap::new())
    }

    /// Text content if this is a leaf.
    pub fn text(&self) -> Option<&str> {
        match self {
            Node::Text(s) => Some(s),
            Node::Element(_) => None,
        }
    }

    /// The underlying element map, if any.
    pub fn as_element(&self) -> Option<&IndexMap<String, Slot>> {
        match self {
            Node::Element(map) => Some(map),
            Node::Text(_) => None,
        }
    }

    /// Uniform child access: empty, one or many nodes as a slice.
    ///
    /// `Slot::One` and a one-element `Slot::Many` look identical here, which
    /// is exactly the point: callers never branch on occurrence count.
    pub fn get(&self, name: &str) -> &[Node] {
        match self {
            Node::Element(map) => match map.get(name) {
                Some(Slot::One(node)) => slice::from_ref(node),
                Some(Slot::Many(nodes)) => nodes.as_slice(),
                None => &[],
            },
            Node::Text(_) => &[],
        }
    }

    /// First child under `name`, if any.
    pub fn first(&self, name: &str) -> Option<&Node> {
        self.get(name).first()
    }

    /// Text of the first child under `name`.
    ///
    /// Accepts both a plain text leaf and an attribute-carrying element
    /// whose character content sits in the positional `"0"` slot.
    pub fn first_text(&self, name: &str) -> Option<&str> {
        self.first(name).and_then(Node::leaf_text)
    }

    /// Whether a child (or merged attribute) named `name` exists.
    pub fn has(&self, name: &str) -> bool {
        matches!(self, Node::Element(map) if map.contains_key(name))
    }

    fn leaf_text(&self) -> Option<&str> {
        match self {
            Node::Text(s) => Some(s),
            Node::Element(map) => match map.get("0") {
                Some(Slot::One(Node::Text(s))) => Some(s),
                _ => None,
            },
        }
    }
}
