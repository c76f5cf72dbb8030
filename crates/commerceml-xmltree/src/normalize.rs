//! Singleton-collapse pass over a parsed tree
//!
//! The parser's uniform build rule leaves one-element lists wherever an
//! element happened to occur exactly once before a sibling forced promotion.
//! This pass unwraps every list of length 1, children before parent, which
//! restores the most natural shape for downstream readers. It is a no-op on
//! an already-normalized tree.

use crate::{Node, Slot};

/// Collapse every `Many` of length exactly 1 into a bare value, depth-first.
pub fn normalize(node: &mut Node) {
    let Node::Element(children) = node else {
        return;
    };

    for slot in children.values_mut() {
        match slot {
            Slot::One(child) => normalize(child),
            Slot::Many(nodes) => {
                for child in nodes.iter_mut() {
                    normalize(child);
                }
                if nodes.len() == 1 {
                    if let Some(only) = nodes.pop() {
                        *slot = Slot::One(only);
                    }
                }
            }
        }
    }
}
