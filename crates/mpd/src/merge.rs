//! Downward inheritance of segment-addressing configuration.
//!
//! A descendant element's effective block is the nearest ancestor's resolved
//! block with the descendant's explicit attributes and children layered on
//! top. Inheritance only ever flows downward; nothing here reads from a
//! sibling node.

use tracing::debug;

use crate::xml::{ChildLookupError, Element};

/// The one child with the given tag, or `None`.
///
/// A duplicated tag is a document error: it is logged and the child treated
/// as absent rather than picking an arbitrary winner.
pub(crate) fn optional_child<'a>(elem: &'a Element, tag: &str) -> Option<&'a Element> {
    match elem.find_child(tag) {
        Ok(child) => Some(child),
        Err(ChildLookupError::Missing) => None,
        Err(ChildLookupError::Duplicate) => {
            debug!(parent = elem.name(), tag, "duplicate child element, ignoring all of them");
            None
        }
    }
}

/// Resolves one segment-addressing block for the current element.
///
/// `layer` parses a child element on top of the inherited block (fields the
/// child does not mention keep their inherited values). Without a child
/// element the inherited block passes through as a value-equal copy.
pub(crate) fn resolve_block<T: Clone>(
    elem: &Element,
    tag: &str,
    inherited: Option<&T>,
    layer: impl FnOnce(&Element, Option<&T>) -> T,
) -> Option<T> {
    match (optional_child(elem, tag), inherited) {
        (Some(child), inherited) => Some(layer(child, inherited)),
        (None, Some(block)) => Some(block.clone()),
        (None, None) => None,
    }
}

/// The element's own `BaseURL` child, falling back to the ancestor's
/// resolved base URL.
pub(crate) fn resolve_base_url(elem: &Element, inherited: Option<&str>) -> Option<String> {
    optional_child(elem, "BaseURL")
        .and_then(|child| child.text())
        .map(str::to_string)
        .or_else(|| inherited.map(str::to_string))
}
