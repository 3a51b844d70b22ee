//! Owned element tree over quick-xml events.
//!
//! The node model wants random access to children and attributes (including
//! the "exactly one child with this tag" lookup that inheritance merging
//! relies on), so the event stream is materialized into a small DOM first.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

#[derive(Debug, thiserror::Error)]
pub enum XmlError {
    #[error("malformed XML: {0}")]
    Parse(#[from] quick_xml::Error),

    #[error("malformed attribute: {0}")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),

    #[error("document contains no root element")]
    NoRoot,

    #[error("unbalanced closing tag")]
    UnbalancedClose,
}

/// Result of a unique-child lookup. Callers treat both failure cases as
/// "absent" after logging; neither aborts a parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ChildLookupError {
    #[error("child element is missing")]
    Missing,
    #[error("more than one child element with the tag exists")]
    Duplicate,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Element>,
    text: Option<String>,
}

impl Element {
    /// Local tag name, namespace prefix stripped.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Text contents, or `None` if the element holds no text.
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// All children with the given tag, in document order. The returned
    /// elements borrow from `self` only, not from `tag`.
    pub fn children<'e>(&'e self, tag: &str) -> impl Iterator<Item = &'e Element> {
        self.children.iter().filter(move |c| c.name == tag)
    }

    /// The one child with the given tag. Zero or more than one match is an
    /// error; the tree is left untouched either way.
    pub fn find_child(&self, tag: &str) -> Result<&Element, ChildLookupError> {
        let mut matches = self.children(tag);
        let first = matches.next().ok_or(ChildLookupError::Missing)?;
        if matches.next().is_some() {
            return Err(ChildLookupError::Duplicate);
        }
        Ok(first)
    }
}

/// Parses an XML document into its root element.
pub fn parse_document(xml: &str) -> Result<Element, XmlError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event()? {
            Event::Start(start) => stack.push(element_from_start(&start)?),
            Event::Empty(start) => {
                let element = element_from_start(&start)?;
                attach(&mut stack, &mut root, element);
            }
            Event::End(_) => {
                let element = stack.pop().ok_or(XmlError::UnbalancedClose)?;
                attach(&mut stack, &mut root, element);
            }
            Event::Text(text) => {
                if let Some(open) = stack.last_mut() {
                    let unescaped = text.unescape()?;
                    if !unescaped.is_empty() {
                        open.text
                            .get_or_insert_with(String::new)
                            .push_str(&unescaped);
                    }
                }
            }
            Event::CData(data) => {
                if let Some(open) = stack.last_mut() {
                    open.text
                        .get_or_insert_with(String::new)
                        .push_str(&String::from_utf8_lossy(&data));
                }
            }
            Event::Eof => break,
            // Declarations, comments, processing instructions and doctypes
            // carry nothing the model cares about.
            _ => {}
        }
    }

    root.ok_or(XmlError::NoRoot)
}

fn element_from_start(start: &BytesStart<'_>) -> Result<Element, XmlError> {
    let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        attributes.push((key, value));
    }
    Ok(Element {
        name,
        attributes,
        children: Vec::new(),
        text: None,
    })
}

fn attach(stack: &mut Vec<Element>, root: &mut Option<Element>, element: Element) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
    } else if root.is_none() {
        *root = Some(element);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_elements_in_document_order() {
        let doc = parse_document(
            r#"<MPD type="static"><Period id="a"/><Period id="b"><AdaptationSet/></Period></MPD>"#,
        )
        .unwrap();

        assert_eq!(doc.name(), "MPD");
        assert_eq!(doc.attr("type"), Some("static"));

        let ids: Vec<_> = doc.children("Period").map(|p| p.attr("id")).collect();
        assert_eq!(ids, vec![Some("a"), Some("b")]);
    }

    #[test]
    fn child_references_outlive_the_tag_borrow() {
        let doc = parse_document(r#"<Root><A id="x"/></Root>"#).unwrap();
        let child = {
            let tag = String::from("A");
            doc.find_child(&tag).unwrap()
        };
        assert_eq!(child.attr("id"), Some("x"));
    }

    #[test]
    fn find_child_requires_exactly_one_match() {
        let doc = parse_document(r#"<Root><A/><B/><B/></Root>"#).unwrap();

        assert!(doc.find_child("A").is_ok());
        assert_eq!(doc.find_child("B"), Err(ChildLookupError::Duplicate));
        assert_eq!(doc.find_child("C"), Err(ChildLookupError::Missing));
    }

    #[test]
    fn text_contents_are_collected() {
        let doc = parse_document(r#"<Root><BaseURL>http://example.com/</BaseURL></Root>"#).unwrap();
        let base = doc.find_child("BaseURL").unwrap();
        assert_eq!(base.text(), Some("http://example.com/"));
        assert_eq!(doc.text(), None);
    }

    #[test]
    fn namespace_prefixes_are_stripped() {
        let doc = parse_document(
            r#"<mpd:MPD xmlns:mpd="urn:mpeg:dash:schema:mpd:2011"><mpd:Period/></mpd:MPD>"#,
        )
        .unwrap();
        assert_eq!(doc.name(), "MPD");
        assert_eq!(doc.children("Period").count(), 1);
    }

    #[test]
    fn garbage_input_is_rejected() {
        assert!(parse_document("not xml at all").is_err());
        assert!(parse_document("").is_err());
    }
}
