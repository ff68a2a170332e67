//! Attribute-tree loader
//!
//! Reads an RTE export into a generic element tree: every element keeps its
//! attributes and children in document order, and repeated sibling tags are
//! all kept. The model builder consumes this tree; nothing here knows the
//! export schema.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::Serialize;

/// Element nesting bound. Exports are a handful of levels deep; anything
/// past this is rejected rather than walked.
pub const MAX_ELEMENT_DEPTH: usize = 256;

/// One XML element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct XmlNode {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
    /// Concatenated, trimmed character data directly inside this element.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub text: String,
}

impl XmlNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// First child with the given tag
    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All children with the given tag, in document order
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlNode> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    pub fn has_child(&self, name: &str) -> bool {
        self.child(name).is_some()
    }
}

/// The byte stream is not a well-formed XML document.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason} (byte {position})")]
pub struct MalformedDocument {
    pub reason: String,
    pub position: u64,
}

/// Load a document into its root element.
pub fn load_tree(bytes: &[u8]) -> Result<XmlNode, MalformedDocument> {
    let mut reader = Reader::from_reader(bytes);
    let mut buf = Vec::new();
    let mut stack: Vec<XmlNode> = Vec::new();
    let mut root: Option<XmlNode> = None;

    loop {
        let position = reader.buffer_position() as u64;
        let malformed = |reason: String| MalformedDocument { reason, position };

        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| malformed(e.to_string()))?;

        match event {
            Event::Start(start) => {
                if root.is_some() {
                    return Err(malformed("content after the root element".into()));
                }
                if stack.len() >= MAX_ELEMENT_DEPTH {
                    return Err(malformed(format!(
                        "element nesting exceeds {MAX_ELEMENT_DEPTH}"
                    )));
                }
                stack.push(element(&start).map_err(malformed)?);
            }
            Event::Empty(start) => {
                let node = element(&start).map_err(malformed)?;
                close(node, &mut stack, &mut root).map_err(malformed)?;
            }
            Event::End(_) => {
                // quick-xml checks that end names match their start tags.
                let node = stack
                    .pop()
                    .ok_or_else(|| malformed("closing tag without an open element".into()))?;
                close(node, &mut stack, &mut root).map_err(malformed)?;
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(|e| malformed(e.to_string()))?;
                push_text(&text, &mut stack).map_err(malformed)?;
            }
            Event::CData(data) => {
                let data = String::from_utf8_lossy(&data.into_inner()).into_owned();
                push_text(&data, &mut stack).map_err(malformed)?;
            }
            Event::Eof => {
                if let Some(open) = stack.last() {
                    return Err(malformed(format!(
                        "unexpected end of document inside <{}>",
                        open.name
                    )));
                }
                return root.ok_or_else(|| malformed("document has no root element".into()));
            }
            // Declarations, comments, processing instructions, doctypes.
            _ => {}
        }
        buf.clear();
    }
}

fn element(start: &BytesStart<'_>) -> Result<XmlNode, String> {
    let name = utf8(start.name().as_ref())?;
    let mut node = XmlNode::new(name);
    for attr in start.attributes() {
        let attr = attr.map_err(|e| e.to_string())?;
        let key = utf8(attr.key.as_ref())?;
        let value = attr.unescape_value().map_err(|e| e.to_string())?;
        node.attributes.push((key, value.into_owned()));
    }
    Ok(node)
}

fn close(
    node: XmlNode,
    stack: &mut [XmlNode],
    root: &mut Option<XmlNode>,
) -> Result<(), String> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(node);
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(node);
            Ok(())
        }
        None => Err("more than one root element".into()),
    }
}

fn push_text(text: &str, stack: &mut [XmlNode]) -> Result<(), String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(());
    }
    match stack.last_mut() {
        Some(node) => {
            node.text.push_str(trimmed);
            Ok(())
        }
        None => Err(format!("text outside the root element: {trimmed:?}")),
    }
}

fn utf8(bytes: &[u8]) -> Result<String, String> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|e| format!("invalid UTF-8 in name: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attributes_and_children_keep_document_order() {
        let xml = br#"<?xml version="1.0"?>
            <export prog="118" ver="1.0000">
                <seq n="2"/>
                <seq n="1"/>
                <seq n="2"/>
            </export>"#;
        let root = load_tree(xml).unwrap();

        assert_eq!(root.name, "export");
        assert_eq!(
            root.attributes,
            vec![
                ("prog".to_string(), "118".to_string()),
                ("ver".to_string(), "1.0000".to_string())
            ]
        );
        let order: Vec<_> = root
            .children_named("seq")
            .map(|s| s.attr("n").unwrap())
            .collect();
        assert_eq!(order, vec!["2", "1", "2"]);
    }

    #[test]
    fn test_entities_unescaped() {
        let root = load_tree(br#"<i ins="If A &gt; 5 Then Set B = &quot;x&quot;"/>"#).unwrap();
        assert_eq!(root.attr("ins"), Some(r#"If A > 5 Then Set B = "x""#));
    }

    #[test]
    fn test_text_and_cdata() {
        let root = load_tree(b"<note> hello <![CDATA[<raw>]]></note>").unwrap();
        assert_eq!(root.text, "hello<raw>");
    }

    #[test]
    fn test_mismatched_end_tag_is_malformed() {
        assert!(load_tree(b"<export><seq></export>").is_err());
    }

    #[test]
    fn test_unclosed_root_is_malformed() {
        let err = load_tree(b"<export><seq n=\"1\"/>").unwrap_err();
        assert!(err.reason.contains("unexpected end of document"));
    }

    #[test]
    fn test_empty_and_plain_text_are_malformed() {
        assert!(load_tree(b"").is_err());
        assert!(load_tree(b"not xml at all").is_err());
    }

    #[test]
    fn test_second_root_rejected() {
        let err = load_tree(b"<a/><b/>").unwrap_err();
        assert!(err.reason.contains("root"));
    }

    #[test]
    fn test_nesting_bound() {
        let depth = MAX_ELEMENT_DEPTH + 1;
        let xml = format!("{}{}", "<d>".repeat(depth), "</d>".repeat(depth));
        let err = load_tree(xml.as_bytes()).unwrap_err();
        assert!(err.reason.contains("nesting"));
    }
}
