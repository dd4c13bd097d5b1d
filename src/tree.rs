// XML to generic tree conversion
//
// Mirrors the carrier's XML-to-array convention: every element keeps its own
// attributes, and child elements are grouped by name. A name that occurs once
// holds a single node, a repeated name holds a sequence. Consumers that expect
// a list must coerce through `Children::nodes`.
use indexmap::IndexMap;
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use crate::error::TrackingError;

// Attribute names keep their document order
pub type Attributes = IndexMap<String, String>;

// The children sharing one element name
#[derive(Debug, Clone, PartialEq)]
pub enum Children {
    One(Box<GenericNode>),
    Many(Vec<GenericNode>),
}

impl Children {
    // Coerces the collapse case into a slice, so a lone child reads as a
    // one-element sequence.
    pub fn nodes(&self) -> &[GenericNode] {
        match self {
            Children::One(node) => std::slice::from_ref(&**node),
            Children::Many(nodes) => nodes,
        }
    }

    // Returns the node only when exactly one element carried this name.
    pub fn single(&self) -> Option<&GenericNode> {
        match self {
            Children::One(node) => Some(&**node),
            Children::Many(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&mut self, node: GenericNode) {
        let merged = match std::mem::replace(self, Children::Many(Vec::new())) {
            Children::One(first) => vec![*first, node],
            Children::Many(mut nodes) => {
                nodes.push(node);
                nodes
            }
        };
        *self = Children::Many(merged);
    }
}

// One XML element
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GenericNode {
    pub name: String,
    pub attributes: Attributes,
    // Grouped by element name, in order of first appearance
    pub children: Vec<(String, Children)>,
    pub text: Option<String>,
}

impl GenericNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn child(&self, name: &str) -> Option<&Children> {
        self.children
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, children)| children)
    }

    // Follows `path` through single nodes. A missing name, or a sequence at
    // any step, ends the walk with `None`.
    pub fn descend(&self, path: &[&str]) -> Option<&GenericNode> {
        path.iter()
            .try_fold(self, |node, name| node.child(name).and_then(Children::single))
    }

    // The element's attributes, or `None` when it carried none.
    pub fn attributes(&self) -> Option<&Attributes> {
        if self.attributes.is_empty() {
            None
        } else {
            Some(&self.attributes)
        }
    }

    pub fn push_child(&mut self, node: GenericNode) {
        match self.children.iter().position(|(key, _)| *key == node.name) {
            Some(index) => self.children[index].1.push(node),
            None => self
                .children
                .push((node.name.clone(), Children::One(Box::new(node)))),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

// Renders the node the way the carrier's array conversion does, for diagnostics
impl Serialize for GenericNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        if !self.attributes.is_empty() {
            map.serialize_entry("@attributes", &self.attributes)?;
        }
        for (name, children) in &self.children {
            match children {
                Children::One(node) => map.serialize_entry(name, &**node)?,
                Children::Many(nodes) => map.serialize_entry(name, nodes)?,
            }
        }
        if let Some(text) = &self.text {
            map.serialize_entry("#text", text)?;
        }
        map.end()
    }
}

// Parse a response body into its document element
pub fn parse(xml: &str) -> Result<GenericNode, TrackingError> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<(GenericNode, String)> = Vec::new();
    let mut root: Option<GenericNode> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                ensure_single_root(&root, &stack)?;
                stack.push((start_node(&e)?, String::new()));
            }
            Ok(Event::Empty(e)) => {
                ensure_single_root(&root, &stack)?;
                let node = start_node(&e)?;
                attach(node, &mut stack, &mut root);
            }
            Ok(Event::End(_)) => {
                let (mut node, text) = stack.pop().ok_or_else(|| {
                    TrackingError::MalformedResponse("unexpected closing tag".to_string())
                })?;
                let text = text.trim();
                if !text.is_empty() {
                    node.text = Some(text.to_string());
                }
                attach(node, &mut stack, &mut root);
            }
            Ok(Event::Text(t)) => {
                let raw = std::str::from_utf8(&t).map_err(malformed)?;
                match stack.last_mut() {
                    Some((_, text)) => text.push_str(&unescape(raw).map_err(malformed)?),
                    // Whitespace around the document element is allowed, nothing else
                    None if raw.trim().is_empty() => (),
                    None => return Err(content_outside_root()),
                }
            }
            Ok(Event::CData(c)) => {
                let (_, text) = stack.last_mut().ok_or_else(content_outside_root)?;
                text.push_str(std::str::from_utf8(&c).map_err(malformed)?);
            }
            Ok(Event::GeneralRef(r)) => {
                let (_, text) = stack.last_mut().ok_or_else(content_outside_root)?;
                let name = std::str::from_utf8(&r).map_err(malformed)?;
                text.push_str(&unescape(&format!("&{};", name)).map_err(malformed)?);
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(TrackingError::MalformedResponse(format!(
                    "error at position {}: {}",
                    reader.error_position(),
                    e
                )))
            }
            // Declarations, comments, processing instructions and doctypes carry no data
            _ => (),
        }
    }

    if let Some((open, _)) = stack.last() {
        return Err(TrackingError::MalformedResponse(format!(
            "unclosed element <{}>",
            open.name
        )));
    }
    root.ok_or_else(|| TrackingError::MalformedResponse("no root element".to_string()))
}

fn start_node(e: &BytesStart) -> Result<GenericNode, TrackingError> {
    let name = std::str::from_utf8(e.name().as_ref())
        .map_err(malformed)?
        .to_string();
    let mut node = GenericNode::new(name);
    for attr in e.attributes() {
        let attr = attr.map_err(malformed)?;
        let key = std::str::from_utf8(attr.key.as_ref()).map_err(malformed)?;
        let raw = std::str::from_utf8(&attr.value).map_err(malformed)?;
        let value = unescape(raw).map_err(malformed)?;
        node.attributes.insert(key.to_string(), value.into_owned());
    }
    Ok(node)
}

fn attach(
    node: GenericNode,
    stack: &mut [(GenericNode, String)],
    root: &mut Option<GenericNode>,
) {
    match stack.last_mut() {
        Some((parent, _)) => parent.push_child(node),
        None => *root = Some(node),
    }
}

fn ensure_single_root(
    root: &Option<GenericNode>,
    stack: &[(GenericNode, String)],
) -> Result<(), TrackingError> {
    if root.is_some() && stack.is_empty() {
        return Err(TrackingError::MalformedResponse(
            "more than one root element".to_string(),
        ));
    }
    Ok(())
}

fn content_outside_root() -> TrackingError {
    TrackingError::MalformedResponse("content outside the root element".to_string())
}

fn malformed(err: impl std::fmt::Display) -> TrackingError {
    TrackingError::MalformedResponse(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_attributes_and_children() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
            <data name="piece-shipment-list" code="0">
                <data name="piece-shipment" piece-code="00340434161094042557" status="Zugestellt"/>
            </data>"#;

        let root = parse(xml).unwrap();
        assert_eq!(root.name, "data");
        assert_eq!(root.attributes["name"], "piece-shipment-list");
        assert_eq!(root.attributes["code"], "0");

        let pieces = root.child("data").unwrap();
        assert!(pieces.single().is_some());
        assert_eq!(pieces.nodes().len(), 1);
        assert_eq!(pieces.nodes()[0].attributes["status"], "Zugestellt");
    }

    #[test]
    fn test_repeated_siblings_become_sequence() {
        let xml = r#"<list><item id="1"/><item id="2"/><item id="3"/></list>"#;

        let root = parse(xml).unwrap();
        let items = root.child("item").unwrap();
        assert!(matches!(items, Children::Many(_)));
        assert!(items.single().is_none());

        let ids: Vec<&str> = items
            .nodes()
            .iter()
            .map(|n| n.attributes["id"].as_str())
            .collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_single_and_many_carry_the_same_data() {
        let one = parse(r#"<list><item id="1" v="a"/></list>"#).unwrap();
        let two = parse(r#"<list><item id="1" v="a"/><item id="2" v="b"/></list>"#).unwrap();

        let first_of_one = &one.child("item").unwrap().nodes()[0];
        let first_of_two = &two.child("item").unwrap().nodes()[0];
        assert_eq!(first_of_one, first_of_two);
    }

    #[test]
    fn test_non_contiguous_siblings_merge_in_document_order() {
        let xml = r#"<root><a n="1"/><b/><a n="2"/></root>"#;

        let root = parse(xml).unwrap();
        assert_eq!(root.children.len(), 2);
        assert_eq!(root.children[0].0, "a");
        let ns: Vec<&str> = root
            .child("a")
            .unwrap()
            .nodes()
            .iter()
            .map(|n| n.attributes["n"].as_str())
            .collect();
        assert_eq!(ns, vec!["1", "2"]);
    }

    #[test]
    fn test_escaped_attributes_and_text() {
        let xml = concat!(
            r#"<data city="K&amp;ln &quot;Mitte&quot;">"#,
            r#"<note>a &lt; b</note><raw><![CDATA[x & y]]></raw></data>"#
        );

        let root = parse(xml).unwrap();
        assert_eq!(root.attributes["city"], "K&ln \"Mitte\"");

        let note = root.descend(&["note"]).unwrap();
        assert_eq!(note.text.as_deref(), Some("a < b"));
        let raw = root.descend(&["raw"]).unwrap();
        assert_eq!(raw.text.as_deref(), Some("x & y"));
    }

    #[test]
    fn test_whitespace_only_text_is_dropped() {
        let root = parse("<data>\n   <inner/>\n</data>").unwrap();
        assert_eq!(root.text, None);
        assert!(root.descend(&["inner"]).unwrap().is_leaf());
    }

    #[test]
    fn test_descend_stops_at_sequence() {
        let xml = r#"<data><data><data n="1"/></data><data><data n="2"/></data></data>"#;

        let root = parse(xml).unwrap();
        assert!(root.descend(&["data"]).is_none());
        assert_eq!(root.descend(&[]), Some(&root));
    }

    #[test]
    fn test_element_without_attributes() {
        let root = parse("<data><data/></data>").unwrap();
        let inner = root.descend(&["data"]).unwrap();
        assert!(inner.attributes().is_none());
        assert!(root.attributes().is_none());
    }

    #[test]
    fn test_json_view() {
        let root = parse(r#"<data code="0"><data id="1"/><data id="2"/><note>hi</note></data>"#)
            .unwrap();

        let json = serde_json::to_value(&root).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "@attributes": {"code": "0"},
                "data": [
                    {"@attributes": {"id": "1"}},
                    {"@attributes": {"id": "2"}}
                ],
                "note": {"#text": "hi"}
            })
        );
    }

    #[test]
    fn test_whitespace_around_root_is_accepted() {
        let root = parse("<?xml version=\"1.0\"?>\n\n<data code=\"0\"/>\n  \n").unwrap();
        assert_eq!(root.attributes["code"], "0");
    }

    #[test]
    fn test_attributes_keep_document_order() {
        let root = parse(r#"<data z="1" a="2" m="3"/>"#).unwrap();

        let keys: Vec<&str> = root.attributes.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["z", "a", "m"]);

        let json = serde_json::to_string(&root).unwrap();
        assert_eq!(json, r#"{"@attributes":{"z":"1","a":"2","m":"3"}}"#);
    }

    #[test]
    fn test_malformed_bodies() {
        let cases = [
            "",
            "Internal Server Error",
            "<data><inner></data>",
            "<data>",
            "<data/><data/>",
            r#"<data code="0></data>"#,
            r#"<data code="0"><data a="1"/></data>Proxy error"#,
            r#"junk<data a="1"/>"#,
            r#"<![CDATA[x]]><data/>"#,
            r#"<data/>&amp;"#,
        ];

        for body in cases {
            let result = parse(body);
            assert!(
                matches!(result, Err(TrackingError::MalformedResponse(_))),
                "Expected MalformedResponse for {:?}, got {:?}",
                body,
                result
            );
        }
    }
}
