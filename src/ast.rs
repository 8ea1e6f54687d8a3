//! Node tree shared by the tag pass and the inline pass.
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Node {
    Tag(Element),
    Text(Text),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    pub name: TagName,
    /// Raw header between the delimiters, e.g. `expand=Title`.
    pub header: String,
    pub attributes: Attributes,
    pub span: Span,
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Text {
    pub content: String,
    pub span: Span,
}

/// Byte range `[start, end)` in the input of the pass that produced the node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Span { start, end }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagName {
    Root,
    // Inline formatting
    B,
    I,
    U,
    S,
    Tn,
    // Blocks
    Spoilers,
    Nodtext,
    Code,
    Quote,
    Expand,
    // Tables
    Table,
    Colgroup,
    Col,
    Thead,
    Tbody,
    Tr,
    Th,
    Td,
    // Built by the inline pass (`url` also exists as a bbcode tag)
    Url,
    Br,
    Hr,
    H,
    Ul,
    Li,
    Unknown,
}

impl TagName {
    /// Look up a tag by its markup name. Names are matched exactly.
    pub fn from_name(name: &str) -> TagName {
        match name {
            "b" => TagName::B,
            "i" => TagName::I,
            "u" => TagName::U,
            "s" => TagName::S,
            "tn" => TagName::Tn,
            "spoilers" => TagName::Spoilers,
            "nodtext" => TagName::Nodtext,
            "code" => TagName::Code,
            "quote" => TagName::Quote,
            "expand" => TagName::Expand,
            "table" => TagName::Table,
            "colgroup" => TagName::Colgroup,
            "col" => TagName::Col,
            "thead" => TagName::Thead,
            "tbody" => TagName::Tbody,
            "tr" => TagName::Tr,
            "th" => TagName::Th,
            "td" => TagName::Td,
            "url" => TagName::Url,
            "br" => TagName::Br,
            "hr" => TagName::Hr,
            "h" => TagName::H,
            "ul" => TagName::Ul,
            "li" => TagName::Li,
            _ => TagName::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TagName::Root => "root",
            TagName::B => "b",
            TagName::I => "i",
            TagName::U => "u",
            TagName::S => "s",
            TagName::Tn => "tn",
            TagName::Spoilers => "spoilers",
            TagName::Nodtext => "nodtext",
            TagName::Code => "code",
            TagName::Quote => "quote",
            TagName::Expand => "expand",
            TagName::Table => "table",
            TagName::Colgroup => "colgroup",
            TagName::Col => "col",
            TagName::Thead => "thead",
            TagName::Tbody => "tbody",
            TagName::Tr => "tr",
            TagName::Th => "th",
            TagName::Td => "td",
            TagName::Url => "url",
            TagName::Br => "br",
            TagName::Hr => "hr",
            TagName::H => "h",
            TagName::Ul => "ul",
            TagName::Li => "li",
            TagName::Unknown => "unknown",
        }
    }

    /// Tags closed implicitly at the end of a line.
    pub fn is_single_line(self) -> bool {
        matches!(self, TagName::B | TagName::I | TagName::U | TagName::S)
    }

    /// Tags whose content is kept verbatim: the tag pass opens nothing inside
    /// them and the inline pass never descends into them.
    pub fn is_literal(self) -> bool {
        matches!(self, TagName::Nodtext | TagName::Code | TagName::Url)
    }
}

impl fmt::Display for TagName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tag attributes in the order they were parsed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes(Vec<(String, String)>);

impl Attributes {
    pub fn new() -> Self {
        Attributes(Vec::new())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Set `key`, replacing an earlier value in place.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl Node {
    pub fn text(content: impl Into<String>, span: Span) -> Node {
        Node::Text(Text {
            content: content.into(),
            span,
        })
    }

    pub fn span(&self) -> Span {
        match self {
            Node::Tag(element) => element.span,
            Node::Text(text) => text.span,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Node::Text(text) => Some(&text.content),
            Node::Tag(_) => None,
        }
    }
}

impl Element {
    pub fn new(name: TagName, span: Span) -> Self {
        Element {
            name,
            header: name.as_str().to_string(),
            attributes: Attributes::new(),
            span,
            children: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, key: &str, value: impl Into<String>) -> Self {
        self.attributes.insert(key, value);
        self
    }

    pub fn with_text(mut self, content: impl Into<String>) -> Self {
        let span = self.span;
        self.children.push(Node::text(content, span));
        self
    }

    /// Literal content of a node that may only hold a single text child.
    ///
    /// `code`, `nodtext` and `url` are built with this shape; anything else
    /// is a bug in whatever produced the tree.
    pub fn literal_text(&self) -> Result<&str> {
        match self.children.as_slice() {
            [] => Ok(""),
            [Node::Text(text)] => Ok(&text.content),
            [Node::Tag(child)] => Err(self.malformed(format!(
                "expected a text child, found `{}`",
                child.name
            ))),
            children => Err(self.malformed(format!(
                "expected at most one child, found {}",
                children.len()
            ))),
        }
    }

    fn malformed(&self, detail: String) -> Error {
        Error::MalformedTree {
            tag: self.name,
            position: self.span.start,
            detail,
        }
    }
}

impl From<Element> for Node {
    fn from(element: Element) -> Self {
        Node::Tag(element)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_insert_replaces_in_place() {
        let mut attributes = Attributes::new();
        attributes.insert("a", "1");
        attributes.insert("b", "2");
        attributes.insert("a", "3");

        let pairs: Vec<_> = attributes.iter().collect();
        assert_eq!(pairs, vec![("a", "3"), ("b", "2")]);
    }

    #[test]
    fn test_tag_names_round_trip() {
        for name in ["b", "tn", "nodtext", "colgroup", "url", "li"] {
            assert_eq!(TagName::from_name(name).as_str(), name);
        }
        assert_eq!(TagName::from_name("B"), TagName::Unknown);
        assert_eq!(TagName::from_name("blink"), TagName::Unknown);
    }

    #[test]
    fn test_literal_text_rejects_nested_tags() {
        let mut code = Element::new(TagName::Code, Span::new(4, 20));
        code.children
            .push(Element::new(TagName::B, Span::new(10, 14)).into());

        match code.literal_text() {
            Err(Error::MalformedTree { tag, position, .. }) => {
                assert_eq!(tag, TagName::Code);
                assert_eq!(position, 4);
            }
            other => panic!("expected a malformed tree error, got {other:?}"),
        }
    }

    #[test]
    fn test_literal_text_accepts_empty_and_single_text() {
        let empty = Element::new(TagName::Nodtext, Span::default());
        assert_eq!(empty.literal_text().unwrap(), "");

        let url = Element::new(TagName::Url, Span::default()).with_text("title");
        assert_eq!(url.literal_text().unwrap(), "title");
    }

    #[test]
    fn test_node_serializes_with_kind_tag() {
        let node: Node = Element::new(TagName::B, Span::new(0, 3)).into();
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["kind"], "tag");
        assert_eq!(json["name"], "b");
    }
}
