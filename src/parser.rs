//! First pass: builds a tag tree out of bbcode-style (or html-style) DText tags.
use regex::Regex;
use unicode_casefold::UnicodeCaseFold;

use crate::ast::{Attributes, Element, Node, Span, TagName, Text};
use crate::error::{Error, Result};

/// Tags recognized only as an exact name.
const PLAIN_TAGS: &[&str] = &[
    "b", "i", "u", "s", "tn", "spoilers", "nodtext", "code", "quote", "table", "colgroup",
];

/// Tags that may carry `key=value` attributes after the name.
const ATTRIBUTE_TAGS: &[&str] = &["thead", "tbody", "tr", "col", "th", "td", "expand", "url"];

const MAX_ATTRIBUTE_ITERATIONS: usize = 100;

/// Opening and closing characters of a tag marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delimiters {
    pub open: char,
    pub close: char,
}

impl Delimiters {
    /// `[b]bold[/b]`
    pub const BBCODE: Delimiters = Delimiters {
        open: '[',
        close: ']',
    };
    /// `<b>bold</b>`
    pub const HTML: Delimiters = Delimiters {
        open: '<',
        close: '>',
    };
}

/// Tag-tree builder for one delimiter style.
#[derive(Debug)]
pub struct TagParser {
    delimiters: Delimiters,
    /// Splits the input into newlines, tag markers and the text between them.
    markers: Regex,
}

impl TagParser {
    pub fn new(delimiters: Delimiters) -> Result<Self> {
        let open = regex::escape(&delimiters.open.to_string());
        let close = regex::escape(&delimiters.close.to_string());
        let plain = PLAIN_TAGS.join("|");
        let attributed = ATTRIBUTE_TAGS.join("|");

        let pattern = format!(
            r"\n|{open}(?:{plain}){close}|{open}(?:{attributed})(?:[ =][^{open}{close}\n]*)?{close}|(?i:{open}/(?:{plain}|{attributed}){close})"
        );

        Ok(TagParser {
            delimiters,
            markers: Regex::new(&pattern)?,
        })
    }

    pub fn delimiters(&self) -> Delimiters {
        self.delimiters
    }

    /// Build the tag tree for `input`. The returned node is the `root` tag.
    pub fn parse(&self, input: &str) -> Result<Node> {
        let mut builder = TreeBuilder::new(self.delimiters, input);
        let mut last = 0;

        for marker in self.markers.find_iter(input) {
            if marker.start() > last {
                builder.push_text(&input[last..marker.start()], last);
            }
            if marker.as_str() == "\n" {
                builder.newline(marker.start());
            } else {
                builder.marker(marker.as_str(), marker.start())?;
            }
            last = marker.end();
        }
        if last < input.len() {
            builder.push_text(&input[last..], last);
        }

        builder.finish()
    }
}

/// Parse the attributes of a tag header such as `td colspan=2 align="left"`.
///
/// Pairs are peeled from the right: each trailing `=` token is a value and
/// the last word before it is its key. A value that itself contains `=` is
/// split at that sign.
pub fn parse_attributes(header: &str) -> Result<Attributes> {
    let mut attributes = Attributes::new();
    let mut parts: Vec<String> = header.split('=').map(str::to_string).collect();

    if parts.len() == 1 {
        return Ok(attributes);
    }

    let mut iterations = 0;
    while parts.len() > 2 {
        iterations += 1;
        if iterations >= MAX_ATTRIBUTE_ITERATIONS {
            return Err(Error::AttributeOverflow {
                header: header.to_string(),
            });
        }

        let Some(value) = parts.pop() else { break };
        if value.trim().is_empty() {
            continue;
        }
        let Some(previous) = parts.last_mut() else { break };
        let (rest, key) = split_last_word(previous);
        attributes.insert(strip_value(key), strip_value(&value));
        *previous = rest.to_string();
    }

    if let [key, value] = parts.as_slice() {
        let (_, key) = split_last_word(key);
        attributes.insert(strip_value(key), strip_value(value));
    }

    Ok(attributes)
}

fn split_last_word(text: &str) -> (&str, &str) {
    let text = text.trim_end();
    text.rsplit_once(char::is_whitespace).unwrap_or(("", text))
}

fn strip_value(value: &str) -> &str {
    let value = value.trim();
    let value = value.strip_prefix('"').unwrap_or(value);
    value.strip_suffix('"').unwrap_or(value)
}

/// Last `count` characters of `text`, if it has that many.
fn tail_chars(text: &str, count: usize) -> Option<&str> {
    if count == 0 {
        return Some("");
    }
    text.char_indices()
        .rev()
        .nth(count - 1)
        .map(|(index, _)| &text[index..])
}

type SlotId = usize;

/// A tag under construction. `end` stays `None` while the tag is open.
#[derive(Debug)]
struct Slot {
    name: TagName,
    header: String,
    attributes: Attributes,
    start: usize,
    end: Option<usize>,
    parent: Option<SlotId>,
    children: Vec<Child>,
}

#[derive(Debug)]
enum Child {
    Tag(SlotId),
    Text(Text),
}

/// Arena-backed builder; parents are indices into `slots`.
struct TreeBuilder<'a> {
    delimiters: Delimiters,
    input: &'a str,
    slots: Vec<Slot>,
    current: SlotId,
    buffer: String,
    buffer_start: usize,
}

impl<'a> TreeBuilder<'a> {
    fn new(delimiters: Delimiters, input: &'a str) -> Self {
        let root = Slot {
            name: TagName::Root,
            header: String::new(),
            attributes: Attributes::new(),
            start: 0,
            end: None,
            parent: None,
            children: Vec::new(),
        };
        TreeBuilder {
            delimiters,
            input,
            slots: vec![root],
            current: 0,
            buffer: String::new(),
            buffer_start: 0,
        }
    }

    fn push_text(&mut self, text: &str, offset: usize) {
        if self.buffer.is_empty() {
            self.buffer_start = offset;
        }
        self.buffer.push_str(text);
    }

    /// Move pending text into the current tag.
    fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let content = std::mem::take(&mut self.buffer);
        let span = Span::new(self.buffer_start, self.buffer_start + content.len());
        self.slots[self.current]
            .children
            .push(Child::Text(Text { content, span }));
    }

    fn newline(&mut self, offset: usize) {
        if self.slots[self.current].name.is_single_line() {
            self.flush();
            while self.slots[self.current].name.is_single_line() {
                self.slots[self.current].end = Some(offset);
                match self.slots[self.current].parent {
                    Some(parent) => self.current = parent,
                    None => break,
                }
            }
        }
        self.push_text("\n", offset);
    }

    fn marker(&mut self, marker: &str, offset: usize) -> Result<()> {
        self.push_text(marker, offset);
        let after = offset + marker.len();
        let lookahead = self.input[after..].chars().next();
        let current = self.slots[self.current].name;

        let start = if current.is_literal() {
            None
        } else {
            self.start_tag(lookahead)?
        };
        if let Some((name, header, attributes)) = start {
            self.buffer.truncate(self.buffer.len() - marker.len());
            self.flush();
            self.open(name, header, attributes, offset);
            return Ok(());
        }

        if let Some(name) = self.end_tag() {
            if current.is_literal() && current != name {
                return Ok(());
            }
            let Some(target) = self.nearest_open(name) else {
                return Ok(());
            };
            self.buffer.truncate(self.buffer.len() - marker.len());
            self.flush();
            self.close_through(target, after)?;
        }

        Ok(())
    }

    /// Recognize a start tag at the tail of the buffer.
    fn start_tag(&self, lookahead: Option<char>) -> Result<Option<(TagName, String, Attributes)>> {
        let Delimiters { open, close } = self.delimiters;
        // `[b](...)` and `[[b]]` are link syntax, not tags
        if !self.buffer.ends_with(close) || lookahead == Some('(') || lookahead == Some(close) {
            return Ok(None);
        }
        let (Some(start), Some(end)) = (self.buffer.rfind(open), self.buffer.rfind(close)) else {
            return Ok(None);
        };
        if start >= end {
            return Ok(None);
        }
        let header = &self.buffer[start + open.len_utf8()..end];

        if PLAIN_TAGS.contains(&header) {
            return Ok(Some((
                TagName::from_name(header),
                header.to_string(),
                Attributes::new(),
            )));
        }

        for tag in ATTRIBUTE_TAGS {
            let Some(rest) = header.strip_prefix(tag) else {
                continue;
            };
            if rest.is_empty() || rest.starts_with(' ') || rest.starts_with('=') {
                let attributes = parse_attributes(header)?;
                return Ok(Some((TagName::from_name(tag), header.to_string(), attributes)));
            }
        }

        Ok(None)
    }

    /// Recognize an end tag at the tail of the buffer, ignoring case.
    fn end_tag(&self) -> Option<TagName> {
        let Delimiters { open, close } = self.delimiters;
        if !self.buffer.ends_with(close) {
            return None;
        }

        PLAIN_TAGS
            .iter()
            .chain(ATTRIBUTE_TAGS)
            .find(|tag| {
                let closer = format!("{open}/{tag}{close}");
                tail_chars(&self.buffer, closer.chars().count())
                    .is_some_and(|tail| tail.chars().case_fold().eq(closer.chars()))
            })
            .map(|tag| TagName::from_name(tag))
    }

    fn open(&mut self, name: TagName, header: String, attributes: Attributes, offset: usize) {
        let id = self.slots.len();
        self.slots.push(Slot {
            name,
            header,
            attributes,
            start: offset,
            end: None,
            parent: Some(self.current),
            children: Vec::new(),
        });
        self.slots[self.current].children.push(Child::Tag(id));
        self.current = id;
    }

    fn nearest_open(&self, name: TagName) -> Option<SlotId> {
        let mut cursor = Some(self.current);
        while let Some(id) = cursor {
            if self.slots[id].name == name {
                return Some(id);
            }
            cursor = self.slots[id].parent;
        }
        None
    }

    /// Close every tag from the current one up to and including `target`.
    fn close_through(&mut self, target: SlotId, end: usize) -> Result<()> {
        let mut id = self.current;
        loop {
            self.slots[id].end = Some(end);
            if id == target {
                break;
            }
            id = self.parent_of(id)?;
        }
        self.current = self.parent_of(target)?;
        Ok(())
    }

    fn parent_of(&self, id: SlotId) -> Result<SlotId> {
        let slot = &self.slots[id];
        slot.parent.ok_or_else(|| Error::MalformedTree {
            tag: slot.name,
            position: slot.start,
            detail: "closed tag has no parent".to_string(),
        })
    }

    fn finish(mut self) -> Result<Node> {
        self.flush();
        let end = self.input.len();
        let mut cursor = Some(self.current);
        while let Some(id) = cursor {
            self.slots[id].end = Some(end);
            cursor = self.slots[id].parent;
        }
        self.build(0)
    }

    fn build(&mut self, id: SlotId) -> Result<Node> {
        let children = std::mem::take(&mut self.slots[id].children);
        let mut nodes = Vec::with_capacity(children.len());
        for child in children {
            nodes.push(match child {
                Child::Tag(child) => self.build(child)?,
                Child::Text(text) => Node::Text(text),
            });
        }

        let slot = &mut self.slots[id];
        let end = slot.end.ok_or(Error::UnresolvedSpan {
            tag: slot.name,
            position: slot.start,
        })?;

        Ok(Node::Tag(Element {
            name: slot.name,
            header: std::mem::take(&mut slot.header),
            attributes: std::mem::take(&mut slot.attributes),
            span: Span::new(slot.start, end),
            children: nodes,
        }))
    }
}
