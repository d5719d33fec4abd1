//! XML tag extraction for registrar responses.
//!
//! Responses are parsed once into a [`TagNode`] tree; every command then pulls
//! its fields out with [`TagNode::extract`] (all matches, document order) or
//! the stricter [`TagNode::require`].

use crate::error::{ExpensiveError, ExpensiveResult};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;

/// An element of a parsed XML document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagNode {
    pub name: String,
    pub attributes: HashMap<String, String>,
    /// Direct text content, `None` when the element holds no text.
    pub content: Option<String>,
    pub children: Vec<TagNode>,
}

impl TagNode {
    /// Parse a complete XML document and return its root element.
    pub fn parse(source: &str) -> ExpensiveResult<TagNode> {
        let mut reader = Reader::from_str(source);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<TagNode> = Vec::new();
        let mut root: Option<TagNode> = None;

        loop {
            let event = match reader.read_event() {
                Ok(event) => event,
                Err(err) => {
                    let position = reader.buffer_position() as usize;
                    return Err(malformed(source, position, &err.to_string()));
                }
            };

            match event {
                Event::Start(start) => stack.push(open_node(&start)?),
                Event::Empty(start) => {
                    let node = open_node(&start)?;
                    attach(&mut stack, &mut root, node, source)?;
                }
                Event::End(_) => {
                    let node = stack.pop().ok_or_else(|| {
                        ExpensiveError::Parse("Unexpected closing tag".to_string())
                    })?;
                    attach(&mut stack, &mut root, node, source)?;
                }
                Event::Text(text) => {
                    let value = text.unescape().map_err(|e| {
                        let position = reader.buffer_position() as usize;
                        malformed(source, position, &e.to_string())
                    })?;
                    push_content(&mut stack, &value);
                }
                Event::CData(data) => {
                    push_content(&mut stack, &String::from_utf8_lossy(&data));
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(open) = stack.last() {
            return Err(ExpensiveError::Parse(format!(
                "Unclosed tag <{}> at end of document",
                open.name
            )));
        }

        root.ok_or_else(|| ExpensiveError::Parse("Document has no root element".to_string()))
    }

    /// All elements named `name` at any depth, this node included, in document order.
    pub fn extract(&self, name: &str) -> Vec<&TagNode> {
        let mut found = Vec::new();
        self.collect(name, &mut found);
        found
    }

    fn collect<'a>(&'a self, name: &str, found: &mut Vec<&'a TagNode>) {
        if self.name == name {
            found.push(self);
        }
        for child in &self.children {
            child.collect(name, found);
        }
    }

    /// First element named `name` in document order.
    pub fn first(&self, name: &str) -> Option<&TagNode> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.first(name))
    }

    /// Like [`first`](Self::first) but a missing tag is a parse error.
    pub fn require(&self, name: &str) -> ExpensiveResult<&TagNode> {
        self.first(name)
            .ok_or_else(|| ExpensiveError::Parse(format!("Could not extract tag {}", name)))
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }

    /// Attribute parsed as a registrar boolean (`true`/`false`, any case).
    pub fn attr_bool(&self, key: &str) -> bool {
        self.attr(key)
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }
}

/// Parse `source` and return owned copies of every `tag_name` element.
pub fn extract_tag(tag_name: &str, source: &str) -> ExpensiveResult<Vec<TagNode>> {
    let root = TagNode::parse(source)?;
    Ok(root.extract(tag_name).into_iter().cloned().collect())
}

fn open_node(start: &BytesStart<'_>) -> ExpensiveResult<TagNode> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut attributes = HashMap::new();

    for attr in start.attributes() {
        let attr = attr.map_err(|e| {
            ExpensiveError::Parse(format!("Bad attribute in <{}>: {}", name, e))
        })?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().map_err(|e| {
            ExpensiveError::Parse(format!("Bad attribute {} in <{}>: {}", key, name, e))
        })?;
        attributes.insert(key, value.into_owned());
    }

    Ok(TagNode {
        name,
        attributes,
        content: None,
        children: Vec::new(),
    })
}

fn attach(
    stack: &mut [TagNode],
    root: &mut Option<TagNode>,
    node: TagNode,
    source: &str,
) -> ExpensiveResult<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None if root.is_none() => *root = Some(node),
        None => {
            let fragment = source.get(..source.len().min(80)).unwrap_or_default();
            return Err(ExpensiveError::Parse(format!(
                "Multiple root elements (second is <{}>) in: {}",
                node.name, fragment
            )));
        }
    }
    Ok(())
}

fn push_content(stack: &mut [TagNode], value: &str) {
    if let Some(node) = stack.last_mut() {
        node.content.get_or_insert_with(String::new).push_str(value);
    }
}

fn malformed(source: &str, position: usize, reason: &str) -> ExpensiveError {
    let end = floor_boundary(source, position.saturating_add(20));
    let start = floor_boundary(source, position.saturating_sub(40));
    ExpensiveError::Parse(format!(
        "Malformed XML at byte {}: {} near `{}`",
        position,
        reason,
        &source[start..end]
    ))
}

fn floor_boundary(source: &str, index: usize) -> usize {
    let mut index = index.min(source.len());
    while !source.is_char_boundary(index) {
        index -= 1;
    }
    index
}
