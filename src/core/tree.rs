//! Owned, mutable XML tree for one document part.
//!
//! Built from `quick-xml` namespace-resolved events so that every element and
//! attribute knows its namespace URI, while the source prefixes, attribute
//! order and escaping are kept as they were read. Serializing an untouched
//! tree reproduces the input markup.

use crate::error::DocxError;
use quick_xml::escape::{escape, unescape};
use quick_xml::events::attributes::Attribute as XmlAttribute;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::{QName, ResolveResult};
use quick_xml::reader::NsReader;
use quick_xml::Writer;
use std::borrow::Cow;

/// Child-index path from the document's top level down to a node.
pub type NodePath = Vec<usize>;

/// Where an element came from. Only parsed elements take part in anchor
/// searches; synthesized ones are the engine's own output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Parsed,
    Synthesized,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub namespace: Option<String>,
    value: String,
}

impl Attribute {
    /// `value` is plain text; it is escaped on construction and characters
    /// XML 1.0 cannot carry are dropped.
    pub fn new(name: impl Into<String>, namespace: Option<&str>, value: &str) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.map(str::to_string),
            value: escape(&xml_chars_only(value)).into_owned(),
        }
    }

    pub fn local_name(&self) -> &str {
        local_part(&self.name)
    }

    pub fn value(&self) -> Cow<'_, str> {
        unescape(&self.value).unwrap_or(Cow::Borrowed(self.value.as_str()))
    }

    pub fn raw_value(&self) -> &str {
        &self.value
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    /// Character data, stored escaped exactly as it appears in markup.
    Text(String),
    CData(String),
    Comment(String),
    ProcessingInstruction(String),
    Declaration(String),
    DocType(String),
}

impl Node {
    /// Text node from plain text. Characters XML 1.0 cannot carry (most C0
    /// controls, U+FFFE, U+FFFF) are dropped so the output always parses.
    pub fn text(content: &str) -> Self {
        Node::Text(escape(&xml_chars_only(content)).into_owned())
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut Element> {
        match self {
            Node::Element(element) => Some(element),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: String,
    pub namespace: Option<String>,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Node>,
    self_closing: bool,
    origin: Origin,
}

impl Element {
    pub fn new(name: impl Into<String>, namespace: Option<&str>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.map(str::to_string),
            attributes: Vec::new(),
            children: Vec::new(),
            self_closing: true,
            origin: Origin::Synthesized,
        }
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn local_name(&self) -> &str {
        local_part(&self.name)
    }

    pub fn prefix(&self) -> Option<&str> {
        self.name.split_once(':').map(|(prefix, _)| prefix)
    }

    pub fn is(&self, namespace: &str, local_name: &str) -> bool {
        self.namespace.as_deref() == Some(namespace) && self.local_name() == local_name
    }

    pub fn attribute(&self, namespace: Option<&str>, local_name: &str) -> Option<Cow<'_, str>> {
        self.attributes
            .iter()
            .find(|attr| attr.namespace.as_deref() == namespace && attr.local_name() == local_name)
            .map(Attribute::value)
    }

    /// Set an attribute, replacing one with the same namespace and local name.
    pub fn set_attribute(&mut self, attribute: Attribute) {
        let existing = self.attributes.iter_mut().find(|attr| {
            attr.namespace == attribute.namespace && attr.local_name() == attribute.local_name()
        });
        match existing {
            Some(slot) => *slot = attribute,
            None => self.attributes.push(attribute),
        }
    }

    pub fn push(&mut self, node: Node) {
        self.children.push(node);
    }

    pub fn insert(&mut self, index: usize, node: Node) {
        self.children.insert(index, node);
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    pub fn find_child(&self, namespace: &str, local_name: &str) -> Option<&Element> {
        self.child_elements().find(|child| child.is(namespace, local_name))
    }

    /// Remove every direct child element with this name; returns how many went.
    pub fn remove_children(&mut self, namespace: &str, local_name: &str) -> usize {
        let before = self.children.len();
        self.children
            .retain(|node| !matches!(node, Node::Element(child) if child.is(namespace, local_name)));
        before - self.children.len()
    }

    /// Every element below this one, in document order.
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants {
            stack: vec![self.children.iter()],
        }
    }

    /// Unescaped text of the direct text and CDATA children.
    pub fn text(&self) -> String {
        let mut text = String::new();
        for child in &self.children {
            match child {
                Node::Text(raw) => {
                    text.push_str(&unescape(raw).unwrap_or(Cow::Borrowed(raw.as_str())))
                }
                Node::CData(raw) => text.push_str(raw),
                _ => {}
            }
        }
        text
    }

    /// Apply `rename` to this element and every element and attribute below
    /// it whose namespace is `namespace`.
    pub fn requalify(&mut self, namespace: &str, rename: &dyn Fn(&str) -> String) {
        if self.namespace.as_deref() == Some(namespace) {
            self.name = rename(self.local_name());
        }
        for attr in &mut self.attributes {
            if attr.namespace.as_deref() == Some(namespace) {
                attr.name = rename(attr.local_name());
            }
        }
        for child in &mut self.children {
            if let Node::Element(element) = child {
                element.requalify(namespace, rename);
            }
        }
    }

    fn from_start(
        reader: &NsReader<&[u8]>,
        start: &BytesStart,
        namespace: Option<String>,
        self_closing: bool,
    ) -> Result<Self, DocxError> {
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| DocxError::MalformedMarkup(e.to_string()))?;
            let (resolved, _) = reader.resolve_attribute(attr.key);
            attributes.push(Attribute {
                name: utf8(attr.key.as_ref())?,
                namespace: namespace_uri(resolved),
                value: utf8(&attr.value)?,
            });
        }

        Ok(Self {
            name: utf8(start.name().as_ref())?,
            namespace,
            attributes,
            children: Vec::new(),
            self_closing,
            origin: Origin::Parsed,
        })
    }
}

pub struct Descendants<'a> {
    stack: Vec<std::slice::Iter<'a, Node>>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Element;

    fn next(&mut self) -> Option<&'a Element> {
        while let Some(children) = self.stack.last_mut() {
            match children.next() {
                Some(Node::Element(element)) => {
                    self.stack.push(element.children.iter());
                    return Some(element);
                }
                Some(_) => continue,
                None => {
                    self.stack.pop();
                }
            }
        }
        None
    }
}

/// A parsed document part: prolog, exactly one root element, trailing misc.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentTree {
    nodes: Vec<Node>,
}

impl DocumentTree {
    /// Parse markup into a tree. Well-formedness (including namespace
    /// bindings) is checked with `roxmltree` first, so a document rejected
    /// here is rejected by text extraction too.
    pub fn parse(xml: &str) -> Result<Self, DocxError> {
        let xml = xml.strip_prefix('\u{feff}').unwrap_or(xml);
        roxmltree::Document::parse(xml)?;

        let mut reader = NsReader::from_str(xml);
        let mut open: Vec<Element> = Vec::new();
        let mut nodes: Vec<Node> = Vec::new();

        loop {
            let (resolved, event) = reader.read_resolved_event()?;
            let namespace = namespace_uri(resolved);
            match event {
                Event::Start(start) => {
                    open.push(Element::from_start(&reader, &start, namespace, false)?);
                }
                Event::Empty(start) => {
                    let element = Element::from_start(&reader, &start, namespace, true)?;
                    attach(&mut open, &mut nodes, Node::Element(element));
                }
                Event::End(_) => {
                    let element = open.pop().ok_or_else(|| {
                        DocxError::MalformedMarkup("closing tag without an open element".into())
                    })?;
                    attach(&mut open, &mut nodes, Node::Element(element));
                }
                Event::Text(text) => attach(&mut open, &mut nodes, Node::Text(utf8(&text)?)),
                Event::CData(cdata) => attach(&mut open, &mut nodes, Node::CData(utf8(&cdata)?)),
                Event::Comment(comment) => {
                    attach(&mut open, &mut nodes, Node::Comment(utf8(&comment)?))
                }
                Event::PI(pi) => {
                    attach(&mut open, &mut nodes, Node::ProcessingInstruction(utf8(&pi)?))
                }
                Event::Decl(decl) => attach(&mut open, &mut nodes, Node::Declaration(utf8(&decl)?)),
                Event::DocType(doctype) => {
                    attach(&mut open, &mut nodes, Node::DocType(utf8(&doctype)?))
                }
                Event::Eof => break,
            }
        }

        if let Some(element) = open.last() {
            return Err(DocxError::MalformedMarkup(format!(
                "element <{}> is never closed",
                element.name
            )));
        }
        if nodes.iter().filter(|node| node.as_element().is_some()).count() != 1 {
            return Err(DocxError::MalformedMarkup(
                "document must have exactly one root element".into(),
            ));
        }

        Ok(Self { nodes })
    }

    pub fn root(&self) -> Option<&Element> {
        self.nodes.iter().find_map(Node::as_element)
    }

    /// Path of the first element, in document order, accepted by `predicate`.
    pub fn find_element(&self, mut predicate: impl FnMut(&Element) -> bool) -> Option<NodePath> {
        let mut path = Vec::new();
        if find_in(&self.nodes, &mut path, &mut predicate) {
            Some(path)
        } else {
            None
        }
    }

    pub fn element(&self, path: &[usize]) -> Option<&Element> {
        let (first, rest) = path.split_first()?;
        let mut current = self.nodes.get(*first)?.as_element()?;
        for index in rest {
            current = current.children.get(*index)?.as_element()?;
        }
        Some(current)
    }

    pub fn element_mut(&mut self, path: &[usize]) -> Option<&mut Element> {
        let (first, rest) = path.split_first()?;
        let mut current = self.nodes.get_mut(*first)?.as_element_mut()?;
        for index in rest {
            current = current.children.get_mut(*index)?.as_element_mut()?;
        }
        Some(current)
    }

    /// Insert `node` as the immediate next sibling of the element at `path`.
    /// Returns false when `path` does not name an element below the root.
    pub fn insert_after(&mut self, path: &[usize], node: Node) -> bool {
        let Some((last, parent_path)) = path.split_last() else {
            return false;
        };
        if parent_path.is_empty() {
            return false;
        }
        match self.element_mut(parent_path) {
            Some(parent) if *last < parent.children.len() => {
                parent.insert(last + 1, node);
                true
            }
            _ => false,
        }
    }

    pub fn to_xml(&self) -> Result<String, DocxError> {
        let mut writer = Writer::new(Vec::new());
        for node in &self.nodes {
            write_node(&mut writer, node)?;
        }
        String::from_utf8(writer.into_inner())
            .map_err(|e| DocxError::MalformedMarkup(format!("serialized markup is not UTF-8: {}", e)))
    }
}

/// The `Char` production of XML 1.0.
pub fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..='\u{10FFFF}')
}

fn xml_chars_only(text: &str) -> Cow<'_, str> {
    if text.chars().all(is_xml_char) {
        Cow::Borrowed(text)
    } else {
        Cow::Owned(text.chars().filter(|c| is_xml_char(*c)).collect())
    }
}

fn local_part(name: &str) -> &str {
    name.split_once(':').map_or(name, |(_, local)| local)
}

fn utf8(bytes: &[u8]) -> Result<String, DocxError> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|e| DocxError::MalformedMarkup(e.to_string()))
}

fn namespace_uri(resolved: ResolveResult) -> Option<String> {
    match resolved {
        ResolveResult::Bound(namespace) => {
            Some(String::from_utf8_lossy(namespace.0).into_owned())
        }
        _ => None,
    }
}

fn attach(open: &mut [Element], nodes: &mut Vec<Node>, node: Node) {
    match open.last_mut() {
        Some(parent) => parent.push(node),
        None => nodes.push(node),
    }
}

fn find_in(
    nodes: &[Node],
    path: &mut NodePath,
    predicate: &mut dyn FnMut(&Element) -> bool,
) -> bool {
    for (index, node) in nodes.iter().enumerate() {
        if let Node::Element(element) = node {
            path.push(index);
            if predicate(element) || find_in(&element.children, path, predicate) {
                return true;
            }
            path.pop();
        }
    }
    false
}

fn write_node(writer: &mut Writer<Vec<u8>>, node: &Node) -> Result<(), DocxError> {
    match node {
        Node::Element(element) => {
            let mut start = BytesStart::new(element.name.as_str());
            for attr in &element.attributes {
                // Values read from single-quoted attributes may hold a bare `"`.
                let value = if attr.value.contains('"') {
                    Cow::Owned(attr.value.replace('"', "&quot;").into_bytes())
                } else {
                    Cow::Borrowed(attr.value.as_bytes())
                };
                start.push_attribute(XmlAttribute {
                    key: QName(attr.name.as_bytes()),
                    value,
                });
            }
            if element.children.is_empty() && element.self_closing {
                writer.write_event(Event::Empty(start))?;
            } else {
                writer.write_event(Event::Start(start))?;
                for child in &element.children {
                    write_node(writer, child)?;
                }
                writer.write_event(Event::End(BytesEnd::new(element.name.as_str())))?;
            }
        }
        Node::Text(raw) => writer.write_event(Event::Text(BytesText::from_escaped(raw.as_str())))?,
        Node::CData(raw) => writer.write_event(Event::CData(BytesCData::new(raw.as_str())))?,
        Node::Comment(raw) => {
            writer.write_event(Event::Comment(BytesText::from_escaped(raw.as_str())))?
        }
        Node::ProcessingInstruction(raw) => {
            writer.write_event(Event::PI(BytesText::from_escaped(raw.as_str())))?
        }
        Node::Declaration(raw) => writer.write_event(Event::Decl(BytesDecl::from_start(
            BytesStart::from_content(raw.as_str(), 3),
        )))?,
        Node::DocType(raw) => {
            writer.write_event(Event::DocType(BytesText::from_escaped(raw.as_str())))?
        }
    }
    Ok(())
}
