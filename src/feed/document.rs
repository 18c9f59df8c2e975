//! Owned XML tree for feed documents.
//!
//! Feeds are small enough to hold in memory, and the merge needs to move whole
//! `<item>` subtrees from one document to another untouched. This module reads a
//! document into plain owned [`Element`]s with `quick-xml` and writes it back
//! out, either compact or indented.
//!
//! Whitespace-only text inside an element that otherwise holds only child
//! elements is layout and is not kept. Any other text, including whitespace
//! runs in mixed content or in an otherwise empty element, is kept verbatim.
//! The XML declaration, DOCTYPE and processing instructions are dropped on
//! parse; [`FeedDocument::to_xml`] always emits a fresh UTF-8 declaration.

use std::io::Cursor;
use std::path::Path;

use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use thiserror::Error;

/// Errors raised while reading or writing a feed document.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// The content is not well-formed XML.
    #[error("XML parse error at byte {position}: {message}")]
    Xml { position: u64, message: String },

    /// The document has no root element.
    #[error("Document has no root element")]
    MissingRoot,

    /// Reading the document from disk failed.
    #[error("Failed to read feed document: {0}")]
    Io(#[from] std::io::Error),

    /// Writing events to the output buffer failed.
    #[error("Failed to serialize feed document: {0}")]
    Serialize(String),
}

/// A node in the element tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    /// Unescaped character data.
    Text(String),
    CData(String),
    Comment(String),
}

/// An XML element with its qualified name (`itunes:author`, `atom:link`, ...).
///
/// Names are kept as written in the source, prefix included. Namespace
/// resolution is done against the root's `xmlns:*` declarations when needed,
/// see [`Element::namespace_prefix`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Element holding a single text node.
    pub fn with_text(name: impl Into<String>, text: impl Into<String>) -> Self {
        let mut element = Self::new(name);
        element.children.push(Node::Text(text.into()));
        element
    }

    /// Builder-style attribute setter.
    pub fn with_attr(mut self, key: &str, value: &str) -> Self {
        self.set_attr(key, value);
        self
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Overwrites an existing attribute in place or appends a new one.
    pub fn set_attr(&mut self, key: &str, value: &str) {
        match self.attributes.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value.to_string(),
            None => self.attributes.push((key.to_string(), value.to_string())),
        }
    }

    /// Direct child elements, in document order.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|e| e.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.children.iter_mut().find_map(|node| match node {
            Node::Element(e) if e.name == name => Some(e),
            _ => None,
        })
    }

    /// Index into `children` of the first child element called `name`.
    pub fn child_position(&self, name: &str) -> Option<usize> {
        self.children
            .iter()
            .position(|node| matches!(node, Node::Element(e) if e.name == name))
    }

    /// Text of a direct child element, trimmed. `None` when the child is
    /// missing or empty.
    pub fn child_text(&self, name: &str) -> Option<String> {
        let text = self.child(name)?.text();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    /// Concatenated text and CDATA content of the direct children.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for node in &self.children {
            match node {
                Node::Text(t) | Node::CData(t) => out.push_str(t),
                _ => {}
            }
        }
        out
    }

    /// Replaces all children with a single text node.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.children = vec![Node::Text(text.into())];
    }

    /// All descendant elements called `name`, depth first, in document order.
    /// Matching elements are not searched further.
    pub fn descendants_named<'a>(&'a self, name: &str, out: &mut Vec<&'a Element>) {
        for child in self.elements() {
            if child.name == name {
                out.push(child);
            } else {
                child.descendants_named(name, out);
            }
        }
    }

    /// Prefix bound to `uri` by an `xmlns:prefix="uri"` declaration on this
    /// element.
    pub fn namespace_prefix(&self, uri: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, v)| k.starts_with("xmlns:") && v == uri)
            .map(|(k, _)| &k["xmlns:".len()..])
    }

    fn write_to<W: std::io::Write>(&self, writer: &mut Writer<W>) -> Result<(), DocumentError> {
        let mut start = BytesStart::new(self.name.as_str());
        for (key, value) in &self.attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }

        if self.children.is_empty() {
            return write_event(writer, Event::Empty(start));
        }

        write_event(writer, Event::Start(start))?;
        for node in &self.children {
            match node {
                Node::Element(child) => child.write_to(writer)?,
                Node::Text(text) => write_event(writer, Event::Text(BytesText::new(text)))?,
                Node::CData(text) => write_event(writer, Event::CData(BytesCData::new(text)))?,
                Node::Comment(text) => {
                    write_event(writer, Event::Comment(BytesText::from_escaped(text)))?
                }
            }
        }
        write_event(writer, Event::End(BytesEnd::new(self.name.as_str())))
    }
}

fn write_event<W: std::io::Write>(
    writer: &mut Writer<W>,
    event: Event<'_>,
) -> Result<(), DocumentError> {
    writer
        .write_event(event)
        .map_err(|e| DocumentError::Serialize(e.to_string()))
}

/// A parsed feed document: the root element (normally `<rss>`) and its tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedDocument {
    pub root: Element,
}

impl FeedDocument {
    /// Reads and parses a document from disk.
    pub fn from_file(path: &Path) -> Result<Self, DocumentError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parses a document from a string.
    ///
    /// SEC-002: same entity handling as every other quick-xml (0.37) reader in
    /// this crate. `<!ENTITY>` declarations are never parsed, and text is
    /// unescaped with [`quick_xml::escape::unescape`], which only knows the five
    /// XML builtins. Custom entity references fail the parse.
    pub fn parse(content: &str) -> Result<Self, DocumentError> {
        let mut reader = Reader::from_str(content);

        // Open elements; the bottom of the stack is the root once it starts.
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            let event = reader.read_event().map_err(|e| DocumentError::Xml {
                position: reader.buffer_position() as u64,
                message: e.to_string(),
            })?;
            let position = reader.buffer_position() as u64;
            let xml_err = |message: String| DocumentError::Xml { position, message };

            match event {
                Event::Start(e) => {
                    stack.push(element_from_start(&e, &reader).map_err(xml_err)?);
                }
                Event::Empty(e) => {
                    let element = element_from_start(&e, &reader).map_err(xml_err)?;
                    attach(&mut stack, &mut root, element).map_err(xml_err)?;
                }
                Event::End(_) => {
                    // quick-xml already checks that end names match their starts.
                    let mut element = stack
                        .pop()
                        .ok_or_else(|| xml_err("unexpected closing tag".to_string()))?;
                    drop_layout_whitespace(&mut element);
                    attach(&mut stack, &mut root, element).map_err(xml_err)?;
                }
                Event::Text(e) => {
                    let raw = std::str::from_utf8(&e).map_err(|e| xml_err(e.to_string()))?;
                    let Some(parent) = stack.last_mut() else {
                        if raw.trim().is_empty() {
                            continue;
                        }
                        return Err(xml_err("text outside of the root element".to_string()));
                    };
                    let text = quick_xml::escape::unescape(raw).map_err(|e| xml_err(e.to_string()))?;
                    parent.children.push(Node::Text(text.into_owned()));
                }
                Event::CData(e) => {
                    let text = std::str::from_utf8(&e).map_err(|e| xml_err(e.to_string()))?;
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(Node::CData(text.to_string()));
                    }
                }
                Event::Comment(e) => {
                    let text = std::str::from_utf8(&e).map_err(|e| xml_err(e.to_string()))?;
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(Node::Comment(text.to_string()));
                    }
                }
                Event::Eof => break,
                other => {
                    tracing::trace!(event = ?other, "Ignoring prolog event");
                }
            }
        }

        if let Some(open) = stack.last() {
            return Err(DocumentError::Xml {
                position: reader.buffer_position() as u64,
                message: format!("unclosed element <{}>", open.name),
            });
        }

        root.map(|root| Self { root }).ok_or(DocumentError::MissingRoot)
    }

    /// The `<channel>` element directly under the root.
    pub fn channel(&self) -> Option<&Element> {
        self.root.child("channel")
    }

    pub fn channel_mut(&mut self) -> Option<&mut Element> {
        self.root.child_mut("channel")
    }

    /// Serializes the document with a UTF-8 XML declaration.
    ///
    /// With `indent` the output uses two-space indentation; without it the
    /// elements are written back to back.
    pub fn to_xml(&self, indent: bool) -> Result<String, DocumentError> {
        let mut writer = if indent {
            Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2)
        } else {
            Writer::new(Cursor::new(Vec::new()))
        };

        write_event(
            &mut writer,
            Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
        )?;
        if !indent {
            write_event(&mut writer, Event::Text(BytesText::from_escaped("\n")))?;
        }
        self.root.write_to(&mut writer)?;

        let mut bytes = writer.into_inner().into_inner();
        bytes.push(b'\n');
        String::from_utf8(bytes).map_err(|e| DocumentError::Serialize(e.to_string()))
    }
}

fn element_from_start(start: &BytesStart<'_>, reader: &Reader<&[u8]>) -> Result<Element, String> {
    let name = std::str::from_utf8(start.name().as_ref())
        .map_err(|e| e.to_string())?
        .to_string();
    let mut element = Element::new(name);

    let decoder = reader.decoder();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| e.to_string())?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|e| e.to_string())?
            .to_string();
        let value = attr
            .decode_and_unescape_value(decoder)
            .map_err(|e| e.to_string())?
            .into_owned();
        element.attributes.push((key, value));
    }

    Ok(element)
}

/// Attaches a finished element to its parent, or makes it the root.
/// Strips indentation from an element whose text is all whitespace between
/// child elements. Leaf elements and mixed content keep their text.
fn drop_layout_whitespace(element: &mut Element) {
    let has_elements = element
        .children
        .iter()
        .any(|node| matches!(node, Node::Element(_)));
    let only_layout = element.children.iter().all(|node| match node {
        Node::Text(text) => text.trim().is_empty(),
        _ => true,
    });
    if has_elements && only_layout {
        element
            .children
            .retain(|node| !matches!(node, Node::Text(_)));
    }
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), String> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(Node::Element(element));
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err(format!("second root element <{}>", element.name)),
    }
}
