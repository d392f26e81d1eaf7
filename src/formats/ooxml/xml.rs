use quick_xml::Reader;
use quick_xml::events::{BytesDecl, BytesStart, Event};

use crate::errors::FormatError;

/// One node of a parsed XML part
#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
    CData(String),
    /// Comments, processing instructions and doctypes, kept as written
    Raw(String),
}

/// Element with raw (still escaped) attribute values
#[derive(Debug, Clone, PartialEq, Default)]
pub struct XmlElement {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
    pub self_closing: bool,
}

/// Parsed XML part: declaration plus top level nodes
#[derive(Debug, Clone, PartialEq)]
pub struct XmlDocument {
    pub declaration: Option<(String, Option<String>, Option<String>)>,
    pub nodes: Vec<XmlNode>,
}

fn bytes_to_string(bytes: impl AsRef<[u8]>) -> String {
    String::from_utf8_lossy(bytes.as_ref()).into_owned()
}

fn xml_error(part: &str, message: impl ToString) -> FormatError {
    FormatError::Xml {
        part: part.to_string(),
        message: message.to_string(),
    }
}

fn collect_attrs(part: &str, start: &BytesStart<'_>) -> Result<Vec<(String, String)>, FormatError> {
    let mut attrs = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| xml_error(part, e))?;
        attrs.push((
            bytes_to_string(attr.key.as_ref()),
            bytes_to_string(attr.value.as_ref()),
        ));
    }
    Ok(attrs)
}

pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Escape a value for use inside a double-quoted attribute
pub fn escape_attr(value: &str) -> String {
    escape_text(value).replace('"', "&quot;")
}

impl XmlDocument {
    pub fn parse(part: &str, bytes: &[u8]) -> Result<Self, FormatError> {
        let mut reader = Reader::from_reader(bytes);
        reader.config_mut().trim_text(false);

        let mut declaration = None;
        let mut nodes: Vec<XmlNode> = Vec::new();
        let mut stack: Vec<XmlElement> = Vec::new();
        let mut buf = Vec::new();

        fn append(stack: &mut [XmlElement], nodes: &mut Vec<XmlNode>, node: XmlNode) {
            match stack.last_mut() {
                Some(parent) => parent.children.push(node),
                None => nodes.push(node),
            }
        }

        loop {
            buf.clear();
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|e| xml_error(part, e))?;
            match event {
                Event::Eof => break,
                Event::Decl(d) => {
                    let version = bytes_to_string(d.version().map_err(|e| xml_error(part, e))?);
                    let encoding = d.encoding().and_then(|r| r.ok()).map(bytes_to_string);
                    let standalone = d.standalone().and_then(|r| r.ok()).map(bytes_to_string);
                    declaration = Some((version, encoding, standalone));
                }
                Event::Start(s) => stack.push(XmlElement {
                    name: bytes_to_string(s.name().as_ref()),
                    attrs: collect_attrs(part, &s)?,
                    children: Vec::new(),
                    self_closing: false,
                }),
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| xml_error(part, "unbalanced end tag"))?;
                    append(&mut stack, &mut nodes, XmlNode::Element(element));
                }
                Event::Empty(s) => {
                    let element = XmlElement {
                        name: bytes_to_string(s.name().as_ref()),
                        attrs: collect_attrs(part, &s)?,
                        children: Vec::new(),
                        self_closing: true,
                    };
                    append(&mut stack, &mut nodes, XmlNode::Element(element));
                }
                Event::Text(t) => {
                    let text = t.unescape().map_err(|e| xml_error(part, e))?.into_owned();
                    append(&mut stack, &mut nodes, XmlNode::Text(text));
                }
                Event::CData(t) => {
                    append(&mut stack, &mut nodes, XmlNode::CData(bytes_to_string(t.into_inner())));
                }
                Event::Comment(t) => {
                    let raw = format!("<!--{}-->", bytes_to_string(t.into_inner()));
                    append(&mut stack, &mut nodes, XmlNode::Raw(raw));
                }
                Event::PI(t) => {
                    let raw = format!(
                        "<?{}{}?>",
                        bytes_to_string(t.target()),
                        bytes_to_string(t.content())
                    );
                    append(&mut stack, &mut nodes, XmlNode::Raw(raw));
                }
                Event::DocType(t) => {
                    let raw = format!("<!DOCTYPE{}>", bytes_to_string(t.into_inner()));
                    append(&mut stack, &mut nodes, XmlNode::Raw(raw));
                }
            }
        }

        if !stack.is_empty() {
            return Err(xml_error(part, "unclosed element at end of part"));
        }
        Ok(Self { declaration, nodes })
    }

    pub fn root(&self) -> Option<&XmlElement> {
        self.nodes.iter().find_map(|n| match n {
            XmlNode::Element(e) => Some(e),
            _ => None,
        })
    }

    pub fn root_mut(&mut self) -> Option<&mut XmlElement> {
        self.nodes.iter_mut().find_map(|n| match n {
            XmlNode::Element(e) => Some(e),
            _ => None,
        })
    }

    /// Root element, or an error naming the part
    pub fn require_root(&self, part: &str) -> Result<&XmlElement, FormatError> {
        self.root().ok_or_else(|| xml_error(part, "part has no root element"))
    }

    pub fn require_root_mut(&mut self, part: &str) -> Result<&mut XmlElement, FormatError> {
        self.root_mut()
            .ok_or_else(|| xml_error(part, "part has no root element"))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, FormatError> {
        let mut out = String::new();
        if let Some((version, encoding, standalone)) = &self.declaration {
            let decl = BytesDecl::new(version.as_str(), encoding.as_deref(), standalone.as_deref());
            let mut writer = quick_xml::Writer::new(Vec::new());
            writer
                .write_event(Event::Decl(decl))
                .map_err(|e| xml_error("declaration", e))?;
            out.push_str(&bytes_to_string(writer.into_inner()));
        }
        for node in &self.nodes {
            node.write_into(&mut out);
        }
        Ok(out.into_bytes())
    }
}

impl XmlNode {
    fn write_into(&self, out: &mut String) {
        match self {
            XmlNode::Element(e) => e.write_into(out),
            XmlNode::Text(t) => out.push_str(&escape_text(t)),
            XmlNode::CData(t) => {
                out.push_str("<![CDATA[");
                out.push_str(t);
                out.push_str("]]>");
            }
            XmlNode::Raw(raw) => out.push_str(raw),
        }
    }
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Add an attribute; `value` is escaped
    pub fn with_attr(mut self, key: &str, value: &str) -> Self {
        self.set_attr(key, value);
        self
    }

    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.push_element(child);
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.set_text(text);
        self
    }

    /// Raw attribute value
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Set an attribute; `value` is escaped
    pub fn set_attr(&mut self, key: &str, value: &str) {
        let escaped = escape_attr(value);
        match self.attrs.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = escaped,
            None => self.attrs.push((key.to_string(), escaped)),
        }
    }

    pub fn remove_attr(&mut self, key: &str) {
        self.attrs.retain(|(k, _)| k != key);
    }

    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }

    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|n| match n {
            XmlNode::Element(e) => Some(e),
            _ => None,
        })
    }

    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut XmlElement> {
        self.children.iter_mut().filter_map(|n| match n {
            XmlNode::Element(e) => Some(e),
            _ => None,
        })
    }

    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.elements().find(|e| e.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut XmlElement> {
        self.elements_mut().find(|e| e.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.elements().filter(move |e| e.name == name)
    }

    /// Depth-first search for the first descendant with `name`
    pub fn find(&self, name: &str) -> Option<&XmlElement> {
        for child in self.elements() {
            if child.name == name {
                return Some(child);
            }
            if let Some(found) = child.find(name) {
                return Some(found);
            }
        }
        None
    }

    /// Concatenated text of all descendant text nodes
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for node in &self.children {
            match node {
                XmlNode::Text(t) | XmlNode::CData(t) => out.push_str(t),
                XmlNode::Element(e) => e.collect_text(out),
                XmlNode::Raw(_) => {}
            }
        }
    }

    /// Replace all children with one text node
    pub fn set_text(&mut self, text: &str) {
        self.children.clear();
        if !text.is_empty() {
            self.children.push(XmlNode::Text(text.to_string()));
        }
        self.self_closing = text.is_empty();
    }

    pub fn push_element(&mut self, child: XmlElement) {
        self.children.push(XmlNode::Element(child));
        self.self_closing = false;
    }

    /// Detach the first direct child element with `name`
    pub fn take_child(&mut self, name: &str) -> Option<XmlElement> {
        let index = self
            .children
            .iter()
            .position(|n| matches!(n, XmlNode::Element(e) if e.name == name))?;
        match self.children.remove(index) {
            XmlNode::Element(e) => Some(e),
            _ => None,
        }
    }

    /// Drop every direct child element with `name`
    pub fn remove_children(&mut self, name: &str) {
        self.children
            .retain(|n| !matches!(n, XmlNode::Element(e) if e.name == name));
    }

    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        self.write_into(&mut out);
        out
    }

    fn write_into(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (key, value) in &self.attrs {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            out.push_str(value);
            out.push('"');
        }
        if self.children.is_empty() && self.self_closing {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for child in &self.children {
            child.write_into(out);
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

/// Parse a serialized element fragment, as stored in a style hint
pub fn parse_fragment(xml: &str) -> Option<XmlElement> {
    let document = XmlDocument::parse("fragment", xml.as_bytes()).ok()?;
    document.root().cloned()
}
