//! Generic ordered tree of named nodes used as the in-memory form of the
//! header document.
//!
//! Nodes live in an arena owned by [`Document`] and are addressed by
//! [`NodeId`] handles, so parents own their children without reference
//! cycles. The tree does no schema validation.

use crate::types::{DimapError, DimapResult};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;

/// Handle of a node inside a [`Document`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
struct Node {
    name: String,
    attributes: Vec<(String, String)>,
    text: Option<String>,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
}

/// Arena-backed element tree
#[derive(Debug, Clone, Default)]
pub struct Document {
    nodes: Vec<Node>,
    root: Option<NodeId>,
}

fn xml_error(context: &str, e: impl std::fmt::Display) -> DimapError {
    DimapError::XmlParsing(format!("{}: {}", context, e))
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a document whose root element is `name`
    pub fn with_root(name: &str) -> (Self, NodeId) {
        let mut doc = Self::new();
        let root = doc.create_node(name);
        doc.set_root(root);
        (doc, root)
    }

    /// Create a detached node; attach it with [`Document::add_child`]
    pub fn create_node(&mut self, name: &str) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            name: name.to_string(),
            attributes: Vec::new(),
            text: None,
            children: Vec::new(),
            parent: None,
        });
        id
    }

    pub fn set_root(&mut self, node: NodeId) {
        self.root = Some(node);
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Append `child` to `parent`, detaching it from any previous parent
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) {
        if let Some(old) = self.nodes[child.0].parent.take() {
            self.nodes[old.0].children.retain(|c| *c != child);
        }
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// Create a node named `name` and append it to `parent`
    pub fn add_element(&mut self, parent: NodeId, name: &str) -> NodeId {
        let node = self.create_node(name);
        self.add_child(parent, node);
        node
    }

    /// Create a text-only node and append it to `parent`
    pub fn add_text_element(&mut self, parent: NodeId, name: &str, text: impl ToString) -> NodeId {
        let node = self.add_element(parent, name);
        self.set_text(node, text.to_string());
        node
    }

    /// Set an attribute, replacing an existing value for the same key
    pub fn add_attribute(&mut self, node: NodeId, key: &str, value: impl ToString) {
        let value = value.to_string();
        let attributes = &mut self.nodes[node.0].attributes;
        match attributes.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => attributes.push((key.to_string(), value)),
        }
    }

    pub fn name(&self, node: NodeId) -> &str {
        &self.nodes[node.0].name
    }

    pub fn attribute(&self, node: NodeId, key: &str) -> Option<&str> {
        self.nodes[node.0]
            .attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn attributes(&self, node: NodeId) -> &[(String, String)] {
        &self.nodes[node.0].attributes
    }

    pub fn text(&self, node: NodeId) -> Option<&str> {
        self.nodes[node.0].text.as_deref()
    }

    pub fn set_text(&mut self, node: NodeId, text: impl Into<String>) {
        self.nodes[node.0].text = Some(text.into());
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0].children
    }

    /// First child of `node` called `name`
    pub fn find_child(&self, node: NodeId, name: &str) -> Option<NodeId> {
        self.children(node)
            .iter()
            .copied()
            .find(|c| self.nodes[c.0].name == name)
    }

    /// All children of `node` called `name`, in document order
    pub fn find_children(&self, node: NodeId, name: &str) -> Vec<NodeId> {
        self.children(node)
            .iter()
            .copied()
            .filter(|c| self.nodes[c.0].name == name)
            .collect()
    }

    /// Follow a chain of child names, e.g. `["Dataset_Id", "DATASET_NAME"]`
    pub fn find_path(&self, node: NodeId, path: &[&str]) -> Option<NodeId> {
        path.iter()
            .try_fold(node, |current, name| self.find_child(current, name))
    }

    /// Trimmed text of the first child called `name`
    pub fn child_text(&self, node: NodeId, name: &str) -> Option<&str> {
        self.find_child(node, name)
            .and_then(|c| self.text(c))
            .map(str::trim)
    }

    /// Descendants of `node` in depth-first pre-order, excluding `node`
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(node).iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        out
    }

    /// First descendant called `name` in depth-first order
    pub fn find_descendant(&self, node: NodeId, name: &str) -> Option<NodeId> {
        self.descendants(node)
            .into_iter()
            .find(|d| self.nodes[d.0].name == name)
    }

    /// Parse a header document. A Latin-1 declaration is honoured, anything
    /// else is decoded as UTF-8.
    pub fn parse(bytes: &[u8]) -> DimapResult<Self> {
        let text = if declares_latin1(bytes) {
            bytes.iter().map(|&b| b as char).collect::<String>()
        } else {
            String::from_utf8(bytes.to_vec())
                .map_err(|e| xml_error("header is not valid UTF-8", e))?
        };
        Self::parse_str(&text)
    }

    pub fn parse_str(xml: &str) -> DimapResult<Self> {
        let mut doc = Self::new();
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        let mut buf = Vec::new();
        let mut stack: Vec<NodeId> = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) => {
                    let node = doc.open_element(e)?;
                    doc.attach(&stack, node)?;
                    stack.push(node);
                }
                Ok(Event::Empty(ref e)) => {
                    let node = doc.open_element(e)?;
                    doc.attach(&stack, node)?;
                }
                Ok(Event::End(_)) => {
                    stack.pop();
                }
                Ok(Event::Text(ref e)) => {
                    let text = e.unescape().map_err(|e| xml_error("bad text content", e))?;
                    doc.append_text(&stack, &text);
                }
                Ok(Event::CData(ref e)) => {
                    let text = String::from_utf8_lossy(e).into_owned();
                    doc.append_text(&stack, &text);
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(xml_error(
                        &format!("malformed XML at position {}", reader.buffer_position()),
                        e,
                    ))
                }
                _ => {}
            }
            buf.clear();
        }

        if !stack.is_empty() {
            return Err(DimapError::XmlParsing(format!(
                "unclosed element <{}>",
                doc.name(stack[stack.len() - 1])
            )));
        }
        if doc.root.is_none() {
            return Err(DimapError::XmlParsing("document has no root element".to_string()));
        }
        Ok(doc)
    }

    fn open_element(&mut self, e: &BytesStart) -> DimapResult<NodeId> {
        let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
        let node = self.create_node(&name);
        for attr in e.attributes() {
            let attr = attr.map_err(|err| xml_error("bad attribute", err))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|err| xml_error("bad attribute value", err))?;
            self.add_attribute(node, &key, value);
        }
        Ok(node)
    }

    fn attach(&mut self, stack: &[NodeId], node: NodeId) -> DimapResult<()> {
        match stack.last() {
            Some(&parent) => self.add_child(parent, node),
            None if self.root.is_none() => self.root = Some(node),
            None => {
                return Err(DimapError::XmlParsing(
                    "document has more than one root element".to_string(),
                ))
            }
        }
        Ok(())
    }

    fn append_text(&mut self, stack: &[NodeId], text: &str) {
        if let Some(&current) = stack.last() {
            let slot = &mut self.nodes[current.0].text;
            match slot {
                Some(existing) => existing.push_str(text),
                None => *slot = Some(text.to_string()),
            }
        }
    }

    /// Serialise with a UTF-8 declaration
    pub fn to_xml_string(&self) -> DimapResult<String> {
        let bytes = self.write_xml(Some("UTF-8"))?;
        String::from_utf8(bytes).map_err(|e| xml_error("writer produced invalid UTF-8", e))
    }

    /// Serialise as ISO-8859-1, the encoding header files are stored in.
    /// Characters outside Latin-1 are replaced by `?`.
    pub fn to_xml_bytes(&self) -> DimapResult<Vec<u8>> {
        let utf8 = self.write_xml(Some("ISO-8859-1"))?;
        let text = String::from_utf8(utf8).map_err(|e| xml_error("writer produced invalid UTF-8", e))?;
        Ok(text
            .chars()
            .map(|c| if (c as u32) <= 0xFF { c as u32 as u8 } else { b'?' })
            .collect())
    }

    fn write_xml(&self, encoding: Option<&str>) -> DimapResult<Vec<u8>> {
        let root = self
            .root
            .ok_or_else(|| DimapError::XmlParsing("document has no root element".to_string()))?;
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 4);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", encoding, None)))
            .map_err(|e| xml_error("cannot write declaration", e))?;
        self.write_node(&mut writer, root)?;
        let mut bytes = writer.into_inner();
        bytes.push(b'\n');
        Ok(bytes)
    }

    fn write_node<W: std::io::Write>(&self, writer: &mut Writer<W>, id: NodeId) -> DimapResult<()> {
        let node = &self.nodes[id.0];
        let mut start = BytesStart::new(node.name.as_str());
        for (key, value) in &node.attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }

        let text = node.text.as_deref().unwrap_or("");
        if node.children.is_empty() && text.is_empty() {
            return writer
                .write_event(Event::Empty(start))
                .map_err(|e| xml_error("cannot write element", e));
        }

        writer
            .write_event(Event::Start(start))
            .map_err(|e| xml_error("cannot write element", e))?;
        if !text.is_empty() {
            writer
                .write_event(Event::Text(BytesText::new(text)))
                .map_err(|e| xml_error("cannot write text", e))?;
        }
        for &child in &node.children {
            self.write_node(writer, child)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new(node.name.as_str())))
            .map_err(|e| xml_error("cannot write element", e))
    }
}

fn declares_latin1(bytes: &[u8]) -> bool {
    let head_len = bytes.len().min(200);
    let head = String::from_utf8_lossy(&bytes[..head_len]).to_ascii_lowercase();
    match head.find("?>") {
        Some(end) => {
            let decl = &head[..end];
            decl.contains("iso-8859-1") || decl.contains("latin1")
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Document {
        let (mut doc, root) = Document::with_root("Dimap_Document");
        doc.add_attribute(root, "name", "test.dim");
        let dims = doc.add_element(root, "Raster_Dimensions");
        doc.add_text_element(dims, "NCOLS", 200);
        doc.add_text_element(dims, "NROWS", 300);
        let sbi = doc.add_element(root, "Spectral_Band_Info");
        doc.add_text_element(sbi, "BAND_NAME", "b1 & <b2>");
        doc.add_element(root, "Spectral_Band_Info");
        doc
    }

    #[test]
    fn test_lookup_by_name() {
        let doc = sample();
        let root = doc.root().unwrap();
        assert_eq!(doc.attribute(root, "name"), Some("test.dim"));
        assert_eq!(doc.find_children(root, "Spectral_Band_Info").len(), 2);
        let dims = doc.find_child(root, "Raster_Dimensions").unwrap();
        assert_eq!(doc.child_text(dims, "NROWS"), Some("300"));
        assert_eq!(
            doc.find_path(root, &["Raster_Dimensions", "NCOLS"])
                .and_then(|n| doc.text(n)),
            Some("200")
        );
        assert!(doc.find_child(root, "Masks").is_none());
    }

    #[test]
    fn test_depth_first_order() {
        let doc = sample();
        let root = doc.root().unwrap();
        let names: Vec<&str> = doc.descendants(root).into_iter().map(|n| doc.name(n)).collect();
        assert_eq!(
            names,
            vec![
                "Raster_Dimensions",
                "NCOLS",
                "NROWS",
                "Spectral_Band_Info",
                "BAND_NAME",
                "Spectral_Band_Info"
            ]
        );
    }

    #[test]
    fn test_reparent_child() {
        let (mut doc, root) = Document::with_root("a");
        let b = doc.add_element(root, "b");
        let c = doc.add_element(root, "c");
        doc.add_child(b, c);
        assert_eq!(doc.children(root), &[b]);
        assert_eq!(doc.children(b), &[c]);
        assert_eq!(doc.parent(c), Some(b));
    }

    #[test]
    fn test_xml_roundtrip_escapes_text() {
        let doc = sample();
        let xml = doc.to_xml_string().unwrap();
        assert!(xml.contains("b1 &amp; &lt;b2&gt;"));
        assert!(xml.contains("<NCOLS>200</NCOLS>"));

        let parsed = Document::parse_str(&xml).unwrap();
        let root = parsed.root().unwrap();
        let sbi = parsed.find_child(root, "Spectral_Band_Info").unwrap();
        assert_eq!(parsed.child_text(sbi, "BAND_NAME"), Some("b1 & <b2>"));
    }

    #[test]
    fn test_latin1_encoding() {
        let (mut doc, root) = Document::with_root("Dimap_Document");
        doc.add_text_element(root, "DATASET_COMMENTS", "Gr\u{fc}n");
        let bytes = doc.to_xml_bytes().unwrap();
        assert!(bytes.contains(&0xFC));

        let parsed = Document::parse(&bytes).unwrap();
        let root = parsed.root().unwrap();
        assert_eq!(parsed.child_text(root, "DATASET_COMMENTS"), Some("Gr\u{fc}n"));
    }

    #[test]
    fn test_malformed_xml() {
        assert!(matches!(
            Document::parse_str("<a><b></a>"),
            Err(DimapError::XmlParsing(_))
        ));
        assert!(Document::parse_str("").is_err());
        assert!(Document::parse_str("<a/><b/>").is_err());
    }
}
