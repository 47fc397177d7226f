//! An owned, arena-backed XML tree for one document part.
//!
//! Nodes live in a single `Vec` and refer to each other by [`NodeId`]. Everything the grid model
//! does not touch is kept verbatim: attribute values and text are stored in their escaped form,
//! and declarations, comments, processing instructions and CDATA are kept as raw events, so an
//! unmodified tree serializes back to the bytes it was parsed from (modulo attribute quoting and
//! whitespace inside tags).
//!
//! Nodes removed by [`XmlTree::replace_children`] stay in the arena but become unreachable; a tree
//! lives for a single edit session, so they are never compacted.

use std::borrow::Cow;
use std::collections::HashMap;

use quick_xml::escape::{escape, partial_escape, unescape};
use quick_xml::events::attributes::Attribute as XmlAttribute;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::QName;
use quick_xml::{Reader, Writer};

use crate::ns::{self, Namespace};
use crate::OdsError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
struct Attr {
    name: String,
    namespace: Option<String>,
    raw_value: String,
}

impl Attr {
    fn local_name(&self) -> &str {
        split_qname(&self.name).1
    }
}

#[derive(Debug, Clone)]
pub struct Element {
    name: String,
    namespace: Option<String>,
    attrs: Vec<Attr>,
    children: Vec<NodeId>,
    /// Serialize as `<a/>` when childless. Parsed `<a></a>` keeps its long form.
    empty_tag: bool,
}

impl Element {
    /// Qualified name as written in the document (`table:table-cell`).
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn local_name(&self) -> &str {
        split_qname(&self.name).1
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

#[derive(Debug, Clone)]
enum NodeData {
    Element(Element),
    /// Escaped character data.
    Text(String),
    Other(Event<'static>),
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    data: NodeData,
}

type Scope = Vec<(Option<String>, String)>;

#[derive(Debug, Clone)]
pub struct XmlTree {
    nodes: Vec<Node>,
    /// Document-level nodes (declaration, comments, whitespace, the root element).
    top: Vec<NodeId>,
    root: NodeId,
    /// Prefix used when emitting new elements/attributes, resolved on first use.
    prefixes: HashMap<Namespace, String>,
}

/// Whether `c` may appear in an XML 1.0 document, literally or as a character reference.
pub fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}')
        || c >= '\u{10000}'
}

fn split_qname(name: &str) -> (Option<&str>, &str) {
    match name.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, name),
    }
}

fn utf8<'a>(part: &str, bytes: &'a [u8]) -> Result<&'a str, OdsError> {
    std::str::from_utf8(bytes)
        .map_err(|err| OdsError::malformed(part, format!("invalid utf-8: {err}")))
}

fn resolve<'s>(scopes: &'s [Scope], prefix: Option<&str>) -> Option<&'s str> {
    if prefix == Some("xml") {
        return Some(ns::XML);
    }
    for scope in scopes.iter().rev() {
        for (declared, uri) in scope.iter().rev() {
            if declared.as_deref() == prefix {
                // `xmlns=""` undeclares the default namespace.
                return (!uri.is_empty()).then_some(uri.as_str());
            }
        }
    }
    None
}

fn read_element(
    part: &str,
    start: &BytesStart<'_>,
    scopes: &mut Vec<Scope>,
    empty_tag: bool,
) -> Result<Element, OdsError> {
    let name = utf8(part, start.name().as_ref())?.to_string();

    let mut declared = Scope::new();
    let mut raw_attrs = Vec::new();
    for attr in start.attributes() {
        let attr = attr
            .map_err(|err| OdsError::malformed(part, format!("attribute on <{name}>: {err}")))?;
        let key = utf8(part, attr.key.as_ref())?.to_string();
        let raw_value = utf8(part, &attr.value)?.to_string();
        if key == "xmlns" {
            declared.push((None, unescape_lossy(&raw_value)));
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            declared.push((Some(prefix.to_string()), unescape_lossy(&raw_value)));
        }
        raw_attrs.push((key, raw_value));
    }
    scopes.push(declared);

    let namespace = resolve(scopes, split_qname(&name).0).map(str::to_string);
    let attrs = raw_attrs
        .into_iter()
        .map(|(name, raw_value)| {
            // Unprefixed attributes are in no namespace, whatever the default namespace is.
            let namespace = match split_qname(&name).0 {
                None | Some("xmlns") => None,
                Some(prefix) => resolve(scopes, Some(prefix)).map(str::to_string),
            };
            Attr {
                name,
                namespace,
                raw_value,
            }
        })
        .collect();

    Ok(Element {
        name,
        namespace,
        attrs,
        children: Vec::new(),
        empty_tag,
    })
}

fn unescape_lossy(raw: &str) -> String {
    match unescape(raw) {
        Ok(value) => value.into_owned(),
        Err(_) => raw.to_string(),
    }
}

impl XmlTree {
    /// Parse `bytes` (the contents of archive entry `part`) into an owned tree.
    pub fn parse(part: &str, bytes: &[u8]) -> Result<Self, OdsError> {
        let mut reader = Reader::from_reader(bytes);
        reader.config_mut().trim_text(false);

        let mut tree = XmlTree {
            nodes: Vec::new(),
            top: Vec::new(),
            root: NodeId(0),
            prefixes: HashMap::new(),
        };
        let mut root = None;
        let mut open: Vec<NodeId> = Vec::new();
        let mut scopes: Vec<Scope> = Vec::new();
        let mut buf = Vec::new();

        loop {
            let event = match reader.read_event_into(&mut buf) {
                Ok(event) => event,
                Err(err) => {
                    return Err(OdsError::malformed(
                        part,
                        format!("at byte {}: {err}", reader.buffer_position()),
                    ))
                }
            };
            match event {
                Event::Eof => break,
                Event::Start(start) => {
                    let element = read_element(part, &start, &mut scopes, false)?;
                    let parent = open.last().copied();
                    let id = tree.attach(parent, NodeData::Element(element));
                    if parent.is_none() {
                        root.get_or_insert(id);
                    }
                    open.push(id);
                }
                Event::Empty(start) => {
                    let element = read_element(part, &start, &mut scopes, true)?;
                    let parent = open.last().copied();
                    let id = tree.attach(parent, NodeData::Element(element));
                    if parent.is_none() {
                        root.get_or_insert(id);
                    }
                    scopes.pop();
                }
                Event::End(_) => {
                    open.pop();
                    scopes.pop();
                }
                Event::Text(text) => {
                    let raw = utf8(part, &text)?.to_string();
                    tree.attach(open.last().copied(), NodeData::Text(raw));
                }
                other => {
                    tree.attach(open.last().copied(), NodeData::Other(other.into_owned()));
                }
            }
            buf.clear();
        }

        if let Some(&unclosed) = open.last() {
            let name = tree.element(unclosed).map(Element::name).unwrap_or("?");
            return Err(OdsError::malformed(
                part,
                format!("unexpected end of document inside <{name}>"),
            ));
        }
        tree.root = root.ok_or_else(|| OdsError::malformed(part, "no root element"))?;
        Ok(tree)
    }

    /// Serialize the tree back to XML bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, OdsError> {
        let mut writer = Writer::new(Vec::new());
        for &id in &self.top {
            self.write_node(&mut writer, id)?;
        }
        Ok(writer.into_inner())
    }

    fn write_node(&self, writer: &mut Writer<Vec<u8>>, id: NodeId) -> Result<(), OdsError> {
        match &self.nodes[id.0].data {
            NodeData::Element(el) => {
                let mut start = BytesStart::new(el.name.as_str());
                for attr in &el.attrs {
                    let value = if attr.raw_value.contains('"') {
                        // Originally single-quoted; we always emit double quotes.
                        Cow::Owned(attr.raw_value.replace('"', "&quot;").into_bytes())
                    } else {
                        Cow::Borrowed(attr.raw_value.as_bytes())
                    };
                    start.push_attribute(XmlAttribute {
                        key: QName(attr.name.as_bytes()),
                        value,
                    });
                }
                if el.children.is_empty() && el.empty_tag {
                    writer.write_event(Event::Empty(start))?;
                    return Ok(());
                }
                writer.write_event(Event::Start(start))?;
                for &child in &el.children {
                    self.write_node(writer, child)?;
                }
                writer.write_event(Event::End(BytesEnd::new(el.name.as_str())))?;
            }
            NodeData::Text(raw) => {
                writer.write_event(Event::Text(BytesText::from_escaped(raw.as_str())))?;
            }
            NodeData::Other(event) => {
                writer.write_event(event.clone())?;
            }
        }
        Ok(())
    }

    fn attach(&mut self, parent: Option<NodeId>, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node { parent, data });
        match parent {
            Some(parent) => {
                if let NodeData::Element(el) = &mut self.nodes[parent.0].data {
                    el.children.push(id);
                }
            }
            None => self.top.push(id),
        }
        id
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.nodes.get(id.0)?.data {
            NodeData::Element(el) => Some(el),
            _ => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match &mut self.nodes.get_mut(id.0)?.data {
            NodeData::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0)?.parent
    }

    /// Children of an element; empty for text and other nodes.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.element(id).map(Element::children).unwrap_or(&[])
    }

    /// Whether `id` is an element named `local` in namespace `ns`.
    pub fn is(&self, id: NodeId, ns: Namespace, local: &str) -> bool {
        self.element(id)
            .is_some_and(|el| el.namespace() == Some(ns.uri()) && el.local_name() == local)
    }

    pub fn child_elements<'a>(
        &'a self,
        parent: NodeId,
        ns: Namespace,
        local: &'a str,
    ) -> impl Iterator<Item = NodeId> + 'a {
        self.children(parent)
            .iter()
            .copied()
            .filter(move |&child| self.is(child, ns, local))
    }

    /// First descendant of `from` (document order, `from` itself excluded) matching `ns`/`local`.
    pub fn descendant(&self, from: NodeId, ns: Namespace, local: &str) -> Option<NodeId> {
        let mut stack: Vec<NodeId> = self.children(from).iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            if self.is(id, ns, local) {
                return Some(id);
            }
            stack.extend(self.children(id).iter().rev().copied());
        }
        None
    }

    /// Unescaped character data of a text node.
    pub fn text(&self, id: NodeId) -> Option<String> {
        match &self.nodes.get(id.0)?.data {
            NodeData::Text(raw) => Some(unescape_lossy(raw)),
            _ => None,
        }
    }

    /// Unescaped value of the attribute `local` in namespace `ns_uri`.
    pub fn attribute(&self, id: NodeId, ns_uri: &str, local: &str) -> Option<String> {
        self.element(id)?
            .attrs
            .iter()
            .find(|a| a.namespace.as_deref() == Some(ns_uri) && a.local_name() == local)
            .map(|a| unescape_lossy(&a.raw_value))
    }

    pub fn set_attribute(&mut self, id: NodeId, ns: Namespace, local: &str, value: &str) {
        let prefix = self.prefix_for(ns);
        let raw_value = escape(value).into_owned();
        let Some(el) = self.element_mut(id) else {
            return;
        };
        if let Some(existing) = el
            .attrs
            .iter_mut()
            .find(|a| a.namespace.as_deref() == Some(ns.uri()) && a.local_name() == local)
        {
            existing.raw_value = raw_value;
            return;
        }
        el.attrs.push(Attr {
            name: format!("{prefix}:{local}"),
            namespace: Some(ns.uri().to_string()),
            raw_value,
        });
    }

    /// Keep only the attributes for which `keep(namespace_uri, local_name)` returns `true`.
    pub fn retain_attributes(
        &mut self,
        id: NodeId,
        mut keep: impl FnMut(Option<&str>, &str) -> bool,
    ) {
        if let Some(el) = self.element_mut(id) {
            el.attrs
                .retain(|a| keep(a.namespace.as_deref(), split_qname(&a.name).1));
        }
    }

    /// Create a detached, childless element. Attach it with [`Self::append_child`] or
    /// [`Self::insert_child`].
    pub fn create_element(&mut self, ns: Namespace, local: &str) -> NodeId {
        let prefix = self.prefix_for(ns);
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent: None,
            data: NodeData::Element(Element {
                name: format!("{prefix}:{local}"),
                namespace: Some(ns.uri().to_string()),
                attrs: Vec::new(),
                children: Vec::new(),
                empty_tag: true,
            }),
        });
        id
    }

    /// Create a detached text node carrying `text` (escaped on the way in).
    ///
    /// A carriage return is written as `&#13;`; a literal one would be read back as `\n` by any
    /// conforming parser.
    pub fn create_text(&mut self, text: &str) -> NodeId {
        let mut raw = partial_escape(text).into_owned();
        if raw.contains('\r') {
            raw = raw.replace('\r', "&#13;");
        }
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent: None,
            data: NodeData::Text(raw),
        });
        id
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        let len = self.children(parent).len();
        self.insert_child(parent, len, child);
    }

    /// Insert `child` at `index` among `parent`'s children (clamped to the end).
    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
        self.detach(child);
        let Some(el) = self.element_mut(parent) else {
            return;
        };
        let index = index.min(el.children.len());
        el.children.insert(index, child);
        self.nodes[child.0].parent = Some(parent);
    }

    /// Drop all of `parent`'s children and attach `children` in their place.
    pub fn replace_children(&mut self, parent: NodeId, children: Vec<NodeId>) {
        let old = match self.element_mut(parent) {
            Some(el) => std::mem::take(&mut el.children),
            None => return,
        };
        for id in old {
            self.nodes[id.0].parent = None;
        }
        for child in children {
            self.append_child(parent, child);
        }
    }

    /// Index of `id` within its parent's children.
    pub fn position_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|&c| c == id)
    }

    fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.nodes[id.0].parent.take() else {
            return;
        };
        if let Some(el) = self.element_mut(parent) {
            el.children.retain(|&c| c != id);
        }
    }

    /// Prefix bound to `ns` on the root element, declaring one there if the document lacks it.
    fn prefix_for(&mut self, ns: Namespace) -> String {
        if let Some(prefix) = self.prefixes.get(&ns) {
            return prefix.clone();
        }

        let root = self.root;
        let declared = self.element(root).and_then(|el| {
            el.attrs.iter().find_map(|a| {
                let prefix = a.name.strip_prefix("xmlns:")?;
                (unescape_lossy(&a.raw_value) == ns.uri()).then(|| prefix.to_string())
            })
        });

        let prefix = match declared {
            Some(prefix) => prefix,
            None => {
                let base = ns.default_prefix();
                let taken = |tree: &XmlTree, candidate: &str| {
                    let decl = format!("xmlns:{candidate}");
                    tree.element(root)
                        .is_some_and(|el| el.attrs.iter().any(|a| a.name == decl))
                };
                let mut candidate = base.to_string();
                let mut n = 1;
                while taken(self, &candidate) {
                    candidate = format!("{base}{n}");
                    n += 1;
                }
                log::debug!("declaring xmlns:{candidate}={} on the root element", ns.uri());
                if let Some(el) = self.element_mut(root) {
                    el.attrs.push(Attr {
                        name: format!("xmlns:{candidate}"),
                        namespace: None,
                        raw_value: ns.uri().to_string(),
                    });
                }
                candidate
            }
        };

        self.prefixes.insert(ns, prefix.clone());
        prefix
    }
}
