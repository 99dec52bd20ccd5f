//! Arena DOM populated from `scraper` parse trees.

use ego_tree::NodeRef;
use scraper::node::Node as ParsedNode;
use scraper::Html;

use crate::page::{ElementAccess, NodeId, PageError};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

#[derive(Debug, Clone)]
pub(crate) enum NodeKind {
    Document,
    Doctype(String),
    Element(ElementData),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) kind: NodeKind,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
}

/// One element's tag and attributes. Attribute writes are remembered until
/// the page drains them into mutation records.
#[derive(Debug, Clone)]
pub struct ElementData {
    tag: String,
    attributes: Vec<(String, String)>,
    changed: Vec<String>,
}

impl ElementData {
    pub(crate) fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attributes: Vec::new(),
            changed: Vec::new(),
        }
    }

    pub(crate) fn take_changes(&mut self) -> Vec<String> {
        std::mem::take(&mut self.changed)
    }

    fn insert_attribute(&mut self, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();
        match self.attributes.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = value.to_string(),
            None => self.attributes.push((name, value.to_string())),
        }
    }

    fn declarations(&self) -> Vec<(String, String)> {
        self.attribute("style").map(parse_declarations).unwrap_or_default()
    }
}

impl ElementAccess for ElementData {
    fn tag_name(&self) -> &str {
        &self.tag
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn set_attribute(&mut self, name: &str, value: &str) -> Result<(), PageError> {
        self.insert_attribute(name, value);
        self.changed.push(name.to_ascii_lowercase());
        Ok(())
    }

    fn has_class(&self, class: &str) -> bool {
        self.attribute("class")
            .is_some_and(|classes| classes.split_ascii_whitespace().any(|c| c == class))
    }

    fn inline_style(&self, property: &str) -> Option<String> {
        let declarations = self.declarations();
        if property == "background-image" {
            return background_image(&declarations);
        }
        declarations
            .iter()
            .rev()
            .find(|(name, _)| name == property)
            .map(|(_, value)| value.clone())
    }

    fn set_inline_style(&mut self, property: &str, value: &str) -> Result<(), PageError> {
        let mut declarations = self.declarations();
        match declarations.iter_mut().find(|(name, _)| name == property) {
            Some((_, existing)) => *existing = value.to_string(),
            None => declarations.push((property.to_string(), value.to_string())),
        }
        let text = declarations
            .iter()
            .map(|(name, value)| format!("{name}: {value};"))
            .collect::<Vec<_>>()
            .join(" ");
        self.set_attribute("style", &text)
    }
}

/// Splits `a: b; c: d` into lowercase names and trimmed values. Semicolons
/// inside parentheses or quotes do not split.
pub(crate) fn parse_declarations(text: &str) -> Vec<(String, String)> {
    split_top_level(text, ';')
        .into_iter()
        .filter_map(|declaration| {
            let (name, value) = declaration.split_once(':')?;
            let name = name.trim().to_ascii_lowercase();
            let value = value.trim();
            let value = value
                .strip_suffix("!important")
                .map(str::trim_end)
                .unwrap_or(value);
            (!name.is_empty()).then(|| (name, value.to_string()))
        })
        .collect()
}

/// The `background-image` longhand, falling back to the `url()` token of a
/// `background` shorthand.
pub(crate) fn background_image(declarations: &[(String, String)]) -> Option<String> {
    let last = |wanted: &str| {
        declarations
            .iter()
            .rev()
            .find(|(name, _)| name == wanted)
            .map(|(_, value)| value.as_str())
    };
    if let Some(value) = last("background-image") {
        return Some(value.to_string());
    }
    let shorthand = last("background")?;
    imgproxy_core::url_tokens(shorthand)
        .first()
        .map(|token| shorthand[token.range.clone()].to_string())
}

pub(crate) fn split_top_level(text: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (index, ch) in text.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(ch),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, c) if c == separator && depth == 0 => {
                parts.push(&text[start..index]);
                start = index + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

#[derive(Debug, Clone)]
pub(crate) struct Dom {
    nodes: Vec<Node>,
}

impl Dom {
    /// A DOM whose node 0 is the main document.
    pub(crate) fn new() -> Self {
        Self {
            nodes: vec![Node {
                kind: NodeKind::Document,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    pub(crate) const ROOT: NodeId = NodeId(0);

    pub(crate) fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    pub(crate) fn create_document(&mut self) -> NodeId {
        self.alloc(NodeKind::Document)
    }

    pub(crate) fn create_element(&mut self, tag: &str) -> NodeId {
        self.alloc(NodeKind::Element(ElementData::new(tag)))
    }

    pub(crate) fn element(&self, id: NodeId) -> Option<&ElementData> {
        match &self.node(id)?.kind {
            NodeKind::Element(data) => Some(data),
            _ => None,
        }
    }

    pub(crate) fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match &mut self.nodes.get_mut(id.0)?.kind {
            NodeKind::Element(data) => Some(data),
            _ => None,
        }
    }

    pub(crate) fn elements_mut(&mut self) -> impl Iterator<Item = (NodeId, &mut ElementData)> {
        self.nodes
            .iter_mut()
            .enumerate()
            .filter_map(|(index, node)| match &mut node.kind {
                NodeKind::Element(data) => Some((NodeId(index), data)),
                _ => None,
            })
    }

    pub(crate) fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id)?.parent
    }

    pub(crate) fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|node| node.children.as_slice()).unwrap_or_default()
    }

    fn check(&self, id: NodeId) -> Result<(), PageError> {
        if id.0 < self.nodes.len() {
            Ok(())
        } else {
            Err(PageError::MissingNode(id))
        }
    }

    pub(crate) fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.parent(id) {
            self.nodes[parent.0].children.retain(|child| *child != id);
            self.nodes[id.0].parent = None;
        }
    }

    /// Inserts `child` under `parent`, before `reference` or at the end.
    pub(crate) fn insert(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), PageError> {
        self.check(parent)?;
        self.check(child)?;
        if parent == child || self.is_ancestor(child, parent) {
            return Err(PageError::Unsupported("insertion would create a cycle".into()));
        }
        self.detach(child);
        let siblings = &mut self.nodes[parent.0].children;
        let index = match reference {
            Some(reference) => siblings
                .iter()
                .position(|id| *id == reference)
                .ok_or(PageError::MissingNode(reference))?,
            None => siblings.len(),
        };
        siblings.insert(index, child);
        self.nodes[child.0].parent = Some(parent);
        Ok(())
    }

    /// Removes all children of `id`, returning them detached.
    pub(crate) fn clear_children(&mut self, id: NodeId) -> Vec<NodeId> {
        let Some(node) = self.nodes.get_mut(id.0) else {
            return Vec::new();
        };
        let removed = std::mem::take(&mut node.children);
        for child in &removed {
            self.nodes[child.0].parent = None;
        }
        removed
    }

    pub(crate) fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = self.parent(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /// The topmost ancestor of `id`, possibly itself.
    pub(crate) fn root_of(&self, id: NodeId) -> NodeId {
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        current
    }

    /// Preorder descendants, excluding `id` itself.
    pub(crate) fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    pub(crate) fn text_content(&self, id: NodeId) -> String {
        let mut text = String::new();
        if let Some(Node { kind: NodeKind::Text(value), .. }) = self.node(id) {
            text.push_str(value);
        }
        for node in self.descendants(id) {
            if let Some(Node { kind: NodeKind::Text(value), .. }) = self.node(node) {
                text.push_str(value);
            }
        }
        text
    }

    /// First descendant element of `id` with the given tag.
    pub(crate) fn find_tag(&self, id: NodeId, tag: &str) -> Option<NodeId> {
        self.descendants(id)
            .into_iter()
            .find(|node| self.element(*node).is_some_and(|el| el.tag_name() == tag))
    }

    /// Parses a full document into the children of `document`.
    pub(crate) fn load_document(&mut self, document: NodeId, html: &str) {
        let parsed = Html::parse_document(html);
        for child in parsed.tree.root().children() {
            self.import(document, child);
        }
    }

    /// Parses a fragment and appends its top-level nodes under `parent`,
    /// or leaves them detached when `parent` is `None`.
    pub(crate) fn load_fragment(&mut self, parent: Option<NodeId>, html: &str) -> Vec<NodeId> {
        let parsed = Html::parse_fragment(html);
        let mut added = Vec::new();
        for child in parsed.root_element().children() {
            if let Some(id) = self.import_detached(child) {
                if let Some(parent) = parent {
                    self.nodes[parent.0].children.push(id);
                    self.nodes[id.0].parent = Some(parent);
                }
                added.push(id);
            }
        }
        added
    }

    fn import(&mut self, parent: NodeId, source: NodeRef<'_, ParsedNode>) {
        if let Some(id) = self.import_detached(source) {
            self.nodes[parent.0].children.push(id);
            self.nodes[id.0].parent = Some(parent);
        }
    }

    fn import_detached(&mut self, source: NodeRef<'_, ParsedNode>) -> Option<NodeId> {
        let kind = match source.value() {
            ParsedNode::Text(text) => NodeKind::Text(text.to_string()),
            ParsedNode::Comment(comment) => NodeKind::Comment(comment.to_string()),
            ParsedNode::Doctype(doctype) => NodeKind::Doctype(doctype.name().to_string()),
            ParsedNode::Element(element) => {
                let mut data = ElementData::new(element.name());
                for (name, value) in element.attrs() {
                    data.insert_attribute(name, value);
                }
                NodeKind::Element(data)
            }
            _ => return None,
        };
        let id = self.alloc(kind);
        for child in source.children() {
            self.import(id, child);
        }
        Some(id)
    }

    /// Serializes the children of `id`. `extra_style` supplies rules added
    /// through the object model to `<style>` elements.
    pub(crate) fn serialize_children(
        &self,
        id: NodeId,
        extra_style: &dyn Fn(NodeId) -> Option<String>,
    ) -> String {
        let mut out = String::new();
        for child in self.children(id) {
            self.serialize_node(*child, false, extra_style, &mut out);
        }
        out
    }

    fn serialize_node(
        &self,
        id: NodeId,
        raw_text: bool,
        extra_style: &dyn Fn(NodeId) -> Option<String>,
        out: &mut String,
    ) {
        let Some(node) = self.node(id) else {
            return;
        };
        match &node.kind {
            NodeKind::Document => {
                for child in &node.children {
                    self.serialize_node(*child, false, extra_style, out);
                }
            }
            NodeKind::Doctype(name) => {
                out.push_str("<!DOCTYPE ");
                out.push_str(name);
                out.push('>');
            }
            NodeKind::Text(text) if raw_text => out.push_str(text),
            NodeKind::Text(text) => out.push_str(&html_escape::encode_text(text)),
            NodeKind::Comment(text) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
            NodeKind::Element(data) => {
                out.push('<');
                out.push_str(&data.tag);
                for (name, value) in &data.attributes {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(&html_escape::encode_double_quoted_attribute(value));
                    out.push('"');
                }
                out.push('>');
                if VOID_ELEMENTS.contains(&data.tag.as_str()) {
                    return;
                }
                let raw = RAW_TEXT_ELEMENTS.contains(&data.tag.as_str());
                for child in &node.children {
                    self.serialize_node(*child, raw, extra_style, out);
                }
                if let Some(extra) = extra_style(id) {
                    out.push_str(&extra);
                }
                out.push_str("</");
                out.push_str(&data.tag);
                out.push('>');
            }
        }
    }
}
