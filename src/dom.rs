//! Owned, mutable document model.
//!
//! `scraper` gives us a standards-compliant parse, but its element attributes are
//! fixed once parsed. The parsed tree is copied into an `ego_tree::Tree` of plain
//! node values so slides can be cloned, text can be split and selections can be
//! wrapped. Serialization goes through html5ever's serializer. Detached nodes stay
//! in the tree until the document is dropped.

use std::io;

use ego_tree::iter::Edge;
use ego_tree::Tree;
use html5ever::serialize::{serialize, Serialize, SerializeOpts, Serializer, TraversalScope};
use html5ever::{namespace_url, ns, LocalName, QualName};

use crate::css::StyleMap;

/// Handle to a node inside a [`Document`].
pub type NodeId = ego_tree::NodeId;

#[derive(Debug, Clone, PartialEq)]
pub struct ElementData {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeData {
    Document,
    Element(ElementData),
    Text(String),
    Comment(String),
}

static UNKNOWN: NodeData = NodeData::Document;

/// Mutable document tree rooted at a [`NodeData::Document`] node.
#[derive(Debug, Clone)]
pub struct Document {
    tree: Tree<NodeData>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            tree: Tree::new(NodeData::Document),
        }
    }

    /// Copy a parsed `scraper` tree into an owned document.
    pub fn from_html(html: &scraper::Html) -> Self {
        let mut doc = Document::new();
        let root = doc.root();
        let mut stack: Vec<(ego_tree::NodeRef<'_, scraper::Node>, NodeId)> = html
            .tree
            .root()
            .children()
            .map(|child| (child, root))
            .collect();
        stack.reverse();

        while let Some((node, parent)) = stack.pop() {
            let data = match node.value() {
                scraper::Node::Element(el) => NodeData::Element(ElementData {
                    tag: el.name().to_ascii_lowercase(),
                    attrs: el
                        .attrs()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect(),
                }),
                scraper::Node::Text(t) => NodeData::Text(t.text.to_string()),
                scraper::Node::Comment(c) => NodeData::Comment(c.comment.to_string()),
                // Doctype, fragments and processing instructions carry no slide content
                _ => continue,
            };
            let id = doc.push(data);
            doc.append_child(parent, id);
            let children: Vec<_> = node.children().collect();
            for child in children.into_iter().rev() {
                stack.push((child, id));
            }
        }
        doc
    }

    pub fn root(&self) -> NodeId {
        self.tree.root().id()
    }

    fn push(&mut self, data: NodeData) -> NodeId {
        self.tree.orphan(data).id()
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(NodeData::Element(ElementData {
            tag: tag.to_ascii_lowercase(),
            attrs: Vec::new(),
        }))
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeData::Text(text.to_string()))
    }

    /// Whether `id` was allocated by this document.
    pub fn has_node(&self, id: NodeId) -> bool {
        self.tree.get(id).is_some()
    }

    /// Whether `id` is reachable from the root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        self.has_node(id) && (id == self.root() || self.ancestors(id).any(|a| a == self.root()))
    }

    pub fn data(&self, id: NodeId) -> &NodeData {
        self.tree.get(id).map(|n| n.value()).unwrap_or(&UNKNOWN)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.tree.get(id)?.parent().map(|p| p.id())
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.tree
            .get(id)
            .map(|n| n.children().map(|c| c.id()).collect())
            .unwrap_or_default()
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.data(id), NodeData::Element(_))
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match self.data(id) {
            NodeData::Element(el) => Some(el),
            _ => None,
        }
    }

    fn with_element_mut<R, F>(&mut self, id: NodeId, f: F) -> Option<R>
    where
        F: FnOnce(&mut ElementData) -> R,
    {
        let mut node = self.tree.get_mut(id)?;
        match node.value() {
            NodeData::Element(el) => Some(f(el)),
            _ => None,
        }
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|el| el.tag.as_str())
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match self.data(id) {
            NodeData::Text(t) => Some(t.as_str()),
            _ => None,
        }
    }

    /// Length of a node in range-offset units: characters for text, children otherwise.
    pub fn node_len(&self, id: NodeId) -> usize {
        match self.data(id) {
            NodeData::Text(t) => t.chars().count(),
            _ => self.tree.get(id).map(|n| n.children().count()).unwrap_or(0),
        }
    }

    // --- tree mutation ---

    /// Detach `id` from its parent. The node and its subtree stay in the tree.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(mut node) = self.tree.get_mut(id) {
            node.detach();
        }
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if parent == child || !self.has_node(child) {
            return;
        }
        self.detach(child);
        if let Some(mut node) = self.tree.get_mut(parent) {
            node.append_id(child);
        }
    }

    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
        if parent == child || !self.has_node(child) {
            return;
        }
        self.detach(child);
        match self.children(parent).get(index).copied() {
            Some(sibling) => {
                if let Some(mut node) = self.tree.get_mut(sibling) {
                    node.insert_id_before(child);
                }
            }
            None => self.append_child(parent, child),
        }
    }

    /// Remove every child of `id`.
    pub fn clear_children(&mut self, id: NodeId) {
        for child in self.children(id) {
            self.detach(child);
        }
    }

    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let node = self.tree.get(id)?;
        node.parent()?.children().position(|c| c.id() == id)
    }

    /// Split a text node at character `offset`. The right half becomes a new
    /// sibling directly after `id` and is returned.
    pub fn split_text(&mut self, id: NodeId, offset: usize) -> Option<NodeId> {
        let text = self.text(id)?.to_string();
        let byte = text
            .char_indices()
            .nth(offset)
            .map(|(b, _)| b)
            .unwrap_or(text.len());
        let (left, right) = text.split_at(byte);
        let right_id = self.create_text(right);
        let mut node = self.tree.get_mut(id)?;
        *node.value() = NodeData::Text(left.to_string());
        if node.parent().is_some() {
            node.insert_id_after(right_id);
        }
        Some(right_id)
    }

    /// Copy the subtree rooted at `src_id` of `src` into this document, returning
    /// the detached copy.
    pub fn import(&mut self, src: &Document, src_id: NodeId) -> NodeId {
        let copy = self.push(src.data(src_id).clone());
        let mut stack: Vec<(NodeId, NodeId)> = src
            .children(src_id)
            .into_iter()
            .rev()
            .map(|c| (c, copy))
            .collect();
        while let Some((from, parent)) = stack.pop() {
            let id = self.push(src.data(from).clone());
            self.append_child(parent, id);
            for child in src.children(from).into_iter().rev() {
                stack.push((child, id));
            }
        }
        copy
    }

    /// Deep clone a subtree inside this document.
    pub fn clone_subtree(&mut self, id: NodeId) -> NodeId {
        let snapshot = self.clone();
        self.import(&snapshot, id)
    }

    // --- attributes, classes, style ---

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)?
            .attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        self.with_element_mut(id, |el| {
            match el.attrs.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
                Some(slot) => slot.1 = value.to_string(),
                None => el.attrs.push((name.to_string(), value.to_string())),
            }
        });
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) {
        self.with_element_mut(id, |el| el.attrs.retain(|(k, _)| !k.eq_ignore_ascii_case(name)));
    }

    /// Keep only the attributes for which `pred(name, value)` holds.
    pub fn retain_attrs<F>(&mut self, id: NodeId, mut pred: F)
    where
        F: FnMut(&str, &str) -> bool,
    {
        self.with_element_mut(id, |el| el.attrs.retain(|(k, v)| pred(k, v)));
    }
    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.attr(id, "class")
            .map(|c| c.split_ascii_whitespace().any(|c| c == class))
            .unwrap_or(false)
    }

    pub fn add_class(&mut self, id: NodeId, class: &str) {
        if self.has_class(id, class) {
            return;
        }
        let value = match self.attr(id, "class") {
            Some(existing) if !existing.trim().is_empty() => format!("{} {}", existing.trim(), class),
            _ => class.to_string(),
        };
        self.set_attr(id, "class", &value);
    }

    pub fn style(&self, id: NodeId) -> StyleMap {
        self.attr(id, "style").map(StyleMap::parse).unwrap_or_default()
    }

    /// Merge `patch` into the inline style of `id`.
    pub fn merge_style(&mut self, id: NodeId, patch: &StyleMap) {
        let mut style = self.style(id);
        style.merge(patch);
        self.set_attr(id, "style", &style.to_string());
    }

    // --- traversal ---

    /// Ancestors of `id`, nearest first, excluding `id`.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |n| self.parent(*n))
    }

    /// Nearest ancestor-or-self matching `pred`.
    pub fn closest<F>(&self, id: NodeId, pred: F) -> Option<NodeId>
    where
        F: Fn(&Document, NodeId) -> bool,
    {
        std::iter::once(id)
            .chain(self.ancestors(id))
            .find(|n| pred(self, *n))
    }

    pub fn contains(&self, ancestor: NodeId, id: NodeId) -> bool {
        ancestor == id || self.ancestors(id).any(|a| a == ancestor)
    }

    /// Nearest element that is `id` or encloses it.
    pub fn enclosing_element(&self, id: NodeId) -> Option<NodeId> {
        self.closest(id, |d, n| d.is_element(n))
    }

    /// Pre-order traversal of the subtree rooted at `id`, including `id`.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        self.tree
            .get(id)
            .map(|n| n.descendants().map(|d| d.id()).collect())
            .unwrap_or_default()
    }

    /// Elements with `class` in document order.
    pub fn elements_with_class(&self, root: NodeId, class: &str) -> Vec<NodeId> {
        self.descendants(root)
            .into_iter()
            .filter(|n| self.has_class(*n, class))
            .collect()
    }

    pub fn find_tag(&self, root: NodeId, tag: &str) -> Option<NodeId> {
        self.descendants(root)
            .into_iter()
            .find(|n| self.tag(*n) == Some(tag))
    }

    pub fn text_content(&self, id: NodeId) -> String {
        self.descendants(id)
            .into_iter()
            .filter_map(|n| self.text(n))
            .collect()
    }

    /// Lowest node containing both `a` and `b`.
    pub fn common_ancestor(&self, a: NodeId, b: NodeId) -> Option<NodeId> {
        let chain: Vec<NodeId> = std::iter::once(a).chain(self.ancestors(a)).collect();
        std::iter::once(b)
            .chain(self.ancestors(b))
            .find(|n| chain.contains(n))
    }

    /// Path of child indices from the root to `id`.
    fn path(&self, id: NodeId) -> Vec<usize> {
        let mut path: Vec<usize> = std::iter::once(id)
            .chain(self.ancestors(id))
            .filter_map(|n| self.index_in_parent(n))
            .collect();
        path.reverse();
        path
    }

    /// Document-order comparison of two attached nodes.
    pub fn cmp_order(&self, a: NodeId, b: NodeId) -> std::cmp::Ordering {
        self.path(a).cmp(&self.path(b))
    }

    // --- serialization ---

    pub fn to_html(&self, id: NodeId) -> String {
        self.serialize_with(id, TraversalScope::IncludeNode)
    }

    pub fn inner_html(&self, id: NodeId) -> String {
        self.serialize_with(id, TraversalScope::ChildrenOnly(None))
    }

    fn serialize_with(&self, id: NodeId, scope: TraversalScope) -> String {
        let opts = SerializeOpts {
            traversal_scope: scope,
            ..SerializeOpts::default()
        };
        let mut out = Vec::new();
        // Writing into a Vec cannot fail
        if serialize(&mut out, &Subtree { doc: self, id }, opts).is_err() {
            return String::new();
        }
        String::from_utf8_lossy(&out).into_owned()
    }
}

/// A node of a [`Document`] as seen by html5ever's serializer.
struct Subtree<'a> {
    doc: &'a Document,
    id: NodeId,
}

fn html_name(tag: &str) -> QualName {
    QualName::new(None, ns!(html), LocalName::from(tag))
}

impl Serialize for Subtree<'_> {
    fn serialize<S>(&self, serializer: &mut S, traversal_scope: TraversalScope) -> io::Result<()>
    where
        S: Serializer,
    {
        let Some(start) = self.doc.tree.get(self.id) else {
            return Ok(());
        };
        let children_only = matches!(traversal_scope, TraversalScope::ChildrenOnly(_));
        for edge in start.traverse() {
            match edge {
                Edge::Open(node) if children_only && node.id() == self.id => {}
                Edge::Close(node) if children_only && node.id() == self.id => {}
                Edge::Open(node) => match node.value() {
                    NodeData::Element(el) => {
                        let names: Vec<QualName> = el
                            .attrs
                            .iter()
                            .map(|(k, _)| QualName::new(None, ns!(), LocalName::from(k.as_str())))
                            .collect();
                        let attrs = names.iter().zip(el.attrs.iter().map(|(_, v)| v.as_str()));
                        serializer.start_elem(html_name(&el.tag), attrs)?;
                    }
                    NodeData::Text(t) => serializer.write_text(t)?,
                    NodeData::Comment(c) => serializer.write_comment(c)?,
                    NodeData::Document => {}
                },
                Edge::Close(node) => {
                    if let NodeData::Element(el) = node.value() {
                        serializer.end_elem(html_name(&el.tag))?;
                    }
                }
            }
        }
        Ok(())
    }
}
