//! DOM capability layer: arena-backed document tree
//!
//! The engine never touches a live browser DOM directly. It operates on this
//! narrow surface - create, append, splice, read text, read/write attributes,
//! document-order traversal - which the content-script glue mirrors onto the
//! real document. The same surface backs the unit tests, so Scanner/Annotator
//! logic runs without a browser engine.
//!
//! Nodes are arena-allocated and addressed by `NodeId`. Removal is a
//! soft-detach: the slot stays in the arena (ids are never reused), only the
//! `attached` flag and parent link change.

use serde::{Deserialize, Serialize};

// =============================================================================
// Types
// =============================================================================

/// Stable handle to a node in the arena. Never reused within a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    /// Reconstruct a handle from a raw index (JS boundary).
    pub fn from_index(index: usize) -> Self {
        NodeId(index)
    }

    /// Raw arena index (JS boundary).
    pub fn index(self) -> usize {
        self.0
    }
}

/// Node payload: element (tag + ordered attributes) or text run.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
    },
    Text {
        content: String,
    },
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    attached: bool,
    /// Set on nodes the annotation engine itself created. Consumed by the
    /// coordinator's mutation self-exclusion, never by the page.
    engine_created: bool,
}

/// Serializable snapshot form used at the wasm boundary.
///
/// `tag == None && text == Some(..)` is a text node; otherwise an element
/// (missing tag defaults to "body" at the root).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeSpec {
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub attrs: Vec<(String, String)>,
    #[serde(default)]
    pub children: Vec<NodeSpec>,
}

// =============================================================================
// DomTree
// =============================================================================

/// Arena document tree.
pub struct DomTree {
    nodes: Vec<NodeData>,
    root: NodeId,
}

impl Default for DomTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DomTree {
    /// Empty document with a "body" root element.
    pub fn new() -> Self {
        let root_data = NodeData {
            kind: NodeKind::Element {
                tag: "body".to_string(),
                attrs: Vec::new(),
            },
            parent: None,
            children: Vec::new(),
            attached: true,
            engine_created: false,
        };
        Self {
            nodes: vec![root_data],
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    // -------------------------------------------------------------------------
    // Creation
    // -------------------------------------------------------------------------

    /// Create a detached element node.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push_node(NodeKind::Element {
            tag: tag.to_string(),
            attrs: Vec::new(),
        })
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, content: &str) -> NodeId {
        self.push_node(NodeKind::Text {
            content: content.to_string(),
        })
    }

    fn push_node(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
            attached: false,
            engine_created: false,
        });
        id
    }

    // -------------------------------------------------------------------------
    // Structure
    // -------------------------------------------------------------------------

    /// Append `child` as the last child of `parent`.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach_from_parent(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
        let attached = self.nodes[parent.0].attached;
        self.set_attached_recursive(child, attached);
    }

    /// Replace `node` with a sequence of nodes, splicing them into the parent
    /// at the node's position. The replaced node (and its subtree) detaches.
    /// No-op if `node` has no parent.
    pub fn replace_with(&mut self, node: NodeId, replacements: Vec<NodeId>) {
        let Some(parent) = self.nodes[node.0].parent else {
            return;
        };
        let Some(pos) = self.nodes[parent.0].children.iter().position(|&c| c == node) else {
            return;
        };
        let attached = self.nodes[parent.0].attached;
        self.nodes[parent.0].children.remove(pos);
        self.nodes[node.0].parent = None;
        self.set_attached_recursive(node, false);

        for (offset, &repl) in replacements.iter().enumerate() {
            self.detach_from_parent(repl);
            self.nodes[repl.0].parent = Some(parent);
            self.nodes[parent.0].children.insert(pos + offset, repl);
            self.set_attached_recursive(repl, attached);
        }
    }

    /// Detach a subtree from the document.
    pub fn remove(&mut self, node: NodeId) {
        self.detach_from_parent(node);
        self.set_attached_recursive(node, false);
    }

    fn detach_from_parent(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != node);
        }
    }

    fn set_attached_recursive(&mut self, node: NodeId, attached: bool) {
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            self.nodes[id.0].attached = attached;
            stack.extend(self.nodes[id.0].children.iter().copied());
        }
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn is_attached(&self, node: NodeId) -> bool {
        self.nodes[node.0].attached
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0].children
    }

    pub fn is_element(&self, node: NodeId) -> bool {
        matches!(self.nodes[node.0].kind, NodeKind::Element { .. })
    }

    pub fn tag(&self, node: NodeId) -> Option<&str> {
        match &self.nodes[node.0].kind {
            NodeKind::Element { tag, .. } => Some(tag),
            NodeKind::Text { .. } => None,
        }
    }

    /// Text content of a text node. None for elements.
    pub fn text(&self, node: NodeId) -> Option<&str> {
        match &self.nodes[node.0].kind {
            NodeKind::Text { content } => Some(content),
            NodeKind::Element { .. } => None,
        }
    }

    pub fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        match &self.nodes[node.0].kind {
            NodeKind::Element { attrs, .. } => attrs
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.as_str()),
            NodeKind::Text { .. } => None,
        }
    }

    pub fn has_attr(&self, node: NodeId, name: &str) -> bool {
        self.attr(node, name).is_some()
    }

    /// Set an attribute on an element (replaces an existing value).
    pub fn set_attr(&mut self, node: NodeId, name: &str, value: &str) {
        if let NodeKind::Element { attrs, .. } = &mut self.nodes[node.0].kind {
            if let Some(entry) = attrs.iter_mut().find(|(n, _)| n == name) {
                entry.1 = value.to_string();
            } else {
                attrs.push((name.to_string(), value.to_string()));
            }
        }
    }

    /// True if the node or any ancestor carries the attribute.
    pub fn ancestor_or_self_has_attr(&self, node: NodeId, name: &str) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if self.has_attr(id, name) {
                return true;
            }
            current = self.nodes[id.0].parent;
        }
        false
    }

    pub fn mark_engine_created(&mut self, node: NodeId) {
        self.nodes[node.0].engine_created = true;
    }

    pub fn is_engine_created(&self, node: NodeId) -> bool {
        self.nodes[node.0].engine_created
    }

    // -------------------------------------------------------------------------
    // Traversal
    // -------------------------------------------------------------------------

    /// Subtree in document order (pre-order), including `node` itself.
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            out.push(id);
            // Push in reverse so children pop left-to-right
            for &child in self.nodes[id.0].children.iter().rev() {
                stack.push(child);
            }
        }
        out
    }

    /// Concatenated text of a subtree in document order.
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        for id in self.descendants(node) {
            if let Some(text) = self.text(id) {
                out.push_str(text);
            }
        }
        out
    }

    /// Merge adjacent sibling text nodes and drop empty ones, recursively.
    /// Same contract as the browser's Node.normalize().
    pub fn normalize(&mut self, node: NodeId) {
        self.normalize_children(node);
        let children = self.nodes[node.0].children.clone();
        for child in children {
            if self.is_element(child) {
                self.normalize(child);
            }
        }
    }

    /// Merge adjacent text nodes among the direct children of `node` only,
    /// dropping empty ones. Does not descend.
    pub fn normalize_children(&mut self, node: NodeId) {
        let children = self.nodes[node.0].children.clone();
        let mut merged: Vec<NodeId> = Vec::with_capacity(children.len());

        for child in children {
            match self.text(child).map(|t| t.to_string()) {
                Some(text) => {
                    if text.is_empty() {
                        self.nodes[child.0].parent = None;
                        self.nodes[child.0].attached = false;
                        continue;
                    }
                    if let Some(&prev) = merged.last() {
                        if let NodeKind::Text { content } = &mut self.nodes[prev.0].kind {
                            content.push_str(&text);
                            self.nodes[child.0].parent = None;
                            self.nodes[child.0].attached = false;
                            continue;
                        }
                    }
                    merged.push(child);
                }
                None => merged.push(child),
            }
        }

        self.nodes[node.0].children = merged;
    }

    // -------------------------------------------------------------------------
    // Snapshot (wasm boundary)
    // -------------------------------------------------------------------------

    /// Build a document from a snapshot. The snapshot's top node becomes the
    /// root element (tag defaults to "body").
    pub fn from_spec(spec: &NodeSpec) -> Self {
        let mut dom = Self::new();
        if let NodeKind::Element { tag, attrs } = &mut dom.nodes[dom.root.0].kind {
            if let Some(root_tag) = &spec.tag {
                *tag = root_tag.clone();
            }
            *attrs = spec.attrs.clone();
        }
        if let Some(text) = &spec.text {
            let t = dom.create_text(text);
            dom.append_child(dom.root, t);
        }
        for child in &spec.children {
            let built = dom.build_spec(child);
            dom.append_child(dom.root, built);
        }
        dom
    }

    /// Build a detached subtree from a snapshot node.
    pub fn build_spec(&mut self, spec: &NodeSpec) -> NodeId {
        if spec.tag.is_none() {
            if let Some(text) = &spec.text {
                return self.create_text(text);
            }
        }
        let tag = spec.tag.as_deref().unwrap_or("span");
        let el = self.create_element(tag);
        for (name, value) in &spec.attrs {
            self.set_attr(el, name, value);
        }
        if let Some(text) = &spec.text {
            let t = self.create_text(text);
            self.append_child(el, t);
        }
        for child in &spec.children {
            let built = self.build_spec(child);
            self.append_child(el, built);
        }
        el
    }

    /// Snapshot a subtree.
    pub fn to_spec(&self, node: NodeId) -> NodeSpec {
        match &self.nodes[node.0].kind {
            NodeKind::Text { content } => NodeSpec {
                text: Some(content.clone()),
                ..Default::default()
            },
            NodeKind::Element { tag, attrs } => NodeSpec {
                tag: Some(tag.clone()),
                attrs: attrs.clone(),
                children: self.nodes[node.0]
                    .children
                    .iter()
                    .map(|&c| self.to_spec(c))
                    .collect(),
                ..Default::default()
            },
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
