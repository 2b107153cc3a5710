use std::collections::HashMap;

use crate::error::{CanvasError, Result};

/// Index of a node inside a [`Document`] arena.
pub type NodeId = usize;

/// Host markup element. Text is stored as markup and written verbatim by the
/// renderer, so callers escape untrusted strings before setting it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub attrs: Vec<(String, String)>,
    pub text: Option<String>,
    pub hidden: bool,
    /// Forced height, the equivalent of an inline `height` style.
    pub fixed_height: Option<u32>,
    /// Height the element occupies on its own, excluding children.
    pub intrinsic_height: u32,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            id: None,
            classes: Vec::new(),
            attrs: Vec::new(),
            text: None,
            hidden: false,
            fixed_height: None,
            intrinsic_height: 0,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.add_class(class);
        self
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_height(mut self, height: u32) -> Self {
        self.intrinsic_height = height;
        self
    }

    pub fn add_class(&mut self, class: impl Into<String>) {
        let class = class.into();
        if !self.has_class(&class) {
            self.classes.push(class);
        }
    }

    pub fn remove_class(&mut self, class: &str) {
        self.classes.retain(|c| c != class);
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attrs.iter_mut().find(|(key, _)| *key == name) {
            Some(slot) => slot.1 = value,
            None => self.attrs.push((name, value)),
        }
    }
}

#[derive(Debug, Clone)]
struct Node {
    element: Element,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Arena-backed element tree standing in for the host page's markup.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Option<Node>>,
    ids: HashMap<String, NodeId>,
    body: NodeId,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        let body = Node {
            element: Element::new("body"),
            parent: None,
            children: Vec::new(),
        };
        Self {
            nodes: vec![Some(body)],
            ids: HashMap::new(),
            body: 0,
        }
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    /// Allocate a detached element. Its id becomes resolvable immediately.
    pub fn create_element(&mut self, element: Element) -> NodeId {
        let node_id = self.nodes.len();
        if let Some(id) = element.id.as_ref() {
            self.ids.insert(id.clone(), node_id);
        }
        self.nodes.push(Some(Node {
            element,
            parent: None,
            children: Vec::new(),
        }));
        node_id
    }

    pub fn get(&self, node: NodeId) -> Option<&Element> {
        self.node(node).map(|n| &n.element)
    }

    pub fn get_mut(&mut self, node: NodeId) -> Option<&mut Element> {
        self.nodes
            .get_mut(node)
            .and_then(|slot| slot.as_mut())
            .map(|n| &mut n.element)
    }

    pub fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.ids.get(id).copied().filter(|node| self.contains(*node))
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.node(node).is_some()
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).and_then(|n| n.parent)
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.node(node)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn index_in_parent(&self, node: NodeId) -> Option<usize> {
        let parent = self.parent(node)?;
        self.children(parent).iter().position(|child| *child == node)
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        let len = self.children(parent).len();
        self.insert_child(parent, len, child)
    }

    /// Insert `child` under `parent` at `index`, clamped to the child count.
    /// A child that already has a parent is moved.
    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) -> Result<()> {
        if !self.contains(parent) {
            return Err(CanvasError::ElementNotFound(format!("node {parent}")));
        }
        if !self.contains(child) {
            return Err(CanvasError::ElementNotFound(format!("node {child}")));
        }
        if self.is_ancestor(child, parent) {
            return Err(CanvasError::invalid_argument(
                "cannot insert an element into its own subtree",
            ));
        }
        self.detach(child);
        let parent_node = self.node_mut(parent)?;
        let index = index.min(parent_node.children.len());
        parent_node.children.insert(index, child);
        self.node_mut(child)?.parent = Some(parent);
        Ok(())
    }

    /// Unlink a node from its parent, keeping the subtree alive.
    pub fn detach(&mut self, node: NodeId) {
        let Some(parent) = self.parent(node) else {
            return;
        };
        if let Some(Some(parent_node)) = self.nodes.get_mut(parent) {
            parent_node.children.retain(|child| *child != node);
        }
        if let Some(Some(n)) = self.nodes.get_mut(node) {
            n.parent = None;
        }
    }

    /// Destroy a node and its whole subtree.
    pub fn remove(&mut self, node: NodeId) {
        self.detach(node);
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            if let Some(removed) = self.nodes.get_mut(current).and_then(|slot| slot.take()) {
                if let Some(id) = removed.element.id {
                    if self.ids.get(&id) == Some(&current) {
                        self.ids.remove(&id);
                    }
                }
                stack.extend(removed.children);
            }
        }
    }

    /// Rendered height: hidden elements take none, a fixed height wins,
    /// otherwise the element's own height plus its children stacked.
    pub fn height(&self, node: NodeId) -> u32 {
        let Some(n) = self.node(node) else {
            return 0;
        };
        if n.element.hidden {
            return 0;
        }
        if let Some(fixed) = n.element.fixed_height {
            return fixed;
        }
        n.children
            .iter()
            .fold(n.element.intrinsic_height, |acc, child| {
                acc.saturating_add(self.height(*child))
            })
    }

    /// Descendants of `root` carrying `class`, in document order.
    pub fn find_by_class(&self, root: NodeId, class: &str) -> Vec<NodeId> {
        let mut found = Vec::new();
        self.walk(root, &mut |node, element| {
            if node != root && element.has_class(class) {
                found.push(node);
            }
        });
        found
    }

    /// Descendants of `root` with the given tag, in document order.
    pub fn find_by_tag(&self, root: NodeId, tag: &str) -> Vec<NodeId> {
        let mut found = Vec::new();
        self.walk(root, &mut |node, element| {
            if node != root && element.tag == tag {
                found.push(node);
            }
        });
        found
    }

    fn walk(&self, node: NodeId, visit: &mut dyn FnMut(NodeId, &Element)) {
        if let Some(n) = self.node(node) {
            visit(node, &n.element);
            for child in &n.children {
                self.walk(*child, visit);
            }
        }
    }

    fn is_ancestor(&self, candidate: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == candidate {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    fn node(&self, node: NodeId) -> Option<&Node> {
        self.nodes.get(node).and_then(|slot| slot.as_ref())
    }

    fn node_mut(&mut self, node: NodeId) -> Result<&mut Node> {
        self.nodes
            .get_mut(node)
            .and_then(|slot| slot.as_mut())
            .ok_or_else(|| CanvasError::ElementNotFound(format!("node {node}")))
    }
}
