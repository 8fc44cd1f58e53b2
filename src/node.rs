//! Tag nodes and the arena that owns them for one compile.

use std::collections::BTreeMap;
use std::ops::{Index, IndexMut};

use kstring::KString;

use crate::error::{CompileErrorKind, CompileResult, Location, TagRef};
use crate::html::attribute_string;
use crate::tags::TagKind;
use crate::view::Fragment;

/// Index of a node in its `Arena`. Only meaningful for the arena that
/// handed it out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

/// What a tag was written as: everything known before its kind gets to
/// initialize itself.
#[derive(Debug, Clone)]
pub struct TagHead {
    pub namespace: KString,
    pub name: KString,
    pub attributes: BTreeMap<KString, KString>,
    pub location: Location,
    pub parent: Option<NodeId>,
}

impl TagHead {
    pub fn tagref(&self) -> TagRef {
        TagRef {
            namespace: self.namespace.clone(),
            name: self.name.clone(),
            location: self.location.clone(),
        }
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(|v| v.as_str())
    }

    pub fn attr_or<'s>(&'s self, key: &str, default: &'s str) -> &'s str {
        self.attr(key).unwrap_or(default)
    }

    pub fn attr_string(&self, key: &str) -> Option<String> {
        self.attr(key).map(String::from)
    }

    /// Fails with MissingAttribute if `key` isn't present.
    pub fn required_attr(&self, key: &str) -> CompileResult<&str> {
        self.attr(key).ok_or_else(|| CompileErrorKind::MissingAttribute {
            tag: self.tagref(),
            attribute: KString::from_ref(key),
        }.into())
    }

    /// `"1"` is true, anything else present is false.
    pub fn flag(&self, key: &str, default: bool) -> bool {
        match self.attr(key) {
            Some(v) => v == "1",
            None => default,
        }
    }

    pub fn set_attr(&mut self, key: &str, value: impl Into<KString>) {
        self.attributes.insert(KString::from_ref(key), value.into());
    }

    /// The attribute string of the HTML element, with `overrides`
    /// applied (a `None` value removes the key).
    pub fn html_attributes(&self, overrides: &[(&str, Option<&str>)]) -> String {
        if overrides.is_empty() {
            return attribute_string(&self.attributes);
        }
        let mut attributes = self.attributes.clone();
        for (key, value) in overrides {
            match value {
                Some(v) => {
                    attributes.insert(KString::from_ref(key), KString::from_ref(v));
                }
                None => {
                    attributes.remove(*key);
                }
            }
        }
        attribute_string(&attributes)
    }
}

#[derive(Debug, Clone)]
pub struct TagNode {
    pub head: TagHead,
    pub kind: TagKind,
    pub body: Fragment,
    pub children: Vec<NodeId>,
    /// Whether opening this node incremented the skip counter.
    pub(crate) skipping: bool,
}

impl TagNode {
    pub fn new(head: TagHead, kind: TagKind) -> Self {
        TagNode { head, kind, body: Fragment::new(), children: Vec::new(), skipping: false }
    }
}

#[derive(Debug, Default)]
pub struct Arena {
    nodes: Vec<TagNode>,
}

impl Arena {
    pub fn new() -> Self {
        Arena::default()
    }

    pub fn push(&mut self, node: TagNode) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    /// `id`'s parent, grandparent etc. up to the root.
    pub fn ancestors(&self, id: Option<NodeId>) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(id, move |id| self[*id].head.parent)
    }

    /// The first of `start` and its ancestors satisfying `pred`.
    pub fn find_ancestor(
        &self,
        start: Option<NodeId>,
        pred: impl Fn(&TagNode) -> bool,
    ) -> Option<NodeId> {
        self.ancestors(start).find(|id| pred(&self[*id]))
    }

    /// Depth-first, document order, not including `id` itself. Children
    /// of nodes for which `descend` returns false are not visited.
    pub fn descendants(&self, id: NodeId, descend: impl Fn(&TagNode) -> bool) -> Vec<NodeId> {
        self.descendants_of(&self[id], descend)
    }

    /// Like `descendants`, for a node borrowed from this arena.
    pub fn descendants_of(
        &self,
        node: &TagNode,
        descend: impl Fn(&TagNode) -> bool,
    ) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut todo: Vec<NodeId> = node.children.iter().rev().copied().collect();
        while let Some(id) = todo.pop() {
            out.push(id);
            let node = &self[id];
            if descend(node) {
                todo.extend(node.children.iter().rev().copied());
            }
        }
        out
    }
}

impl Index<NodeId> for Arena {
    type Output = TagNode;

    fn index(&self, id: NodeId) -> &TagNode {
        &self.nodes[id.0]
    }
}

impl IndexMut<NodeId> for Arena {
    fn index_mut(&mut self, id: NodeId) -> &mut TagNode {
        &mut self.nodes[id.0]
    }
}
