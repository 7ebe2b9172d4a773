//! Per-context store of last-rendered nodes
use crate::types::{Identity, RenderedNode, TargetId};
use indexmap::IndexMap;
use indexmap::map::Entry;

/// Identity -> last rendered node for one context.
///
/// Insertion order is the depth-first pre-order of the cycle that built the
/// registry. A registry is never edited after commit; each cycle builds a new one.
#[derive(Debug, Clone, Default)]
pub struct NodeRegistry {
    nodes: IndexMap<Identity, RenderedNode>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, identity: &Identity) -> Option<&RenderedNode> {
        self.nodes.get(identity)
    }

    pub fn contains(&self, identity: &Identity) -> bool {
        self.nodes.contains_key(identity)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RenderedNode> {
        self.nodes.values()
    }

    /// Linear lookup by target id.
    pub fn find_by_target(&self, target_id: &TargetId) -> Option<&RenderedNode> {
        self.nodes.values().find(|n| &n.target_id == target_id)
    }

    /// Nodes whose recorded parent is `parent_id`, in registry order.
    pub fn children_of<'a>(&'a self, parent_id: &'a TargetId) -> impl Iterator<Item = &'a RenderedNode> + 'a {
        self.nodes.values().filter(move |n| &n.parent_target_id == parent_id)
    }

    /// Binds `node` under its identity. Returns the previous binding when the
    /// identity was already present, which the engine treats as a duplicate.
    pub(crate) fn register(&mut self, node: RenderedNode) -> Option<RenderedNode> {
        match self.nodes.entry(node.identity.clone()) {
            Entry::Occupied(mut slot) => Some(slot.insert(node)),
            Entry::Vacant(slot) => {
                slot.insert(node);
                None
            }
        }
    }
}
