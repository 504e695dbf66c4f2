//! Node storage for the skip list.
//!
//! Nodes live in an index-based arena rather than behind raw pointers: every
//! relation between nodes (`left`, `right`, `down`) is an [`Option<NodeId>`]
//! into a [`slab::Slab`], so splicing a node out can never leave a dangling
//! reference. Each element is stored exactly once, in its own slab, and every
//! per-level instance of that element refers to it by [`ElemId`].

use slab::Slab;

// ////////////////////////////////////////////////////////////////////////////
// Identifiers
// ////////////////////////////////////////////////////////////////////////////

/// Identifier of a node slot in the arena.
///
/// Ids are stable for the lifetime of the node: the arena never moves a live
/// slot, and freed slots are only reused for later allocations.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub(crate) struct NodeId(u32);

impl NodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Identifier of an element slot in the arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub(crate) struct ElemId(u32);

impl ElemId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

// ////////////////////////////////////////////////////////////////////////////
// Node
// ////////////////////////////////////////////////////////////////////////////

/// What a node slot stands for.
///
/// Sentinels are a distinct variant so that list boundaries never require a
/// default-constructed element.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum NodeKind {
    /// The left boundary of a level; holds no element.
    Head,
    /// The right boundary of a level; holds no element.
    Tail,
    /// One level's instance of the element identified by the [`ElemId`].
    Element(ElemId),
}

/// A single node of the ladder: one element instance (or sentinel) at one
/// level, linked to its neighbours on that level and to the instance of the
/// same element one level below.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) struct Node {
    pub kind: NodeKind,
    /// Same-level predecessor. `None` only for head sentinels.
    pub left: Option<NodeId>,
    /// Same-level successor. `None` only for tail sentinels.
    pub right: Option<NodeId>,
    /// The same element (or sentinel) one level lower. `None` at level 1.
    pub down: Option<NodeId>,
}

impl Node {
    fn new(kind: NodeKind) -> Self {
        Node {
            kind,
            left: None,
            right: None,
            down: None,
        }
    }

    /// The element this node is an instance of, if it is not a sentinel.
    pub fn elem(&self) -> Option<ElemId> {
        match self.kind {
            NodeKind::Element(elem) => Some(elem),
            NodeKind::Head | NodeKind::Tail => None,
        }
    }
}

// ////////////////////////////////////////////////////////////////////////////
// Arena
// ////////////////////////////////////////////////////////////////////////////

/// Backing storage for all nodes and elements of one skip list.
///
/// The arena owns every node; the container reaches them through ids only.
/// Allocation is fallible: ids are 32 bits wide, and allocating past that id
/// space is reported to the caller rather than wrapping.
#[derive(Debug)]
pub(crate) struct NodeArena<T> {
    nodes: Slab<Node>,
    elems: Slab<T>,
}

impl<T> NodeArena<T> {
    pub fn new() -> Self {
        NodeArena {
            nodes: Slab::new(),
            elems: Slab::new(),
        }
    }

    /// Drop every node and element.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.elems.clear();
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    /// Like [`node`][Self::node] but tolerating ids of freed slots, for
    /// validating externally supplied positions.
    pub fn try_node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    pub fn elem(&self, id: ElemId) -> &T {
        &self.elems[id.index()]
    }

    /// The element carried by a node, or `None` for sentinels.
    pub fn value_of(&self, id: NodeId) -> Option<&T> {
        self.node(id).elem().map(|elem| self.elem(elem))
    }

    /// Allocate an unlinked node slot. Fails once the 32-bit id space is
    /// exhausted, in which case the arena is left unchanged.
    pub fn try_insert_node(&mut self, kind: NodeKind) -> Option<NodeId> {
        let key = self.nodes.insert(Node::new(kind));
        match u32::try_from(key) {
            Ok(id) => Some(NodeId(id)),
            Err(_) => {
                self.nodes.remove(key);
                None
            }
        }
    }

    /// Allocate an element slot, giving the value back on failure.
    pub fn try_insert_elem(&mut self, value: T) -> Result<ElemId, T> {
        let key = self.elems.insert(value);
        match u32::try_from(key) {
            Ok(id) => Ok(ElemId(id)),
            Err(_) => Err(self.elems.remove(key)),
        }
    }

    /// Free a node slot without touching its neighbours' links.
    pub fn remove_node(&mut self, id: NodeId) -> Node {
        self.nodes.remove(id.index())
    }

    pub fn remove_elem(&mut self, id: ElemId) -> T {
        self.elems.remove(id.index())
    }

    /// Splice `node` into a level immediately after `prev`, fixing all four
    /// horizontal links.
    pub fn splice_after(&mut self, prev: NodeId, node: NodeId) {
        let old_right = self.node(prev).right;
        {
            let new = self.node_mut(node);
            new.left = Some(prev);
            new.right = old_right;
        }
        if let Some(right) = old_right {
            self.node_mut(right).left = Some(node);
        }
        self.node_mut(prev).right = Some(node);
    }

    /// Unlink a node from its horizontal neighbours and free its slot.
    ///
    /// The returned node still records the links it held, so the caller can
    /// follow `down` to the instance at the level below.
    pub fn unlink_remove(&mut self, id: NodeId) -> Node {
        let node = self.nodes.remove(id.index());
        if let Some(left) = node.left {
            self.node_mut(left).right = node.right;
        }
        if let Some(right) = node.right {
            self.node_mut(right).left = node.left;
        }
        node
    }

    /// Allocate and link a fresh head/tail sentinel pair for one level.
    pub fn try_sentinel_pair(&mut self) -> Option<(NodeId, NodeId)> {
        let head = self.try_insert_node(NodeKind::Head)?;
        let Some(tail) = self.try_insert_node(NodeKind::Tail) else {
            self.remove_node(head);
            return None;
        };
        self.node_mut(head).right = Some(tail);
        self.node_mut(tail).left = Some(head);
        Some((head, tail))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{NodeArena, NodeKind};

    #[test]
    fn sentinel_pair_links() {
        let mut arena: NodeArena<i32> = NodeArena::new();
        let (head, tail) = arena.try_sentinel_pair().unwrap();
        assert_eq!(arena.node(head).kind, NodeKind::Head);
        assert_eq!(arena.node(tail).kind, NodeKind::Tail);
        assert_eq!(arena.node(head).right, Some(tail));
        assert_eq!(arena.node(tail).left, Some(head));
        assert_eq!(arena.node(head).left, None);
        assert_eq!(arena.node(tail).right, None);
    }

    #[test]
    fn splice_and_unlink() {
        let mut arena: NodeArena<i32> = NodeArena::new();
        let (head, tail) = arena.try_sentinel_pair().unwrap();

        let a = arena.try_insert_elem(1).unwrap();
        let b = arena.try_insert_elem(2).unwrap();
        let node_a = arena.try_insert_node(NodeKind::Element(a)).unwrap();
        let node_b = arena.try_insert_node(NodeKind::Element(b)).unwrap();

        arena.splice_after(head, node_a);
        arena.splice_after(node_a, node_b);
        assert_eq!(arena.node(head).right, Some(node_a));
        assert_eq!(arena.node(node_a).right, Some(node_b));
        assert_eq!(arena.node(node_b).right, Some(tail));
        assert_eq!(arena.node(tail).left, Some(node_b));
        assert_eq!(arena.value_of(node_a), Some(&1));
        assert_eq!(arena.value_of(head), None);

        let removed = arena.unlink_remove(node_a);
        assert_eq!(removed.elem(), Some(a));
        assert_eq!(arena.node(head).right, Some(node_b));
        assert_eq!(arena.node(node_b).left, Some(head));
        assert_eq!(arena.try_node(node_a), None);
        assert_eq!(arena.remove_elem(a), 1);
    }

    #[test]
    fn ids_stable_across_removal() {
        let mut arena: NodeArena<i32> = NodeArena::new();
        let (head, _tail) = arena.try_sentinel_pair().unwrap();
        let e = arena.try_insert_elem(7).unwrap();
        let node = arena.try_insert_node(NodeKind::Element(e)).unwrap();
        arena.splice_after(head, node);

        let other = arena.try_insert_node(NodeKind::Head).unwrap();
        arena.remove_node(other);

        // Freeing an unrelated slot must not disturb live nodes.
        assert_eq!(arena.node(node).elem(), Some(e));
        assert_eq!(arena.node(head).right, Some(node));
    }
}
