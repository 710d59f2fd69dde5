//! Local shadow of a remote property tree.
//!
//! Nodes live in an arena owned by [`PropertyTree`] and are addressed by
//! generational [`NodeId`] handles. Each node is owned by its parent: removing a
//! node destroys its whole subtree, and handles into a destroyed subtree become
//! stale rather than aliasing whatever reuses the slot.
//!
//! Mutating operations take a `&mut dyn TreeObserver` and report every structural
//! and value change to it synchronously, before returning.

pub mod path;
pub mod snapshot;
pub mod value;

pub use path::NameIndex;
pub use value::PropValue;

use crate::error::{CanvasError, Result};

/// Generational handle of a property node.
///
/// A handle whose node was removed stays stale forever: reusing the slot bumps the
/// generation, so stale handles never resolve to a different node.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    slot: u32,
    generation: u32,
}

/// A single named/indexed node.
#[derive(Debug)]
pub struct PropertyNode {
    name: String,
    index: u32,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    value: PropValue,
    changed: bool,
}

impl PropertyNode {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in creation order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn value(&self) -> &PropValue {
        &self.value
    }

    /// Set when the value changed since the flag was last cleared.
    pub fn is_changed(&self) -> bool {
        self.changed
    }
}

/// Receives tree notifications. Every method defaults to doing nothing.
pub trait TreeObserver {
    /// `child` was appended to `parent`.
    fn child_added(&mut self, _tree: &PropertyTree, _parent: NodeId, _child: NodeId) {}

    /// `child` is about to be destroyed together with its subtree. The subtree is
    /// still intact while this runs.
    fn child_removed(&mut self, _tree: &PropertyTree, _parent: NodeId, _child: NodeId) {}

    /// The value of `node` changed.
    fn value_changed(&mut self, _tree: &PropertyTree, _node: NodeId) {}

    /// Synthetic notification fired by [`PropertyTree::recursive_notify_restored`].
    fn value_restored(&mut self, _tree: &PropertyTree, _node: NodeId) {}

    /// The whole tree is about to be discarded; every handle becomes stale.
    fn tree_reset(&mut self) {}
}

impl TreeObserver for () {}

struct Slot {
    generation: u32,
    node: Option<PropertyNode>,
}

/// Arena-backed property tree with a single root.
pub struct PropertyTree {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: NodeId,
    live: usize,
}

impl PropertyTree {
    /// Create a tree holding only an unnamed root.
    pub fn new() -> Self {
        let mut tree = Self {
            slots: Vec::new(),
            free: Vec::new(),
            root: NodeId {
                slot: 0,
                generation: 0,
            },
            live: 0,
        };
        tree.root = tree.alloc(PropertyNode {
            name: String::new(),
            index: 0,
            parent: None,
            children: Vec::new(),
            value: PropValue::None,
            changed: false,
        });
        tree
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of live nodes, including the root.
    pub fn len(&self) -> usize {
        self.live
    }

    /// Whether the tree holds nothing but its root.
    pub fn is_empty(&self) -> bool {
        self.live <= 1
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: NodeId) -> Option<&PropertyNode> {
        self.slots
            .get(id.slot as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    fn get_mut(&mut self, id: NodeId) -> Option<&mut PropertyNode> {
        self.slots
            .get_mut(id.slot as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.get(id).map(PropertyNode::name)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(PropertyNode::parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map(PropertyNode::children).unwrap_or(&[])
    }

    pub fn value(&self, id: NodeId) -> Option<&PropValue> {
        self.get(id).map(PropertyNode::value)
    }

    /// Direct child with the given name and index.
    pub fn child(&self, parent: NodeId, name: &str, index: u32) -> Option<NodeId> {
        self.children(parent).iter().copied().find(|c| {
            self.get(*c)
                .is_some_and(|n| n.index == index && n.name == name)
        })
    }

    /// Children of `parent` sharing `name`, in creation order.
    pub fn children_named<'a>(
        &'a self,
        parent: NodeId,
        name: &'a str,
    ) -> impl Iterator<Item = NodeId> + 'a {
        self.children(parent)
            .iter()
            .copied()
            .filter(move |c| self.name(*c) == Some(name))
    }

    /// Return the existing `(name, index)` child or append a new one.
    pub fn get_or_create_child(
        &mut self,
        parent: NodeId,
        name: &str,
        index: u32,
        observer: &mut dyn TreeObserver,
    ) -> Result<NodeId> {
        if name.is_empty() {
            return Err(CanvasError::MalformedPath("empty node name".into()));
        }
        if !self.contains(parent) {
            return Err(CanvasError::StaleNode);
        }
        if let Some(existing) = self.child(parent, name, index) {
            return Ok(existing);
        }

        let child = self.alloc(PropertyNode {
            name: name.to_owned(),
            index,
            parent: Some(parent),
            children: Vec::new(),
            value: PropValue::None,
            changed: false,
        });
        if let Some(p) = self.get_mut(parent) {
            p.children.push(child);
        }
        observer.child_added(self, parent, child);
        Ok(child)
    }

    /// Walk `path` from `from`, creating every missing node on the way.
    ///
    /// The empty path resolves to `from` itself. Indices may be sparse: creating
    /// `size[3]` does not create `size[0..2]`.
    pub fn resolve_path(
        &mut self,
        from: NodeId,
        path: &str,
        observer: &mut dyn TreeObserver,
    ) -> Result<NodeId> {
        let segments = path::parse_path(path)?;
        if !self.contains(from) {
            return Err(CanvasError::StaleNode);
        }
        let mut current = from;
        for seg in &segments {
            current = self.get_or_create_child(current, &seg.name, seg.index, observer)?;
        }
        Ok(current)
    }

    /// Non-creating lookup of `path` below `from`.
    pub fn find_path(&self, from: NodeId, path: &str) -> Option<NodeId> {
        let segments = path::parse_path(path).ok()?;
        segments.iter().try_fold(from, |node, seg| {
            self.child(node, &seg.name, seg.index)
        })
    }

    /// Value at `path` below `from`, if the node exists and holds a value.
    pub fn value_at(&self, from: NodeId, path: &str) -> Option<&PropValue> {
        self.find_path(from, path)
            .and_then(|n| self.value(n))
            .filter(|v| !v.is_none())
    }

    /// Store `value`. Returns `true` and notifies when it differs from the current
    /// value; an identical value is a no-op.
    pub fn set_value(
        &mut self,
        id: NodeId,
        value: PropValue,
        observer: &mut dyn TreeObserver,
    ) -> Result<bool> {
        let node = self.get_mut(id).ok_or(CanvasError::StaleNode)?;
        if node.value == value {
            return Ok(false);
        }
        node.value = value;
        node.changed = true;
        observer.value_changed(self, id);
        Ok(true)
    }

    /// Clear the changed flag, returning its previous state.
    pub fn take_changed(&mut self, id: NodeId) -> bool {
        self.get_mut(id)
            .map(|n| std::mem::take(&mut n.changed))
            .unwrap_or(false)
    }

    /// Destroy `id` and its subtree, returning every destroyed handle (pre-order).
    ///
    /// The observer sees `child_removed` before anything is freed. The root cannot
    /// be removed; use [`reset`](Self::reset) instead.
    pub fn remove_node(
        &mut self,
        id: NodeId,
        observer: &mut dyn TreeObserver,
    ) -> Result<Vec<NodeId>> {
        let parent = self.parent(id).ok_or(CanvasError::StaleNode)?;
        observer.child_removed(self, parent, id);

        if let Some(p) = self.get_mut(parent) {
            p.children.retain(|c| *c != id);
        }
        let doomed = self.descendants(id);
        for node in &doomed {
            self.release(*node);
        }
        Ok(doomed)
    }

    /// Remove the `(name, index)` child of `parent`, if present.
    pub fn remove_child(
        &mut self,
        parent: NodeId,
        name: &str,
        index: u32,
        observer: &mut dyn TreeObserver,
    ) -> Result<Option<Vec<NodeId>>> {
        match self.child(parent, name, index) {
            Some(child) => self.remove_node(child, observer).map(Some),
            None => Ok(None),
        }
    }

    /// Discard every node and start over with a fresh root.
    pub fn reset(&mut self, observer: &mut dyn TreeObserver) {
        observer.tree_reset();
        for slot in 0..self.slots.len() {
            if self.slots[slot].node.take().is_some() {
                self.slots[slot].generation = self.slots[slot].generation.wrapping_add(1);
                self.free.push(slot as u32);
            }
        }
        self.live = 0;
        self.root = self.alloc(PropertyNode {
            name: String::new(),
            index: 0,
            parent: None,
            children: Vec::new(),
            value: PropValue::None,
            changed: false,
        });
    }

    /// `id` and every node below it, parents before children.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            if !self.contains(node) {
                continue;
            }
            out.push(node);
            stack.extend(self.children(node).iter().rev().copied());
        }
        out
    }

    /// Fire one `value_restored` per node of the subtree, in pre-order.
    pub fn recursive_notify_restored(&self, id: NodeId, observer: &mut dyn TreeObserver) {
        for node in self.descendants(id) {
            observer.value_restored(self, node);
        }
    }

    /// Slash-separated path of `id` relative to the root.
    pub fn path(&self, id: NodeId) -> String {
        let mut parts = Vec::new();
        let mut current = Some(id);
        while let Some(node_id) = current {
            let Some(node) = self.get(node_id) else { break };
            if node.parent.is_some() {
                parts.push(NameIndex::new(node.name.clone(), node.index).to_string());
            }
            current = node.parent;
        }
        parts.reverse();
        parts.join("/")
    }

    /// Whether `ancestor` is `id` or one of its ancestors.
    pub fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    fn alloc(&mut self, node: PropertyNode) -> NodeId {
        self.live += 1;
        if let Some(slot) = self.free.pop() {
            let entry = &mut self.slots[slot as usize];
            entry.node = Some(node);
            return NodeId {
                slot,
                generation: entry.generation,
            };
        }
        self.slots.push(Slot {
            generation: 0,
            node: Some(node),
        });
        NodeId {
            slot: (self.slots.len() - 1) as u32,
            generation: 0,
        }
    }

    fn release(&mut self, id: NodeId) {
        if let Some(slot) = self.slots.get_mut(id.slot as usize)
            && slot.generation == id.generation
            && slot.node.take().is_some()
        {
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(id.slot);
            self.live -= 1;
        }
    }
}

impl Default for PropertyTree {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PropertyTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyTree")
            .field("root", &self.root)
            .field("live", &self.live)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    /// Records notifications as strings so ordering can be asserted.
    #[derive(Default)]
    struct Log(Vec<String>);

    impl TreeObserver for Log {
        fn child_added(&mut self, tree: &PropertyTree, _parent: NodeId, child: NodeId) {
            self.0.push(format!("added {}", tree.path(child)));
        }
        fn child_removed(&mut self, tree: &PropertyTree, _parent: NodeId, child: NodeId) {
            self.0.push(format!("removed {}", tree.path(child)));
        }
        fn value_changed(&mut self, tree: &PropertyTree, node: NodeId) {
            self.0.push(format!("changed {}", tree.path(node)));
        }
        fn value_restored(&mut self, tree: &PropertyTree, node: NodeId) {
            self.0.push(format!("restored {}", tree.path(node)));
        }
        fn tree_reset(&mut self) {
            self.0.push("reset".into());
        }
    }

    #[test]
    fn new_tree_has_only_root() {
        let tree = PropertyTree::new();
        assert_eq!(tree.len(), 1);
        assert!(tree.is_empty());
        assert_eq!(tree.path(tree.root()), "");
    }

    #[test]
    fn get_or_create_returns_existing_child() {
        let mut tree = PropertyTree::new();
        let root = tree.root();
        let a = tree.get_or_create_child(root, "size", 0, &mut ()).unwrap();
        let b = tree.get_or_create_child(root, "size", 0, &mut ()).unwrap();
        let c = tree.get_or_create_child(root, "size", 1, &mut ()).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(tree.children(root), &[a, c]);
    }

    #[test]
    fn get_or_create_does_not_reorder() {
        let mut tree = PropertyTree::new();
        let root = tree.root();
        let b = tree.get_or_create_child(root, "b", 0, &mut ()).unwrap();
        let a = tree.get_or_create_child(root, "a", 0, &mut ()).unwrap();
        tree.get_or_create_child(root, "b", 0, &mut ()).unwrap();
        assert_eq!(tree.children(root), &[b, a]);
    }

    #[test]
    fn resolve_path_creates_missing_ancestors_in_order() {
        let mut tree = PropertyTree::new();
        let mut log = Log::default();
        let root = tree.root();
        let leaf = tree.resolve_path(root, "a/b[2]/c", &mut log).unwrap();
        assert_eq!(tree.path(leaf), "a/b[2]/c");
        assert_eq!(log.0, vec!["added a", "added a/b[2]", "added a/b[2]/c"]);
    }

    #[test]
    fn resolve_path_round_trips_with_get_or_create() {
        let mut tree = PropertyTree::new();
        let root = tree.root();
        let group = tree.get_or_create_child(root, "group", 1, &mut ()).unwrap();
        let path = tree.get_or_create_child(group, "path", 0, &mut ()).unwrap();
        let resolved = tree.resolve_path(root, "group[1]/path", &mut ()).unwrap();
        assert_eq!(resolved, path);
        assert_eq!(tree.resolve_path(root, "group[1]/path[0]", &mut ()).unwrap(), path);
    }

    #[test]
    fn resolve_empty_path_is_identity() {
        let mut tree = PropertyTree::new();
        let root = tree.root();
        assert_eq!(tree.resolve_path(root, "", &mut ()).unwrap(), root);
    }

    #[test]
    fn resolve_malformed_path_fails_without_creating() {
        let mut tree = PropertyTree::new();
        let root = tree.root();
        let err = tree.resolve_path(root, "a//b", &mut ());
        assert!(matches!(err, Err(CanvasError::MalformedPath(_))));
        assert!(tree.is_empty());
    }

    #[test]
    fn sparse_indices_are_tolerated() {
        let mut tree = PropertyTree::new();
        let root = tree.root();
        let n = tree.resolve_path(root, "size[3]", &mut ()).unwrap();
        assert_eq!(tree.children(root), &[n]);
        assert!(tree.child(root, "size", 0).is_none());
    }

    #[test]
    fn set_value_notifies_only_on_change() {
        let mut tree = PropertyTree::new();
        let mut log = Log::default();
        let root = tree.root();
        let n = tree.resolve_path(root, "x", &mut ()).unwrap();
        assert!(tree.set_value(n, PropValue::Number(1.0), &mut log).unwrap());
        assert!(!tree.set_value(n, PropValue::Number(1.0), &mut log).unwrap());
        assert_eq!(log.0, vec!["changed x"]);
        assert!(tree.take_changed(n));
        assert!(!tree.take_changed(n));
    }

    #[test]
    fn remove_cascades_and_invalidates_handles() {
        let mut tree = PropertyTree::new();
        let root = tree.root();
        let a = tree.resolve_path(root, "a", &mut ()).unwrap();
        let deep = tree.resolve_path(root, "a/b/c", &mut ()).unwrap();
        let mut log = Log::default();
        let removed = tree.remove_node(a, &mut log).unwrap();

        assert_eq!(removed.len(), 3);
        assert_eq!(log.0, vec!["removed a"]);
        assert!(!tree.contains(a));
        assert!(!tree.contains(deep));
        assert!(tree.children(root).is_empty());
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn stale_handle_never_aliases_reused_slot() {
        let mut tree = PropertyTree::new();
        let root = tree.root();
        let old = tree.resolve_path(root, "old", &mut ()).unwrap();
        tree.remove_node(old, &mut ()).unwrap();
        let new = tree.resolve_path(root, "new", &mut ()).unwrap();
        assert_ne!(old, new);
        assert!(tree.get(old).is_none());
        assert!(matches!(
            tree.set_value(old, PropValue::Number(1.0), &mut ()),
            Err(CanvasError::StaleNode)
        ));
    }

    #[test]
    fn root_cannot_be_removed() {
        let mut tree = PropertyTree::new();
        let root = tree.root();
        assert!(tree.remove_node(root, &mut ()).is_err());
    }

    #[test]
    fn remove_child_by_name() {
        let mut tree = PropertyTree::new();
        let root = tree.root();
        tree.resolve_path(root, "clip", &mut ()).unwrap();
        assert!(tree.remove_child(root, "clip", 0, &mut ()).unwrap().is_some());
        assert!(tree.remove_child(root, "clip", 0, &mut ()).unwrap().is_none());
    }

    #[test]
    fn reset_discards_everything() {
        let mut tree = PropertyTree::new();
        let old_root = tree.root();
        let n = tree.resolve_path(old_root, "a/b", &mut ()).unwrap();
        let mut log = Log::default();
        tree.reset(&mut log);
        assert_eq!(log.0, vec!["reset"]);
        assert!(!tree.contains(n));
        assert!(!tree.contains(old_root));
        assert!(tree.contains(tree.root()));
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn restored_walks_pre_order() {
        let mut tree = PropertyTree::new();
        let root = tree.root();
        tree.resolve_path(root, "a/b", &mut ()).unwrap();
        tree.resolve_path(root, "c", &mut ()).unwrap();
        let mut log = Log::default();
        tree.recursive_notify_restored(root, &mut log);
        assert_eq!(
            log.0,
            vec!["restored ", "restored a", "restored a/b", "restored c"]
        );
    }

    #[test]
    fn value_at_reads_indexed_paths() {
        let mut tree = PropertyTree::new();
        let root = tree.root();
        let h = tree.resolve_path(root, "size[1]", &mut ()).unwrap();
        tree.set_value(h, PropValue::Number(512.0), &mut ()).unwrap();
        assert_eq!(tree.value_at(root, "size[1]").and_then(PropValue::as_f64), Some(512.0));
        assert!(tree.value_at(root, "size").is_none());
    }

    #[test]
    fn is_ancestor_walks_parents() {
        let mut tree = PropertyTree::new();
        let root = tree.root();
        let a = tree.resolve_path(root, "a", &mut ()).unwrap();
        let b = tree.resolve_path(root, "a/b", &mut ()).unwrap();
        assert!(tree.is_ancestor(a, b));
        assert!(tree.is_ancestor(b, b));
        assert!(!tree.is_ancestor(b, a));
    }
}
