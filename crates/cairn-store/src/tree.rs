//! The cluster tree: a B-tree keyed by slot id over (slot, key, value)
//! entries.
//!
//! Leaves are [`Cluster`]s; branches hold pivot slot ids, child refs, and
//! per-child entry counts. The counts make positional access
//! (`get_ndx` / `get_at`) O(log n) instead of a scan.
//!
//! Traversal order is slot-id order, the only ordering the tree natively
//! supports. User-visible orderings are produced above this layer through
//! an indirection vector.

use std::ops::ControlFlow;

use cairn_error::{Result, StoreError};
use cairn_types::{Accumulator, DataType, Value};
use tracing::debug;

use crate::arena::{Arena, NodeRef};
use crate::cluster::Cluster;
use crate::slot::SlotId;

/// Maximum children per branch node; overflow splits the branch.
const MAX_BRANCH_CHILDREN: usize = 256;

/// A node in the cluster tree.
pub(crate) enum Node {
    Leaf(Cluster),
    Branch(Branch),
}

/// An interior node.
///
/// `children[i]` covers slots below `pivots[i]`; the last child covers
/// everything from the last pivot up. `counts[i]` is the entry count of the
/// i-th child's subtree.
pub(crate) struct Branch {
    pivots: Vec<SlotId>,
    children: Vec<NodeRef>,
    counts: Vec<usize>,
}

impl Branch {
    fn child_index(&self, slot: SlotId) -> usize {
        self.pivots.partition_point(|p| *p <= slot)
    }

    fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    fn prefix(&self, child: usize) -> usize {
        self.counts[..child].iter().sum()
    }
}

/// Position of an entry: the leaf holding it and the index within the leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct EntryPos {
    pub(crate) node: NodeRef,
    pub(crate) index: usize,
}

struct Split {
    pivot: SlotId,
    node: NodeRef,
}

struct InsertOutcome {
    /// Absolute position of the new entry within the subtree.
    ndx: usize,
    split: Option<Split>,
}

/// Accessor for a cluster tree rooted in the arena.
///
/// The struct itself is cheap state; all node storage lives in the arena.
/// After a mutating operation the root ref may have changed and must be
/// re-registered with the owner.
pub(crate) struct ClusterTree {
    root: NodeRef,
}

impl ClusterTree {
    /// Create an empty tree rooted in a single empty cluster.
    pub(crate) fn create(arena: &mut Arena<Node>, key_type: DataType) -> Result<Self> {
        let root = arena.alloc(Node::Leaf(Cluster::new(key_type)?))?;
        debug!(target: "cairn::tree", ?root, "created empty cluster tree");
        Ok(Self { root })
    }

    /// Re-attach to an existing tree by its root ref.
    pub(crate) fn load(root: NodeRef) -> Self {
        Self { root }
    }

    /// The current root ref, for registration with the owner.
    pub(crate) fn root(&self) -> NodeRef {
        self.root
    }

    /// Total entry count.
    pub(crate) fn size(&self, arena: &Arena<Node>) -> usize {
        subtree_count(arena, self.root)
    }

    /// Insert a new entry. Fails with `SlotAlreadyUsed` if the slot id is
    /// occupied. Returns the absolute position of the new entry.
    pub(crate) fn insert(
        &mut self,
        arena: &mut Arena<Node>,
        slot: SlotId,
        key: Value,
        value: Value,
    ) -> Result<usize> {
        let outcome = insert_in(arena, self.root, slot, key, value)?;
        if let Some(split) = outcome.split {
            let left_count = subtree_count(arena, self.root);
            let right_count = subtree_count(arena, split.node);
            let root = arena.alloc(Node::Branch(Branch {
                pivots: vec![split.pivot],
                children: vec![self.root, split.node],
                counts: vec![left_count, right_count],
            }))?;
            debug!(target: "cairn::tree", ?root, "root split");
            self.root = root;
        }
        Ok(outcome.ndx)
    }

    /// Locate an entry by slot id.
    pub(crate) fn get(&self, arena: &Arena<Node>, slot: SlotId) -> Result<EntryPos> {
        self.try_get(arena, slot).ok_or(StoreError::SlotNotFound)
    }

    /// Locate an entry by slot id, `None` if absent.
    pub(crate) fn try_get(&self, arena: &Arena<Node>, slot: SlotId) -> Option<EntryPos> {
        let mut node_ref = self.root;
        loop {
            match arena.node(node_ref) {
                Node::Leaf(cluster) => {
                    return cluster
                        .find(slot)
                        .ok()
                        .map(|index| EntryPos { node: node_ref, index });
                }
                Node::Branch(branch) => node_ref = branch.children[branch.child_index(slot)],
            }
        }
    }

    /// The absolute position of the entry with the given slot id.
    pub(crate) fn get_ndx(&self, arena: &Arena<Node>, slot: SlotId) -> Result<usize> {
        let mut node_ref = self.root;
        let mut prefix = 0;
        loop {
            match arena.node(node_ref) {
                Node::Leaf(cluster) => {
                    return cluster
                        .find(slot)
                        .map(|index| prefix + index)
                        .map_err(|_| StoreError::SlotNotFound);
                }
                Node::Branch(branch) => {
                    let child_i = branch.child_index(slot);
                    prefix += branch.prefix(child_i);
                    node_ref = branch.children[child_i];
                }
            }
        }
    }

    /// The entry at an absolute position.
    pub(crate) fn get_at(&self, arena: &Arena<Node>, ndx: usize) -> Result<(SlotId, EntryPos)> {
        let size = self.size(arena);
        if ndx >= size {
            return Err(StoreError::IndexOutOfRange { index: ndx, size });
        }
        let mut node_ref = self.root;
        let mut remaining = ndx;
        loop {
            match arena.node(node_ref) {
                Node::Leaf(cluster) => {
                    return Ok((
                        cluster.slot_at(remaining),
                        EntryPos {
                            node: node_ref,
                            index: remaining,
                        },
                    ));
                }
                Node::Branch(branch) => {
                    let mut child_i = 0;
                    while remaining >= branch.counts[child_i] {
                        remaining -= branch.counts[child_i];
                        child_i += 1;
                    }
                    node_ref = branch.children[child_i];
                }
            }
        }
    }

    /// Remove the entry with the given slot id, returning its value.
    /// Emptied clusters collapse out of the tree.
    pub(crate) fn erase(&mut self, arena: &mut Arena<Node>, slot: SlotId) -> Result<Value> {
        let removed = erase_in(arena, self.root, slot)?;
        // Collapse single-child roots so the depth shrinks with the data.
        loop {
            let only_child = match arena.node(self.root) {
                Node::Branch(branch) if branch.children.len() == 1 => Some(branch.children[0]),
                _ => None,
            };
            match only_child {
                Some(child) => {
                    arena.free(self.root);
                    debug!(target: "cairn::tree", "root collapse");
                    self.root = child;
                }
                None => break,
            }
        }
        Ok(removed)
    }

    /// Visit each cluster in slot order with its starting absolute
    /// position, until the visitor breaks.
    pub(crate) fn traverse<F>(&self, arena: &Arena<Node>, mut visitor: F)
    where
        F: FnMut(&Cluster, usize) -> ControlFlow<()>,
    {
        let mut start = 0;
        let _ = walk(arena, self.root, &mut start, &mut visitor);
    }

    /// Run an accumulator over every stored value in traversal order.
    /// Returns the absolute position of the last value the accumulator
    /// took (for min/max, the first position achieving the extremum).
    pub(crate) fn accumulate<A: Accumulator>(
        &self,
        arena: &Arena<Node>,
        agg: &mut A,
    ) -> Option<usize> {
        let mut taken_at = None;
        self.traverse(arena, |cluster, start| {
            for (i, value) in cluster.values().iter().enumerate() {
                if agg.accumulate(value) {
                    taken_at = Some(start + i);
                }
            }
            ControlFlow::Continue(())
        });
        taken_at
    }

    /// Free every node of the tree.
    pub(crate) fn destroy(self, arena: &mut Arena<Node>) {
        free_subtree(arena, self.root);
        debug!(target: "cairn::tree", "cluster tree destroyed");
    }

    /// The stored (unfiltered) value at an entry position.
    pub(crate) fn value_at<'a>(&self, arena: &'a Arena<Node>, pos: EntryPos) -> &'a Value {
        match arena.node(pos.node) {
            Node::Leaf(cluster) => cluster.value_at(pos.index),
            Node::Branch(_) => unreachable!("entry position must address a leaf"),
        }
    }

    /// The user key at an entry position.
    pub(crate) fn key_at(&self, arena: &Arena<Node>, pos: EntryPos) -> Value {
        match arena.node(pos.node) {
            Node::Leaf(cluster) => cluster.key_at(pos.index),
            Node::Branch(_) => unreachable!("entry position must address a leaf"),
        }
    }

    /// Overwrite the value at an entry position in place.
    pub(crate) fn set_value_at(&self, arena: &mut Arena<Node>, pos: EntryPos, value: Value) {
        match arena.node_mut(pos.node) {
            Node::Leaf(cluster) => cluster.set_value(pos.index, value),
            Node::Branch(_) => unreachable!("entry position must address a leaf"),
        }
    }
}

fn subtree_count(arena: &Arena<Node>, node_ref: NodeRef) -> usize {
    match arena.node(node_ref) {
        Node::Leaf(cluster) => cluster.len(),
        Node::Branch(branch) => branch.total(),
    }
}

fn walk<F>(
    arena: &Arena<Node>,
    node_ref: NodeRef,
    start: &mut usize,
    visitor: &mut F,
) -> ControlFlow<()>
where
    F: FnMut(&Cluster, usize) -> ControlFlow<()>,
{
    match arena.node(node_ref) {
        Node::Leaf(cluster) => {
            let s = *start;
            *start += cluster.len();
            visitor(cluster, s)
        }
        Node::Branch(branch) => {
            for &child in &branch.children {
                walk(arena, child, start, visitor)?;
            }
            ControlFlow::Continue(())
        }
    }
}

fn free_subtree(arena: &mut Arena<Node>, node_ref: NodeRef) {
    match arena.free(node_ref) {
        Node::Leaf(_) => {}
        Node::Branch(branch) => {
            for child in branch.children {
                free_subtree(arena, child);
            }
        }
    }
}

fn insert_in(
    arena: &mut Arena<Node>,
    node_ref: NodeRef,
    slot: SlotId,
    key: Value,
    value: Value,
) -> Result<InsertOutcome> {
    enum Step {
        Leaf,
        Branch {
            child: NodeRef,
            child_i: usize,
            prefix: usize,
        },
    }
    let step = match arena.node(node_ref) {
        Node::Leaf(_) => Step::Leaf,
        Node::Branch(branch) => {
            let child_i = branch.child_index(slot);
            Step::Branch {
                child: branch.children[child_i],
                child_i,
                prefix: branch.prefix(child_i),
            }
        }
    };

    match step {
        Step::Leaf => {
            let pending = {
                let Node::Leaf(cluster) = arena.node_mut(node_ref) else {
                    unreachable!()
                };
                let index = match cluster.find(slot) {
                    Ok(_) => return Err(StoreError::SlotAlreadyUsed),
                    Err(insertion_point) => insertion_point,
                };
                cluster.insert_at(index, slot, key, value)?;
                if cluster.needs_split() {
                    let right = cluster.split();
                    (index, Some((right.first_slot(), right)))
                } else {
                    (index, None)
                }
            };
            let (ndx, split) = pending;
            let split = match split {
                Some((pivot, right)) => {
                    let node = arena.alloc(Node::Leaf(right))?;
                    debug!(target: "cairn::tree", "cluster split");
                    Some(Split { pivot, node })
                }
                None => None,
            };
            Ok(InsertOutcome { ndx, split })
        }
        Step::Branch {
            child,
            child_i,
            prefix,
        } => {
            let outcome = insert_in(arena, child, slot, key, value)?;
            let split_counts = outcome
                .split
                .as_ref()
                .map(|s| (subtree_count(arena, child), subtree_count(arena, s.node)));

            let pending_split = {
                let Node::Branch(branch) = arena.node_mut(node_ref) else {
                    unreachable!()
                };
                match (outcome.split, split_counts) {
                    (Some(split), Some((left_count, right_count))) => {
                        branch.pivots.insert(child_i, split.pivot);
                        branch.children.insert(child_i + 1, split.node);
                        branch.counts[child_i] = left_count;
                        branch.counts.insert(child_i + 1, right_count);
                    }
                    _ => branch.counts[child_i] += 1,
                }
                if branch.children.len() > MAX_BRANCH_CHILDREN {
                    let mid = branch.pivots.len() / 2;
                    let promote = branch.pivots[mid];
                    let right_pivots = branch.pivots.split_off(mid + 1);
                    branch.pivots.pop();
                    let right = Branch {
                        pivots: right_pivots,
                        children: branch.children.split_off(mid + 1),
                        counts: branch.counts.split_off(mid + 1),
                    };
                    Some((promote, right))
                } else {
                    None
                }
            };
            let split = match pending_split {
                Some((pivot, right)) => {
                    let node = arena.alloc(Node::Branch(right))?;
                    debug!(target: "cairn::tree", "branch split");
                    Some(Split { pivot, node })
                }
                None => None,
            };
            Ok(InsertOutcome {
                ndx: prefix + outcome.ndx,
                split,
            })
        }
    }
}

fn erase_in(arena: &mut Arena<Node>, node_ref: NodeRef, slot: SlotId) -> Result<Value> {
    let descend = match arena.node(node_ref) {
        Node::Leaf(_) => None,
        Node::Branch(branch) => {
            let child_i = branch.child_index(slot);
            Some((branch.children[child_i], child_i))
        }
    };
    let Some((child, child_i)) = descend else {
        let Node::Leaf(cluster) = arena.node_mut(node_ref) else {
            unreachable!()
        };
        let index = cluster.find(slot).map_err(|_| StoreError::SlotNotFound)?;
        return Ok(cluster.remove_at(index));
    };

    let removed = erase_in(arena, child, slot)?;
    let child_now_empty = subtree_count(arena, child) == 0;
    let mut freed_child = None;
    {
        let Node::Branch(branch) = arena.node_mut(node_ref) else {
            unreachable!()
        };
        branch.counts[child_i] -= 1;
        if child_now_empty {
            branch.children.remove(child_i);
            branch.counts.remove(child_i);
            if !branch.pivots.is_empty() {
                let pivot_i = child_i.saturating_sub(1);
                branch.pivots.remove(pivot_i);
            }
            freed_child = Some(child);
        }
    }
    if let Some(child) = freed_child {
        arena.free(child);
        debug!(target: "cairn::tree", "empty cluster collapsed");
    }
    Ok(removed)
}
