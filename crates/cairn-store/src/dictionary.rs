//! The dictionary collection: a persistent mapping from scalar keys to
//! mixed values, stored in a cluster tree keyed by derived slot ids.
//!
//! A `Dictionary` is an accessor bound to (parent table, parent object,
//! column). The tree is created lazily on first write and registered with
//! the parent object's column slot; an empty dictionary has no storage.
//! Every operation resolves the parent object first, so a handle that
//! outlives its object reports `DetachedAccessor` instead of touching
//! stale state.
//!
//! Iteration and positional access follow slot-id order, which is stable
//! but unrelated to key order. Key- or value-ordered views are produced
//! through an external index vector (`sort`, `distinct`, `sort_keys`).

use std::cell::RefCell;
use std::ops::ControlFlow;
use std::rc::Rc;

use cairn_error::{Result, StoreError};
use cairn_types::{
    Accumulator, Average, DataType, Maximum, Minimum, NumericKind, ObjKey, Sum, TableKey, Value,
};
use tracing::debug;

use crate::arena::NodeRef;
use crate::normalize::{self, NormalizedValue};
use crate::replication::CollectionId;
use crate::slot;
use crate::store::{CascadeState, CollectionSlot, StoreInner};
use crate::tree::ClusterTree;

/// A persistent dictionary accessor.
#[derive(Clone)]
pub struct Dictionary {
    inner: Rc<RefCell<StoreInner>>,
    id: CollectionId,
    key_type: DataType,
    target_table: Option<TableKey>,
}

impl std::fmt::Debug for Dictionary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dictionary")
            .field("id", &self.id)
            .field("key_type", &self.key_type)
            .field("target_table", &self.target_table)
            .finish()
    }
}

impl Dictionary {
    pub(crate) fn new(
        inner: Rc<RefCell<StoreInner>>,
        id: CollectionId,
        key_type: DataType,
        target_table: Option<TableKey>,
    ) -> Self {
        Self {
            inner,
            id,
            key_type,
            target_table,
        }
    }

    /// The declared key type.
    pub fn key_data_type(&self) -> DataType {
        self.key_type
    }

    /// The declared value type.
    pub fn value_data_type(&self) -> DataType {
        self.id.col.data_type()
    }

    /// Whether the parent object is still live.
    pub fn is_attached(&self) -> bool {
        let inner = self.inner.borrow();
        inner.object(self.id.table, self.id.obj).is_ok()
    }

    /// The change counter of this collection. Bumped by every mutation;
    /// observers compare it to detect invalidation.
    pub fn content_version(&self) -> u64 {
        let inner = self.inner.borrow();
        self.slot_state(&inner).map_or(0, |s| s.version)
    }

    /// Number of entries. A detached handle or an absent tree reads as
    /// empty.
    pub fn size(&self) -> usize {
        let inner = self.inner.borrow();
        match self.load_tree(&inner) {
            Ok(Some(tree)) => tree.size(&inner.arena),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    // ── Point operations ─────────────────────────────────────────────────

    /// Insert or update. Returns an iterator positioned at the entry and
    /// whether a new entry was created (`false` means an existing entry's
    /// value was overwritten).
    pub fn insert(&self, key: Value, value: Value) -> Result<(DictionaryIter, bool)> {
        let (ndx, inserted) = {
            let mut guard = self.inner.borrow_mut();
            self.insert_inner(&mut guard, key, value)?
        };
        Ok((self.iter_at(ndx), inserted))
    }

    fn insert_inner(
        &self,
        inner: &mut StoreInner,
        key: Value,
        value: Value,
    ) -> Result<(usize, bool)> {
        inner.object(self.id.table, self.id.obj)?;
        normalize::validate_key(self.key_type, &key)?;
        let spec = inner.column_spec(self.id.table, self.id.col.idx())?;
        let NormalizedValue { value, new_link } = normalize::normalize_value(inner, spec, value)?;

        let slot_id = slot::derive(&key)?;
        let mut tree = self.ensure_tree(inner)?;

        // New entries are the common case; an occupied slot downgrades the
        // insert to an in-place update of the first occupant. Distinct keys
        // whose hashes collide take the same path.
        let (ndx, inserted) =
            match tree.insert(&mut inner.arena, slot_id, key.clone(), value.clone()) {
                Ok(ndx) => {
                    self.set_root(inner, Some(tree.root()))?;
                    (ndx, true)
                }
                Err(StoreError::SlotAlreadyUsed) => (tree.get_ndx(&inner.arena, slot_id)?, false),
                Err(err) => return Err(err),
            };

        if let Some(sink) = inner.replication.clone() {
            if inserted {
                sink.borrow_mut()
                    .dictionary_insert(&self.id, ndx, &key, &value);
            } else {
                sink.borrow_mut()
                    .dictionary_set(&self.id, ndx, &key, &value);
            }
        }
        self.bump_version(inner)?;

        let mut old_link = None;
        if !inserted {
            let pos = tree.get(&inner.arena, slot_id)?;
            if let Value::TypedLink(link) = tree.value_at(&inner.arena, pos) {
                if !link.is_unresolved() {
                    old_link = Some(*link);
                }
            }
            tree.set_value_at(&mut inner.arena, pos, value);
        }

        if new_link != old_link {
            let mut cascade = CascadeState::new();
            let origin = (self.id.table, self.id.col.idx(), self.id.obj);
            let recurse = inner.replace_backlink(origin, old_link, new_link, &mut cascade);
            if recurse {
                inner.remove_recursive(cascade);
            }
        }
        Ok((ndx, inserted))
    }

    /// Look up a key. Fails with `KeyNotFound` if absent.
    pub fn get(&self, key: &Value) -> Result<Value> {
        let inner = self.inner.borrow();
        inner.object(self.id.table, self.id.obj)?;
        let tree = self.load_tree(&inner)?.ok_or(StoreError::KeyNotFound)?;
        let slot_id = slot::derive(key)?;
        match tree.get(&inner.arena, slot_id) {
            Ok(pos) => Ok(normalize::filter_read(
                self.value_data_type(),
                tree.value_at(&inner.arena, pos),
            )),
            Err(StoreError::SlotNotFound) => Err(StoreError::KeyNotFound),
            Err(err) => Err(err),
        }
    }

    /// Look up a key, `None` if absent.
    pub fn try_get(&self, key: &Value) -> Result<Option<Value>> {
        match self.get(key) {
            Ok(value) => Ok(Some(value)),
            Err(StoreError::KeyNotFound) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Read-or-insert-null: the value if the key is present, otherwise a
    /// null entry is created and null returned. The inserted null emits no
    /// replication and touches no backlinks.
    pub fn get_or_insert_null(&self, key: Value) -> Result<Value> {
        if let Some(value) = self.try_get(&key)? {
            return Ok(value);
        }
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;
        inner.object(self.id.table, self.id.obj)?;
        normalize::validate_key(self.key_type, &key)?;
        let slot_id = slot::derive(&key)?;
        let mut tree = self.ensure_tree(inner)?;
        tree.insert(&mut inner.arena, slot_id, key, Value::Null)?;
        self.set_root(inner, Some(tree.root()))?;
        self.bump_version(inner)?;
        Ok(Value::Null)
    }

    /// Whether a key is present.
    pub fn contains(&self, key: &Value) -> Result<bool> {
        Ok(self.try_get(key)?.is_some())
    }

    /// An iterator positioned at the entry for `key`, or at the end if the
    /// key is absent.
    pub fn find(&self, key: &Value) -> DictionaryIter {
        let pos = {
            let inner = self.inner.borrow();
            self.load_tree(&inner)
                .ok()
                .flatten()
                .and_then(|tree| {
                    let slot_id = slot::derive(key).ok()?;
                    tree.get_ndx(&inner.arena, slot_id).ok()
                })
        };
        match pos {
            Some(ndx) => self.iter_at(ndx),
            None => self.iter_at(self.size()),
        }
    }

    /// Remove an entry, clearing its backlink (cascading through embedded
    /// tables). Removing from a dictionary with no storage is a no-op; a
    /// missing key in a non-empty dictionary fails with `KeyNotFound`.
    pub fn erase(&self, key: &Value) -> Result<()> {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;
        inner.object(self.id.table, self.id.obj)?;
        normalize::validate_key(self.key_type, key)?;
        let Some(mut tree) = self.load_tree(inner)? else {
            return Ok(());
        };
        if tree.size(&inner.arena) == 0 {
            return Ok(());
        }
        let slot_id = slot::derive(key)?;
        let pos = match tree.get(&inner.arena, slot_id) {
            Ok(pos) => pos,
            Err(StoreError::SlotNotFound) => return Err(StoreError::KeyNotFound),
            Err(err) => return Err(err),
        };
        let old_value = tree.value_at(&inner.arena, pos).clone();

        let mut cascade = CascadeState::new();
        let mut recurse = false;
        if let Value::TypedLink(link) = &old_value {
            if !link.is_unresolved() {
                let origin = (self.id.table, self.id.col.idx(), self.id.obj);
                recurse = inner.remove_backlink(origin, *link, &mut cascade);
            }
        }
        if recurse {
            inner.remove_recursive(cascade);
        }

        if let Some(sink) = inner.replication.clone() {
            let ndx = tree.get_ndx(&inner.arena, slot_id)?;
            sink.borrow_mut().dictionary_erase(&self.id, ndx, key);
        }
        tree.erase(&mut inner.arena, slot_id)?;
        self.set_root(inner, Some(tree.root()))?;
        self.bump_version(inner)?;
        Ok(())
    }

    /// Remove the entry at an absolute position.
    pub fn erase_at(&self, ndx: usize) -> Result<()> {
        let key = self.get_key(ndx)?;
        self.erase(&key)
    }

    /// Remove every entry, destroy the tree, and unlink the root ref from
    /// the parent object. Backlinks are cleared per entry, accumulating
    /// one cascade.
    pub fn clear(&self) -> Result<()> {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;
        inner.object(self.id.table, self.id.obj)?;
        let Some(tree) = self.load_tree(inner)? else {
            return Ok(());
        };
        if tree.size(&inner.arena) == 0 {
            return Ok(());
        }

        let entries =
            inner.collection_entries(self.id.table, self.id.obj, self.id.col.idx())?;
        let replication = inner.replication.clone();
        let mut cascade = CascadeState::new();
        let mut recurse = false;
        let origin = (self.id.table, self.id.col.idx(), self.id.obj);
        for (n, (key, value)) in entries.iter().enumerate() {
            if let Value::TypedLink(link) = value {
                if !link.is_unresolved() && inner.remove_backlink(origin, *link, &mut cascade) {
                    recurse = true;
                }
            }
            if let Some(sink) = &replication {
                sink.borrow_mut().dictionary_erase(&self.id, n, key);
            }
        }

        tree.destroy(&mut inner.arena);
        self.set_root(inner, None)?;
        self.bump_version(inner)?;
        debug!(target: "cairn::dictionary", "dictionary cleared");

        if recurse {
            inner.remove_recursive(cascade);
        }
        Ok(())
    }

    /// Overwrite an entry's value with null in place: no backlink or
    /// cascade work. Used by the object store when a referenced object is
    /// deleted out from under the entry.
    pub fn nullify(&self, key: &Value) -> Result<()> {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;
        inner.object(self.id.table, self.id.obj)?;
        let Some(tree) = self.load_tree(inner)? else {
            return Err(StoreError::KeyNotFound);
        };
        let slot_id = slot::derive(key)?;
        let pos = match tree.get(&inner.arena, slot_id) {
            Ok(pos) => pos,
            Err(StoreError::SlotNotFound) => return Err(StoreError::KeyNotFound),
            Err(err) => return Err(err),
        };
        if let Some(sink) = inner.replication.clone() {
            let ndx = tree.get_ndx(&inner.arena, slot_id)?;
            sink.borrow_mut()
                .dictionary_set(&self.id, ndx, key, &Value::Null);
        }
        tree.set_value_at(&mut inner.arena, pos, Value::Null);
        self.bump_version(inner)?;
        Ok(())
    }

    // ── Positional access ────────────────────────────────────────────────

    /// The (filtered) value at an absolute position.
    pub fn get_any(&self, ndx: usize) -> Result<Value> {
        Ok(self.get_pair(ndx)?.1)
    }

    /// The key at an absolute position.
    pub fn get_key(&self, ndx: usize) -> Result<Value> {
        let inner = self.inner.borrow();
        inner.object(self.id.table, self.id.obj)?;
        let tree = self
            .load_tree(&inner)?
            .ok_or(StoreError::IndexOutOfRange { index: ndx, size: 0 })?;
        let (_, pos) = tree.get_at(&inner.arena, ndx)?;
        Ok(tree.key_at(&inner.arena, pos))
    }

    /// The (key, filtered value) pair at an absolute position.
    pub fn get_pair(&self, ndx: usize) -> Result<(Value, Value)> {
        let inner = self.inner.borrow();
        inner.object(self.id.table, self.id.obj)?;
        let tree = self
            .load_tree(&inner)?
            .ok_or(StoreError::IndexOutOfRange { index: ndx, size: 0 })?;
        let (_, pos) = tree.get_at(&inner.arena, ndx)?;
        let key = tree.key_at(&inner.arena, pos);
        let value =
            normalize::filter_read(self.value_data_type(), tree.value_at(&inner.arena, pos));
        Ok((key, value))
    }

    /// Whether the value at an absolute position reads as null.
    pub fn is_null(&self, ndx: usize) -> Result<bool> {
        Ok(self.get_any(ndx)?.is_null())
    }

    /// Iterate (key, value) pairs in slot-id order.
    pub fn iter(&self) -> DictionaryIter {
        self.iter_at(0)
    }

    fn iter_at(&self, pos: usize) -> DictionaryIter {
        DictionaryIter {
            dict: self.clone(),
            pos,
        }
    }

    // ── Scans ────────────────────────────────────────────────────────────

    /// The position of the first entry whose stored value equals `value`.
    pub fn find_any(&self, value: &Value) -> Option<usize> {
        let inner = self.inner.borrow();
        let tree = self.load_tree(&inner).ok().flatten()?;
        let mut found = None;
        tree.traverse(&inner.arena, |cluster, start| {
            for i in 0..cluster.len() {
                if cluster.value_at(i) == value {
                    found = Some(start + i);
                    return ControlFlow::Break(());
                }
            }
            ControlFlow::Continue(())
        });
        found
    }

    /// The position of the entry for `key`, if present.
    pub fn find_any_key(&self, key: &Value) -> Option<usize> {
        let inner = self.inner.borrow();
        let tree = self.load_tree(&inner).ok().flatten()?;
        let slot_id = slot::derive(key).ok()?;
        tree.get_ndx(&inner.arena, slot_id).ok()
    }

    // ── Aggregates ───────────────────────────────────────────────────────

    /// The smallest non-null value and the position where it first occurs.
    pub fn min(&self) -> Result<Option<(Value, usize)>> {
        self.extremum(Minimum::new(), Minimum::into_result)
    }

    /// The largest non-null value and the position where it first occurs.
    pub fn max(&self) -> Result<Option<(Value, usize)>> {
        self.extremum(Maximum::new(), Maximum::into_result)
    }

    fn extremum<A: Accumulator>(
        &self,
        mut agg: A,
        result: impl FnOnce(A) -> Option<Value>,
    ) -> Result<Option<(Value, usize)>> {
        let inner = self.inner.borrow();
        inner.object(self.id.table, self.id.obj)?;
        let Some(tree) = self.load_tree(&inner)? else {
            return Ok(None);
        };
        let ndx = tree.accumulate(&inner.arena, &mut agg);
        Ok(match (result(agg), ndx) {
            (Some(value), Some(ndx)) => Some((value, ndx)),
            _ => None,
        })
    }

    /// The sum of values in the column's numeric domain, and how many
    /// values participated. An absent tree sums to integer zero.
    pub fn sum(&self) -> Result<(Value, usize)> {
        let inner = self.inner.borrow();
        inner.object(self.id.table, self.id.obj)?;
        let Some(tree) = self.load_tree(&inner)? else {
            return Ok((Value::Int(0), 0));
        };
        let mut agg = Sum::new(NumericKind::for_column(self.value_data_type()));
        tree.accumulate(&inner.arena, &mut agg);
        Ok((agg.result(), agg.items_counted()))
    }

    /// The average of values in the column's numeric domain, `None` when
    /// nothing participated.
    pub fn avg(&self) -> Result<(Option<Value>, usize)> {
        let inner = self.inner.borrow();
        inner.object(self.id.table, self.id.obj)?;
        let Some(tree) = self.load_tree(&inner)? else {
            return Ok((None, 0));
        };
        let mut agg = Average::new(NumericKind::for_column(self.value_data_type()));
        tree.accumulate(&inner.arena, &mut agg);
        Ok((agg.result(), agg.items_counted()))
    }

    // ── Ordered views ────────────────────────────────────────────────────

    /// Align an external index vector to the current size: shrinking
    /// restarts it, growth appends the missing positions.
    pub fn align_indices(&self, indices: &mut Vec<usize>) {
        let size = self.size();
        if size < indices.len() {
            indices.clear();
        }
        for i in indices.len()..size {
            indices.push(i);
        }
    }

    /// Stable-sort the index vector by value.
    pub fn sort(&self, indices: &mut Vec<usize>, ascending: bool) -> Result<()> {
        self.align_indices(indices);
        let values = self.collect_values()?;
        indices.sort_by(|&a, &b| {
            if ascending {
                values[a].cmp(&values[b])
            } else {
                values[b].cmp(&values[a])
            }
        });
        Ok(())
    }

    /// Collapse equal values to the first position holding them. With no
    /// requested direction the surviving indices are returned in natural
    /// (positional) order.
    pub fn distinct(&self, indices: &mut Vec<usize>, ascending: Option<bool>) -> Result<()> {
        self.align_indices(indices);
        let values = self.collect_values()?;
        let asc = ascending.unwrap_or(true);
        indices.sort_by(|&a, &b| {
            if asc {
                values[a].cmp(&values[b])
            } else {
                values[b].cmp(&values[a])
            }
        });
        indices.dedup_by(|a, b| values[*a] == values[*b]);
        if ascending.is_none() {
            indices.sort_unstable();
        }
        Ok(())
    }

    /// Stable-sort the index vector by key.
    pub fn sort_keys(&self, indices: &mut Vec<usize>, ascending: bool) -> Result<()> {
        self.align_indices(indices);
        let keys = self.collect_keys()?;
        indices.sort_by(|&a, &b| {
            if ascending {
                keys[a].cmp(&keys[b])
            } else {
                keys[b].cmp(&keys[a])
            }
        });
        Ok(())
    }

    /// Keys are unique by construction, so distinct on keys is just index
    /// alignment.
    pub fn distinct_keys(&self, indices: &mut Vec<usize>, _ascending: Option<bool>) -> Result<()> {
        self.align_indices(indices);
        Ok(())
    }

    // ── Linked objects ───────────────────────────────────────────────────

    /// Create an object in the target table and insert a link to it under
    /// `key`. Returns the new object's key.
    pub fn create_and_insert_linked_object(&self, key: Value) -> Result<ObjKey> {
        let target = self
            .target_table
            .ok_or_else(|| StoreError::collection_mismatch("not a link dictionary"))?;
        let obj = {
            let mut inner = self.inner.borrow_mut();
            let table = inner
                .tables
                .get_mut(&target)
                .ok_or(StoreError::DetachedAccessor)?;
            let obj_key = ObjKey::new(table.next_obj_key());
            table.objects.insert(obj_key, Default::default());
            obj_key
        };
        self.insert(key, Value::Link(obj))?;
        Ok(obj)
    }

    /// A positional view over a link dictionary's target object keys.
    pub fn link_values(&self) -> Result<DictionaryLinkValues> {
        if self.value_data_type() != DataType::Link {
            return Err(StoreError::collection_mismatch(
                "link values require a Link dictionary",
            ));
        }
        Ok(DictionaryLinkValues { dict: self.clone() })
    }

    /// Clear the backlink of every link-typed value without touching the
    /// entries. Used while the parent object itself is being removed.
    pub fn remove_backlinks(&self) -> Result<()> {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;
        inner.object(self.id.table, self.id.obj)?;
        let entries =
            inner.collection_entries(self.id.table, self.id.obj, self.id.col.idx())?;
        let origin = (self.id.table, self.id.col.idx(), self.id.obj);
        let mut cascade = CascadeState::new();
        let mut recurse = false;
        for (_, value) in &entries {
            if let Value::TypedLink(link) = value {
                if !link.is_unresolved() && inner.remove_backlink(origin, *link, &mut cascade) {
                    recurse = true;
                }
            }
        }
        if recurse {
            inner.remove_recursive(cascade);
        }
        Ok(())
    }

    // ── Internals ────────────────────────────────────────────────────────

    fn slot_state(&self, inner: &StoreInner) -> Result<CollectionSlot> {
        Ok(inner
            .object(self.id.table, self.id.obj)?
            .collections
            .get(&self.id.col.idx())
            .copied()
            .unwrap_or_default())
    }

    fn load_tree(&self, inner: &StoreInner) -> Result<Option<ClusterTree>> {
        Ok(self.slot_state(inner)?.root.map(ClusterTree::load))
    }

    fn ensure_tree(&self, inner: &mut StoreInner) -> Result<ClusterTree> {
        if let Some(tree) = self.load_tree(inner)? {
            return Ok(tree);
        }
        let tree = ClusterTree::create(&mut inner.arena, self.key_type)?;
        self.set_root(inner, Some(tree.root()))?;
        debug!(target: "cairn::dictionary", "lazy tree creation");
        Ok(tree)
    }

    /// The single path through which the parent object's column slot (the
    /// tree root ref) is mutated.
    fn set_root(&self, inner: &mut StoreInner, root: Option<NodeRef>) -> Result<()> {
        inner
            .object_mut(self.id.table, self.id.obj)?
            .collections
            .entry(self.id.col.idx())
            .or_default()
            .root = root;
        Ok(())
    }

    fn bump_version(&self, inner: &mut StoreInner) -> Result<()> {
        inner
            .object_mut(self.id.table, self.id.obj)?
            .collections
            .entry(self.id.col.idx())
            .or_default()
            .version += 1;
        Ok(())
    }

    /// All filtered values, in slot order.
    fn collect_values(&self) -> Result<Vec<Value>> {
        let inner = self.inner.borrow();
        inner.object(self.id.table, self.id.obj)?;
        let mut values = Vec::new();
        if let Some(tree) = self.load_tree(&inner)? {
            let declared = self.value_data_type();
            tree.traverse(&inner.arena, |cluster, _| {
                for value in cluster.values() {
                    values.push(normalize::filter_read(declared, value));
                }
                ControlFlow::Continue(())
            });
        }
        Ok(values)
    }

    /// All keys, in slot order.
    fn collect_keys(&self) -> Result<Vec<Value>> {
        let inner = self.inner.borrow();
        inner.object(self.id.table, self.id.obj)?;
        let mut keys = Vec::new();
        if let Some(tree) = self.load_tree(&inner)? {
            tree.traverse(&inner.arena, |cluster, _| {
                for i in 0..cluster.len() {
                    keys.push(cluster.key_at(i));
                }
                ControlFlow::Continue(())
            });
        }
        Ok(keys)
    }
}

/// Iterator over (key, filtered value) pairs in slot-id order.
///
/// The iterator is positional: it re-reads the dictionary on every step.
/// Mutating the dictionary during iteration is undefined (entries may be
/// skipped or visited twice); compare [`Dictionary::content_version`]
/// snapshots to detect it.
pub struct DictionaryIter {
    dict: Dictionary,
    pos: usize,
}

impl std::fmt::Debug for DictionaryIter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DictionaryIter")
            .field("dict", &self.dict)
            .field("pos", &self.pos)
            .finish()
    }
}

impl DictionaryIter {
    /// The absolute position this iterator is at.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Whether the iterator is at (or past) the end.
    pub fn is_end(&self) -> bool {
        self.pos >= self.dict.size()
    }
}

impl Iterator for DictionaryIter {
    type Item = (Value, Value);

    fn next(&mut self) -> Option<Self::Item> {
        match self.dict.get_pair(self.pos) {
            Ok(pair) => {
                self.pos += 1;
                Some(pair)
            }
            Err(_) => None,
        }
    }
}

/// Positional view over the object keys of a `Link` dictionary.
///
/// A dictionary can hold null links (the key alone may carry information),
/// so positions report validity individually.
pub struct DictionaryLinkValues {
    dict: Dictionary,
}

impl std::fmt::Debug for DictionaryLinkValues {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DictionaryLinkValues")
            .field("dict", &self.dict)
            .finish()
    }
}

impl DictionaryLinkValues {
    /// The target object key at `ndx`; `None` for null or unresolved
    /// entries.
    pub fn get_key(&self, ndx: usize) -> Result<Option<ObjKey>> {
        Ok(self.dict.get_any(ndx)?.as_link())
    }

    /// Whether the entry at `ndx` currently resolves to a live object.
    pub fn is_obj_valid(&self, ndx: usize) -> Result<bool> {
        Ok(self.get_key(ndx)?.is_some())
    }

    /// Number of entries in the underlying dictionary.
    pub fn size(&self) -> usize {
        self.dict.size()
    }
}
