//! The enclosing object store.
//!
//! A [`Store`] owns the arena, the tables, and the replication sink. The
//! dictionary layer reaches everything through a shared handle
//! (`Rc<RefCell<StoreInner>>`): single-writer, no locking, and a dropped
//! parent object surfaces as `DetachedAccessor` rather than a dangling
//! pointer.
//!
//! Backlinks: for every live typed link stored under (origin table, origin
//! column, origin object), the target object records one backlink entry.
//! Removing the last backlink of an object in an embedded table schedules
//! the object for recursive removal (strong cascade).

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::ops::ControlFlow;
use std::rc::Rc;

use cairn_error::{Result, StoreError};
use cairn_types::{ColKey, ColumnKind, DataType, ObjKey, ObjLink, TableKey, Value};
use smallvec::SmallVec;
use tracing::debug;

use crate::arena::{Arena, NodeRef};
use crate::dictionary::Dictionary;
use crate::replication::{CollectionId, ReplicationSink};
use crate::tree::{ClusterTree, Node};

/// Schema of one column.
pub(crate) struct ColumnSpec {
    pub(crate) col: ColKey,
    /// Declared dictionary key type (`Int`, `String`, or `Mixed`).
    pub(crate) key_type: DataType,
    /// Opposite table for `Link` columns.
    pub(crate) target_table: Option<TableKey>,
}

/// The tree root ref and change counter of one collection column slot.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct CollectionSlot {
    pub(crate) root: Option<NodeRef>,
    pub(crate) version: u64,
}

/// Per-object state: collection slots by column index, and the backlink
/// multiset keyed by (origin table, origin column).
#[derive(Default)]
pub(crate) struct ObjData {
    pub(crate) collections: BTreeMap<u32, CollectionSlot>,
    pub(crate) backlinks: BTreeMap<(TableKey, u32), Vec<ObjKey>>,
}

impl ObjData {
    fn backlink_count(&self) -> usize {
        self.backlinks.values().map(Vec::len).sum()
    }
}

pub(crate) struct TableData {
    pub(crate) name: String,
    pub(crate) embedded: bool,
    pub(crate) columns: Vec<ColumnSpec>,
    pub(crate) objects: BTreeMap<ObjKey, ObjData>,
    next_obj: i64,
}

impl TableData {
    pub(crate) fn next_obj_key(&mut self) -> i64 {
        let key = self.next_obj;
        self.next_obj += 1;
        key
    }
}

/// Accumulates objects scheduled for removal by strong-cascade backlink
/// clearing. Drained by [`StoreInner::remove_recursive`].
pub(crate) struct CascadeState {
    queue: SmallVec<[ObjLink; 8]>,
}

impl CascadeState {
    pub(crate) fn new() -> Self {
        Self {
            queue: SmallVec::new(),
        }
    }

    pub(crate) fn enqueue(&mut self, link: ObjLink) {
        if !self.queue.contains(&link) {
            self.queue.push(link);
        }
    }

    fn pop(&mut self) -> Option<ObjLink> {
        self.queue.pop()
    }
}

pub(crate) struct StoreInner {
    pub(crate) arena: Arena<Node>,
    pub(crate) tables: BTreeMap<TableKey, TableData>,
    pub(crate) replication: Option<Rc<RefCell<dyn ReplicationSink>>>,
    next_table: u32,
}

impl StoreInner {
    fn new() -> Self {
        Self {
            arena: Arena::new(),
            tables: BTreeMap::new(),
            replication: None,
            next_table: 0,
        }
    }

    pub(crate) fn table(&self, key: TableKey) -> Result<&TableData> {
        self.tables.get(&key).ok_or(StoreError::DetachedAccessor)
    }

    fn table_mut(&mut self, key: TableKey) -> Result<&mut TableData> {
        self.tables
            .get_mut(&key)
            .ok_or(StoreError::DetachedAccessor)
    }

    pub(crate) fn object(&self, table: TableKey, obj: ObjKey) -> Result<&ObjData> {
        self.table(table)?
            .objects
            .get(&obj)
            .ok_or(StoreError::DetachedAccessor)
    }

    pub(crate) fn object_mut(&mut self, table: TableKey, obj: ObjKey) -> Result<&mut ObjData> {
        self.table_mut(table)?
            .objects
            .get_mut(&obj)
            .ok_or(StoreError::DetachedAccessor)
    }

    pub(crate) fn column_spec(&self, table: TableKey, col_idx: u32) -> Result<&ColumnSpec> {
        self.table(table)?
            .columns
            .get(col_idx as usize)
            .ok_or_else(|| StoreError::collection_mismatch("no such column"))
    }

    pub(crate) fn is_object_valid(&self, table: TableKey, obj: ObjKey) -> bool {
        self.tables
            .get(&table)
            .is_some_and(|t| t.objects.contains_key(&obj))
    }

    /// Resolve a typed link: the target table and object must both be live.
    pub(crate) fn validate_link(&self, link: ObjLink) -> Result<()> {
        if self.is_object_valid(link.table, link.obj) {
            Ok(())
        } else {
            Err(StoreError::TargetOutOfRange)
        }
    }

    fn add_backlink(&mut self, origin: (TableKey, u32, ObjKey), target: ObjLink) {
        let (origin_table, origin_col, origin_obj) = origin;
        if let Some(data) = self
            .tables
            .get_mut(&target.table)
            .and_then(|t| t.objects.get_mut(&target.obj))
        {
            data.backlinks
                .entry((origin_table, origin_col))
                .or_default()
                .push(origin_obj);
        }
    }

    /// Remove one backlink entry from the target of `target`. Returns true
    /// if the removal scheduled a cascading delete.
    pub(crate) fn remove_backlink(
        &mut self,
        origin: (TableKey, u32, ObjKey),
        target: ObjLink,
        cascade: &mut CascadeState,
    ) -> bool {
        let (origin_table, origin_col, origin_obj) = origin;
        let Some(table) = self.tables.get_mut(&target.table) else {
            return false;
        };
        let embedded = table.embedded;
        let Some(data) = table.objects.get_mut(&target.obj) else {
            return false;
        };
        if let Some(entries) = data.backlinks.get_mut(&(origin_table, origin_col)) {
            if let Some(i) = entries.iter().position(|o| *o == origin_obj) {
                entries.remove(i);
            }
            if entries.is_empty() {
                data.backlinks.remove(&(origin_table, origin_col));
            }
        }
        if embedded && data.backlink_count() == 0 {
            cascade.enqueue(target);
            return true;
        }
        false
    }

    /// Swap the backlink from `old` to `new`. Returns true if removing the
    /// old backlink scheduled a cascading delete.
    pub(crate) fn replace_backlink(
        &mut self,
        origin: (TableKey, u32, ObjKey),
        old: Option<ObjLink>,
        new: Option<ObjLink>,
        cascade: &mut CascadeState,
    ) -> bool {
        let recurse = match old {
            Some(link) => self.remove_backlink(origin, link, cascade),
            None => false,
        };
        if let Some(link) = new {
            self.add_backlink(origin, link);
        }
        recurse
    }

    /// Drain the cascade queue, removing each object recursively.
    pub(crate) fn remove_recursive(&mut self, mut cascade: CascadeState) {
        while let Some(link) = cascade.pop() {
            debug!(target: "cairn::store", %link, "cascade removal");
            self.remove_object_inner(link.table, link.obj, &mut cascade);
        }
    }

    /// Collect (key, raw value) pairs of one collection, in slot order.
    pub(crate) fn collection_entries(
        &self,
        table: TableKey,
        obj: ObjKey,
        col_idx: u32,
    ) -> Result<Vec<(Value, Value)>> {
        let slot = self.object(table, obj)?.collections.get(&col_idx).copied();
        let mut entries = Vec::new();
        if let Some(root) = slot.and_then(|s| s.root) {
            let tree = ClusterTree::load(root);
            tree.traverse(&self.arena, |cluster, _| {
                for i in 0..cluster.len() {
                    entries.push((cluster.key_at(i), cluster.value_at(i).clone()));
                }
                ControlFlow::Continue(())
            });
        }
        Ok(entries)
    }

    /// Remove an object: destroy its collections (clearing the backlinks
    /// they hold), and nullify incoming links from other dictionaries.
    fn remove_object_inner(&mut self, table: TableKey, obj: ObjKey, cascade: &mut CascadeState) {
        let Some(obj_data) = self
            .tables
            .get_mut(&table)
            .and_then(|t| t.objects.remove(&obj))
        else {
            return;
        };
        self.clear_outgoing(table, obj, &obj_data, cascade);

        let target = ObjLink::new(table, obj);
        for ((origin_table, origin_col), origin_objs) in &obj_data.backlinks {
            let mut seen: Vec<ObjKey> = Vec::new();
            for origin_obj in origin_objs {
                if seen.contains(origin_obj) {
                    continue;
                }
                seen.push(*origin_obj);
                self.nullify_links_to(*origin_table, *origin_col, *origin_obj, target);
            }
        }
    }

    /// Invalidate an object: like removal, but incoming links are rewritten
    /// to the unresolved form instead of nullified, so the entries survive
    /// as tombstoned links.
    fn invalidate_object_inner(
        &mut self,
        table: TableKey,
        obj: ObjKey,
        cascade: &mut CascadeState,
    ) {
        let Some(obj_data) = self
            .tables
            .get_mut(&table)
            .and_then(|t| t.objects.remove(&obj))
        else {
            return;
        };
        self.clear_outgoing(table, obj, &obj_data, cascade);

        let target = ObjLink::new(table, obj);
        let tombstone = Value::TypedLink(ObjLink::new(table, obj.unresolved_of()));
        for ((origin_table, origin_col), origin_objs) in &obj_data.backlinks {
            let mut seen: Vec<ObjKey> = Vec::new();
            for origin_obj in origin_objs {
                if seen.contains(origin_obj) {
                    continue;
                }
                seen.push(*origin_obj);
                self.rewrite_links_to(*origin_table, *origin_col, *origin_obj, target, &tombstone);
            }
        }
    }

    /// Destroy the object's collection trees, removing the backlinks their
    /// live typed links hold.
    fn clear_outgoing(
        &mut self,
        table: TableKey,
        obj: ObjKey,
        obj_data: &ObjData,
        cascade: &mut CascadeState,
    ) {
        for (col_idx, slot) in &obj_data.collections {
            let Some(root) = slot.root else { continue };
            let tree = ClusterTree::load(root);
            let mut links = Vec::new();
            tree.traverse(&self.arena, |cluster, _| {
                for value in cluster.values() {
                    if let Value::TypedLink(link) = value {
                        if !link.is_unresolved() {
                            links.push(*link);
                        }
                    }
                }
                ControlFlow::Continue(())
            });
            for link in links {
                self.remove_backlink((table, *col_idx, obj), link, cascade);
            }
            tree.destroy(&mut self.arena);
        }
    }

    /// Overwrite every entry of one origin dictionary whose value links to
    /// `target` with null, emitting a replication set per entry.
    fn nullify_links_to(
        &mut self,
        origin_table: TableKey,
        origin_col: u32,
        origin_obj: ObjKey,
        target: ObjLink,
    ) {
        self.rewrite_links_to(origin_table, origin_col, origin_obj, target, &Value::Null);
    }

    /// Overwrite entries whose value is a typed link to `target` with
    /// `replacement`. Null replacements are reported to the replication
    /// sink as sets; tombstone rewrites are a storage-level fixup and are
    /// not replicated.
    fn rewrite_links_to(
        &mut self,
        origin_table: TableKey,
        origin_col: u32,
        origin_obj: ObjKey,
        target: ObjLink,
        replacement: &Value,
    ) {
        let Ok(spec) = self.column_spec(origin_table, origin_col) else {
            return;
        };
        let col = spec.col;
        let Some(slot) = self
            .tables
            .get(&origin_table)
            .and_then(|t| t.objects.get(&origin_obj))
            .and_then(|o| o.collections.get(&origin_col))
        else {
            return;
        };
        let Some(root) = slot.root else { return };

        let tree = ClusterTree::load(root);
        let needle = Value::TypedLink(target);
        let mut matches = Vec::new();
        tree.traverse(&self.arena, |cluster, _| {
            for i in 0..cluster.len() {
                if *cluster.value_at(i) == needle {
                    matches.push(cluster.slot_at(i));
                }
            }
            ControlFlow::Continue(())
        });
        if matches.is_empty() {
            return;
        }

        let replication = self.replication.clone();
        let dict = CollectionId {
            table: origin_table,
            obj: origin_obj,
            col,
        };
        for slot_id in matches {
            let Ok(pos) = tree.get(&self.arena, slot_id) else {
                continue;
            };
            if replacement.is_null() {
                if let Some(sink) = &replication {
                    if let Ok(ndx) = tree.get_ndx(&self.arena, slot_id) {
                        let key = tree.key_at(&self.arena, pos);
                        sink.borrow_mut()
                            .dictionary_set(&dict, ndx, &key, &Value::Null);
                    }
                }
            }
            tree.set_value_at(&mut self.arena, pos, replacement.clone());
        }
        if let Some(obj_slot) = self
            .tables
            .get_mut(&origin_table)
            .and_then(|t| t.objects.get_mut(&origin_obj))
            .and_then(|o| o.collections.get_mut(&origin_col))
        {
            obj_slot.version += 1;
        }
    }
}

/// An embedded object store: tables of objects whose dictionary columns are
/// backed by a shared arena.
#[derive(Clone)]
pub struct Store {
    inner: Rc<RefCell<StoreInner>>,
}

impl Store {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(StoreInner::new())),
        }
    }

    fn create_table_inner(&self, name: &str, embedded: bool) -> TableKey {
        let mut inner = self.inner.borrow_mut();
        let key = TableKey::new(inner.next_table);
        inner.next_table += 1;
        inner.tables.insert(
            key,
            TableData {
                name: name.to_owned(),
                embedded,
                columns: Vec::new(),
                objects: BTreeMap::new(),
                next_obj: 0,
            },
        );
        debug!(target: "cairn::store", %key, name, embedded, "table created");
        key
    }

    /// Create a top-level table.
    pub fn create_table(&self, name: &str) -> TableKey {
        self.create_table_inner(name, false)
    }

    /// Create an embedded table: its objects are owned by their incoming
    /// link and removed when the last one is cleared.
    pub fn create_embedded_table(&self, name: &str) -> TableKey {
        self.create_table_inner(name, true)
    }

    /// The name a table was created with.
    pub fn table_name(&self, table: TableKey) -> Result<String> {
        Ok(self.inner.borrow().table(table)?.name.clone())
    }

    /// Add a dictionary column to a table. Link-typed dictionaries require
    /// a target table.
    pub fn add_dictionary_column(
        &self,
        table: TableKey,
        key_type: DataType,
        value_type: DataType,
        nullable: bool,
        target_table: Option<TableKey>,
    ) -> Result<ColKey> {
        if !matches!(key_type, DataType::Int | DataType::String | DataType::Mixed) {
            return Err(StoreError::not_implemented(format!(
                "dictionary key type {key_type}"
            )));
        }
        if value_type == DataType::Link && target_table.is_none() {
            return Err(StoreError::collection_mismatch(
                "link dictionary requires a target table",
            ));
        }
        if let Some(target) = target_table {
            let inner = self.inner.borrow();
            inner.table(target)?;
            drop(inner);
        }
        let mut inner = self.inner.borrow_mut();
        let table_data = inner.table_mut(table)?;
        let idx = u32::try_from(table_data.columns.len())
            .map_err(|_| StoreError::collection_mismatch("too many columns"))?;
        let col = ColKey::new(idx, value_type, nullable, ColumnKind::Dictionary);
        table_data.columns.push(ColumnSpec {
            col,
            key_type,
            target_table,
        });
        Ok(col)
    }

    /// Create an object in a table.
    pub fn create_object(&self, table: TableKey) -> Result<ObjKey> {
        let mut inner = self.inner.borrow_mut();
        let table_data = inner.table_mut(table)?;
        let key = ObjKey::new(table_data.next_obj_key());
        table_data.objects.insert(key, ObjData::default());
        Ok(key)
    }

    /// Whether an object is live.
    pub fn is_object_valid(&self, table: TableKey, obj: ObjKey) -> bool {
        self.inner.borrow().is_object_valid(table, obj)
    }

    /// Number of live objects in a table.
    pub fn object_count(&self, table: TableKey) -> Result<usize> {
        Ok(self.inner.borrow().table(table)?.objects.len())
    }

    /// Total backlink entries pointing at an object.
    pub fn backlink_count(&self, table: TableKey, obj: ObjKey) -> Result<usize> {
        Ok(self.inner.borrow().object(table, obj)?.backlink_count())
    }

    /// Remove an object. Incoming dictionary links are nullified; outgoing
    /// links clear their backlinks, cascading through embedded tables.
    pub fn remove_object(&self, table: TableKey, obj: ObjKey) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        if !inner.is_object_valid(table, obj) {
            return Err(StoreError::KeyNotFound);
        }
        let mut cascade = CascadeState::new();
        inner.remove_object_inner(table, obj, &mut cascade);
        inner.remove_recursive(cascade);
        Ok(())
    }

    /// Invalidate (tombstone) an object. Incoming dictionary links are
    /// rewritten to the unresolved form and read back as null until the
    /// entry is overwritten or erased.
    pub fn invalidate_object(&self, table: TableKey, obj: ObjKey) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        if !inner.is_object_valid(table, obj) {
            return Err(StoreError::KeyNotFound);
        }
        let mut cascade = CascadeState::new();
        inner.invalidate_object_inner(table, obj, &mut cascade);
        inner.remove_recursive(cascade);
        Ok(())
    }

    /// Install the replication sink.
    pub fn set_replication(&self, sink: Rc<RefCell<dyn ReplicationSink>>) {
        self.inner.borrow_mut().replication = Some(sink);
    }

    /// Open the dictionary at (table, obj, col).
    pub fn dictionary(&self, table: TableKey, obj: ObjKey, col: ColKey) -> Result<Dictionary> {
        if !col.is_dictionary() {
            return Err(StoreError::collection_mismatch(
                "column is not a dictionary",
            ));
        }
        let inner = self.inner.borrow();
        let spec = inner.column_spec(table, col.idx())?;
        if spec.col != col {
            return Err(StoreError::collection_mismatch(
                "column key does not match the table schema",
            ));
        }
        let key_type = spec.key_type;
        let target_table = spec.target_table;
        drop(inner);
        Ok(Dictionary::new(
            Rc::clone(&self.inner),
            CollectionId { table, obj, col },
            key_type,
            target_table,
        ))
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}
