//! Change tracking for staged writes.
//!
//! Every tracked row lives in exactly one [`Entry`] per unit of work. Writes are
//! never detected by inspecting caller objects: at flush time each entry turns
//! into an explicit patch (insert, column-level update or delete) computed from
//! its original snapshot, its current copy and any columns forced dirty.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, DatabaseTransaction, DbErr, EntityName, EntityTrait,
    IdenStatic, IntoActiveModel, Iterable, ModelTrait, PrimaryKeyToColumn, PrimaryKeyTrait, Value,
};

/// Lifecycle of a tracked entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Staged for insert; the store assigns generated keys at commit
    Added,
    Unchanged,
    /// At least one column differs from the loaded snapshot or was marked modified
    Modified,
    /// Staged for delete
    Deleted,
    /// No longer tracked; writes through the handle are ignored
    Detached,
}

/// Identity of a persisted row: its table plus primary key values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityKey {
    table: String,
    values: String,
}

impl EntityKey {
    pub fn of<E: EntityTrait>(model: &E::Model) -> Self {
        let values = E::PrimaryKey::iter()
            .map(|pk| format!("{:?}", model.get(pk.into_column())))
            .collect::<Vec<_>>()
            .join("|");

        Self {
            table: E::default().table_name().to_string(),
            values,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.table, self.values)
    }
}

fn is_key_column<E: EntityTrait>(column: &E::Column) -> bool {
    E::PrimaryKey::iter().any(|pk| pk.into_column().as_str() == column.as_str())
}

struct EntryData<E: EntityTrait> {
    state: EntryState,
    original: Option<E::Model>,
    current: E::Model,
    forced: Vec<String>,
    /// Columns that take the key the store assigns to another entry's insert
    links: Vec<(E::Column, u64)>,
}

impl<E: EntityTrait> EntryData<E> {
    fn is_forced(&self, column: &E::Column) -> bool {
        self.forced.iter().any(|name| name == column.as_str())
    }

    fn force(&mut self, column: E::Column) {
        if !self.is_forced(&column) {
            self.forced.push(column.as_str().to_string());
        }
    }

    fn changed_columns(&self) -> Vec<E::Column> {
        let Some(original) = &self.original else {
            return Vec::new();
        };

        E::Column::iter()
            .filter(|col| !is_key_column::<E>(col))
            .filter(|col| self.is_forced(col) || self.current.get(*col) != original.get(*col))
            .collect()
    }

    fn effective_state(&self) -> EntryState {
        match self.state {
            EntryState::Unchanged if !self.changed_columns().is_empty() => EntryState::Modified,
            state => state,
        }
    }
}

/// The write an entry turns into at flush time.
enum Patch<A> {
    Insert(A),
    Update(A),
    Delete(A),
    Nothing,
}

/// Keys generated by the store so far in the current flush, by entry slot.
#[derive(Default)]
pub(crate) struct AssignedKeys(HashMap<u64, Value>);

impl AssignedKeys {
    pub fn insert(&mut self, slot: u64, key: Value) {
        self.0.insert(slot, key);
    }

    fn get(&self, slot: u64) -> Option<&Value> {
        self.0.get(&slot)
    }
}

/// Outcome of flushing one entry, applied once the transaction commits.
pub(crate) enum Flushed {
    Written(Box<dyn Any + Send>),
    Removed,
    Skipped,
}

/// Type-erased view of an entry used by the flush loop.
#[async_trait]
pub(crate) trait StagedEntry: Send + Sync {
    fn table(&self) -> &str;

    fn state(&self) -> EntryState;

    /// Store identity, or `None` while the store has not assigned one yet
    fn key(&self) -> Option<EntityKey>;

    async fn flush(
        &self,
        txn: &DatabaseTransaction,
        assigned: &AssignedKeys,
    ) -> Result<Flushed, DbErr>;

    /// Key of the row `flushed` inserted, when the store generated it
    fn assigned_key(&self, flushed: &Flushed) -> Option<Value>;

    fn accept(&self, flushed: Flushed);

    fn detach(&self);
}

pub(crate) struct Entry<E: EntityTrait> {
    slot: u64,
    table: String,
    data: RwLock<EntryData<E>>,
}

impl<E: EntityTrait> Entry<E> {
    fn read(&self) -> RwLockReadGuard<'_, EntryData<E>> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, EntryData<E>> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn identity(data: &EntryData<E>) -> Option<EntityKey> {
        if data.state == EntryState::Added && E::PrimaryKey::auto_increment() {
            return None;
        }
        Some(EntityKey::of::<E>(&data.current))
    }
}

impl<E> Entry<E>
where
    E: EntityTrait,
    E::Model: Sync + IntoActiveModel<E::ActiveModel>,
    E::ActiveModel: ActiveModelBehavior + Send,
{
    fn patch(&self, assigned: &AssignedKeys) -> Patch<E::ActiveModel> {
        let data = self.read();
        let linked = data
            .links
            .iter()
            .filter_map(|(col, slot)| assigned.get(*slot).map(|key| (*col, key.clone())))
            .collect::<Vec<_>>();

        match data.state {
            EntryState::Added => {
                let mut active = data.current.clone().into_active_model();
                if E::PrimaryKey::auto_increment() {
                    for pk in E::PrimaryKey::iter() {
                        active.not_set(pk.into_column());
                    }
                }
                for (col, key) in linked {
                    active.set(col, key);
                }
                Patch::Insert(active)
            }
            EntryState::Unchanged | EntryState::Modified => {
                let columns = data.changed_columns();
                let Some(original) = data.original.clone() else {
                    return Patch::Nothing;
                };
                if columns.is_empty() && linked.is_empty() {
                    return Patch::Nothing;
                }

                let mut active = original.into_active_model();
                for col in columns {
                    active.set(col, data.current.get(col));
                }
                for (col, key) in linked {
                    active.set(col, key);
                }
                Patch::Update(active)
            }
            EntryState::Deleted => {
                let row = data.original.clone().unwrap_or_else(|| data.current.clone());
                Patch::Delete(row.into_active_model())
            }
            EntryState::Detached => Patch::Nothing,
        }
    }
}

#[async_trait]
impl<E> StagedEntry for Entry<E>
where
    E: EntityTrait,
    E::Model: Sync + IntoActiveModel<E::ActiveModel>,
    E::ActiveModel: ActiveModelBehavior + Send,
{
    fn table(&self) -> &str {
        &self.table
    }

    fn state(&self) -> EntryState {
        self.read().effective_state()
    }

    fn key(&self) -> Option<EntityKey> {
        Self::identity(&self.read())
    }

    async fn flush(
        &self,
        txn: &DatabaseTransaction,
        assigned: &AssignedKeys,
    ) -> Result<Flushed, DbErr> {
        match self.patch(assigned) {
            Patch::Insert(active) => Ok(Flushed::Written(Box::new(active.insert(txn).await?))),
            Patch::Update(active) => Ok(Flushed::Written(Box::new(active.update(txn).await?))),
            Patch::Delete(active) => {
                let result = active.delete(txn).await?;
                if result.rows_affected == 0 {
                    return Err(DbErr::RecordNotFound(format!(
                        "{} row staged for delete no longer exists",
                        self.table
                    )));
                }
                Ok(Flushed::Removed)
            }
            Patch::Nothing => Ok(Flushed::Skipped),
        }
    }

    fn assigned_key(&self, flushed: &Flushed) -> Option<Value> {
        if self.read().state != EntryState::Added || !E::PrimaryKey::auto_increment() {
            return None;
        }
        let Flushed::Written(stored) = flushed else {
            return None;
        };
        let stored = stored.downcast_ref::<E::Model>()?;
        E::PrimaryKey::iter()
            .next()
            .map(|pk| stored.get(pk.into_column()))
    }

    fn accept(&self, flushed: Flushed) {
        let mut data = self.write();
        match flushed {
            Flushed::Written(stored) => {
                if let Ok(stored) = stored.downcast::<E::Model>() {
                    data.current = (*stored).clone();
                    data.original = Some(*stored);
                }
                data.state = EntryState::Unchanged;
                data.forced.clear();
                data.links.clear();
            }
            Flushed::Removed => data.state = EntryState::Detached,
            Flushed::Skipped => {
                if data.state == EntryState::Modified {
                    data.state = EntryState::Unchanged;
                }
                data.forced.clear();
            }
        }
    }

    fn detach(&self) {
        self.write().state = EntryState::Detached;
    }
}

/// Handle on the canonical in-memory copy of one tracked row.
///
/// Cloning the handle does not copy the row; every clone observes the same entry.
pub struct Tracked<E: EntityTrait> {
    entry: Arc<Entry<E>>,
}

impl<E: EntityTrait> Clone for Tracked<E> {
    fn clone(&self) -> Self {
        Self {
            entry: Arc::clone(&self.entry),
        }
    }
}

impl<E: EntityTrait> Tracked<E> {
    /// Snapshot of the current values.
    pub fn get(&self) -> E::Model {
        self.entry.read().current.clone()
    }

    /// Mutate the tracked copy; the difference is written on the next commit.
    ///
    /// Key columns are never written by an update.
    pub fn modify<R>(&self, f: impl FnOnce(&mut E::Model) -> R) -> R {
        f(&mut self.entry.write().current)
    }

    /// Force `column` into the next update even if its value did not change.
    pub fn mark_modified(&self, column: E::Column) {
        let mut data = self.entry.write();
        if matches!(data.state, EntryState::Unchanged | EntryState::Modified) {
            data.force(column);
        }
    }

    pub fn state(&self) -> EntryState {
        self.entry.read().effective_state()
    }

    pub fn key(&self) -> EntityKey {
        EntityKey::of::<E>(&self.entry.read().current)
    }

    /// True when both handles point at the same tracked entry.
    pub fn same_entry(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.entry, &other.entry)
    }

    /// Point `column` at `parent`'s key.
    ///
    /// When `parent` is still waiting for a store-generated key, the key it
    /// receives at commit is written into `column` too, so a parent and its
    /// dependents can be staged together. Stage the parent first.
    pub fn link<P: EntityTrait>(&self, column: E::Column, parent: &Tracked<P>) {
        let parent_key = P::PrimaryKey::iter()
            .next()
            .map(|pk| parent.entry.read().current.get(pk.into_column()));
        let awaits_key = parent.state() == EntryState::Added && P::PrimaryKey::auto_increment();

        let mut data = self.entry.write();
        if let Some(key) = parent_key {
            data.current.set(column, key);
        }
        if awaits_key {
            data.links.retain(|(col, _)| col.as_str() != column.as_str());
            data.links.push((column, parent.slot()));
        }
    }

    pub(crate) fn slot(&self) -> u64 {
        self.entry.slot
    }

    /// True when every column of the current copy equals `model`'s.
    pub(crate) fn holds(&self, model: &E::Model) -> bool {
        let data = self.entry.read();
        E::Column::iter().all(|col| data.current.get(col) == model.get(col))
    }

    pub(crate) fn replace(&self, model: E::Model) {
        let mut data = self.entry.write();
        data.current = model;
        match data.state {
            EntryState::Added => {}
            EntryState::Detached => {}
            _ => {
                data.state = EntryState::Modified;
                data.forced = E::Column::iter()
                    .filter(|col| !is_key_column::<E>(col))
                    .map(|col| col.as_str().to_string())
                    .collect();
            }
        }
    }

    pub(crate) fn copy_column(&self, model: &E::Model, column: E::Column) {
        let mut data = self.entry.write();
        data.current.set(column, model.get(column));
        data.force(column);
    }

    pub(crate) fn set_state(&self, state: EntryState) {
        self.entry.write().state = state;
    }
}

impl<E: EntityTrait> fmt::Debug for Tracked<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.entry.read();
        f.debug_struct("Tracked")
            .field("state", &data.effective_state())
            .field("current", &data.current)
            .finish()
    }
}

struct Slot {
    staged: Arc<dyn StagedEntry>,
    typed: Arc<dyn Any + Send + Sync>,
}

/// Identity map plus registration-ordered entry list of one unit of work.
#[derive(Default)]
pub(crate) struct ChangeTracker {
    next_slot: u64,
    slots: BTreeMap<u64, Slot>,
    identities: HashMap<EntityKey, u64>,
}

impl ChangeTracker {
    pub fn find<E>(&self, key: &EntityKey) -> Option<Tracked<E>>
    where
        E: EntityTrait,
        E::Model: Sync + IntoActiveModel<E::ActiveModel>,
        E::ActiveModel: ActiveModelBehavior + Send,
    {
        let slot = self.identities.get(key)?;
        let entry = Arc::clone(&self.slots.get(slot)?.typed)
            .downcast::<Entry<E>>()
            .ok()?;
        Some(Tracked { entry })
    }

    /// Staged inserts of `E` still waiting for a generated key equal to `model`'s.
    ///
    /// Those entries are not in the identity map, so they are matched by scanning.
    pub fn pending_inserts<E>(&self, model: &E::Model) -> Vec<Tracked<E>>
    where
        E: EntityTrait,
        E::Model: Sync + IntoActiveModel<E::ActiveModel>,
        E::ActiveModel: ActiveModelBehavior + Send,
    {
        if !E::PrimaryKey::auto_increment() {
            return Vec::new();
        }

        let key = EntityKey::of::<E>(model);
        self.slots
            .values()
            .filter(|slot| slot.staged.state() == EntryState::Added)
            .filter_map(|slot| Arc::clone(&slot.typed).downcast::<Entry<E>>().ok())
            .map(|entry| Tracked { entry })
            .filter(|added| added.key() == key)
            .collect()
    }

    /// Return the entry already tracking `model`'s row, or start tracking it as unchanged.
    pub fn track_loaded<E>(&mut self, model: E::Model) -> Tracked<E>
    where
        E: EntityTrait,
        E::Model: Sync + IntoActiveModel<E::ActiveModel>,
        E::ActiveModel: ActiveModelBehavior + Send,
    {
        if let Some(existing) = self.find::<E>(&EntityKey::of::<E>(&model)) {
            return existing;
        }
        self.register(EntryState::Unchanged, Some(model.clone()), model)
    }

    pub fn register<E>(
        &mut self,
        state: EntryState,
        original: Option<E::Model>,
        current: E::Model,
    ) -> Tracked<E>
    where
        E: EntityTrait,
        E::Model: Sync + IntoActiveModel<E::ActiveModel>,
        E::ActiveModel: ActiveModelBehavior + Send,
    {
        let slot = self.next_slot;
        self.next_slot += 1;

        let forced = match state {
            EntryState::Modified => E::Column::iter()
                .filter(|col| !is_key_column::<E>(col))
                .map(|col| col.as_str().to_string())
                .collect(),
            _ => Vec::new(),
        };

        let entry = Arc::new(Entry::<E> {
            slot,
            table: E::default().table_name().to_string(),
            data: RwLock::new(EntryData {
                state,
                original,
                current,
                forced,
                links: Vec::new(),
            }),
        });

        if let Some(key) = entry.key() {
            self.identities.insert(key, slot);
        }

        let typed: Arc<dyn Any + Send + Sync> = entry.clone();
        let staged: Arc<dyn StagedEntry> = entry.clone();
        self.slots.insert(slot, Slot { staged, typed });

        Tracked { entry }
    }

    /// Stop tracking the entry in `slot` without writing anything for it.
    pub fn untrack(&mut self, slot: u64) {
        if let Some(removed) = self.slots.remove(&slot) {
            self.identities.retain(|_, s| *s != slot);
            removed.staged.detach();
        }
    }

    /// Entries with a pending write, in registration order.
    pub fn pending(&self) -> Vec<(u64, Arc<dyn StagedEntry>)> {
        self.slots
            .iter()
            .filter(|(_, slot)| {
                !matches!(
                    slot.staged.state(),
                    EntryState::Unchanged | EntryState::Detached
                )
            })
            .map(|(id, slot)| (*id, Arc::clone(&slot.staged)))
            .collect()
    }

    pub fn has_changes(&self) -> bool {
        self.slots.values().any(|slot| {
            !matches!(
                slot.staged.state(),
                EntryState::Unchanged | EntryState::Detached
            )
        })
    }

    /// Apply committed flush results: refresh identities, drop deleted rows.
    pub fn accept(&mut self, results: Vec<(u64, Flushed)>) {
        for (slot, flushed) in results {
            let Some(entry) = self.slots.get(&slot).map(|s| Arc::clone(&s.staged)) else {
                continue;
            };

            let removed = matches!(flushed, Flushed::Removed);
            entry.accept(flushed);

            if removed {
                self.slots.remove(&slot);
                self.identities.retain(|_, s| *s != slot);
            } else if let Some(key) = entry.key() {
                self.identities.insert(key, slot);
            }
        }
    }

    /// Detach every entry.
    pub fn clear(&mut self) {
        for slot in self.slots.values() {
            slot.staged.detach();
        }
        self.slots.clear();
        self.identities.clear();
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }
}
