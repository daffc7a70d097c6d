//! In-memory task storage with per-master locking.
//!
//! Each master lives in its own [`TaskEntry`] behind a mutex together with
//! its copies, keyed by owner. That mutex is the single-writer scope for
//! the master: approval, completion and copy fan-out all happen while it
//! is held, so readers never observe a partially applied change.
//!
//! Lookup indices (copy id -> master id, user -> copy ids, group -> master
//! ids) sit behind their own read-write locks. Lock order is always entry
//! first, then an index; index locks are never held while acquiring an
//! entry.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use groupwork_proto::snapshot::TaskEntrySnapshot;
use groupwork_proto::task::{GroupTask, MemberTaskCopy, TaskId};
use parking_lot::{Mutex, RwLock};

/// A master task and its live copies.
#[derive(Debug, Clone)]
pub struct TaskEntry {
    /// The master record.
    pub master: GroupTask,
    /// Live copies keyed by owner id.
    pub copies: BTreeMap<String, MemberTaskCopy>,
    /// Set once the master is deleted; holders of a stale handle must
    /// treat the task as missing.
    pub deleted: bool,
}

impl TaskEntry {
    /// Wraps a master with no copies.
    #[must_use]
    pub const fn new(master: GroupTask) -> Self {
        Self {
            master,
            copies: BTreeMap::new(),
            deleted: false,
        }
    }
}

/// Shared handle to a locked entry.
pub type EntryHandle = Arc<Mutex<TaskEntry>>;

/// Master entries plus lookup indices.
#[derive(Default)]
pub struct TaskStore {
    masters: RwLock<HashMap<TaskId, EntryHandle>>,
    copy_index: RwLock<HashMap<TaskId, TaskId>>,
    by_user: RwLock<HashMap<String, BTreeSet<TaskId>>>,
    by_group: RwLock<HashMap<String, BTreeSet<TaskId>>>,
}

impl TaskStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a new master and returns its handle.
    pub fn insert_master(&self, master: GroupTask) -> EntryHandle {
        let id = master.id;
        let group_id = master.group_id.clone();
        let handle = Arc::new(Mutex::new(TaskEntry::new(master)));
        self.masters.write().insert(id, Arc::clone(&handle));
        self.by_group.write().entry(group_id).or_default().insert(id);
        handle
    }

    /// Handle of a master, if it exists.
    #[must_use]
    pub fn entry(&self, master_id: &TaskId) -> Option<EntryHandle> {
        self.masters.read().get(master_id).cloned()
    }

    /// Master id of a copy, if the copy exists.
    #[must_use]
    pub fn master_of_copy(&self, copy_id: &TaskId) -> Option<TaskId> {
        self.copy_index.read().get(copy_id).copied()
    }

    /// Records a new copy in the indices. Call while holding its entry.
    pub fn index_copy(&self, copy: &MemberTaskCopy) {
        self.copy_index.write().insert(copy.id, copy.group.task_id);
        self.by_user
            .write()
            .entry(copy.user_id.clone())
            .or_default()
            .insert(copy.id);
    }

    /// Forgets a removed copy. Call while holding its entry.
    pub fn unindex_copy(&self, copy: &MemberTaskCopy) {
        self.copy_index.write().remove(&copy.id);
        let mut by_user = self.by_user.write();
        if let Some(ids) = by_user.get_mut(&copy.user_id) {
            ids.remove(&copy.id);
            if ids.is_empty() {
                by_user.remove(&copy.user_id);
            }
        }
    }

    /// Removes a master from the store. Call while holding its entry, after
    /// its copies were unindexed.
    pub fn remove_master(&self, master: &GroupTask) {
        self.masters.write().remove(&master.id);
        let mut by_group = self.by_group.write();
        if let Some(ids) = by_group.get_mut(&master.group_id) {
            ids.remove(&master.id);
            if ids.is_empty() {
                by_group.remove(&master.group_id);
            }
        }
    }

    /// `(copy id, master id)` pairs of every copy owned by `user_id`.
    #[must_use]
    pub fn copies_of_user(&self, user_id: &str) -> Vec<(TaskId, TaskId)> {
        let copy_ids: Vec<TaskId> = self
            .by_user
            .read()
            .get(user_id)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default();
        let index = self.copy_index.read();
        copy_ids
            .into_iter()
            .filter_map(|copy_id| index.get(&copy_id).map(|master_id| (copy_id, *master_id)))
            .collect()
    }

    /// Ids of every master owned by `group_id`.
    #[must_use]
    pub fn masters_of_group(&self, group_id: &str) -> Vec<TaskId> {
        self.by_group
            .read()
            .get(group_id)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Number of masters in the store.
    #[must_use]
    pub fn len(&self) -> usize {
        self.masters.read().len()
    }

    /// Whether the store holds no masters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.masters.read().is_empty()
    }

    /// Copies every entry out, one lock at a time.
    #[must_use]
    pub fn snapshot(&self) -> Vec<TaskEntrySnapshot> {
        let handles: Vec<EntryHandle> = self.masters.read().values().cloned().collect();
        handles
            .into_iter()
            .filter_map(|handle| {
                let entry = handle.lock();
                (!entry.deleted).then(|| TaskEntrySnapshot {
                    master: entry.master.clone(),
                    copies: entry.copies.values().cloned().collect(),
                })
            })
            .collect()
    }

    /// Rebuilds a store and all indices from snapshot entries.
    #[must_use]
    pub fn restore(entries: Vec<TaskEntrySnapshot>) -> Self {
        let store = Self::new();
        for snap in entries {
            let handle = store.insert_master(snap.master);
            let mut entry = handle.lock();
            for copy in snap.copies {
                store.index_copy(&copy);
                entry.copies.insert(copy.user_id.clone(), copy);
            }
        }
        store
    }
}
