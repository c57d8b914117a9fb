//! Local persistent store API.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::live::LiveQuery;
use crate::records::{Collection, Record};
use crate::{StoreError, StoreResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Table {
    next_id: u32,
    rows: BTreeMap<u32, Value>,
}

impl Default for Table {
    fn default() -> Self {
        Self {
            next_id: 1,
            rows: BTreeMap::new(),
        }
    }
}

type Notify = Box<dyn FnMut(&Table) -> bool + Send>;

struct Subscriber {
    collection: Collection,
    notify: Notify,
}

struct Inner {
    root_dir: Option<PathBuf>,
    tables: HashMap<Collection, Table>,
    subscribers: Vec<Subscriber>,
}

impl Inner {
    fn table(&mut self, collection: Collection) -> &mut Table {
        self.tables.entry(collection).or_default()
    }

    fn flush(&self, collection: Collection) -> StoreResult<()> {
        let Some(root) = &self.root_dir else {
            return Ok(());
        };
        let empty = Table::default();
        let table = self.tables.get(&collection).unwrap_or(&empty);
        let json = serde_json::to_string_pretty(table)?;
        fs::write(root.join(collection.file_name()), json)?;
        Ok(())
    }

    fn notify(&mut self, collection: Collection) {
        let Inner {
            tables,
            subscribers,
            ..
        } = self;
        let empty = Table::default();
        let table = tables.get(&collection).unwrap_or(&empty);
        subscribers.retain_mut(|s| s.collection != collection || (s.notify)(table));
    }
}

/// Handle to the store. Clones share the same underlying collections.
#[derive(Clone)]
pub struct LocalStore {
    inner: Arc<Mutex<Inner>>,
}

impl LocalStore {
    /// Store that lives only as long as its handles.
    pub fn in_memory() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                root_dir: None,
                tables: HashMap::new(),
                subscribers: Vec::new(),
            })),
        }
    }

    /// Open (or create) a store rooted at `root_dir`, one JSON file per
    /// collection.
    pub fn open(root_dir: &Path) -> StoreResult<Self> {
        if !root_dir.exists() {
            fs::create_dir_all(root_dir)?;
        }

        let mut tables = HashMap::new();
        for collection in Collection::ALL {
            let path = root_dir.join(collection.file_name());
            if path.exists() {
                let content = fs::read_to_string(&path)?;
                let table: Table = serde_json::from_str(&content)?;
                tables.insert(collection, table);
            }
        }

        tracing::debug!(root = %root_dir.display(), "opened local store");

        Ok(Self {
            inner: Arc::new(Mutex::new(Inner {
                root_dir: Some(root_dir.to_path_buf()),
                tables,
                subscribers: Vec::new(),
            })),
        })
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Apply `mutate` to one collection, persist it, then notify live
    /// queries. A failed flush restores the previous table.
    fn write<R>(
        &self,
        collection: Collection,
        mutate: impl FnOnce(&mut Table) -> StoreResult<R>,
    ) -> StoreResult<R> {
        let mut inner = self.lock()?;
        let before = inner.table(collection).clone();
        let outcome = mutate(inner.table(collection)).and_then(|out| {
            inner.flush(collection)?;
            Ok(out)
        });
        match outcome {
            Ok(out) => {
                inner.notify(collection);
                Ok(out)
            }
            Err(err) => {
                tracing::warn!(%collection, error = %err, "store write failed, rolling back");
                inner.tables.insert(collection, before);
                Err(err)
            }
        }
    }

    fn read<R>(&self, collection: Collection, f: impl FnOnce(&Table) -> R) -> StoreResult<R> {
        let inner = self.lock()?;
        let empty = Table::default();
        Ok(f(inner.tables.get(&collection).unwrap_or(&empty)))
    }

    pub fn get<T: Record>(&self, id: T::Key) -> StoreResult<Option<T>> {
        let raw_id: u32 = id.into();
        let raw = self.read(T::COLLECTION, |t| t.rows.get(&raw_id).cloned())?;
        raw.map(|v| serde_json::from_value(v).map_err(StoreError::from))
            .transpose()
    }

    /// Like [`LocalStore::get`], but a missing record is an error.
    pub fn require<T: Record>(&self, id: T::Key) -> StoreResult<T> {
        self.get::<T>(id)?.ok_or(StoreError::NotFound {
            collection: T::COLLECTION,
            id: id.into(),
        })
    }

    /// Records at `ids`, positionally; missing ids yield `None`.
    pub fn bulk_get<T: Record>(&self, ids: &[T::Key]) -> StoreResult<Vec<Option<T>>> {
        let raw = self.read(T::COLLECTION, |t| {
            ids.iter()
                .map(|id| {
                    let raw_id: u32 = (*id).into();
                    t.rows.get(&raw_id).cloned()
                })
                .collect::<Vec<_>>()
        })?;
        raw.into_iter()
            .map(|v| {
                v.map(|v| serde_json::from_value(v).map_err(StoreError::from))
                    .transpose()
            })
            .collect()
    }

    /// Every record in the collection, in id order.
    pub fn all<T: Record>(&self) -> StoreResult<Vec<T>> {
        self.filter(|_: &T| true)
    }

    pub fn filter<T: Record>(&self, predicate: impl Fn(&T) -> bool) -> StoreResult<Vec<T>> {
        let raw = self.read(T::COLLECTION, |t| t.rows.values().cloned().collect::<Vec<_>>())?;
        let mut out = Vec::new();
        for value in raw {
            let record: T = serde_json::from_value(value)?;
            if predicate(&record) {
                out.push(record);
            }
        }
        Ok(out)
    }

    /// Insert or replace. Records without a key get the next free id;
    /// records with a key overwrite whatever is stored there.
    pub fn put<T: Record>(&self, record: T) -> StoreResult<T> {
        self.write(T::COLLECTION, |table| upsert(table, record))
    }

    /// Always inserts a new record, ignoring any key it carries.
    pub fn add<T: Record>(&self, record: T) -> StoreResult<T> {
        self.write(T::COLLECTION, |table| insert_new(table, record))
    }

    pub fn bulk_put<T: Record>(&self, records: Vec<T>) -> StoreResult<Vec<T>> {
        self.write(T::COLLECTION, |table| {
            records
                .into_iter()
                .map(|record| upsert(table, record))
                .collect()
        })
    }

    /// Patch a record in place. Returns false if no record has that id.
    pub fn update<T: Record>(&self, id: T::Key, patch: impl FnOnce(&mut T)) -> StoreResult<bool> {
        let raw_id: u32 = id.into();
        self.write(T::COLLECTION, |table| {
            let Some(value) = table.rows.get(&raw_id) else {
                return Ok(false);
            };
            let mut record: T = serde_json::from_value(value.clone())?;
            patch(&mut record);
            record.set_key(id);
            table.rows.insert(raw_id, serde_json::to_value(&record)?);
            Ok(true)
        })
    }

    pub fn delete<T: Record>(&self, id: T::Key) -> StoreResult<bool> {
        Ok(self.bulk_delete::<T>(&[id])? == 1)
    }

    /// Remove every listed id; returns how many records existed.
    pub fn bulk_delete<T: Record>(&self, ids: &[T::Key]) -> StoreResult<usize> {
        self.write(T::COLLECTION, |table| {
            Ok(ids
                .iter()
                .filter(|id| {
                    let raw_id: u32 = (**id).into();
                    table.rows.remove(&raw_id).is_some()
                })
                .count())
        })
    }

    /// Subscribe to records matching `predicate`. The current snapshot is
    /// delivered immediately.
    pub fn subscribe<T: Record>(
        &self,
        predicate: impl Fn(&T) -> bool + Send + 'static,
    ) -> StoreResult<LiveQuery<T>> {
        let (tx, rx) = channel();
        let mut notify: Notify = Box::new(move |table: &Table| {
            let snapshot: Vec<T> = table
                .rows
                .iter()
                .filter_map(|(id, v)| match serde_json::from_value::<T>(v.clone()) {
                    Ok(record) => Some(record),
                    Err(err) => {
                        tracing::warn!(collection = %T::COLLECTION, id, error = %err, "skipping unreadable record");
                        None
                    }
                })
                .filter(|r| predicate(r))
                .collect();
            tx.send(snapshot).is_ok()
        });

        let mut inner = self.lock()?;
        let alive = notify(inner.table(T::COLLECTION));
        if alive {
            inner.subscribers.push(Subscriber {
                collection: T::COLLECTION,
                notify,
            });
        }
        Ok(LiveQuery::new(rx))
    }

    /// Number of active subscriptions (pruned lazily on write).
    pub fn subscriber_count(&self) -> StoreResult<usize> {
        Ok(self.lock()?.subscribers.len())
    }
}

fn upsert<T: Record>(table: &mut Table, record: T) -> StoreResult<T> {
    let Some(key) = record.key() else {
        return insert_new(table, record);
    };
    let raw: u32 = key.into();
    table.rows.insert(raw, serde_json::to_value(&record)?);
    table.next_id = table.next_id.max(raw.saturating_add(1));
    Ok(record)
}

fn insert_new<T: Record>(table: &mut Table, mut record: T) -> StoreResult<T> {
    let raw = table.next_id;
    let key = <T::Key as TryFrom<u32>>::try_from(raw).map_err(|_| StoreError::CorruptKey {
        collection: T::COLLECTION,
        key: raw,
    })?;
    record.set_key(key);
    table.rows.insert(raw, serde_json::to_value(&record)?);
    table.next_id = raw.saturating_add(1);
    Ok(record)
}
