//! # Repositories
//!
//! Injectable per-entity storage keyed by id. Concurrency control lives
//! here, not in the callers:
//!
//! - Each record sits behind its own lock. Transitions on one id are
//!   serialized; transitions on different ids run in parallel.
//! - [`Repository::update`] applies the closure to a working copy and
//!   commits it only if the closure returns `Ok`. A rejected transition
//!   leaves the stored record untouched.
//! - Reads clone a committed snapshot under the record lock and never see a
//!   half-applied transition.
//!
//! Locks are `parking_lot` and are never held across an `.await`.

use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;
use std::sync::Arc;

use dsc_core::{AgreementId, NegotiationId, TransferId};
use dsc_state::{Agreement, Negotiation, Transfer};
use parking_lot::{Mutex, RwLock};

use crate::error::ConnectorError;

/// A storable entity with a stable id.
pub trait Record: Clone + Send + Sync + 'static {
    type Id: Clone + Eq + Hash + Display + Send + Sync + 'static;

    fn record_id(&self) -> Self::Id;
}

impl Record for Negotiation {
    type Id = NegotiationId;

    fn record_id(&self) -> NegotiationId {
        self.id
    }
}

impl Record for Agreement {
    type Id = AgreementId;

    fn record_id(&self) -> AgreementId {
        self.id
    }
}

impl Record for Transfer {
    type Id = TransferId;

    fn record_id(&self) -> TransferId {
        self.id
    }
}

/// Closure applied by [`Repository::update`].
pub type Mutation<'a, T> = Box<dyn FnOnce(&mut T) -> Result<(), ConnectorError> + Send + 'a>;

/// Storage for one entity type.
pub trait Repository<T: Record>: Send + Sync {
    /// Snapshot of a record.
    fn get(&self, id: &T::Id) -> Option<T>;

    /// Insert, or replace the record with the same id.
    fn put(&self, record: T);

    /// Snapshots of every record, in no particular order.
    fn list(&self) -> Vec<T>;

    /// Apply `mutation` atomically with respect to other updates of the same
    /// id. Returns `None` if the id is unknown, otherwise the mutation's
    /// outcome with the committed record on success.
    fn update(&self, id: &T::Id, mutation: Mutation<'_, T>) -> Option<Result<T, ConnectorError>>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every record.
    fn clear(&self);
}

/// Run `f` through [`Repository::update`] and hand back its result along
/// with the committed record.
pub fn try_update<T, R, F>(
    repo: &dyn Repository<T>,
    id: &T::Id,
    f: F,
) -> Option<Result<(T, R), ConnectorError>>
where
    T: Record,
    R: Send,
    F: FnOnce(&mut T) -> Result<R, ConnectorError> + Send,
{
    let mut output = None;
    let outcome = repo.update(
        id,
        Box::new(|record: &mut T| {
            output = Some(f(record)?);
            Ok(())
        }),
    )?;
    Some(outcome.and_then(|committed| match output {
        Some(value) => Ok((committed, value)),
        None => Err(ConnectorError::Internal(format!(
            "repository committed {id} without applying the update"
        ))),
    }))
}

// -- In-memory implementation -------------------------------------------------

/// Thread-safe in-memory repository with one lock per record.
pub struct MemoryStore<T: Record> {
    entries: RwLock<HashMap<T::Id, Arc<Mutex<T>>>>,
}

impl<T: Record> MemoryStore<T> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn entry(&self, id: &T::Id) -> Option<Arc<Mutex<T>>> {
        self.entries.read().get(id).cloned()
    }
}

impl<T: Record> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Record> std::fmt::Debug for MemoryStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("len", &self.len())
            .finish()
    }
}

impl<T: Record> Repository<T> for MemoryStore<T> {
    fn get(&self, id: &T::Id) -> Option<T> {
        self.entry(id).map(|entry| entry.lock().clone())
    }

    fn put(&self, record: T) {
        let id = record.record_id();
        let mut entries = self.entries.write();
        match entries.get(&id) {
            // Replace in place so holders of the entry lock see the new value.
            Some(existing) => *existing.lock() = record,
            None => {
                entries.insert(id, Arc::new(Mutex::new(record)));
            }
        }
    }

    fn list(&self) -> Vec<T> {
        let entries: Vec<Arc<Mutex<T>>> = self.entries.read().values().cloned().collect();
        entries.iter().map(|entry| entry.lock().clone()).collect()
    }

    fn update(&self, id: &T::Id, mutation: Mutation<'_, T>) -> Option<Result<T, ConnectorError>> {
        let entry = self.entry(id)?;
        let mut current = entry.lock();
        let mut working = current.clone();
        if let Err(err) = mutation(&mut working) {
            return Some(Err(err));
        }
        *current = working.clone();
        Some(Ok(working))
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }

    fn clear(&self) {
        self.entries.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, PartialEq)]
    struct Counter {
        id: u32,
        value: u32,
    }

    impl Record for Counter {
        type Id = u32;

        fn record_id(&self) -> u32 {
            self.id
        }
    }

    fn store_with(id: u32) -> MemoryStore<Counter> {
        let store = MemoryStore::new();
        store.put(Counter { id, value: 0 });
        store
    }

    #[test]
    fn test_put_get_list() {
        let store = store_with(1);
        store.put(Counter { id: 2, value: 5 });
        assert_eq!(store.get(&2).unwrap().value, 5);
        assert!(store.get(&3).is_none());
        assert_eq!(store.list().len(), 2);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_put_replaces_existing() {
        let store = store_with(1);
        store.put(Counter { id: 1, value: 9 });
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&1).unwrap().value, 9);
    }

    #[test]
    fn test_update_commits_on_ok() {
        let store = store_with(1);
        let updated = store
            .update(&1, Box::new(|c: &mut Counter| {
                c.value += 1;
                Ok(())
            }))
            .unwrap()
            .unwrap();
        assert_eq!(updated.value, 1);
        assert_eq!(store.get(&1).unwrap().value, 1);
    }

    #[test]
    fn test_update_discards_working_copy_on_err() {
        let store = store_with(1);
        let result = store
            .update(&1, Box::new(|c: &mut Counter| {
                c.value = 42;
                Err(ConnectorError::Internal("nope".into()))
            }))
            .unwrap();
        assert!(result.is_err());
        assert_eq!(store.get(&1).unwrap().value, 0);
    }

    #[test]
    fn test_update_unknown_id_is_none() {
        let store = store_with(1);
        assert!(store.update(&7, Box::new(|_: &mut Counter| Ok(()))).is_none());
    }

    #[test]
    fn test_try_update_returns_closure_output() {
        let store = store_with(1);
        let (committed, previous) = try_update(&store, &1, |c| {
            let previous = c.value;
            c.value = 10;
            Ok(previous)
        })
        .unwrap()
        .unwrap();
        assert_eq!(previous, 0);
        assert_eq!(committed.value, 10);
    }

    #[test]
    fn test_concurrent_updates_on_one_id_are_serialized() {
        let store = Arc::new(store_with(1));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..250 {
                        try_update(store.as_ref(), &1, |c| {
                            c.value += 1;
                            Ok(())
                        })
                        .unwrap()
                        .unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.get(&1).unwrap().value, 2000);
    }

    #[test]
    fn test_only_one_guarded_transition_wins() {
        let store = Arc::new(store_with(1));
        let winners = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                let winners = Arc::clone(&winners);
                std::thread::spawn(move || {
                    let result = try_update(store.as_ref(), &1, |c| {
                        if c.value != 0 {
                            return Err(ConnectorError::Internal("already advanced".into()));
                        }
                        c.value = 1;
                        Ok(())
                    })
                    .unwrap();
                    if result.is_ok() {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(winners.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_clear() {
        let store = store_with(1);
        store.clear();
        assert!(store.is_empty());
    }
}
