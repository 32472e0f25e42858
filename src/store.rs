//! Client-side collection of maintenance requests.
//!
//! `RequestStore` is plain data with infallible operations: calls naming an
//! unknown id are no-ops. `StoreHandle` shares one store between the
//! executor (the only writer after the initial load) and the read-only
//! consumers: projection and board.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::models::{MaintenanceRequest, RequestId, RequestPatch};

#[derive(Debug, Default, Clone)]
pub struct RequestStore {
    records: Vec<MaintenanceRequest>,
    revision: u64,
}

impl RequestStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole collection, keeping the given order.
    pub fn load(&mut self, records: Vec<MaintenanceRequest>) {
        self.records = records;
        self.bump();
    }

    pub fn replace(&mut self, id: &RequestId, record: MaintenanceRequest) {
        if let Some(slot) = self.records.iter_mut().find(|r| &r.id == id) {
            *slot = record;
            self.bump();
        }
    }

    pub fn patch(&mut self, id: &RequestId, changes: &RequestPatch) {
        if let Some(record) = self.records.iter_mut().find(|r| &r.id == id) {
            changes.apply_to(record);
            self.bump();
        }
    }

    pub fn remove(&mut self, id: &RequestId) {
        let before = self.records.len();
        self.records.retain(|r| &r.id != id);
        if self.records.len() != before {
            self.bump();
        }
    }

    /// Append a record, or replace in place if the id is already present.
    pub fn insert(&mut self, record: MaintenanceRequest) {
        match self.records.iter_mut().find(|r| r.id == record.id) {
            Some(slot) => *slot = record,
            None => self.records.push(record),
        }
        self.bump();
    }

    pub fn get_by_id(&self, id: &RequestId) -> Option<&MaintenanceRequest> {
        self.records.iter().find(|r| &r.id == id)
    }

    pub fn records(&self) -> &[MaintenanceRequest] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Incremented by every call that changed the collection.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn bump(&mut self) {
        self.revision += 1;
    }
}

/// Shared handle to a `RequestStore`.
///
/// The lock is only ever held for the duration of a single store call, never
/// across an `.await`.
#[derive(Clone, Default)]
pub struct StoreHandle {
    inner: Arc<Mutex<RequestStore>>,
}

impl StoreHandle {
    pub fn new(store: RequestStore) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    /// Run `f` with exclusive access to the store.
    pub fn with<R>(&self, f: impl FnOnce(&mut RequestStore) -> R) -> R {
        f(&mut self.lock())
    }

    pub fn load(&self, records: Vec<MaintenanceRequest>) {
        self.with(|s| s.load(records))
    }

    pub fn replace(&self, id: &RequestId, record: MaintenanceRequest) {
        self.with(|s| s.replace(id, record))
    }

    pub fn patch(&self, id: &RequestId, changes: &RequestPatch) {
        self.with(|s| s.patch(id, changes))
    }

    pub fn remove(&self, id: &RequestId) {
        self.with(|s| s.remove(id))
    }

    pub fn insert(&self, record: MaintenanceRequest) {
        self.with(|s| s.insert(record))
    }

    pub fn get_by_id(&self, id: &RequestId) -> Option<MaintenanceRequest> {
        self.with(|s| s.get_by_id(id).cloned())
    }

    /// The current records and the revision they were read at.
    pub fn snapshot(&self) -> (Vec<MaintenanceRequest>, u64) {
        self.with(|s| (s.records().to_vec(), s.revision()))
    }

    pub fn revision(&self) -> u64 {
        self.with(|s| s.revision())
    }

    // Store calls never leave a record half-written, so a poisoned lock is
    // still readable.
    fn lock(&self) -> MutexGuard<'_, RequestStore> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
