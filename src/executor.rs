//! Optimistic mutation executor.
//!
//! Every mutation of the request store after the initial load goes through
//! `MutationExecutor`. The contracts per operation:
//!
//! | Operation       | Local write                  | On remote failure                 |
//! |-----------------|------------------------------|-----------------------------------|
//! | `change_status` | before the call (optimistic) | status restored to the pre-image  |
//! | `save_edit`     | after success only           | store untouched                   |
//! | `delete`        | after success only           | store untouched                   |
//! | `create`        | after success only           | store untouched                   |
//!
//! A `NotFound` from the server removes the record locally in every case.
//!
//! At most one mutation per request id is in flight; a second one is
//! rejected with `MutationError::Busy` before any network call. The remote
//! call and its reconciliation run in a spawned task: a caller that stops
//! waiting loses the result, but the store still settles.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::client::{ReferenceCatalog, RequestApi};
use crate::errors::{ClientError, MutationError};
use crate::models::{
    MaintenanceRequest, NewRequest, RequestId, RequestPatch, RequestStatus, RequestType,
};
use crate::store::StoreHandle;

/// Upper bound on a single remote mutation before it counts as failed.
pub const DEFAULT_MUTATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of a successful `change_status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusChange {
    Applied {
        id: RequestId,
        from: RequestStatus,
        to: RequestStatus,
    },
    /// Target equals the current status; nothing was sent.
    Unchanged { id: RequestId, status: RequestStatus },
}

type Shared<T> = Arc<Mutex<T>>;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Marks a request id as "updating" for as long as it lives.
struct InFlightGuard {
    set: Shared<HashSet<RequestId>>,
    id: RequestId,
}

impl InFlightGuard {
    fn acquire(set: &Shared<HashSet<RequestId>>, id: &RequestId) -> Result<Self, MutationError> {
        if !lock(set).insert(id.clone()) {
            return Err(MutationError::Busy { id: id.clone() });
        }
        Ok(Self {
            set: Arc::clone(set),
            id: id.clone(),
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        lock(&self.set).remove(&self.id);
    }
}

#[derive(Clone, Default)]
struct ErrorSlot(Shared<Option<MutationError>>);

impl ErrorSlot {
    fn record<T>(&self, result: &Result<T, MutationError>) {
        *lock(&self.0) = result.as_ref().err().cloned();
    }

    fn get(&self) -> Option<MutationError> {
        lock(&self.0).clone()
    }

    fn clear(&self) {
        *lock(&self.0) = None;
    }
}

async fn bounded<T>(
    timeout: Duration,
    id: Option<&RequestId>,
    call: impl Future<Output = Result<T, ClientError>>,
) -> Result<T, MutationError> {
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result.map_err(|e| MutationError::from_client(id, e)),
        Err(_) => Err(MutationError::Timeout { after: timeout }),
    }
}

#[derive(Clone)]
pub struct MutationExecutor {
    api: Arc<dyn RequestApi>,
    store: StoreHandle,
    in_flight: Shared<HashSet<RequestId>>,
    last_error: ErrorSlot,
    timeout: Duration,
}

impl MutationExecutor {
    pub fn new(api: Arc<dyn RequestApi>, store: StoreHandle) -> Self {
        Self {
            api,
            store,
            in_flight: Arc::default(),
            last_error: ErrorSlot::default(),
            timeout: DEFAULT_MUTATION_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    pub fn is_updating(&self, id: &RequestId) -> bool {
        lock(&self.in_flight).contains(id)
    }

    /// The most recent failure, cleared by the next successful operation.
    pub fn last_error(&self) -> Option<MutationError> {
        self.last_error.get()
    }

    pub fn clear_error(&self) {
        self.last_error.clear();
    }

    /// Replace the store with the server's current records.
    ///
    /// Records with a mutation in flight keep their local value so a pending
    /// rollback still restores the right pre-image.
    pub async fn refresh(&self) -> Result<usize, MutationError> {
        let result = bounded(self.timeout, None, self.api.list_requests()).await;
        self.last_error.record(&result);
        let records = result?;

        let in_flight = lock(&self.in_flight).clone();
        let count = records.len();
        self.store.with(|store| {
            let pending: HashMap<RequestId, MaintenanceRequest> = in_flight
                .iter()
                .filter_map(|id| store.get_by_id(id).map(|r| (id.clone(), r.clone())))
                .collect();
            let merged = records
                .into_iter()
                .map(|r| pending.get(&r.id).cloned().unwrap_or(r))
                .collect();
            store.load(merged);
        });
        tracing::debug!(count, "refreshed requests");
        Ok(count)
    }

    /// Move a request to another lane, optimistically.
    pub async fn change_status(
        &self,
        id: &RequestId,
        new_status: RequestStatus,
    ) -> Result<StatusChange, MutationError> {
        let guard = match InFlightGuard::acquire(&self.in_flight, id) {
            Ok(guard) => guard,
            Err(busy) => {
                tracing::debug!(%id, "status change rejected, mutation in flight");
                return self.fail(busy);
            }
        };

        let Some(previous) = self.store.get_by_id(id).map(|r| r.status) else {
            return self.fail(MutationError::NotFound { id: id.clone() });
        };
        if previous == new_status {
            self.last_error.clear();
            return Ok(StatusChange::Unchanged {
                id: id.clone(),
                status: previous,
            });
        }

        self.store.patch(id, &RequestPatch::status(new_status));
        tracing::info!(%id, from = %previous, to = %new_status, "status change applied locally");

        let api = Arc::clone(&self.api);
        let store = self.store.clone();
        let errors = self.last_error.clone();
        let timeout = self.timeout;
        let id = id.clone();
        let task = tokio::spawn(async move {
            let _guard = guard;
            let result = bounded(
                timeout,
                Some(&id),
                api.update_request(&id, &RequestPatch::status(new_status)),
            )
            .await;

            let result = match result {
                Ok(_) => Ok(StatusChange::Applied {
                    id: id.clone(),
                    from: previous,
                    to: new_status,
                }),
                Err(MutationError::NotFound { id }) => {
                    tracing::warn!(%id, "request vanished on the server, dropping it locally");
                    store.remove(&id);
                    Err(MutationError::NotFound { id })
                }
                Err(err) => {
                    tracing::warn!(%id, error = %err, restored = %previous, "status change failed, rolling back");
                    store.patch(&id, &RequestPatch::status(previous));
                    Err(err)
                }
            };
            errors.record(&result);
            result
        });
        settle(task).await
    }

    /// Persist a full edit; the store only changes once the server accepts it.
    pub async fn save_edit(
        &self,
        edited: MaintenanceRequest,
    ) -> Result<MaintenanceRequest, MutationError> {
        if edited.subject.trim().is_empty() {
            return self.fail(MutationError::Validation("subject is required".into()));
        }
        let guard = match InFlightGuard::acquire(&self.in_flight, &edited.id) {
            Ok(guard) => guard,
            Err(busy) => return self.fail(busy),
        };

        let api = Arc::clone(&self.api);
        let store = self.store.clone();
        let errors = self.last_error.clone();
        let timeout = self.timeout;
        let task = tokio::spawn(async move {
            let _guard = guard;
            let id = edited.id.clone();
            let result = bounded(
                timeout,
                Some(&id),
                api.update_request(&id, &RequestPatch::full(&edited)),
            )
            .await;

            match &result {
                Ok(updated) => {
                    store.replace(&id, updated.clone());
                    tracing::info!(%id, "request saved");
                }
                Err(MutationError::NotFound { .. }) => store.remove(&id),
                Err(err) => tracing::warn!(%id, error = %err, "saving request failed"),
            }
            errors.record(&result);
            result
        });
        settle(task).await
    }

    pub async fn delete(&self, id: &RequestId) -> Result<(), MutationError> {
        let guard = match InFlightGuard::acquire(&self.in_flight, id) {
            Ok(guard) => guard,
            Err(busy) => return self.fail(busy),
        };

        let api = Arc::clone(&self.api);
        let store = self.store.clone();
        let errors = self.last_error.clone();
        let timeout = self.timeout;
        let id = id.clone();
        let task = tokio::spawn(async move {
            let _guard = guard;
            let result = bounded(timeout, Some(&id), api.delete_request(&id)).await;
            match &result {
                Ok(()) | Err(MutationError::NotFound { .. }) => {
                    store.remove(&id);
                    tracing::info!(%id, "request deleted");
                }
                Err(err) => tracing::warn!(%id, error = %err, "deleting request failed"),
            }
            errors.record(&result);
            result
        });
        settle(task).await
    }

    /// Validate and submit a new request, then append the server's record.
    ///
    /// The team defaults to the equipment's maintenance team, and a scheduled
    /// date is dropped from corrective requests.
    pub async fn create(
        &self,
        draft: NewRequest,
        catalog: &ReferenceCatalog,
    ) -> Result<MaintenanceRequest, MutationError> {
        let draft = match prepare_draft(draft, catalog) {
            Ok(draft) => draft,
            Err(err) => return self.fail(err),
        };

        let api = Arc::clone(&self.api);
        let store = self.store.clone();
        let errors = self.last_error.clone();
        let timeout = self.timeout;
        let task = tokio::spawn(async move {
            let result = bounded(timeout, None, api.create_request(&draft)).await;
            match &result {
                Ok(created) => {
                    store.insert(created.clone());
                    tracing::info!(id = %created.id, "request created");
                }
                Err(err) => tracing::warn!(error = %err, "creating request failed"),
            }
            errors.record(&result);
            result
        });
        settle(task).await
    }

    fn fail<T>(&self, err: MutationError) -> Result<T, MutationError> {
        let result = Err(err);
        self.last_error.record(&result);
        result
    }
}

async fn settle<T>(task: JoinHandle<Result<T, MutationError>>) -> Result<T, MutationError> {
    task.await
        .unwrap_or_else(|e| Err(MutationError::Network(format!("mutation task aborted: {}", e))))
}

fn prepare_draft(
    mut draft: NewRequest,
    catalog: &ReferenceCatalog,
) -> Result<NewRequest, MutationError> {
    draft.subject = draft.subject.trim().to_string();
    if draft.subject.is_empty() {
        return Err(MutationError::Validation("subject is required".into()));
    }
    if draft.description.trim().is_empty() {
        return Err(MutationError::Validation("description is required".into()));
    }
    let equipment = catalog
        .equipment_by_id(&draft.equipment_id)
        .ok_or_else(|| MutationError::UnknownEquipment(draft.equipment_id.clone()))?;
    if draft.team_id.is_none() {
        draft.team_id = Some(equipment.maintenance_team_id.clone());
    }
    if draft.kind == RequestType::Corrective {
        draft.scheduled_date = None;
    }
    Ok(draft)
}
