//! Status lanes and drag-and-drop.
//!
//! `BoardLayout` partitions a projected view into the five status lanes.
//! `DragController` is the per-board drag state machine; a drop hands the
//! card to the executor's status-change contract.

use crate::errors::BoardError;
use crate::executor::{MutationExecutor, StatusChange};
use crate::models::{MaintenanceRequest, RequestId, RequestStatus};

#[derive(Debug, Clone, PartialEq)]
pub struct Lane {
    pub status: RequestStatus,
    pub cards: Vec<MaintenanceRequest>,
}

impl Lane {
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

/// Exactly one lane per status, in `RequestStatus::ALL` order.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardLayout {
    lanes: Vec<Lane>,
}

impl BoardLayout {
    /// Cards keep their relative order from `view` within each lane.
    pub fn from_view(view: &[MaintenanceRequest]) -> Self {
        let lanes = RequestStatus::ALL
            .iter()
            .map(|&status| Lane {
                status,
                cards: view.iter().filter(|r| r.status == status).cloned().collect(),
            })
            .collect();
        Self { lanes }
    }

    pub fn lanes(&self) -> &[Lane] {
        &self.lanes
    }

    pub fn lane(&self, status: RequestStatus) -> &Lane {
        let index = RequestStatus::ALL
            .iter()
            .position(|&s| s == status)
            .unwrap_or_default();
        &self.lanes[index]
    }

    pub fn total(&self) -> usize {
        self.lanes.iter().map(Lane::len).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DragState {
    #[default]
    Idle,
    Dragging {
        id: RequestId,
        from: RequestStatus,
    },
}

pub struct DragController {
    executor: MutationExecutor,
    state: DragState,
}

impl DragController {
    pub fn new(executor: MutationExecutor) -> Self {
        Self {
            executor,
            state: DragState::Idle,
        }
    }

    pub fn state(&self) -> &DragState {
        &self.state
    }

    pub fn is_draggable(&self, id: &RequestId) -> bool {
        !self.executor.is_updating(id) && self.executor.store().get_by_id(id).is_some()
    }

    /// Idle → Dragging. Refused while the card has a mutation in flight.
    pub fn start_drag(&mut self, id: &RequestId) -> Result<(), BoardError> {
        if let DragState::Dragging { id: current, .. } = &self.state {
            return Err(BoardError::AlreadyDragging {
                id: current.clone(),
            });
        }
        if self.executor.is_updating(id) {
            return Err(BoardError::Updating { id: id.clone() });
        }
        let record = self
            .executor
            .store()
            .get_by_id(id)
            .ok_or_else(|| BoardError::UnknownCard { id: id.clone() })?;

        tracing::trace!(%id, from = %record.status, "drag started");
        self.state = DragState::Dragging {
            id: id.clone(),
            from: record.status,
        };
        Ok(())
    }

    /// Dragging → Idle without a drop. Returns the card that was in hand.
    pub fn cancel(&mut self) -> Option<RequestId> {
        match std::mem::take(&mut self.state) {
            DragState::Dragging { id, .. } => Some(id),
            DragState::Idle => None,
        }
    }

    /// Drop the dragged card on `lane`. The controller is Idle again before the
    /// remote call starts, whatever its outcome.
    ///
    /// The lane is compared with the card's status in the store at drop time,
    /// not the one it had when the drag started.
    pub async fn drop_on(&mut self, lane: RequestStatus) -> Result<StatusChange, BoardError> {
        let DragState::Dragging { id, .. } = std::mem::take(&mut self.state) else {
            return Err(BoardError::NotDragging);
        };
        Ok(self.executor.change_status(&id, lane).await?)
    }

    /// Drag and drop in one step, as the `move` command does.
    pub async fn move_card(
        &mut self,
        id: &RequestId,
        lane: RequestStatus,
    ) -> Result<StatusChange, BoardError> {
        self.start_drag(id)?;
        self.drop_on(lane).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::RequestApi;
    use crate::errors::{ClientError, MutationError};
    use crate::models::fixtures::request;
    use crate::models::{NewRequest, RequestPatch};
    use crate::store::{RequestStore, StoreHandle};
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    struct LaneApi {
        fail: bool,
        updates: AtomicUsize,
        hold: Option<Arc<Notify>>,
    }

    impl LaneApi {
        fn new(fail: bool) -> Self {
            Self {
                fail,
                updates: AtomicUsize::new(0),
                hold: None,
            }
        }
    }

    #[async_trait]
    impl RequestApi for LaneApi {
        async fn list_requests(&self) -> Result<Vec<MaintenanceRequest>, ClientError> {
            Ok(Vec::new())
        }

        async fn create_request(&self, _: &NewRequest) -> Result<MaintenanceRequest, ClientError> {
            Err(ClientError::Network("unsupported".into()))
        }

        async fn update_request(
            &self,
            id: &RequestId,
            changes: &RequestPatch,
        ) -> Result<MaintenanceRequest, ClientError> {
            self.updates.fetch_add(1, Ordering::SeqCst);
            if let Some(hold) = &self.hold {
                hold.notified().await;
            }
            if self.fail {
                return Err(ClientError::Network("connection refused".into()));
            }
            let mut record = request(id.as_str(), RequestStatus::New, 0);
            changes.apply_to(&mut record);
            Ok(record)
        }

        async fn delete_request(&self, _: &RequestId) -> Result<(), ClientError> {
            Ok(())
        }
    }

    fn board(api: LaneApi, records: Vec<MaintenanceRequest>) -> (Arc<LaneApi>, DragController) {
        let store = StoreHandle::new(RequestStore::new());
        store.load(records);
        let api = Arc::new(api);
        let controller = DragController::new(MutationExecutor::new(api.clone(), store));
        (api, controller)
    }

    fn ids(lane: &Lane) -> Vec<&str> {
        lane.cards.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn test_layout_has_five_lanes_in_order() {
        let view = vec![
            request("1", RequestStatus::Scrap, 0),
            request("2", RequestStatus::New, 1),
            request("3", RequestStatus::New, 2),
            request("4", RequestStatus::OnHold, 3),
        ];
        let layout = BoardLayout::from_view(&view);

        let statuses: Vec<_> = layout.lanes().iter().map(|l| l.status).collect();
        assert_eq!(statuses, RequestStatus::ALL);
        assert_eq!(ids(layout.lane(RequestStatus::New)), ["2", "3"]);
        assert_eq!(ids(layout.lane(RequestStatus::Scrap)), ["1"]);
        assert!(layout.lane(RequestStatus::Completed).is_empty());
        assert_eq!(layout.total(), 4);
    }

    #[test]
    fn test_empty_view_still_has_all_lanes() {
        let layout = BoardLayout::from_view(&[]);
        assert_eq!(layout.lanes().len(), 5);
        assert_eq!(layout.total(), 0);
    }

    #[tokio::test]
    async fn test_drop_on_other_lane_changes_status() {
        let (api, mut controller) =
            board(LaneApi::new(false), vec![request("1", RequestStatus::New, 0)]);
        let id = RequestId::new("1");

        controller.start_drag(&id).unwrap();
        assert_eq!(
            controller.state(),
            &DragState::Dragging {
                id: id.clone(),
                from: RequestStatus::New,
            }
        );
        let change = controller.drop_on(RequestStatus::InProgress).await.unwrap();

        assert!(matches!(change, StatusChange::Applied { .. }));
        assert_eq!(controller.state(), &DragState::Idle);
        assert_eq!(api.updates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_drop_on_current_lane_is_a_no_op() {
        let (api, mut controller) =
            board(LaneApi::new(false), vec![request("1", RequestStatus::New, 0)]);
        let id = RequestId::new("1");

        let change = controller.move_card(&id, RequestStatus::New).await.unwrap();

        assert_eq!(
            change,
            StatusChange::Unchanged {
                id: id.clone(),
                status: RequestStatus::New,
            }
        );
        assert_eq!(api.updates.load(Ordering::SeqCst), 0);
        assert!(controller.is_draggable(&id));
    }

    #[tokio::test]
    async fn test_drop_uses_status_from_store_after_reload() {
        let (api, mut controller) =
            board(LaneApi::new(false), vec![request("1", RequestStatus::New, 0)]);
        let id = RequestId::new("1");

        controller.start_drag(&id).unwrap();
        controller
            .executor
            .store()
            .load(vec![request("1", RequestStatus::Completed, 0)]);
        let change = controller.drop_on(RequestStatus::New).await.unwrap();

        assert_eq!(
            change,
            StatusChange::Applied {
                id: id.clone(),
                from: RequestStatus::Completed,
                to: RequestStatus::New,
            }
        );
        let store = controller.executor.store();
        assert_eq!(store.get_by_id(&id).unwrap().status, RequestStatus::New);
        assert_eq!(api.updates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_drop_reverts_and_surfaces_error() {
        let (_api, mut controller) =
            board(LaneApi::new(true), vec![request("1", RequestStatus::New, 0)]);
        let id = RequestId::new("1");

        let err = controller
            .move_card(&id, RequestStatus::InProgress)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            BoardError::Mutation(MutationError::Network(_))
        ));
        let store = controller.executor.store();
        assert_eq!(store.get_by_id(&id).unwrap().status, RequestStatus::New);
        assert_eq!(controller.state(), &DragState::Idle);
        assert!(controller.executor.last_error().is_some());
    }

    #[tokio::test]
    async fn test_updating_card_is_not_draggable() {
        let hold = Arc::new(Notify::new());
        let api = LaneApi {
            hold: Some(hold.clone()),
            ..LaneApi::new(false)
        };
        let (_api, mut controller) = board(api, vec![request("1", RequestStatus::New, 0)]);
        let id = RequestId::new("1");
        let executor = controller.executor.clone();

        let pending = tokio::spawn({
            let executor = executor.clone();
            let id = id.clone();
            async move { executor.change_status(&id, RequestStatus::Completed).await }
        });
        while !executor.is_updating(&id) {
            tokio::task::yield_now().await;
        }

        assert!(!controller.is_draggable(&id));
        assert_eq!(
            controller.start_drag(&id),
            Err(BoardError::Updating { id: id.clone() })
        );
        assert_eq!(controller.state(), &DragState::Idle);

        hold.notify_one();
        pending.await.unwrap().unwrap();
        assert!(controller.is_draggable(&id));
    }

    #[test]
    fn test_drag_guards() {
        let (_api, mut controller) = board(
            LaneApi::new(false),
            vec![
                request("1", RequestStatus::New, 0),
                request("2", RequestStatus::New, 1),
            ],
        );
        let one = RequestId::new("1");

        assert_eq!(
            controller.start_drag(&RequestId::new("nope")),
            Err(BoardError::UnknownCard {
                id: RequestId::new("nope")
            })
        );
        controller.start_drag(&one).unwrap();
        assert_eq!(
            controller.start_drag(&RequestId::new("2")),
            Err(BoardError::AlreadyDragging { id: one.clone() })
        );
        assert_eq!(controller.cancel(), Some(one));
        assert_eq!(controller.cancel(), None);
        assert_eq!(controller.state(), &DragState::Idle);
    }

    #[tokio::test]
    async fn test_drop_without_drag_is_rejected() {
        let (_api, mut controller) = board(LaneApi::new(false), Vec::new());
        assert_eq!(
            controller.drop_on(RequestStatus::Scrap).await,
            Err(BoardError::NotDragging)
        );
    }
}
