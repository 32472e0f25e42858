//! Filtered, sorted view over the request store.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::client::ReferenceCatalog;
use crate::models::{MaintenanceRequest, Priority, RequestStatus, RequestType};
use crate::store::StoreHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Recent,
    Oldest,
    Priority,
    Status,
}

impl SortKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Recent => "recent",
            Self::Oldest => "oldest",
            Self::Priority => "priority",
            Self::Status => "status",
        }
    }
}

impl std::fmt::Display for SortKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "recent" => Ok(Self::Recent),
            "oldest" => Ok(Self::Oldest),
            "priority" => Ok(Self::Priority),
            "status" => Ok(Self::Status),
            _ => Err(format!("Invalid sort key: {}", s)),
        }
    }
}

/// Inputs of the projection. `None` filters mean "all".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewQuery {
    pub search: String,
    pub status: Option<RequestStatus>,
    pub priority: Option<Priority>,
    pub kind: Option<RequestType>,
    /// Compared against the team's name, not its id.
    pub team: Option<String>,
    pub sort: SortKey,
}

impl ViewQuery {
    pub fn matches(&self, record: &MaintenanceRequest, catalog: &ReferenceCatalog) -> bool {
        self.matches_search(record, catalog)
            && self.status.is_none_or(|s| s == record.status)
            && self.priority.is_none_or(|p| p == record.priority)
            && self.kind.is_none_or(|k| k == record.kind)
            && self
                .team
                .as_deref()
                .is_none_or(|name| catalog.team_name(&record.team_id) == Some(name))
    }

    fn matches_search(&self, record: &MaintenanceRequest, catalog: &ReferenceCatalog) -> bool {
        if self.search.is_empty() {
            return true;
        }
        let needle = self.search.to_lowercase();
        let contains = |haystack: &str| haystack.to_lowercase().contains(&needle);

        if contains(&record.subject) {
            return true;
        }
        if let Some(equipment) = catalog.equipment_by_id(&record.equipment_id)
            && (contains(&equipment.name) || contains(&equipment.serial_number))
        {
            return true;
        }
        record
            .technician_id
            .as_ref()
            .and_then(|id| catalog.technician_by_id(id))
            .is_some_and(|t| contains(&t.name))
    }
}

/// Parse a CLI filter value where `all` (or empty) means no filter.
pub fn parse_filter<T: FromStr<Err = String>>(value: &str) -> Result<Option<T>, String> {
    match value.trim() {
        "" => Ok(None),
        v if v.eq_ignore_ascii_case("all") => Ok(None),
        v => v.parse().map(Some),
    }
}

fn priority_rank(priority: Priority) -> u8 {
    match priority {
        Priority::High => 0,
        Priority::Medium => 1,
        Priority::Low => 2,
    }
}

fn status_rank(status: RequestStatus) -> u8 {
    match status {
        RequestStatus::New => 0,
        RequestStatus::InProgress => 1,
        RequestStatus::Completed => 2,
        RequestStatus::OnHold | RequestStatus::Scrap => u8::MAX,
    }
}

/// Filter and sort `records`. Sorting is stable: ties keep input order.
pub fn project(
    records: &[MaintenanceRequest],
    catalog: &ReferenceCatalog,
    query: &ViewQuery,
) -> Vec<MaintenanceRequest> {
    let mut view: Vec<MaintenanceRequest> = records
        .iter()
        .filter(|r| query.matches(r, catalog))
        .cloned()
        .collect();

    match query.sort {
        SortKey::Recent => view.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        SortKey::Oldest => view.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
        SortKey::Priority => view.sort_by_key(|r| priority_rank(r.priority)),
        SortKey::Status => view.sort_by_key(|r| status_rank(r.status)),
    }
    view
}

/// Caches the projected view and recomputes it only when the store revision
/// or the query changed since the last read.
pub struct LiveProjection {
    store: StoreHandle,
    query: ViewQuery,
    computed_at: Option<u64>,
    view: Vec<MaintenanceRequest>,
}

impl LiveProjection {
    pub fn new(store: StoreHandle, query: ViewQuery) -> Self {
        Self {
            store,
            query,
            computed_at: None,
            view: Vec::new(),
        }
    }

    pub fn query(&self) -> &ViewQuery {
        &self.query
    }

    pub fn set_query(&mut self, query: ViewQuery) {
        if query != self.query {
            self.query = query;
            self.computed_at = None;
        }
    }

    pub fn view(&mut self, catalog: &ReferenceCatalog) -> &[MaintenanceRequest] {
        let revision = self.store.revision();
        if self.computed_at != Some(revision) {
            let (records, revision) = self.store.snapshot();
            self.view = project(&records, catalog, &self.query);
            self.computed_at = Some(revision);
        }
        &self.view
    }
}

/// Header counters shown above the board and the request list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ViewStats {
    pub total: usize,
    pub new: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub high_priority: usize,
}

impl ViewStats {
    pub fn of(view: &[MaintenanceRequest]) -> Self {
        let count = |f: &dyn Fn(&MaintenanceRequest) -> bool| view.iter().filter(|r| f(r)).count();
        Self {
            total: view.len(),
            new: count(&|r| r.status == RequestStatus::New),
            in_progress: count(&|r| r.status == RequestStatus::InProgress),
            completed: count(&|r| r.status == RequestStatus::Completed),
            high_priority: count(&|r| r.priority == Priority::High),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::reference::fixtures::catalog;
    use crate::models::fixtures::request;
    use crate::models::{EquipmentId, RequestPatch, TeamId, UserId};
    use crate::store::RequestStore;

    fn ids(view: &[MaintenanceRequest]) -> Vec<&str> {
        view.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn test_status_filter_keeps_original_order() {
        let records = vec![
            request("1", RequestStatus::New, 5),
            request("2", RequestStatus::Completed, 1),
            request("3", RequestStatus::New, 9),
        ];
        let query = ViewQuery {
            status: Some(RequestStatus::New),
            sort: SortKey::Priority,
            ..ViewQuery::default()
        };
        assert_eq!(ids(&project(&records, &catalog(), &query)), ["1", "3"]);
    }

    #[test]
    fn test_recent_sorts_newest_first() {
        let records = vec![
            request("1", RequestStatus::New, 1),
            request("2", RequestStatus::New, 2),
        ];
        let view = project(&records, &catalog(), &ViewQuery::default());
        assert_eq!(ids(&view), ["2", "1"]);

        let oldest = ViewQuery {
            sort: SortKey::Oldest,
            ..ViewQuery::default()
        };
        assert_eq!(ids(&project(&records, &catalog(), &oldest)), ["1", "2"]);
    }

    #[test]
    fn test_priority_sort_is_stable() {
        let mut records = vec![
            request("a", RequestStatus::New, 0),
            request("b", RequestStatus::New, 0),
            request("c", RequestStatus::New, 0),
            request("d", RequestStatus::New, 0),
        ];
        records[0].priority = Priority::Low;
        records[1].priority = Priority::High;
        records[2].priority = Priority::Low;
        records[3].priority = Priority::High;
        let query = ViewQuery {
            sort: SortKey::Priority,
            ..ViewQuery::default()
        };
        assert_eq!(ids(&project(&records, &catalog(), &query)), ["b", "d", "a", "c"]);
    }

    #[test]
    fn test_status_sort_puts_unranked_statuses_last() {
        let records = vec![
            request("scrap", RequestStatus::Scrap, 0),
            request("done", RequestStatus::Completed, 0),
            request("hold", RequestStatus::OnHold, 0),
            request("new", RequestStatus::New, 0),
            request("wip", RequestStatus::InProgress, 0),
        ];
        let query = ViewQuery {
            sort: SortKey::Status,
            ..ViewQuery::default()
        };
        assert_eq!(
            ids(&project(&records, &catalog(), &query)),
            ["new", "wip", "done", "scrap", "hold"]
        );
    }

    #[test]
    fn test_search_matches_subject_equipment_and_technician() {
        let mut by_subject = request("s", RequestStatus::New, 0);
        by_subject.subject = "Paper jam in tray 2".into();
        let mut by_serial = request("e", RequestStatus::New, 0);
        by_serial.equipment_id = EquipmentId::new("eq-2");
        let mut by_tech = request("t", RequestStatus::New, 0);
        by_tech.technician_id = Some(UserId::new("u-1"));
        let records = vec![by_subject, by_serial, by_tech];
        let catalog = catalog();

        let search = |term: &str| {
            let query = ViewQuery {
                search: term.into(),
                sort: SortKey::Oldest,
                ..ViewQuery::default()
            };
            project(&records, &catalog, &query)
                .into_iter()
                .map(|r| r.id.0)
                .collect::<Vec<_>>()
        };

        assert_eq!(search("PAPER JAM"), ["s"]);
        assert_eq!(search("sn-2024-002"), ["e"]);
        assert_eq!(search("hvac"), ["e"]);
        assert_eq!(search("maria"), ["t"]);
        assert!(search("elevator").is_empty());
        assert_eq!(search("").len(), 3);
    }

    #[test]
    fn test_team_filter_compares_by_name() {
        let mut facilities = request("f", RequestStatus::New, 0);
        facilities.team_id = TeamId::new("team-2");
        let records = vec![request("it", RequestStatus::New, 0), facilities];
        let query = ViewQuery {
            team: Some("Facilities".into()),
            ..ViewQuery::default()
        };
        assert_eq!(ids(&project(&records, &catalog(), &query)), ["f"]);
    }

    #[test]
    fn test_filters_compose() {
        let mut high = request("h", RequestStatus::New, 0);
        high.priority = Priority::High;
        let mut preventive = request("p", RequestStatus::New, 0);
        preventive.priority = Priority::High;
        preventive.kind = RequestType::Preventive;
        let records = vec![high, preventive, request("m", RequestStatus::New, 0)];
        let query = ViewQuery {
            priority: Some(Priority::High),
            kind: Some(RequestType::Corrective),
            ..ViewQuery::default()
        };
        assert_eq!(ids(&project(&records, &catalog(), &query)), ["h"]);
    }

    #[test]
    fn test_parse_filter_treats_all_as_none() {
        assert_eq!(parse_filter::<RequestStatus>("all").unwrap(), None);
        assert_eq!(parse_filter::<RequestStatus>("ALL").unwrap(), None);
        assert_eq!(
            parse_filter::<RequestStatus>("on-hold").unwrap(),
            Some(RequestStatus::OnHold)
        );
        assert!(parse_filter::<Priority>("urgent").is_err());
    }

    #[test]
    fn test_live_projection_recomputes_on_store_change() {
        let store = StoreHandle::new(RequestStore::new());
        store.load(vec![
            request("1", RequestStatus::New, 0),
            request("2", RequestStatus::New, 1),
        ]);
        let catalog = catalog();
        let mut live = LiveProjection::new(
            store.clone(),
            ViewQuery {
                status: Some(RequestStatus::New),
                ..ViewQuery::default()
            },
        );
        assert_eq!(live.view(&catalog).len(), 2);

        store.patch(
            &crate::models::RequestId::new("1"),
            &RequestPatch::status(RequestStatus::Completed),
        );
        assert_eq!(ids(live.view(&catalog)), ["2"]);

        live.set_query(ViewQuery::default());
        assert_eq!(live.view(&catalog).len(), 2);
    }

    #[test]
    fn test_stats_count_view() {
        let mut high = request("1", RequestStatus::InProgress, 0);
        high.priority = Priority::High;
        let view = vec![
            high,
            request("2", RequestStatus::New, 0),
            request("3", RequestStatus::Completed, 0),
            request("4", RequestStatus::Scrap, 0),
        ];
        let stats = ViewStats::of(&view);
        assert_eq!(
            stats,
            ViewStats {
                total: 4,
                new: 1,
                in_progress: 1,
                completed: 1,
                high_priority: 1,
            }
        );
    }
}
