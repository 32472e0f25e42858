use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, anyhow};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::auth::{self, RevokedSession};
use crate::models::{
    Equipment, EquipmentId, MaintenanceRequest, NewRequest, RequestId, RequestPatch,
    RequestStatus, RequestType, Team, TeamId, Technician, UserId,
};

#[derive(Debug, Error)]
pub enum DbError {
    #[error("{0}")]
    Invalid(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

pub type DbResult<T> = Result<T, DbError>;

/// A registered account. Only the server ever sees the hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

impl UserRecord {
    pub fn public(&self) -> Technician {
        Technician {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Collections {
    #[serde(default)]
    requests: Vec<MaintenanceRequest>,
    #[serde(default)]
    equipment: Vec<Equipment>,
    #[serde(default)]
    teams: Vec<Team>,
    #[serde(default)]
    users: Vec<UserRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    signing_secret: Option<String>,
    #[serde(default)]
    revoked_sessions: Vec<RevokedSession>,
}

/// Async-safe handle to the document store.
///
/// Every call runs on tokio's blocking pool because a write may flush the
/// collections to disk.
#[derive(Clone)]
pub struct DbHandle {
    inner: Arc<Mutex<DocumentDb>>,
}

impl DbHandle {
    pub fn new(db: DocumentDb) -> Self {
        Self {
            inner: Arc::new(Mutex::new(db)),
        }
    }

    /// Run `f` against the store on a blocking thread. `f` must own its data.
    pub async fn call<F, R>(&self, f: F) -> DbResult<R>
    where
        F: FnOnce(&mut DocumentDb) -> DbResult<R> + Send + 'static,
        R: Send + 'static,
    {
        let db = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = db
                .lock()
                .map_err(|e| anyhow!("document store lock poisoned: {}", e))?;
            f(&mut guard)
        })
        .await
        .context("document store task panicked")?
    }
}

/// In-memory document collections, optionally mirrored to a JSON file.
pub struct DocumentDb {
    docs: Collections,
    path: Option<PathBuf>,
}

impl DocumentDb {
    pub fn new_in_memory() -> Self {
        Self {
            docs: Collections::default(),
            path: None,
        }
    }

    /// Open the JSON file at `path`, starting empty if it does not exist yet.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let docs = if path.exists() {
            let raw = std::fs::read(path)
                .with_context(|| format!("Failed to read data file {}", path.display()))?;
            serde_json::from_slice(&raw)
                .with_context(|| format!("Failed to parse data file {}", path.display()))?
        } else {
            Collections::default()
        };
        Ok(Self {
            docs,
            path: Some(path.to_path_buf()),
        })
    }

    /// Install the demo equipment and team catalog when none is present.
    pub fn seed_reference_data(&mut self) -> anyhow::Result<bool> {
        if !self.docs.equipment.is_empty() || !self.docs.teams.is_empty() {
            return Ok(false);
        }
        self.commit(|docs| {
            docs.teams = seed_teams();
            docs.equipment = seed_equipment();
            Ok(())
        })?;
        Ok(true)
    }

    /// Apply `change` to a copy of the collections and keep it only once the
    /// copy is on disk.
    fn commit<R>(&mut self, change: impl FnOnce(&mut Collections) -> DbResult<R>) -> DbResult<R> {
        let mut next = self.docs.clone();
        let result = change(&mut next)?;
        self.write(&next)?;
        self.docs = next;
        Ok(result)
    }

    fn write(&self, docs: &Collections) -> anyhow::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).context("Failed to create data directory")?;
        }
        let json = serde_json::to_vec_pretty(docs)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, path)
            .with_context(|| format!("Failed to replace {}", path.display()))?;
        Ok(())
    }

    // ── Reference data ───────────────────────────────────────────────────

    pub fn list_equipment(&self) -> Vec<Equipment> {
        self.docs.equipment.clone()
    }

    pub fn list_teams(&self) -> Vec<Team> {
        self.docs.teams.clone()
    }

    pub fn list_users(&self) -> Vec<Technician> {
        self.docs.users.iter().map(UserRecord::public).collect()
    }

    fn equipment(&self, id: &EquipmentId) -> DbResult<&Equipment> {
        self.docs
            .equipment
            .iter()
            .find(|e| &e.id == id)
            .ok_or_else(|| DbError::Invalid(format!("Equipment {} does not exist", id)))
    }

    fn check_team(&self, id: &TeamId) -> DbResult<()> {
        match self.docs.teams.iter().any(|t| &t.id == id) {
            true => Ok(()),
            false => Err(DbError::Invalid(format!("Team {} does not exist", id))),
        }
    }

    fn check_technician(&self, id: &UserId) -> DbResult<()> {
        match self.docs.users.iter().any(|u| &u.id == id) {
            true => Ok(()),
            false => Err(DbError::Invalid(format!("Technician {} does not exist", id))),
        }
    }

    // ── Requests ─────────────────────────────────────────────────────────

    pub fn list_requests(&self) -> Vec<MaintenanceRequest> {
        self.docs.requests.clone()
    }

    pub fn get_request(&self, id: &RequestId) -> Option<&MaintenanceRequest> {
        self.docs.requests.iter().find(|r| &r.id == id)
    }

    pub fn create_request(
        &mut self,
        draft: NewRequest,
        created_by: Option<UserId>,
    ) -> DbResult<MaintenanceRequest> {
        let subject = draft.subject.trim();
        if subject.is_empty() || draft.description.trim().is_empty() {
            return Err(DbError::Invalid(
                "Subject and description are required".into(),
            ));
        }
        let team_id = match draft.team_id {
            Some(team_id) => team_id,
            None => self.equipment(&draft.equipment_id)?.maintenance_team_id.clone(),
        };
        self.equipment(&draft.equipment_id)?;
        self.check_team(&team_id)?;
        if let Some(technician) = &draft.technician_id {
            self.check_technician(technician)?;
        }

        let record = MaintenanceRequest {
            id: RequestId::new(Uuid::new_v4().to_string()),
            subject: subject.to_string(),
            description: draft.description,
            kind: draft.kind,
            priority: draft.priority,
            status: RequestStatus::New,
            equipment_id: draft.equipment_id,
            team_id,
            technician_id: draft.technician_id,
            scheduled_date: match draft.kind {
                RequestType::Preventive => draft.scheduled_date,
                RequestType::Corrective => None,
            },
            duration_hours: None,
            created_by,
            created_at: Utc::now(),
        };
        self.commit(|docs| {
            docs.requests.push(record.clone());
            Ok(record)
        })
    }

    pub fn update_request(
        &mut self,
        id: &RequestId,
        changes: &RequestPatch,
    ) -> DbResult<MaintenanceRequest> {
        if self.get_request(id).is_none() {
            return Err(DbError::NotFound(format!("Request {} not found", id)));
        }
        if changes.subject.as_deref().is_some_and(|s| s.trim().is_empty()) {
            return Err(DbError::Invalid("Subject cannot be empty".into()));
        }
        if let Some(equipment_id) = &changes.equipment_id {
            self.equipment(equipment_id)?;
        }
        if let Some(team_id) = &changes.team_id {
            self.check_team(team_id)?;
        }
        if let Some(Some(technician)) = &changes.technician_id {
            self.check_technician(technician)?;
        }
        if changes.duration_hours.flatten().is_some_and(|h| h < 0.0) {
            return Err(DbError::Invalid("Duration cannot be negative".into()));
        }

        self.commit(|docs| {
            let record = docs
                .requests
                .iter_mut()
                .find(|r| &r.id == id)
                .ok_or_else(|| DbError::NotFound(format!("Request {} not found", id)))?;
            changes.apply_to(record);
            // Only preventive work carries a schedule.
            if record.kind == RequestType::Corrective {
                record.scheduled_date = None;
            }
            Ok(record.clone())
        })
    }

    pub fn delete_request(&mut self, id: &RequestId) -> DbResult<()> {
        if self.get_request(id).is_none() {
            return Err(DbError::NotFound(format!("Request {} not found", id)));
        }
        self.commit(|docs| {
            docs.requests.retain(|r| &r.id != id);
            Ok(())
        })
    }

    // ── Users ────────────────────────────────────────────────────────────

    pub fn find_user_by_email(&self, email: &str) -> Option<&UserRecord> {
        self.docs
            .users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
    }

    pub fn create_user(
        &mut self,
        name: &str,
        email: &str,
        password_hash: String,
    ) -> DbResult<UserRecord> {
        if self.find_user_by_email(email).is_some() {
            return Err(DbError::Conflict("User already exists".into()));
        }
        let user = UserRecord {
            id: UserId::new(Uuid::new_v4().to_string()),
            name: name.trim().to_string(),
            email: email.trim().to_lowercase(),
            password_hash,
        };
        self.commit(|docs| {
            docs.users.push(user.clone());
            Ok(user)
        })
    }

    // ── Sessions ─────────────────────────────────────────────────────────

    /// The token signing secret, generated and stored on first use.
    pub fn signing_secret(&mut self) -> DbResult<String> {
        if let Some(secret) = &self.docs.signing_secret {
            return Ok(secret.clone());
        }
        let secret = auth::new_secret();
        self.commit(|docs| {
            docs.signing_secret = Some(secret.clone());
            Ok(secret)
        })
    }

    /// Logged-out tokens that have not expired yet.
    pub fn revoked_sessions(&self) -> Vec<RevokedSession> {
        let now = Utc::now();
        self.docs
            .revoked_sessions
            .iter()
            .filter(|r| r.expires_at > now)
            .cloned()
            .collect()
    }

    pub fn record_revocation(&mut self, entry: RevokedSession) -> DbResult<()> {
        let now = Utc::now();
        self.commit(|docs| {
            docs.revoked_sessions.retain(|r| r.expires_at > now);
            docs.revoked_sessions.push(entry);
            Ok(())
        })
    }
}


fn seed_teams() -> Vec<Team> {
    [
        ("team1", "IT Support"),
        ("team2", "Facilities"),
        ("team3", "Maintenance"),
        ("team4", "Production"),
    ]
    .into_iter()
    .map(|(id, name)| Team {
        id: TeamId::new(id),
        name: name.to_string(),
    })
    .collect()
}

fn seed_equipment() -> Vec<Equipment> {
    [
        ("1", "HP LaserJet Pro M404n", "SN-2024-001", "Office Floor 2", "IT", "team1"),
        ("2", "HVAC Unit A-101", "SN-2024-002", "Building A - Server Room", "Facilities", "team2"),
        ("3", "Dell PowerEdge R750", "SN-2024-003", "Data Center Rack 5", "IT", "team1"),
        ("4", "Industrial Fan Unit F-204", "SN-2024-004", "Production Floor", "Manufacturing", "team3"),
        ("5", "Dell Latitude 5420 Laptop", "SN-2024-005", "Assigned to John Smith", "IT", "team1"),
        ("6", "Elevator #3", "SN-2024-006", "Building B Lobby", "Facilities", "team2"),
    ]
    .into_iter()
    .map(|(id, name, serial, location, department, team)| Equipment {
        id: EquipmentId::new(id),
        name: name.to_string(),
        serial_number: serial.to_string(),
        location: location.to_string(),
        department: department.to_string(),
        maintenance_team_id: TeamId::new(team),
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Priority;

    fn seeded() -> DocumentDb {
        let mut db = DocumentDb::new_in_memory();
        db.seed_reference_data().unwrap();
        db
    }

    fn draft(equipment: &str) -> NewRequest {
        NewRequest {
            subject: "Paper jam".into(),
            description: "Tray 2 jams on every print".into(),
            equipment_id: EquipmentId::new(equipment),
            kind: RequestType::Corrective,
            priority: Priority::High,
            scheduled_date: None,
            technician_id: None,
            team_id: None,
        }
    }

    #[test]
    fn test_seed_is_idempotent() {
        let mut db = seeded();
        assert_eq!(db.list_equipment().len(), 6);
        assert_eq!(db.list_teams().len(), 4);
        assert!(!db.seed_reference_data().unwrap());
    }

    #[test]
    fn test_create_inherits_equipment_team() {
        let mut db = seeded();
        let record = db.create_request(draft("4"), None).unwrap();
        assert_eq!(record.team_id, TeamId::new("team3"));
        assert_eq!(record.status, RequestStatus::New);
        assert_eq!(db.list_requests(), vec![record]);
    }

    #[test]
    fn test_create_rejects_unknown_equipment_and_empty_subject() {
        let mut db = seeded();
        assert!(matches!(
            db.create_request(draft("99"), None),
            Err(DbError::Invalid(_))
        ));
        let mut blank = draft("1");
        blank.subject = "  ".into();
        assert!(matches!(
            db.create_request(blank, None),
            Err(DbError::Invalid(_))
        ));
        assert!(db.list_requests().is_empty());
    }

    #[test]
    fn test_update_and_delete_unknown_request() {
        let mut db = seeded();
        let missing = RequestId::new("missing");
        assert!(matches!(
            db.update_request(&missing, &RequestPatch::status(RequestStatus::Scrap)),
            Err(DbError::NotFound(_))
        ));
        assert!(matches!(
            db.delete_request(&missing),
            Err(DbError::NotFound(_))
        ));
    }

    #[test]
    fn test_update_applies_patch() {
        let mut db = seeded();
        let record = db.create_request(draft("1"), None).unwrap();
        let updated = db
            .update_request(&record.id, &RequestPatch::status(RequestStatus::OnHold))
            .unwrap();
        assert_eq!(updated.status, RequestStatus::OnHold);
        assert_eq!(updated.created_at, record.created_at);
        assert_eq!(db.get_request(&record.id), Some(&updated));
    }

    #[test]
    fn test_duplicate_email_conflicts() {
        let mut db = seeded();
        db.create_user("Ana", "ana@example.com", "h".into()).unwrap();
        assert!(matches!(
            db.create_user("Ana B", "ANA@example.com", "h".into()),
            Err(DbError::Conflict(_))
        ));
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("gearguard.json");
        let id = {
            let mut db = DocumentDb::open(&path).unwrap();
            db.seed_reference_data().unwrap();
            db.create_request(draft("2"), None).unwrap().id
        };

        let reopened = DocumentDb::open(&path).unwrap();
        assert_eq!(reopened.list_equipment().len(), 6);
        assert!(reopened.get_request(&id).is_some());
    }

    #[test]
    fn test_update_to_corrective_drops_schedule() {
        let mut db = seeded();
        let mut preventive = draft("1");
        preventive.kind = RequestType::Preventive;
        preventive.scheduled_date = chrono::NaiveDate::from_ymd_opt(2025, 3, 1);
        let record = db.create_request(preventive, None).unwrap();
        assert!(record.scheduled_date.is_some());

        let patch = RequestPatch {
            kind: Some(RequestType::Corrective),
            ..RequestPatch::default()
        };
        let updated = db.update_request(&record.id, &patch).unwrap();
        assert_eq!(updated.kind, RequestType::Corrective);
        assert_eq!(updated.scheduled_date, None);
        assert_eq!(db.get_request(&record.id).unwrap().scheduled_date, None);
    }

    #[test]
    fn test_failed_write_leaves_collections_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data");
        let mut db = DocumentDb::open(&data.join("gearguard.json")).unwrap();
        db.seed_reference_data().unwrap();
        let kept = db.create_request(draft("1"), None).unwrap();

        // A regular file where the data directory should be makes every
        // later write fail.
        std::fs::remove_dir_all(&data).unwrap();
        std::fs::write(&data, b"not a directory").unwrap();

        assert!(matches!(
            db.create_request(draft("2"), None),
            Err(DbError::Storage(_))
        ));
        assert!(db.delete_request(&kept.id).is_err());
        assert!(
            db.update_request(&kept.id, &RequestPatch::status(RequestStatus::Scrap))
                .is_err()
        );
        assert!(db.create_user("Ana", "ana@example.com", "h".into()).is_err());

        assert_eq!(db.list_requests(), vec![kept]);
        assert!(db.find_user_by_email("ana@example.com").is_none());
    }

    #[test]
    fn test_signing_secret_and_revocations_persist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gearguard.json");
        let live = RevokedSession {
            jti: "live".into(),
            expires_at: Utc::now() + chrono::Duration::hours(1),
        };
        let secret = {
            let mut db = DocumentDb::open(&path).unwrap();
            let secret = db.signing_secret().unwrap();
            assert_eq!(db.signing_secret().unwrap(), secret);
            db.record_revocation(RevokedSession {
                jti: "stale".into(),
                expires_at: Utc::now() - chrono::Duration::hours(1),
            })
            .unwrap();
            db.record_revocation(live.clone()).unwrap();
            secret
        };

        let mut reopened = DocumentDb::open(&path).unwrap();
        assert_eq!(reopened.signing_secret().unwrap(), secret);
        assert_eq!(reopened.revoked_sessions(), vec![live]);
    }

    #[tokio::test]
    async fn test_handle_runs_closures() {
        let handle = DbHandle::new(seeded());
        let teams = handle.call(|db| Ok(db.list_teams())).await.unwrap();
        assert_eq!(teams.len(), 4);
    }
}
