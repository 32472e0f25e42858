use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

id_type!(
    /// Opaque identifier of a maintenance request, assigned by the API.
    RequestId
);
id_type!(EquipmentId);
id_type!(TeamId);
id_type!(UserId);

/// Board lane a request sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestStatus {
    New,
    #[serde(rename = "In Progress")]
    InProgress,
    Completed,
    #[serde(rename = "On Hold")]
    OnHold,
    Scrap,
}

impl RequestStatus {
    /// Lane order on the board.
    pub const ALL: [RequestStatus; 5] = [
        Self::New,
        Self::InProgress,
        Self::Completed,
        Self::OnHold,
        Self::Scrap,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "New",
            Self::InProgress => "In Progress",
            Self::Completed => "Completed",
            Self::OnHold => "On Hold",
            Self::Scrap => "Scrap",
        }
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts the wire form ("In Progress") as well as CLI-friendly spellings
/// ("in-progress", "in_progress", "inprogress"), case-insensitively.
impl FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "new" => Ok(Self::New),
            "inprogress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "onhold" => Ok(Self::OnHold),
            "scrap" => Ok(Self::Scrap),
            _ => Err(format!("Invalid status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Self::High, Self::Medium, Self::Low];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            _ => Err(format!("Invalid priority: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestType {
    Corrective,
    Preventive,
}

impl RequestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Corrective => "Corrective",
            Self::Preventive => "Preventive",
        }
    }
}

impl std::fmt::Display for RequestType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "corrective" => Ok(Self::Corrective),
            "preventive" => Ok(Self::Preventive),
            _ => Err(format!("Invalid request type: {}", s)),
        }
    }
}

fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| !matches!(c, ' ' | '-' | '_'))
        .flat_map(char::to_lowercase)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceRequest {
    pub id: RequestId,
    pub subject: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub kind: RequestType,
    pub priority: Priority,
    pub status: RequestStatus,
    pub equipment_id: EquipmentId,
    pub team_id: TeamId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technician_id: Option<UserId>,
    /// Only meaningful for preventive requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_date: Option<NaiveDate>,
    /// Hours spent on the request, once recorded.
    #[serde(default, rename = "duration", skip_serializing_if = "Option::is_none")]
    pub duration_hours: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

/// Field changes for `PUT requests/{id}`. Absent fields are left untouched.
///
/// Optional attributes use a nested `Option`: `Some(None)` clears the value,
/// `None` leaves it as is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<RequestType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RequestStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equipment_id: Option<EquipmentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<TeamId>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "double_option"
    )]
    pub technician_id: Option<Option<UserId>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "double_option"
    )]
    pub scheduled_date: Option<Option<NaiveDate>>,
    #[serde(
        default,
        rename = "duration",
        skip_serializing_if = "Option::is_none",
        with = "double_option"
    )]
    pub duration_hours: Option<Option<f64>>,
}

impl RequestPatch {
    pub fn status(status: RequestStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Every editable field of `record`, as sent by the detail-view save.
    pub fn full(record: &MaintenanceRequest) -> Self {
        Self {
            subject: Some(record.subject.clone()),
            description: Some(record.description.clone()),
            kind: Some(record.kind),
            priority: Some(record.priority),
            status: Some(record.status),
            equipment_id: Some(record.equipment_id.clone()),
            team_id: Some(record.team_id.clone()),
            technician_id: Some(record.technician_id.clone()),
            scheduled_date: Some(record.scheduled_date),
            duration_hours: Some(record.duration_hours),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merge these changes into `record`. Identity and `createdAt` never change.
    pub fn apply_to(&self, record: &mut MaintenanceRequest) {
        if let Some(subject) = &self.subject {
            record.subject = subject.clone();
        }
        if let Some(description) = &self.description {
            record.description = description.clone();
        }
        if let Some(kind) = self.kind {
            record.kind = kind;
        }
        if let Some(priority) = self.priority {
            record.priority = priority;
        }
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(equipment_id) = &self.equipment_id {
            record.equipment_id = equipment_id.clone();
        }
        if let Some(team_id) = &self.team_id {
            record.team_id = team_id.clone();
        }
        if let Some(technician_id) = &self.technician_id {
            record.technician_id = technician_id.clone();
        }
        if let Some(scheduled_date) = self.scheduled_date {
            record.scheduled_date = scheduled_date;
        }
        if let Some(duration_hours) = self.duration_hours {
            record.duration_hours = duration_hours;
        }
    }
}

/// Draft submitted by the Create flow (`POST requests`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRequest {
    pub subject: String,
    pub description: String,
    pub equipment_id: EquipmentId,
    #[serde(rename = "type")]
    pub kind: RequestType,
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technician_id: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<TeamId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Equipment {
    pub id: EquipmentId,
    pub name: String,
    pub serial_number: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub department: String,
    pub maintenance_team_id: TeamId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
}

/// A user as exposed by the API; technicians are drawn from this directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Technician {
    pub id: UserId,
    pub name: String,
    #[serde(default)]
    pub email: String,
}

/// Response envelope wrapping every API payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEnvelope<T> {
    pub status_code: u16,
    pub success: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub message: String,
}

impl<T> ApiEnvelope<T> {
    pub fn ok(status_code: u16, data: T, message: impl Into<String>) -> Self {
        Self {
            status_code,
            success: true,
            data: Some(data),
            message: message.into(),
        }
    }
}

impl ApiEnvelope<()> {
    pub fn failure(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            status_code,
            success: false,
            data: None,
            message: message.into(),
        }
    }
}

/// Payload of a successful login or signup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub user: Technician,
    pub token: String,
}

/// Serde helper distinguishing an absent field from an explicit `null`.
mod double_option {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<T, S>(value: &Option<Option<T>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Serialize,
        S: Serializer,
    {
        match value {
            Some(inner) => inner.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::request;
    use super::*;

    #[test]
    fn test_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&RequestStatus::InProgress).unwrap(),
            "\"In Progress\""
        );
        assert_eq!(
            serde_json::from_str::<RequestStatus>("\"On Hold\"").unwrap(),
            RequestStatus::OnHold
        );
        assert!(serde_json::from_str::<RequestStatus>("\"Repaired\"").is_err());
    }

    #[test]
    fn test_status_from_str_accepts_cli_spellings() {
        for s in &["In Progress", "in-progress", "in_progress", "INPROGRESS"] {
            assert_eq!(s.parse::<RequestStatus>().unwrap(), RequestStatus::InProgress);
        }
        assert!("done".parse::<RequestStatus>().is_err());
    }

    #[test]
    fn test_priority_and_type_from_str() {
        assert_eq!("high".parse::<Priority>().unwrap(), Priority::High);
        assert!("normal".parse::<Priority>().is_err());
        assert_eq!(
            "Preventive".parse::<RequestType>().unwrap(),
            RequestType::Preventive
        );
    }

    #[test]
    fn test_request_uses_camel_case_and_type_key() {
        let json = serde_json::to_value(request("r1", RequestStatus::New, 0)).unwrap();
        assert_eq!(json["type"], "Corrective");
        assert_eq!(json["equipmentId"], "eq-1");
        assert!(json.get("createdAt").is_some());
        assert!(json.get("technicianId").is_none());
    }

    #[test]
    fn test_status_patch_serializes_only_status() {
        let json = serde_json::to_value(RequestPatch::status(RequestStatus::Scrap)).unwrap();
        assert_eq!(json, serde_json::json!({"status": "Scrap"}));
    }

    #[test]
    fn test_patch_distinguishes_null_from_absent() {
        let clear: RequestPatch = serde_json::from_str(r#"{"technicianId": null}"#).unwrap();
        assert_eq!(clear.technician_id, Some(None));

        let absent: RequestPatch = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.technician_id, None);
        assert!(absent.is_empty());
    }

    #[test]
    fn test_patch_apply_merges_fields() {
        let mut record = request("r1", RequestStatus::New, 0);
        record.technician_id = Some(UserId::new("u1"));
        let patch = RequestPatch {
            priority: Some(Priority::High),
            technician_id: Some(None),
            ..RequestPatch::default()
        };
        patch.apply_to(&mut record);
        assert_eq!(record.priority, Priority::High);
        assert_eq!(record.technician_id, None);
        assert_eq!(record.status, RequestStatus::New);
    }

    #[test]
    fn test_full_patch_round_trips_record_fields() {
        let mut original = request("r1", RequestStatus::OnHold, 0);
        original.duration_hours = Some(2.5);
        let mut target = request("r1", RequestStatus::New, 0);
        RequestPatch::full(&original).apply_to(&mut target);
        assert_eq!(target, original);
    }

    #[test]
    fn test_envelope_failure_has_null_data() {
        let json = serde_json::to_value(ApiEnvelope::failure(404, "missing")).unwrap();
        assert_eq!(json["success"], false);
        assert!(json["data"].is_null());
        assert_eq!(json["statusCode"], 404);
    }
}
