use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::OnceCell;

use super::ReferenceApi;
use crate::errors::ClientError;
use crate::models::{Equipment, EquipmentId, Team, TeamId, Technician, UserId};

/// Equipment, team and technician directories, indexed by id.
#[derive(Debug, Clone, Default)]
pub struct ReferenceCatalog {
    equipment: Vec<Equipment>,
    teams: Vec<Team>,
    technicians: Vec<Technician>,
    equipment_index: HashMap<EquipmentId, usize>,
    team_index: HashMap<TeamId, usize>,
    technician_index: HashMap<UserId, usize>,
}

impl ReferenceCatalog {
    pub fn new(equipment: Vec<Equipment>, teams: Vec<Team>, technicians: Vec<Technician>) -> Self {
        let equipment_index = equipment
            .iter()
            .enumerate()
            .map(|(i, e)| (e.id.clone(), i))
            .collect();
        let team_index = teams
            .iter()
            .enumerate()
            .map(|(i, t)| (t.id.clone(), i))
            .collect();
        let technician_index = technicians
            .iter()
            .enumerate()
            .map(|(i, t)| (t.id.clone(), i))
            .collect();
        Self {
            equipment,
            teams,
            technicians,
            equipment_index,
            team_index,
            technician_index,
        }
    }

    /// Fetch all three directories concurrently.
    pub async fn fetch(api: &dyn ReferenceApi) -> Result<Self, ClientError> {
        let (equipment, teams, technicians) = tokio::try_join!(
            api.list_equipment(),
            api.list_teams(),
            api.list_technicians()
        )?;
        tracing::debug!(
            equipment = equipment.len(),
            teams = teams.len(),
            technicians = technicians.len(),
            "loaded reference data"
        );
        Ok(Self::new(equipment, teams, technicians))
    }

    pub fn equipment(&self) -> &[Equipment] {
        &self.equipment
    }

    pub fn teams(&self) -> &[Team] {
        &self.teams
    }

    pub fn technicians(&self) -> &[Technician] {
        &self.technicians
    }

    pub fn equipment_by_id(&self, id: &EquipmentId) -> Option<&Equipment> {
        self.equipment_index.get(id).map(|&i| &self.equipment[i])
    }

    pub fn team_by_id(&self, id: &TeamId) -> Option<&Team> {
        self.team_index.get(id).map(|&i| &self.teams[i])
    }

    pub fn technician_by_id(&self, id: &UserId) -> Option<&Technician> {
        self.technician_index.get(id).map(|&i| &self.technicians[i])
    }

    pub fn team_name(&self, id: &TeamId) -> Option<&str> {
        self.team_by_id(id).map(|t| t.name.as_str())
    }

    /// Equipment whose name or serial number contains `term`, case-insensitively.
    pub fn search_equipment(&self, term: &str) -> Vec<&Equipment> {
        let needle = term.to_lowercase();
        self.equipment
            .iter()
            .filter(|e| {
                needle.is_empty()
                    || e.name.to_lowercase().contains(&needle)
                    || e.serial_number.to_lowercase().contains(&needle)
            })
            .collect()
    }
}

/// Fetches the catalog once and hands out the same copy afterwards.
pub struct CachedCatalog {
    api: Arc<dyn ReferenceApi>,
    cell: OnceCell<Arc<ReferenceCatalog>>,
}

impl CachedCatalog {
    pub fn new(api: Arc<dyn ReferenceApi>) -> Self {
        Self {
            api,
            cell: OnceCell::new(),
        }
    }

    /// A failed fetch is not cached; the next call retries.
    pub async fn get(&self) -> Result<Arc<ReferenceCatalog>, ClientError> {
        self.cell
            .get_or_try_init(|| async {
                ReferenceCatalog::fetch(self.api.as_ref()).await.map(Arc::new)
            })
            .await
            .cloned()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn catalog() -> ReferenceCatalog {
        ReferenceCatalog::new(
            vec![
                Equipment {
                    id: EquipmentId::new("eq-1"),
                    name: "HP LaserJet Pro M404n".into(),
                    serial_number: "SN-2024-001".into(),
                    location: "Office Floor 2".into(),
                    department: "IT".into(),
                    maintenance_team_id: TeamId::new("team-1"),
                },
                Equipment {
                    id: EquipmentId::new("eq-2"),
                    name: "HVAC Unit A-101".into(),
                    serial_number: "SN-2024-002".into(),
                    location: "Building A".into(),
                    department: "Facilities".into(),
                    maintenance_team_id: TeamId::new("team-2"),
                },
            ],
            vec![
                Team {
                    id: TeamId::new("team-1"),
                    name: "IT Support".into(),
                },
                Team {
                    id: TeamId::new("team-2"),
                    name: "Facilities".into(),
                },
            ],
            vec![Technician {
                id: UserId::new("u-1"),
                name: "Maria Lopez".into(),
                email: "maria@example.com".into(),
            }],
        )
    }
}
