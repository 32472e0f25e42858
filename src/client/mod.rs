//! Remote collaborators of the client core.
//!
//! The executor and the reference catalog only see these traits. `HttpClient`
//! is the real implementation; tests substitute in-memory doubles.

pub mod http;
pub mod reference;

use async_trait::async_trait;

use crate::errors::ClientError;
use crate::models::{
    AuthSession, Equipment, MaintenanceRequest, NewRequest, RequestId, RequestPatch, Team,
    Technician,
};

pub use http::HttpClient;
pub use reference::{CachedCatalog, ReferenceCatalog};

/// The authenticated Request API.
#[async_trait]
pub trait RequestApi: Send + Sync {
    async fn list_requests(&self) -> Result<Vec<MaintenanceRequest>, ClientError>;

    async fn create_request(&self, draft: &NewRequest) -> Result<MaintenanceRequest, ClientError>;

    async fn update_request(
        &self,
        id: &RequestId,
        changes: &RequestPatch,
    ) -> Result<MaintenanceRequest, ClientError>;

    async fn delete_request(&self, id: &RequestId) -> Result<(), ClientError>;
}

/// Read-only equipment, team and technician directories.
#[async_trait]
pub trait ReferenceApi: Send + Sync {
    async fn list_equipment(&self) -> Result<Vec<Equipment>, ClientError>;

    async fn list_teams(&self) -> Result<Vec<Team>, ClientError>;

    async fn list_technicians(&self) -> Result<Vec<Technician>, ClientError>;
}

/// Credential service. Issues the bearer token the other APIs require.
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, ClientError>;

    async fn login(&self, email: &str, password: &str) -> Result<AuthSession, ClientError>;

    async fn logout(&self) -> Result<(), ClientError>;
}
