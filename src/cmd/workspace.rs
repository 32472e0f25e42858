use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use gearguard::client::{CachedCatalog, HttpClient, ReferenceCatalog};
use gearguard::config::{self, GearGuardConfig};
use gearguard::errors::MutationError;
use gearguard::executor::MutationExecutor;
use gearguard::models::RequestId;
use gearguard::store::StoreHandle;

/// Everything a request command needs: the client, the store it fills and
/// the executor that mutates it.
pub struct Workspace {
    pub client: HttpClient,
    pub executor: MutationExecutor,
    catalog: CachedCatalog,
}

impl Workspace {
    pub fn connect(config: &GearGuardConfig) -> Result<Self> {
        config.toml.ensure_valid()?;
        let token = config
            .token
            .clone()
            .or_else(|| config::session_path().and_then(|path| config::load_session(&path)));
        let client = HttpClient::new(config.api_url(), config.request_timeout())
            .context("Failed to create API client")?
            .with_token(token);

        let executor = MutationExecutor::new(Arc::new(client.clone()), StoreHandle::default())
            .with_timeout(config.mutation_timeout());
        let catalog = CachedCatalog::new(Arc::new(client.clone()));
        Ok(Self {
            client,
            executor,
            catalog,
        })
    }

    pub async fn catalog(&self) -> Result<Arc<ReferenceCatalog>> {
        self.catalog
            .get()
            .await
            .with_context(|| format!("Failed to load reference data from {}", self.client.base_url()))
    }

    /// Fetch reference data and all requests.
    pub async fn load(&self) -> Result<Arc<ReferenceCatalog>> {
        let (catalog, refresh) = tokio::join!(self.catalog(), self.executor.refresh());
        refresh.map_err(explain)?;
        catalog
    }

    /// Accept a full id or a unique prefix of one.
    pub fn resolve(&self, id: &str) -> Result<RequestId> {
        let (records, _) = self.executor.store().snapshot();
        if records.iter().any(|r| r.id.as_str() == id) {
            return Ok(RequestId::new(id));
        }
        let mut matches = records.iter().filter(|r| r.id.as_str().starts_with(id));
        match (matches.next(), matches.next()) {
            (Some(only), None) => Ok(only.id.clone()),
            (Some(_), Some(_)) => bail!("Request id prefix '{}' is ambiguous", id),
            (None, _) => bail!("No request with id '{}'", id),
        }
    }
}

pub fn session_file() -> Result<PathBuf> {
    config::session_path().context("Could not determine the user config directory")
}

/// Turn executor failures into CLI errors with a hint where one helps.
pub fn explain(err: MutationError) -> anyhow::Error {
    match err {
        MutationError::Unauthorized => {
            anyhow!("{}. Run `gearguard login` first.", MutationError::Unauthorized)
        }
        other if other.is_network_failure() => {
            anyhow!("{}. Is the API server running? (`gearguard serve`)", other)
        }
        other => anyhow::Error::new(other),
    }
}
