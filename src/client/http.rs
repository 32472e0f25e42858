use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;

use super::{AuthApi, ReferenceApi, RequestApi};
use crate::errors::ClientError;
use crate::models::{
    ApiEnvelope, AuthSession, Equipment, MaintenanceRequest, NewRequest, RequestId, RequestPatch,
    Team, Technician,
};

/// `reqwest`-backed client for the GearGuard REST API.
///
/// `base_url` is the API root including the version prefix, e.g.
/// `http://localhost:3000/api/v1`. Clones share the same session token.
#[derive(Clone)]
pub struct HttpClient {
    http: reqwest::Client,
    base_url: String,
    token: Arc<RwLock<Option<String>>>,
}

impl HttpClient {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ClientError::Network(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: Arc::new(RwLock::new(None)),
        })
    }

    pub fn with_token(self, token: Option<String>) -> Self {
        self.set_token(token);
        self
    }

    pub fn token(&self) -> Option<String> {
        self.token.read().ok().and_then(|guard| guard.clone())
    }

    pub fn set_token(&self, token: Option<String>) {
        if let Ok(mut guard) = self.token.write() {
            *guard = token;
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<ApiEnvelope<T>, ClientError> {
        let response = self.authorize(builder).send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if status.is_success() {
            return serde_json::from_slice::<ApiEnvelope<T>>(&body)
                .map_err(|e| ClientError::Decode(e.to_string()));
        }

        let message = serde_json::from_slice::<ApiEnvelope<serde_json::Value>>(&body)
            .map(|envelope| envelope.message)
            .unwrap_or_else(|_| String::from_utf8_lossy(&body).trim().to_string());
        tracing::debug!(status = status.as_u16(), %message, "API call failed");

        Err(match status {
            StatusCode::UNAUTHORIZED => ClientError::Unauthorized(message),
            StatusCode::NOT_FOUND => ClientError::NotFound(message),
            other => ClientError::Rejected {
                status: other.as_u16(),
                message,
            },
        })
    }

    async fn fetch<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ClientError> {
        self.send::<T>(builder)
            .await?
            .data
            .ok_or_else(|| ClientError::Decode("response envelope has no data".to_string()))
    }
}

#[async_trait]
impl RequestApi for HttpClient {
    async fn list_requests(&self) -> Result<Vec<MaintenanceRequest>, ClientError> {
        self.fetch(self.http.get(self.url("core/requests"))).await
    }

    async fn create_request(&self, draft: &NewRequest) -> Result<MaintenanceRequest, ClientError> {
        self.fetch(self.http.post(self.url("core/requests")).json(draft))
            .await
    }

    async fn update_request(
        &self,
        id: &RequestId,
        changes: &RequestPatch,
    ) -> Result<MaintenanceRequest, ClientError> {
        let url = self.url(&format!("core/requests/{}", id));
        self.fetch(self.http.put(url).json(changes)).await
    }

    async fn delete_request(&self, id: &RequestId) -> Result<(), ClientError> {
        let url = self.url(&format!("core/requests/{}", id));
        self.send::<serde_json::Value>(self.http.delete(url))
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl ReferenceApi for HttpClient {
    async fn list_equipment(&self) -> Result<Vec<Equipment>, ClientError> {
        self.fetch(self.http.get(self.url("core/equipment"))).await
    }

    async fn list_teams(&self) -> Result<Vec<Team>, ClientError> {
        self.fetch(self.http.get(self.url("core/teams"))).await
    }

    async fn list_technicians(&self) -> Result<Vec<Technician>, ClientError> {
        self.fetch(self.http.get(self.url("users"))).await
    }
}

#[async_trait]
impl AuthApi for HttpClient {
    async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, ClientError> {
        let body = json!({"name": name, "email": email, "password": password});
        let session: AuthSession = self
            .fetch(self.http.post(self.url("auth/register")).json(&body))
            .await?;
        self.set_token(Some(session.token.clone()));
        Ok(session)
    }

    async fn login(&self, email: &str, password: &str) -> Result<AuthSession, ClientError> {
        let body = json!({"email": email, "password": password});
        let session: AuthSession = self
            .fetch(self.http.post(self.url("auth/login")).json(&body))
            .await?;
        self.set_token(Some(session.token.clone()));
        Ok(session)
    }

    async fn logout(&self) -> Result<(), ClientError> {
        let result = self
            .send::<serde_json::Value>(self.http.post(self.url("auth/logout")))
            .await
            .map(|_| ());
        self.set_token(None);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_without_double_slashes() {
        let client = HttpClient::new("http://localhost:3000/api/v1/", Duration::from_secs(1))
            .unwrap();
        assert_eq!(client.base_url(), "http://localhost:3000/api/v1");
        assert_eq!(
            client.url("/core/requests"),
            "http://localhost:3000/api/v1/core/requests"
        );
    }

    #[test]
    fn test_token_is_shared_between_clones() {
        let client = HttpClient::new("http://localhost", Duration::from_secs(1)).unwrap();
        let other = client.clone();
        client.set_token(Some("abc".into()));
        assert_eq!(other.token().as_deref(), Some("abc"));
        other.set_token(None);
        assert!(client.token().is_none());
    }

    #[tokio::test]
    async fn test_unreachable_server_is_a_network_failure() {
        // Port 9 (discard) on localhost is closed in test environments.
        let client = HttpClient::new("http://127.0.0.1:9/api/v1", Duration::from_secs(2)).unwrap();
        let err = client.list_requests().await.unwrap_err();
        assert!(matches!(err, ClientError::Network(_)), "got {:?}", err);
    }
}
