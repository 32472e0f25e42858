//! Typed error hierarchy for GearGuard.
//!
//! - `ClientError`: transport and status failures from the HTTP API client
//! - `MutationError`: outcomes of executor operations, the taxonomy the
//!   presentation layer inspects
//! - `BoardError`: drag-and-drop guard violations
//! - `ConfigError`: configuration loading and validation

use std::time::Duration;

use thiserror::Error;

use crate::models::{EquipmentId, RequestId};

/// Failures talking to the Request API or the Reference Data Service.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Rejected by server ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Network failure: {0}")]
    Network(String),

    #[error("Malformed response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::Decode(err.to_string())
        } else {
            ClientError::Network(err.to_string())
        }
    }
}

/// Outcome of a failed executor operation.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MutationError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Equipment {0} does not exist")]
    UnknownEquipment(EquipmentId),

    #[error("Request {id} no longer exists")]
    NotFound { id: RequestId },

    #[error("Session expired or missing, please log in again")]
    Unauthorized,

    #[error("Network failure: {0}")]
    Network(String),

    #[error("No response after {:.1}s", .after.as_secs_f64())]
    Timeout { after: Duration },

    #[error("Server rejected the change ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Request {id} is already being updated")]
    Busy { id: RequestId },
}

impl MutationError {
    /// Transient failures: the remote state is unknown and a retry may succeed.
    pub fn is_network_failure(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout { .. })
    }

    pub(crate) fn from_client(id: Option<&RequestId>, err: ClientError) -> Self {
        match err {
            ClientError::NotFound(msg) => match id {
                Some(id) => Self::NotFound { id: id.clone() },
                None => Self::Rejected {
                    status: 404,
                    message: msg,
                },
            },
            ClientError::Unauthorized(_) => Self::Unauthorized,
            ClientError::Rejected { status, message } => Self::Rejected { status, message },
            ClientError::Network(msg) => Self::Network(msg),
            ClientError::Decode(msg) => Self::Network(format!("malformed response: {}", msg)),
        }
    }
}

/// Rejected board interactions. Guard failures never reach the network.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BoardError {
    #[error("Request {id} is being updated and cannot be dragged")]
    Updating { id: RequestId },

    #[error("Request {id} is not on the board")]
    UnknownCard { id: RequestId },

    #[error("Already dragging request {id}")]
    AlreadyDragging { id: RequestId },

    #[error("No card is being dragged")]
    NotDragging,

    #[error(transparent)]
    Mutation(#[from] MutationError),
}

/// Errors while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {source}")]
    Read {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: std::path::PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for {key}: {message}")]
    Invalid { key: String, message: String },

    #[error("Invalid configuration: {}", .0.join("; "))]
    Problems(Vec<String>),
}
