//! Error kinds shared by the namespace, placement and storage-node operations.
//!
//! Handlers translate a `DfsError` into an HTTP status plus the wire body
//! `{"error": "ERROR: ..."}` so callers always receive a structured payload.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::metadata::types::BlockId;

pub type DfsResult<T> = Result<T, DfsError>;

#[derive(Debug, thiserror::Error)]
pub enum DfsError {
    #[error("{0} could not be found")]
    NotFound(String),

    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("directory {directory} is not empty, it currently contains {files:?}")]
    NotEmpty {
        directory: String,
        files: Vec<String>,
    },

    #[error("{0} is not a known directory, create it first with mkdir")]
    UnknownDirectory(String),

    #[error("{name} is not in directory {directory}")]
    WrongDirectory { name: String, directory: String },

    #[error("blocks are missing from the block map: {0:?}")]
    MissingBlocks(Vec<BlockId>),

    #[error("no live storage nodes are available for placement")]
    NoLiveNodes,

    #[error("node {0} is offline")]
    NodeUnreachable(String),

    /// A peer answered with an error payload; the text is relayed as received.
    #[error("{0}")]
    Rejected(String),

    #[error("malformed request: {0}")]
    Malformed(String),

    #[error("metadata store failure: {0}")]
    Store(String),
}

impl DfsError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            DfsError::NotFound(_) | DfsError::UnknownDirectory(_) => StatusCode::NOT_FOUND,
            DfsError::AlreadyExists(_)
            | DfsError::NotEmpty { .. }
            | DfsError::WrongDirectory { .. } => StatusCode::CONFLICT,
            DfsError::MissingBlocks(_) | DfsError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            DfsError::NoLiveNodes => StatusCode::SERVICE_UNAVAILABLE,
            DfsError::NodeUnreachable(_) | DfsError::Rejected(_) => StatusCode::BAD_GATEWAY,
            DfsError::Malformed(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Text placed in the `error` field of a response body.
    pub fn wire_message(&self) -> String {
        match self {
            DfsError::Rejected(message) if message.starts_with("ERROR: ") => message.clone(),
            _ => format!("ERROR: {}", self),
        }
    }
}

/// Wire form of a failed operation: `{"error": "ERROR: ..."}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for DfsError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }
        (
            status,
            Json(ErrorResponse {
                error: self.wire_message(),
            }),
        )
            .into_response()
    }
}

impl From<serde_json::Error> for DfsError {
    fn from(e: serde_json::Error) -> Self {
        DfsError::Store(format!("invalid JSON value: {}", e))
    }
}

impl From<std::io::Error> for DfsError {
    fn from(e: std::io::Error) -> Self {
        DfsError::Store(e.to_string())
    }
}
