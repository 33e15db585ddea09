use crate::{addr::MacParseError, api::MessageResponse};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::path::PathBuf;
use thiserror::Error;

/// Underlying cause of a failed map operation.
pub type SlotError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("load pinned map from userspace before you use")]
    NotLoaded,

    #[error("map already loaded")]
    AlreadyLoaded,

    #[error("load pinned map {}: {source}", path.display())]
    LoadFailure {
        path: PathBuf,
        #[source]
        source: SlotError,
    },

    #[error("servers can't be empty")]
    EmptyInput,

    #[error("invalid mac {mac} address, {source}")]
    InvalidMac {
        mac: String,
        #[source]
        source: MacParseError,
    },

    #[error("lookup map of key {index}: {source}")]
    SlotReadFailure {
        index: u32,
        #[source]
        source: SlotError,
    },

    #[error("update key {index}: {source}")]
    SlotWriteFailure {
        index: u32,
        #[source]
        source: SlotError,
    },
}

/// Failures reported by the HTTP control surface. Every failure has the
/// same status and the body only carries a message.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Table(#[from] TableError),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        (self.status_code(), Json(MessageResponse { message })).into_response()
    }
}
