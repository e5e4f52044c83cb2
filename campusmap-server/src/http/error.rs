//! Mapping of failures onto HTTP responses.

use axum::{
    Json,
    extract::rejection::QueryRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use campusmap_core::{QueryError, TagFilterError, engine::ReloadError};
use thiserror::Error;
use tokio::task::JoinError;
use tracing::{error, warn};

use super::dto::ErrorBody;

/// Any failure a handler can report.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The query itself failed.
    #[error(transparent)]
    Query(#[from] QueryError),
    /// Request parameters were missing or malformed.
    #[error("{0}")]
    BadRequest(String),
    /// An administrative reload failed; the previous generation stays live.
    #[error(transparent)]
    Reload(#[from] ReloadError),
    /// A worker task panicked or was cancelled.
    #[error("worker task failed: {0}")]
    Worker(#[from] JoinError),
    /// The engine answered with an output of the wrong shape.
    #[error("unexpected {0} output")]
    Internal(&'static str),
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<TagFilterError> for ApiError {
    fn from(err: TagFilterError) -> Self {
        Self::BadRequest(format!("tag: {err}"))
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Query(err) => match err {
                QueryError::NotReady | QueryError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
                QueryError::NoPath
                | QueryError::BuildingNotFound { .. }
                | QueryError::RoomNotFound { .. } => StatusCode::NOT_FOUND,
                QueryError::UnreachablePoint { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                QueryError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                QueryError::InvalidArgument { .. } => StatusCode::BAD_REQUEST,
            },
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Reload(_) | Self::Worker(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Query(err) => match err {
                QueryError::NotReady => "not_ready",
                QueryError::NoPath => "no_path",
                QueryError::UnreachablePoint { .. } => "unreachable_point",
                QueryError::Timeout { .. } => "timeout",
                QueryError::Cancelled => "cancelled",
                QueryError::InvalidArgument { .. } => "invalid_argument",
                QueryError::BuildingNotFound { .. } => "building_not_found",
                QueryError::RoomNotFound { .. } => "room_not_found",
            },
            Self::BadRequest(_) => "bad_request",
            Self::Reload(_) => "reload_failed",
            Self::Worker(_) | Self::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let stage = match &self {
            Self::Reload(err) => Some(err.stage().to_string()),
            _ => None,
        };
        match status {
            StatusCode::GATEWAY_TIMEOUT | StatusCode::SERVICE_UNAVAILABLE => {
                warn!(kind = self.kind(), "{self}");
            }
            _ if status.is_server_error() => error!(kind = self.kind(), "{self}"),
            _ => {}
        }
        let body = ErrorBody {
            error: self.to_string(),
            kind: self.kind(),
            stage,
        };
        (status, Json(body)).into_response()
    }
}
