use axum::{
    Json,
    extract::rejection::QueryRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::models::ErrorBody;

/// ApiError
///
/// The boundary error taxonomy. Every variant maps to one status code and a
/// `{"error": <message>}` body; internal causes are logged where they happen and
/// never reach the client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// No session, or the session is no longer valid.
    #[error("Unauthorized")]
    Unauthorized,
    /// The request body failed validation.
    #[error("{0}")]
    InvalidInput(&'static str),
    /// The addressed resource does not exist.
    #[error("{0}")]
    NotFound(&'static str),
    /// Authenticated, but not the owner of the resource.
    #[error("Forbidden")]
    Forbidden,
    /// An upstream identity provider misbehaved.
    #[error("Bad Gateway")]
    BadGateway,
    /// Unexpected persistence or transport failure.
    #[error("Internal Server Error")]
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::BadGateway => StatusCode::BAD_GATEWAY,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Logs `cause` under an operation tag and collapses it into `Internal`.
    pub fn internal(tag: &str, cause: impl std::fmt::Debug) -> Self {
        tracing::error!("[{}] {:?}", tag, cause);
        ApiError::Internal
    }
}

/// Malformed query strings answer with the usual `{"error"}` body instead of
/// axum's plain-text rejection.
impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        tracing::debug!("query rejected: {}", rejection.body_text());
        ApiError::InvalidInput("Invalid query")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
