use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::warn;

/// Every failure the shop backend reports, auth and bad ids included, comes
/// back as 500 with `{message, stack}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("There is no token attached to header")]
    MissingToken,
    #[error("Not Authorized token expired, Please Login again")]
    InvalidToken,
    #[error("You are not an admin")]
    NotAdmin,
    #[error("This id is not valid or not Found")]
    InvalidId,
    #[error("Invalid Credentials")]
    InvalidCredentials,
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Database(#[from] anyhow::Error),
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ApiError::Validation(msg.into())
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub message: String,
    pub stack: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        if let ApiError::Database(e) = &self {
            warn!(error = %e, "request failed");
        }

        let body = Json(ErrorResponse {
            message,
            stack: None,
        });

        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Unknown route, the only non-500 failure.
pub async fn not_found(uri: axum::http::Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            message: format!("Not Found : {}", uri.path()),
            stack: None,
        }),
    )
}
