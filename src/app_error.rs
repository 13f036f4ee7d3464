use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Envelope every endpoint answers with, successful or not.
#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct StdResponse<T, M> {
    pub data: Option<T>,
    pub message: Option<M>,
}

impl<T, M> IntoResponse for StdResponse<T, M>
where
    T: Serialize,
    M: Serialize,
{
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Missing or invalid credentials")]
    Unauthorized,

    #[error("{0}")]
    ForbiddenResource(String),

    #[error("Resource not found")]
    NotFound,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0} is unreachable")]
    ServiceUnreachable(String),

    #[error(transparent)]
    Other(anyhow::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::ForbiddenResource(_) => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnreachable(_) => StatusCode::BAD_GATEWAY,
            AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Errors raised as `AppError` deep inside an `anyhow` chain keep their
/// classification; everything else is an internal error.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<AppError>() {
            Ok(app_error) => app_error,
            Err(err) => AppError::Other(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            AppError::Other(err) => {
                tracing::error!("Request failed: {:#}", err);
                "Something went wrong, please try again".to_string()
            }
            AppError::ServiceUnreachable(service) => {
                tracing::warn!("{} is unreachable", service);
                self.to_string()
            }
            _ => self.to_string(),
        };

        (
            status,
            Json(StdResponse::<(), String> {
                data: None,
                message: Some(message),
            }),
        )
            .into_response()
    }
}
