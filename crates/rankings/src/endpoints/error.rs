use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rankings_service::caching::ComputationFailed;
use rankings_service::services::GenerateError;
use sentry::integrations::anyhow::capture_anyhow;

#[derive(Debug)]
pub struct ResponseError {
    status: StatusCode,
    err: anyhow::Error,
}

impl ResponseError {
    /// The full chain of causes, e.g. `ranking computation failed: failed to load records: ...`.
    fn message(&self) -> String {
        self.err
            .chain()
            .map(|err| err.to_string())
            .collect::<Vec<_>>()
            .join(": ")
    }
}

impl From<ComputationFailed> for ResponseError {
    fn from(err: ComputationFailed) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            err: err.into(),
        }
    }
}

impl From<GenerateError> for ResponseError {
    fn from(err: GenerateError) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            err: err.into(),
        }
    }
}

impl From<(StatusCode, anyhow::Error)> for ResponseError {
    fn from((status, err): (StatusCode, anyhow::Error)) -> Self {
        Self { status, err }
    }
}

impl From<anyhow::Error> for ResponseError {
    fn from(err: anyhow::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            err,
        }
    }
}

impl IntoResponse for ResponseError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            capture_anyhow(&self.err);
        }
        (self.status, self.message()).into_response()
    }
}
