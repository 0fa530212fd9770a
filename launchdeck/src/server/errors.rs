//! Mapping of crate errors onto HTTP responses

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    response::{IntoResponse, Response},
    Json,
};
use http::StatusCode;
use openapi_models::ErrorBody;
use tracing::error;

use crate::errors::DeckError;

/// Error returned by every handler
#[derive(Debug)]
pub struct ApiError(pub DeckError);

impl<E> From<E> for ApiError
where
    E: Into<DeckError>,
{
    fn from(err: E) -> Self {
        ApiError(err.into())
    }
}

impl ApiError {
    pub fn from_json_rejection(rejection: JsonRejection) -> Self {
        ApiError(openapi_models::ValidationError::new("body", rejection.body_text()).into())
    }

    pub fn from_query_rejection(rejection: QueryRejection) -> Self {
        ApiError(openapi_models::ValidationError::new("query", rejection.body_text()).into())
    }

    fn parts(&self) -> (StatusCode, &'static str, Option<String>) {
        match &self.0 {
            DeckError::ValidationError(_) | DeckError::Precondition(_) => {
                (StatusCode::BAD_REQUEST, "invalid_input", None)
            }
            DeckError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found", None),
            DeckError::Conflict { suggestion, .. } => {
                (StatusCode::CONFLICT, "conflict", suggestion.clone())
            }
            DeckError::IllegalTransition(_) => {
                (StatusCode::CONFLICT, "illegal_transition", None)
            }
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal", None),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, suggestion) = self.parts();
        let message = match &self.0 {
            DeckError::ValidationError(e) => e.to_string(),
            DeckError::Conflict { message, .. } => message.clone(),
            DeckError::NotFound(m)
            | DeckError::IllegalTransition(m)
            | DeckError::Precondition(m) => m.clone(),
            other => {
                error!("Request failed: {}", other);
                "Internal server error".to_string()
            }
        };

        let body = ErrorBody {
            code: code.to_string(),
            message,
            suggestion,
        };
        (status, Json(body)).into_response()
    }
}
