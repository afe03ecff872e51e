//! API error types with HTTP response mapping.

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::ShopError;
use serde::Serialize;

const INTERNAL_MESSAGE: &str = "Errore interno del server";
const VALIDATION_MESSAGE: &str = "Errori di validazione";

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// A business rule refused the request.
    Business(String),
    /// Malformed or unusable input.
    BadRequest(String),
    /// Field validation failed.
    Validation(Vec<String>),
    /// Resource not found.
    NotFound(String),
    /// The route needs an authenticated user.
    Unauthorized,
    /// Internal server error. The detail is logged, never returned.
    Internal(String),
}

/// Error body shared by every failing route.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
}

impl ErrorBody {
    fn new(message: impl Into<String>, errors: Option<Vec<String>>) -> Self {
        Self {
            success: false,
            message: message.into(),
            errors,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Business(msg) => (StatusCode::BAD_REQUEST, ErrorBody::new(msg, None)),
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorBody::new(format!("Richiesta non valida: {msg}"), None),
            ),
            ApiError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                ErrorBody::new(VALIDATION_MESSAGE, Some(errors)),
            ),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, ErrorBody::new(msg, None)),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                ErrorBody::new("Autenticazione richiesta", None),
            ),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody::new(INTERNAL_MESSAGE, None),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<ShopError> for ApiError {
    fn from(err: ShopError) -> Self {
        match err {
            ShopError::Business(msg) => ApiError::Business(msg),
            ShopError::InvalidInput(msg) => ApiError::BadRequest(msg),
            ShopError::Validation(errors) => ApiError::Validation(errors),
            ShopError::NotFound(msg) => ApiError::NotFound(msg),
            err @ (ShopError::Store(_) | ShopError::Internal(_)) => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use store::StoreError;

    async fn render(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn business_failure_is_bad_request() {
        let (status, body) = render(ShopError::business("Carrello vuoto").into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Carrello vuoto");
        assert!(body.get("errors").is_none());
    }

    #[tokio::test]
    async fn input_failure_is_prefixed() {
        let (status, body) = render(ShopError::invalid_input("Utente non trovato").into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Richiesta non valida: Utente non trovato");
    }

    #[tokio::test]
    async fn validation_lists_messages() {
        let err = ShopError::Validation(vec!["Nome è obbligatorio".into()]);
        let (status, body) = render(err.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Errori di validazione");
        assert_eq!(body["errors"][0], "Nome è obbligatorio");
    }

    #[tokio::test]
    async fn internal_details_are_hidden() {
        let err = ShopError::Store(StoreError::Unavailable("pool exhausted".into()));
        let (status, body) = render(err.into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Errore interno del server");
    }
}
