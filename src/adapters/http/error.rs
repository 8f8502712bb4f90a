use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::domain::errors::{DomainError, FieldError};

/// Traducción única de errores a respuestas HTTP.
#[derive(Debug)]
pub enum ApiError {
    Domain(DomainError),
    /// Cuerpo ausente o mal formado (422).
    Unprocessable(Vec<FieldError>),
}

impl ApiError {
    pub fn unprocessable(field: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::Unprocessable(vec![FieldError::new(field, message)])
    }
}

impl From<DomainError> for ApiError {
    fn from(e: DomainError) -> Self {
        ApiError::Domain(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unprocessable(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({
                    "detail": "Request validation failed",
                    "errors": errors,
                    "timestamp": chrono::Local::now().naive_local().to_string(),
                })),
            )
                .into_response(),
            ApiError::Domain(DomainError::Validation(errors)) => (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "detail": "Invalid image upload",
                    "errors": errors,
                })),
            )
                .into_response(),
            ApiError::Domain(DomainError::NotFound(what)) => {
                (StatusCode::NOT_FOUND, Json(json!({ "detail": what }))).into_response()
            }
            // Los servicios ya registran el fallo con el contexto de la petición.
            ApiError::Domain(DomainError::Processing(cause)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "detail": format!("Internal server error: {cause}") })),
            )
                .into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_the_error_kind() {
        let cases = [
            (ApiError::from(DomainError::invalid("size", "too big")), StatusCode::BAD_REQUEST),
            (ApiError::unprocessable("file", "Field required"), StatusCode::UNPROCESSABLE_ENTITY),
            (ApiError::from(DomainError::NotFound("x".into())), StatusCode::NOT_FOUND),
            (ApiError::from(DomainError::Processing("boom".into())), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[tokio::test]
    async fn processing_error_body_carries_the_cause() {
        let resp = ApiError::from(DomainError::processing("inference failed", "bad tensor")).into_response();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["detail"], "Internal server error: inference failed: bad tensor");
    }
}
