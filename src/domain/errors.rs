use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error de validación asociado a un campo concreto de la petición.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self { field: field.into(), message: message.into() }
    }
}

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("No encontrado: {0}")]
    NotFound(String),
    #[error("Validación fallida: {}", summarize(.0))]
    Validation(Vec<FieldError>),
    #[error("{0}")]
    Processing(String),
}

impl DomainError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        DomainError::Validation(vec![FieldError::new(field, message)])
    }

    /// Envuelve un fallo de infraestructura con su contexto.
    pub fn processing(context: &str, cause: impl std::fmt::Display) -> Self {
        DomainError::Processing(format!("{context}: {cause}"))
    }
}

fn summarize(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

pub type DomainResult<T> = Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_display_lists_every_field() {
        let err = DomainError::Validation(vec![
            FieldError::new("filename", "bad extension"),
            FieldError::new("size", "too large"),
        ]);
        assert_eq!(
            err.to_string(),
            "Validación fallida: filename: bad extension; size: too large"
        );
    }

    #[test]
    fn not_found_display_is_prefixed() {
        let err = DomainError::NotFound("modelo.onnx".into());
        assert_eq!(err.to_string(), "No encontrado: modelo.onnx");
    }

    #[test]
    fn processing_keeps_the_cause() {
        let err = DomainError::processing("inference failed", "tensor shape mismatch");
        assert_eq!(err.to_string(), "inference failed: tensor shape mismatch");
    }
}
