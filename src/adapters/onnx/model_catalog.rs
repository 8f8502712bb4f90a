use async_trait::async_trait;

use crate::application::ports::ModelCatalogPort;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::model::ModelId;

/// Comprueba que el fichero del modelo existe y es un `.onnx`.
#[derive(Debug, Default)]
pub struct OnnxModelCatalog;

impl OnnxModelCatalog {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ModelCatalogPort for OnnxModelCatalog {
    async fn validate_model(&self, model: &ModelId) -> DomainResult<()> {
        if model.onnx_path.as_os_str().is_empty() {
            return Err(DomainError::invalid("model_path", "must not be empty"));
        }
        let is_onnx = model
            .onnx_path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("onnx"));
        if !is_onnx {
            return Err(DomainError::invalid(
                "model_path",
                format!("expected an .onnx file, got {}", model.onnx_path.display()),
            ));
        }
        match tokio::fs::metadata(&model.onnx_path).await {
            Ok(meta) if meta.is_file() => Ok(()),
            _ => Err(DomainError::NotFound(format!(
                "model file not found: {}",
                model.onnx_path.display()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(path: impl Into<std::path::PathBuf>) -> ModelId {
        ModelId { name: "yolo11n".into(), onnx_path: path.into() }
    }

    #[tokio::test]
    async fn existing_onnx_file_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("best_ppe_model.onnx");
        std::fs::write(&path, b"onnx").unwrap();
        OnnxModelCatalog::new().validate_model(&model(path)).await.unwrap();
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let err = OnnxModelCatalog::new()
            .validate_model(&model("/nonexistent/best.onnx"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[tokio::test]
    async fn wrong_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("best.pt");
        std::fs::write(&path, b"torch").unwrap();
        let err = OnnxModelCatalog::new().validate_model(&model(path)).await.unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
