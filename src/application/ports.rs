use async_trait::async_trait;
use std::path::Path;

use crate::application::layout::{ReportLayout, TextMeasure};
use crate::domain::{detection::Detection, errors::DomainResult, model::ModelId};

/// Detector compartido por todo el proceso. Sus llamadas son bloqueantes
/// (CPU/GPU) y deben ejecutarse fuera del bucle asíncrono.
pub trait DetectorPort: Send + Sync {
    /// Dispositivo elegido al construir el detector ("cuda" o "cpu").
    fn device(&self) -> &str;
    fn predict(&self, image_path: &Path) -> DomainResult<Vec<Detection>>;
    /// Dibuja las detecciones sobre la imagen y la guarda en `output_path`.
    fn annotate(&self, image_path: &Path, detections: &[Detection], output_path: &Path) -> DomainResult<()>;
}

#[async_trait]
pub trait ModelCatalogPort: Send + Sync {
    async fn validate_model(&self, model: &ModelId) -> DomainResult<()>;
}

/// Dibuja un `ReportLayout` ya paginado y lo persiste en `output_path`.
pub trait ReportRendererPort: Send + Sync {
    /// Métricas de la fuente con la que se dibuja el texto.
    fn text_measure(&self) -> &dyn TextMeasure;
    fn render(&self, layout: &ReportLayout, image_bytes: &[u8], output_path: &Path) -> DomainResult<()>;
}
