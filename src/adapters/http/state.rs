use std::sync::Arc;

use crate::application::services::{DetectionService, ReportService};

/// Estado compartido para los manejadores HTTP de Axum.
/// Contiene los casos de uso; los adaptadores concretos quedan detrás de ellos.
#[derive(Clone)]
pub struct HttpState {
    /// Orquestador de detecciones (validación, inferencia, anotación, limpieza).
    pub detection: Arc<DetectionService>,
    /// Compositor de informes PDF.
    pub reports: Arc<ReportService>,
}
