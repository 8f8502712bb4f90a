use base64::{prelude::BASE64_STANDARD, Engine};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    application::{
        cleanup::ScopedFiles,
        layout::{compose_layout, PageGeometry},
        ports::{DetectorPort, ReportRendererPort},
    },
    domain::{
        detection::{Detection, DetectionSummary},
        errors::{DomainError, DomainResult},
        report::{ReportId, ReportInput},
        upload::{sanitize_filename, UploadPolicy, UploadedImage},
    },
};

/// Resultado de una petición de detección ya completada.
#[derive(Debug, Clone)]
pub struct DetectionOutcome {
    pub image_id: String,
    pub detections: Vec<Detection>,
    pub summary: DetectionSummary,
    pub annotated_image_base64: String,
}

/// Orquestador de una detección: validar, guardar, inferir, anotar,
/// codificar y limpiar. Ningún fichero temporal sobrevive a la petición.
#[derive(Clone)]
pub struct DetectionService {
    detector: Arc<dyn DetectorPort>,
    policy: UploadPolicy,
    upload_dir: PathBuf,
    results_dir: PathBuf,
}

impl DetectionService {
    pub fn new(
        detector: Arc<dyn DetectorPort>,
        policy: UploadPolicy,
        upload_dir: impl Into<PathBuf>,
        results_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            detector,
            policy,
            upload_dir: upload_dir.into(),
            results_dir: results_dir.into(),
        }
    }

    pub fn device(&self) -> &str {
        self.detector.device()
    }

    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    pub async fn handle_detect(&self, upload: UploadedImage) -> DomainResult<DetectionOutcome> {
        // Validación antes de tocar el disco.
        if let Err(e) = self.policy.validate_upload(&upload) {
            warn!("Subida rechazada ({}): {}", upload.filename, e);
            return Err(e);
        }

        let image_id = format!("{}_{}", Uuid::new_v4(), sanitize_filename(&upload.filename));
        let result = self.process(&image_id, &upload.bytes).await;
        match &result {
            Ok(outcome) => info!(
                "Detección completada para {}: {} objetos ({} con casco, {} sin casco)",
                image_id,
                outcome.detections.len(),
                outcome.summary.helmet_count,
                outcome.summary.no_helmet_count
            ),
            Err(e) => error!("Fallo procesando {}: {}", image_id, e),
        }
        result
    }

    async fn process(&self, image_id: &str, bytes: &[u8]) -> DomainResult<DetectionOutcome> {
        let mut scoped = ScopedFiles::new();
        let upload_path = scoped.track(self.upload_dir.join(image_id));
        let annotated_path = scoped.track(annotated_path_for(&self.results_dir, &upload_path));

        tokio::fs::write(&upload_path, bytes)
            .await
            .map_err(|e| DomainError::processing("failed to store upload", e))?;

        let detector = self.detector.clone();
        let (src, dst) = (upload_path.clone(), annotated_path.clone());
        let detections = tokio::task::spawn_blocking(move || -> DomainResult<Vec<Detection>> {
            let detections = detector.predict(&src)?;
            detector.annotate(&src, &detections, &dst)?;
            Ok(detections)
        })
        .await
        .map_err(|e| DomainError::processing("inference task aborted", e))??;

        let annotated = tokio::fs::read(&annotated_path)
            .await
            .map_err(|e| DomainError::processing("failed to read annotated image", e))?;

        Ok(DetectionOutcome {
            image_id: image_id.to_string(),
            summary: DetectionSummary::from_detections(&detections),
            detections,
            annotated_image_base64: BASE64_STANDARD.encode(annotated),
        })
    }
}

/// `<results_dir>/<stem>_annotated.<ext>`
pub fn annotated_path_for(results_dir: &Path, upload_path: &Path) -> PathBuf {
    let stem = upload_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "upload".to_string());
    let ext = upload_path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_else(|| "jpg".to_string());
    results_dir.join(format!("{stem}_annotated.{ext}"))
}

/// Decodifica la imagen anotada recibida en base64. Admite prefijo `data:`.
pub fn decode_image_base64(encoded: &str) -> DomainResult<Vec<u8>> {
    let payload = match encoded.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => encoded,
    };
    let decoded = if payload.contains(char::is_whitespace) {
        let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
        BASE64_STANDARD.decode(compact.as_bytes())
    } else {
        BASE64_STANDARD.decode(payload.as_bytes())
    };
    decoded.map_err(|e| DomainError::processing("invalid base64 annotated image", e))
}

#[derive(Debug, Clone)]
pub struct GeneratedReport {
    pub id: ReportId,
    pub path: PathBuf,
}

impl GeneratedReport {
    pub fn file_name(&self) -> String {
        self.id.file_name()
    }
}

/// Compositor de informes: maqueta y delega el dibujo al renderer.
#[derive(Clone)]
pub struct ReportService {
    renderer: Arc<dyn ReportRendererPort>,
    reports_dir: PathBuf,
    geometry: PageGeometry,
}

impl ReportService {
    pub fn new(renderer: Arc<dyn ReportRendererPort>, reports_dir: impl Into<PathBuf>) -> Self {
        Self {
            renderer,
            reports_dir: reports_dir.into(),
            geometry: PageGeometry::LETTER,
        }
    }

    pub fn reports_dir(&self) -> &Path {
        &self.reports_dir
    }

    pub async fn compose(&self, input: ReportInput) -> DomainResult<GeneratedReport> {
        let id = ReportId::generate();
        let path = self.reports_dir.join(id.file_name());

        let renderer = self.renderer.clone();
        let geometry = self.geometry.clone();
        let out = path.clone();
        let result = tokio::task::spawn_blocking(move || -> DomainResult<usize> {
            let image_bytes = decode_image_base64(&input.annotated_image_base64)?;
            let layout = compose_layout(&input, &geometry, renderer.text_measure());
            renderer.render(&layout, &image_bytes, &out)?;
            Ok(layout.page_count())
        })
        .await
        .map_err(|e| DomainError::processing("report task aborted", e))
        .and_then(|r| r);

        match result {
            Ok(pages) => {
                info!("Informe PDF generado en {} ({} páginas)", path.display(), pages);
                Ok(GeneratedReport { id, path })
            }
            Err(e) => {
                error!("No se pudo generar el informe PDF: {}", e);
                Err(e)
            }
        }
    }
}
