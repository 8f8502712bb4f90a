use image::{ImageReader, RgbImage};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

use crate::adapters::onnx::annotate::Annotator;
use crate::adapters::onnx::yolo_engine::OnnxYoloEngine;
use crate::application::ports::DetectorPort;
use crate::domain::{
    detection::Detection,
    errors::{DomainError, DomainResult},
    model::InferenceConfig,
};

/// Detector YOLO respaldado por ONNX Runtime. Se carga una vez al arrancar
/// y se comparte entre peticiones; la sesión se serializa con un `Mutex`.
pub struct OnnxDetector {
    engine: Mutex<OnnxYoloEngine>,
    config: InferenceConfig,
    annotator: Annotator,
    device: String,
}

impl OnnxDetector {
    pub fn load(config: InferenceConfig, annotator: Annotator) -> DomainResult<Self> {
        let engine = OnnxYoloEngine::load(&config.model.onnx_path).map_err(|e| {
            DomainError::processing(&format!("failed to load model {}", config.model.onnx_path.display()), format!("{e:#}"))
        })?;
        let device = engine.device().to_string();
        info!(
            "🧠 Modelo {} cargado desde {} (dispositivo: {})",
            config.model.name,
            config.model.onnx_path.display(),
            device
        );
        Ok(Self { engine: Mutex::new(engine), config, annotator, device })
    }
}

impl DetectorPort for OnnxDetector {
    fn device(&self) -> &str {
        &self.device
    }

    fn predict(&self, image_path: &Path) -> DomainResult<Vec<Detection>> {
        let rgb = load_rgb(image_path)?;

        let raw = {
            let mut engine = self
                .engine
                .lock()
                .map_err(|_| DomainError::Processing("detector lock poisoned".into()))?;
            engine
                .infer(&rgb, &self.config.params)
                .map_err(|e| DomainError::processing("inference failed", format!("{e:#}")))?
        };

        debug!("{} candidatos tras NMS en {}", raw.len(), image_path.display());
        Ok(raw
            .into_iter()
            .map(|r| Detection {
                label: self.config.class_name(r.class_id),
                confidence: r.score,
                bbox: r.bbox,
            })
            .collect())
    }

    fn annotate(&self, image_path: &Path, detections: &[Detection], output_path: &Path) -> DomainResult<()> {
        render_annotated(&self.annotator, image_path, detections, output_path)
    }
}

/// Decodifica según el contenido, no según la extensión: el validador de
/// subidas no inspecciona los bytes.
pub fn load_rgb(path: &Path) -> DomainResult<RgbImage> {
    let image = ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(|e| DomainError::processing("failed to read image", e))?
        .decode()
        .map_err(|e| DomainError::processing("failed to decode image", e))?;
    Ok(image.to_rgb8())
}

/// Dibuja las detecciones y guarda en el formato que indica `output_path`.
pub fn render_annotated(
    annotator: &Annotator,
    image_path: &Path,
    detections: &[Detection],
    output_path: &Path,
) -> DomainResult<()> {
    let mut rgb = load_rgb(image_path)?;
    annotator.draw(&mut rgb, detections);
    rgb.save(output_path)
        .map_err(|e| DomainError::processing("failed to write annotated image", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::onnx::annotate::class_color;
    use crate::domain::detection::BoundingBox;
    use image::{ImageFormat, Rgb};
    use std::io::Cursor;

    fn jpeg_bytes(w: u32, h: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(w, h, Rgb([90, 90, 90]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Jpeg).unwrap();
        out.into_inner()
    }

    #[test]
    fn jpeg_content_under_png_name_is_decoded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("3f2a_photo.png");
        std::fs::write(&path, jpeg_bytes(16, 12)).unwrap();

        let rgb = load_rgb(&path).unwrap();
        assert_eq!(rgb.dimensions(), (16, 12));
    }

    #[test]
    fn mislabelled_upload_is_annotated() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("3f2a_photo.png");
        let dst = dir.path().join("3f2a_photo_annotated.png");
        std::fs::write(&src, jpeg_bytes(32, 32)).unwrap();
        let detections = vec![Detection {
            label: "helmet".into(),
            confidence: 0.8,
            bbox: BoundingBox::from_corners(4.0, 4.0, 20.0, 20.0),
        }];

        render_annotated(&Annotator::new(None), &src, &detections, &dst).unwrap();

        let out = image::open(&dst).unwrap().to_rgb8();
        assert_eq!(*out.get_pixel(4, 10), class_color("helmet"));
    }

    #[test]
    fn bytes_that_are_no_image_fail_as_processing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.png");
        std::fs::write(&path, b"plain text").unwrap();
        assert!(matches!(load_rgb(&path), Err(DomainError::Processing(_))));
    }
}
