use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::adapters::http::CorsPolicy;
use crate::domain::model::{InferenceConfig, ModelId, YoloParams};
use crate::domain::upload::{UploadPolicy, DEFAULT_MAX_UPLOAD_BYTES};

/// Servicio de detección de EPI (casco / sin casco) con informes PDF.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub settings: Settings,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Arranca el servidor HTTP (por defecto).
    Serve,
    /// Comprueba el dataset de entrenamiento y muestra la configuración.
    DatasetInfo,
}

/// Configuración del proceso. Cada campo admite flag o variable de entorno.
#[derive(Args, Debug, Clone)]
pub struct Settings {
    #[arg(long, env = "APP_HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "APP_PORT", default_value_t = 8000)]
    pub port: u16,

    /// Raíz sobre la que se resuelven los directorios relativos.
    #[arg(long, env = "BASE_DIR", default_value = ".", value_name = "DIR")]
    pub base_dir: PathBuf,

    #[arg(long, env = "IMAGE_UPLOAD_DIR", default_value = "uploads", value_name = "DIR")]
    pub image_upload_dir: PathBuf,

    #[arg(long, env = "INFERENCE_RESULTS_DIR", default_value = "inference_results", value_name = "DIR")]
    pub inference_results_dir: PathBuf,

    #[arg(long, env = "PDF_REPORTS_DIR", default_value = "reports", value_name = "DIR")]
    pub pdf_reports_dir: PathBuf,

    /// Pesos del detector exportados a ONNX.
    #[arg(long, env = "MODEL_PATH", default_value = "trained_models/best_ppe_model.onnx", value_name = "FILE")]
    pub model_path: PathBuf,

    #[arg(long, env = "MODEL_NAME_AND_SIZE", default_value = "yolo11n")]
    pub model_name_and_size: String,

    /// Nombres de clase en orden de índice.
    #[arg(long, env = "MODEL_CLASSES", default_value = "head,helmet,person", value_delimiter = ',')]
    pub model_classes: Vec<String>,

    #[arg(long, env = "TRAINING_DATASET_PATH", default_value = "dataset/data.yaml", value_name = "FILE")]
    pub training_dataset_path: PathBuf,

    #[arg(long, env = "MODEL_IMG_SIZE", default_value_t = 640)]
    pub model_img_size: u32,

    #[arg(long, env = "BATCH_SIZE", default_value_t = 4)]
    pub batch_size: u32,

    #[arg(long, env = "NUMBER_OF_EPOCHS", default_value_t = 10)]
    pub number_of_epochs: u32,

    /// Umbral de confianza (0.0 - 1.0)
    #[arg(long, env = "CONFIDENCE_THRESHOLD", default_value_t = 0.25, value_name = "THRESHOLD")]
    pub confidence_threshold: f32,

    /// Umbral IoU de NMS (0.0 - 1.0)
    #[arg(long, env = "IOU_THRESHOLD", default_value_t = 0.45, value_name = "THRESHOLD")]
    pub iou_threshold: f32,

    #[arg(long, env = "MAX_DETECTIONS", default_value_t = 300)]
    pub max_detections: usize,

    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    pub max_upload_bytes: u64,

    /// Fuente TTF para rotular las cajas. Sin ella solo se dibujan los rectángulos.
    #[arg(long, env = "LABEL_FONT_PATH", value_name = "FILE")]
    pub label_font_path: Option<PathBuf>,

    #[arg(long, env = "CORS_ALLOWED_ORIGINS", default_value = "*", value_delimiter = ',')]
    pub cors_allowed_origins: Vec<String>,

    #[arg(long, env = "CORS_ALLOWED_METHODS", default_value = "*", value_delimiter = ',')]
    pub cors_allowed_methods: Vec<String>,

    #[arg(long, env = "CORS_ALLOWED_HEADERS", default_value = "*", value_delimiter = ',')]
    pub cors_allowed_headers: Vec<String>,

    #[arg(long, env = "CORS_ALLOW_CREDENTIALS", default_value_t = false)]
    pub cors_allow_credentials: bool,

    /// Si se indica, los logs se escriben también en `<LOG_DIR>/ppe-vision.log`.
    #[arg(long, env = "LOG_DIR", value_name = "DIR")]
    pub log_dir: Option<PathBuf>,
}

impl Settings {
    fn resolve(&self, path: &Path) -> PathBuf {
        self.base_dir.join(path)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn upload_dir(&self) -> PathBuf {
        self.resolve(&self.image_upload_dir)
    }

    pub fn results_dir(&self) -> PathBuf {
        self.resolve(&self.inference_results_dir)
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.resolve(&self.pdf_reports_dir)
    }

    pub fn model_path(&self) -> PathBuf {
        self.resolve(&self.model_path)
    }

    pub fn dataset_yaml_path(&self) -> PathBuf {
        self.resolve(&self.training_dataset_path)
    }

    /// Directorio que contiene el `data.yaml`.
    pub fn dataset_dir(&self) -> PathBuf {
        let yaml = self.dataset_yaml_path();
        match yaml.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => self.base_dir.clone(),
        }
    }

    pub fn working_dirs(&self) -> [PathBuf; 3] {
        [self.upload_dir(), self.results_dir(), self.reports_dir()]
    }

    pub fn inference_config(&self) -> InferenceConfig {
        InferenceConfig {
            model: ModelId {
                name: self.model_name_and_size.clone(),
                onnx_path: self.model_path(),
            },
            params: YoloParams {
                input_size: self.model_img_size,
                conf_threshold: self.confidence_threshold,
                iou_threshold: self.iou_threshold,
                max_detections: self.max_detections,
            },
            classes: self
                .model_classes
                .iter()
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect(),
        }
    }

    pub fn upload_policy(&self) -> UploadPolicy {
        UploadPolicy::with_max_bytes(self.max_upload_bytes)
    }

    pub fn cors_policy(&self) -> CorsPolicy {
        let clean = |list: &[String]| -> Vec<String> {
            list.iter().map(|v| v.trim().to_string()).filter(|v| !v.is_empty()).collect()
        };
        CorsPolicy {
            origins: clean(&self.cors_allowed_origins),
            methods: clean(&self.cors_allowed_methods),
            headers: clean(&self.cors_allowed_headers),
            allow_credentials: self.cors_allow_credentials,
        }
    }
}
