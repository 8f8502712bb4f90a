pub mod annotate;
pub mod detector;
pub mod model_catalog;
pub mod yolo_engine;

pub use detector::OnnxDetector;
pub use model_catalog::OnnxModelCatalog;
