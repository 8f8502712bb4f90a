use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::domain::errors::{DomainError, DomainResult};

/// Resumen del dataset y de los parámetros con los que se entrenaría.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetInfo {
    pub model_name: String,
    pub dataset_dir: PathBuf,
    pub train_images: usize,
    pub valid_images: usize,
    pub batch_size: u32,
    pub epochs: u32,
    pub image_size: u32,
    pub device: String,
}

/// Parámetros de entrenamiento tal y como vienen de la configuración.
#[derive(Debug, Clone)]
pub struct TrainingParams {
    pub model_name: String,
    pub batch_size: u32,
    pub epochs: u32,
    pub image_size: u32,
}

pub fn inspect(yaml: &Path, dataset_dir: &Path, params: &TrainingParams, device: &str) -> DomainResult<DatasetInfo> {
    info!("Dataset YAML: {}", yaml.display());
    info!("Carpeta del dataset: {}", dataset_dir.display());

    if !yaml.is_file() {
        error!("No se encuentra el YAML del dataset: {}", yaml.display());
        return Err(DomainError::NotFound(format!("training dataset YAML not found: {}", yaml.display())));
    }
    if !dataset_dir.is_dir() {
        error!("No se encuentra la carpeta del dataset: {}", dataset_dir.display());
        return Err(DomainError::NotFound(format!(
            "training dataset folder not found: {}",
            dataset_dir.display()
        )));
    }

    Ok(DatasetInfo {
        model_name: params.model_name.clone(),
        dataset_dir: dataset_dir.to_path_buf(),
        train_images: count_jpg(&dataset_dir.join("train").join("images")),
        valid_images: count_jpg(&dataset_dir.join("valid").join("images")),
        batch_size: params.batch_size,
        epochs: params.epochs,
        image_size: params.image_size,
        device: device.to_string(),
    })
}

/// Equivale a `glob("*.jpg")`: sin recursión y distinguiendo mayúsculas.
fn count_jpg(dir: &Path) -> usize {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    entries
        .flatten()
        .filter(|e| e.path().is_file())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "jpg"))
        .count()
}

impl fmt::Display for DatasetInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "model: {}", self.model_name)?;
        writeln!(f, "dataset_path: {}", self.dataset_dir.display())?;
        writeln!(f, "images_for_training: {}", self.train_images)?;
        writeln!(f, "images_for_validation: {}", self.valid_images)?;
        writeln!(f, "batch_size: {}", self.batch_size)?;
        writeln!(f, "number_of_epochs: {}", self.epochs)?;
        writeln!(f, "model_image_size: {}", self.image_size)?;
        write!(f, "device_for_training: {}", self.device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> TrainingParams {
        TrainingParams { model_name: "yolo11n".into(), batch_size: 4, epochs: 10, image_size: 640 }
    }

    #[test]
    fn counts_only_jpg_files_per_split() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::write(root.join("data.yaml"), "names: [head, helmet, person]\n").unwrap();
        for (split, names) in [("train", vec!["a.jpg", "b.jpg", "c.png"]), ("valid", vec!["d.jpg"])] {
            let images = root.join(split).join("images");
            std::fs::create_dir_all(&images).unwrap();
            for n in names {
                std::fs::write(images.join(n), b"x").unwrap();
            }
        }

        let info = inspect(&root.join("data.yaml"), root, &params(), "cpu").unwrap();
        assert_eq!(info.train_images, 2);
        assert_eq!(info.valid_images, 1);
        assert!(info.to_string().contains("images_for_training: 2"));
        assert!(info.to_string().ends_with("device_for_training: cpu"));
    }

    #[test]
    fn missing_yaml_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = inspect(&dir.path().join("data.yaml"), dir.path(), &params(), "cpu").unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[test]
    fn missing_splits_count_as_zero() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("data.yaml"), "").unwrap();
        let info = inspect(&dir.path().join("data.yaml"), dir.path(), &params(), "cuda").unwrap();
        assert_eq!((info.train_images, info.valid_images), (0, 0));
    }
}
