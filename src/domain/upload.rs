use std::path::Path;

use super::errors::{DomainError, DomainResult, FieldError};

pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 2 * 1024 * 1024;
pub const ALLOWED_CONTENT_TYPES: &[&str] = &["image/jpeg", "image/jpg", "image/png"];
pub const ALLOWED_EXTENSIONS: &[&str] = &[".jpeg", ".jpg", ".png"];

/// Imagen recibida en una petición, todavía sin validar.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadedImage {
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Reglas de aceptación de subidas. Solo inspecciona metadatos, nunca el contenido.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    pub allowed_content_types: Vec<String>,
    pub allowed_extensions: Vec<String>,
    pub max_bytes: u64,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self::with_max_bytes(DEFAULT_MAX_UPLOAD_BYTES)
    }
}

impl UploadPolicy {
    pub fn with_max_bytes(max_bytes: u64) -> Self {
        Self {
            allowed_content_types: ALLOWED_CONTENT_TYPES.iter().map(|s| s.to_string()).collect(),
            allowed_extensions: ALLOWED_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            max_bytes,
        }
    }

    /// Valida nombre, tipo y tamaño. Devuelve todos los campos inválidos a la vez.
    pub fn validate(&self, filename: &str, content_type: &str, size: u64) -> DomainResult<()> {
        let mut errors = Vec::new();

        if !self.allowed_content_types.iter().any(|t| t == content_type) {
            errors.push(FieldError::new(
                "content_type",
                format!(
                    "Unsupported file type: {content_type}. Allowed types are: {}",
                    self.allowed_content_types.join(", ")
                ),
            ));
        }

        let lower = filename.to_ascii_lowercase();
        if !self.allowed_extensions.iter().any(|ext| lower.ends_with(ext.as_str())) {
            errors.push(FieldError::new(
                "filename",
                format!(
                    "Unsupported file extension in filename: {filename}. Allowed extensions are: {}",
                    self.allowed_extensions.join(", ")
                ),
            ));
        }

        if size == 0 {
            errors.push(FieldError::new("size", "Uploaded file is empty"));
        } else if size > self.max_bytes {
            errors.push(FieldError::new(
                "size",
                format!("File is {size} bytes; the maximum allowed is {} bytes", self.max_bytes),
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(DomainError::Validation(errors))
        }
    }

    pub fn validate_upload(&self, upload: &UploadedImage) -> DomainResult<()> {
        self.validate(&upload.filename, &upload.content_type, upload.size())
    }
}

/// Reduce un nombre de archivo del cliente a su último componente.
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_control() { '_' } else { c })
        .collect();
    match Path::new(&cleaned).file_name() {
        Some(name) if !cleaned.starts_with('.') => name.to_string_lossy().to_string(),
        _ => format!("upload{cleaned}"),
    }
}
