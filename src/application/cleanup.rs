use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Rutas temporales de una petición. Se borran al salir del ámbito,
/// tanto en el camino feliz como en cualquier error.
#[derive(Debug, Default)]
pub struct ScopedFiles {
    paths: Vec<PathBuf>,
}

impl ScopedFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registra la ruta antes de crear el fichero.
    pub fn track(&mut self, path: impl Into<PathBuf>) -> PathBuf {
        let path = path.into();
        self.paths.push(path.clone());
        path
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

impl Drop for ScopedFiles {
    fn drop(&mut self) {
        for path in self.paths.drain(..) {
            match std::fs::remove_file(&path) {
                Ok(()) => debug!("Temporal eliminado: {}", path.display()),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                // Best effort: la respuesta ya está decidida.
                Err(e) => warn!("No se pudo eliminar {}: {}", path.display(), e),
            }
        }
    }
}
