pub mod error;
pub mod routes;
pub mod state;

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderName, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{AllowHeaders, AllowMethods, AllowOrigin, Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::warn;

use crate::adapters::http::state::HttpState;

/// Holgura para las cabeceras y delimitadores del multipart.
pub const MULTIPART_SLACK_BYTES: usize = 64 * 1024;
/// Holgura del JSON del informe: cabecera, resumen y lista de detecciones.
pub const REPORT_JSON_SLACK_BYTES: usize = 512 * 1024;

/// Longitud base64 (con relleno) de `n` bytes.
pub fn base64_len(n: usize) -> usize {
    n.div_ceil(3).saturating_mul(4)
}

/// Límite de cuerpo del informe: debe admitir la imagen anotada de
/// cualquier subida aceptada, ya codificada en base64.
pub fn report_body_limit(max_upload_bytes: u64) -> usize {
    let max = usize::try_from(max_upload_bytes).unwrap_or(usize::MAX);
    base64_len(max).saturating_add(REPORT_JSON_SLACK_BYTES)
}

/// Política CORS en forma de listas; `*` significa cualquiera.
#[derive(Debug, Clone, Default)]
pub struct CorsPolicy {
    pub origins: Vec<String>,
    pub methods: Vec<String>,
    pub headers: Vec<String>,
    pub allow_credentials: bool,
}

fn is_wildcard(list: &[String]) -> bool {
    list.is_empty() || list.iter().any(|v| v == "*")
}

impl CorsPolicy {
    pub fn permissive() -> Self {
        Self {
            origins: vec!["*".into()],
            methods: vec!["*".into()],
            headers: vec!["*".into()],
            allow_credentials: false,
        }
    }

    pub fn layer(&self) -> CorsLayer {
        let origin = if is_wildcard(&self.origins) {
            AllowOrigin::from(Any)
        } else {
            AllowOrigin::list(self.origins.iter().filter_map(|o| parse_or_warn(o, HeaderValue::from_str)))
        };
        let methods = if is_wildcard(&self.methods) {
            AllowMethods::from(Any)
        } else {
            AllowMethods::list(self.methods.iter().filter_map(|m| parse_or_warn(m, |s| Method::from_bytes(s.as_bytes()))))
        };
        let headers = if is_wildcard(&self.headers) {
            AllowHeaders::from(Any)
        } else {
            AllowHeaders::list(self.headers.iter().filter_map(|h| parse_or_warn(h, |s| HeaderName::from_bytes(s.as_bytes()))))
        };

        let mut layer = CorsLayer::new().allow_origin(origin).allow_methods(methods).allow_headers(headers);
        // tower-http rechaza credenciales combinadas con comodines.
        if self.allow_credentials {
            if is_wildcard(&self.origins) || is_wildcard(&self.methods) || is_wildcard(&self.headers) {
                warn!("CORS_ALLOW_CREDENTIALS ignorado: requiere orígenes, métodos y cabeceras explícitos");
            } else {
                layer = layer.allow_credentials(true);
            }
        }
        layer
    }
}

fn parse_or_warn<T, E: std::fmt::Display>(raw: &str, parse: impl Fn(&str) -> Result<T, E>) -> Option<T> {
    match parse(raw.trim()) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!("Valor CORS inválido {:?}: {}", raw, e);
            None
        }
    }
}

pub fn router(state: HttpState, cors: &CorsPolicy) -> Router {
    let max_upload = state.detection.policy().max_bytes;
    let body_limit = usize::try_from(max_upload)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_SLACK_BYTES);
    let reports_dir = state.reports.reports_dir().to_path_buf();

    Router::new()
        .route("/health", get(routes::health))
        .route(
            "/api/v1/detect",
            post(routes::detect).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route(
            "/api/v1/report",
            post(routes::report).layer(DefaultBodyLimit::max(report_body_limit(max_upload))),
        )
        .nest_service("/reports", ServeDir::new(reports_dir))
        .layer(cors.layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_detection() {
        assert!(is_wildcard(&[]));
        assert!(is_wildcard(&["*".to_string()]));
        assert!(!is_wildcard(&["http://localhost:3000".to_string()]));
    }

    #[test]
    fn report_limit_fits_an_encoded_max_upload() {
        assert_eq!(base64_len(0), 0);
        assert_eq!(base64_len(1), 4);
        assert_eq!(base64_len(3), 4);
        assert_eq!(base64_len(4), 8);
        let two_mib = 2 * 1024 * 1024;
        assert!(report_body_limit(two_mib) > base64_len(two_mib as usize));
        assert!(report_body_limit(two_mib) > 2 * 1024 * 1024 * 4 / 3);
    }

    #[test]
    fn explicit_policy_with_credentials_builds_a_layer() {
        let policy = CorsPolicy {
            origins: vec!["http://localhost:3000".into(), "not a header\u{7f}".into()],
            methods: vec!["GET".into(), "POST".into()],
            headers: vec!["content-type".into()],
            allow_credentials: true,
        };
        let _layer = policy.layer();
        let _permissive = CorsPolicy::permissive().layer();
    }
}
