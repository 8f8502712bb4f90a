use chrono::{DateTime, NaiveDateTime};
use uuid::Uuid;

use super::detection::{Detection, DetectionSummary};

pub const REPORT_TITLE: &str = "PPE Safety Incident Report";

/// Datos validados para componer un informe.
#[derive(Debug, Clone)]
pub struct ReportInput {
    pub image_id: String,
    pub timestamp: NaiveDateTime,
    pub summary: DetectionSummary,
    pub detections: Vec<Detection>,
    pub annotated_image_base64: String,
}

/// Identificador aleatorio de un informe generado.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportId(String);

impl ReportId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn file_name(&self) -> String {
        format!("report_{}.pdf", self.0)
    }
}

/// Acepta RFC 3339 (con zona) o ISO-8601 sin zona, con fracciones opcionales.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}
