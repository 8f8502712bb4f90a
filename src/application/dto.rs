use serde::{Deserialize, Serialize};

use crate::domain::{
    detection::{BoundingBox, Detection, DetectionSummary},
    errors::{DomainError, DomainResult, FieldError},
    report::{parse_timestamp, ReportInput},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionDto {
    #[serde(rename = "class")]
    pub class: String,
    pub confidence: f32,
    pub bbox: [f32; 4],
}

impl From<&Detection> for DetectionDto {
    fn from(d: &Detection) -> Self {
        Self {
            class: d.label.clone(),
            confidence: (d.confidence * 100.0).round() / 100.0,
            bbox: d.bbox.to_array(),
        }
    }
}

/// Resultado de una detección tal y como lo consume el cliente.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectResponse {
    pub image_id: String,
    pub timestamp: String,
    pub detections: Vec<DetectionDto>,
    pub summary: DetectionSummary,
    pub annotated_image: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SummaryBody {
    pub helmet_count: Option<u32>,
    pub no_helmet_count: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DetectionBody {
    #[serde(rename = "class")]
    pub class: Option<String>,
    pub confidence: Option<f32>,
    pub bbox: Option<Vec<f32>>,
}

/// Cuerpo de `POST /report`. Todos los campos son opcionales a nivel de
/// deserialización para poder informar de cada ausencia por separado.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportRequest {
    pub image_id: Option<String>,
    pub timestamp: Option<String>,
    pub summary: Option<SummaryBody>,
    pub detections: Option<Vec<DetectionBody>>,
    pub annotated_image: Option<String>,
}

const REQUIRED: &str = "Field required";

impl ReportRequest {
    pub fn into_input(self) -> DomainResult<ReportInput> {
        let mut errors = Vec::new();

        let image_id = match self.image_id {
            Some(id) if !id.trim().is_empty() => Some(id),
            Some(_) => {
                errors.push(FieldError::new("image_id", "must not be empty"));
                None
            }
            None => {
                errors.push(FieldError::new("image_id", REQUIRED));
                None
            }
        };

        let timestamp = match self.timestamp.as_deref() {
            Some(raw) => {
                let parsed = parse_timestamp(raw);
                if parsed.is_none() {
                    errors.push(FieldError::new(
                        "timestamp",
                        format!("invalid ISO-8601 datetime: {raw}"),
                    ));
                }
                parsed
            }
            None => {
                errors.push(FieldError::new("timestamp", REQUIRED));
                None
            }
        };

        let summary = match self.summary {
            Some(body) => {
                if body.helmet_count.is_none() {
                    errors.push(FieldError::new("summary.helmet_count", REQUIRED));
                }
                if body.no_helmet_count.is_none() {
                    errors.push(FieldError::new("summary.no_helmet_count", REQUIRED));
                }
                Some(DetectionSummary {
                    helmet_count: body.helmet_count.unwrap_or_default(),
                    no_helmet_count: body.no_helmet_count.unwrap_or_default(),
                })
            }
            None => {
                errors.push(FieldError::new("summary", REQUIRED));
                None
            }
        };

        let detections = match self.detections {
            Some(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (idx, item) in items.into_iter().enumerate() {
                    if let Some(d) = item.validate(idx, &mut errors) {
                        out.push(d);
                    }
                }
                Some(out)
            }
            None => {
                errors.push(FieldError::new("detections", REQUIRED));
                None
            }
        };

        let annotated_image = match self.annotated_image {
            Some(img) if !img.trim().is_empty() => Some(img),
            Some(_) => {
                errors.push(FieldError::new("annotated_image", "must not be empty"));
                None
            }
            None => {
                errors.push(FieldError::new("annotated_image", REQUIRED));
                None
            }
        };

        match (image_id, timestamp, summary, detections, annotated_image) {
            (Some(image_id), Some(timestamp), Some(summary), Some(detections), Some(annotated_image_base64))
                if errors.is_empty() =>
            {
                Ok(ReportInput { image_id, timestamp, summary, detections, annotated_image_base64 })
            }
            _ => Err(DomainError::Validation(errors)),
        }
    }
}

impl DetectionBody {
    fn validate(self, idx: usize, errors: &mut Vec<FieldError>) -> Option<Detection> {
        let field = |name: &str| format!("detections[{idx}].{name}");
        let before = errors.len();

        let label = match self.class {
            Some(c) if !c.trim().is_empty() => c,
            Some(_) => {
                errors.push(FieldError::new(field("class"), "must not be empty"));
                String::new()
            }
            None => {
                errors.push(FieldError::new(field("class"), REQUIRED));
                String::new()
            }
        };

        let confidence = match self.confidence {
            Some(c) if (0.0..=1.0).contains(&c) => c,
            Some(c) => {
                errors.push(FieldError::new(field("confidence"), format!("must be within [0, 1], got {c}")));
                0.0
            }
            None => {
                errors.push(FieldError::new(field("confidence"), REQUIRED));
                0.0
            }
        };

        let bbox = match self.bbox.as_deref() {
            Some(&[x1, y1, x2, y2]) if x1 <= x2 && y1 <= y2 => Some(BoundingBox { x_min: x1, y_min: y1, x_max: x2, y_max: y2 }),
            Some(&[_, _, _, _]) => {
                errors.push(FieldError::new(field("bbox"), "expected x_min <= x_max and y_min <= y_max"));
                None
            }
            Some(other) => {
                errors.push(FieldError::new(
                    field("bbox"),
                    format!("expected 4 coordinates [x_min, y_min, x_max, y_max], got {}", other.len()),
                ));
                None
            }
            None => {
                errors.push(FieldError::new(field("bbox"), REQUIRED));
                None
            }
        };

        match bbox {
            Some(bbox) if errors.len() == before => Some(Detection { label, confidence, bbox }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportResponse {
    pub status: String,
    pub report_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub service: String,
    pub device: String,
}
