use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::JsonRejection,
        Multipart, State,
    },
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use tracing::info;

use crate::adapters::http::{error::ApiError, state::HttpState};
use crate::application::dto::{DetectResponse, DetectionDto, HealthResponse, ReportRequest, ReportResponse};
use crate::domain::{errors::DomainError, upload::UploadedImage};

pub const SERVICE_NAME: &str = "ppe-vision-detection";
const UPLOAD_FIELD: &str = "file";

fn now_iso() -> String {
    chrono::Local::now().naive_local().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

pub async fn health(State(st): State<HttpState>) -> impl IntoResponse {
    (
        [(header::CACHE_CONTROL, "no-cache")],
        Json(HealthResponse {
            status: "ok".into(),
            timestamp: now_iso(),
            service: SERVICE_NAME.into(),
            device: st.detection.device().to_string(),
        }),
    )
}

pub async fn detect(
    State(st): State<HttpState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<DetectResponse>), ApiError> {
    let mut multipart = multipart.map_err(|e| ApiError::unprocessable("body", e.body_text()))?;
    let upload = read_upload(&mut multipart, st.detection.policy().max_bytes).await?;

    let outcome = st.detection.handle_detect(upload).await?;
    Ok((
        StatusCode::CREATED,
        Json(DetectResponse {
            image_id: outcome.image_id,
            timestamp: now_iso(),
            detections: outcome.detections.iter().map(DetectionDto::from).collect(),
            summary: outcome.summary,
            annotated_image: outcome.annotated_image_base64,
        }),
    ))
}

async fn read_upload(multipart: &mut Multipart, max_bytes: u64) -> Result<UploadedImage, ApiError> {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Err(ApiError::unprocessable(UPLOAD_FIELD, "Field required")),
            Err(e) => return Err(multipart_error(e, max_bytes)),
        };
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field.bytes().await.map_err(|e| multipart_error(e, max_bytes))?;

        return Ok(UploadedImage { filename, content_type, bytes: bytes.to_vec() });
    }
}

fn multipart_error(e: axum::extract::multipart::MultipartError, max_bytes: u64) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        DomainError::invalid("size", format!("file exceeds the maximum allowed size of {max_bytes} bytes")).into()
    } else {
        ApiError::unprocessable(UPLOAD_FIELD, e.body_text())
    }
}

pub async fn report(
    State(st): State<HttpState>,
    payload: Result<Json<ReportRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ReportResponse>), ApiError> {
    let Json(request) = payload.map_err(|e| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::from(DomainError::invalid("body", "report body exceeds the maximum allowed size"))
        } else {
            ApiError::unprocessable("body", e.body_text())
        }
    })?;
    let input = request.into_input().map_err(|e| match e {
        DomainError::Validation(errors) => ApiError::Unprocessable(errors),
        other => ApiError::Domain(other),
    })?;

    info!("Generando informe para {}", input.image_id);
    let generated = st.reports.compose(input).await?;
    Ok((
        StatusCode::CREATED,
        Json(ReportResponse {
            status: "success".into(),
            report_url: format!("/reports/{}", generated.file_name()),
        }),
    ))
}
