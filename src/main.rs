use anyhow::Context;
use clap::Parser;
use std::sync::Arc;

use ppe_vision::{
    adapters::{
        http::{router, state::HttpState},
        onnx::{annotate::Annotator, yolo_engine::cuda_available, OnnxDetector, OnnxModelCatalog},
        pdf::PrintPdfRenderer,
    },
    application::{
        ports::ModelCatalogPort,
        services::{DetectionService, ReportService},
    },
    config::{Cli, Command, Settings},
    dataset::{self, TrainingParams},
    logging,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Arc::new(cli.settings);

    // 1. Inicializar logs (RUST_LOG=info por defecto)
    logging::init(settings.log_dir.as_deref())?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(settings).await,
        Command::DatasetInfo => dataset_info(&settings),
    }
}

async fn serve(settings: Arc<Settings>) -> anyhow::Result<()> {
    tracing::info!("🔧 Inicializando adaptadores de infraestructura...");

    // 2. Directorios de trabajo
    for dir in settings.working_dirs() {
        std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
    }

    // 3. Modelo: validar y cargar una sola vez
    let inference = settings.inference_config();
    OnnxModelCatalog::new()
        .validate_model(&inference.model)
        .await
        .context("model validation failed")?;

    let annotator = Annotator::with_font_file(settings.label_font_path.as_deref())?;
    let detector = Arc::new(OnnxDetector::load(inference, annotator)?);

    // 4. Casos de uso
    let detection = Arc::new(DetectionService::new(
        detector,
        settings.upload_policy(),
        settings.upload_dir(),
        settings.results_dir(),
    ));
    let reports = Arc::new(ReportService::new(Arc::new(PrintPdfRenderer::new()), settings.reports_dir()));

    // 5. Router y servidor
    let device = detection.device().to_string();
    let state = HttpState { detection, reports };
    let app = router(state, &settings.cors_policy());

    let addr = settings.bind_addr();
    tracing::info!("🚀 Servidor PPE iniciado en http://{} (dispositivo: {})", addr, device);
    tracing::info!("📂 Subidas: {}", settings.upload_dir().display());
    tracing::info!("📂 Resultados: {}", settings.results_dir().display());
    tracing::info!("📄 Informes servidos desde {} en /reports", settings.reports_dir().display());

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn dataset_info(settings: &Settings) -> anyhow::Result<()> {
    let device = if cuda_available() { "cuda" } else { "cpu" };
    tracing::info!("Dispositivo para entrenamiento: {}", device);

    let params = TrainingParams {
        model_name: settings.model_name_and_size.clone(),
        batch_size: settings.batch_size,
        epochs: settings.number_of_epochs,
        image_size: settings.model_img_size,
    };
    let info = dataset::inspect(&settings.dataset_yaml_path(), &settings.dataset_dir(), &params, device)?;
    println!("{info}");
    Ok(())
}
