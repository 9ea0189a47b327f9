use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryLeadRepository, LogNotifier};
use crate::routes::with_pipeline_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use realty_crm::config::AppConfig;
use realty_crm::error::AppError;
use realty_crm::telemetry;
use realty_crm::workflows::pipeline::LeadPipelineService;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry, config.environment)?;

    let repository = Arc::new(InMemoryLeadRepository::default());
    let notifier = Arc::new(LogNotifier);
    let pipeline = Arc::new(LeadPipelineService::from_config(
        repository,
        notifier,
        &config.pipeline,
    )?);
    let stage_count = pipeline.list_stages().len();

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        stage_count,
    };

    let app = with_pipeline_routes(pipeline)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        stages = stage_count,
        default_stage = %config.pipeline.default_stage,
        "lead pipeline service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
