use crate::cli::ServeArgs;
use crate::infra::{load_submissions, AppState, InMemoryIdentityProvider, InMemorySubmissionStore};
use crate::routes::with_placement_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use placify::config::AppConfig;
use placify::error::AppError;
use placify::placement::{PlacementError, PlacementService};
use placify::telemetry;
use std::sync::atomic::Ordering;
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

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = match &config.store.seed_path {
        Some(path) => {
            let submissions = load_submissions(path)?;
            let count = submissions.len();
            let store =
                InMemorySubmissionStore::seeded(submissions).map_err(PlacementError::from)?;
            info!(path = %path.display(), count, "seeded submissions");
            store
        }
        None => InMemorySubmissionStore::default(),
    };
    let identity = InMemoryIdentityProvider::default();
    let placement_service = Arc::new(PlacementService::new(Arc::new(store), Arc::new(identity)));

    let app = with_placement_routes(placement_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "placement service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
