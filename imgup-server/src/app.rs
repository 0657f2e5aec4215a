use std::path::Path;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, put};
use axum::Router;
use imgup_blob::{BlobConfig, ContainerUrl, ListingService, ObjectStore, S3Store, UploadPipeline};
use imgup_vision::{ComputerVisionClient, DescribeAdapter};
use tokio::net::{TcpListener, ToSocketAddrs};
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::{pages, routes, AppConfig};

/// Shared, read-only request state
#[derive(Clone)]
pub struct AppState {
    pub pipeline: UploadPipeline,
    pub listing: ListingService,
    pub vision: Arc<dyn DescribeAdapter>,
}

impl AppState {
    pub fn new(
        store: ObjectStore,
        blob: &BlobConfig,
        public_url: ContainerUrl,
        vision: Arc<dyn DescribeAdapter>,
    ) -> Self {
        Self {
            pipeline: UploadPipeline::new(store.clone(), blob),
            listing: ListingService::new(store, public_url),
            vision,
        }
    }
}

pub struct ImgupApp {
    pub state: AppState,
    pub router: Router<()>,
}

impl ImgupApp {
    pub fn new<P: AsRef<Path>>(state: AppState, static_dir: P) -> Self {
        let router = Router::new()
            .route("/", get(pages::index))
            .route("/i/{id}", get(pages::detail))
            .route(
                "/api/upload",
                put(routes::upload).layer(DefaultBodyLimit::disable()),
            )
            .route("/api/recent", get(routes::recent))
            .route("/api/detail/{id}", get(routes::detail))
            .route("/health", get(routes::health))
            .nest_service("/static", ServeDir::new(static_dir.as_ref()))
            .with_state(state.clone())
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id()),
            );

        Self { state, router }
    }

    pub async fn listen<A>(self, addr: A) -> anyhow::Result<()>
    where
        A: ToSocketAddrs,
    {
        let listener = TcpListener::bind(addr).await?;
        tracing::info!(addr = %listener.local_addr()?, "listening");
        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

/// Wire the production collaborators from `config`
pub async fn build(config: &AppConfig) -> anyhow::Result<ImgupApp> {
    let staging = config.blob.staging_dir();
    tokio::fs::create_dir_all(&staging).await?;

    let store = ObjectStore::new(S3Store::connect(config.storage.clone()).await);
    let vision = ComputerVisionClient::new(&config.vision_endpoint, config.vision_subscription_key.clone())?;

    tracing::info!(
        container = store.container(),
        public_url = %config.public_url,
        staging = %staging.display(),
        "storage configured"
    );

    let state = AppState::new(store, &config.blob, config.public_url.clone(), Arc::new(vision));
    Ok(ImgupApp::new(state, &config.static_dir))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
