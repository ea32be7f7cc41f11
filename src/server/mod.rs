pub mod cache;
pub mod handlers;
pub mod query;

use crate::error::Result;
use crate::pipeline::{Dataset, NormalizedTable, Pipeline};
use axum::{
    extract::{Query, State},
    http::Method,
    routing::get,
    Router,
};
use cache::DatasetCache;
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

/// Shared state of every request handler.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub cache: Arc<DatasetCache>,
}

impl AppState {
    pub fn new(pipeline: Pipeline, cache: DatasetCache) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            cache: Arc::new(cache),
        }
    }

    /// Preprocessed table of `dataset`, from the cache when fresh.
    pub async fn table(&self, dataset: Dataset) -> Result<Arc<NormalizedTable>> {
        self.cache
            .get_or_compute(dataset, || self.pipeline.preprocess(dataset))
            .await
    }
}

/// Create the router with the three routes of every dataset plus the index,
/// API description, health and metrics endpoints.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET])
        .allow_headers(Any);

    let mut router = Router::new()
        .route("/", get(handlers::index))
        .route("/apispec.json", get(handlers::apispec))
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics_text));

    for dataset in Dataset::ALL {
        router = router
            .route(
                &handlers::download_path(dataset),
                get(move |State(state): State<AppState>| handlers::download(state, dataset)),
            )
            .route(
                &handlers::data_path(dataset),
                get(
                    move |State(state): State<AppState>, Query(params): Query<HashMap<String, String>>| {
                        handlers::grid_data(state, dataset, params)
                    },
                ),
            )
            .route(
                &handlers::page_path(dataset),
                get(move |State(state): State<AppState>| handlers::dataset_page(state, dataset)),
            );
    }

    router
        .layer(ServiceBuilder::new().layer(cors))
        .with_state(state)
}

/// Start the HTTP server on `host:port`
pub async fn start_server(state: AppState, host: &str, port: u16) -> anyhow::Result<()> {
    let app = create_router(state);
    let addr = format!("{}:{}", host, port);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "HTTP server listening");
    info!("Health check: http://{}/health", addr);
    info!("API description: http://{}/apispec.json", addr);

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
