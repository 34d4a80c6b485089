//! Process wiring for the listing search pipeline.
//!
//! Builds the stores (in memory or PostgreSQL), serves the listing command
//! API with structured logging (tracing) and Prometheus metrics, and runs the
//! outbox publisher and the search projection consumer until shutdown.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use broker::InMemoryBroker;
use listings::{InMemoryListingStore, ListingService, ListingStore, PostgresListingStore};
use metrics_exporter_prometheus::PrometheusHandle;
use outbox::{InMemoryOutboxStore, OutboxPublisher, OutboxStore, PostgresOutboxStore};
use projections::{
    InMemorySearchIndex, ListingProjector, PostgresSearchIndex, ProjectionConsumer, SearchIndex,
};
use sqlx::PgPool;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use error::StartupError;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub listings: ListingService<Arc<dyn ListingStore>>,
    pub outbox: Arc<dyn OutboxStore>,
    pub index: Arc<dyn SearchIndex>,
}

impl AppState {
    /// Single-process state: listings and outbox share one in-memory store.
    pub fn in_memory() -> Self {
        let outbox = InMemoryOutboxStore::new();
        let listings: Arc<dyn ListingStore> = Arc::new(InMemoryListingStore::new(outbox.clone()));

        Self {
            listings: ListingService::new(listings),
            outbox: Arc::new(outbox),
            index: Arc::new(InMemorySearchIndex::new()),
        }
    }

    /// PostgreSQL-backed state over one pool.
    pub fn postgres(pool: PgPool) -> Self {
        let listings: Arc<dyn ListingStore> = Arc::new(PostgresListingStore::new(pool.clone()));

        Self {
            listings: ListingService::new(listings),
            outbox: Arc::new(PostgresOutboxStore::new(pool.clone())),
            index: Arc::new(PostgresSearchIndex::new(pool)),
        }
    }

    /// Connects to `database_url` when set and runs migrations; otherwise
    /// falls back to in-memory stores.
    pub async fn from_config(config: &Config) -> Result<Self, StartupError> {
        let Some(url) = config.database_url.as_deref() else {
            tracing::warn!("DATABASE_URL not set, using in-memory stores");
            return Ok(Self::in_memory());
        };

        let pool = PgPool::connect(url).await?;
        PostgresOutboxStore::new(pool.clone()).run_migrations().await?;
        tracing::info!("connected to PostgreSQL, migrations applied");
        Ok(Self::postgres(pool))
    }
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::ops::metrics))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::ops::health))
        .route("/api/listings", post(routes::listings::create))
        .route(
            "/api/listings/{id}",
            get(routes::listings::get)
                .put(routes::listings::update)
                .delete(routes::listings::delete),
        )
        .route("/api/outbox/pending", get(routes::outbox::pending))
        .route(
            "/api/search/documents/{id}",
            get(routes::search::get_document),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Background loops sharing one shutdown token.
pub struct Pipeline {
    publisher: JoinHandle<()>,
    consumer: JoinHandle<()>,
}

impl Pipeline {
    /// Waits for both loops to finish.
    pub async fn join(self) {
        if let Err(e) = self.publisher.await {
            tracing::error!(error = %e, "outbox publisher task failed");
        }
        if let Err(e) = self.consumer.await {
            tracing::error!(error = %e, "projection consumer task failed");
        }
    }
}

/// Creates the search index, binds the consumer queue and starts the outbox
/// publisher and the projection consumer.
///
/// The queue is bound before the publisher starts, so nothing published by
/// the first cycle is dropped as unroutable.
pub async fn spawn_pipeline(
    state: &AppState,
    broker: InMemoryBroker,
    config: &Config,
    shutdown: CancellationToken,
) -> Result<Pipeline, StartupError> {
    state.index.ensure_index().await?;

    let projector = ListingProjector::new(state.index.clone());
    let consumer = ProjectionConsumer::new(broker.clone(), projector, config.consumer_config());
    consumer.setup().await?;

    let publisher = OutboxPublisher::new(state.outbox.clone(), broker, config.publisher_config());

    let consumer = tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if let Err(e) = consumer.run(shutdown).await {
                tracing::error!(error = %e, "projection consumer stopped with error");
            }
        }
    });
    let publisher = tokio::spawn(publisher.run(shutdown));

    Ok(Pipeline {
        publisher,
        consumer,
    })
}
