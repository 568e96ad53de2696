use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::pipeline::PipelineContext;
use crate::routes;
use crate::scheduler::Scheduler;
use crate::sources::{StoreFeedingSource, StoreSensorSource};
use crate::store::{DocumentStore, Store};

#[derive(Clone)]
pub struct AppState {
    pub ctx: PipelineContext,
    pub sensors: StoreSensorSource,
    pub feedings: StoreFeedingSource,
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Open the keyspaces and wire the pipeline to the store-backed sources.
    pub fn new(store: &Store, config: AppConfig) -> Result<Self, AppError> {
        let docs = DocumentStore::new(store.keyspace("documents")?);
        let sensors = StoreSensorSource::new(store.keyspace("sensors")?);
        let feedings = StoreFeedingSource::new(store.keyspace("feedings")?);

        let ctx = PipelineContext::new(
            docs,
            Arc::new(sensors.clone()),
            Arc::new(feedings.clone()),
            config.pipeline.clock,
        );

        Ok(Self {
            ctx,
            sensors,
            feedings,
            config: Arc::new(config),
        })
    }
}

pub async fn run(config: AppConfig, store: Store) -> Result<(), AppError> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await.map_err(AppError::Io)?;

    let state = AppState::new(&store, config)?;

    let cancel = CancellationToken::new();
    let scheduler = Scheduler::spawn(state.ctx.clone(), &state.config.pipeline, cancel.clone());

    let app = routes::router()
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    info!("server listening addr={addr}");

    let shutdown = cancel.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            shutdown.cancel();
        })
        .await
        .map_err(AppError::Io)?;

    scheduler.shutdown().await;
    store.persist().await?;

    info!("server shut down");
    Ok(())
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received SIGINT"),
        () = terminate => info!("received SIGTERM"),
    }
}
