mod health;
mod ingest;
mod pipeline;
mod reports;

use axum::Router;
use axum::routing::{get, post, put};

use crate::server::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        // Health
        .route("/health", get(health::health))
        // Aggregate documents
        .route("/owners/{owner}/hourly/{date}", get(reports::hourly))
        .route("/owners/{owner}/daily/{date}", get(reports::daily))
        .route("/owners/{owner}/weekly/{week}", get(reports::weekly))
        .route("/owners/{owner}/monthly/{month}", get(reports::monthly))
        .route(
            "/owners/{owner}/analytics/{level}/{period}",
            get(reports::analytics),
        )
        // Pipeline triggers
        .route(
            "/owners/{owner}/aggregate/{level}/{period}",
            post(pipeline::aggregate),
        )
        .route("/owners/{owner}/refresh", post(pipeline::refresh))
        .route("/owners/{owner}/backfill", post(pipeline::backfill))
        .route("/owners/{owner}/seed", post(pipeline::seed))
        // Upstream collaborators
        .route("/owners/{owner}/sensors/{sensor}", put(ingest::put_sensor))
        .route("/owners/{owner}/feedings", post(ingest::add_feeding))
}
