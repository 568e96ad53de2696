use aquatrend_common::period::{Period, PeriodLevel};
use aquatrend_common::{
    AggregateResponse, BackfillRequest, BackfillSummary, DocumentSource, RefreshSummary,
    SeedReport,
};
use axum::Json;
use axum::extract::{Path, State};
use tracing::info;

use crate::error::AppError;
use crate::pipeline::paths::validate_owner;
use crate::pipeline::seed::ensure_seeded;
use crate::pipeline::{backfill as backfill_stage, refresh_current, run_period};
use crate::server::AppState;

/// POST /owners/{owner}/aggregate/{level}/{period}
pub async fn aggregate(
    State(state): State<AppState>,
    Path((owner, level, period)): Path<(String, String, String)>,
) -> Result<Json<AggregateResponse>, AppError> {
    let level: PeriodLevel = level.parse()?;
    let period = Period::parse(level, &period)?;
    let resp = run_period(&state.ctx, &owner, period, DocumentSource::Aggregator).await?;
    Ok(Json(resp))
}

/// POST /owners/{owner}/refresh
pub async fn refresh(
    State(state): State<AppState>,
    Path(owner): Path<String>,
) -> Result<Json<RefreshSummary>, AppError> {
    Ok(Json(refresh_current(&state.ctx, &owner).await?))
}

/// POST /owners/{owner}/backfill
pub async fn backfill(
    State(state): State<AppState>,
    Path(owner): Path<String>,
    Json(request): Json<BackfillRequest>,
) -> Result<Json<BackfillSummary>, AppError> {
    info!(owner = %owner, stages = ?request.stages, "backfill requested");
    Ok(Json(backfill_stage::run(&state.ctx, &owner, &request).await?))
}

/// POST /owners/{owner}/seed
pub async fn seed(
    State(state): State<AppState>,
    Path(owner): Path<String>,
) -> Result<Json<SeedReport>, AppError> {
    validate_owner(&owner)?;
    Ok(Json(ensure_seeded(&state.ctx, &owner).await))
}
