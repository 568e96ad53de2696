use aquatrend_common::{FeedingCreated, FeedingRecord, SensorReading};
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;

use crate::error::AppError;
use crate::pipeline::paths::validate_owner;
use crate::server::AppState;

/// PUT /owners/{owner}/sensors/{sensor}
///
/// Replaces the latest reading; earlier readings are not kept.
pub async fn put_sensor(
    State(state): State<AppState>,
    Path((owner, sensor)): Path<(String, String)>,
    Json(reading): Json<SensorReading>,
) -> Result<StatusCode, AppError> {
    validate_owner(&owner)?;
    state.sensors.set_latest(&owner, &sensor, &reading).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /owners/{owner}/feedings
pub async fn add_feeding(
    State(state): State<AppState>,
    Path(owner): Path<String>,
    Json(record): Json<FeedingRecord>,
) -> Result<(StatusCode, Json<FeedingCreated>), AppError> {
    validate_owner(&owner)?;
    let id = state.feedings.add(&owner, &record).await?;
    Ok((StatusCode::CREATED, Json(FeedingCreated { id })))
}
