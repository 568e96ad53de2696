use aquatrend_common::period::{MonthKey, Period, PeriodLevel, WeekKey, parse_date};
use aquatrend_common::{
    DailyReport, HourlyBucket, HourlyBucketEntry, MonthlyReport, SensorAnalytics, WeeklyReport,
};
use axum::Json;
use axum::extract::{Path, State};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::AppError;
use crate::pipeline::paths::{self, validate_owner};
use crate::server::AppState;

async fn fetch<T: DeserializeOwned>(state: &AppState, path: &str) -> Result<T, AppError> {
    state
        .ctx
        .docs
        .get(path)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("no document at {path}")))
}

/// GET /owners/{owner}/hourly/{date}
pub async fn hourly(
    State(state): State<AppState>,
    Path((owner, date)): Path<(String, String)>,
) -> Result<Json<Vec<HourlyBucketEntry>>, AppError> {
    validate_owner(&owner)?;
    let date = parse_date(&date)?;
    let buckets: Vec<(String, HourlyBucket)> = state
        .ctx
        .docs
        .collection(&paths::hourly_collection(&owner, date))
        .await?;
    debug!(owner = %owner, date = %date, count = buckets.len(), "hourly buckets read");
    Ok(Json(
        buckets
            .into_iter()
            .map(|(hour, bucket)| HourlyBucketEntry { hour, bucket })
            .collect(),
    ))
}

/// GET /owners/{owner}/daily/{date}
pub async fn daily(
    State(state): State<AppState>,
    Path((owner, date)): Path<(String, String)>,
) -> Result<Json<DailyReport>, AppError> {
    validate_owner(&owner)?;
    let date = parse_date(&date)?;
    Ok(Json(fetch(&state, &paths::daily_report(&owner, date)).await?))
}

/// GET /owners/{owner}/weekly/{week}
pub async fn weekly(
    State(state): State<AppState>,
    Path((owner, week)): Path<(String, String)>,
) -> Result<Json<WeeklyReport>, AppError> {
    validate_owner(&owner)?;
    let week: WeekKey = week.parse()?;
    Ok(Json(fetch(&state, &paths::report(&owner, &Period::Week(week))).await?))
}

/// GET /owners/{owner}/monthly/{month}
pub async fn monthly(
    State(state): State<AppState>,
    Path((owner, month)): Path<(String, String)>,
) -> Result<Json<MonthlyReport>, AppError> {
    validate_owner(&owner)?;
    let month: MonthKey = month.parse()?;
    Ok(Json(fetch(&state, &paths::report(&owner, &Period::Month(month))).await?))
}

/// GET /owners/{owner}/analytics/{level}/{period}
pub async fn analytics(
    State(state): State<AppState>,
    Path((owner, level, period)): Path<(String, String, String)>,
) -> Result<Json<SensorAnalytics>, AppError> {
    validate_owner(&owner)?;
    let level: PeriodLevel = level.parse()?;
    let period = Period::parse(level, &period)?;
    Ok(Json(fetch(&state, &paths::analytics(&owner, &period)).await?))
}
