//! Upstream collaborators the pipeline reads from.
//!
//! The sensor source only ever knows the latest reading of each sensor; there
//! is no history to query. The bundled store-backed implementations let the
//! server run standalone, with readings pushed in over HTTP.

use std::sync::Arc;

use aquatrend_common::{FeedingRecord, SensorReading};
use tracing::debug;

use crate::error::AppError;
use crate::store::{BoxFuture, KeyspaceHandle};

pub const TEMPERATURE_SENSOR: &str = "temperature";
pub const PH_SENSOR: &str = "ph";

pub trait SensorSource: Send + Sync {
    /// Latest reading of `sensor`, or `None` when the sensor has never
    /// reported or reported a non-numeric value.
    fn latest<'a>(
        &'a self,
        owner: &'a str,
        sensor: &'a str,
    ) -> BoxFuture<'a, Result<Option<SensorReading>, AppError>>;
}

pub trait FeedingSource: Send + Sync {
    fn list<'a>(&'a self, owner: &'a str) -> BoxFuture<'a, Result<Vec<FeedingRecord>, AppError>>;
}

fn sensor_name(sensor: &str) -> Result<(), AppError> {
    if sensor.is_empty() || sensor.contains('/') {
        return Err(AppError::Validation(format!("invalid sensor name '{sensor}'")));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Store-backed sensor snapshots
// ---------------------------------------------------------------------------

/// Latest value per `{owner}/{sensor}` key; every write replaces the
/// previous reading.
#[derive(Clone)]
pub struct StoreSensorSource {
    ks: KeyspaceHandle,
}

impl StoreSensorSource {
    pub fn new(ks: KeyspaceHandle) -> Self {
        Self { ks }
    }

    pub async fn set_latest(
        &self,
        owner: &str,
        sensor: &str,
        reading: &SensorReading,
    ) -> Result<(), AppError> {
        sensor_name(sensor)?;
        if !reading.value.is_finite() {
            return Err(AppError::Validation(format!(
                "reading for '{sensor}' must be a finite number"
            )));
        }
        debug!(owner = %owner, sensor = %sensor, value = reading.value, "sensor reading stored");
        self.ks.insert(format!("{owner}/{sensor}"), reading).await
    }
}

impl SensorSource for StoreSensorSource {
    fn latest<'a>(
        &'a self,
        owner: &'a str,
        sensor: &'a str,
    ) -> BoxFuture<'a, Result<Option<SensorReading>, AppError>> {
        Box::pin(async move {
            let reading: Option<SensorReading> = self.ks.get(format!("{owner}/{sensor}")).await?;
            Ok(reading.filter(|r| r.value.is_finite()))
        })
    }
}

// ---------------------------------------------------------------------------
// Store-backed feeding schedule
// ---------------------------------------------------------------------------

/// Feeding events stored under `{owner}/{id}`.
#[derive(Clone)]
pub struct StoreFeedingSource {
    ks: KeyspaceHandle,
}

impl StoreFeedingSource {
    pub fn new(ks: KeyspaceHandle) -> Self {
        Self { ks }
    }

    /// Record a feeding and return its generated id.
    pub async fn add(&self, owner: &str, record: &FeedingRecord) -> Result<String, AppError> {
        if !record.feed_amount.is_finite() || record.feed_amount < 0.0 {
            return Err(AppError::Validation(
                "feedAmount must be a non-negative number".into(),
            ));
        }
        let id = uuid::Uuid::new_v4().to_string();
        self.ks.insert(format!("{owner}/{id}"), record).await?;
        Ok(id)
    }
}

impl FeedingSource for StoreFeedingSource {
    fn list<'a>(&'a self, owner: &'a str) -> BoxFuture<'a, Result<Vec<FeedingRecord>, AppError>> {
        Box::pin(async move {
            let mut records = Vec::new();
            for (_, value) in self.ks.prefix_iter_raw(format!("{owner}/")).await? {
                records.push(serde_json::from_slice(&value)?);
            }
            Ok(records)
        })
    }
}

/// Shared handles to both collaborators.
pub type Sensors = Arc<dyn SensorSource>;
pub type Feedings = Arc<dyn FeedingSource>;
