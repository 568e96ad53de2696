//! Sensor availability counters per period.
//!
//! Daily analytics count hours from the hourly buckets. Weekly and monthly
//! analytics add up the daily counters, so they are totals of totals rather
//! than a second pass over raw buckets.

use aquatrend_common::period::{Period, PeriodLevel, parse_date};
use aquatrend_common::{DocumentSource, HourlyBucket, SensorAnalytics};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::error::AppError;

use super::aggregate::period_contains;
use super::{PipelineContext, paths};

/// The counter half of [`SensorAnalytics`]. Trend fields are owned by the
/// trend step and are not part of this write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityCounts {
    pub temp_availability: u32,
    pub ph_availability: u32,
    pub both_sensors_availability: u32,
    pub no_data_hours: u32,
}

impl AvailabilityCounts {
    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }

    fn add(mut self, other: Self) -> Self {
        self.temp_availability += other.temp_availability;
        self.ph_availability += other.ph_availability;
        self.both_sensors_availability += other.both_sensors_availability;
        self.no_data_hours += other.no_data_hours;
        self
    }

    fn of_bucket(bucket: &HourlyBucket) -> Self {
        let temp = bucket.has_temperature();
        let ph = bucket.has_ph();
        Self {
            temp_availability: u32::from(temp),
            ph_availability: u32::from(ph),
            both_sensors_availability: u32::from(temp && ph),
            no_data_hours: u32::from(!temp && !ph),
        }
    }

    fn of_analytics(doc: &SensorAnalytics) -> Self {
        Self {
            temp_availability: doc.temp_availability,
            ph_availability: doc.ph_availability,
            both_sensors_availability: doc.both_sensors_availability,
            no_data_hours: doc.no_data_hours,
        }
    }
}

/// Count sensor availability over the non-seed hourly buckets of a day.
pub fn count_hours(buckets: &[HourlyBucket]) -> AvailabilityCounts {
    buckets
        .iter()
        .filter(|b| !b.is_seed)
        .map(AvailabilityCounts::of_bucket)
        .fold(AvailabilityCounts::default(), AvailabilityCounts::add)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalyticsPatch {
    #[serde(flatten)]
    counts: AvailabilityCounts,
    generated_at: DateTime<Utc>,
    source: DocumentSource,
}

async fn daily_counts(
    ctx: &PipelineContext,
    owner: &str,
    period: &Period,
) -> Result<AvailabilityCounts, AppError> {
    let mut total = AvailabilityCounts::default();
    for date in period.dates() {
        let buckets: Vec<HourlyBucket> = ctx
            .docs
            .collection(&paths::hourly_collection(owner, date))
            .await?
            .into_iter()
            .map(|(_, bucket)| bucket)
            .collect();
        total = total.add(count_hours(&buckets));
    }
    Ok(total)
}

async fn rolled_up_counts(
    ctx: &PipelineContext,
    owner: &str,
    period: &Period,
) -> Result<AvailabilityCounts, AppError> {
    let docs = ctx
        .docs
        .collection::<SensorAnalytics>(&paths::analytics_collection(owner, PeriodLevel::Daily))
        .await?;
    Ok(docs
        .iter()
        .filter(|(id, _)| parse_date(id).is_ok_and(|date| period_contains(period, date)))
        .map(|(_, doc)| AvailabilityCounts::of_analytics(doc))
        .fold(AvailabilityCounts::default(), AvailabilityCounts::add))
}

/// Recompute and merge-write the availability counters of `period`.
///
/// Returns the stored document, or `None` without writing when every
/// counter is zero.
pub async fn generate(
    ctx: &PipelineContext,
    owner: &str,
    period: &Period,
    source: DocumentSource,
) -> Result<Option<SensorAnalytics>, AppError> {
    let counts = match period.level() {
        PeriodLevel::Daily => daily_counts(ctx, owner, period).await?,
        PeriodLevel::Weekly | PeriodLevel::Monthly => rolled_up_counts(ctx, owner, period).await?,
    };

    if counts.is_zero() {
        debug!(owner = %owner, period = %period, "no availability data, analytics skipped");
        return Ok(None);
    }

    let path = paths::analytics(owner, period);
    let patch = AnalyticsPatch {
        counts,
        generated_at: Utc::now(),
        source,
    };
    ctx.docs.set_merge(&path, &patch).await?;
    debug!(owner = %owner, period = %period, ?counts, "sensor analytics written");

    ctx.docs.get(&path).await
}
