use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::period::PeriodLevel;

// ---------------------------------------------------------------------------
// Provenance
// ---------------------------------------------------------------------------

/// Which part of the pipeline last wrote a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentSource {
    Sampler,
    HourlyGenerator,
    Aggregator,
    Backfill,
    Seed,
}

impl fmt::Display for DocumentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Sampler => "sampler",
            Self::HourlyGenerator => "hourly-generator",
            Self::Aggregator => "aggregator",
            Self::Backfill => "backfill",
            Self::Seed => "seed",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Aggregate documents
// ---------------------------------------------------------------------------

/// One hour of folded sensor samples.
///
/// Stored at `{owner}/hourlyRecords/{date}/hours/{HH}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HourlyBucket {
    #[serde(default)]
    pub temperature_sum: f64,
    #[serde(default)]
    pub temperature_count: u32,
    pub temperature_avg: Option<f64>,
    #[serde(default)]
    pub ph_sum: f64,
    #[serde(default)]
    pub ph_count: u32,
    pub ph_avg: Option<f64>,
    pub feed_used_kg: Option<f64>,
    #[serde(default)]
    pub is_seed: bool,
    pub source: Option<DocumentSource>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl HourlyBucket {
    /// Zero-valued placeholder so an empty collection still renders.
    pub fn seed(now: DateTime<Utc>) -> Self {
        Self {
            temperature_avg: Some(0.0),
            ph_avg: Some(0.0),
            feed_used_kg: Some(0.0),
            is_seed: true,
            source: Some(DocumentSource::Seed),
            updated_at: Some(now),
            ..Self::default()
        }
    }

    pub fn has_temperature(&self) -> bool {
        self.temperature_count > 0
    }

    pub fn has_ph(&self) -> bool {
        self.ph_count > 0
    }

    /// True when at least one real sensor reading was folded in.
    pub fn has_reading(&self) -> bool {
        self.has_temperature() || self.has_ph()
    }
}

/// Daily rollup of the hourly buckets of one date.
///
/// Stored at `{owner}/dailyReports/{date}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyReport {
    pub avg_temperature: Option<f64>,
    pub avg_ph: Option<f64>,
    pub total_feed_kg: Option<f64>,
    #[serde(default)]
    pub coverage_hours: u32,
    #[serde(default)]
    pub is_seed: bool,
    pub generated_at: Option<DateTime<Utc>>,
    pub source: Option<DocumentSource>,
}

impl DailyReport {
    pub fn seed(now: DateTime<Utc>) -> Self {
        Self {
            avg_temperature: Some(0.0),
            avg_ph: Some(0.0),
            total_feed_kg: Some(0.0),
            coverage_hours: 0,
            is_seed: true,
            generated_at: Some(now),
            source: Some(DocumentSource::Seed),
        }
    }

    /// A report that may feed a weekly or monthly rollup.
    pub fn is_real(&self) -> bool {
        !self.is_seed && self.coverage_hours > 0
    }
}

/// Weekly or monthly rollup built from daily reports.
///
/// Stored at `{owner}/weeklyReports/{YYYY-Wxx}` or
/// `{owner}/monthlyReports/{YYYY-MM}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodReport {
    pub avg_temperature: Option<f64>,
    pub avg_ph: Option<f64>,
    pub total_feed_kg: Option<f64>,
    #[serde(default)]
    pub coverage_days: u32,
    #[serde(default)]
    pub is_seed: bool,
    pub generated_at: Option<DateTime<Utc>>,
    pub source: Option<DocumentSource>,
}

impl PeriodReport {
    pub fn seed(now: DateTime<Utc>) -> Self {
        Self {
            avg_temperature: Some(0.0),
            avg_ph: Some(0.0),
            total_feed_kg: Some(0.0),
            coverage_days: 0,
            is_seed: true,
            generated_at: Some(now),
            source: Some(DocumentSource::Seed),
        }
    }
}

pub type WeeklyReport = PeriodReport;
pub type MonthlyReport = PeriodReport;

/// Direction of an availability counter against the previous period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Stable,
    #[default]
    Unknown,
}

impl Trend {
    /// Compare a counter with its value in the previous period.
    pub fn between(current: Option<u32>, previous: Option<u32>) -> Self {
        match (current, previous) {
            (Some(c), Some(p)) if c > p => Self::Up,
            (Some(c), Some(p)) if c < p => Self::Down,
            (Some(_), Some(_)) => Self::Stable,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Stable => "stable",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Sensor availability counters for one period.
///
/// Daily documents count hours; weekly and monthly documents are sums of
/// the daily counters, so they are also expressed in hours.
///
/// Stored at `{owner}/sensorAnalytics/{level}/{periodId}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorAnalytics {
    #[serde(default)]
    pub temp_availability: u32,
    #[serde(default)]
    pub ph_availability: u32,
    #[serde(default)]
    pub both_sensors_availability: u32,
    #[serde(default)]
    pub no_data_hours: u32,
    #[serde(default)]
    pub temp_trend: Trend,
    #[serde(default)]
    pub ph_trend: Trend,
    #[serde(default)]
    pub both_sensors_trend: Trend,
    pub generated_at: Option<DateTime<Utc>>,
    pub source: Option<DocumentSource>,
}

/// The three trend verdicts written back onto an analytics document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendSet {
    pub temp_trend: Trend,
    pub ph_trend: Trend,
    pub both_sensors_trend: Trend,
}

// ---------------------------------------------------------------------------
// Collaborator records
// ---------------------------------------------------------------------------

/// Latest value of one sensor. Only the most recent reading exists upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorReading {
    pub value: f64,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Status value marking a feeding as carried out.
pub const FEEDING_COMPLETED: &str = "completed";

/// A scheduled feeding event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedingRecord {
    pub scheduled_time: DateTime<Utc>,
    pub feed_amount: f64,
    /// Free-form status from the feeding schedule, e.g. `completed`.
    #[serde(default)]
    pub status: Option<String>,
}

impl FeedingRecord {
    /// Feed counts toward usage when completed or when no status was set.
    pub fn counts_as_used(&self) -> bool {
        match &self.status {
            None => true,
            Some(status) => status.eq_ignore_ascii_case(FEEDING_COMPLETED),
        }
    }
}

// ---------------------------------------------------------------------------
// API types
// ---------------------------------------------------------------------------

/// One hourly bucket tagged with its hour key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyBucketEntry {
    pub hour: String,
    pub bucket: HourlyBucket,
}

/// Outcome of running an aggregator and its analytics/trend steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateResponse {
    pub level: PeriodLevel,
    pub period: String,
    /// Coverage counter of the written aggregate; `None` means no write.
    pub coverage: Option<u32>,
    pub analytics: Option<SensorAnalytics>,
}

/// Outcome of refreshing the periods containing "now".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshSummary {
    pub date: String,
    pub week: String,
    pub month: String,
    pub daily_coverage: Option<u32>,
    pub weekly_coverage: Option<u32>,
    pub monthly_coverage: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackfillStage {
    Hourly,
    Daily,
    Periods,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackfillRequest {
    /// Required by the hourly stage.
    #[serde(default)]
    pub from: Option<NaiveDate>,
    #[serde(default)]
    pub to: Option<NaiveDate>,
    pub stages: Vec<BackfillStage>,
}

/// Counters from the hourly backfill stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HourlyBackfillReport {
    pub generated: u32,
    pub skipped: u32,
    pub failed: u32,
}

/// Counters from a daily, weekly or monthly regeneration pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageReport {
    /// Periods whose aggregate was (re)written.
    pub regenerated: Vec<String>,
    /// Periods with zero coverage, left untouched.
    pub skipped: Vec<String>,
    pub failed: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodBackfillReport {
    pub weekly: StageReport,
    pub monthly: StageReport,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackfillSummary {
    pub hourly: Option<HourlyBackfillReport>,
    pub daily: Option<StageReport>,
    pub periods: Option<PeriodBackfillReport>,
}

/// Id assigned to a recorded feeding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedingCreated {
    pub id: String,
}

/// Collections a dashboard screen reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SeedCollection {
    HourlyRecords,
    DailyReports,
    WeeklyReports,
    MonthlyReports,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedReport {
    pub seeded: Vec<SeedCollection>,
}
