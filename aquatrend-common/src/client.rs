use chrono::NaiveDate;
use tracing::debug;

use crate::error::{AquaTrendError, Result, ServerErrorBody};
use crate::period::{MonthKey, Period, PeriodLevel, WeekKey, date_key};
use crate::types::*;

/// A client for reading aggregates from, and triggering work on, an
/// aquatrend-server instance.
pub struct AquaTrendClient {
    http: reqwest::Client,
    server_url: String,
}

impl AquaTrendClient {
    /// Create a new client pointing at the given server URL.
    pub fn new(server_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            server_url: server_url.trim_end_matches('/').to_string(),
        }
    }

    /// Returns the server URL this client is configured with.
    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    // -------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------

    /// All hourly buckets recorded for `date`, ordered by hour.
    pub async fn hourly_buckets(
        &self,
        owner: &str,
        date: NaiveDate,
    ) -> Result<Vec<HourlyBucketEntry>> {
        self.get(&format!("/owners/{owner}/hourly/{}", date_key(date)))
            .await
    }

    pub async fn daily_report(&self, owner: &str, date: NaiveDate) -> Result<DailyReport> {
        self.get(&format!("/owners/{owner}/daily/{}", date_key(date)))
            .await
    }

    pub async fn weekly_report(&self, owner: &str, week: WeekKey) -> Result<WeeklyReport> {
        self.get(&format!("/owners/{owner}/weekly/{week}")).await
    }

    pub async fn monthly_report(&self, owner: &str, month: MonthKey) -> Result<MonthlyReport> {
        self.get(&format!("/owners/{owner}/monthly/{month}")).await
    }

    pub async fn sensor_analytics(&self, owner: &str, period: Period) -> Result<SensorAnalytics> {
        self.get(&format!(
            "/owners/{owner}/analytics/{}/{period}",
            period.level()
        ))
        .await
    }

    // -------------------------------------------------------------------
    // Triggers
    // -------------------------------------------------------------------

    /// Run the aggregator, analytics and trend steps for one period.
    pub async fn aggregate(&self, owner: &str, period: Period) -> Result<AggregateResponse> {
        let resp = self
            .http
            .post(self.url(&format!(
                "/owners/{owner}/aggregate/{}/{period}",
                period.level()
            )))
            .send()
            .await?;
        self.handle_response(resp).await
    }

    /// Re-aggregate the day, week and month containing "now" on the server.
    pub async fn refresh(&self, owner: &str) -> Result<RefreshSummary> {
        let resp = self
            .http
            .post(self.url(&format!("/owners/{owner}/refresh")))
            .send()
            .await?;
        self.handle_response(resp).await
    }

    pub async fn backfill(
        &self,
        owner: &str,
        request: &BackfillRequest,
    ) -> Result<BackfillSummary> {
        debug!(owner, stages = ?request.stages, "requesting backfill");
        let resp = self
            .http
            .post(self.url(&format!("/owners/{owner}/backfill")))
            .json(request)
            .send()
            .await?;
        self.handle_response(resp).await
    }

    pub async fn seed(&self, owner: &str) -> Result<SeedReport> {
        let resp = self
            .http
            .post(self.url(&format!("/owners/{owner}/seed")))
            .send()
            .await?;
        self.handle_response(resp).await
    }

    /// Publish the latest value of a sensor.
    pub async fn put_sensor_reading(
        &self,
        owner: &str,
        sensor: &str,
        reading: &SensorReading,
    ) -> Result<()> {
        let resp = self
            .http
            .put(self.url(&format!("/owners/{owner}/sensors/{sensor}")))
            .json(reading)
            .send()
            .await?;
        self.handle_response_no_body(resp).await
    }

    /// Record a feeding and return its id.
    pub async fn add_feeding(&self, owner: &str, record: &FeedingRecord) -> Result<String> {
        let resp = self
            .http
            .post(self.url(&format!("/owners/{owner}/feedings")))
            .json(record)
            .send()
            .await?;
        let created: FeedingCreated = self.handle_response(resp).await?;
        Ok(created.id)
    }

    /// Parse a level and key pair, for callers holding raw strings.
    pub fn period(level: &str, key: &str) -> Result<Period> {
        let level: PeriodLevel = level.parse()?;
        Ok(Period::parse(level, key)?)
    }

    // -------------------------------------------------------------------
    // Private helpers
    // -------------------------------------------------------------------

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.server_url)
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let resp = self.http.get(self.url(path)).send().await?;
        self.handle_response(resp).await
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T> {
        if !resp.status().is_success() {
            return Err(self.extract_server_error(resp).await);
        }
        Ok(resp.json().await?)
    }

    async fn handle_response_no_body(&self, resp: reqwest::Response) -> Result<()> {
        if !resp.status().is_success() {
            return Err(self.extract_server_error(resp).await);
        }
        Ok(())
    }

    async fn extract_server_error(&self, resp: reqwest::Response) -> AquaTrendError {
        let status = resp.status().as_u16();
        let message = match resp.json::<ServerErrorBody>().await {
            Ok(body) => body.to_string(),
            Err(_) => format!("HTTP {status}"),
        };
        AquaTrendError::Server { status, message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_trimmed() {
        let client = AquaTrendClient::new("http://localhost:8300/");
        assert_eq!(client.server_url(), "http://localhost:8300");
        assert_eq!(
            client.url("/owners/pond-1/daily/2024-06-20"),
            "http://localhost:8300/owners/pond-1/daily/2024-06-20"
        );
    }

    #[test]
    fn period_helper_validates_keys() {
        let period = AquaTrendClient::period("weekly", "2024-W25").unwrap();
        assert_eq!(period.key(), "2024-W25");
        let err = AquaTrendClient::period("weekly", "2024-25").unwrap_err();
        assert_eq!(err.kind(), "period");
        assert!(AquaTrendClient::period("hourly", "2024-06-20").is_err());
    }
}
