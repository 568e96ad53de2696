#[cfg(feature = "client")]
use std::fmt;

use chrono::NaiveDate;

/// Rejection of a calendar key or range supplied by a caller.
///
/// These are input-validation failures and are never coerced into a
/// nearby valid period.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PeriodError {
    #[error("invalid date key '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("invalid ISO week key '{0}', expected YYYY-Wxx")]
    InvalidWeek(String),

    #[error("invalid month key '{0}', expected YYYY-MM")]
    InvalidMonth(String),

    #[error("invalid hour '{0}', expected 00-23")]
    InvalidHour(String),

    #[error("invalid period level '{0}', expected daily, weekly or monthly")]
    InvalidLevel(String),

    #[error("invalid date range: {from} is after {to}")]
    InvalidRange { from: NaiveDate, to: NaiveDate },
}

#[cfg(feature = "client")]
#[derive(Debug, thiserror::Error)]
pub enum AquaTrendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("period error: {0}")]
    Period(#[from] PeriodError),
}

#[cfg(feature = "client")]
pub type Result<T> = std::result::Result<T, AquaTrendError>;

#[cfg(feature = "client")]
impl AquaTrendError {
    /// Return a short label for the error category.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Http(_) => "http",
            Self::Json(_) => "json",
            Self::Server { .. } => "server",
            Self::Period(_) => "period",
        }
    }

    /// True when the server answered 404 for the requested document.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Server { status: 404, .. })
    }
}

/// Server error response shape: `{"error": "..."}`.
#[cfg(feature = "client")]
#[derive(serde::Deserialize)]
pub(crate) struct ServerErrorBody {
    pub error: String,
}

#[cfg(feature = "client")]
impl fmt::Display for ServerErrorBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.error)
    }
}
