#[cfg(feature = "client")]
mod client;
mod error;
pub mod period;
mod types;

#[cfg(feature = "client")]
pub use client::AquaTrendClient;
#[cfg(feature = "client")]
pub use error::{AquaTrendError, Result};
pub use error::PeriodError;
pub use types::*;
