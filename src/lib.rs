//! # weather-extract
//!
//! Scheduled extractor that archives OpenWeatherMap observations to Azure Data
//! Lake Store.
//!
//! Every cycle authenticates to the store, fetches current weather for a fixed
//! batch of cities, and appends the raw response (re-indented, keys sorted) to
//! `raw/weather_data/{year}/{month}/{day}/{hour}/{minute}/weather_data.json`,
//! then sleeps for ten minutes. The payload is never validated: error
//! responses are archived like any other.
//!
//! ## Quick Start
//!
//! ```no_run
//! use weather_extract::{AdlsConnector, Extractor, Settings, WeatherClient};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Settings::load("app_config.toml", "WeatherConfig")?;
//!
//!     let weather = WeatherClient::new(
//!         &settings.extractor,
//!         settings.credentials.weather_api_token.clone(),
//!     )?;
//!     let connector = AdlsConnector::new(settings.credentials, &settings.extractor)?;
//!
//!     Extractor::new(connector, weather, &settings.extractor).run().await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Azure AD token exchange
pub mod auth;
/// Injectable time sources
pub mod clock;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// The extraction loop
pub mod extractor;
/// Time-partitioned output paths
pub mod partition;
/// Store connection provider
pub mod provider;
/// Retry logic with exponential backoff
pub mod retry;
/// Object storage backends
pub mod store;
/// Weather API client
pub mod weather;

// Re-export commonly used types
pub use config::{City, Credentials, ExtractorConfig, Settings, TokenRefresh};
pub use error::{Error, Result};
pub use extractor::{CycleOutcome, CycleReport, Extractor};
pub use partition::{output_path, partition_path};
pub use provider::{AdlsConnector, Connector, MemoryConnector};
pub use store::{AdlsStore, MemoryStore, ObjectStore, WriteStatus, write_json_file};
pub use weather::{WeatherClient, WeatherResponse, WeatherSource};
