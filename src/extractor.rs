//! The extraction loop
//!
//! Each cycle runs the same fixed sequence:
//!
//! 1. **Reconnect** through the [`Connector`] (may yield no connection)
//! 2. **Query** the weather API for the configured city batch
//! 3. **Compute path** from the current UTC minute
//! 4. **Write** the response body, serialized, to the store
//! 5. **Sleep** for the configured interval
//!
//! Nothing survives from one cycle to the next except what the connector
//! chooses to cache. Failures in steps 1, 2 and 4 are logged and end the cycle
//! early at worst; the loop itself never stops.
//!
//! # Example
//!
//! ```no_run
//! use weather_extract::config::Settings;
//! use weather_extract::extractor::Extractor;
//! use weather_extract::provider::AdlsConnector;
//! use weather_extract::weather::WeatherClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = Settings::load("app_config.toml", "WeatherConfig")?;
//! let weather = WeatherClient::new(&settings.extractor, &settings.credentials.weather_api_token)?;
//! let connector = AdlsConnector::new(settings.credentials, &settings.extractor)?;
//!
//! let mut extractor = Extractor::new(connector, weather, &settings.extractor);
//! extractor.run().await;
//! # Ok(())
//! # }
//! ```

use crate::clock::{Clock, Sleeper, SystemClock, TokioSleeper};
use crate::config::ExtractorConfig;
use crate::partition::output_path;
use crate::provider::Connector;
use crate::store::{WriteStatus, write_json_file};
use crate::weather::WeatherSource;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// What happened in one cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// 1-based cycle number within this run
    pub cycle: u64,
    /// Whether the connector produced a store handle
    pub connected: bool,
    /// Instant the output path was derived from, if the query succeeded
    pub captured_at: Option<DateTime<Utc>>,
    /// Outcome of the query and write
    pub outcome: CycleOutcome,
}

/// How far a cycle got
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The query failed before any response arrived; nothing was written
    QueryFailed {
        /// Error reported by the weather client
        reason: String,
    },
    /// A response arrived and a write was attempted
    Attempted {
        /// HTTP status of the weather response
        http_status: u16,
        /// Result of the write
        write: WriteStatus,
    },
}

impl CycleReport {
    /// Whether the payload reached the store
    pub fn archived(&self) -> bool {
        matches!(
            &self.outcome,
            CycleOutcome::Attempted { write, .. } if write.is_written()
        )
    }

    /// Store path written or attempted, if the cycle got that far
    pub fn path(&self) -> Option<&str> {
        match &self.outcome {
            CycleOutcome::Attempted { write, .. } => Some(write.path()),
            CycleOutcome::QueryFailed { .. } => None,
        }
    }
}

/// Repeats connect → query → write → sleep
pub struct Extractor<C, W> {
    connector: C,
    weather: W,
    clock: Arc<dyn Clock>,
    sleeper: Arc<dyn Sleeper>,
    city_batch: String,
    city_labels: String,
    output_root: String,
    file_name: String,
    interval: Duration,
    cycles: u64,
}

impl<C, W> Extractor<C, W>
where
    C: Connector,
    W: WeatherSource,
{
    /// Loop over the wall clock and the tokio timer
    pub fn new(connector: C, weather: W, config: &ExtractorConfig) -> Self {
        Self {
            connector,
            weather,
            clock: Arc::new(SystemClock),
            sleeper: Arc::new(TokioSleeper),
            city_batch: config.city_batch(),
            city_labels: config.city_labels(),
            output_root: config.output_root.clone(),
            file_name: config.file_name.clone(),
            interval: config.interval,
            cycles: 0,
        }
    }

    /// Replace the clock output paths are derived from
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the sleeper used between cycles
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Number of cycles run so far
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// The connector, for inspection between cycles
    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Run one cycle without the trailing sleep
    pub async fn run_cycle(&mut self) -> CycleReport {
        self.cycles += 1;
        let cycle = self.cycles;

        let store = self.connector.connect().await;
        let connected = store.is_some();
        if !connected {
            warn!(cycle, "No store connection this cycle, the write will fail");
        }

        info!(cycle, cities = %self.city_batch, "Querying weather API");
        let response = match self.weather.fetch_group(&self.city_batch).await {
            Ok(response) => response,
            Err(e) => {
                error!(cycle, error = %e, code = e.error_code(), "Weather query failed");
                return CycleReport {
                    cycle,
                    connected,
                    captured_at: None,
                    outcome: CycleOutcome::QueryFailed {
                        reason: e.to_string(),
                    },
                };
            }
        };

        if !response.is_success() {
            warn!(
                cycle,
                status = response.status,
                "Weather API returned an error status, archiving the body as-is"
            );
        }

        let captured_at = self.clock.now();
        let path = output_path(&self.output_root, captured_at, &self.file_name);

        info!(cycle, path = %path, bytes = response.body.len(), "Writing payload");
        let write = write_json_file(store.as_deref(), &path, &response.body).await;

        CycleReport {
            cycle,
            connected,
            captured_at: Some(captured_at),
            outcome: CycleOutcome::Attempted {
                http_status: response.status,
                write,
            },
        }
    }

    /// Run `n` cycles, each followed by the interval sleep
    pub async fn run_cycles(&mut self, n: usize) -> Vec<CycleReport> {
        let mut reports = Vec::with_capacity(n);
        for _ in 0..n {
            reports.push(self.run_cycle().await);
            self.pause().await;
        }
        reports
    }

    /// Run until the process is terminated
    pub async fn run(&mut self) {
        info!(
            interval_secs = self.interval.as_secs(),
            cities = %self.city_labels,
            "Extraction loop started"
        );
        loop {
            let report = self.run_cycle().await;
            if report.archived() {
                info!(cycle = report.cycle, "Cycle complete");
            } else {
                warn!(cycle = report.cycle, outcome = ?report.outcome, "Cycle ended without archiving");
            }
            self.pause().await;
        }
    }

    async fn pause(&self) {
        info!(seconds = self.interval.as_secs(), "Sleeping until next cycle");
        self.sleeper.sleep(self.interval).await;
    }
}
