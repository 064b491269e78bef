//! weather-extract binary
//!
//! Takes no flags. The configuration file comes from `WEATHER_EXTRACT_CONFIG`
//! (default `app_config.toml`) and the credentials section from
//! `WEATHER_EXTRACT_SECTION` (default `WeatherConfig`). Setting
//! `WEATHER_EXTRACT_DRY_RUN=1` archives into memory instead of the data lake.
//! Log verbosity follows `RUST_LOG` (default `info`).

use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use weather_extract::config::DEFAULT_SECTION;
use weather_extract::{AdlsConnector, Extractor, MemoryConnector, Settings, WeatherClient};

const CONFIG_ENV: &str = "WEATHER_EXTRACT_CONFIG";
const SECTION_ENV: &str = "WEATHER_EXTRACT_SECTION";
const DRY_RUN_ENV: &str = "WEATHER_EXTRACT_DRY_RUN";
const DEFAULT_CONFIG_PATH: &str = "app_config.toml";

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config_path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let section = std::env::var(SECTION_ENV).unwrap_or_else(|_| DEFAULT_SECTION.to_string());
    let dry_run = std::env::var(DRY_RUN_ENV).is_ok_and(|v| v == "1" || v == "true");

    let settings = match Settings::load(&config_path, &section) {
        Ok(settings) => settings,
        Err(e) => {
            error!(path = %config_path, section = %section, error = %e, "Failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    info!(
        path = %config_path,
        section = %section,
        store = %settings.credentials.adls_name,
        cities = settings.extractor.cities.len(),
        dry_run,
        "Configuration loaded"
    );

    let weather = match WeatherClient::new(
        &settings.extractor,
        settings.credentials.weather_api_token.clone(),
    ) {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "Failed to create weather client");
            return ExitCode::FAILURE;
        }
    };

    if dry_run {
        Extractor::new(MemoryConnector::default(), weather, &settings.extractor)
            .run()
            .await;
    } else {
        let connector = match AdlsConnector::new(settings.credentials, &settings.extractor) {
            Ok(connector) => connector,
            Err(e) => {
                error!(error = %e, "Failed to create data lake connector");
                return ExitCode::FAILURE;
            }
        };
        Extractor::new(connector, weather, &settings.extractor)
            .run()
            .await;
    }

    ExitCode::SUCCESS
}
