//! Common test utilities for weather-extract integration tests

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::io::Write;
use tempfile::NamedTempFile;
use weather_extract::Settings;
use weather_extract::config::DEFAULT_SECTION;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Tenant id used by the mocked token endpoint
pub const TENANT: &str = "tenant-1";

/// Bearer token the mocked token endpoint hands out
pub const TOKEN: &str = "mock-bearer";

/// Write a configuration file whose endpoints all point at `server`
pub fn mock_config_file(server: &MockServer, cities: &[&str], secret: &str) -> NamedTempFile {
    let city_list = cities
        .iter()
        .map(|id| format!("{{ id = \"{id}\" }}"))
        .collect::<Vec<_>>()
        .join(", ");
    let text = format!(
        r#"
[WeatherConfig]
WEATHER_API_TOKEN = "owm-token"
AZURE_TENANT_ID = "{TENANT}"
ADLS_CLIENT_ID = "client-1"
ADLS_CLIENT_SECRET = "{secret}"
ADLS_NAME = "weatherlake"

[extractor]
interval_secs = 0
request_timeout_secs = 5
api_base_url = "{uri}"
authority_host = "{uri}"
store_endpoint = "{uri}"
cities = [{city_list}]
"#,
        uri = server.uri()
    );

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file
}

/// Token endpoint accepting only `good-secret`
pub async fn mount_token_endpoint(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(format!("/{TENANT}/oauth2/token")))
        .and(wiremock::matchers::body_string_contains("client_secret=good-secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "token_type": "Bearer",
            "expires_in": "3599",
            "access_token": TOKEN
        })))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path(format!("/{TENANT}/oauth2/token")))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": "invalid_client",
            "error_description": "AADSTS7000215: Invalid client secret provided."
        })))
        .with_priority(10)
        .mount(server)
        .await;
}

/// WebHDFS endpoints: every file is absent and every create succeeds
pub async fn mount_empty_store(server: &MockServer) {
    Mock::given(method("GET"))
        .and(query_param("op", "GETFILESTATUS"))
        .respond_with(ResponseTemplate::new(404))
        .mount(server)
        .await;

    Mock::given(method("PUT"))
        .and(query_param("op", "CREATE"))
        .respond_with(ResponseTemplate::new(201))
        .mount(server)
        .await;
}

/// Weather endpoint returning `body` for any query
pub async fn mount_weather(server: &MockServer, body: &str) {
    Mock::given(method("GET"))
        .and(path("/data/2.5/group"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

/// Load settings for live tests from `WEATHER_EXTRACT_CONFIG` (via `.env`)
///
/// Returns `None` when no live configuration is available.
pub fn live_settings() -> Option<Settings> {
    dotenvy::dotenv().ok();
    let path = std::env::var("WEATHER_EXTRACT_CONFIG").ok()?;
    let section =
        std::env::var("WEATHER_EXTRACT_SECTION").unwrap_or_else(|_| DEFAULT_SECTION.to_string());
    match Settings::load(&path, &section) {
        Ok(settings) => Some(settings),
        Err(e) => {
            eprintln!("Live configuration at {path} unusable: {e}");
            None
        }
    }
}
