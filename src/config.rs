//! Configuration types for weather-extract
//!
//! Settings come from a single sectioned file. The credentials section (default
//! `WeatherConfig`) must hold the five secrets the extractor needs; everything
//! else lives in an optional `[extractor]` table whose fields all have defaults.
//!
//! ```toml
//! [WeatherConfig]
//! WEATHER_API_TOKEN = "..."
//! AZURE_TENANT_ID = "..."
//! ADLS_CLIENT_ID = "..."
//! ADLS_CLIENT_SECRET = "..."
//! ADLS_NAME = "mystore"
//!
//! [extractor]
//! interval_secs = 600
//! token_refresh = "cache_until_expiry"
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Section holding the credentials when none is given explicitly
pub const DEFAULT_SECTION: &str = "WeatherConfig";

/// Name of the optional table with loop tunables
pub const EXTRACTOR_SECTION: &str = "extractor";

/// Audience requested from the token endpoint for Data Lake Store access
pub const DATALAKE_RESOURCE: &str = "https://datalake.azure.net/";

/// Key names of the credentials section, in the order they are validated
pub const REQUIRED_KEYS: [&str; 5] = [
    "WEATHER_API_TOKEN",
    "AZURE_TENANT_ID",
    "ADLS_CLIENT_ID",
    "ADLS_CLIENT_SECRET",
    "ADLS_NAME",
];

/// The five secrets read from the credentials section
///
/// `Debug` redacts everything except the store name.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// OpenWeatherMap API key, sent as the `appid` query parameter
    pub weather_api_token: String,
    /// Azure AD tenant that owns the service principal
    pub azure_tenant_id: String,
    /// Service principal (application) id
    pub adls_client_id: String,
    /// Service principal secret
    pub adls_client_secret: String,
    /// Data Lake Store account name
    pub adls_name: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("weather_api_token", &"<redacted>")
            .field("azure_tenant_id", &self.azure_tenant_id)
            .field("adls_client_id", &self.adls_client_id)
            .field("adls_client_secret", &"<redacted>")
            .field("adls_name", &self.adls_name)
            .finish()
    }
}

/// A city queried on every cycle
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct City {
    /// OpenWeatherMap city id
    pub id: String,

    /// Display name, only used in logs
    #[serde(default)]
    pub name: String,
}

impl City {
    /// Create a city entry
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// How the connector treats bearer tokens between cycles
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenRefresh {
    /// Run the full token exchange at the start of every cycle (default)
    #[default]
    EveryCycle,
    /// Reuse the last token until shortly before it expires
    CacheUntilExpiry,
}

/// Retry configuration for transient failures of the weather query
///
/// Disabled unless `max_attempts` is raised above zero.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 0)
    #[serde(default)]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 0,
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

impl RetryConfig {
    fn validate(&self) -> Result<()> {
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(Error::config_key(
                "retry.backoff_multiplier",
                format!(
                    "backoff multiplier must be a finite number of at least 1.0, got {}",
                    self.backoff_multiplier
                ),
            ));
        }
        if self.initial_delay > self.max_delay {
            return Err(Error::config_key(
                "retry.initial_delay",
                "initial delay must not exceed max_delay",
            ));
        }
        Ok(())
    }
}

/// Loop tunables from the optional `[extractor]` table
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Cities batched into one request (default: six cities around Seattle, WA)
    #[serde(default = "default_cities")]
    pub cities: Vec<City>,

    /// Pause between cycles (default: 600 seconds)
    #[serde(
        default = "default_interval",
        rename = "interval_secs",
        with = "duration_serde"
    )]
    pub interval: Duration,

    /// Upper bound on every HTTP request the extractor makes (default: 30 seconds)
    #[serde(
        default = "default_request_timeout",
        rename = "request_timeout_secs",
        with = "duration_serde"
    )]
    pub request_timeout: Duration,

    /// Weather API origin (default: "http://api.openweathermap.org")
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Store directory the partition path is appended to (default: "raw/weather_data")
    #[serde(default = "default_output_root")]
    pub output_root: String,

    /// File name written inside each minute partition (default: "weather_data.json")
    #[serde(default = "default_file_name")]
    pub file_name: String,

    /// Token reuse policy (default: every_cycle)
    #[serde(default)]
    pub token_refresh: TokenRefresh,

    /// Azure AD authority (default: "https://login.microsoftonline.com")
    #[serde(default = "default_authority_host")]
    pub authority_host: String,

    /// Store endpoint; `{store}` is replaced by the account name
    /// (default: "https://{store}.azuredatalakestore.net")
    #[serde(default = "default_store_endpoint")]
    pub store_endpoint: String,

    /// Retry policy for the weather query
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            cities: default_cities(),
            interval: default_interval(),
            request_timeout: default_request_timeout(),
            api_base_url: default_api_base_url(),
            output_root: default_output_root(),
            file_name: default_file_name(),
            token_refresh: TokenRefresh::default(),
            authority_host: default_authority_host(),
            store_endpoint: default_store_endpoint(),
            retry: RetryConfig::default(),
        }
    }
}

impl ExtractorConfig {
    /// Comma-joined city ids, as sent in the `id` query parameter
    pub fn city_batch(&self) -> String {
        self.cities
            .iter()
            .map(|c| c.id.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Cities for log output, as `name (id)` or the bare id when unnamed
    pub fn city_labels(&self) -> String {
        self.cities
            .iter()
            .map(|c| {
                if c.name.is_empty() {
                    c.id.clone()
                } else {
                    format!("{} ({})", c.name, c.id)
                }
            })
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Resolve the store endpoint template for an account name
    pub fn store_url(&self, store: &str) -> Result<Url> {
        Ok(Url::parse(&self.store_endpoint.replace("{store}", store))?)
    }

    /// Token endpoint for a tenant
    pub fn token_url(&self, tenant_id: &str) -> Result<Url> {
        let base = Url::parse(&self.authority_host)?;
        Ok(base.join(&format!("{}/oauth2/token", tenant_id))?)
    }

    fn validate(&self) -> Result<()> {
        if self.cities.is_empty() {
            return Err(Error::config_key(
                "cities",
                "at least one city id is required",
            ));
        }
        if let Some(city) = self.cities.iter().find(|c| c.id.trim().is_empty()) {
            return Err(Error::config_key(
                "cities",
                format!("city '{}' has an empty id", city.name),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(Error::config_key(
                "request_timeout_secs",
                "request timeout must be positive",
            ));
        }
        self.retry.validate()?;
        Url::parse(&self.api_base_url)?;
        Url::parse(&self.authority_host)?;
        Ok(())
    }
}

/// Everything loaded from the configuration file
#[derive(Clone, Debug)]
pub struct Settings {
    /// Secrets from the credentials section
    pub credentials: Credentials,
    /// Loop tunables
    pub extractor: ExtractorConfig,
}

impl Settings {
    /// Read and parse a configuration file
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file cannot be read or parsed, if the
    /// section is missing, or if any of [`REQUIRED_KEYS`] is absent or empty.
    pub fn load(path: impl AsRef<Path>, section: &str) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("cannot read {}: {}", path.display(), e),
            key: None,
        })?;
        Self::from_toml_str(&text, section)
    }

    /// Parse configuration text
    pub fn from_toml_str(text: &str, section: &str) -> Result<Self> {
        let table: toml::Table = text.parse().map_err(|e: toml::de::Error| Error::Config {
            message: format!("invalid configuration file: {}", e.message()),
            key: None,
        })?;

        let credentials = credentials_from_table(&table, section)?;

        let extractor = match table.get(EXTRACTOR_SECTION) {
            Some(value) => value
                .clone()
                .try_into::<ExtractorConfig>()
                .map_err(|e| Error::Config {
                    message: format!("invalid [{}] table: {}", EXTRACTOR_SECTION, e.message()),
                    key: Some(EXTRACTOR_SECTION.to_string()),
                })?,
            None => ExtractorConfig::default(),
        };
        extractor.validate()?;

        Ok(Self {
            credentials,
            extractor,
        })
    }
}

/// Load only the credentials section of a configuration file
pub fn load_credentials(path: impl AsRef<Path>, section: &str) -> Result<Credentials> {
    Settings::load(path, section).map(|s| s.credentials)
}

fn credentials_from_table(table: &toml::Table, section: &str) -> Result<Credentials> {
    let section_table = table
        .get(section)
        .and_then(|v| v.as_table())
        .ok_or_else(|| Error::Config {
            message: format!("section [{}] not found", section),
            key: None,
        })?;

    let get = |key: &str| -> Result<String> {
        match section_table.get(key) {
            Some(toml::Value::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
            Some(toml::Value::String(_)) => Err(Error::config_key(
                key,
                format!("{} in [{}] is empty", key, section),
            )),
            Some(_) => Err(Error::config_key(
                key,
                format!("{} in [{}] must be a string", key, section),
            )),
            None => Err(Error::config_key(
                key,
                format!("missing required key {} in [{}]", key, section),
            )),
        }
    };

    Ok(Credentials {
        weather_api_token: get(REQUIRED_KEYS[0])?,
        azure_tenant_id: get(REQUIRED_KEYS[1])?,
        adls_client_id: get(REQUIRED_KEYS[2])?,
        adls_client_secret: get(REQUIRED_KEYS[3])?,
        adls_name: get(REQUIRED_KEYS[4])?,
    })
}

fn default_cities() -> Vec<City> {
    vec![
        City::new("5747882", "Redmond, WA, USA"),
        City::new("5809844", "Seattle, WA, USA"),
        City::new("5799841", "Kirkland, WA, USA"),
        City::new("5816449", "Woodinville, WA, USA"),
        City::new("5812944", "Tacoma, WA, USA"),
        City::new("5786882", "Bellevue, WA, USA"),
    ]
}

fn default_interval() -> Duration {
    Duration::from_secs(600)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_api_base_url() -> String {
    "http://api.openweathermap.org".to_string()
}

fn default_output_root() -> String {
    "raw/weather_data".to_string()
}

fn default_file_name() -> String {
    "weather_data.json".to_string()
}

fn default_authority_host() -> String {
    "https://login.microsoftonline.com".to_string()
}

fn default_store_endpoint() -> String {
    "https://{store}.azuredatalakestore.net".to_string()
}

fn default_true() -> bool {
    true
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const FULL: &str = r#"
[WeatherConfig]
WEATHER_API_TOKEN = "owm-token"
AZURE_TENANT_ID = "tenant-1"
ADLS_CLIENT_ID = "client-1"
ADLS_CLIENT_SECRET = "s3cret"
ADLS_NAME = "weatherlake"
"#;

    #[test]
    fn loads_all_five_credentials() {
        let settings = Settings::from_toml_str(FULL, DEFAULT_SECTION).unwrap();
        let c = settings.credentials;
        assert_eq!(c.weather_api_token, "owm-token");
        assert_eq!(c.azure_tenant_id, "tenant-1");
        assert_eq!(c.adls_client_id, "client-1");
        assert_eq!(c.adls_client_secret, "s3cret");
        assert_eq!(c.adls_name, "weatherlake");
    }

    #[test]
    fn defaults_apply_without_extractor_table() {
        let settings = Settings::from_toml_str(FULL, DEFAULT_SECTION).unwrap();
        let ex = settings.extractor;
        assert_eq!(ex.interval, Duration::from_secs(600));
        assert_eq!(ex.request_timeout, Duration::from_secs(30));
        assert_eq!(ex.token_refresh, TokenRefresh::EveryCycle);
        assert_eq!(ex.retry.max_attempts, 0);
        assert_eq!(
            ex.city_batch(),
            "5747882,5809844,5799841,5816449,5812944,5786882"
        );
    }

    #[test]
    fn each_missing_key_is_reported_by_name() {
        for missing in REQUIRED_KEYS {
            let text: String = FULL
                .lines()
                .filter(|l| !l.starts_with(missing))
                .collect::<Vec<_>>()
                .join("\n");

            let err = Settings::from_toml_str(&text, DEFAULT_SECTION).unwrap_err();
            match err {
                Error::Config { key, .. } => assert_eq!(key.as_deref(), Some(missing)),
                other => panic!("expected config error for {missing}, got {other:?}"),
            }
        }
    }

    #[test]
    fn empty_value_is_rejected() {
        let text = FULL.replace("\"weatherlake\"", "\"  \"");
        let err = Settings::from_toml_str(&text, DEFAULT_SECTION).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
        assert!(err.to_string().contains("ADLS_NAME"));
    }

    #[test]
    fn missing_section_is_a_config_error() {
        let err = Settings::from_toml_str(FULL, "Production").unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
        assert!(err.to_string().contains("[Production]"));
    }

    #[test]
    fn other_sections_are_selectable() {
        let text = FULL.replace("[WeatherConfig]", "[Staging]");
        let settings = Settings::from_toml_str(&text, "Staging").unwrap();
        assert_eq!(settings.credentials.adls_name, "weatherlake");
    }

    #[test]
    fn extractor_table_overrides_defaults() {
        let text = format!(
            "{FULL}\n[extractor]\ninterval_secs = 60\nrequest_timeout_secs = 5\n\
             token_refresh = \"cache_until_expiry\"\n\
             cities = [{{ id = \"1\" }}, {{ id = \"2\", name = \"Two\" }}]\n\
             [extractor.retry]\nmax_attempts = 3\njitter = false\n"
        );
        let ex = Settings::from_toml_str(&text, DEFAULT_SECTION)
            .unwrap()
            .extractor;
        assert_eq!(ex.interval, Duration::from_secs(60));
        assert_eq!(ex.request_timeout, Duration::from_secs(5));
        assert_eq!(ex.token_refresh, TokenRefresh::CacheUntilExpiry);
        assert_eq!(ex.city_batch(), "1,2");
        assert_eq!(ex.cities[1].name, "Two");
        assert_eq!(ex.retry.max_attempts, 3);
        assert!(!ex.retry.jitter);
        assert_eq!(ex.retry.initial_delay, Duration::from_secs(1));
    }

    #[test]
    fn city_labels_prefer_names() {
        let ex = ExtractorConfig {
            cities: vec![City::new("5747882", "Redmond, WA, USA"), City::new("42", "")],
            ..Default::default()
        };
        assert_eq!(ex.city_labels(), "Redmond, WA, USA (5747882); 42");
    }

    #[test]
    fn empty_city_list_is_rejected() {
        let text = format!("{FULL}\n[extractor]\ncities = []\n");
        let err = Settings::from_toml_str(&text, DEFAULT_SECTION).unwrap_err();
        assert!(matches!(err, Error::Config { key: Some(ref k), .. } if k == "cities"));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let text = format!("{FULL}\n[extractor]\nrequest_timeout_secs = 0\n");
        assert!(Settings::from_toml_str(&text, DEFAULT_SECTION).is_err());
    }

    fn with_retry_table(retry: &str) -> String {
        format!("{FULL}\n[extractor.retry]\nmax_attempts = 2\ninitial_delay = 1\n{retry}\n")
    }

    #[test]
    fn negative_backoff_multiplier_is_rejected() {
        let text = with_retry_table("backoff_multiplier = -1.0");
        let err = Settings::from_toml_str(&text, DEFAULT_SECTION).unwrap_err();
        assert!(
            matches!(err, Error::Config { key: Some(ref k), .. } if k == "retry.backoff_multiplier")
        );
    }

    #[test]
    fn non_finite_backoff_multiplier_is_rejected() {
        for value in ["nan", "inf", "0.5"] {
            let text = with_retry_table(&format!("backoff_multiplier = {value}"));
            let err = Settings::from_toml_str(&text, DEFAULT_SECTION).unwrap_err();
            assert!(
                matches!(err, Error::Config { key: Some(ref k), .. } if k == "retry.backoff_multiplier"),
                "{value} was accepted"
            );
        }
    }

    #[test]
    fn initial_delay_above_max_delay_is_rejected() {
        let text = with_retry_table("max_delay = 0");
        let err = Settings::from_toml_str(&text, DEFAULT_SECTION).unwrap_err();
        assert!(
            matches!(err, Error::Config { key: Some(ref k), .. } if k == "retry.initial_delay")
        );
    }

    #[test]
    fn large_max_delay_is_accepted() {
        let text = with_retry_table("max_delay = 9223372036854775807\nbackoff_multiplier = 1e300");
        let retry = Settings::from_toml_str(&text, DEFAULT_SECTION)
            .unwrap()
            .extractor
            .retry;
        assert_eq!(retry.max_delay, Duration::from_secs(i64::MAX as u64));
    }

    #[test]
    fn endpoint_urls_are_resolved() {
        let ex = ExtractorConfig::default();
        assert_eq!(
            ex.store_url("weatherlake").unwrap().as_str(),
            "https://weatherlake.azuredatalakestore.net/"
        );
        assert_eq!(
            ex.token_url("tenant-1").unwrap().as_str(),
            "https://login.microsoftonline.com/tenant-1/oauth2/token"
        );
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let settings = Settings::from_toml_str(FULL, DEFAULT_SECTION).unwrap();
        let rendered = format!("{:?}", settings.credentials);
        assert!(!rendered.contains("s3cret"));
        assert!(!rendered.contains("owm-token"));
        assert!(rendered.contains("weatherlake"));
    }

    #[test]
    fn load_reads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(FULL.as_bytes()).unwrap();

        let creds = load_credentials(file.path(), DEFAULT_SECTION).unwrap();
        assert_eq!(creds.adls_client_id, "client-1");
    }

    #[test]
    fn unreadable_file_is_a_config_error() {
        let err = load_credentials("/nonexistent/app_config.toml", DEFAULT_SECTION).unwrap_err();
        assert!(matches!(err, Error::Config { key: None, .. }));
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let err = Settings::from_toml_str("[WeatherConfig\nfoo", DEFAULT_SECTION).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }
}
