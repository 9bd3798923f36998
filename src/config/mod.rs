use anyhow::{bail, Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

pub mod defaults;
pub mod duration_serde;

use defaults::*;
use duration_serde::duration;

use crate::errors::QueryError;
use crate::models::{DataSource, RadiusQuery};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root of the on-disk cache; `landmarks/` and `images/` live below it
    #[serde(default = "default_cache_root")]
    pub cache_root: PathBuf,
}

impl StorageConfig {
    pub fn landmarks_dir(&self) -> PathBuf {
        self.cache_root.join(LANDMARKS_DIR_NAME)
    }

    pub fn images_dir(&self) -> PathBuf {
        self.cache_root.join(IMAGES_DIR_NAME)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Freshness window callers use for lookups
    #[serde(default = "default_max_age", with = "duration")]
    pub max_age: Duration,
    /// Image downloads a single `put` runs at once
    #[serde(default = "default_image_concurrency")]
    pub image_concurrency: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_image_timeout", with = "duration")]
    pub image_timeout: Duration,
    #[serde(default = "default_fetch_timeout", with = "duration")]
    pub fetch_timeout: Duration,
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default)]
    pub default_source: DataSource,
    /// Serve configured fixture landmarks instead of calling any API
    #[serde(default)]
    pub test_mode: bool,
    #[serde(default)]
    pub wikipedia: WikipediaConfig,
    #[serde(default)]
    pub places: PlacesConfig,
    #[serde(default)]
    pub test_landmarks: BTreeMap<String, TestLandmark>,
    #[serde(default)]
    pub test_centers: BTreeMap<String, TestCenter>,
}

impl SourcesConfig {
    /// Source actually used once `test_mode` is taken into account
    pub fn effective_source(&self) -> DataSource {
        if self.test_mode {
            DataSource::Test
        } else {
            self.default_source
        }
    }

    /// Radius query for a named test centre, if one is configured
    pub fn test_center_query(&self, name: &str) -> Result<Option<RadiusQuery>, QueryError> {
        self.test_centers
            .get(name)
            .map(|c| RadiusQuery::new(c.lat, c.lon, c.radius_km))
            .transpose()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WikipediaConfig {
    /// `{language}` is replaced with the query language
    #[serde(default = "default_wikipedia_api_url_template")]
    pub api_url_template: String,
    #[serde(default = "default_wikipedia_min_request_interval", with = "duration")]
    pub min_request_interval: Duration,
    #[serde(default = "default_wikipedia_result_limit")]
    pub result_limit: u32,
    #[serde(default = "default_wikipedia_max_radius_km")]
    pub max_radius_km: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacesConfig {
    /// Falls back to the `GOOGLE_MAPS_API_KEY` environment variable when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_places_nearby_url")]
    pub nearby_url: String,
    #[serde(default = "default_places_photo_url")]
    pub photo_url: String,
    #[serde(default = "default_places_place_type")]
    pub place_type: String,
    #[serde(default = "default_places_min_request_interval", with = "duration")]
    pub min_request_interval: Duration,
    #[serde(default = "default_places_max_radius_km")]
    pub max_radius_km: f64,
    #[serde(default = "default_places_photo_max_width")]
    pub photo_max_width: u32,
}

impl PlacesConfig {
    /// Configured key, else the environment one. Blank keys count as missing.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(PLACES_API_KEY_ENV).ok())
            .filter(|key| !key.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestLandmark {
    pub title: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCenter {
    pub lat: f64,
    pub lon: f64,
    pub radius_km: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

// Storage defaults
fn default_cache_root() -> PathBuf {
    PathBuf::from(DEFAULT_CACHE_ROOT)
}

// Cache defaults
fn default_max_age() -> Duration {
    Duration::from_secs(DEFAULT_MAX_AGE_SECS)
}

fn default_image_concurrency() -> usize {
    DEFAULT_IMAGE_CONCURRENCY
}

// HTTP defaults
fn default_image_timeout() -> Duration {
    Duration::from_secs(DEFAULT_IMAGE_TIMEOUT_SECS)
}

fn default_fetch_timeout() -> Duration {
    Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS)
}

fn default_max_image_bytes() -> u64 {
    DEFAULT_MAX_IMAGE_BYTES
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

// Source defaults
fn default_wikipedia_api_url_template() -> String {
    DEFAULT_WIKIPEDIA_API_URL_TEMPLATE.to_string()
}

fn default_wikipedia_min_request_interval() -> Duration {
    Duration::from_secs(DEFAULT_WIKIPEDIA_MIN_REQUEST_INTERVAL_SECS)
}

fn default_wikipedia_result_limit() -> u32 {
    DEFAULT_WIKIPEDIA_RESULT_LIMIT
}

fn default_wikipedia_max_radius_km() -> f64 {
    DEFAULT_WIKIPEDIA_MAX_RADIUS_KM
}

fn default_places_nearby_url() -> String {
    DEFAULT_PLACES_NEARBY_URL.to_string()
}

fn default_places_photo_url() -> String {
    DEFAULT_PLACES_PHOTO_URL.to_string()
}

fn default_places_place_type() -> String {
    DEFAULT_PLACES_PLACE_TYPE.to_string()
}

fn default_places_min_request_interval() -> Duration {
    Duration::from_millis(DEFAULT_PLACES_MIN_REQUEST_INTERVAL_MS)
}

fn default_places_max_radius_km() -> f64 {
    DEFAULT_PLACES_MAX_RADIUS_KM
}

fn default_places_photo_max_width() -> u32 {
    DEFAULT_PLACES_PHOTO_MAX_WIDTH
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            cache_root: default_cache_root(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_age: default_max_age(),
            image_concurrency: default_image_concurrency(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            image_timeout: default_image_timeout(),
            fetch_timeout: default_fetch_timeout(),
            max_image_bytes: default_max_image_bytes(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            default_source: DataSource::default(),
            test_mode: false,
            wikipedia: WikipediaConfig::default(),
            places: PlacesConfig::default(),
            test_landmarks: BTreeMap::new(),
            test_centers: BTreeMap::new(),
        }
    }
}

impl Default for WikipediaConfig {
    fn default() -> Self {
        Self {
            api_url_template: default_wikipedia_api_url_template(),
            min_request_interval: default_wikipedia_min_request_interval(),
            result_limit: default_wikipedia_result_limit(),
            max_radius_km: default_wikipedia_max_radius_km(),
        }
    }
}

impl Default for PlacesConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            nearby_url: default_places_nearby_url(),
            photo_url: default_places_photo_url(),
            place_type: default_places_place_type(),
            min_request_interval: default_places_min_request_interval(),
            max_radius_km: default_places_max_radius_km(),
            photo_max_width: default_places_photo_max_width(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Config {
    /// Load from the file named by `CONFIG_FILE` (default `config.toml`)
    pub fn load() -> Result<Self> {
        let config_file =
            std::env::var(CONFIG_FILE_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::load_from_file(&config_file)
    }

    /// Defaults, then the TOML file if it exists, then `LANDMARKS_*`
    /// environment variables (`__` separates sections).
    pub fn load_from_file(config_file: impl AsRef<Path>) -> Result<Self> {
        let config_file = config_file.as_ref();

        let config: Config = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .with_context(|| format!("Failed to load configuration from {}", config_file.display()))?;

        config.validate()?;

        if config_file.exists() {
            info!("Configuration loaded from: {}", config_file.display());
        } else {
            info!(
                "Configuration file {} not found, using defaults and environment",
                config_file.display()
            );
        }

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cache.image_concurrency == 0 {
            bail!("cache.image_concurrency must be at least 1");
        }
        if self.http.image_timeout.is_zero() || self.http.fetch_timeout.is_zero() {
            bail!("http timeouts must be greater than zero");
        }
        if self.http.user_agent.trim().is_empty() {
            bail!("http.user_agent must not be blank");
        }
        if self.sources.wikipedia.result_limit == 0 || self.sources.wikipedia.result_limit > 500 {
            bail!("sources.wikipedia.result_limit must be between 1 and 500");
        }
        if !self.sources.wikipedia.api_url_template.contains("{language}") {
            bail!("sources.wikipedia.api_url_template must contain {{language}}");
        }
        let max_radius = self.sources.wikipedia.max_radius_km;
        if !max_radius.is_finite() || max_radius <= 0.0 {
            bail!("sources.wikipedia.max_radius_km must be positive");
        }
        let places = &self.sources.places;
        if !places.max_radius_km.is_finite()
            || places.max_radius_km <= 0.0
            || places.max_radius_km > DEFAULT_PLACES_MAX_RADIUS_KM
        {
            bail!(
                "sources.places.max_radius_km must be in (0, {}]",
                DEFAULT_PLACES_MAX_RADIUS_KM
            );
        }
        if places.photo_max_width == 0 || places.photo_max_width > 1600 {
            bail!("sources.places.photo_max_width must be between 1 and 1600");
        }
        Ok(())
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
