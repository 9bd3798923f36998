/// Configuration default values
///
/// This module contains all the default values for configuration options,
/// making them easily changeable in one central location.
// Storage defaults
pub const DEFAULT_CACHE_ROOT: &str = "./cache";
pub const LANDMARKS_DIR_NAME: &str = "landmarks";
pub const IMAGES_DIR_NAME: &str = "images";

// Cache defaults
pub const DEFAULT_MAX_AGE_SECS: u64 = 24 * 60 * 60;
pub const DEFAULT_IMAGE_CONCURRENCY: usize = 4;

// HTTP defaults
pub const DEFAULT_IMAGE_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_MAX_IMAGE_BYTES: u64 = 10 * 1024 * 1024; // 10MB
pub const DEFAULT_USER_AGENT: &str = "LandmarkExplorer/1.0";

// Wikipedia source defaults
pub const DEFAULT_WIKIPEDIA_API_URL_TEMPLATE: &str = "https://{language}.wikipedia.org/w/api.php";
pub const DEFAULT_WIKIPEDIA_MIN_REQUEST_INTERVAL_SECS: u64 = 1;
pub const DEFAULT_WIKIPEDIA_RESULT_LIMIT: u32 = 50;
// geosearch rejects radii above 10 km
pub const DEFAULT_WIKIPEDIA_MAX_RADIUS_KM: f64 = 10.0;

// Places source defaults
pub const DEFAULT_PLACES_NEARBY_URL: &str =
    "https://maps.googleapis.com/maps/api/place/nearbysearch/json";
pub const DEFAULT_PLACES_PHOTO_URL: &str = "https://maps.googleapis.com/maps/api/place/photo";
pub const DEFAULT_PLACES_PLACE_TYPE: &str = "tourist_attraction";
pub const DEFAULT_PLACES_MIN_REQUEST_INTERVAL_MS: u64 = 100;
// Nearby Search rejects radii above 50 km
pub const DEFAULT_PLACES_MAX_RADIUS_KM: f64 = 50.0;
pub const DEFAULT_PLACES_PHOTO_MAX_WIDTH: u32 = 800;
pub const PLACES_API_KEY_ENV: &str = "GOOGLE_MAPS_API_KEY";

// Logging defaults
pub const DEFAULT_LOG_LEVEL: &str = "info";

// Environment
pub const CONFIG_FILE_ENV: &str = "CONFIG_FILE";
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";
pub const ENV_PREFIX: &str = "LANDMARKS_";
