//! Places source backed by the Google Places Nearby Search API
//!
//! One Nearby Search request per fetch. Photo references become photo API
//! URLs and the place id becomes a maps link, so no per-place details calls
//! are made.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};
use url::Url;

use super::traits::LandmarkSource;
use crate::config::{HttpConfig, PlacesConfig};
use crate::errors::{SourceError, SourceResult};
use crate::models::{Coordinates, DataSource, LandmarkRecord, Qualifiers, RegionQuery};
use crate::utils::haversine_km;

const SOURCE_NAME: &str = "places";
const STATUS_OK: &str = "OK";
const STATUS_ZERO_RESULTS: &str = "ZERO_RESULTS";
const ERROR_BODY_MAX_CHARS: usize = 200;
const DEFAULT_RATING: f64 = 3.0;
const MAX_RATING: f64 = 5.0;
const DISTANCE_WEIGHT: f64 = 0.6;
const RATING_WEIGHT: f64 = 0.4;
const MIN_RELEVANCE: f64 = 0.1;
const MAPS_PLACE_URL: &str = "https://www.google.com/maps/place/?q=place_id:";

pub struct PlacesSource {
    client: Client,
    api_key: String,
    nearby_url: String,
    photo_url: String,
    place_type: String,
    min_request_interval: Duration,
    max_radius_km: f64,
    photo_max_width: u32,
    last_request: Mutex<Option<Instant>>,
}

impl PlacesSource {
    /// Fails with `NotConfigured` when no API key is configured or exported
    pub fn new(config: &PlacesConfig, http: &HttpConfig) -> SourceResult<Self> {
        let api_key = config
            .resolved_api_key()
            .ok_or(SourceError::NotConfigured {
                source_kind: DataSource::PlacesApi,
            })?;

        let client = Client::builder()
            .timeout(http.fetch_timeout)
            .user_agent(http.user_agent.as_str())
            .build()?;

        Ok(Self {
            client,
            api_key,
            nearby_url: config.nearby_url.clone(),
            photo_url: config.photo_url.clone(),
            place_type: config.place_type.clone(),
            min_request_interval: config.min_request_interval,
            max_radius_km: config.max_radius_km,
            photo_max_width: config.photo_max_width,
            last_request: Mutex::new(None),
        })
    }

    pub(crate) fn request_params(
        &self,
        query: &RegionQuery,
        qualifiers: &Qualifiers,
    ) -> Vec<(&'static str, String)> {
        let center = query.center();
        // results are filtered by the uncapped radius afterwards
        let radius_m = (query.covering_radius_km().min(self.max_radius_km) * 1000.0)
            .round()
            .max(1.0);

        vec![
            ("location", format!("{},{}", center.lat, center.lon)),
            ("radius", format!("{radius_m:.0}")),
            ("type", self.place_type.clone()),
            ("language", qualifiers.language().to_string()),
            ("key", self.api_key.clone()),
        ]
    }

    /// Photo API URL for a photo reference
    pub fn photo_url(&self, photo_reference: &str) -> String {
        let width = self.photo_max_width.to_string();
        match Url::parse_with_params(
            &self.photo_url,
            [
                ("maxwidth", width.as_str()),
                ("photo_reference", photo_reference),
                ("key", self.api_key.as_str()),
            ],
        ) {
            Ok(url) => url.into(),
            Err(_) => format!(
                "{}?maxwidth={}&photo_reference={}&key={}",
                self.photo_url, width, photo_reference, self.api_key
            ),
        }
    }

    async fn throttle(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_request_interval {
                let wait = self.min_request_interval - elapsed;
                debug!("Rate limiting Places request for {:?}", wait);
                tokio::time::sleep(wait).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[async_trait]
impl LandmarkSource for PlacesSource {
    fn kind(&self) -> DataSource {
        DataSource::PlacesApi
    }

    async fn fetch(
        &self,
        query: &RegionQuery,
        qualifiers: &Qualifiers,
    ) -> SourceResult<Vec<LandmarkRecord>> {
        self.throttle().await;

        // the key is a query parameter, keep it out of the logs
        debug!("Querying {} for places around {}", self.nearby_url, query);

        let response = self
            .client
            .get(&self.nearby_url)
            .query(&self.request_params(query, qualifiers))
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
                message: body.chars().take(ERROR_BODY_MAX_CHARS).collect(),
            });
        }

        let records = parse_nearby_response(
            &body,
            query.center(),
            query.covering_radius_km(),
            |reference| self.photo_url(reference),
        )?;
        info!("Fetched {} landmarks from Places for {}", records.len(), query);
        Ok(records)
    }
}

#[derive(Debug, Deserialize)]
struct NearbyResponse {
    status: String,
    #[serde(default)]
    results: Vec<Place>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Place {
    name: String,
    geometry: Geometry,
    #[serde(default)]
    vicinity: Option<String>,
    #[serde(default)]
    rating: Option<f64>,
    #[serde(default)]
    place_id: Option<String>,
    #[serde(default)]
    photos: Vec<Photo>,
    #[serde(default)]
    types: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Deserialize)]
struct Photo {
    photo_reference: String,
}

/// Turn a Nearby Search response into records in API order, dropping places
/// farther than `radius_km` from `center`. `photo_url` maps a photo
/// reference to a fetchable URL.
pub fn parse_nearby_response(
    body: &str,
    center: Coordinates,
    radius_km: f64,
    photo_url: impl Fn(&str) -> String,
) -> SourceResult<Vec<LandmarkRecord>> {
    let response: NearbyResponse =
        serde_json::from_str(body).map_err(|e| SourceError::Parse {
            source_name: SOURCE_NAME.to_string(),
            message: e.to_string(),
        })?;

    match response.status.as_str() {
        STATUS_OK => {}
        STATUS_ZERO_RESULTS => return Ok(Vec::new()),
        _ => {
            return Err(SourceError::Api {
                code: response.status,
                info: response.error_message.unwrap_or_default(),
            })
        }
    }

    let records = response
        .results
        .into_iter()
        .filter_map(|place| place_to_record(place, center, radius_km, &photo_url))
        .collect();
    Ok(records)
}

fn place_to_record(
    place: Place,
    center: Coordinates,
    radius_km: f64,
    photo_url: &impl Fn(&str) -> String,
) -> Option<LandmarkRecord> {
    let coordinates = Coordinates::new(place.geometry.location.lat, place.geometry.location.lng);
    let distance_km = haversine_km(center, coordinates);
    if distance_km > radius_km {
        debug!("Skipping {} at {:.2} km, outside {} km", place.name, distance_km, radius_km);
        return None;
    }

    let relevance = relevance(distance_km, radius_km, place.rating);
    let mut record = LandmarkRecord::new(place.name, coordinates)
        .with_summary(place.vicinity.unwrap_or_default())
        .with_distance_km(round2(distance_km))
        .with_relevance(round2(relevance));

    if let Some(place_id) = place.place_id {
        record = record.with_source_url(format!("{MAPS_PLACE_URL}{place_id}"));
    }
    if let Some(kind) = place.types.first() {
        record = record.with_kind(kind);
    }
    if let Some(photo) = place.photos.first() {
        record = record.with_image_ref(photo_url(&photo.photo_reference));
    }
    Some(record)
}

/// Nearness and rating blended, rating defaulting to 3 of 5
fn relevance(distance_km: f64, radius_km: f64, rating: Option<f64>) -> f64 {
    let nearness = if radius_km > 0.0 {
        1.0 - distance_km / radius_km
    } else {
        0.0
    };
    let rating = rating.unwrap_or(DEFAULT_RATING);
    (DISTANCE_WEIGHT * nearness + RATING_WEIGHT * rating / MAX_RATING).clamp(MIN_RELEVANCE, 1.0)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
