//! Encyclopedia source backed by the MediaWiki geosearch API
//!
//! One request per fetch: `generator=geosearch` finds pages around the query
//! and the `coordinates`, `extracts`, `pageimages` and `info` props fill in
//! each page, so no per-page follow-up calls are needed.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

use super::traits::LandmarkSource;
use crate::config::{HttpConfig, WikipediaConfig};
use crate::errors::{SourceError, SourceResult};
use crate::models::{Coordinates, DataSource, LandmarkRecord, Qualifiers, RegionQuery};
use crate::utils::haversine_km;

const SOURCE_NAME: &str = "wikipedia";
const SUMMARY_MAX_CHARS: usize = 200;
const THUMBNAIL_WIDTH_PX: u32 = 400;
// geosearch refuses radii below 10 m
const MIN_RADIUS_M: f64 = 10.0;
/// Distance at which relevance reaches zero
const RELEVANCE_HORIZON_KM: f64 = 10.0;

pub struct WikipediaSource {
    client: Client,
    api_url_template: String,
    min_request_interval: Duration,
    result_limit: u32,
    max_radius_km: f64,
    last_request: Mutex<Option<Instant>>,
}

impl WikipediaSource {
    pub fn new(config: &WikipediaConfig, http: &HttpConfig) -> SourceResult<Self> {
        let client = Client::builder()
            .timeout(http.fetch_timeout)
            .user_agent(http.user_agent.as_str())
            .build()?;

        Ok(Self {
            client,
            api_url_template: config.api_url_template.clone(),
            min_request_interval: config.min_request_interval,
            result_limit: config.result_limit,
            max_radius_km: config.max_radius_km,
            last_request: Mutex::new(None),
        })
    }

    /// API endpoint for a language edition
    pub fn api_url(&self, language: &str) -> String {
        self.api_url_template.replace("{language}", language)
    }

    pub(crate) fn request_params(&self, query: &RegionQuery) -> Vec<(&'static str, String)> {
        let mut params: Vec<(&'static str, String)> = [
            ("action", "query"),
            ("format", "json"),
            ("formatversion", "2"),
            ("generator", "geosearch"),
            ("prop", "coordinates|extracts|pageimages|info"),
            ("coprop", "type"),
            ("colimit", "max"),
            ("exintro", "1"),
            ("explaintext", "1"),
            ("exlimit", "max"),
            ("piprop", "thumbnail"),
            ("pilimit", "max"),
            ("inprop", "url"),
        ]
        .into_iter()
        .map(|(k, v)| (k, v.to_string()))
        .collect();

        params.push(("ggslimit", self.result_limit.to_string()));
        params.push(("pithumbsize", THUMBNAIL_WIDTH_PX.to_string()));

        match query {
            RegionQuery::Bounds(b) => {
                // top|left|bottom|right
                params.push((
                    "ggsbbox",
                    format!("{}|{}|{}|{}", b.north(), b.west(), b.south(), b.east()),
                ));
            }
            RegionQuery::Radius(r) => {
                let radius_m = (r.radius_km().min(self.max_radius_km) * 1000.0)
                    .round()
                    .max(MIN_RADIUS_M);
                params.push(("ggscoord", format!("{}|{}", r.center_lat(), r.center_lon())));
                params.push(("ggsradius", format!("{radius_m:.0}")));
            }
        }

        params
    }

    /// Wait until at least `min_request_interval` has passed since the previous request
    async fn throttle(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_request_interval {
                let wait = self.min_request_interval - elapsed;
                debug!("Rate limiting Wikipedia request for {:?}", wait);
                tokio::time::sleep(wait).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[async_trait]
impl LandmarkSource for WikipediaSource {
    fn kind(&self) -> DataSource {
        DataSource::Encyclopedia
    }

    async fn fetch(
        &self,
        query: &RegionQuery,
        qualifiers: &Qualifiers,
    ) -> SourceResult<Vec<LandmarkRecord>> {
        self.throttle().await;

        let url = self.api_url(qualifiers.language());
        debug!("Querying {} for landmarks around {}", url, query);

        let response = self
            .client
            .get(&url)
            .query(&self.request_params(query))
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
                message: truncate_chars(&body, SUMMARY_MAX_CHARS),
            });
        }

        let records = parse_geosearch_response(&body, query.center())?;
        info!(
            "Fetched {} landmarks from {}.wikipedia for {}",
            records.len(),
            qualifiers.language(),
            query
        );
        Ok(records)
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    query: Option<QueryBlock>,
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: String,
    #[serde(default)]
    info: String,
}

#[derive(Debug, Deserialize)]
struct QueryBlock {
    #[serde(default)]
    pages: Vec<Page>,
}

#[derive(Debug, Deserialize)]
struct Page {
    title: String,
    /// Position in the generator's result order (nearest first)
    #[serde(default)]
    index: Option<u32>,
    #[serde(default)]
    missing: bool,
    #[serde(default)]
    coordinates: Vec<PageCoordinate>,
    #[serde(default)]
    extract: Option<String>,
    #[serde(default)]
    thumbnail: Option<Thumbnail>,
    #[serde(default)]
    fullurl: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PageCoordinate {
    lat: f64,
    lon: f64,
    #[serde(default)]
    primary: bool,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    source: String,
}

/// Turn a `formatversion=2` geosearch response into records ordered
/// nearest first. Pages without coordinates are skipped.
pub fn parse_geosearch_response(
    body: &str,
    center: Coordinates,
) -> SourceResult<Vec<LandmarkRecord>> {
    let response: ApiResponse =
        serde_json::from_str(body).map_err(|e| SourceError::Parse {
            source_name: SOURCE_NAME.to_string(),
            message: e.to_string(),
        })?;

    if let Some(error) = response.error {
        return Err(SourceError::Api {
            code: error.code,
            info: error.info,
        });
    }

    // no `query` block means the search found nothing
    let mut pages = response.query.map(|q| q.pages).unwrap_or_default();
    pages.sort_by_key(|page| page.index.unwrap_or(u32::MAX));

    let records = pages
        .into_iter()
        .filter(|page| !page.missing)
        .filter_map(|page| page_to_record(page, center))
        .collect();
    Ok(records)
}

fn page_to_record(page: Page, center: Coordinates) -> Option<LandmarkRecord> {
    let Some(position) = page
        .coordinates
        .iter()
        .find(|c| c.primary)
        .or_else(|| page.coordinates.first())
    else {
        debug!("Skipping page without coordinates: {}", page.title);
        return None;
    };

    let coordinates = Coordinates::new(position.lat, position.lon);
    let distance_km = haversine_km(center, coordinates);
    let relevance = (1.0 - distance_km / RELEVANCE_HORIZON_KM).clamp(0.0, 1.0);

    let mut record = LandmarkRecord::new(page.title.clone(), coordinates)
        .with_summary(
            page.extract
                .as_deref()
                .map(|e| truncate_chars(e.trim(), SUMMARY_MAX_CHARS))
                .unwrap_or_default(),
        )
        .with_source_url(page.fullurl.clone().unwrap_or_default())
        .with_distance_km(distance_km)
        .with_relevance(relevance);

    if let Some(kind) = position.kind.as_deref() {
        record = record.with_kind(kind);
    }
    if let Some(thumbnail) = page.thumbnail {
        record = record.with_image_ref(thumbnail.source);
    }
    Some(record)
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", text[..cut].trim_end()),
        None => text.to_string(),
    }
}
