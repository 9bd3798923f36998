//! Data source adapters
//!
//! A [`LandmarkSource`] turns a region query into landmark records. The cache
//! orchestrator depends only on the trait; [`build_source`] picks the
//! concrete adapter from configuration.

use std::sync::Arc;

use tracing::info;

pub mod places;
pub mod static_source;
pub mod traits;
pub mod wikipedia;

pub use places::{parse_nearby_response, PlacesSource};
pub use static_source::StaticLandmarkSource;
pub use traits::LandmarkSource;
pub use wikipedia::{parse_geosearch_response, WikipediaSource};

#[cfg(test)]
pub use traits::MockLandmarkSource;

use crate::config::Config;
use crate::errors::SourceResult;
use crate::models::DataSource;

/// Adapter for the configured source, honouring `test_mode`
pub fn build_source(config: &Config) -> SourceResult<Arc<dyn LandmarkSource>> {
    let kind = config.sources.effective_source();
    let source: Arc<dyn LandmarkSource> = match kind {
        DataSource::Test => {
            let source = StaticLandmarkSource::from_config(&config.sources);
            info!("Using test landmark source ({} fixtures)", source.len());
            Arc::new(source)
        }
        DataSource::Encyclopedia => {
            info!(
                "Using Wikipedia landmark source ({})",
                config.sources.wikipedia.api_url_template
            );
            Arc::new(WikipediaSource::new(
                &config.sources.wikipedia,
                &config.http,
            )?)
        }
        DataSource::PlacesApi => {
            info!("Using Places landmark source ({})", config.sources.places.nearby_url);
            Arc::new(PlacesSource::new(&config.sources.places, &config.http)?)
        }
    };
    Ok(source)
}
