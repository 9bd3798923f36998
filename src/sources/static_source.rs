//! Fixture backed source used in test mode

use async_trait::async_trait;
use tracing::debug;

use super::traits::LandmarkSource;
use crate::config::{SourcesConfig, TestLandmark};
use crate::errors::SourceResult;
use crate::models::{Coordinates, DataSource, LandmarkRecord, Qualifiers, RegionQuery};
use crate::utils::haversine_km;

/// Serves the configured test landmarks for every query, in configuration
/// order. Distances are measured from the query centre; nothing is filtered.
#[derive(Debug, Clone, Default)]
pub struct StaticLandmarkSource {
    landmarks: Vec<TestLandmark>,
}

impl StaticLandmarkSource {
    pub fn new(landmarks: impl IntoIterator<Item = TestLandmark>) -> Self {
        Self {
            landmarks: landmarks.into_iter().collect(),
        }
    }

    pub fn from_config(sources: &SourcesConfig) -> Self {
        Self::new(sources.test_landmarks.values().cloned())
    }

    pub fn len(&self) -> usize {
        self.landmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty()
    }

    fn to_record(landmark: &TestLandmark, center: Coordinates) -> LandmarkRecord {
        let coordinates = Coordinates::new(landmark.lat, landmark.lon);
        let distance = (haversine_km(center, coordinates) * 100.0).round() / 100.0;

        let mut record = LandmarkRecord::new(landmark.title.clone(), coordinates)
            .with_summary(format!("Test summary for {}", landmark.title))
            .with_source_url(landmark.url.clone())
            .with_distance_km(distance)
            .with_relevance(1.0);
        if let Some(image_url) = &landmark.image_url {
            record = record.with_image_ref(image_url.clone());
        }
        record
    }
}

#[async_trait]
impl LandmarkSource for StaticLandmarkSource {
    fn kind(&self) -> DataSource {
        DataSource::Test
    }

    async fn fetch(
        &self,
        query: &RegionQuery,
        _qualifiers: &Qualifiers,
    ) -> SourceResult<Vec<LandmarkRecord>> {
        debug!("Serving {} test landmarks for {}", self.landmarks.len(), query);
        let center = query.center();
        Ok(self
            .landmarks
            .iter()
            .map(|landmark| Self::to_record(landmark, center))
            .collect())
    }
}
