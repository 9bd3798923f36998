use async_trait::async_trait;

use crate::errors::SourceResult;
use crate::models::{DataSource, LandmarkRecord, Qualifiers, RegionQuery};

/// Produces landmark records for a region.
///
/// Implementations own their retry, rate limiting and relevance scoring; the
/// cache never retries on their behalf. Returned records need not be
/// validated, the cache drops invalid ones when storing.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LandmarkSource: Send + Sync {
    /// Which `DataSource` this adapter serves
    fn kind(&self) -> DataSource;

    async fn fetch(
        &self,
        query: &RegionQuery,
        qualifiers: &Qualifiers,
    ) -> SourceResult<Vec<LandmarkRecord>>;
}
