//! Validated query accepted by the comment pipeline.

use feddit_api_types::{Classification, SortBy, SortOrder};

use super::error::PipelineError;

pub const MIN_LIMIT: u32 = 1;
pub const MAX_LIMIT: u32 = 100;

/// Every option the pipeline understands, checked once at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineQuery {
    collection: String,
    limit: u32,
    skip: u32,
    sort_by: Option<SortBy>,
    sort_order: SortOrder,
    filter_by: Option<Classification>,
}

impl PipelineQuery {
    /// Build a query with upstream ordering and no filter.
    ///
    /// Rejects an empty collection name, `limit` outside `[1, 100]` and a
    /// negative `skip`.
    pub fn new(collection: &str, limit: i64, skip: i64) -> Result<Self, PipelineError> {
        let collection = collection.trim();
        if collection.is_empty() {
            return Err(PipelineError::invalid_argument(
                "collection",
                "must not be empty",
            ));
        }

        let limit = u32::try_from(limit)
            .ok()
            .filter(|limit| (MIN_LIMIT..=MAX_LIMIT).contains(limit))
            .ok_or_else(|| {
                PipelineError::invalid_argument(
                    "limit",
                    format!("must be between {MIN_LIMIT} and {MAX_LIMIT}, got {limit}"),
                )
            })?;

        let skip = u32::try_from(skip).map_err(|_| {
            PipelineError::invalid_argument(
                "skip",
                format!("must be between 0 and {}, got {skip}", u32::MAX),
            )
        })?;

        Ok(Self {
            collection: collection.to_string(),
            limit,
            skip,
            sort_by: None,
            sort_order: SortOrder::default(),
            filter_by: None,
        })
    }

    pub fn with_sort(mut self, sort_by: Option<SortBy>, sort_order: SortOrder) -> Self {
        self.sort_by = sort_by;
        self.sort_order = sort_order;
        self
    }

    pub fn with_filter(mut self, filter_by: Option<Classification>) -> Self {
        self.filter_by = filter_by;
        self
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn skip(&self) -> u32 {
        self.skip
    }

    pub fn sort_by(&self) -> Option<SortBy> {
        self.sort_by
    }

    pub fn sort_order(&self) -> SortOrder {
        self.sort_order
    }

    pub fn filter_by(&self) -> Option<Classification> {
        self.filter_by
    }
}
