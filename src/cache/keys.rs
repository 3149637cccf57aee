//! Cache key definitions.

use std::fmt;

/// Identifies one cached page: `(collection, limit, skip)`.
///
/// Collection names are compared case-insensitively upstream, so the key
/// stores them trimmed and lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    collection: String,
    limit: u32,
    skip: u32,
}

impl CacheKey {
    pub fn new(collection: &str, limit: u32, skip: u32) -> Self {
        Self {
            collection: collection.trim().to_lowercase(),
            limit,
            skip,
        }
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
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.collection, self.limit, self.skip)
    }
}
