//! Wire types shared by the Feddit sentiment service and its clients.
//!
//! Every type here is a plain serde value; the service converts its domain
//! records into these at the HTTP boundary.

use serde::{Deserialize, Serialize};

/// Three-way sentiment label derived from the sign of a polarity score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Positive,
    Negative,
    Neutral,
}

impl Classification {
    /// `> 0` is positive, `< 0` is negative, anything else (including NaN) is neutral.
    pub fn from_polarity(polarity: f64) -> Self {
        if polarity > 0.0 {
            Self::Positive
        } else if polarity < 0.0 {
            Self::Negative
        } else {
            Self::Neutral
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    Polarity,
    CreatedAt,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentAnalysis {
    pub polarity: f64,
    pub classification: Classification,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentInfo {
    pub id: i64,
    pub username: String,
    pub text: String,
    pub created_at: i64,
    pub sentiment: SentimentAnalysis,
}

/// Query string accepted by `GET /api/subfeddit/{name}/comments`.
///
/// Numeric fields are signed so range violations reach the service's own
/// validation instead of failing deserialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CommentsQuery {
    pub limit: Option<i64>,
    pub skip: Option<i64>,
    pub sort_by: Option<SortBy>,
    pub sort_order: Option<SortOrder>,
    pub filter_by: Option<Classification>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentsResponse {
    pub subfeddit_id: i64,
    pub subfeddit_name: String,
    pub limit: u32,
    pub skip: u32,
    pub sort_by: Option<SortBy>,
    pub sort_order: SortOrder,
    pub filter_by: Option<Classification>,
    /// Number of comments matching the filter before pagination.
    pub total: usize,
    pub comments: Vec<CommentInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentRequest {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WelcomeResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
}
