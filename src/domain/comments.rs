//! Comment records as fetched from upstream and as served after annotation.

use serde::{Deserialize, Serialize};

use super::sentiment::{self, Classification, SentimentResult};

/// A comment exactly as the upstream API returned it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub username: String,
    pub text: String,
    /// Unix epoch seconds.
    pub created_at: i64,
}

/// A comment paired with the sentiment computed for its text.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedComment {
    pub comment: Comment,
    pub sentiment: SentimentResult,
}

impl AnnotatedComment {
    pub fn annotate(comment: Comment) -> Self {
        let sentiment = sentiment::score(&comment.text);
        Self { comment, sentiment }
    }

    pub fn polarity(&self) -> f64 {
        self.sentiment.polarity
    }

    pub fn classification(&self) -> Classification {
        self.sentiment.classification
    }

    pub fn created_at(&self) -> i64 {
        self.comment.created_at
    }
}
