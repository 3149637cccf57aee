use axum::Json;
use axum::extract::{Path, Query, State};
use feddit_api_types::{
    CommentInfo, CommentsQuery, CommentsResponse, HealthResponse, SentimentAnalysis,
    SentimentRequest, WelcomeResponse,
};

use crate::application::query::PipelineQuery;
use crate::domain::comments::AnnotatedComment;
use crate::domain::sentiment::SentimentResult;

use super::error::ApiError;
use super::state::HttpState;

const SERVICE_NAME: &str = "feddit";

pub async fn root() -> Json<WelcomeResponse> {
    Json(WelcomeResponse {
        message: "Welcome to Feddit API".to_string(),
    })
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: SERVICE_NAME.to_string(),
    })
}

/// Annotated comments of one subfeddit, optionally filtered and sorted.
pub async fn list_comments(
    State(state): State<HttpState>,
    Path(name): Path<String>,
    Query(query): Query<CommentsQuery>,
) -> Result<Json<CommentsResponse>, ApiError> {
    let limit = query.limit.unwrap_or(i64::from(state.default_limit));
    let skip = query.skip.unwrap_or(0);
    let sort_order = query.sort_order.unwrap_or_default();

    let pipeline_query = PipelineQuery::new(&name, limit, skip)?
        .with_sort(query.sort_by, sort_order)
        .with_filter(query.filter_by);

    let page = state.pipeline.query(&pipeline_query).await?;

    Ok(Json(CommentsResponse {
        subfeddit_id: page.subfeddit_id,
        subfeddit_name: name,
        limit: pipeline_query.limit(),
        skip: pipeline_query.skip(),
        sort_by: pipeline_query.sort_by(),
        sort_order: pipeline_query.sort_order(),
        filter_by: pipeline_query.filter_by(),
        total: page.total,
        comments: page.comments.into_iter().map(comment_to_api).collect(),
    }))
}

pub async fn analyze_sentiment(
    State(state): State<HttpState>,
    Json(request): Json<SentimentRequest>,
) -> Json<SentimentAnalysis> {
    Json(sentiment_to_api(state.pipeline.analyze(&request.text)))
}

fn comment_to_api(annotated: AnnotatedComment) -> CommentInfo {
    let AnnotatedComment { comment, sentiment } = annotated;
    CommentInfo {
        id: comment.id,
        username: comment.username,
        text: comment.text,
        created_at: comment.created_at,
        sentiment: sentiment_to_api(sentiment),
    }
}

fn sentiment_to_api(result: SentimentResult) -> SentimentAnalysis {
    SentimentAnalysis {
        polarity: result.polarity,
        classification: result.classification,
    }
}
