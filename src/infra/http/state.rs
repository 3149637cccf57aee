use std::sync::Arc;

use crate::application::pipeline::CommentPipeline;

#[derive(Clone)]
pub struct HttpState {
    pub pipeline: Arc<CommentPipeline>,
    /// Page size used when a request omits `limit`.
    pub default_limit: u32,
}
