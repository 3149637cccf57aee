//! Retrieval, coalescing, caching and presentation of annotated comments.

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;

use feddit_api_types::{SortBy, SortOrder};
use futures::future::try_join_all;
use metrics::counter;
use tracing::{debug, info, warn};

use crate::cache::{CacheEntry, CacheKey, RequestCoalescer, ResultCache};
use crate::config::Settings;
use crate::domain::comments::AnnotatedComment;
use crate::domain::sentiment::{self, SentimentResult};

use super::error::PipelineError;
use super::query::PipelineQuery;
use super::upstream::{CommentSource, UpstreamError, UpstreamPage};

const DEFAULT_FETCH_WINDOW: u32 = 100;
const DEFAULT_MAX_BLOCKS: u32 = 10;
const DEFAULT_LOAD_DEADLINE: Duration = Duration::from_secs(30);
const DEFAULT_RETRY_ATTEMPTS: u32 = 2;
const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(100);

const METRIC_UPSTREAM_FETCH: &str = "feddit_upstream_fetch_total";
const METRIC_UPSTREAM_RETRY: &str = "feddit_upstream_retry_total";

/// Retries applied to transient upstream failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub attempts: u32,
    /// Delay before the first retry; doubled for each further retry.
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            attempts: 0,
            backoff: Duration::ZERO,
        }
    }

    fn delay_for(&self, retry: u32) -> Duration {
        self.backoff.saturating_mul(2u32.saturating_pow(retry))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_RETRY_ATTEMPTS,
            backoff: DEFAULT_RETRY_BACKOFF,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Comments fetched and cached per upstream block.
    pub fetch_window: u32,
    /// Blocks one query may span; `skip + limit` is capped at
    /// `fetch_window * max_blocks`.
    pub max_blocks: u32,
    /// Bound on one block load, retries and backoff included.
    pub load_deadline: Duration,
    pub retry: RetryPolicy,
}

impl PipelineConfig {
    /// Furthest comment position a query can reach.
    pub fn reach(&self) -> u64 {
        u64::from(self.fetch_window.max(1)) * u64::from(self.max_blocks.max(1))
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fetch_window: DEFAULT_FETCH_WINDOW,
            max_blocks: DEFAULT_MAX_BLOCKS,
            load_deadline: DEFAULT_LOAD_DEADLINE,
            retry: RetryPolicy::default(),
        }
    }
}

impl From<&Settings> for PipelineConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            fetch_window: settings.pipeline.fetch_window.get(),
            max_blocks: settings.pipeline.max_blocks.get(),
            load_deadline: settings.upstream.timeout,
            retry: RetryPolicy {
                attempts: settings.upstream.retry_attempts,
                backoff: settings.upstream.retry_backoff,
            },
        }
    }
}

/// One page of the filtered and sorted comment set.
#[derive(Debug, Clone, PartialEq)]
pub struct CommentPage {
    pub subfeddit_id: i64,
    /// Matches after filtering, before `skip`/`limit` are applied.
    pub total: usize,
    pub comments: Vec<AnnotatedComment>,
}

/// Serves [`PipelineQuery`]s from the cache, loading each block of a
/// collection from upstream at most once per TTL no matter how many callers
/// ask at once.
///
/// A query views the collection prefix made of every block up to the one
/// holding position `skip + limit - 1`; filtering, sorting and `total` apply
/// to that prefix. A short block marks the end of the collection.
pub struct CommentPipeline {
    source: Arc<dyn CommentSource>,
    cache: Arc<ResultCache>,
    coalescer: RequestCoalescer<CacheKey, Arc<CacheEntry>, PipelineError>,
    config: PipelineConfig,
}

impl CommentPipeline {
    pub fn new(
        source: Arc<dyn CommentSource>,
        cache: Arc<ResultCache>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            source,
            cache,
            coalescer: RequestCoalescer::new(),
            config,
        }
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    /// Return the requested page of annotated comments for a collection.
    pub async fn query(&self, query: &PipelineQuery) -> Result<CommentPage, PipelineError> {
        let window = self.config.fetch_window.max(1);
        let end = u64::from(query.skip()) + u64::from(query.limit());
        let reach = self.config.reach();
        if end > reach {
            return Err(PipelineError::invalid_argument(
                "skip",
                format!("skip + limit must not exceed {reach}, got {end}"),
            ));
        }

        // `end <= reach` keeps the block count within `max_blocks`.
        let blocks = end.div_ceil(u64::from(window)) as u32;
        let entries = try_join_all((0..blocks).map(|block| {
            self.block(query.collection(), window, block.saturating_mul(window))
        }))
        .await?;

        Ok(select(&entries, window, query))
    }

    /// Score a single piece of text.
    pub fn analyze(&self, text: &str) -> SentimentResult {
        sentiment::score(text)
    }

    async fn block(
        &self,
        collection: &str,
        window: u32,
        skip: u32,
    ) -> Result<Arc<CacheEntry>, PipelineError> {
        let key = CacheKey::new(collection, window, skip);
        match self.cache.get(&key) {
            Some(entry) => {
                debug!(
                    target = "application::pipeline::query",
                    key = %key,
                    outcome = "hit",
                    "serving cached comments"
                );
                Ok(entry)
            }
            None => self.load(key).await,
        }
    }

    async fn load(&self, key: CacheKey) -> Result<Arc<CacheEntry>, PipelineError> {
        let source = Arc::clone(&self.source);
        let cache = Arc::clone(&self.cache);
        let retry = self.config.retry.clone();
        let deadline = self.config.load_deadline;
        let producer_key = key.clone();

        self.coalescer
            .run(key, move || async move {
                // A load for this key may have finished between the caller's
                // cache miss and joining the coalescer.
                if let Some(entry) = cache.get(&producer_key) {
                    return Ok(entry);
                }

                let fetch = fetch_with_retry(source.as_ref(), &producer_key, &retry);
                let page = tokio::time::timeout(deadline, fetch)
                    .await
                    .map_err(|_| {
                        warn!(
                            target = "application::pipeline::load",
                            key = %producer_key,
                            deadline_ms = deadline.as_millis() as u64,
                            "upstream load exceeded its deadline"
                        );
                        UpstreamError::unavailable(format!(
                            "no upstream answer within {}ms",
                            deadline.as_millis()
                        ))
                    })??;

                let comments: Vec<AnnotatedComment> = page
                    .comments
                    .into_iter()
                    .map(AnnotatedComment::annotate)
                    .collect();

                info!(
                    target = "application::pipeline::load",
                    key = %producer_key,
                    subfeddit_id = page.subfeddit_id,
                    count = comments.len(),
                    "loaded comments from upstream"
                );

                let entry = Arc::new(CacheEntry::new(page.subfeddit_id, comments, cache.ttl()));
                cache.put(producer_key, Arc::clone(&entry));
                Ok(entry)
            })
            .await
    }
}

async fn fetch_with_retry(
    source: &dyn CommentSource,
    key: &CacheKey,
    retry: &RetryPolicy,
) -> Result<UpstreamPage, UpstreamError> {
    let mut retries = 0;
    loop {
        counter!(METRIC_UPSTREAM_FETCH).increment(1);
        match source.fetch(key.collection(), key.limit(), key.skip()).await {
            Ok(page) => return Ok(page),
            Err(err) if err.is_transient() && retries < retry.attempts => {
                let delay = retry.delay_for(retries);
                retries += 1;
                counter!(METRIC_UPSTREAM_RETRY).increment(1);
                warn!(
                    target = "application::pipeline::fetch",
                    key = %key,
                    retry = retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "retrying upstream fetch"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Filter, order and slice the loaded blocks without touching them.
fn select(blocks: &[Arc<CacheEntry>], window: u32, query: &PipelineQuery) -> CommentPage {
    let subfeddit_id = blocks.first().map_or(0, |block| block.subfeddit_id());

    // Blocks after a short one lie past the end of the collection.
    let loaded = blocks
        .iter()
        .position(|block| block.comments().len() < window as usize)
        .map_or(blocks.len(), |short| short + 1);

    let mut matching: Vec<&AnnotatedComment> = blocks[..loaded]
        .iter()
        .flat_map(|block| block.comments())
        .filter(|comment| {
            query
                .filter_by()
                .is_none_or(|wanted| comment.classification() == wanted)
        })
        .collect();

    if let Some(sort_by) = query.sort_by() {
        let sort_order = query.sort_order();
        // `sort_by` is stable: ties keep upstream order in both directions.
        matching.sort_by(|left, right| {
            let ordering = compare(left, right, sort_by);
            match sort_order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });
    }

    let total = matching.len();
    let comments = matching
        .into_iter()
        .skip(query.skip() as usize)
        .take(query.limit() as usize)
        .cloned()
        .collect();

    CommentPage {
        subfeddit_id,
        total,
        comments,
    }
}

fn compare(left: &AnnotatedComment, right: &AnnotatedComment, sort_by: SortBy) -> Ordering {
    match sort_by {
        SortBy::Polarity => left.polarity().total_cmp(&right.polarity()),
        SortBy::CreatedAt => left.created_at().cmp(&right.created_at()),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    use async_trait::async_trait;
    use feddit_api_types::Classification;
    use tokio::sync::Notify;

    use crate::cache::CacheConfig;
    use crate::domain::comments::Comment;

    use super::*;

    const TEXTS: [&str; 8] = [
        "This is a great comment!",
        "This is a terrible comment.",
        "This is a neutral comment.",
        "good",
        "really good",
        "bad",
        "great",
        "nothing to see",
    ];

    fn comments() -> Vec<Comment> {
        TEXTS
            .iter()
            .enumerate()
            .map(|(index, text)| Comment {
                id: index as i64 + 1,
                username: format!("user{}", index + 1),
                text: (*text).to_string(),
                // Two comments share each timestamp so ties are exercised.
                created_at: 1_700_000_000 + (index as i64 / 2),
            })
            .collect()
    }

    /// Scripted upstream: pops queued failures first, then serves `comments()`.
    struct FakeSource {
        calls: AtomicUsize,
        failures: Mutex<VecDeque<UpstreamError>>,
        gate: Option<Arc<Notify>>,
    }

    impl FakeSource {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                failures: Mutex::new(VecDeque::new()),
                gate: None,
            }
        }

        fn failing_with(errors: impl IntoIterator<Item = UpstreamError>) -> Self {
            let source = Self::new();
            source
                .failures
                .lock()
                .expect("failures lock")
                .extend(errors);
            source
        }

        fn gated(gate: Arc<Notify>) -> Self {
            Self {
                gate: Some(gate),
                ..Self::new()
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(AtomicOrdering::SeqCst)
        }
    }

    #[async_trait]
    impl CommentSource for FakeSource {
        async fn fetch(
            &self,
            collection: &str,
            limit: u32,
            skip: u32,
        ) -> Result<UpstreamPage, UpstreamError> {
            self.calls.fetch_add(1, AtomicOrdering::SeqCst);
            if let Some(gate) = self.gate.as_ref() {
                gate.notified().await;
            }
            if let Some(err) = self.failures.lock().expect("failures lock").pop_front() {
                return Err(err);
            }
            if collection == "missing" {
                return Err(UpstreamError::not_found(collection));
            }
            let comments = comments()
                .into_iter()
                .skip(skip as usize)
                .take(limit as usize)
                .collect();
            Ok(UpstreamPage {
                subfeddit_id: 1,
                comments,
            })
        }
    }

    /// Upstream holding `len` numbered comments, served in window-sized slices.
    struct NumberedSource {
        len: usize,
        calls: AtomicUsize,
    }

    impl NumberedSource {
        fn new(len: usize) -> Self {
            Self {
                len,
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(AtomicOrdering::SeqCst)
        }
    }

    #[async_trait]
    impl CommentSource for NumberedSource {
        async fn fetch(
            &self,
            _collection: &str,
            limit: u32,
            skip: u32,
        ) -> Result<UpstreamPage, UpstreamError> {
            self.calls.fetch_add(1, AtomicOrdering::SeqCst);
            let comments = (1..=self.len as i64)
                .skip(skip as usize)
                .take(limit as usize)
                .map(|id| Comment {
                    id,
                    username: format!("user{id}"),
                    text: "just a comment".to_string(),
                    created_at: 1_700_000_000 + id,
                })
                .collect();
            Ok(UpstreamPage {
                subfeddit_id: 3,
                comments,
            })
        }
    }

    /// Upstream that answers every call with a transient failure after `delay`.
    struct StalledSource {
        delay: Duration,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CommentSource for StalledSource {
        async fn fetch(
            &self,
            _collection: &str,
            _limit: u32,
            _skip: u32,
        ) -> Result<UpstreamPage, UpstreamError> {
            self.calls.fetch_add(1, AtomicOrdering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Err(UpstreamError::unavailable("read timed out"))
        }
    }

    fn pipeline_over(source: Arc<dyn CommentSource>, config: PipelineConfig) -> CommentPipeline {
        CommentPipeline::new(
            source,
            Arc::new(ResultCache::new(&CacheConfig::default())),
            config,
        )
    }

    fn pipeline_with(source: Arc<FakeSource>, ttl: Duration) -> CommentPipeline {
        let cache = Arc::new(ResultCache::new(&CacheConfig {
            ttl,
            max_entries: 16,
        }));
        CommentPipeline::new(
            source,
            cache,
            PipelineConfig {
                fetch_window: 100,
                retry: RetryPolicy {
                    attempts: 2,
                    backoff: Duration::from_millis(1),
                },
                ..PipelineConfig::default()
            },
        )
    }

    fn query(limit: i64, skip: i64) -> PipelineQuery {
        PipelineQuery::new("Dummy Topic 1", limit, skip).expect("valid query")
    }

    fn ids(page: &CommentPage) -> Vec<i64> {
        page.comments.iter().map(|c| c.comment.id).collect()
    }

    #[tokio::test]
    async fn unsorted_query_preserves_upstream_order() {
        let source = Arc::new(FakeSource::new());
        let pipeline = pipeline_with(Arc::clone(&source), Duration::from_secs(60));

        let page = pipeline.query(&query(100, 0)).await.expect("page");

        assert_eq!(page.subfeddit_id, 1);
        assert_eq!(page.total, TEXTS.len());
        assert_eq!(ids(&page), (1..=TEXTS.len() as i64).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn polarity_desc_is_non_increasing_and_stable() {
        let source = Arc::new(FakeSource::new());
        let pipeline = pipeline_with(source, Duration::from_secs(60));

        let page = pipeline
            .query(&query(100, 0).with_sort(Some(SortBy::Polarity), SortOrder::Desc))
            .await
            .expect("page");

        for pair in page.comments.windows(2) {
            assert!(pair[0].polarity() >= pair[1].polarity());
            if pair[0].polarity() == pair[1].polarity() {
                assert!(pair[0].comment.id < pair[1].comment.id, "ties keep fetch order");
            }
        }
    }

    #[tokio::test]
    async fn created_at_asc_keeps_ties_in_fetch_order() {
        let source = Arc::new(FakeSource::new());
        let pipeline = pipeline_with(source, Duration::from_secs(60));

        let asc = pipeline
            .query(&query(100, 0).with_sort(Some(SortBy::CreatedAt), SortOrder::Asc))
            .await
            .expect("asc");
        assert_eq!(ids(&asc), vec![1, 2, 3, 4, 5, 6, 7, 8]);

        let desc = pipeline
            .query(&query(100, 0).with_sort(Some(SortBy::CreatedAt), SortOrder::Desc))
            .await
            .expect("desc");
        assert_eq!(ids(&desc), vec![7, 8, 5, 6, 3, 4, 1, 2]);
    }

    #[tokio::test]
    async fn filter_yields_order_preserving_subsequence() {
        let source = Arc::new(FakeSource::new());
        let pipeline = pipeline_with(source, Duration::from_secs(60));

        let all = pipeline.query(&query(100, 0)).await.expect("all");
        let positive = pipeline
            .query(&query(100, 0).with_filter(Some(Classification::Positive)))
            .await
            .expect("positive");

        let expected: Vec<i64> = all
            .comments
            .iter()
            .filter(|c| c.classification() == Classification::Positive)
            .map(|c| c.comment.id)
            .collect();
        assert!(!expected.is_empty());
        assert_eq!(ids(&positive), expected);
        assert_eq!(positive.total, expected.len());
        assert!(
            positive
                .comments
                .iter()
                .all(|c| c.classification() == Classification::Positive)
        );
    }

    #[tokio::test]
    async fn pagination_returns_the_requested_window() {
        let source = Arc::new(FakeSource::new());
        let pipeline = pipeline_with(Arc::clone(&source), Duration::from_secs(60));

        let page = pipeline.query(&query(3, 2)).await.expect("window");
        assert_eq!(ids(&page), vec![3, 4, 5]);
        assert_eq!(page.total, TEXTS.len());

        let tail = pipeline.query(&query(5, 6)).await.expect("tail");
        assert_eq!(ids(&tail), vec![7, 8]);

        let beyond = pipeline.query(&query(5, 50)).await.expect("beyond");
        assert!(beyond.comments.is_empty());
        assert_eq!(beyond.total, TEXTS.len());

        assert_eq!(source.calls(), 1, "all pages share one cached fetch");
    }

    #[tokio::test]
    async fn repeated_queries_within_ttl_hit_the_cache() {
        let source = Arc::new(FakeSource::new());
        let pipeline = pipeline_with(Arc::clone(&source), Duration::from_secs(60));

        let first = pipeline.query(&query(10, 0)).await.expect("first");
        let second = pipeline.query(&query(10, 0)).await.expect("second");
        let other_case = pipeline
            .query(&PipelineQuery::new("dummy topic 1", 10, 0).expect("valid"))
            .await
            .expect("case-insensitive");

        assert_eq!(first, second);
        assert_eq!(first, other_case);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entry_triggers_exactly_one_refetch() {
        let ttl = Duration::from_secs(60);
        let source = Arc::new(FakeSource::new());
        let pipeline = pipeline_with(Arc::clone(&source), ttl);

        pipeline.query(&query(10, 0)).await.expect("initial");
        tokio::time::advance(ttl + Duration::from_secs(1)).await;

        pipeline.query(&query(10, 0)).await.expect("refetch");
        pipeline.query(&query(10, 0)).await.expect("cached again");

        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn concurrent_identical_queries_fetch_once() {
        let gate = Arc::new(Notify::new());
        let source = Arc::new(FakeSource::gated(Arc::clone(&gate)));
        let pipeline = Arc::new(pipeline_with(Arc::clone(&source), Duration::from_secs(60)));

        let mut handles = Vec::new();
        for _ in 0..10 {
            let pipeline = Arc::clone(&pipeline);
            handles.push(tokio::spawn(async move {
                pipeline
                    .query(&query(5, 0).with_sort(Some(SortBy::Polarity), SortOrder::Desc))
                    .await
            }));
        }

        while source.calls() == 0 {
            tokio::task::yield_now().await;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        gate.notify_one();

        let mut pages = Vec::new();
        for handle in handles {
            pages.push(handle.await.expect("join").expect("page"));
        }

        assert_eq!(source.calls(), 1);
        assert!(pages.windows(2).all(|pair| pair[0] == pair[1]));
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let source = Arc::new(FakeSource::failing_with([
            UpstreamError::unavailable("connection reset"),
            UpstreamError::unavailable("timed out"),
        ]));
        let pipeline = pipeline_with(Arc::clone(&source), Duration::from_secs(60));

        let page = pipeline.query(&query(10, 0)).await.expect("recovered");
        assert_eq!(page.total, TEXTS.len());
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test]
    async fn exhausted_retries_surface_unavailable_and_are_not_cached() {
        let source = Arc::new(FakeSource::failing_with(
            std::iter::repeat_n(UpstreamError::unavailable("down"), 3),
        ));
        let pipeline = pipeline_with(Arc::clone(&source), Duration::from_secs(60));

        let err = pipeline.query(&query(10, 0)).await.expect_err("unavailable");
        assert!(matches!(err, PipelineError::UpstreamUnavailable { .. }));
        assert_eq!(source.calls(), 3);
        assert!(pipeline.cache().is_empty());

        pipeline.query(&query(10, 0)).await.expect("upstream is back");
        assert_eq!(source.calls(), 4);
    }

    #[tokio::test]
    async fn not_found_is_not_retried() {
        let source = Arc::new(FakeSource::new());
        let pipeline = pipeline_with(Arc::clone(&source), Duration::from_secs(60));

        let err = pipeline
            .query(&PipelineQuery::new("missing", 10, 0).expect("valid"))
            .await
            .expect_err("not found");

        assert_eq!(
            err,
            PipelineError::NotFound {
                collection: "missing".to_string()
            }
        );
        assert_eq!(source.calls(), 1);
        assert!(pipeline.cache().is_empty());
    }

    #[tokio::test]
    async fn failure_for_one_collection_keeps_other_entries() {
        let source = Arc::new(FakeSource::new());
        let pipeline = pipeline_with(Arc::clone(&source), Duration::from_secs(60));

        pipeline.query(&query(10, 0)).await.expect("cached");
        pipeline
            .query(&PipelineQuery::new("missing", 10, 0).expect("valid"))
            .await
            .expect_err("not found");

        assert_eq!(pipeline.cache().len(), 1);
        pipeline.query(&query(10, 0)).await.expect("still cached");
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn sorting_never_mutates_the_cached_entry() {
        let source = Arc::new(FakeSource::new());
        let pipeline = pipeline_with(source, Duration::from_secs(60));

        pipeline
            .query(&query(100, 0).with_sort(Some(SortBy::Polarity), SortOrder::Asc))
            .await
            .expect("sorted");
        let unsorted = pipeline.query(&query(100, 0)).await.expect("unsorted");

        assert_eq!(ids(&unsorted), (1..=TEXTS.len() as i64).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn pages_past_the_first_window_load_the_next_block() {
        let source = Arc::new(NumberedSource::new(500));
        let pipeline = pipeline_over(source.clone(), PipelineConfig::default());

        let page = pipeline
            .query(&PipelineQuery::new("x", 25, 100).expect("valid"))
            .await
            .expect("second block");

        assert_eq!(page.subfeddit_id, 3);
        assert_eq!(ids(&page), (101..=125_i64).collect::<Vec<_>>());
        assert_eq!(page.total, 200, "total covers the loaded blocks");
        assert_eq!(source.calls(), 2);

        let straddling = pipeline
            .query(&PipelineQuery::new("x", 10, 95).expect("valid"))
            .await
            .expect("straddling page");
        assert_eq!(ids(&straddling), (96..=105_i64).collect::<Vec<_>>());
        assert_eq!(source.calls(), 2, "both blocks are cached");
    }

    #[tokio::test]
    async fn short_block_ends_the_collection() {
        let source = Arc::new(NumberedSource::new(150));
        let pipeline = pipeline_over(source.clone(), PipelineConfig::default());

        let page = pipeline
            .query(&PipelineQuery::new("x", 100, 100).expect("valid"))
            .await
            .expect("tail");
        assert_eq!(ids(&page), (101..=150_i64).collect::<Vec<_>>());
        assert_eq!(page.total, 150);

        let past_end = pipeline
            .query(&PipelineQuery::new("x", 100, 200).expect("valid"))
            .await
            .expect("past the end");
        assert!(past_end.comments.is_empty());
        assert_eq!(past_end.total, 150);
    }

    #[tokio::test]
    async fn pages_beyond_the_block_reach_are_rejected() {
        let source = Arc::new(NumberedSource::new(5_000));
        let pipeline = pipeline_over(source.clone(), PipelineConfig::default());

        let err = pipeline
            .query(&PipelineQuery::new("x", 100, 950).expect("valid"))
            .await
            .expect_err("beyond reach");

        assert!(matches!(err, PipelineError::InvalidArgument { field: "skip", .. }));
        assert_eq!(source.calls(), 0);

        pipeline
            .query(&PipelineQuery::new("x", 100, 900).expect("valid"))
            .await
            .expect("last reachable page");
        assert_eq!(source.calls(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_upstream_fails_within_the_load_deadline() {
        let config = PipelineConfig::default();
        let deadline = config.load_deadline;
        let source = Arc::new(StalledSource {
            delay: deadline,
            calls: AtomicUsize::new(0),
        });
        let pipeline = Arc::new(pipeline_over(source.clone(), config));

        let started = tokio::time::Instant::now();
        let follower = {
            let pipeline = Arc::clone(&pipeline);
            tokio::spawn(async move { pipeline.query(&query(25, 0)).await })
        };
        let err = pipeline.query(&query(25, 0)).await.expect_err("stalled");
        let follower_err = follower.await.expect("join").expect_err("stalled");
        let elapsed = started.elapsed();

        assert!(elapsed <= deadline, "waited {elapsed:?}, deadline {deadline:?}");
        assert!(matches!(err, PipelineError::UpstreamUnavailable { .. }));
        assert_eq!(err, follower_err);
        assert!(source.calls.load(AtomicOrdering::SeqCst) <= 2);
        assert!(pipeline.cache().is_empty());
    }

    #[test]
    fn analyze_matches_the_scorer() {
        let pipeline = pipeline_with(Arc::new(FakeSource::new()), Duration::from_secs(60));
        let result = pipeline.analyze("This is a great comment!");
        assert_eq!(result.classification, Classification::Positive);
        assert_eq!(pipeline.analyze(""), SentimentResult::neutral());
    }

    #[test]
    fn retry_delay_doubles() {
        let policy = RetryPolicy {
            attempts: 3,
            backoff: Duration::from_millis(100),
        };
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
    }
}
