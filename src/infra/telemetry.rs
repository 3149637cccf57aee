use std::io;
use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Connection-level chatter from the HTTP stack, capped unless `RUST_LOG`
/// names these targets explicitly.
const QUIET_TARGETS: [&str; 2] = ["hyper_util=warn", "reqwest=warn"];

/// Install the global tracing subscriber and describe the service metrics.
///
/// Logs go to stderr so stdout stays reserved for command output.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = build_filter(logging)?;

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(io::stderr)
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_writer(io::stderr)
            .with_target(true)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn build_filter(logging: &LoggingSettings) -> Result<EnvFilter, InfraError> {
    let explicit = std::env::var(EnvFilter::DEFAULT_ENV).unwrap_or_default();
    let mut filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .parse_lossy(&explicit);

    for directive in QUIET_TARGETS {
        let target = directive.split('=').next().unwrap_or(directive);
        if explicit.contains(target) {
            continue;
        }
        let directive = directive.parse().map_err(|err| {
            InfraError::telemetry(format!("invalid log directive `{directive}`: {err}"))
        })?;
        filter = filter.add_directive(directive);
    }

    Ok(filter)
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "feddit_cache_hit_total",
            Unit::Count,
            "Total number of result-cache hits."
        );
        describe_counter!(
            "feddit_cache_miss_total",
            Unit::Count,
            "Total number of result-cache misses, including expired entries."
        );
        describe_counter!(
            "feddit_cache_expired_total",
            Unit::Count,
            "Total number of result-cache entries dropped after their TTL."
        );
        describe_counter!(
            "feddit_cache_evict_total",
            Unit::Count,
            "Total number of result-cache evictions due to capacity."
        );
        describe_gauge!(
            "feddit_cache_entries",
            Unit::Count,
            "Entries held by the result cache after the last sweep."
        );
        describe_counter!(
            "feddit_requests_coalesced_total",
            Unit::Count,
            "Total number of callers that joined an in-flight upstream load."
        );
        describe_counter!(
            "feddit_upstream_fetch_total",
            Unit::Count,
            "Total number of upstream comment fetch attempts."
        );
        describe_counter!(
            "feddit_upstream_retry_total",
            Unit::Count,
            "Total number of upstream fetches retried after a transient failure."
        );
        describe_histogram!(
            "feddit_upstream_request_ms",
            Unit::Milliseconds,
            "Upstream HTTP request latency in milliseconds."
        );
    });
}
