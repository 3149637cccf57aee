use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the Feddit binary.
#[derive(Debug, Parser)]
#[command(
    name = "feddit",
    version,
    about = "Sentiment-annotated Feddit comment service"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "FEDDIT_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP service.
    Serve(Box<ServeArgs>),
    /// Score a piece of text and print the result as JSON.
    Analyze(AnalyzeArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Clone)]
pub struct AnalyzeArgs {
    /// Text to score.
    #[arg(value_name = "TEXT")]
    pub text: String,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the Feddit API base URL.
    #[arg(long = "upstream-base-url", value_name = "URL")]
    pub upstream_base_url: Option<String>,

    /// Override the upstream request timeout.
    #[arg(long = "upstream-timeout-seconds", value_name = "SECONDS")]
    pub upstream_timeout_seconds: Option<u64>,

    /// Override the maximum number of concurrent upstream requests.
    #[arg(long = "upstream-max-connections", value_name = "COUNT")]
    pub upstream_max_connections: Option<u32>,

    /// Override the number of idle upstream connections kept alive.
    #[arg(long = "upstream-keepalive-connections", value_name = "COUNT")]
    pub upstream_keepalive_connections: Option<u32>,

    /// Override how many times a transient upstream failure is retried.
    #[arg(long = "upstream-retry-attempts", value_name = "COUNT")]
    pub upstream_retry_attempts: Option<u32>,

    /// Override the initial retry backoff.
    #[arg(long = "upstream-retry-backoff-ms", value_name = "MILLIS")]
    pub upstream_retry_backoff_ms: Option<u64>,

    /// Override the result cache TTL.
    #[arg(long = "cache-ttl-seconds", value_name = "SECONDS")]
    pub cache_ttl_seconds: Option<u64>,

    /// Override the maximum number of cached collections.
    #[arg(long = "cache-max-entries", value_name = "COUNT")]
    pub cache_max_entries: Option<u32>,

    /// Override the page size used when a request omits `limit`.
    #[arg(long = "pipeline-default-limit", value_name = "COUNT")]
    pub pipeline_default_limit: Option<u32>,

    /// Override the number of comments fetched per collection.
    #[arg(long = "pipeline-fetch-window", value_name = "COUNT")]
    pub pipeline_fetch_window: Option<u32>,

    /// Override how many fetch windows one query may span.
    #[arg(long = "pipeline-max-blocks", value_name = "COUNT")]
    pub pipeline_max_blocks: Option<u32>,
}
