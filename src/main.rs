use std::{future::IntoFuture, process, sync::Arc, time::Duration};

use axum::http::StatusCode;
use feddit::{
    application::{
        error::{AppError, ErrorReport},
        pipeline::{CommentPipeline, PipelineConfig},
    },
    cache::{CacheConfig, ResultCache},
    config,
    domain::sentiment,
    infra::{
        error::InfraError,
        feddit::{FedditClient, FedditClientConfig},
        http::{self, HttpState},
        telemetry,
    },
};
use feddit_api_types::SentimentAnalysis;
use metrics::gauge;
use tokio::{sync::oneshot, task::JoinHandle};
use tracing::{Dispatch, Level, debug, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

const METRIC_CACHE_ENTRIES: &str = "feddit_cache_entries";

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    let report = ErrorReport::from_error("main", StatusCode::INTERNAL_SERVER_ERROR, error);
    let emit = || error!(error = %error, chain = ?report.messages, "application error");

    if dispatcher::has_been_set() {
        emit();
        return;
    }

    let subscriber = tracing_fmt()
        .with_writer(std::io::stderr)
        .with_max_level(Level::ERROR)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, emit);
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Analyze(args) => run_analyze(&args),
    }
}

fn run_analyze(args: &config::AnalyzeArgs) -> Result<(), AppError> {
    let result = sentiment::score(&args.text);
    let output = serde_json::to_string_pretty(&SentimentAnalysis {
        polarity: result.polarity,
        classification: result.classification,
    })
    .map_err(|err| AppError::unexpected(format!("failed to encode result: {err}")))?;
    println!("{output}");
    Ok(())
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let cache = Arc::new(ResultCache::new(&CacheConfig::from(&settings.cache)));
    let client = FedditClient::new(FedditClientConfig::from(&settings.upstream))?;
    let pipeline = Arc::new(CommentPipeline::new(
        Arc::new(client),
        Arc::clone(&cache),
        PipelineConfig::from(&settings),
    ));

    let sweeper = spawn_cache_sweeper(cache, settings.cache.ttl);

    let state = HttpState {
        pipeline,
        default_limit: settings.pipeline.default_limit,
    };
    let result = serve_http(&settings, state).await;

    sweeper.abort();
    let _ = sweeper.await;

    result
}

/// Drop expired entries once per TTL so idle collections are released
/// without waiting for a read.
fn spawn_cache_sweeper(cache: Arc<ResultCache>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.tick().await;
        loop {
            interval.tick().await;
            let purged = cache.purge_expired();
            let remaining = cache.len();
            gauge!(METRIC_CACHE_ENTRIES).set(remaining as f64);
            debug!(
                target = "feddit::cache::sweeper",
                purged,
                remaining,
                capacity = cache.capacity(),
                "swept result cache"
            );
        }
    })
}

async fn serve_http(settings: &config::Settings, state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::bind(settings.server.addr, err)))?;

    info!(
        target = "feddit::serve",
        addr = %settings.server.addr,
        upstream = %settings.upstream.base_url,
        "listening"
    );

    let grace = settings.server.graceful_shutdown;
    let (draining_tx, draining_rx) = oneshot::channel::<()>();
    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = draining_tx.send(());
        })
        .into_future();

    let drain_deadline = async move {
        match draining_rx.await {
            Ok(()) => tokio::time::sleep(grace).await,
            Err(_) => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        result = server => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
            info!(target = "feddit::serve", "server stopped");
        }
        () = drain_deadline => {
            warn!(
                target = "feddit::serve",
                grace_seconds = grace.as_secs(),
                "graceful shutdown timed out; dropping open connections"
            );
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    info!(target = "feddit::serve", "shutdown requested; draining connections");
}
