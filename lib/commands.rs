use crate::{
    cli::{Cli, Command, QueryArgs, QueryTarget},
    config::Config,
    logging::{format_error_report, init_logging},
    provider_client::{build_rate_limiter, ProviderClient, ProviderEndpoints},
    search_client::{SearchClient, SearchEndpoints},
    server::{register_metrics, setup_server_with_addr},
    state::AppState,
    sync_service::{types::RetryPolicy, SyncService, VodUpdateConfig, VodUpdateSummary},
};
use dotenv::dotenv;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub const SERVICE_NAME: &str = "vod_sync";

/// Exit code when configuration or arguments are unusable.
const EXIT_CONFIG: i32 = 2;
const EXIT_FAILURE: i32 = 1;
/// Exit code when a shutdown signal stopped `update vod` early (128 + SIGINT).
const EXIT_CANCELLED: i32 = 130;

/// One transport shared by the provider and search clients; the timeout bounds every request.
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder().timeout(timeout).build()
}

pub fn build_provider_client(config: &Config, http: reqwest::Client) -> ProviderClient {
    let client = ProviderClient::new(
        http,
        config.service.base_url.clone(),
        config.service.username.clone(),
        config.service.password.clone(),
        ProviderEndpoints {
            categories: config.endpoints.vod_categories.clone(),
            streams: config.endpoints.vod_streams.clone(),
            info: config.endpoints.vod_info.clone(),
        },
    );
    match config.performance.global_rps.and_then(NonZeroU32::new) {
        Some(rps) => client.with_rate_limiter(build_rate_limiter(rps)),
        None => client,
    }
}

pub fn build_search_client(config: &Config, http: reqwest::Client) -> SearchClient {
    SearchClient::new(
        http,
        config.service.search_url.clone(),
        SearchEndpoints {
            add: config.endpoints.add_vod.clone(),
            query: config.endpoints.query_vods.clone(),
            embed: config.endpoints.embed.clone(),
        },
    )
}

pub fn update_config(config: &Config) -> VodUpdateConfig {
    VodUpdateConfig {
        max_concurrent_categories: config.performance.max_concurrent_categories,
        stream_retry: RetryPolicy {
            max_attempts: config.performance.stream_retry_attempts,
            delay: config.performance.stream_retry_delay(),
        },
    }
}

/// Cancels `token` on the first SIGTERM or SIGINT.
async fn handle_shutdown_signals(token: CancellationToken) {
    let (mut sigterm, mut sigint) =
        match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
            (Err(err), _) | (_, Err(err)) => {
                warn!(
                    event = "signal_handler_unavailable",
                    error = %err,
                    "failed to register shutdown signal handlers"
                );
                return;
            }
        };

    tokio::select! {
        _ = sigterm.recv() => info!(event = "shutdown_signal", signal = "SIGTERM", "SIGTERM received, shutting down."),
        _ = sigint.recv() => info!(event = "shutdown_signal", signal = "SIGINT", "SIGINT received, shutting down."),
    }
    token.cancel();
}

/// Loads configuration, installs logging and metrics, then runs the selected command.
/// Returns the process exit code.
pub async fn run(cli: Cli) -> i32 {
    dotenv().ok();

    let loaded = Config::load(&cli.config);
    let level = cli
        .log_level
        .clone()
        .or_else(|| loaded.as_ref().ok().map(|config| config.logging.level.clone()))
        .unwrap_or_else(|| "info".to_string());

    let logging_context = init_logging(SERVICE_NAME, cli.command.name(), &level);
    let run_span = tracing::info_span!(
        "vod_sync_run",
        service = %logging_context.service,
        environment = %logging_context.environment,
        command = %logging_context.command,
        run_id = %logging_context.run_id
    );
    let _run_guard = run_span.enter();

    let config = match loaded {
        Ok(config) => config,
        Err(err) => {
            error!(
                event = "config_invalid",
                path = %cli.config.display(),
                error = %err,
                "failed to load configuration"
            );
            eprintln!("{err}");
            return EXIT_CONFIG;
        }
    };

    let http = match build_http_client(config.performance.request_timeout()) {
        Ok(http) => http,
        Err(err) => {
            report_failure("http_client_build_failed", "failed to build HTTP client", &err);
            return EXIT_FAILURE;
        }
    };

    let state = Arc::new(AppState::new(CancellationToken::new()));
    register_metrics(&state).await;
    let signal_handle = tokio::spawn(handle_shutdown_signals(state.shutdown_token.clone()));

    let metrics_server_handle = match cli.metrics_bind {
        Some(addr) => match setup_server_with_addr(Arc::clone(&state), addr).await {
            Ok(handle) => {
                info!(event = "metrics_server_started", bind = %addr, "serving /health and /metrics");
                Some(handle)
            }
            Err(err) => {
                report_failure(
                    "metrics_server_start_failed",
                    "failed to start metrics endpoint",
                    &err,
                );
                signal_handle.abort();
                return EXIT_FAILURE;
            }
        },
        None => None,
    };

    let code = match &cli.command {
        Command::Update { .. } => {
            run_update_vod(&config, http, state.shutdown_token.clone()).await
        }
        Command::Query {
            target: QueryTarget::Vod(args),
        } => run_query_vod(&config, http, args).await,
        Command::Embed { sentences } => run_embed(&config, http, sentences).await,
    };

    signal_handle.abort();
    state.shutdown_token.cancel();
    if let Some(handle) = metrics_server_handle {
        let _ = handle.await;
    }
    code
}

/// Final console line and exit code for a finished `update vod` run.
///
/// A run with any cancelled category is reported as cancelled, not completed.
pub fn completion_report(summary: &VodUpdateSummary) -> (String, i32) {
    let counts = format!(
        "{}/{} categories succeeded, {} records indexed, {} streams skipped",
        summary.succeeded_categories(),
        summary.outcomes.len(),
        summary.records_indexed,
        summary.stream_failures.len()
    );
    match summary.cancelled_categories() {
        0 => (format!("VOD update completed: {counts}"), 0),
        cancelled => (
            format!("VOD update cancelled: {counts}, {cancelled} categories cancelled"),
            EXIT_CANCELLED,
        ),
    }
}

/// One full catalog sync. Fails only when the category list could not be fetched
/// or a shutdown signal interrupted the run.
pub async fn run_update_vod(
    config: &Config,
    http: reqwest::Client,
    cancel_token: CancellationToken,
) -> i32 {
    println!("Starting VOD update...");
    let service = SyncService::new(
        build_provider_client(config, http.clone()),
        build_search_client(config, http),
        update_config(config),
    );

    let started = Instant::now();
    match service.update_vod(cancel_token).await {
        Ok(summary) => {
            info!(
                event = "update_vod_complete",
                elapsed_ms = started.elapsed().as_millis() as u64,
                categories_listed = summary.categories_listed,
                categories_skipped = summary.skipped_categories.len(),
                categories_succeeded = summary.succeeded_categories(),
                categories_failed = summary.failed_categories(),
                categories_cancelled = summary.cancelled_categories(),
                records_indexed = summary.records_indexed,
                stream_failures = summary.stream_failures.len(),
                "VOD update finished"
            );
            let (line, code) = completion_report(&summary);
            println!("{line}");
            code
        }
        Err(err) => {
            report_failure("update_vod_failed", "VOD update failed", &err);
            EXIT_FAILURE
        }
    }
}

/// Prints each hit as one JSON line.
pub async fn run_query_vod(config: &Config, http: reqwest::Client, args: &QueryArgs) -> i32 {
    let search = build_search_client(config, http);
    match search
        .query_records(&args.property, &args.query, args.top_k)
        .await
    {
        Ok(hits) => {
            info!(
                event = "query_vod_complete",
                property = %args.property,
                hits = hits.len(),
                "query finished"
            );
            for hit in &hits {
                match serde_json::to_string(hit) {
                    Ok(line) => println!("{line}"),
                    Err(err) => warn!(event = "query_hit_unprintable", error = %err, "skipping hit"),
                }
            }
            0
        }
        Err(err) => {
            report_failure("query_vod_failed", "VOD query failed", &err);
            EXIT_FAILURE
        }
    }
}

pub async fn run_embed(config: &Config, http: reqwest::Client, sentences: &[String]) -> i32 {
    let search = build_search_client(config, http);
    match search.embed(sentences).await {
        Ok(()) => {
            info!(event = "embed_complete", sentences = sentences.len(), "embed finished");
            println!("Embedded {} sentence(s)", sentences.len());
            0
        }
        Err(err) => {
            report_failure("embed_failed", "embed failed", &err);
            EXIT_FAILURE
        }
    }
}

fn report_failure(event: &'static str, message: &str, err: &(dyn std::error::Error + 'static)) {
    let error_report = format_error_report(err);
    error!(
        event,
        error = %err,
        error_debug = ?err,
        error_report = %error_report,
        "{message}"
    );
    eprintln!("{message}: {err}");
    eprintln!("{error_report}");
}
