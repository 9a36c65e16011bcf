use std::sync::Arc;
use std::time::Instant;

use waitline_core::{HttpTicketApi, RunStats, WsConnector, run_journeys};
use waitline_http::HttpClient;

use crate::cli::RunArgs;
use crate::exit_codes::ExitCode;
use crate::output::{self, Header, Reports};
use crate::run_error::{RunError, classify_core_error};
use crate::settings;

pub async fn run(args: RunArgs) -> Result<ExitCode, RunError> {
    let out = output::formatter(args.common.output);
    let cfg = Arc::new(settings::scenario_config(&args).await?);
    out.print_header(Header::Run(&cfg));

    let api = Arc::new(HttpTicketApi::new(
        HttpClient::default(),
        &cfg.base_url,
        cfg.http_timeout,
    ));
    let connector = Arc::new(WsConnector::new(&cfg.ws_url, cfg.http_timeout));
    let stats = Arc::new(RunStats::default());

    tracing::info!(
        vus = cfg.vus,
        concert_id = cfg.concert_id,
        seed = ?cfg.seed,
        "starting journeys"
    );
    let started = Instant::now();
    let reports = run_journeys(cfg.clone(), api, connector, stats.clone(), out.progress())
        .await
        .map_err(classify_core_error)?;
    let summary = stats.summarize(started.elapsed());

    out.print_summary(&summary, Reports::Journeys(&reports))
        .map_err(RunError::RuntimeError)?;

    if summary.checks_failed > 0 {
        eprintln!("run failed: checks_failed={}", summary.checks_failed);
    }
    Ok(ExitCode::from_checks(summary.checks_failed))
}
