use std::sync::Arc;
use std::time::Instant;

use waitline_core::{HttpTicketApi, RunStats, run_registrations};
use waitline_http::HttpClient;

use crate::cli::RegisterArgs;
use crate::exit_codes::ExitCode;
use crate::output::{self, Header, Reports};
use crate::run_error::{RunError, classify_core_error};
use crate::settings;

/// Bulk account creation. Re-running against existing accounts fails their checks (exit 10)
/// and leaves the accounts untouched.
pub async fn register(args: RegisterArgs) -> Result<ExitCode, RunError> {
    let out = output::formatter(args.common.output);
    let cfg = Arc::new(settings::register_config(&args).await?);
    out.print_header(Header::Register(&cfg));

    let api = Arc::new(HttpTicketApi::new(
        HttpClient::default(),
        &cfg.base_url,
        cfg.http_timeout,
    ));
    let stats = Arc::new(RunStats::default());

    tracing::info!(accounts = cfg.accounts, prefix = %cfg.username_prefix, "registering accounts");
    let started = Instant::now();
    let reports = run_registrations(cfg.clone(), api, stats.clone(), out.progress())
        .await
        .map_err(classify_core_error)?;
    let summary = stats.summarize(started.elapsed());

    out.print_summary(&summary, Reports::Registrations(&reports))
        .map_err(RunError::RuntimeError)?;

    if summary.checks_failed > 0 {
        eprintln!("register failed: checks_failed={}", summary.checks_failed);
    }
    Ok(ExitCode::from_checks(summary.checks_failed))
}
