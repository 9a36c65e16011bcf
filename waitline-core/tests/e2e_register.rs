use std::sync::Arc;

use waitline_core::{HttpTicketApi, RunStats, ScenarioConfig, run_registrations};
use waitline_http::HttpClient;
use waitline_testserver::TestServer;

async fn register_all(base_url: &str, accounts: u64) -> anyhow::Result<(usize, u64)> {
    let mut cfg = ScenarioConfig {
        base_url: base_url.to_string(),
        ..ScenarioConfig::default()
    }
    .registration(accounts);
    cfg.time_unit = std::time::Duration::from_millis(1);

    let api = Arc::new(HttpTicketApi::new(HttpClient::default(), base_url, None));
    let stats = Arc::new(RunStats::default());
    let reports = run_registrations(Arc::new(cfg), api, stats.clone(), None).await?;
    let ok = reports.iter().filter(|r| r.ok).count();
    Ok((ok, stats.checks_failed_total()))
}

#[tokio::test]
async fn e2e_register_twice_only_creates_accounts_once() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let base_url = server.base_url();

    let (first_ok, first_failed) = register_all(&base_url, 10).await?;
    let (second_ok, second_failed) = register_all(&base_url, 10).await?;

    let registered = server.stats().registrations();
    server.shutdown().await;

    assert_eq!((first_ok, first_failed), (10, 0));
    assert_eq!((second_ok, second_failed), (0, 10));
    assert_eq!(registered, 10);
    Ok(())
}
