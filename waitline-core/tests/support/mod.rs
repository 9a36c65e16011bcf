#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use waitline_core::{
    BehaviorConfig, HttpTicketApi, RunStats, ScenarioConfig, VuReport, WsConnector,
};
use waitline_http::HttpClient;
use waitline_testserver::TestServer;

/// Scenario against `server` with every optional step switched on, no abandonment and
/// millisecond time units, so a full journey takes well under a second.
pub fn scenario_for(server: &TestServer, vus: u64) -> ScenarioConfig {
    ScenarioConfig {
        base_url: server.base_url(),
        ws_url: server.ws_url(),
        vus,
        seed: Some(1),
        time_unit: Duration::from_millis(10),
        max_duration: Duration::from_secs(30),
        behavior: BehaviorConfig {
            search_probability: 1.0,
            filter_probability: 1.0,
            ai_summary_probability: 1.0,
            seat_peek_probability: 1.0,
            abandon_probability: 0.0,
            ..BehaviorConfig::default().without_delays()
        },
        ..ScenarioConfig::default()
    }
}

pub async fn run(cfg: ScenarioConfig) -> anyhow::Result<(Vec<VuReport>, Arc<RunStats>)> {
    let api = Arc::new(HttpTicketApi::new(
        HttpClient::default(),
        &cfg.base_url,
        cfg.http_timeout,
    ));
    let connector = Arc::new(WsConnector::new(&cfg.ws_url, Some(Duration::from_secs(5))));
    let stats = Arc::new(RunStats::default());

    let reports =
        waitline_core::run_journeys(Arc::new(cfg), api, connector, stats.clone(), None).await?;
    Ok((reports, stats))
}
