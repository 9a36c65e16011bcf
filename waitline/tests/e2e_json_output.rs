use std::io::Write as _;
use std::process::Command;

use anyhow::Context as _;
use serde::Deserialize;
use waitline_testserver::{QueueMode, ServerOptions, TestServer};

#[derive(Debug, Deserialize)]
struct Journey {
    vu: u64,
    outcome: String,
    last_phase: String,
    access_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SummaryLine {
    checks_failed_total: u64,
    requests_total: u64,
    journeys: Vec<Journey>,
}

#[derive(Debug, Deserialize)]
struct ProgressLine {
    completed: u64,
    total: u64,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind")]
enum JsonLine {
    #[serde(rename = "progress")]
    Progress(ProgressLine),

    #[serde(rename = "summary")]
    Summary(SummaryLine),
}

#[tokio::test]
async fn e2e_json_output_reports_every_journey() -> anyhow::Result<()> {
    let server = TestServer::start_with(ServerOptions {
        queue: QueueMode::Admit {
            ranks: vec![3, 1],
            interval: std::time::Duration::from_millis(10),
        },
        ..ServerOptions::default()
    })
    .await
    .context("start test server")?;
    let base_url = server.base_url();
    let ws_url = server.ws_url();

    let mut config = tempfile::Builder::new()
        .suffix(".yaml")
        .tempfile()
        .context("create config file")?;
    config
        .write_all(b"vus: 4\nbehavior:\n  abandonProbability: 0\n")
        .context("write config file")?;
    let config_path = config.path().to_path_buf();
    let exe = env!("CARGO_BIN_EXE_waitline");

    let output = tokio::task::spawn_blocking(move || {
        Command::new(exe)
            .args(["run", "--time-unit", "1ms", "--seed", "3"])
            .arg("--config")
            .arg(&config_path)
            .args(["--output", "json"])
            .env("WAITLINE_BASE_URL", &base_url)
            .env("WAITLINE_WS_URL", &ws_url)
            .env_remove("RUST_LOG")
            .output()
    })
    .await
    .context("spawn_blocking join")?
    .context("run waitline binary")?;

    let ws_connections = server.stats().ws_connections();
    server.shutdown().await;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut progress = Vec::new();
    let mut summary = None;
    for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
        match serde_json::from_str::<JsonLine>(line)
            .with_context(|| format!("stdout line is not a progress/summary record: {line}"))?
        {
            JsonLine::Progress(p) => progress.push(p),
            JsonLine::Summary(s) => summary = Some(s),
        }
    }

    let summary = summary.context("missing summary line")?;
    anyhow::ensure!(
        summary.checks_failed_total == 0,
        "checks failed\nstderr:\n{}",
        String::from_utf8_lossy(&output.stderr)
    );
    anyhow::ensure!(summary.requests_total > 0);
    anyhow::ensure!(progress.len() == 4, "expected 4 progress lines, got {}", progress.len());
    anyhow::ensure!(progress.iter().all(|p| p.total == 4));
    anyhow::ensure!(progress.iter().any(|p| p.completed == 4));

    let vus: Vec<u64> = summary.journeys.iter().map(|j| j.vu).collect();
    anyhow::ensure!(vus == vec![1, 2, 3, 4], "journeys out of order: {vus:?}");
    for j in &summary.journeys {
        anyhow::ensure!(j.outcome == "resource_accessed", "vu {}: {}", j.vu, j.outcome);
        anyhow::ensure!(j.last_phase == "done");
        anyhow::ensure!(j.access_key.is_some());
    }
    anyhow::ensure!(ws_connections == 4, "expected one realtime connection per VU");
    Ok(())
}
