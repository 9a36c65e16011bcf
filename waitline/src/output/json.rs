use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write as _;
use std::sync::Arc;

use waitline_core::{JourneyOutcome, ProgressUpdate, RunSummary};

use super::{Header, OutputFormatter, Reports, outcome_detail};

pub(crate) struct JsonOutput;

impl OutputFormatter for JsonOutput {
    fn print_header(&self, _header: Header<'_>) {}

    fn progress(&self) -> Option<waitline_core::ProgressFn> {
        Some(Arc::new(move |u| {
            let line = build_progress_line(&u);
            emit_json_line(&line);
        }))
    }

    fn print_summary(&self, summary: &RunSummary, reports: Reports<'_>) -> anyhow::Result<()> {
        let line = build_summary_line(summary, &reports);
        emit_json_line(&line);
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonProgressLine {
    pub kind: &'static str,
    pub completed: u64,
    pub total: u64,
    pub elapsed_secs: f64,
    pub max_duration_secs: f64,
    pub checks_failed_total: u64,
}

fn build_progress_line(u: &ProgressUpdate) -> JsonProgressLine {
    JsonProgressLine {
        kind: "progress",
        completed: u.completed,
        total: u.total,
        elapsed_secs: u.elapsed.as_secs_f64(),
        max_duration_secs: u.max_duration.as_secs_f64(),
        checks_failed_total: u.checks_failed_total,
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonSummaryLine {
    pub kind: &'static str,
    pub run_duration_secs: f64,
    pub requests_total: u64,
    pub requests_failed: u64,
    pub checks_total: u64,
    pub checks_failed_total: u64,
    pub checks: Vec<JsonCheck>,
    pub latency: Option<JsonLatencySummary>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub outcomes: BTreeMap<String, u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub journeys: Vec<JsonJourney>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub registrations: Vec<JsonRegistration>,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonCheck {
    pub name: String,
    pub total: u64,
    pub failed: u64,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonLatencySummary {
    pub p50_ms: f64,
    pub p90_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub mean_ms: f64,
    pub max_ms: f64,
    pub count: u64,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonJourney {
    pub vu: u64,
    pub username: String,
    pub outcome: String,
    pub last_phase: String,
    pub elapsed_secs: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonRegistration {
    pub index: u64,
    pub username: String,
    pub ok: bool,
    pub status: Option<u16>,
}

fn build_summary_line(summary: &RunSummary, reports: &Reports<'_>) -> JsonSummaryLine {
    let (journeys, registrations) = match reports {
        Reports::Journeys(reports) => (
            reports
                .iter()
                .map(|r| JsonJourney {
                    vu: r.vu,
                    username: r.username.clone(),
                    outcome: r.outcome.kind().to_string(),
                    last_phase: r.last_phase.to_string(),
                    elapsed_secs: r.elapsed.as_secs_f64(),
                    access_key: match &r.outcome {
                        JourneyOutcome::ResourceAccessed { access_key }
                        | JourneyOutcome::ResourceAccessFailed { access_key, .. } => {
                            Some(access_key.clone())
                        }
                        _ => None,
                    },
                    detail: outcome_detail(r),
                })
                .collect(),
            Vec::new(),
        ),
        Reports::Registrations(reports) => (
            Vec::new(),
            reports
                .iter()
                .map(|r| JsonRegistration {
                    index: r.index,
                    username: r.username.clone(),
                    ok: r.ok,
                    status: r.status,
                })
                .collect(),
        ),
    };

    JsonSummaryLine {
        kind: "summary",
        run_duration_secs: summary.run_duration.as_secs_f64(),
        requests_total: summary.requests_total,
        requests_failed: summary.requests_failed,
        checks_total: summary.checks_total,
        checks_failed_total: summary.checks_failed,
        checks: summary
            .checks_by_name
            .iter()
            .map(|c| JsonCheck {
                name: c.name.clone(),
                total: c.total,
                failed: c.failed,
            })
            .collect(),
        latency: summary.latency.as_ref().map(|l| JsonLatencySummary {
            p50_ms: l.p50,
            p90_ms: l.p90,
            p95_ms: l.p95,
            p99_ms: l.p99,
            mean_ms: l.mean,
            max_ms: l.max,
            count: l.count,
        }),
        outcomes: summary
            .outcomes
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect(),
        journeys,
        registrations,
    }
}

fn emit_json_line<T: Serialize>(line: &T) {
    let Ok(s) = serde_json::to_string(line) else {
        return;
    };
    let mut out = std::io::stdout().lock();
    let _ = writeln!(out, "{s}");
    let _ = out.flush();
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use waitline_core::{OutcomeKind, Phase, VuReport};

    use super::*;

    #[test]
    fn summary_line_carries_outcomes_and_journeys() {
        let summary = RunSummary {
            requests_total: 4,
            requests_failed: 0,
            checks_total: 4,
            checks_failed: 0,
            checks_by_name: Vec::new(),
            latency: None,
            outcomes: BTreeMap::from([(OutcomeKind::TimedOut, 1)]),
            run_duration: Duration::from_secs(2),
        };
        let reports = vec![VuReport {
            vu: 1,
            username: "K6TESTUSER1".to_string(),
            outcome: JourneyOutcome::TimedOut,
            last_phase: Phase::Done,
            elapsed: Duration::from_secs(2),
        }];

        let line = build_summary_line(&summary, &Reports::Journeys(&reports));
        let v = serde_json::to_value(&line).unwrap_or_default();

        assert_eq!(v["kind"], "summary");
        assert_eq!(v["outcomes"]["timed_out"], 1);
        assert_eq!(v["journeys"][0]["outcome"], "timed_out");
        assert_eq!(v["journeys"][0]["last_phase"], "done");
        assert!(v["journeys"][0].get("access_key").is_none());
        assert!(v.get("registrations").is_none());
    }
}
