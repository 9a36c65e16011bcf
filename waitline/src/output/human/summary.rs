use std::fmt::Write as _;

use waitline_core::{JourneyOutcome, RunSummary};

use super::format::{format_duration, format_ms, format_rate};
use crate::output::{Reports, outcome_detail};

pub(crate) fn render(summary: &RunSummary, reports: &Reports<'_>) -> String {
    let mut out = String::new();

    out.push_str("summary\n");
    match reports {
        Reports::Journeys(reports) => {
            out.push_str("journeys\n");
            for r in *reports {
                write!(
                    &mut out,
                    "  vu {:>4} {:<16} {:<22} {}",
                    r.vu,
                    r.username,
                    r.outcome.kind(),
                    format_duration(r.elapsed)
                )
                .ok();
                if let JourneyOutcome::ResourceAccessed { access_key } = &r.outcome {
                    write!(&mut out, " key={access_key}").ok();
                }
                if let Some(detail) = outcome_detail(r) {
                    write!(&mut out, " ({detail})").ok();
                }
                out.push('\n');
            }

            out.push_str("outcomes\n");
            for (kind, count) in &summary.outcomes {
                writeln!(&mut out, "  {kind}: {count}").ok();
            }
        }
        Reports::Registrations(reports) => {
            let ok = reports.iter().filter(|r| r.ok).count();
            writeln!(&mut out, "registrations: {ok}/{} created", reports.len()).ok();
            for r in reports.iter().filter(|r| !r.ok) {
                let status = r
                    .status
                    .map_or_else(|| "no response".to_string(), |s| format!("status {s}"));
                writeln!(&mut out, "  failed {} ({status})", r.username).ok();
            }
        }
    }

    out.push_str("checks\n");
    for c in &summary.checks_by_name {
        let mark = if c.failed == 0 { "ok  " } else { "FAIL" };
        writeln!(
            &mut out,
            "  {mark} {}: {}/{} passed",
            c.name,
            c.total - c.failed,
            c.total
        )
        .ok();
    }
    writeln!(
        &mut out,
        "  checks_failed_total: {} of {}",
        summary.checks_failed, summary.checks_total
    )
    .ok();

    out.push_str("requests\n");
    writeln!(
        &mut out,
        "  total: {} (failed {})",
        summary.requests_total, summary.requests_failed
    )
    .ok();
    let secs = summary.run_duration.as_secs_f64().max(1e-9);
    writeln!(
        &mut out,
        "  rate: {}/s over {}",
        format_rate(summary.requests_total as f64 / secs),
        format_duration(summary.run_duration)
    )
    .ok();
    match &summary.latency {
        Some(l) => {
            writeln!(
                &mut out,
                "  latency = p50={} p90={} p95={} p99={} mean={} max={} (n={})",
                format_ms(l.p50),
                format_ms(l.p90),
                format_ms(l.p95),
                format_ms(l.p99),
                format_ms(l.mean),
                format_ms(l.max),
                l.count
            )
            .ok();
        }
        None => out.push_str("  latency: n/a\n"),
    }

    out
}
