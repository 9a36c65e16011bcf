use waitline_core::{ProgressFn, RegisterConfig, RegistrationReport, RunSummary, ScenarioConfig, VuReport};

use crate::cli::OutputFormat;

mod human;
mod json;

pub(crate) enum Header<'a> {
    Run(&'a ScenarioConfig),
    Register(&'a RegisterConfig),
}

pub(crate) enum Reports<'a> {
    Journeys(&'a [VuReport]),
    Registrations(&'a [RegistrationReport]),
}

pub(crate) trait OutputFormatter: Send + Sync {
    fn print_header(&self, header: Header<'_>);
    fn progress(&self) -> Option<ProgressFn>;
    fn print_summary(&self, summary: &RunSummary, reports: Reports<'_>) -> anyhow::Result<()>;
}

pub(crate) fn formatter(format: OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::HumanReadable => Box::new(human::HumanReadableOutput::new()),
        OutputFormat::Json => Box::new(json::JsonOutput),
    }
}

/// Stable label for a journey outcome's detail, shared by both formats.
pub(crate) fn outcome_detail(report: &VuReport) -> Option<String> {
    use waitline_core::JourneyOutcome as O;
    match &report.outcome {
        O::QueueRejected(reason) => Some(reason.clone()),
        O::ResourceAccessFailed { status, .. } => Some(match status {
            Some(s) => format!("status {s}"),
            None => "no response".to_string(),
        }),
        O::DeadlineExceeded => Some(format!("cut off in {}", report.last_phase)),
        O::LoginFailed
        | O::Abandoned
        | O::ConnectionClosed
        | O::TimedOut
        | O::ResourceAccessed { .. } => None,
    }
}
