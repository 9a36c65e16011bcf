use std::sync::Arc;

mod format;
mod progress;
mod summary;

use format::format_duration;
use progress::HumanProgress;
use summary::render;

use super::{Header, OutputFormatter, Reports};

pub(crate) struct HumanReadableOutput {
    progress: Arc<HumanProgress>,
}

impl HumanReadableOutput {
    pub(crate) fn new() -> Self {
        Self {
            progress: Arc::new(HumanProgress::new()),
        }
    }
}

impl OutputFormatter for HumanReadableOutput {
    fn print_header(&self, header: Header<'_>) {
        match header {
            Header::Run(cfg) => {
                println!("target: {} (realtime {})", cfg.base_url, cfg.ws_url);
                println!(
                    "run: vus={} concert={} max_duration={} time_unit={} admission_timeout={}",
                    cfg.vus,
                    cfg.concert_id,
                    format_duration(cfg.max_duration),
                    format_duration(cfg.time_unit),
                    format_duration(cfg.admission_timeout()),
                );
                if let Some(seed) = cfg.seed {
                    println!("seed: {seed}");
                }
            }
            Header::Register(cfg) => {
                println!("target: {}", cfg.base_url);
                println!(
                    "register: accounts={} prefix={} max_duration={}",
                    cfg.accounts,
                    cfg.username_prefix,
                    format_duration(cfg.max_duration),
                );
            }
        }
        println!();
    }

    fn progress(&self) -> Option<waitline_core::ProgressFn> {
        let progress = self.progress.clone();
        Some(Arc::new(move |u| {
            let message = format!(
                "{}/{} done elapsed={} checks_failed={}",
                u.completed,
                u.total,
                format_duration(u.elapsed),
                u.checks_failed_total
            );
            progress.update(u.completed, u.total, message);
        }))
    }

    fn print_summary(
        &self,
        summary: &waitline_core::RunSummary,
        reports: Reports<'_>,
    ) -> anyhow::Result<()> {
        self.progress.finish();
        print!("{}", render(summary, &reports));
        Ok(())
    }
}
