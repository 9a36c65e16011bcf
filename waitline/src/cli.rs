use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Same syntax as durations in the YAML config (`10s`, `250ms`, `1m 30s`, `2h`).
fn parse_duration(input: &str) -> Result<Duration, String> {
    humantime::parse_duration(input.trim())
        .map_err(|e| format!("invalid duration '{input}': {e} (expected e.g. 10s, 250ms, 1m)"))
}

fn parse_units(input: &str) -> Result<f64, String> {
    let v: f64 = input
        .trim()
        .parse()
        .map_err(|_| format!("invalid number of time units '{input}'"))?;
    if !v.is_finite() || v <= 0.0 {
        return Err(format!("time units must be positive (got '{input}')"));
    }
    Ok(v)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Progress bar and a human-readable summary.
    HumanReadable,
    /// Emit JSON progress and summary lines (NDJSON) to stdout.
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "waitline",
    author,
    version,
    about = "Realistic visitor traffic against a virtual waiting queue",
    long_about = "waitline simulates ticket buyers: each virtual user logs in, browses concerts, \
hesitates, maybe gives up, and otherwise joins the waiting queue, waits for an access key over \
the realtime channel, and uses it on the gated seat-status resource.\n\nSettings come from \
built-in defaults, then an optional YAML file (--config), then flags and WAITLINE_* env vars.",
    after_help = "Examples:\n  waitline register --accounts 100\n  waitline run --vus 5\n  \
waitline run --config scenario.yaml --vus 50 --output json\n  \
waitline run --base-url https://tickets.example.com/api --ws-url wss://tickets.example.com/ws/waitqueue"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one journey per virtual user
    Run(RunArgs),

    /// Create the test accounts the journeys log in with
    Register(RegisterArgs),
}

/// Flags shared by every command.
#[derive(Debug, Args)]
pub struct CommonArgs {
    /// YAML scenario file (camelCase keys)
    #[arg(long, env = "WAITLINE_CONFIG")]
    pub config: Option<PathBuf>,

    /// API root, e.g. http://localhost:8080/api
    #[arg(long, env = "WAITLINE_BASE_URL")]
    pub base_url: Option<String>,

    /// Account username prefix; the VU id is appended
    #[arg(long, env = "WAITLINE_USERNAME_PREFIX")]
    pub username_prefix: Option<String>,

    /// Password shared by all test accounts
    #[arg(long, env = "WAITLINE_PASSWORD")]
    pub password: Option<String>,

    /// Wall-clock bound for the whole run (e.g. 10m)
    #[arg(long, env = "WAITLINE_MAX_DURATION", value_parser = parse_duration)]
    pub max_duration: Option<Duration>,

    /// Length of one behavior time unit (e.g. 1s, 10ms)
    #[arg(long, env = "WAITLINE_TIME_UNIT", value_parser = parse_duration)]
    pub time_unit: Option<Duration>,

    /// Per-request HTTP timeout
    #[arg(long, env = "WAITLINE_HTTP_TIMEOUT", value_parser = parse_duration)]
    pub http_timeout: Option<Duration>,

    /// Log filter when RUST_LOG is unset (e.g. info, debug, waitline_core=trace)
    #[arg(long, env = "WAITLINE_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Output format
    #[arg(long, value_enum, env = "WAITLINE_OUTPUT", default_value_t = OutputFormat::HumanReadable)]
    pub output: OutputFormat,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Waiting-queue WebSocket endpoint
    #[arg(long, env = "WAITLINE_WS_URL")]
    pub ws_url: Option<String>,

    /// Concert every visitor ends up queueing for
    #[arg(long, env = "WAITLINE_CONCERT_ID")]
    pub concert_id: Option<u64>,

    /// Number of virtual users
    #[arg(long, env = "WAITLINE_VUS")]
    pub vus: Option<u64>,

    /// How long to wait for admission, in time units
    #[arg(long, env = "WAITLINE_ADMISSION_TIMEOUT", value_parser = parse_units)]
    pub admission_timeout: Option<f64>,

    /// Seed for reproducible behavior (omit for OS entropy)
    #[arg(long, env = "WAITLINE_SEED")]
    pub seed: Option<u64>,
}

#[derive(Debug, Args)]
pub struct RegisterArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Number of accounts to create
    #[arg(long, env = "WAITLINE_ACCOUNTS")]
    pub accounts: Option<u64>,
}
