//! Virtual-user executors: each worker owns its session, RNG and realtime connection.
//! Nothing is shared between workers except the write-only stats sink.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use rand::SeedableRng as _;
use rand::rngs::StdRng;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::Instrument as _;

use super::agent::Agent;
use super::api::{Endpoint, TicketApi};
use super::config::{RegisterConfig, ScenarioConfig};
use super::error::{Error, Result};
use super::journey::{Journey, JourneyOutcome, OutcomeKind, Phase, PhaseTracker};
use super::progress::{ProgressFn, ProgressUpdate};
use super::realtime::RealtimeConnector;
use super::stats::{RunStats, checks};
use super::user::{RegistrationProfile, VirtualUser};

#[derive(Debug, Clone)]
pub struct VuReport {
    pub vu: u64,
    pub username: String,
    pub outcome: JourneyOutcome,
    /// Last phase entered; for `DeadlineExceeded` this is where the journey was cut off.
    pub last_phase: Phase,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub struct RegistrationReport {
    pub index: u64,
    pub username: String,
    pub ok: bool,
    /// `None` when no response arrived (transport error or run deadline).
    pub status: Option<u16>,
}

/// Per-VU RNG: reproducible from the run seed, independent between VUs.
pub fn rng_for_vu(seed: Option<u64>, vu: u64) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(vu)),
        None => StdRng::from_os_rng(),
    }
}

struct Completion {
    started: Instant,
    deadline: Instant,
    max_duration: Duration,
    total: u64,
    completed: AtomicU64,
    progress: Option<ProgressFn>,
}

impl Completion {
    fn new(total: u64, max_duration: Duration, progress: Option<ProgressFn>) -> Result<Self> {
        let started = Instant::now();
        let deadline = started
            .checked_add(max_duration)
            .ok_or(Error::DurationTooLarge {
                name: "maxDuration",
                value: max_duration,
            })?;
        Ok(Self {
            started,
            deadline,
            max_duration,
            total,
            completed: AtomicU64::new(0),
            progress,
        })
    }

    fn finish_one(&self, stats: &RunStats) {
        let completed = self.completed.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(progress) = &self.progress {
            progress(ProgressUpdate {
                completed,
                total: self.total,
                elapsed: self.started.elapsed(),
                max_duration: self.max_duration,
                checks_failed_total: stats.checks_failed_total(),
            });
        }
    }
}

/// Sleeps for `rest` unless that would run past `deadline`.
async fn rest_before(deadline: Instant, rest: Duration) {
    if Instant::now()
        .checked_add(rest)
        .is_some_and(|wake| wake < deadline)
    {
        tokio::time::sleep(rest).await;
    }
}

/// Runs `cfg.vus` independent journeys, one iteration each, bounded by `cfg.max_duration`.
///
/// Journeys still running at the deadline are dropped (which also drops any open realtime
/// connection) and reported as `DeadlineExceeded`. Reports are sorted by VU id.
pub async fn run_journeys<A, C>(
    cfg: Arc<ScenarioConfig>,
    api: Arc<A>,
    connector: Arc<C>,
    stats: Arc<RunStats>,
    progress: Option<ProgressFn>,
) -> Result<Vec<VuReport>>
where
    A: TicketApi,
    C: RealtimeConnector,
{
    cfg.validate()?;

    let completion = Arc::new(Completion::new(cfg.vus, cfg.max_duration, progress)?);
    let deadline = completion.deadline;
    let mut tasks = JoinSet::new();

    for vu in 1..=cfg.vus {
        let cfg = cfg.clone();
        let api = api.clone();
        let connector = connector.clone();
        let stats = stats.clone();
        let completion = completion.clone();

        let user = VirtualUser::for_index(&cfg.username_prefix, &cfg.password, vu);
        let span = tracing::info_span!("journey", vu, user = %user.username());

        tasks.spawn(
            async move {
                let started = Instant::now();
                let phase = PhaseTracker::default();
                let username = user.username().to_string();
                let mut journey = Journey::new(
                    api.as_ref(),
                    connector.as_ref(),
                    stats.as_ref(),
                    cfg.as_ref(),
                    rng_for_vu(cfg.seed, vu),
                    user,
                    phase.clone(),
                );

                let outcome = match tokio::time::timeout_at(deadline, journey.run()).await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        tracing::warn!(phase = %phase.current(), "run deadline reached; journey abandoned");
                        JourneyOutcome::DeadlineExceeded
                    }
                };

                tracing::info!(outcome = %outcome.kind(), "journey finished");
                stats.record_outcome(outcome.kind());
                let elapsed = started.elapsed();

                if outcome.kind() != OutcomeKind::DeadlineExceeded {
                    rest_before(deadline, journey.rest_delay()).await;
                }
                completion.finish_one(&stats);

                VuReport {
                    vu,
                    username,
                    outcome,
                    last_phase: phase.current(),
                    elapsed,
                }
            }
            .instrument(span),
        );
    }

    let mut reports = Vec::with_capacity(usize::try_from(cfg.vus).unwrap_or_default());
    while let Some(joined) = tasks.join_next().await {
        reports.push(joined?);
    }
    reports.sort_by_key(|r| r.vu);
    Ok(reports)
}

/// Registers `cfg.accounts` test accounts, one POST per account. Existing accounts fail the
/// `register ok` check and the executor carries on.
pub async fn run_registrations<A: TicketApi>(
    cfg: Arc<RegisterConfig>,
    api: Arc<A>,
    stats: Arc<RunStats>,
    progress: Option<ProgressFn>,
) -> Result<Vec<RegistrationReport>> {
    cfg.validate()?;

    let completion = Arc::new(Completion::new(cfg.accounts, cfg.max_duration, progress)?);
    let deadline = completion.deadline;
    let mut tasks = JoinSet::new();

    for index in 1..=cfg.accounts {
        let cfg = cfg.clone();
        let api = api.clone();
        let stats = stats.clone();
        let completion = completion.clone();
        let profile = RegistrationProfile::for_index(&cfg.username_prefix, &cfg.password, index);
        let span = tracing::info_span!("register", index, user = %profile.username);

        tasks.spawn(
            async move {
                let username = profile.username.clone();
                let email = profile.email.clone();
                let agent = Agent::new(api.as_ref(), stats.as_ref());

                let status = match tokio::time::timeout_at(
                    deadline,
                    agent.call(Endpoint::Register(profile)),
                )
                .await
                {
                    Ok(res) => {
                        let ok = agent.check_ok(checks::REGISTER, res.as_ref());
                        if !ok {
                            tracing::warn!(%email, status = ?res.as_ref().map(|r| r.status), "registration failed");
                        }
                        res.map(|r| r.status)
                    }
                    Err(_) => {
                        stats.record_check(checks::REGISTER, false);
                        tracing::warn!(%email, "run deadline reached before registration completed");
                        None
                    }
                };

                rest_before(deadline, cfg.time_unit).await;
                completion.finish_one(&stats);

                RegistrationReport {
                    index,
                    username,
                    ok: status == Some(200),
                    status,
                }
            }
            .instrument(span),
        );
    }

    let mut reports = Vec::with_capacity(usize::try_from(cfg.accounts).unwrap_or_default());
    while let Some(joined) = tasks.join_next().await {
        reports.push(joined?);
    }
    reports.sort_by_key(|r| r.index);
    Ok(reports)
}
