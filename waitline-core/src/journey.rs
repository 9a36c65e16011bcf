//! One visitor, one iteration: login, browse, decide, queue, access.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use rand::Rng;

use super::admission::{AdmissionClient, AdmissionOutcome};
use super::agent::Agent;
use super::api::{Endpoint, TicketApi};
use super::behavior::Behavior;
use super::config::ScenarioConfig;
use super::realtime::RealtimeConnector;
use super::stats::{RunStats, checks};
use super::user::{Session, VirtualUser};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JourneyOutcome {
    LoginFailed,
    Abandoned,
    /// Queue entry answered with a malformed body or an explicit refusal.
    QueueRejected(String),
    /// The realtime channel failed before an access key arrived.
    ConnectionClosed,
    TimedOut,
    ResourceAccessed { access_key: String },
    ResourceAccessFailed { access_key: String, status: Option<u16> },
    /// The run's `max_duration` elapsed while this journey was still going.
    DeadlineExceeded,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, strum::Display, strum::EnumIter,
)]
#[strum(serialize_all = "snake_case")]
pub enum OutcomeKind {
    LoginFailed,
    Abandoned,
    QueueRejected,
    ConnectionClosed,
    TimedOut,
    ResourceAccessed,
    ResourceAccessFailed,
    DeadlineExceeded,
}

impl JourneyOutcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Self::LoginFailed => OutcomeKind::LoginFailed,
            Self::Abandoned => OutcomeKind::Abandoned,
            Self::QueueRejected(_) => OutcomeKind::QueueRejected,
            Self::ConnectionClosed => OutcomeKind::ConnectionClosed,
            Self::TimedOut => OutcomeKind::TimedOut,
            Self::ResourceAccessed { .. } => OutcomeKind::ResourceAccessed,
            Self::ResourceAccessFailed { .. } => OutcomeKind::ResourceAccessFailed,
            Self::DeadlineExceeded => OutcomeKind::DeadlineExceeded,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::FromRepr)]
#[strum(serialize_all = "snake_case")]
#[repr(u8)]
pub enum Phase {
    Start,
    Login,
    Browse,
    Decide,
    Queue,
    Access,
    Done,
}

/// Last phase a journey entered. Survives the journey being dropped at the run deadline.
#[derive(Debug, Clone)]
pub struct PhaseTracker(Arc<AtomicU8>);

impl Default for PhaseTracker {
    fn default() -> Self {
        Self(Arc::new(AtomicU8::new(Phase::Start as u8)))
    }
}

impl PhaseTracker {
    pub fn enter(&self, phase: Phase) {
        self.0.store(phase as u8, Ordering::Release);
        tracing::info!(%phase, "phase");
    }

    pub fn current(&self) -> Phase {
        Phase::from_repr(self.0.load(Ordering::Acquire)).unwrap_or(Phase::Start)
    }
}

pub struct Journey<'a, A, C, R> {
    agent: Agent<'a, A>,
    connector: &'a C,
    cfg: &'a ScenarioConfig,
    behavior: Behavior<R>,
    user: VirtualUser,
    phase: PhaseTracker,
}

impl<'a, A, C, R> Journey<'a, A, C, R>
where
    A: TicketApi,
    C: RealtimeConnector,
    R: Rng + Send,
{
    pub fn new(
        api: &'a A,
        connector: &'a C,
        stats: &'a RunStats,
        cfg: &'a ScenarioConfig,
        rng: R,
        user: VirtualUser,
        phase: PhaseTracker,
    ) -> Self {
        let behavior = Behavior::new(
            rng,
            cfg.behavior.clone(),
            cfg.time_unit,
            cfg.search_keywords.clone(),
            cfg.concert_id,
        );
        Self {
            agent: Agent::new(api, stats),
            connector,
            cfg,
            behavior,
            user,
            phase,
        }
    }

    /// Runs every phase once and returns as soon as the outcome is known.
    pub async fn run(&mut self) -> JourneyOutcome {
        tracing::info!("journey started");

        self.phase.enter(Phase::Login);
        if !self.login().await {
            tracing::warn!("login failed; journey over");
            return JourneyOutcome::LoginFailed;
        }

        self.phase.enter(Phase::Browse);
        self.browse().await;

        self.phase.enter(Phase::Decide);
        if !self.behavior.decide().await {
            tracing::info!("too expensive, maybe next time (abandoned)");
            return JourneyOutcome::Abandoned;
        }
        tracing::info!("decided to buy");
        let doubt = self.behavior.final_hesitation().await;
        tracing::debug!(?doubt, "final hesitation");

        self.phase.enter(Phase::Queue);
        let mut admission = AdmissionClient::new(
            self.connector,
            self.cfg.concert_id,
            self.cfg.admission_timeout(),
        );
        let outcome = match admission.admit(&self.agent).await {
            AdmissionOutcome::Admitted { access_key, path } => {
                tracing::info!(%path, "holding access key");
                self.phase.enter(Phase::Access);
                self.access(access_key).await
            }
            AdmissionOutcome::TimedOut => JourneyOutcome::TimedOut,
            AdmissionOutcome::Closed(reason) => {
                tracing::info!(%reason, "left the queue without an access key");
                JourneyOutcome::ConnectionClosed
            }
            AdmissionOutcome::Rejected(reason) => JourneyOutcome::QueueRejected(reason),
        };

        if outcome.kind() != OutcomeKind::ResourceAccessed {
            tracing::info!(outcome = %outcome.kind(), "missed the booking window");
        }

        self.phase.enter(Phase::Done);
        outcome
    }

    /// Post-journey idle time; the caller decides whether it still fits the run.
    pub fn rest_delay(&mut self) -> Duration {
        self.behavior.rest_delay()
    }

    async fn login(&mut self) -> bool {
        let res = self
            .agent
            .call(Endpoint::Login {
                username: self.user.username().to_string(),
                password: self.user.password().to_string(),
            })
            .await;
        if !self.agent.check_ok(checks::LOGIN, res.as_ref()) {
            return false;
        }

        match res.as_ref().and_then(Session::from_login) {
            Some(session) => {
                self.agent.authenticate(session);
                true
            }
            None => {
                tracing::warn!("login response carried no access/refresh cookies");
                false
            }
        }
    }

    async fn browse(&mut self) {
        self.behavior.browse_list(&self.agent).await;
        self.behavior.maybe_search(&self.agent).await;
        self.behavior.maybe_filter(&self.agent).await;
        self.behavior.view_detail(&self.agent).await;
        self.behavior.maybe_view_ai_summary(&self.agent).await;
        self.behavior.maybe_peek_seats(&self.agent).await;
    }

    async fn access(&mut self, access_key: String) -> JourneyOutcome {
        let res = self
            .agent
            .call(Endpoint::SeatStatus {
                concert_id: self.cfg.concert_id,
                access_key: Some(access_key.clone()),
            })
            .await;

        if self.agent.check_ok(checks::SEAT_STATUS, res.as_ref()) {
            tracing::info!("booking page reached; seat selection is open");
            JourneyOutcome::ResourceAccessed { access_key }
        } else {
            let status = res.map(|r| r.status);
            tracing::warn!(?status, "gated seat request failed");
            JourneyOutcome::ResourceAccessFailed { access_key, status }
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng as _;
    use rand::rngs::StdRng;

    use super::*;
    use crate::behavior::BehaviorConfig;
    use crate::testing::{
        RecordedCall, ScriptedApi, ScriptedConnector, Then, admit, immediate, rank_update,
        response, scenario, waiting,
    };

    async fn run_one(
        api: &ScriptedApi,
        connector: &ScriptedConnector,
        cfg: &ScenarioConfig,
    ) -> (JourneyOutcome, RunStats, Phase) {
        let stats = RunStats::default();
        let phase = PhaseTracker::default();
        let user = VirtualUser::for_index(&cfg.username_prefix, &cfg.password, 1);
        let outcome = Journey::new(
            api,
            connector,
            &stats,
            cfg,
            StdRng::seed_from_u64(1),
            user,
            phase.clone(),
        )
        .run()
        .await;
        (outcome, stats, phase.current())
    }

    fn names(calls: &[RecordedCall]) -> Vec<&'static str> {
        calls.iter().map(|c| c.endpoint.name()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn immediate_entry_reaches_the_gated_resource() {
        let api = ScriptedApi::new(immediate("K1"));
        let connector = ScriptedConnector::new(Vec::new(), Then::Silence);
        let cfg = scenario();

        let (outcome, stats, phase) = run_one(&api, &connector, &cfg).await;

        assert_eq!(
            outcome,
            JourneyOutcome::ResourceAccessed {
                access_key: "K1".to_string()
            }
        );
        assert_eq!(phase, Phase::Done);
        assert_eq!(connector.counters.connects(), 0);
        assert_eq!(api.gated_keys(), vec!["K1".to_string()]);
        assert_eq!(stats.checks_failed_total(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn requests_follow_the_visitor_order_and_carry_the_session() {
        let api = ScriptedApi::new(immediate("K1"));
        let connector = ScriptedConnector::new(Vec::new(), Then::Silence);
        let cfg = scenario();

        let _ = run_one(&api, &connector, &cfg).await;

        let calls = api.calls();
        assert_eq!(
            names(&calls),
            vec!["login", "concert_list", "concert_detail", "queue_enter", "seat_status"]
        );
        assert_eq!(calls[0].cookie, None);
        for call in &calls[1..] {
            assert_eq!(call.cookie.as_deref(), Some("access=A1; refresh=R1"));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn realtime_admission_reaches_the_gated_resource() {
        let api = ScriptedApi::new(waiting(7));
        let connector = ScriptedConnector::new(
            vec![
                (Duration::from_secs(3), rank_update(3)),
                (Duration::from_secs(3), admit("K2")),
            ],
            Then::Silence,
        );
        let cfg = scenario();

        let (outcome, _, _) = run_one(&api, &connector, &cfg).await;

        assert_eq!(
            outcome,
            JourneyOutcome::ResourceAccessed {
                access_key: "K2".to_string()
            }
        );
        assert_eq!(api.gated_keys(), vec!["K2".to_string()]);
        assert_eq!(connector.counters.connects(), 1);
        assert_eq!(connector.counters.max_open(), 1);
        assert_eq!(connector.counters.open(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_queue_times_out_without_touching_the_resource() {
        let api = ScriptedApi::new(waiting(50));
        let connector = ScriptedConnector::new(Vec::new(), Then::Silence);
        let cfg = scenario();

        let started = tokio::time::Instant::now();
        let (outcome, _, phase) = run_one(&api, &connector, &cfg).await;

        assert_eq!(outcome, JourneyOutcome::TimedOut);
        assert_eq!(phase, Phase::Done);
        assert!(started.elapsed() >= Duration::from_secs(180));
        assert!(api.gated_keys().is_empty());
        assert_eq!(connector.counters.open(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn login_failure_stops_before_browsing() {
        let api = ScriptedApi::new(immediate("K1")).with_login(response(401, ""));
        let connector = ScriptedConnector::new(Vec::new(), Then::Silence);
        let cfg = scenario();

        let (outcome, stats, phase) = run_one(&api, &connector, &cfg).await;

        assert_eq!(outcome, JourneyOutcome::LoginFailed);
        assert_eq!(phase, Phase::Login);
        assert_eq!(names(&api.calls()), vec!["login"]);
        assert_eq!(stats.checks_failed_total(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn login_without_cookies_counts_as_failed() {
        let api = ScriptedApi::new(immediate("K1")).with_login(response(200, "{}"));
        let connector = ScriptedConnector::new(Vec::new(), Then::Silence);

        let (outcome, _, _) = run_one(&api, &connector, &scenario()).await;
        assert_eq!(outcome, JourneyOutcome::LoginFailed);
        assert_eq!(api.count("queue_enter"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn abandoning_visitor_never_joins_the_queue() {
        let api = ScriptedApi::new(immediate("K1"));
        let connector = ScriptedConnector::new(Vec::new(), Then::Silence);
        let mut cfg = scenario();
        cfg.behavior.abandon_probability = 1.0;

        let (outcome, _, phase) = run_one(&api, &connector, &cfg).await;

        assert_eq!(outcome, JourneyOutcome::Abandoned);
        assert_eq!(phase, Phase::Decide);
        assert_eq!(api.count("queue_enter"), 0);
        assert_eq!(connector.counters.connects(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_entry_ends_the_journey_without_connecting() {
        let api = ScriptedApi::new(response(200, r#"{"data":{"status":"SOMETHING_NEW"}}"#));
        let connector = ScriptedConnector::new(Vec::new(), Then::Silence);

        let (outcome, _, _) = run_one(&api, &connector, &scenario()).await;

        assert!(matches!(outcome, JourneyOutcome::QueueRejected(_)));
        assert_eq!(connector.counters.connects(), 0);
        assert!(api.gated_keys().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn denied_gated_request_is_reported_with_its_status() {
        let api = ScriptedApi::new(immediate("K1")).with_other(|endpoint| match endpoint {
            Endpoint::SeatStatus { .. } => response(403, ""),
            _ => response(200, "{}"),
        });
        let connector = ScriptedConnector::new(Vec::new(), Then::Silence);

        let (outcome, _, _) = run_one(&api, &connector, &scenario()).await;

        assert_eq!(
            outcome,
            JourneyOutcome::ResourceAccessFailed {
                access_key: "K1".to_string(),
                status: Some(403)
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn seat_peek_before_admission_records_no_check() {
        let api = ScriptedApi::new(immediate("K1")).with_other(|endpoint| match endpoint {
            Endpoint::SeatStatus {
                access_key: None, ..
            } => response(403, ""),
            _ => response(200, "{}"),
        });
        let connector = ScriptedConnector::new(Vec::new(), Then::Silence);
        let mut cfg = scenario();
        cfg.behavior = BehaviorConfig {
            seat_peek_probability: 1.0,
            ..cfg.behavior
        };

        let (outcome, stats, _) = run_one(&api, &connector, &cfg).await;

        assert!(matches!(outcome, JourneyOutcome::ResourceAccessed { .. }));
        assert_eq!(api.count("seat_status"), 2);
        assert_eq!(stats.checks_failed_total(), 0);
    }

    #[test]
    fn phase_tracker_reports_last_phase() {
        let tracker = PhaseTracker::default();
        assert_eq!(tracker.current(), Phase::Start);
        tracker.enter(Phase::Queue);
        assert_eq!(tracker.clone().current(), Phase::Queue);
        assert_eq!(Phase::Queue.to_string(), "queue");
    }
}
