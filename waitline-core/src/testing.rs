//! Scripted stand-ins for the ticketing API and the realtime channel.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use waitline_http::HttpResponse;

use super::api::{Endpoint, TicketApi};
use super::behavior::BehaviorConfig;
use super::config::ScenarioConfig;
use super::realtime::{RealtimeConnection, RealtimeConnector, RealtimeError};
use super::user::Session;

pub fn response(status: u16, body: &str) -> HttpResponse {
    HttpResponse {
        status,
        body: Bytes::from(body.to_string()),
        headers: Vec::new(),
    }
}

pub fn login_ok() -> HttpResponse {
    HttpResponse {
        status: 200,
        body: Bytes::from_static(b"{}"),
        headers: vec![
            ("set-cookie".to_string(), "access=A1; Path=/; HttpOnly".to_string()),
            ("set-cookie".to_string(), "refresh=R1; Path=/; HttpOnly".to_string()),
        ],
    }
}

/// Login answer whose tokens name the user, so sessions differ between VUs.
pub fn login_as(username: &str) -> HttpResponse {
    HttpResponse {
        headers: vec![
            ("set-cookie".to_string(), format!("access=A-{username}; Path=/")),
            ("set-cookie".to_string(), format!("refresh=R-{username}; Path=/")),
        ],
        ..login_ok()
    }
}

pub fn immediate(key: &str) -> HttpResponse {
    response(
        200,
        &format!(r#"{{"data":{{"status":"IMMEDIATE_ENTRY","accessKey":"{key}"}}}}"#),
    )
}

pub fn waiting(rank: u64) -> HttpResponse {
    response(200, &format!(r#"{{"data":{{"status":"WAITING","rank":{rank}}}}}"#))
}

pub fn rank_update(rank: u64) -> String {
    format!(r#"{{"type":"RANK_UPDATE","rank":{rank}}}"#)
}

pub fn admit(key: &str) -> String {
    format!(r#"{{"type":"ADMIT","accessKey":"{key}"}}"#)
}

/// Deterministic scenario: every optional step off, no abandonment, no delays.
pub fn scenario() -> ScenarioConfig {
    ScenarioConfig {
        vus: 1,
        seed: Some(7),
        behavior: BehaviorConfig {
            search_probability: 0.0,
            filter_probability: 0.0,
            ai_summary_probability: 0.0,
            seat_peek_probability: 0.0,
            abandon_probability: 0.0,
            ..BehaviorConfig::default().without_delays()
        },
        ..ScenarioConfig::default()
    }
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub endpoint: Endpoint,
    pub cookie: Option<String>,
}

type Responder = dyn Fn(&Endpoint) -> HttpResponse + Send + Sync;

/// Answers login with cookies, queue entry with `enter`, everything else with 200.
pub struct ScriptedApi {
    login: HttpResponse,
    per_user_login: bool,
    enter: HttpResponse,
    other: Box<Responder>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedApi {
    pub fn new(enter: HttpResponse) -> Self {
        Self {
            login: login_ok(),
            per_user_login: false,
            enter,
            other: Box::new(|_| response(200, "{}")),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_login(mut self, login: HttpResponse) -> Self {
        self.login = login;
        self
    }

    /// Every user gets their own tokens (see [`login_as`]).
    pub fn with_per_user_login(mut self) -> Self {
        self.per_user_login = true;
        self
    }

    pub fn with_other(mut self, other: impl Fn(&Endpoint) -> HttpResponse + Send + Sync + 'static) -> Self {
        self.other = Box::new(other);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Access keys carried by gated seat requests, in call order.
    pub fn gated_keys(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c.endpoint {
                Endpoint::SeatStatus {
                    access_key: Some(key),
                    ..
                } => Some(key),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.endpoint.name() == name)
            .count()
    }
}

impl TicketApi for ScriptedApi {
    async fn call(
        &self,
        endpoint: Endpoint,
        session: Option<&Session>,
    ) -> waitline_http::Result<HttpResponse> {
        let res = match &endpoint {
            Endpoint::Login { username, .. } if self.per_user_login => login_as(username),
            Endpoint::Login { .. } => self.login.clone(),
            Endpoint::EnterQueue { .. } => self.enter.clone(),
            other => (self.other)(other),
        };
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(RecordedCall {
                endpoint,
                cookie: session.map(Session::cookie_header),
            });
        Ok(res)
    }
}

/// What the channel does once the scripted frames run out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Then {
    Silence,
    PeerClose,
    Error,
}

#[derive(Debug, Default)]
pub struct ConnectionCounters {
    pub connects: AtomicUsize,
    pub open: AtomicUsize,
    pub max_open: AtomicUsize,
    pub closes: AtomicUsize,
    /// Open connections per session cookie.
    by_owner: Mutex<HashMap<String, usize>>,
    max_open_per_owner: AtomicUsize,
}

impl ConnectionCounters {
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn open(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    pub fn max_open(&self) -> usize {
        self.max_open.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Distinct sessions that ever connected.
    pub fn owners(&self) -> usize {
        self.owners_lock().len()
    }

    /// Most connections any single session held at the same time.
    pub fn max_open_per_owner(&self) -> usize {
        self.max_open_per_owner.load(Ordering::SeqCst)
    }

    fn owners_lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, usize>> {
        self.by_owner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn opened(&self, owner: &str) {
        let open = self.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_open.fetch_max(open, Ordering::SeqCst);

        let mut owners = self.owners_lock();
        let held = owners.entry(owner.to_string()).or_default();
        *held += 1;
        self.max_open_per_owner.fetch_max(*held, Ordering::SeqCst);
    }

    fn released(&self, owner: &str) {
        self.open.fetch_sub(1, Ordering::SeqCst);
        if let Some(held) = self.owners_lock().get_mut(owner) {
            *held = held.saturating_sub(1);
        }
    }
}

pub struct ScriptedConnector {
    frames: Vec<(Duration, String)>,
    then: Then,
    refuse: bool,
    pub counters: Arc<ConnectionCounters>,
}

impl ScriptedConnector {
    /// Each frame is delivered after its delay, measured from the previous frame.
    pub fn new(frames: Vec<(Duration, String)>, then: Then) -> Self {
        Self {
            frames,
            then,
            refuse: false,
            counters: Arc::new(ConnectionCounters::default()),
        }
    }

    pub fn refusing() -> Self {
        Self {
            refuse: true,
            ..Self::new(Vec::new(), Then::Silence)
        }
    }
}

impl RealtimeConnector for ScriptedConnector {
    type Connection = ScriptedConnection;

    async fn connect(&self, _concert_id: u64, session: &Session) -> Result<ScriptedConnection, RealtimeError> {
        self.counters.connects.fetch_add(1, Ordering::SeqCst);
        if self.refuse {
            return Err(RealtimeError::Handshake("refused".to_string()));
        }
        let owner = session.cookie_header();
        self.counters.opened(&owner);
        Ok(ScriptedConnection {
            owner,
            frames: self.frames.iter().cloned().collect(),
            then: self.then,
            closed: false,
            counters: self.counters.clone(),
        })
    }
}

pub struct ScriptedConnection {
    owner: String,
    frames: VecDeque<(Duration, String)>,
    then: Then,
    closed: bool,
    counters: Arc<ConnectionCounters>,
}

impl ScriptedConnection {
    fn release(&mut self) {
        if !self.closed {
            self.closed = true;
            self.counters.released(&self.owner);
        }
    }
}

impl RealtimeConnection for ScriptedConnection {
    async fn next_text(&mut self) -> Option<Result<String, RealtimeError>> {
        if let Some((delay, _)) = self.frames.front() {
            tokio::time::sleep(*delay).await;
            return self.frames.pop_front().map(|(_, text)| Ok(text));
        }
        match self.then {
            Then::Silence => std::future::pending().await,
            Then::PeerClose => None,
            Then::Error => Some(Err(RealtimeError::Transport("reset by peer".to_string()))),
        }
    }

    async fn close(&mut self) {
        if !self.closed {
            self.counters.closes.fetch_add(1, Ordering::SeqCst);
        }
        self.release();
    }
}

impl Drop for ScriptedConnection {
    fn drop(&mut self) {
        self.release();
    }
}
