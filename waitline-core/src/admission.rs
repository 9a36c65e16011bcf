//! Queue admission: `Idle -> Entering -> {Immediate | Waiting} -> {Admitted | TimedOut | Closed}`.
//!
//! The access key may arrive on either channel (the HTTP entry response or a realtime push),
//! at most once. The realtime wait is raced against a fixed timer started at connect time, and
//! the connection is closed on every exit path.

use std::time::Duration;

use super::agent::Agent;
use super::api::{Endpoint, TicketApi};
use super::protocol::{AdmissionMessage, QueueEntryResult, decode_admission_frame, parse_queue_entry};
use super::realtime::{RealtimeConnection, RealtimeConnector};
use super::stats::checks;
use super::user::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum AdmissionState {
    Idle,
    Entering,
    Immediate,
    Waiting,
    Admitted,
    TimedOut,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum AdmissionPath {
    Immediate,
    Realtime,
}

#[derive(Debug, Clone, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum CloseReason {
    HandshakeFailed,
    PeerClosed,
    ConnectionError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionOutcome {
    Admitted {
        access_key: String,
        path: AdmissionPath,
    },
    TimedOut,
    Closed(CloseReason),
    /// The entry response was unusable or an explicit `ERROR`. No realtime connection is opened.
    Rejected(String),
}

impl AdmissionOutcome {
    pub fn access_key(&self) -> Option<&str> {
        match self {
            Self::Admitted { access_key, .. } => Some(access_key),
            Self::TimedOut | Self::Closed(_) | Self::Rejected(_) => None,
        }
    }
}

pub struct AdmissionClient<'a, C> {
    connector: &'a C,
    concert_id: u64,
    timeout: Duration,
    state: AdmissionState,
    rank: Option<u64>,
}

impl<'a, C: RealtimeConnector> AdmissionClient<'a, C> {
    pub fn new(connector: &'a C, concert_id: u64, timeout: Duration) -> Self {
        Self {
            connector,
            concert_id,
            timeout,
            state: AdmissionState::Idle,
            rank: None,
        }
    }

    pub fn state(&self) -> AdmissionState {
        self.state
    }

    /// Last rank reported by the server. Progress display only.
    pub fn rank(&self) -> Option<u64> {
        self.rank
    }

    fn transition(&mut self, next: AdmissionState) {
        tracing::debug!(from = %self.state, to = %next, "admission state");
        self.state = next;
    }

    /// Runs the whole admission exchange for an authenticated agent.
    pub async fn admit<A: TicketApi>(&mut self, agent: &Agent<'_, A>) -> AdmissionOutcome {
        self.transition(AdmissionState::Entering);
        let res = agent
            .call(Endpoint::EnterQueue {
                concert_id: self.concert_id,
            })
            .await;
        agent.check_ok(checks::QUEUE_ENTER, res.as_ref());

        // A non-200 status is a failed check, not a stop: branch on whatever body came back.
        let body = res.map(|r| r.body).unwrap_or_default();
        let entry = match parse_queue_entry(&body) {
            Ok(entry) => entry,
            Err(violation) => {
                tracing::warn!(%violation, "queue entry protocol violation");
                self.transition(AdmissionState::Closed);
                return AdmissionOutcome::Rejected(violation.to_string());
            }
        };

        match entry {
            QueueEntryResult::ImmediateEntry { access_key } => {
                self.transition(AdmissionState::Immediate);
                tracing::info!("immediate entry");
                self.transition(AdmissionState::Admitted);
                AdmissionOutcome::Admitted {
                    access_key,
                    path: AdmissionPath::Immediate,
                }
            }
            QueueEntryResult::Waiting { rank } => {
                self.transition(AdmissionState::Waiting);
                self.rank = Some(rank);
                tracing::info!(rank, "entered waiting queue");
                let Some(session) = agent.session() else {
                    self.transition(AdmissionState::Closed);
                    return AdmissionOutcome::Rejected("no session for realtime channel".to_string());
                };
                self.wait(agent, session).await
            }
            QueueEntryResult::Error { message } => {
                let reason = message.unwrap_or_else(|| "queue entry refused".to_string());
                tracing::warn!(%reason, "queue entry refused");
                self.transition(AdmissionState::Closed);
                AdmissionOutcome::Rejected(reason)
            }
        }
    }

    async fn wait<A: TicketApi>(&mut self, agent: &Agent<'_, A>, session: &Session) -> AdmissionOutcome {
        let mut conn = match self.connector.connect(self.concert_id, session).await {
            Ok(conn) => {
                agent.stats().record_check(checks::REALTIME_CONNECT, true);
                tracing::info!("realtime channel open");
                conn
            }
            Err(err) => {
                agent.stats().record_check(checks::REALTIME_CONNECT, false);
                tracing::warn!(error = %err, "realtime connect failed");
                self.transition(AdmissionState::Closed);
                return AdmissionOutcome::Closed(CloseReason::HandshakeFailed);
            }
        };

        let outcome = self.receive(&mut conn).await;
        conn.close().await;
        tracing::debug!("realtime channel closed");
        outcome
    }

    async fn receive<T: RealtimeConnection>(&mut self, conn: &mut T) -> AdmissionOutcome {
        let deadline = tokio::time::sleep(self.timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                biased;

                frame = conn.next_text() => match frame {
                    Some(Ok(text)) => {
                        if let Some(outcome) = self.on_message(&text) {
                            return outcome;
                        }
                    }
                    Some(Err(err)) if err.is_self_close() => {
                        tracing::debug!("realtime channel already closed by us");
                        self.transition(AdmissionState::Closed);
                        return AdmissionOutcome::Closed(CloseReason::PeerClosed);
                    }
                    Some(Err(err)) => {
                        tracing::warn!(error = %err, "realtime connection error");
                        self.transition(AdmissionState::Closed);
                        return AdmissionOutcome::Closed(CloseReason::ConnectionError);
                    }
                    None => {
                        tracing::info!("realtime channel closed by server");
                        self.transition(AdmissionState::Closed);
                        return AdmissionOutcome::Closed(CloseReason::PeerClosed);
                    }
                },

                () = &mut deadline => {
                    tracing::info!(timeout = ?self.timeout, rank = ?self.rank, "gave up waiting");
                    self.transition(AdmissionState::TimedOut);
                    return AdmissionOutcome::TimedOut;
                }
            }
        }
    }

    /// `Some` on a terminal message.
    fn on_message(&mut self, text: &str) -> Option<AdmissionOutcome> {
        let Some(msg) = decode_admission_frame(text) else {
            tracing::debug!(frame = %text, "ignoring realtime frame");
            return None;
        };

        match msg {
            AdmissionMessage::Admit { access_key }
            | AdmissionMessage::RedirectToReserve { access_key } => {
                tracing::info!("admitted");
                self.transition(AdmissionState::Admitted);
                Some(AdmissionOutcome::Admitted {
                    access_key,
                    path: AdmissionPath::Realtime,
                })
            }
            AdmissionMessage::RankUpdate { rank } => {
                self.rank = Some(rank);
                if rank <= 3 {
                    tracing::info!(rank, "almost at the front");
                } else {
                    tracing::debug!(rank, "rank update");
                }
                None
            }
            AdmissionMessage::Error { message } => {
                tracing::warn!(?message, "realtime error message");
                None
            }
        }
    }
}
