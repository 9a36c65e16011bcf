#![forbid(unsafe_code)]

mod admission;
mod agent;
mod api;
mod behavior;
mod config;
mod error;
mod executor;
mod journey;
mod progress;
mod protocol;
mod realtime;
mod stats;
mod user;

#[cfg(test)]
mod testing;

pub use admission::{AdmissionClient, AdmissionOutcome, AdmissionPath, AdmissionState, CloseReason};
pub use agent::Agent;
pub use api::{Endpoint, HttpTicketApi, TicketApi};
pub use behavior::{Behavior, BehaviorConfig, DelayRange, SeatPeek, next_month_window};
pub use config::{DEFAULT_SEARCH_KEYWORDS, RegisterConfig, ScenarioConfig};
pub use error::{Error, Result};
pub use executor::{
    RegistrationReport, VuReport, rng_for_vu, run_journeys, run_registrations,
};
pub use journey::{Journey, JourneyOutcome, OutcomeKind, Phase, PhaseTracker};
pub use progress::{ProgressFn, ProgressUpdate};
pub use protocol::{
    ACCESS_KEY_HEADER, AdmissionMessage, COOKIE_ACCESS, COOKIE_REFRESH, ProtocolViolation,
    QueueEntryResult, decode_admission_frame, parse_queue_entry,
};
pub use realtime::{RealtimeConnection, RealtimeConnector, RealtimeError, WsConnection, WsConnector};
pub use stats::{CheckSummary, LatencySummaryMs, RunStats, RunSummary, checks};
pub use user::{RegistrationProfile, Session, VirtualUser};
