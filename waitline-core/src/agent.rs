use std::time::Instant;

use waitline_http::HttpResponse;

use super::api::{Endpoint, TicketApi};
use super::stats::RunStats;
use super::user::Session;

/// One VU's view of the API: its own session plus the shared stats sink.
pub struct Agent<'a, A> {
    api: &'a A,
    stats: &'a RunStats,
    session: Option<Session>,
}

impl<'a, A: TicketApi> Agent<'a, A> {
    pub fn new(api: &'a A, stats: &'a RunStats) -> Self {
        Self {
            api,
            stats,
            session: None,
        }
    }

    /// Captures the login credentials. The first session wins; later calls are ignored.
    pub fn authenticate(&mut self, session: Session) {
        if self.session.is_none() {
            self.session = Some(session);
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn stats(&self) -> &RunStats {
        self.stats
    }

    /// Issues one call, recording its latency. Transport failures are logged and mapped to `None`.
    pub async fn call(&self, endpoint: Endpoint) -> Option<HttpResponse> {
        let name = endpoint.name();
        let started = Instant::now();
        let res = self.api.call(endpoint, self.session.as_ref()).await;
        let elapsed = started.elapsed();

        match res {
            Ok(res) => {
                self.stats.record_request(elapsed, Some(res.status));
                tracing::debug!(endpoint = name, status = res.status, ?elapsed, "http call");
                Some(res)
            }
            Err(err) => {
                self.stats.record_request(elapsed, None);
                tracing::warn!(
                    endpoint = name,
                    kind = %err.transport_error_kind(),
                    error = %err,
                    "http call failed"
                );
                None
            }
        }
    }

    /// Records a named check on "status is 200" and returns the verdict.
    pub fn check_ok(&self, name: &str, res: Option<&HttpResponse>) -> bool {
        let ok = res.is_some_and(|r| r.status == 200);
        self.stats.record_check(name, ok);
        ok
    }
}
