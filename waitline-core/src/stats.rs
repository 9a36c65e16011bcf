use hdrhistogram::Histogram;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::journey::OutcomeKind;

/// Check names recorded by journeys and the registration executor.
pub mod checks {
    pub const LOGIN: &str = "login succeeded";
    pub const CONCERT_LIST: &str = "concert list ok";
    pub const CONCERT_SEARCH: &str = "concert search ok";
    pub const CONCERT_FILTER: &str = "concert filter ok";
    pub const CONCERT_DETAIL: &str = "concert detail ok";
    pub const AI_SUMMARY: &str = "ai summary ok";
    pub const QUEUE_ENTER: &str = "queue enter ok";
    pub const REALTIME_CONNECT: &str = "realtime connect ok";
    pub const SEAT_STATUS: &str = "seat status ok";
    pub const REGISTER: &str = "register ok";
}

#[derive(Debug, Default)]
struct CheckCounters {
    total: AtomicU64,
    failed: AtomicU64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckSummary {
    pub name: String,
    pub total: u64,
    pub failed: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LatencySummaryMs {
    pub p50: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
    pub mean: f64,
    pub max: f64,
    pub count: u64,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub requests_total: u64,
    /// Transport errors plus responses with status >= 400.
    pub requests_failed: u64,
    pub checks_total: u64,
    pub checks_failed: u64,
    pub checks_by_name: Vec<CheckSummary>,
    pub latency: Option<LatencySummaryMs>,
    pub outcomes: BTreeMap<OutcomeKind, u64>,
    pub run_duration: Duration,
}

/// Write-only sink shared by all VUs of a run. Journeys record into it but never read it back.
#[derive(Debug)]
pub struct RunStats {
    requests_total: AtomicU64,
    requests_failed: AtomicU64,
    checks_total: AtomicU64,
    checks_failed: AtomicU64,
    checks_by_name: Mutex<HashMap<Arc<str>, Arc<CheckCounters>>>,
    latency_us: Mutex<Histogram<u64>>,
    outcomes: Mutex<BTreeMap<OutcomeKind, u64>>,
}

impl Default for RunStats {
    fn default() -> Self {
        // Track up to 10 minutes in microseconds (with 3 sigfigs).
        let latency_us = Histogram::<u64>::new_with_bounds(1, 600_000_000, 3)
            .unwrap_or_else(|err| panic!("failed to init histogram: {err}"));

        Self {
            requests_total: AtomicU64::new(0),
            requests_failed: AtomicU64::new(0),
            checks_total: AtomicU64::new(0),
            checks_failed: AtomicU64::new(0),
            checks_by_name: Mutex::new(HashMap::new()),
            latency_us: Mutex::new(latency_us),
            outcomes: Mutex::new(BTreeMap::new()),
        }
    }
}

impl RunStats {
    /// `status == None` means the request failed before a response arrived.
    pub fn record_request(&self, elapsed: Duration, status: Option<u16>) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        if status.is_none_or(|s| s >= 400) {
            self.requests_failed.fetch_add(1, Ordering::Relaxed);
        }

        let us = elapsed.as_micros();
        if us == 0 {
            return;
        }
        let mut h = self
            .latency_us
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let _ = h.record(u64::try_from(us).unwrap_or(u64::MAX));
    }

    pub fn record_check(&self, name: &str, ok: bool) {
        let counters = {
            let mut map = self
                .checks_by_name
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(v) = map.get(name) {
                v.clone()
            } else {
                let v = Arc::new(CheckCounters::default());
                map.insert(Arc::from(name), v.clone());
                v
            }
        };

        self.checks_total.fetch_add(1, Ordering::Relaxed);
        counters.total.fetch_add(1, Ordering::Relaxed);
        if !ok {
            self.checks_failed.fetch_add(1, Ordering::Relaxed);
            counters.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_outcome(&self, kind: OutcomeKind) {
        let mut map = self
            .outcomes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *map.entry(kind).or_insert(0) += 1;
    }

    pub fn checks_failed_total(&self) -> u64 {
        self.checks_failed.load(Ordering::Relaxed)
    }

    pub fn requests_total(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    pub fn summarize(&self, elapsed: Duration) -> RunSummary {
        let checks_by_name = {
            let map = self
                .checks_by_name
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let mut out: Vec<CheckSummary> = map
                .iter()
                .map(|(name, c)| CheckSummary {
                    name: name.to_string(),
                    total: c.total.load(Ordering::Relaxed),
                    failed: c.failed.load(Ordering::Relaxed),
                })
                .collect();
            out.sort_by(|a, b| a.name.cmp(&b.name));
            out
        };

        let latency = {
            let h = self
                .latency_us
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            #[allow(clippy::len_zero)]
            if h.len() == 0 {
                None
            } else {
                let ms = |us: u64| us as f64 / 1000.0;
                Some(LatencySummaryMs {
                    p50: ms(h.value_at_quantile(0.50)),
                    p90: ms(h.value_at_quantile(0.90)),
                    p95: ms(h.value_at_quantile(0.95)),
                    p99: ms(h.value_at_quantile(0.99)),
                    mean: h.mean() / 1000.0,
                    max: ms(h.max()),
                    count: h.len(),
                })
            }
        };

        let outcomes = self
            .outcomes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();

        RunSummary {
            requests_total: self.requests_total.load(Ordering::Relaxed),
            requests_failed: self.requests_failed.load(Ordering::Relaxed),
            checks_total: self.checks_total.load(Ordering::Relaxed),
            checks_failed: self.checks_failed.load(Ordering::Relaxed),
            checks_by_name,
            latency,
            outcomes,
            run_duration: elapsed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checks_are_counted_per_name() {
        let stats = RunStats::default();
        stats.record_check(checks::LOGIN, true);
        stats.record_check(checks::LOGIN, false);
        stats.record_check(checks::QUEUE_ENTER, true);

        let s = stats.summarize(Duration::from_secs(1));
        assert_eq!(s.checks_total, 3);
        assert_eq!(s.checks_failed, 1);
        assert_eq!(
            s.checks_by_name,
            vec![
                CheckSummary {
                    name: checks::LOGIN.to_string(),
                    total: 2,
                    failed: 1
                },
                CheckSummary {
                    name: checks::QUEUE_ENTER.to_string(),
                    total: 1,
                    failed: 0
                },
            ]
        );
    }

    #[test]
    fn transport_errors_and_error_statuses_count_as_failed_requests() {
        let stats = RunStats::default();
        stats.record_request(Duration::from_millis(5), Some(200));
        stats.record_request(Duration::from_millis(7), Some(403));
        stats.record_request(Duration::from_millis(9), None);

        let s = stats.summarize(Duration::from_secs(1));
        assert_eq!(s.requests_total, 3);
        assert_eq!(s.requests_failed, 2);
        let latency = s.latency.unwrap_or_default();
        assert_eq!(latency.count, 3);
        assert!(latency.max >= 8.9 && latency.max <= 9.1, "max={}", latency.max);
    }

    #[test]
    fn outcomes_are_tallied_by_kind() {
        let stats = RunStats::default();
        stats.record_outcome(OutcomeKind::Abandoned);
        stats.record_outcome(OutcomeKind::Abandoned);
        stats.record_outcome(OutcomeKind::ResourceAccessed);

        let s = stats.summarize(Duration::ZERO);
        assert_eq!(s.outcomes.get(&OutcomeKind::Abandoned), Some(&2));
        assert_eq!(s.outcomes.get(&OutcomeKind::ResourceAccessed), Some(&1));
        assert_eq!(s.outcomes.get(&OutcomeKind::TimedOut), None);
    }
}
