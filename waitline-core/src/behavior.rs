//! Human-like pacing: independent weighted coin flips and bounded uniform delays.
//!
//! All randomness comes from the injected RNG, so a seeded run replays the same
//! choices and the same delays.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike as _, Months, NaiveDate};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::agent::Agent;
use super::api::{Endpoint, TicketApi};
use super::error::{Error, Result};
use super::stats::checks;

/// Inclusive `[min, max]` in time units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DelayRange {
    pub min: f64,
    pub max: f64,
}

impl DelayRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub const fn fixed(units: f64) -> Self {
        Self::new(units, units)
    }

    fn validate(self, name: &'static str, time_unit: Duration) -> Result<()> {
        let ok = self.min.is_finite() && self.max.is_finite() && self.min >= 0.0 && self.min <= self.max;
        if !ok {
            return Err(Error::InvalidDelayRange {
                name,
                min: self.min,
                max: self.max,
            });
        }
        units_to_duration(name, time_unit, self.max).map(|_| ())
    }
}

/// `units × time_unit`, rejecting products a `Duration` cannot hold.
pub(crate) fn units_to_duration(name: &'static str, time_unit: Duration, units: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(time_unit.as_secs_f64() * units)
        .map_err(|_| Error::UnitsTooLarge { name, units })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct BehaviorConfig {
    pub list_browse_delay: DelayRange,
    pub search_probability: f64,
    pub search_delay: DelayRange,
    pub filter_probability: f64,
    pub filter_delay: DelayRange,
    pub detail_reading_delay: DelayRange,
    pub ai_summary_probability: f64,
    pub ai_summary_delay: DelayRange,
    pub seat_peek_probability: f64,
    pub seat_peek_delay: DelayRange,
    pub hesitation_delay: DelayRange,
    pub abandon_probability: f64,
    pub final_hesitation_delay: DelayRange,
    pub post_journey_delay: DelayRange,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            list_browse_delay: DelayRange::new(1.0, 3.0),
            search_probability: 0.5,
            search_delay: DelayRange::new(2.0, 5.0),
            filter_probability: 0.3,
            filter_delay: DelayRange::new(1.0, 3.0),
            detail_reading_delay: DelayRange::new(10.0, 30.0),
            ai_summary_probability: 0.7,
            ai_summary_delay: DelayRange::new(3.0, 8.0),
            seat_peek_probability: 0.4,
            seat_peek_delay: DelayRange::fixed(2.0),
            hesitation_delay: DelayRange::new(10.0, 40.0),
            abandon_probability: 0.15,
            final_hesitation_delay: DelayRange::new(1.0, 3.0),
            post_journey_delay: DelayRange::fixed(1.0),
        }
    }
}

impl BehaviorConfig {
    /// No delays at all; probabilities unchanged.
    #[must_use]
    pub fn without_delays(self) -> Self {
        let zero = DelayRange::fixed(0.0);
        Self {
            list_browse_delay: zero,
            search_delay: zero,
            filter_delay: zero,
            detail_reading_delay: zero,
            ai_summary_delay: zero,
            seat_peek_delay: zero,
            hesitation_delay: zero,
            final_hesitation_delay: zero,
            post_journey_delay: zero,
            ..self
        }
    }

    /// Checks probabilities and that every delay, scaled by `time_unit`, is a valid duration.
    pub fn validate(&self, time_unit: Duration) -> Result<()> {
        for (name, value) in [
            ("searchProbability", self.search_probability),
            ("filterProbability", self.filter_probability),
            ("aiSummaryProbability", self.ai_summary_probability),
            ("seatPeekProbability", self.seat_peek_probability),
            ("abandonProbability", self.abandon_probability),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::InvalidProbability { name, value });
            }
        }

        for (name, range) in [
            ("listBrowseDelay", self.list_browse_delay),
            ("searchDelay", self.search_delay),
            ("filterDelay", self.filter_delay),
            ("detailReadingDelay", self.detail_reading_delay),
            ("aiSummaryDelay", self.ai_summary_delay),
            ("seatPeekDelay", self.seat_peek_delay),
            ("hesitationDelay", self.hesitation_delay),
            ("finalHesitationDelay", self.final_hesitation_delay),
            ("postJourneyDelay", self.post_journey_delay),
        ] {
            range.validate(name, time_unit)?;
        }
        Ok(())
    }
}

/// How a pre-admission seat-status peek came back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum SeatPeek {
    /// 401/403: the gate did its job.
    Denied,
    /// 2xx without an access key.
    Allowed,
    ServiceError,
    Other,
    /// No response at all.
    Transport,
}

impl SeatPeek {
    pub fn classify(status: Option<u16>) -> Self {
        match status {
            None => Self::Transport,
            Some(401 | 403) => Self::Denied,
            Some(200..=299) => Self::Allowed,
            Some(500..=599) => Self::ServiceError,
            Some(_) => Self::Other,
        }
    }
}

/// First and last day of the calendar month after `today`.
pub fn next_month_window(today: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
    let start = today.with_day(1)?.checked_add_months(Months::new(1))?;
    let end = start.checked_add_months(Months::new(1))?.pred_opt()?;
    Some((start, end))
}

pub struct Behavior<R> {
    rng: R,
    table: BehaviorConfig,
    time_unit: Duration,
    keywords: Arc<[String]>,
    concert_id: u64,
}

impl<R: Rng + Send> Behavior<R> {
    pub fn new(
        rng: R,
        table: BehaviorConfig,
        time_unit: Duration,
        keywords: Arc<[String]>,
        concert_id: u64,
    ) -> Self {
        Self {
            rng,
            table,
            time_unit,
            keywords,
            concert_id,
        }
    }

    pub fn roll(&mut self, probability: f64) -> bool {
        self.rng.random_bool(probability.clamp(0.0, 1.0))
    }

    pub fn delay(&mut self, range: DelayRange) -> Duration {
        let units = if range.max > range.min {
            self.rng.random_range(range.min..=range.max)
        } else {
            range.min
        };
        // Validated tables never saturate.
        Duration::try_from_secs_f64(self.time_unit.as_secs_f64() * units.max(0.0))
            .unwrap_or(Duration::MAX)
    }

    pub async fn pause(&mut self, range: DelayRange) -> Duration {
        let d = self.delay(range);
        if !d.is_zero() {
            tokio::time::sleep(d).await;
        }
        d
    }

    fn pick_keyword(&mut self) -> Option<String> {
        if self.keywords.is_empty() {
            return None;
        }
        let idx = self.rng.random_range(0..self.keywords.len());
        self.keywords.get(idx).cloned()
    }

    /// Opens the concert list and skims it.
    pub async fn browse_list<A: TicketApi>(&mut self, agent: &Agent<'_, A>) {
        let res = agent
            .call(Endpoint::ListConcerts { page: 0, size: 20 })
            .await;
        agent.check_ok(checks::CONCERT_LIST, res.as_ref());
        self.pause(self.table.list_browse_delay).await;
    }

    pub async fn maybe_search<A: TicketApi>(&mut self, agent: &Agent<'_, A>) -> bool {
        if !self.roll(self.table.search_probability) {
            return false;
        }
        let Some(query) = self.pick_keyword() else {
            return false;
        };

        tracing::info!(%query, "searching concerts");
        let res = agent.call(Endpoint::SearchConcerts { query }).await;
        agent.check_ok(checks::CONCERT_SEARCH, res.as_ref());
        self.pause(self.table.search_delay).await;
        true
    }

    /// Filters on next calendar month, computed from the local wall-clock date.
    pub async fn maybe_filter<A: TicketApi>(&mut self, agent: &Agent<'_, A>) -> bool {
        if !self.roll(self.table.filter_probability) {
            return false;
        }
        let today = chrono::Local::now().date_naive();
        let Some((start, end)) = next_month_window(today) else {
            tracing::warn!(%today, "cannot compute next-month window; skipping filter");
            return false;
        };

        tracing::info!(%start, %end, "filtering concerts by date");
        let res = agent.call(Endpoint::FilterConcerts { start, end }).await;
        agent.check_ok(checks::CONCERT_FILTER, res.as_ref());
        self.pause(self.table.filter_delay).await;
        true
    }

    pub async fn view_detail<A: TicketApi>(&mut self, agent: &Agent<'_, A>) {
        let res = agent
            .call(Endpoint::ConcertDetail {
                concert_id: self.concert_id,
            })
            .await;
        agent.check_ok(checks::CONCERT_DETAIL, res.as_ref());

        let reading = self.delay(self.table.detail_reading_delay);
        tracing::info!(?reading, "reading concert detail");
        tokio::time::sleep(reading).await;
    }

    pub async fn maybe_view_ai_summary<A: TicketApi>(&mut self, agent: &Agent<'_, A>) -> bool {
        if !self.roll(self.table.ai_summary_probability) {
            return false;
        }

        tracing::info!("checking ai summary");
        let res = agent
            .call(Endpoint::AiSummary {
                concert_id: self.concert_id,
            })
            .await;
        agent.check_ok(checks::AI_SUMMARY, res.as_ref());
        self.pause(self.table.ai_summary_delay).await;
        true
    }

    /// Peeks at seat status before holding an access key. Not a check: a denial is expected.
    pub async fn maybe_peek_seats<A: TicketApi>(&mut self, agent: &Agent<'_, A>) -> bool {
        if !self.roll(self.table.seat_peek_probability) {
            return false;
        }

        let res = agent
            .call(Endpoint::SeatStatus {
                concert_id: self.concert_id,
                access_key: None,
            })
            .await;
        let status = res.as_ref().map(|r| r.status);
        match SeatPeek::classify(status) {
            SeatPeek::Denied => tracing::info!(?status, "seat peek denied before admission"),
            SeatPeek::Allowed => {
                tracing::warn!(?status, "seat peek allowed without an access key")
            }
            peek @ (SeatPeek::ServiceError | SeatPeek::Other | SeatPeek::Transport) => {
                tracing::warn!(?status, %peek, "seat peek failed for a reason other than admission")
            }
        }
        self.pause(self.table.seat_peek_delay).await;
        true
    }

    /// Hesitates, then decides. `false` means the visitor walks away.
    pub async fn decide(&mut self) -> bool {
        let hesitation = self.delay(self.table.hesitation_delay);
        tracing::info!(?hesitation, "thinking it over");
        tokio::time::sleep(hesitation).await;

        !self.roll(self.table.abandon_probability)
    }

    /// The last second of doubt in front of the booking button.
    pub async fn final_hesitation(&mut self) -> Duration {
        self.pause(self.table.final_hesitation_delay).await
    }

    /// Pause between the end of one journey and the worker going idle.
    pub fn rest_delay(&mut self) -> Duration {
        self.delay(self.table.post_journey_delay)
    }
}
