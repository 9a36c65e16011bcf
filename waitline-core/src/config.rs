use std::sync::Arc;
use std::time::Duration;

use super::behavior::{BehaviorConfig, units_to_duration};
use super::error::{Error, Result};

/// Keywords a curious visitor types into the concert search box.
pub const DEFAULT_SEARCH_KEYWORDS: &[&str] = &[
    "아이유",
    "IU",
    "콘서트",
    "2025",
    "BTS",
    "방탄소년단",
    "블랙핑크",
    "아티스트",
    "라이브",
    "공연",
];

#[derive(Debug, Clone)]
pub struct ScenarioConfig {
    /// API root, e.g. `http://localhost:8080/api`.
    pub base_url: String,
    /// Waiting-queue WebSocket endpoint, e.g. `ws://localhost:8080/ws/waitqueue`.
    pub ws_url: String,
    pub concert_id: u64,
    pub vus: u64,
    /// Hard ceiling for the whole run; journeys still running at this point are abandoned.
    pub max_duration: Duration,
    /// Realtime wait ceiling, in time units.
    pub admission_timeout_units: f64,
    /// Wall-clock length of one behavior "time unit".
    pub time_unit: Duration,
    pub username_prefix: String,
    pub password: String,
    /// Run seed. `None` draws every VU's RNG from OS entropy.
    pub seed: Option<u64>,
    pub search_keywords: Arc<[String]>,
    pub behavior: BehaviorConfig,
    pub http_timeout: Option<Duration>,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            ws_url: "ws://localhost:8080/ws/waitqueue".to_string(),
            concert_id: 111,
            vus: 5,
            max_duration: Duration::from_secs(10 * 60),
            admission_timeout_units: 180.0,
            time_unit: Duration::from_secs(1),
            username_prefix: "K6TESTUSER".to_string(),
            password: "1q2w3e4r!".to_string(),
            seed: None,
            search_keywords: DEFAULT_SEARCH_KEYWORDS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            behavior: BehaviorConfig::default(),
            http_timeout: None,
        }
    }
}

impl ScenarioConfig {
    pub fn validate(&self) -> Result<()> {
        if self.vus == 0 {
            return Err(Error::InvalidVus);
        }
        positive_duration("maxDuration", self.max_duration)?;
        schedulable("maxDuration", self.max_duration)?;
        positive_duration("timeUnit", self.time_unit)?;
        if let Some(t) = self.http_timeout {
            positive_duration("httpTimeout", t)?;
        }
        if !self.admission_timeout_units.is_finite() || self.admission_timeout_units <= 0.0 {
            return Err(Error::InvalidAdmissionTimeout(self.admission_timeout_units));
        }
        units_to_duration("admissionTimeout", self.time_unit, self.admission_timeout_units)?;
        if self.search_keywords.is_empty() {
            return Err(Error::EmptyKeywords);
        }
        validate_url(&self.base_url, &["http", "https"])?;
        validate_url(&self.ws_url, &["ws", "wss"])?;
        self.behavior.validate(self.time_unit)
    }

    /// Saturates for configs that did not pass `validate`.
    #[must_use]
    pub fn admission_timeout(&self) -> Duration {
        units_to_duration("admissionTimeout", self.time_unit, self.admission_timeout_units)
            .unwrap_or(Duration::MAX)
    }

    #[must_use]
    pub fn registration(&self, accounts: u64) -> RegisterConfig {
        RegisterConfig {
            base_url: self.base_url.clone(),
            accounts,
            max_duration: self.max_duration,
            time_unit: self.time_unit,
            username_prefix: self.username_prefix.clone(),
            password: self.password.clone(),
            http_timeout: self.http_timeout,
        }
    }
}

/// Bulk account registration: one POST per account, nothing else.
#[derive(Debug, Clone)]
pub struct RegisterConfig {
    pub base_url: String,
    pub accounts: u64,
    pub max_duration: Duration,
    pub time_unit: Duration,
    pub username_prefix: String,
    pub password: String,
    pub http_timeout: Option<Duration>,
}

impl RegisterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.accounts == 0 {
            return Err(Error::InvalidAccounts);
        }
        positive_duration("maxDuration", self.max_duration)?;
        schedulable("maxDuration", self.max_duration)?;
        positive_duration("timeUnit", self.time_unit)?;
        schedulable("timeUnit", self.time_unit)?;
        validate_url(&self.base_url, &["http", "https"])
    }
}

fn positive_duration(name: &'static str, value: Duration) -> Result<()> {
    if value.is_zero() {
        return Err(Error::InvalidDuration { name, value });
    }
    Ok(())
}

/// The run deadline is `now + value`; it has to fit in an `Instant`.
fn schedulable(name: &'static str, value: Duration) -> Result<()> {
    if tokio::time::Instant::now().checked_add(value).is_none() {
        return Err(Error::DurationTooLarge { name, value });
    }
    Ok(())
}

fn validate_url(raw: &str, schemes: &[&str]) -> Result<()> {
    let parsed = url::Url::parse(raw).map_err(|e| Error::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    if !schemes.contains(&parsed.scheme()) {
        return Err(Error::InvalidUrl {
            url: raw.to_string(),
            reason: format!("expected one of {schemes:?}"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(ScenarioConfig::default().validate().is_ok());
        assert_eq!(
            ScenarioConfig::default().admission_timeout(),
            Duration::from_secs(180)
        );
    }

    #[test]
    fn admission_timeout_scales_with_time_unit() {
        let cfg = ScenarioConfig {
            time_unit: Duration::from_millis(10),
            ..ScenarioConfig::default()
        };
        assert_eq!(cfg.admission_timeout(), Duration::from_millis(1800));
    }

    #[test]
    fn rejects_zero_vus_and_bad_urls() {
        let cfg = ScenarioConfig {
            vus: 0,
            ..ScenarioConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(Error::InvalidVus)));

        let cfg = ScenarioConfig {
            ws_url: "http://localhost:8080/ws/waitqueue".to_string(),
            ..ScenarioConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(Error::InvalidUrl { .. })));
    }

    #[test]
    fn rejects_durations_that_cannot_be_scheduled() {
        let cfg = ScenarioConfig {
            max_duration: Duration::MAX,
            ..ScenarioConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(Error::DurationTooLarge {
                name: "maxDuration",
                ..
            })
        ));

        let cfg = ScenarioConfig {
            admission_timeout_units: 1e30,
            ..ScenarioConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(Error::UnitsTooLarge {
                name: "admissionTimeout",
                ..
            })
        ));
        assert_eq!(cfg.admission_timeout(), Duration::MAX);

        let reg = ScenarioConfig {
            time_unit: Duration::MAX,
            ..ScenarioConfig::default()
        }
        .registration(10);
        assert!(matches!(
            reg.validate(),
            Err(Error::DurationTooLarge {
                name: "timeUnit",
                ..
            })
        ));
    }

    #[test]
    fn registration_inherits_identity_settings() {
        let cfg = ScenarioConfig {
            username_prefix: "LOADUSER".to_string(),
            ..ScenarioConfig::default()
        };
        let reg = cfg.registration(100);
        assert_eq!(reg.accounts, 100);
        assert_eq!(reg.username_prefix, "LOADUSER");
        assert!(reg.validate().is_ok());
        assert!(matches!(
            cfg.registration(0).validate(),
            Err(Error::InvalidAccounts)
        ));
    }
}
