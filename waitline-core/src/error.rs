use std::time::Duration;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("`vus` must be a positive integer")]
    InvalidVus,

    #[error("`accounts` must be a positive integer")]
    InvalidAccounts,

    #[error("`{name}` must be a positive duration (got {value:?})")]
    InvalidDuration { name: &'static str, value: Duration },

    #[error("`{name}` must be a probability in [0, 1] (got {value})")]
    InvalidProbability { name: &'static str, value: f64 },

    #[error("`{name}` must be a finite range with 0 <= min <= max (got {min}..={max})")]
    InvalidDelayRange { name: &'static str, min: f64, max: f64 },

    #[error("`{name}` is too far in the future to schedule (got {value:?})")]
    DurationTooLarge { name: &'static str, value: Duration },

    #[error("`{name}` of {units} time units does not fit in a duration")]
    UnitsTooLarge { name: &'static str, units: f64 },

    #[error("`admissionTimeout` must be a positive number of time units (got {0})")]
    InvalidAdmissionTimeout(f64),

    #[error("`searchKeywords` must not be empty")]
    EmptyKeywords,

    #[error("invalid url `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },
}
