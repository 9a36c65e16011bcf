use std::time::Duration;

pub type Result<T> = std::result::Result<T, Error>;

/// Coarse class of a failed call, as it shows up in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum HttpTransportErrorKind {
    /// The request never left the client.
    InvalidRequest,
    /// The service could not be reached.
    Connect,
    Timeout,
    /// Connected, but the exchange broke off before a status line.
    Request,
    /// Status received, body cut off.
    BodyRead,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid url `{0}`")]
    InvalidUrl(String),

    #[error("ticketing api urls must be http:// or https://, got `{0}`")]
    UnsupportedScheme(String),

    #[error("invalid request header `{name}`: {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("could not build request: {0}")]
    RequestBuild(#[from] http::Error),

    #[error("service unreachable: {0}")]
    Connect(#[source] hyper_util::client::legacy::Error),

    #[error("no response within {0:?}")]
    Timeout(Duration),

    #[error("request failed: {0}")]
    Request(#[source] hyper_util::client::legacy::Error),

    #[error("response body cut off: {0}")]
    BodyRead(#[from] hyper::Error),
}

impl From<hyper_util::client::legacy::Error> for Error {
    fn from(err: hyper_util::client::legacy::Error) -> Self {
        if err.is_connect() {
            Self::Connect(err)
        } else {
            Self::Request(err)
        }
    }
}

impl Error {
    #[must_use]
    pub fn transport_error_kind(&self) -> HttpTransportErrorKind {
        match self {
            Self::InvalidUrl(_)
            | Self::UnsupportedScheme(_)
            | Self::InvalidHeader { .. }
            | Self::RequestBuild(_) => HttpTransportErrorKind::InvalidRequest,
            Self::Connect(_) => HttpTransportErrorKind::Connect,
            Self::Timeout(_) => HttpTransportErrorKind::Timeout,
            Self::Request(_) => HttpTransportErrorKind::Request,
            Self::BodyRead(_) => HttpTransportErrorKind::BodyRead,
        }
    }
}
