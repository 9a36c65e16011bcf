//! Wire vocabulary shared by the queue-entry HTTP call and the waiting-queue WebSocket.

use serde::Deserialize;

/// Header carrying the admission access key on gated requests.
pub const ACCESS_KEY_HEADER: &str = "X-Access-Key";
pub const COOKIE_ACCESS: &str = "access";
pub const COOKIE_REFRESH: &str = "refresh";

/// Body of `POST /queue/enter`, discriminated by `data.status`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueueEntryResult {
    ImmediateEntry {
        #[serde(rename = "accessKey")]
        access_key: String,
    },
    Waiting {
        rank: u64,
    },
    /// Server refused the entry (`status: "ERROR"`).
    Error {
        #[serde(default)]
        message: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolViolation {
    #[error("queue-entry response has no body")]
    EmptyBody,

    #[error("queue-entry response is not a valid envelope: {0}")]
    Malformed(String),

    #[error("queue-entry response carries an empty access key")]
    EmptyAccessKey,
}

pub fn parse_queue_entry(body: &[u8]) -> Result<QueueEntryResult, ProtocolViolation> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ProtocolViolation::EmptyBody);
    }

    let env: Envelope<QueueEntryResult> =
        serde_json::from_slice(body).map_err(|e| ProtocolViolation::Malformed(e.to_string()))?;

    match env.data {
        QueueEntryResult::ImmediateEntry { access_key } if access_key.is_empty() => {
            Err(ProtocolViolation::EmptyAccessKey)
        }
        other => Ok(other),
    }
}

/// Server push on the waiting-queue channel, discriminated by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdmissionMessage {
    Admit {
        #[serde(rename = "accessKey")]
        access_key: String,
    },
    RankUpdate {
        rank: u64,
    },
    /// Sent to a user that reconnects after already being admitted.
    RedirectToReserve {
        #[serde(rename = "accessKey")]
        access_key: String,
    },
    Error {
        #[serde(default)]
        message: Option<String>,
    },
}

impl AdmissionMessage {
    /// Access key carried by an admitting message.
    pub fn access_key(&self) -> Option<&str> {
        match self {
            Self::Admit { access_key } | Self::RedirectToReserve { access_key } => {
                Some(access_key.as_str())
            }
            Self::RankUpdate { .. } | Self::Error { .. } => None,
        }
    }
}

/// Decodes one text frame. Unknown types, malformed JSON and admissions without a key yield
/// `None`; the caller ignores those frames.
pub fn decode_admission_frame(text: &str) -> Option<AdmissionMessage> {
    let msg: AdmissionMessage = serde_json::from_str(text).ok()?;
    match msg.access_key() {
        Some("") => None,
        _ => Some(msg),
    }
}
