//! Waiting-queue push channel.

use std::future::Future;
use std::time::Duration;

use futures_util::StreamExt as _;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest as _;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::user::Session;

#[derive(Debug, thiserror::Error)]
pub enum RealtimeError {
    #[error("invalid realtime url: {0}")]
    InvalidUrl(String),

    #[error("realtime handshake failed: {0}")]
    Handshake(String),

    #[error("realtime handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),

    #[error("realtime connection error: {0}")]
    Transport(String),

    /// Our own close frame already went out. Expected after admission or timeout.
    #[error("realtime connection: close sent")]
    CloseSent,
}

impl RealtimeError {
    #[must_use]
    pub fn is_self_close(&self) -> bool {
        matches!(self, Self::CloseSent)
    }
}

/// An open push channel. The client never sends application frames.
pub trait RealtimeConnection: Send {
    /// Next text frame; `None` once the peer closed the connection.
    ///
    /// Must be cancel-safe: it is raced against the admission timer.
    fn next_text(&mut self) -> impl Future<Output = Option<Result<String, RealtimeError>>> + Send;

    /// Idempotent; the self-close condition is swallowed.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

pub trait RealtimeConnector: Send + Sync + 'static {
    type Connection: RealtimeConnection;

    fn connect(
        &self,
        concert_id: u64,
        session: &Session,
    ) -> impl Future<Output = Result<Self::Connection, RealtimeError>> + Send;
}

#[derive(Debug, Clone)]
pub struct WsConnector {
    ws_url: String,
    handshake_timeout: Option<Duration>,
}

impl WsConnector {
    pub fn new(ws_url: &str, handshake_timeout: Option<Duration>) -> Self {
        Self {
            ws_url: ws_url.to_string(),
            handshake_timeout,
        }
    }

    fn url_for(&self, concert_id: u64) -> Result<url::Url, RealtimeError> {
        let mut url =
            url::Url::parse(&self.ws_url).map_err(|_| RealtimeError::InvalidUrl(self.ws_url.clone()))?;
        url.query_pairs_mut()
            .append_pair("concertId", &concert_id.to_string());
        Ok(url)
    }
}

impl RealtimeConnector for WsConnector {
    type Connection = WsConnection;

    async fn connect(&self, concert_id: u64, session: &Session) -> Result<WsConnection, RealtimeError> {
        let url = self.url_for(concert_id)?;
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| RealtimeError::InvalidUrl(e.to_string()))?;
        let cookie = HeaderValue::from_str(&session.cookie_header())
            .map_err(|e| RealtimeError::Handshake(e.to_string()))?;
        request.headers_mut().insert("cookie", cookie);

        let handshake = tokio_tungstenite::connect_async(request);
        let res = match self.handshake_timeout {
            Some(t) => tokio::time::timeout(t, handshake)
                .await
                .map_err(|_| RealtimeError::HandshakeTimeout(t))?,
            None => handshake.await,
        };
        let (stream, response) = res.map_err(|e| RealtimeError::Handshake(e.to_string()))?;
        tracing::debug!(status = response.status().as_u16(), %url, "realtime connected");

        Ok(WsConnection {
            stream,
            closed: false,
        })
    }
}

pub struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    closed: bool,
}

impl RealtimeConnection for WsConnection {
    async fn next_text(&mut self) -> Option<Result<String, RealtimeError>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.to_string())),
                Ok(Message::Binary(bytes)) => match std::str::from_utf8(&bytes) {
                    Ok(text) => return Some(Ok(text.to_string())),
                    Err(_) => continue,
                },
                Ok(Message::Close(frame)) => {
                    tracing::debug!(?frame, "realtime peer sent close");
                    return None;
                }
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => continue,
                Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                    return Some(Err(RealtimeError::CloseSent));
                }
                Err(err) => return Some(Err(RealtimeError::Transport(err.to_string()))),
            }
        }
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        match self.stream.close(None).await {
            Ok(()) => {}
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {}
            Err(err) => tracing::debug!(error = %err, "realtime close failed"),
        }
    }
}
