use std::future::Future;
use std::time::Duration;

use chrono::NaiveDate;
use waitline_http::{HttpClient, HttpRequest, HttpResponse};

use super::protocol::ACCESS_KEY_HEADER;
use super::user::{RegistrationProfile, Session};

/// Every call the load generator makes against the ticketing API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Login { username: String, password: String },
    Register(RegistrationProfile),
    ListConcerts { page: u32, size: u32 },
    SearchConcerts { query: String },
    FilterConcerts { start: NaiveDate, end: NaiveDate },
    ConcertDetail { concert_id: u64 },
    AiSummary { concert_id: u64 },
    SeatStatus {
        concert_id: u64,
        access_key: Option<String>,
    },
    EnterQueue { concert_id: u64 },
}

impl Endpoint {
    /// Stable label used for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Login { .. } => "login",
            Self::Register(_) => "register",
            Self::ListConcerts { .. } => "concert_list",
            Self::SearchConcerts { .. } => "concert_search",
            Self::FilterConcerts { .. } => "concert_filter",
            Self::ConcertDetail { .. } => "concert_detail",
            Self::AiSummary { .. } => "ai_summary",
            Self::SeatStatus { .. } => "seat_status",
            Self::EnterQueue { .. } => "queue_enter",
        }
    }

    /// Path and query relative to the API root.
    pub fn path_and_query(&self) -> String {
        match self {
            Self::Login { .. } => "/auth/login".to_string(),
            Self::Register(_) => "/auth/register".to_string(),
            Self::ListConcerts { page, size } => format!("/concerts?page={page}&size={size}"),
            Self::SearchConcerts { query } => format!(
                "/concerts/search?{}",
                url::form_urlencoded::Serializer::new(String::new())
                    .append_pair("query", query)
                    .finish()
            ),
            Self::FilterConcerts { start, end } => format!(
                "/concerts/filter?startDate={}&endDate={}",
                start.format("%Y-%m-%d"),
                end.format("%Y-%m-%d")
            ),
            Self::ConcertDetail { concert_id } => format!("/concerts/{concert_id}"),
            Self::AiSummary { concert_id } => format!("/concerts/{concert_id}/ai-summary"),
            Self::SeatStatus { concert_id, .. } => format!("/seats/concerts/{concert_id}/status"),
            Self::EnterQueue { concert_id } => format!("/queue/enter?concertId={concert_id}"),
        }
    }
}

/// Request/response seam to the ticketing service.
///
/// Transport failures surface as `Err`; any HTTP status (including 4xx/5xx) is `Ok`.
pub trait TicketApi: Send + Sync + 'static {
    fn call(
        &self,
        endpoint: Endpoint,
        session: Option<&Session>,
    ) -> impl Future<Output = waitline_http::Result<HttpResponse>> + Send;
}

#[derive(Debug, Clone)]
pub struct HttpTicketApi {
    client: HttpClient,
    base_url: String,
    timeout: Option<Duration>,
}

impl HttpTicketApi {
    pub fn new(client: HttpClient, base_url: &str, timeout: Option<Duration>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    fn build(&self, endpoint: Endpoint, session: Option<&Session>) -> HttpRequest {
        let url = format!("{}{}", self.base_url, endpoint.path_and_query());

        let req = match endpoint {
            Endpoint::Login { username, password } => HttpRequest::post_form(
                url,
                &[("username", username.as_str()), ("password", password.as_str())],
            ),
            Endpoint::Register(profile) => {
                // Serializing a struct of strings cannot fail.
                let body = serde_json::to_vec(&profile).unwrap_or_default();
                HttpRequest::post_json(url, body)
            }
            Endpoint::EnterQueue { .. } => {
                HttpRequest::post_owned(url, bytes::Bytes::new())
                    .with_header("content-type", "application/json")
            }
            Endpoint::SeatStatus { access_key, .. } => {
                let req = HttpRequest::get_owned(url).with_header("content-type", "application/json");
                match access_key {
                    Some(key) => req.with_header(ACCESS_KEY_HEADER, key),
                    None => req,
                }
            }
            Endpoint::ListConcerts { .. }
            | Endpoint::SearchConcerts { .. }
            | Endpoint::FilterConcerts { .. }
            | Endpoint::ConcertDetail { .. }
            | Endpoint::AiSummary { .. } => {
                HttpRequest::get_owned(url).with_header("content-type", "application/json")
            }
        };

        let req = match session {
            Some(session) => req.with_header("cookie", session.cookie_header()),
            None => req,
        };
        req.with_timeout(self.timeout)
    }
}

impl TicketApi for HttpTicketApi {
    async fn call(
        &self,
        endpoint: Endpoint,
        session: Option<&Session>,
    ) -> waitline_http::Result<HttpResponse> {
        let req = self.build(endpoint, session);
        self.client.request(req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api() -> HttpTicketApi {
        HttpTicketApi::new(HttpClient::default(), "http://localhost:8080/api/", None)
    }

    fn header<'a>(req: &'a HttpRequest, name: &str) -> Option<&'a str> {
        req.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn paths_match_the_ticketing_api() {
        let search = Endpoint::SearchConcerts {
            query: "방탄소년단 live".to_string(),
        };
        assert!(search.path_and_query().starts_with("/concerts/search?query="));
        assert!(!search.path_and_query().contains(' '));

        let filter = Endpoint::FilterConcerts {
            start: NaiveDate::from_ymd_opt(2026, 11, 1).unwrap_or_default(),
            end: NaiveDate::from_ymd_opt(2026, 11, 30).unwrap_or_default(),
        };
        assert_eq!(
            filter.path_and_query(),
            "/concerts/filter?startDate=2026-11-01&endDate=2026-11-30"
        );
        assert_eq!(
            Endpoint::EnterQueue { concert_id: 111 }.path_and_query(),
            "/queue/enter?concertId=111"
        );
    }

    #[test]
    fn session_and_access_key_are_attached() {
        let session = Session::new("a1", "r1");
        let req = api().build(
            Endpoint::SeatStatus {
                concert_id: 111,
                access_key: Some("K1".to_string()),
            },
            Some(&session),
        );

        assert_eq!(req.url, "http://localhost:8080/api/seats/concerts/111/status");
        assert_eq!(header(&req, "cookie"), Some("access=a1; refresh=r1"));
        assert_eq!(header(&req, ACCESS_KEY_HEADER), Some("K1"));
    }

    #[test]
    fn login_is_form_encoded_without_session() {
        let req = api().build(
            Endpoint::Login {
                username: "K6TESTUSER1".to_string(),
                password: "1q2w3e4r!".to_string(),
            },
            None,
        );

        assert_eq!(req.method.as_str(), "POST");
        assert_eq!(header(&req, "cookie"), None);
        assert_eq!(
            header(&req, "content-type"),
            Some("application/x-www-form-urlencoded")
        );
    }
}
