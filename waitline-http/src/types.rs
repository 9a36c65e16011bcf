use std::time::Duration;

use bytes::Bytes;

use super::cookie::{Cookie, parse_set_cookie};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Bytes,
    /// Response headers (lowercased header names). Repeated headers are joined with ", ",
    /// except `set-cookie`, which keeps one entry per header line.
    pub headers: Vec<(String, String)>,
}

impl HttpResponse {
    pub fn body_utf8(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn cookies(&self) -> impl Iterator<Item = Cookie> + '_ {
        self.headers
            .iter()
            .filter(|(k, _)| k == "set-cookie")
            .filter_map(|(_, v)| parse_set_cookie(v))
    }

    /// Last value set for `name`; later `Set-Cookie` lines win, as in a browser jar.
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.cookies()
            .filter(|c| c.name == name)
            .last()
            .map(|c| c.value)
    }
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: http::Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn get(url: &str) -> Self {
        Self::get_owned(url.to_string())
    }

    pub fn get_owned(url: String) -> Self {
        Self {
            method: http::Method::GET,
            url,
            headers: Vec::new(),
            body: Bytes::new(),
            timeout: None,
        }
    }

    pub fn post(url: &str, body: Bytes) -> Self {
        Self::post_owned(url.to_string(), body)
    }

    pub fn post_owned(url: String, body: Bytes) -> Self {
        Self {
            method: http::Method::POST,
            url,
            headers: Vec::new(),
            body,
            timeout: None,
        }
    }

    /// `application/x-www-form-urlencoded` POST.
    pub fn post_form(url: String, fields: &[(&str, &str)]) -> Self {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields)
            .finish();
        Self::post_owned(url, Bytes::from(body))
            .with_header("content-type", "application/x-www-form-urlencoded")
    }

    pub fn post_json(url: String, body: Vec<u8>) -> Self {
        Self::post_owned(url, Bytes::from(body)).with_header("content-type", "application/json")
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}
