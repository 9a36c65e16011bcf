use bytes::Bytes;
use http::header::{self, HeaderMap, HeaderName, HeaderValue};
use http_body_util::{BodyExt as _, Full};
use hyper::Request;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use std::collections::BTreeMap;
use std::time::Duration;

use super::{Error, HttpRequest, HttpResponse, Result};

/// Pooled HTTP/1.1 client shared by every virtual user of a run.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
}

impl Default for HttpClient {
    /// Bounded connect so an unreachable service shows up as failed logins, not a stalled run.
    fn default() -> Self {
        Self::new(Some(Duration::from_secs(3)))
    }
}

impl HttpClient {
    #[must_use]
    pub fn new(connect_timeout: Option<Duration>) -> Self {
        let mut connector = HttpConnector::new();
        connector.enforce_http(false);
        connector.set_connect_timeout(connect_timeout);

        let https = HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .wrap_connector(connector);

        Self {
            inner: Client::builder(TokioExecutor::new()).build(https),
        }
    }

    pub async fn request(&self, req: HttpRequest) -> Result<HttpResponse> {
        let HttpRequest {
            method,
            url,
            headers,
            body,
            timeout,
        } = req;

        let uri = target_uri(&url)?;
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in &headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| Error::InvalidHeader {
                name: name.clone(),
                reason: e.to_string(),
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| Error::InvalidHeader {
                name: name.to_string(),
                reason: e.to_string(),
            })?;
            builder = builder.header(name, value);
        }
        let request = builder.body(Full::new(body))?;

        let response = match timeout {
            Some(limit) => tokio::time::timeout(limit, self.inner.request(request))
                .await
                .map_err(|_| Error::Timeout(limit))??,
            None => self.inner.request(request).await?,
        };

        let (parts, body) = response.into_parts();
        let body = body.collect().await?.to_bytes();

        Ok(HttpResponse {
            status: parts.status.as_u16(),
            body,
            headers: flatten_headers(&parts.headers),
        })
    }

    pub async fn get(&self, url: &str) -> Result<HttpResponse> {
        self.request(HttpRequest::get(url)).await
    }
}

fn target_uri(url: &str) -> Result<hyper::Uri> {
    let parsed = url::Url::parse(url).map_err(|_| Error::InvalidUrl(url.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(Error::UnsupportedScheme(url.to_string()));
    }
    parsed
        .as_str()
        .parse()
        .map_err(|_| Error::InvalidUrl(url.to_string()))
}

/// Lowercased names; one entry per `set-cookie` line (cookie dates contain commas),
/// every other repeated header joined with ", ".
fn flatten_headers(map: &HeaderMap) -> Vec<(String, String)> {
    let mut cookies = Vec::new();
    let mut merged: BTreeMap<String, String> = BTreeMap::new();

    for (name, value) in map {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        if name == header::SET_COOKIE {
            cookies.push((name.as_str().to_string(), value));
            continue;
        }
        merged
            .entry(name.as_str().to_string())
            .and_modify(|joined| {
                joined.push_str(", ");
                joined.push_str(&value);
            })
            .or_insert(value);
    }

    cookies.extend(merged);
    cookies
}
