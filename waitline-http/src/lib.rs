#![forbid(unsafe_code)]

mod client;
mod cookie;
mod error;
mod types;

pub use client::HttpClient;
pub use cookie::{Cookie, parse_set_cookie};
pub use error::{Error, HttpTransportErrorKind, Result};
pub use types::{HttpRequest, HttpResponse};
