use serde::Serialize;

use waitline_http::HttpResponse;

use super::protocol::{COOKIE_ACCESS, COOKIE_REFRESH};

/// One simulated visitor. The identity is derived from the VU index only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualUser {
    index: u64,
    username: String,
    password: String,
}

impl VirtualUser {
    pub fn for_index(prefix: &str, password: &str, index: u64) -> Self {
        Self {
            index,
            username: format!("{prefix}{index}"),
            password: password.to_string(),
        }
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

/// Login credentials captured from the `access`/`refresh` cookies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    access: String,
    refresh: String,
}

impl Session {
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access: access.into(),
            refresh: refresh.into(),
        }
    }

    /// Both cookies are required.
    pub fn from_login(res: &HttpResponse) -> Option<Self> {
        let access = res.cookie(COOKIE_ACCESS)?;
        let refresh = res.cookie(COOKIE_REFRESH)?;
        Some(Self::new(access, refresh))
    }

    pub fn cookie_header(&self) -> String {
        format!(
            "{COOKIE_ACCESS}={}; {COOKIE_REFRESH}={}",
            self.access, self.refresh
        )
    }
}

/// `POST /auth/register` body for a pre-provisioned load-test account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrationProfile {
    pub email: String,
    pub username: String,
    pub password: String,
    pub name: String,
    pub nickname: String,
    pub phone: String,
    pub address: String,
}

impl RegistrationProfile {
    pub fn for_index(prefix: &str, password: &str, index: u64) -> Self {
        let username = format!("{prefix}{index}");
        let suffix = (1000 + index).to_string();
        let last4 = &suffix[suffix.len().saturating_sub(4)..];

        Self {
            email: format!("{username}@example.com"),
            password: password.to_string(),
            name: username.clone(),
            nickname: username.clone(),
            phone: format!("010-1234-{last4}"),
            address: "test address".to_string(),
            username,
        }
    }
}
