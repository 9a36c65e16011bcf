/// A single `name=value` pair taken from a `Set-Cookie` header.
///
/// Attributes (`Path`, `Expires`, `HttpOnly`, ...) are dropped: the load generator only ever
/// echoes the pair back in a `Cookie` request header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
}

pub fn parse_set_cookie(raw: &str) -> Option<Cookie> {
    let pair = raw.split(';').next()?.trim();
    let (name, value) = pair.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    let value = value.trim().trim_matches('"');
    Some(Cookie {
        name: name.to_string(),
        value: value.to_string(),
    })
}
