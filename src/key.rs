//! Client key derivation.
//!
//! Rate limit decisions are scoped to a single string key per logical
//! request. The key is derived from already-extracted request attributes
//! with a fixed precedence: explicit API key, then authenticated user, then
//! client IP. This keeps the derivation free of any HTTP framework; callers
//! pull the raw values out of their request type and hand them over here.

use std::fmt;

/// The request attributes a rate limit key is derived from.
///
/// All fields are optional except the remote address, which every transport
/// can supply.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestIdentity<'a> {
    /// Explicit API key (e.g. an `X-API-Key` header value)
    pub api_key: Option<&'a str>,
    /// Authenticated principal, when the request carries one
    pub user: Option<&'a str>,
    /// Forwarding header value (e.g. `X-Forwarded-For`), possibly a
    /// comma-separated list
    pub forwarded_for: Option<&'a str>,
    /// The peer address of the connection
    pub remote_addr: &'a str,
}

impl RequestIdentity<'_> {
    /// Derive the rate limit key for this request.
    ///
    /// Precedence: API key, authenticated user, client IP. The resulting key
    /// is prefixed with its source (`api:`, `user:`, `ip:`) so that the same
    /// literal value cannot collide across sources.
    pub fn client_key(&self) -> String {
        if let Some(api_key) = usable(self.api_key) {
            return format!("api:{}", api_key);
        }
        if let Some(user) = usable(self.user) {
            return format!("user:{}", user);
        }
        format!("ip:{}", self.client_ip())
    }

    /// Resolve the client IP, preferring the forwarding header over the
    /// peer address. Multi-value lists resolve to the first listed address,
    /// which is the originating client when proxies append in order.
    fn client_ip(&self) -> &str {
        if let Some(forwarded) = usable(self.forwarded_for) {
            return forwarded.split(',').next().unwrap_or(forwarded).trim();
        }
        self.remote_addr
    }
}

impl fmt::Display for RequestIdentity<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.client_key())
    }
}

/// Treat empty and placeholder `unknown` values as absent.
fn usable(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("unknown"))
}
