//! Client identifiers used to bucket requests.

use std::borrow::Borrow;
use std::net::{IpAddr, SocketAddr};

/// Key shared by every request whose client cannot be identified.
///
/// All such requests draw from one quota, so a single anonymous client can
/// exhaust it for every other client that also lands here.
pub const FALLBACK_KEY: &str = "unknown";

/// A non-empty identifier that uniquely names a throttled client.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientKey(String);

impl ClientKey {
    /// Create a key from a raw identifier. Blank identifiers yield `None`.
    pub fn new(value: impl AsRef<str>) -> Option<Self> {
        let value = value.as_ref().trim();
        if value.is_empty() {
            None
        } else {
            Some(Self(value.to_string()))
        }
    }

    /// The shared bucket for unidentifiable clients.
    pub fn unknown() -> Self {
        Self(FALLBACK_KEY.to_string())
    }

    /// Key a client by the IP of its socket address; the port is ignored.
    pub fn from_socket_addr(addr: SocketAddr) -> Self {
        Self::from(addr.ip())
    }

    /// Key a client by the first address in an `X-Forwarded-For` value.
    pub fn from_forwarded_for(value: &str) -> Option<Self> {
        value.split(',').next().and_then(Self::new)
    }

    /// Whether this is the shared fallback bucket.
    pub fn is_fallback(&self) -> bool {
        self.0 == FALLBACK_KEY
    }

    /// Get the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<IpAddr> for ClientKey {
    fn from(ip: IpAddr) -> Self {
        Self(ip.to_string())
    }
}

impl Borrow<str> for ClientKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ClientKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
