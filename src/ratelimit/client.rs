//! Client identifier resolution.

use std::net::SocketAddr;

/// Key used for requests that carry no usable client identifier.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// A normalized client identifier used to bucket requests.
///
/// Empty or whitespace-only identifiers are never used as keys; they all
/// collapse onto [`UNKNOWN_CLIENT`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientId(String);

impl ClientId {
    /// Normalize a raw identifier.
    pub fn normalize(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            Self(UNKNOWN_CLIENT.to_string())
        } else {
            Self(trimmed.to_string())
        }
    }

    /// Resolve the identifier for a request.
    ///
    /// With `trust_forwarded_for`, the first address in `X-Forwarded-For`
    /// wins. Otherwise the peer IP is used (port discarded, so reconnects
    /// share a bucket). Falls back to [`UNKNOWN_CLIENT`].
    pub fn resolve(
        forwarded_for: Option<&str>,
        peer: Option<SocketAddr>,
        trust_forwarded_for: bool,
    ) -> Self {
        if trust_forwarded_for {
            let first_hop = forwarded_for
                .and_then(|value| value.split(',').next())
                .map(str::trim)
                .filter(|hop| !hop.is_empty());
            if let Some(hop) = first_hop {
                return Self::normalize(hop);
            }
        }

        match peer {
            Some(addr) => Self(addr.ip().to_string()),
            None => Self::normalize(""),
        }
    }

    /// The identifier as used for map keys.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
