//! Connection identifiers.
//!
//! Provides an endpoint type and a canonical, direction-independent key used to
//! look up a connection regardless of which side sent the current segment.

use std::fmt;
use std::net::IpAddr;

use serde::Serialize;

/// One side of a TCP connection.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize)]
pub struct Endpoint {
    pub ip: IpAddr,
    pub port: u16,
}

impl Endpoint {
    pub fn new(ip: IpAddr, port: u16) -> Self {
        Endpoint { ip, port }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

/// A canonical, direction-independent connection identifier.
///
/// Both halves of one flow (the segments sent by either endpoint) share the same
/// `ConnKey`, formed by sorting the two endpoint strings lexicographically and
/// joining them with `-`.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct ConnKey(String);

impl ConnKey {
    pub fn new(a: Endpoint, b: Endpoint) -> Self {
        let (a, b) = (a.to_string(), b.to_string());
        if a <= b {
            ConnKey(format!("{}-{}", a, b))
        } else {
            ConnKey(format!("{}-{}", b, a))
        }
    }
}

impl fmt::Display for ConnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn ep(ip: [u8; 4], port: u16) -> Endpoint {
        Endpoint::new(IpAddr::V4(Ipv4Addr::from(ip)), port)
    }

    #[test]
    fn canonical_key_is_direction_independent() {
        let client = ep([10, 0, 0, 1], 5000);
        let server = ep([10, 0, 0, 2], 80);
        assert_eq!(ConnKey::new(client, server), ConnKey::new(server, client));
    }

    #[test]
    fn display_renders_ip_colon_port() {
        assert_eq!(ep([127, 0, 0, 1], 443).to_string(), "127.0.0.1:443");
    }
}
