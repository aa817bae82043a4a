//! Target address validation.
//!
//! Addresses are interpolated into a device command line, so only literal
//! IPv4/IPv6 addresses (optionally with a prefix length) are accepted.

use std::fmt;
use std::net::IpAddr;

use super::query::{AddressFamily, QueryKind};
use crate::error::QueryError;

/// A validated query target: an IP address with an optional prefix length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    addr: IpAddr,
    prefix: Option<u8>,
}

impl Target {
    /// Parse `address` for `query` in `family`.
    ///
    /// A prefix length is only accepted for route lookups, and the address
    /// must belong to the requested family.
    pub fn parse(address: &str, query: QueryKind, family: AddressFamily) -> Result<Self, QueryError> {
        let invalid = |reason: &str| QueryError::InvalidAddress {
            address: address.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = address.trim();
        if trimmed.is_empty() {
            return Err(QueryError::AddressRequired {
                query: query.to_string(),
            });
        }

        let (addr_part, prefix_part) = match trimmed.split_once('/') {
            Some((addr, prefix)) => (addr, Some(prefix)),
            None => (trimmed, None),
        };

        let addr: IpAddr = addr_part
            .parse()
            .map_err(|_| invalid("not an IPv4 or IPv6 literal"))?;

        let expected = match addr {
            IpAddr::V4(_) => AddressFamily::Ipv4,
            IpAddr::V6(_) => AddressFamily::Ipv6,
        };
        if expected != family {
            return Err(invalid(&format!("address is not {family}")));
        }

        let prefix = match prefix_part {
            None => None,
            Some(_) if !query.accepts_prefix() => {
                return Err(invalid("prefix length not allowed for this query"));
            }
            Some(p) => {
                let max = if addr.is_ipv4() { 32 } else { 128 };
                let len: u8 = p
                    .parse()
                    .ok()
                    .filter(|len| *len <= max)
                    .ok_or_else(|| invalid("prefix length out of range"))?;
                Some(len)
            }
        };

        Ok(Self { addr, prefix })
    }

    /// The address part.
    pub fn addr(&self) -> IpAddr {
        self.addr
    }

    /// The prefix length, if one was given.
    pub fn prefix(&self) -> Option<u8> {
        self.prefix
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.prefix {
            Some(len) => write!(f, "{}/{}", self.addr, len),
            None => write!(f, "{}", self.addr),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literals() {
        let t = Target::parse("192.0.2.1", QueryKind::Ping, AddressFamily::Ipv4).unwrap();
        assert_eq!(t.to_string(), "192.0.2.1");

        let t = Target::parse(" 2001:db8::1 ", QueryKind::Traceroute, AddressFamily::Ipv6).unwrap();
        assert_eq!(t.to_string(), "2001:db8::1");
    }

    #[test]
    fn test_prefix_only_for_route_lookup() {
        let t = Target::parse("198.51.100.0/24", QueryKind::RouteLookup, AddressFamily::Ipv4)
            .unwrap();
        assert_eq!(t.prefix(), Some(24));

        assert!(Target::parse("198.51.100.0/24", QueryKind::Ping, AddressFamily::Ipv4).is_err());
        assert!(
            Target::parse("198.51.100.0/33", QueryKind::RouteLookup, AddressFamily::Ipv4).is_err()
        );
        assert!(
            Target::parse("2001:db8::/48", QueryKind::RouteLookup, AddressFamily::Ipv6).is_ok()
        );
    }

    #[test]
    fn test_rejects_injection() {
        for input in ["192.0.2.1; reload", "192.0.2.1 | display", "$(id)", "example.net"] {
            let err = Target::parse(input, QueryKind::Ping, AddressFamily::Ipv4).unwrap_err();
            assert!(matches!(err, QueryError::InvalidAddress { .. }), "{input}");
        }
    }

    #[test]
    fn test_family_mismatch() {
        let err = Target::parse("192.0.2.1", QueryKind::Ping, AddressFamily::Ipv6).unwrap_err();
        assert!(matches!(err, QueryError::InvalidAddress { .. }));
    }

    #[test]
    fn test_empty_address() {
        let err = Target::parse("  ", QueryKind::Ping, AddressFamily::Ipv4).unwrap_err();
        assert_eq!(
            err,
            QueryError::AddressRequired {
                query: "ping".into()
            }
        );
    }
}
