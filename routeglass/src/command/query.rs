//! Diagnostic query kinds and address families.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::QueryError;

/// A diagnostic intent, independent of any vendor syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueryKind {
    /// Look up the best route(s) for an address or prefix.
    RouteLookup,
    /// Routes advertised to a BGP neighbor.
    AdvertisedRoutes,
    /// Detailed BGP neighbor state.
    NeighborDetail,
    /// BGP session summary.
    Summary,
    /// ICMP echo.
    Ping,
    /// Hop-by-hop path trace.
    Traceroute,
}

impl QueryKind {
    /// All query kinds, in display order.
    pub const ALL: [QueryKind; 6] = [
        QueryKind::RouteLookup,
        QueryKind::AdvertisedRoutes,
        QueryKind::NeighborDetail,
        QueryKind::Summary,
        QueryKind::Ping,
        QueryKind::Traceroute,
    ];

    /// Whether the query needs a target address.
    pub fn requires_target(self) -> bool {
        !matches!(self, QueryKind::Summary | QueryKind::NeighborDetail)
    }

    /// Whether the query is a reachability probe (ping/traceroute).
    ///
    /// Probes stream their own output and never page.
    pub fn is_probe(self) -> bool {
        matches!(self, QueryKind::Ping | QueryKind::Traceroute)
    }

    /// Whether the target may carry a prefix length.
    pub(crate) fn accepts_prefix(self) -> bool {
        matches!(self, QueryKind::RouteLookup)
    }

    /// Canonical name.
    pub fn as_str(self) -> &'static str {
        match self {
            QueryKind::RouteLookup => "route-lookup",
            QueryKind::AdvertisedRoutes => "advertised-routes",
            QueryKind::NeighborDetail => "neighbor-detail",
            QueryKind::Summary => "summary",
            QueryKind::Ping => "ping",
            QueryKind::Traceroute => "traceroute",
        }
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryKind {
    type Err = QueryError;

    /// Accepts the canonical names and the names used by the web front end
    /// (`bgp`, `unicast neighbors`, `trace`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bgp" | "route" | "route-lookup" => Ok(QueryKind::RouteLookup),
            "advertised-routes" => Ok(QueryKind::AdvertisedRoutes),
            "unicast neighbors" | "neighbors" | "neighbor-detail" => {
                Ok(QueryKind::NeighborDetail)
            }
            "summary" => Ok(QueryKind::Summary),
            "ping" => Ok(QueryKind::Ping),
            "trace" | "traceroute" => Ok(QueryKind::Traceroute),
            _ => Err(QueryError::UnknownQuery(s.to_string())),
        }
    }
}

/// IP address family of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressFamily {
    #[serde(rename = "IPv4")]
    Ipv4,
    #[serde(rename = "IPv6")]
    Ipv6,
}

impl AddressFamily {
    pub fn as_str(self) -> &'static str {
        match self {
            AddressFamily::Ipv4 => "IPv4",
            AddressFamily::Ipv6 => "IPv6",
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AddressFamily {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ipv4" | "inet" | "4" => Ok(AddressFamily::Ipv4),
            "ipv6" | "inet6" | "6" => Ok(AddressFamily::Ipv6),
            _ => Err(QueryError::UnknownFamily(s.to_string())),
        }
    }
}
