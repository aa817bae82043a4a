//! Huawei VRP dialect.
//!
//! VRP places the `ipv6` keyword right after the verb's object
//! (`display bgp ipv6 peer`, `ping ipv6 <addr>`).
//!
//! # Prompt Examples
//!
//! ```text
//! <netengine01>             # user view
//! <netengine01>display bgp peer   # echoed command
//! ```
//!
//! After login VRP prints VTY-usage and login-time notices; those are
//! default noise for every device of this dialect.

use crate::channel::NoisePattern;
use crate::command::{AddressFamily, QueryKind};
use crate::platform::DialectDefinition;

/// Create the Huawei VRP dialect definition.
pub fn dialect() -> DialectDefinition {
    use AddressFamily::{Ipv4, Ipv6};

    DialectDefinition::new("huawei")
        .with_family_command(QueryKind::RouteLookup, Ipv4, "display bgp routing-table {target}")
        .with_family_command(
            QueryKind::RouteLookup,
            Ipv6,
            "display bgp ipv6 routing-table {target}",
        )
        .with_family_command(
            QueryKind::AdvertisedRoutes,
            Ipv4,
            "display bgp routing-table peer {target} advertised-routes",
        )
        .with_family_command(
            QueryKind::AdvertisedRoutes,
            Ipv6,
            "display bgp ipv6 routing-table peer {target} advertised-routes",
        )
        .with_family_command(QueryKind::NeighborDetail, Ipv4, "display bgp peer verbose")
        .with_family_command(QueryKind::NeighborDetail, Ipv6, "display bgp ipv6 peer verbose")
        .with_family_command(QueryKind::Summary, Ipv4, "display bgp peer")
        .with_family_command(QueryKind::Summary, Ipv6, "display bgp ipv6 peer")
        .with_family_command(QueryKind::Ping, Ipv4, "ping {target}")
        .with_family_command(QueryKind::Ping, Ipv6, "ping ipv6 {target}")
        .with_family_command(QueryKind::Traceroute, Ipv4, "tracert {target}")
        .with_family_command(QueryKind::Traceroute, Ipv6, "tracert ipv6 {target}")
        .with_paging_suffix(" | no-more")
        .with_noise_pattern(NoisePattern::regex(r"^<[\w.\-:]+>"))
        .with_noise_pattern(NoisePattern::contains("Info: The max number of VTY users"))
        .with_noise_pattern(NoisePattern::contains(
            "and the number of current VTY users on line is",
        ))
        .with_noise_pattern(NoisePattern::contains("The current login time is"))
        .with_noise_pattern(NoisePattern::contains("The last login time is"))
        .with_noise_pattern(NoisePattern::contains("through SSH"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::OutputFilter;

    #[test]
    fn test_huawei_dialect() {
        let dialect = dialect();
        assert_eq!(dialect.name, "huawei");
        assert_eq!(dialect.combinations().count(), 12);
    }

    #[test]
    fn test_ipv6_marker_position() {
        let dialect = dialect();
        assert_eq!(
            dialect.template(QueryKind::Summary, AddressFamily::Ipv6),
            Some("display bgp ipv6 peer")
        );
        assert_eq!(
            dialect.template(QueryKind::Ping, AddressFamily::Ipv6),
            Some("ping ipv6 {target}")
        );
    }

    #[test]
    fn test_login_notices_are_noise() {
        let filter = OutputFilter::new(&dialect().noise_patterns).unwrap();
        assert!(filter.is_noise("<netengine01>"));
        assert!(filter.is_noise("<netengine01>display bgp peer"));
        assert!(filter.is_noise(
            "Info: The max number of VTY users is 21, and the number of current VTY users on line is 1."
        ));
        assert!(filter.is_noise("The current login time is 2024-05-01 10:00:00."));
        assert!(filter.is_noise(
            "The last login time is 2024-04-30 09:12:11 from 2001:db8::19 through SSH."
        ));
        assert!(!filter.is_noise("BGP local router ID : 192.0.2.254"));
        assert!(!filter.is_noise("192.0.2.1   4   65001   1200   1180   0 2d03h Established 12"));
    }
}
