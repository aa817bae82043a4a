//! Juniper JUNOS dialect.
//!
//! Operational-mode commands only. JUNOS uses the same verbs for both
//! address families; the family is implied by the target, except for
//! traceroute where AS-number lookup is only requested for IPv4.
//!
//! # Prompt Examples
//!
//! ```text
//! user@router>              # operational mode
//! {master:0}user@router>    # with routing-engine indicator
//! ```

use crate::channel::NoisePattern;
use crate::command::{AddressFamily, QueryKind};
use crate::platform::DialectDefinition;

/// Create the Juniper JUNOS dialect definition.
pub fn dialect() -> DialectDefinition {
    DialectDefinition::new("junos")
        .with_command(QueryKind::RouteLookup, "show route {target}")
        .with_command(
            QueryKind::AdvertisedRoutes,
            "show route advertising-protocol bgp {target}",
        )
        .with_command(QueryKind::NeighborDetail, "show bgp neighbor")
        .with_command(QueryKind::Summary, "show bgp summary")
        .with_command(QueryKind::Ping, "ping count 5 {target}")
        .with_family_command(
            QueryKind::Traceroute,
            AddressFamily::Ipv4,
            "traceroute {target} as-number-lookup",
        )
        .with_family_command(
            QueryKind::Traceroute,
            AddressFamily::Ipv6,
            "traceroute {target}",
        )
        .with_paging_suffix(" | no-more")
        // Echoed operational prompt, e.g. "{master:0}user@router>"
        .with_noise_pattern(NoisePattern::regex(r"^(?:\{[^}]+\})?[\w.\-]+@[\w.\-]+>$"))
}
