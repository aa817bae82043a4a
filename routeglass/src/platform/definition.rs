//! Dialect definition: the command syntax a family of devices speaks.

use indexmap::IndexMap;

use crate::channel::NoisePattern;
use crate::command::{AddressFamily, QueryKind};

/// Placeholder replaced by the validated target in command templates.
pub const TARGET_PLACEHOLDER: &str = "{target}";

/// All vendor-specific configuration for one CLI dialect.
///
/// Each (query kind, address family) cell holds one fixed template. Cells
/// left empty are unsupported combinations.
#[derive(Debug, Clone)]
pub struct DialectDefinition {
    /// Dialect name as used in device profiles (e.g., "junos", "huawei").
    pub name: String,

    /// Command templates keyed by query and family.
    commands: IndexMap<(QueryKind, AddressFamily), String>,

    /// Appended to non-probe commands so output is not paged.
    pub paging_suffix: Option<String>,

    /// Noise patterns every device of this dialect emits.
    pub noise_patterns: Vec<NoisePattern>,
}

impl DialectDefinition {
    /// Create an empty dialect definition.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            commands: IndexMap::new(),
            paging_suffix: None,
            noise_patterns: vec![],
        }
    }

    /// Add a template used for both address families.
    pub fn with_command(self, query: QueryKind, template: impl Into<String>) -> Self {
        let template = template.into();
        self.with_family_command(query, AddressFamily::Ipv4, template.clone())
            .with_family_command(query, AddressFamily::Ipv6, template)
    }

    /// Add a template for one address family.
    pub fn with_family_command(
        mut self,
        query: QueryKind,
        family: AddressFamily,
        template: impl Into<String>,
    ) -> Self {
        self.commands.insert((query, family), template.into());
        self
    }

    /// Set the paging-disable suffix.
    pub fn with_paging_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.paging_suffix = Some(suffix.into());
        self
    }

    /// Add a default noise pattern.
    pub fn with_noise_pattern(mut self, pattern: NoisePattern) -> Self {
        self.noise_patterns.push(pattern);
        self
    }

    /// Get the template for a combination.
    pub fn template(&self, query: QueryKind, family: AddressFamily) -> Option<&str> {
        self.commands.get(&(query, family)).map(String::as_str)
    }

    /// Iterate over the supported combinations.
    pub fn combinations(&self) -> impl Iterator<Item = (QueryKind, AddressFamily)> + '_ {
        self.commands.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_command_fills_both_families() {
        let dialect = DialectDefinition::new("test").with_command(QueryKind::Summary, "show sum");
        assert_eq!(
            dialect.template(QueryKind::Summary, AddressFamily::Ipv4),
            Some("show sum")
        );
        assert_eq!(
            dialect.template(QueryKind::Summary, AddressFamily::Ipv6),
            Some("show sum")
        );
        assert_eq!(dialect.template(QueryKind::Ping, AddressFamily::Ipv4), None);
    }

    #[test]
    fn test_family_override() {
        let dialect = DialectDefinition::new("test")
            .with_command(QueryKind::Ping, "ping {target}")
            .with_family_command(QueryKind::Ping, AddressFamily::Ipv6, "ping6 {target}");
        assert_eq!(
            dialect.template(QueryKind::Ping, AddressFamily::Ipv6),
            Some("ping6 {target}")
        );
        assert_eq!(dialect.combinations().count(), 2);
    }
}
