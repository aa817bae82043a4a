//! Registry of dialect definitions.

use std::collections::HashMap;

use super::definition::DialectDefinition;
use super::vendors;

/// Dialect definitions by name.
///
/// Owned by whoever builds the translator; there is no process-wide
/// instance.
#[derive(Debug, Default, Clone)]
pub struct DialectRegistry {
    dialects: HashMap<String, DialectDefinition>,
}

impl DialectRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            dialects: HashMap::new(),
        }
    }

    /// Create a registry holding the built-in dialects.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(vendors::juniper::dialect());
        registry.register(vendors::huawei::dialect());
        registry
    }

    /// Register a dialect, replacing any previous one with the same name.
    pub fn register(&mut self, dialect: DialectDefinition) -> Option<DialectDefinition> {
        self.dialects.insert(dialect.name.clone(), dialect)
    }

    /// Get a dialect by name.
    pub fn get(&self, name: &str) -> Option<&DialectDefinition> {
        self.dialects.get(name)
    }

    /// Check if a dialect is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.dialects.contains_key(name)
    }

    /// List all registered dialect names.
    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.dialects.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_dialects() {
        let registry = DialectRegistry::with_builtin();
        assert!(registry.contains("junos"));
        assert!(registry.contains("huawei"));
        assert!(!registry.contains("ios"));
        assert_eq!(registry.names().count(), 2);
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = DialectRegistry::with_builtin();
        let previous = registry.register(DialectDefinition::new("junos"));
        assert!(previous.is_some());
        assert!(
            registry
                .get("junos")
                .unwrap()
                .combinations()
                .next()
                .is_none()
        );
    }
}
