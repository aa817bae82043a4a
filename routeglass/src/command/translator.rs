//! Query → vendor command translation.

use log::trace;

use super::query::{AddressFamily, QueryKind};
use super::target::Target;
use super::{Command, Query};
use crate::error::QueryError;
use crate::platform::{DialectDefinition, DialectRegistry, TARGET_PLACEHOLDER};

/// Maps (query kind, address family, dialect, target) to a command string.
///
/// Pure: no I/O and no state beyond the dialect table it was built with.
///
/// # Example
///
/// ```rust
/// use routeglass::command::{AddressFamily, CommandTranslator, QueryKind};
///
/// let translator = CommandTranslator::with_builtin();
/// let cmd = translator
///     .translate(QueryKind::Ping, AddressFamily::Ipv6, Some("2001:db8::1"), "huawei")
///     .unwrap();
/// assert_eq!(cmd.as_str(), "ping ipv6 2001:db8::1");
/// ```
#[derive(Debug, Clone)]
pub struct CommandTranslator {
    registry: DialectRegistry,
}

impl CommandTranslator {
    pub fn new(registry: DialectRegistry) -> Self {
        Self { registry }
    }

    /// Translator over the built-in dialects.
    pub fn with_builtin() -> Self {
        Self::new(DialectRegistry::with_builtin())
    }

    pub fn registry(&self) -> &DialectRegistry {
        &self.registry
    }

    /// Look up a dialect by name.
    pub fn dialect(&self, name: &str) -> Option<&DialectDefinition> {
        self.registry.get(name)
    }

    /// Translate a [`Query`] for a dialect.
    pub fn translate_query(&self, query: &Query, dialect: &str) -> Result<Command, QueryError> {
        self.translate(query.kind, query.family, query.address(), dialect)
    }

    /// Translate one combination.
    ///
    /// `address` is ignored for queries that take no target. For the rest it
    /// must be a literal of the requested family (see [`Target::parse`]).
    /// Unknown dialects and empty template cells are
    /// [`QueryError::UnsupportedCombination`].
    pub fn translate(
        &self,
        query: QueryKind,
        family: AddressFamily,
        address: Option<&str>,
        dialect: &str,
    ) -> Result<Command, QueryError> {
        let unsupported = || QueryError::UnsupportedCombination {
            dialect: dialect.to_string(),
            query: query.to_string(),
            family: family.to_string(),
        };

        let definition = self.registry.get(dialect).ok_or_else(unsupported)?;
        let template = definition.template(query, family).ok_or_else(unsupported)?;

        let text = if query.requires_target() {
            let address = address.ok_or_else(|| QueryError::AddressRequired {
                query: query.to_string(),
            })?;
            let target = Target::parse(address, query, family)?;
            template.replace(TARGET_PLACEHOLDER, &target.to_string())
        } else {
            template.to_string()
        };

        trace!("translated {query}/{family} for {dialect}: {text:?}");

        let paging_suffix = if query.is_probe() {
            None
        } else {
            definition.paging_suffix.clone()
        };
        Command::translated(text, query.is_probe(), paging_suffix)
    }

    /// Translate from the string names used on the wire.
    pub fn translate_names(
        &self,
        query: &str,
        family: &str,
        address: Option<&str>,
        dialect: &str,
    ) -> Result<Command, QueryError> {
        let query: QueryKind = query.parse()?;
        let family: AddressFamily = family.parse()?;
        self.translate(query, family, address, dialect)
    }
}

impl Default for CommandTranslator {
    fn default() -> Self {
        Self::with_builtin()
    }
}
