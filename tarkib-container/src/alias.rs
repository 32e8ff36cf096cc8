//! Alias registry: alternate names for beans.
//!
//! Each alias points at exactly one name, which may itself be an alias.
//! [`canonical_name`](AliasRegistry::canonical_name) follows the chain to
//! the end and [`aliases_of`](AliasRegistry::aliases_of) walks it
//! backwards; both stop on cycles.

use std::collections::{BTreeSet, HashMap, HashSet};

use parking_lot::RwLock;
use tracing::{debug, trace, warn};

use crate::error::{ConflictError, CycleError, Result, Subject, TarkibError};

/// Maps aliases to the names they stand for.
///
/// # Examples
/// ```
/// use tarkib_container::alias::AliasRegistry;
///
/// let aliases = AliasRegistry::new();
/// aliases.register_alias("dataSource", "db").unwrap();
/// aliases.register_alias("db", "primary").unwrap();
///
/// assert_eq!(aliases.canonical_name("primary").unwrap(), "dataSource");
/// assert!(aliases.aliases_of("dataSource").contains("primary"));
/// ```
#[derive(Debug, Default)]
pub struct AliasRegistry {
    aliases: RwLock<HashMap<String, String>>,
}

impl AliasRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `alias` as another name for `name`.
    ///
    /// Registering a name as its own alias removes any mapping for it.
    /// Re-registering the same pair is a no-op.
    ///
    /// # Errors
    /// [`TarkibError::Conflict`] if `alias` already points at a different name.
    pub fn register_alias(&self, name: &str, alias: &str) -> Result<()> {
        let mut aliases = self.aliases.write();

        if name == alias {
            if aliases.remove(alias).is_some() {
                debug!(alias, "Self-alias cleared existing mapping");
            }
            return Ok(());
        }

        if let Some(registered) = aliases.get(alias) {
            if registered == name {
                return Ok(());
            }
            return Err(TarkibError::Conflict(ConflictError {
                subject: Subject::Alias,
                name: alias.to_string(),
                registered_for: Some(registered.clone()),
                requested_for: Some(name.to_string()),
            }));
        }

        debug!(alias, name, "Registered alias");
        aliases.insert(alias.to_string(), name.to_string());
        Ok(())
    }

    /// Removes `alias`.
    ///
    /// # Errors
    /// [`TarkibError::NotFound`] if `alias` is not registered.
    pub fn remove_alias(&self, alias: &str) -> Result<()> {
        match self.aliases.write().remove(alias) {
            Some(name) => {
                debug!(alias, name = %name, "Removed alias");
                Ok(())
            }
            None => Err(TarkibError::not_found(Subject::Alias, alias)),
        }
    }

    pub fn is_alias(&self, alias: &str) -> bool {
        self.aliases.read().contains_key(alias)
    }

    /// Every alias that resolves to `name`, directly or through other aliases.
    pub fn aliases_of(&self, name: &str) -> BTreeSet<String> {
        let aliases = self.aliases.read();

        let mut found = BTreeSet::new();
        let mut pending = vec![name];
        while let Some(target) = pending.pop() {
            for (alias, registered) in aliases.iter() {
                if registered == target && alias != name && found.insert(alias.clone()) {
                    pending.push(alias.as_str());
                }
            }
        }
        found
    }

    /// Follows the alias chain starting at `alias` to its canonical name.
    ///
    /// A name that is not an alias is returned unchanged.
    ///
    /// # Errors
    /// [`TarkibError::CyclicAlias`] if the chain loops.
    pub fn canonical_name(&self, alias: &str) -> Result<String> {
        let aliases = self.aliases.read();

        let mut current = alias;
        let mut chain = vec![alias];
        let mut seen = HashSet::from([alias]);
        while let Some(next) = aliases.get(current) {
            chain.push(next.as_str());
            if !seen.insert(next.as_str()) {
                let chain: Vec<String> = chain.into_iter().map(str::to_string).collect();
                warn!(chain = ?chain, "Cyclic alias detected");
                return Err(TarkibError::CyclicAlias(CycleError { chain }));
            }
            current = next.as_str();
        }

        if current != alias {
            trace!(alias, canonical = current, "Resolved alias");
        }
        Ok(current.to_string())
    }

    pub fn len(&self) -> usize {
        self.aliases.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_twice_is_idempotent() {
        let aliases = AliasRegistry::new();
        aliases.register_alias("bean1", "b").unwrap();
        aliases.register_alias("bean1", "b").unwrap();
        assert_eq!(aliases.len(), 1);
    }

    #[test]
    fn conflicting_alias_keeps_first() {
        let aliases = AliasRegistry::new();
        aliases.register_alias("bean1", "b").unwrap();

        match aliases.register_alias("bean2", "b").unwrap_err() {
            TarkibError::Conflict(e) => {
                assert_eq!(e.registered_for.as_deref(), Some("bean1"));
                assert_eq!(e.requested_for.as_deref(), Some("bean2"));
            }
            other => panic!("Expected Conflict, got: {other:?}"),
        }
        assert_eq!(aliases.canonical_name("b").unwrap(), "bean1");
    }

    #[test]
    fn self_alias_clears_mapping() {
        let aliases = AliasRegistry::new();
        aliases.register_alias("bean1", "b").unwrap();
        aliases.register_alias("b", "b").unwrap();
        assert!(!aliases.is_alias("b"));

        // and is a plain no-op otherwise
        aliases.register_alias("c", "c").unwrap();
        assert!(aliases.is_empty());
    }

    #[test]
    fn remove_alias() {
        let aliases = AliasRegistry::new();
        aliases.register_alias("bean1", "b").unwrap();
        assert!(aliases.is_alias("b"));

        aliases.remove_alias("b").unwrap();
        assert!(!aliases.is_alias("b"));
        assert!(matches!(aliases.remove_alias("b"), Err(TarkibError::NotFound(_))));
    }

    #[test]
    fn canonical_name_follows_full_chain() {
        let aliases = AliasRegistry::new();
        aliases.register_alias("bean", "a1").unwrap();
        aliases.register_alias("a1", "a2").unwrap();
        aliases.register_alias("a2", "a3").unwrap();

        assert_eq!(aliases.canonical_name("a3").unwrap(), "bean");
        assert_eq!(aliases.canonical_name("bean").unwrap(), "bean");
        assert_eq!(aliases.canonical_name("unknown").unwrap(), "unknown");
    }

    #[test]
    fn cyclic_alias_fails() {
        let aliases = AliasRegistry::new();
        aliases.register_alias("x", "y").unwrap();
        aliases.register_alias("y", "x").unwrap();

        match aliases.canonical_name("x").unwrap_err() {
            TarkibError::CyclicAlias(e) => {
                assert_eq!(e.chain, vec!["x", "y", "x"]);
            }
            other => panic!("Expected CyclicAlias, got: {other:?}"),
        }
    }

    #[test]
    fn aliases_of_is_transitive() {
        let aliases = AliasRegistry::new();
        aliases.register_alias("bean", "a").unwrap();
        aliases.register_alias("a", "b").unwrap();
        aliases.register_alias("bean", "c").unwrap();
        aliases.register_alias("other", "d").unwrap();

        let found: Vec<String> = aliases.aliases_of("bean").into_iter().collect();
        assert_eq!(found, vec!["a", "b", "c"]);
        assert!(aliases.aliases_of("nothing").is_empty());
    }

    #[test]
    fn aliases_of_terminates_on_cycles() {
        let aliases = AliasRegistry::new();
        aliases.register_alias("x", "y").unwrap();
        aliases.register_alias("y", "x").unwrap();

        let found = aliases.aliases_of("x");
        assert_eq!(found.len(), 1);
        assert!(found.contains("y"));
    }
}
