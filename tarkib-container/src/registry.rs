//! Bean definition registry.
//!
//! Maps bean names to their [`BeanDefinition`]s and keeps an index from
//! every capability (including each bean's own type) to the names that
//! provide it, so lookups by type never scan the whole map.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;
use tarkib_support::rendering::suggest_similar;
use tracing::{debug, trace};

use crate::definition::BeanDefinition;
use crate::error::{ConflictError, NotFoundError, Result, Subject, TarkibError};
use crate::key::TypeKey;

#[derive(Debug, Default)]
struct Definitions {
    by_name: HashMap<String, Arc<BeanDefinition>>,
    by_capability: HashMap<TypeKey, BTreeSet<String>>,
}

/// Stores bean definitions by name.
///
/// Names are unique: registering a name twice is a conflict. Aliases
/// live in [`AliasRegistry`](crate::alias::AliasRegistry); this registry
/// only knows canonical names.
#[derive(Debug, Default)]
pub struct BeanDefinitionRegistry {
    inner: RwLock<Definitions>,
}

impl BeanDefinitionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `definition` under `name`.
    ///
    /// # Errors
    /// [`TarkibError::Conflict`] if `name` is already registered.
    pub fn register_bean_definition(
        &self,
        name: &str,
        definition: impl Into<Arc<BeanDefinition>>,
    ) -> Result<()> {
        let definition = definition.into();
        let mut inner = self.inner.write();

        if inner.by_name.contains_key(name) {
            return Err(TarkibError::Conflict(ConflictError {
                subject: Subject::BeanDefinition,
                name: name.to_string(),
                registered_for: None,
                requested_for: None,
            }));
        }

        for capability in definition.capabilities() {
            inner
                .by_capability
                .entry(capability)
                .or_default()
                .insert(name.to_string());
        }

        debug!(
            name,
            bean_type = %definition.type_key().short_name(),
            scope = %definition.scope(),
            "Registered bean definition"
        );
        inner.by_name.insert(name.to_string(), definition);
        Ok(())
    }

    /// Removes and returns the definition registered under `name`.
    ///
    /// # Errors
    /// [`TarkibError::NotFound`] if `name` is not registered.
    pub fn remove_bean_definition(&self, name: &str) -> Result<Arc<BeanDefinition>> {
        let mut inner = self.inner.write();

        let definition = inner
            .by_name
            .remove(name)
            .ok_or_else(|| TarkibError::not_found(Subject::BeanDefinition, name))?;

        for capability in definition.capabilities() {
            if let Some(names) = inner.by_capability.get_mut(&capability) {
                names.remove(name);
                if names.is_empty() {
                    inner.by_capability.remove(&capability);
                }
            }
        }

        debug!(name, "Removed bean definition");
        Ok(definition)
    }

    /// Looks up the definition registered under `name`.
    ///
    /// # Errors
    /// [`TarkibError::NotFound`], with suggestions, if `name` is not
    /// registered.
    pub fn get_bean_definition(&self, name: &str) -> Result<Arc<BeanDefinition>> {
        let inner = self.inner.read();

        if let Some(definition) = inner.by_name.get(name) {
            trace!(name, "Found bean definition");
            return Ok(Arc::clone(definition));
        }

        let mut known: Vec<&str> = inner.by_name.keys().map(String::as_str).collect();
        known.sort_unstable();
        Err(TarkibError::NotFound(NotFoundError {
            suggestions: suggest_similar(name, &known, 3),
            ..NotFoundError::new(Subject::BeanDefinition, name)
        }))
    }

    /// Like [`get_bean_definition`](Self::get_bean_definition), without
    /// building an error for a miss.
    pub fn find(&self, name: &str) -> Option<Arc<BeanDefinition>> {
        self.inner.read().by_name.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.read().by_name.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.read().by_name.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Names of the definitions whose type is, or provides, `capability`.
    /// Sorted.
    pub fn names_providing(&self, capability: &TypeKey) -> Vec<String> {
        self.inner
            .read()
            .by_capability
            .get(capability)
            .map(|names| names.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().by_name.is_empty()
    }
}
