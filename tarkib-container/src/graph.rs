//! Dependency graph validation.
//!
//! Walks the bean graph (autowired fields and factory beans) depth-first:
//! - detects cycles before any of the beans involved is created
//! - optionally checks that every referenced bean is registered
//!
//! Used by [`BeanFactory::validate`](crate::factory::BeanFactory::validate)
//! for the whole graph and before each top-level resolution for the part
//! reachable from the requested bean.

use std::collections::HashSet;

use tracing::{debug, instrument, warn};

use crate::error::{CycleError, NotFoundError, Result, Subject, TarkibError};

/// Looks up the (canonical) dependencies of a bean.
///
/// `Ok(None)` means the bean is not registered.
pub(crate) type DependencyLookup<'a> = dyn Fn(&str) -> Result<Option<Vec<String>>> + 'a;

/// Depth-first validator over bean names.
pub(crate) struct GraphValidator<'a> {
    lookup: &'a DependencyLookup<'a>,
    /// Report unregistered dependencies instead of skipping them
    require_registered: bool,
    /// Currently being visited (for cycle detection)
    visiting: HashSet<String>,
    /// Already validated (cache)
    validated: HashSet<String>,
    /// Current DFS path (for error reporting)
    path: Vec<String>,
}

impl<'a> GraphValidator<'a> {
    pub fn new(lookup: &'a DependencyLookup<'a>) -> Self {
        Self {
            lookup,
            require_registered: false,
            visiting: HashSet::new(),
            validated: HashSet::new(),
            path: Vec::new(),
        }
    }

    /// Also fail on references to unregistered beans.
    pub fn require_registered(mut self) -> Self {
        self.require_registered = true;
        self
    }

    /// Validates every bean in `roots` and everything they reach.
    ///
    /// # Errors
    /// - [`TarkibError::CyclicDependency`] for a cycle
    /// - [`TarkibError::NotFound`] for a missing bean, when required
    #[instrument(skip(self, roots), name = "graph_validation")]
    pub fn validate<S: AsRef<str>>(&mut self, roots: &[S]) -> Result<()> {
        debug!(root_count = roots.len(), "Starting dependency graph validation");

        for root in roots {
            self.visit(root.as_ref())?;
        }

        debug!(validated = self.validated.len(), "Dependency graph validation passed");
        Ok(())
    }

    fn visit(&mut self, name: &str) -> Result<()> {
        if self.validated.contains(name) {
            return Ok(());
        }

        if self.visiting.contains(name) {
            let start = self.path.iter().position(|n| n == name).unwrap_or(0);
            let mut chain = self.path[start..].to_vec();
            chain.push(name.to_string());

            warn!(chain = ?chain, "Cyclic bean dependency detected");
            return Err(TarkibError::CyclicDependency(CycleError { chain }));
        }

        let Some(dependencies) = (self.lookup)(name)? else {
            if self.require_registered {
                let mut err = NotFoundError::new(Subject::BeanDefinition, name);
                err.required_by = self.path.last().cloned();
                return Err(TarkibError::NotFound(err));
            }
            return Ok(());
        };

        self.visiting.insert(name.to_string());
        self.path.push(name.to_string());

        for dependency in &dependencies {
            self.visit(dependency)?;
        }

        self.path.pop();
        self.visiting.remove(name);
        self.validated.insert(name.to_string());
        Ok(())
    }
}
