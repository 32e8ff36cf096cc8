//! Bean lifecycle scopes.
//!
//! Scopes determine how long a resolved bean lives:
//! - [`Scope::Singleton`]: one instance per definition, cached by the factory
//! - [`Scope::Prototype`]: a new instance on every request
use std::fmt;

/// Defines the lifetime of a bean produced by the factory.
///
/// # Examples
/// ```
/// use tarkib_container::scope::Scope;
///
/// assert_eq!(Scope::default(), Scope::Singleton);
/// assert!(Scope::Singleton.is_cached());
/// assert_eq!(Scope::Prototype.to_string(), "prototype");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Scope {
    /// One instance shared by every request for the definition.
    ///
    /// Built on first request, lives until
    /// [`BeanFactory::destroy_singletons`](crate::factory::BeanFactory::destroy_singletons)
    /// or until the factory is dropped.
    #[default]
    Singleton,

    /// A fresh instance, with a fresh dependency subtree, per request.
    Prototype,
}

impl Scope {
    /// Returns `true` if instances of this scope are cached.
    #[inline]
    pub fn is_cached(&self) -> bool {
        matches!(self, Scope::Singleton)
    }

    /// The identifier used in `#[bean(scope = "...")]`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Singleton => "singleton",
            Scope::Prototype => "prototype",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
