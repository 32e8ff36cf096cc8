//! Provider trait: a module of related registrations.
//!
//! Providers group the definitions, aliases and default properties of
//! one area of an application so they can be registered together.
//!
//! # Examples
//! ```rust
//! use tarkib_container::prelude::*;
//!
//! #[derive(Default)]
//! struct Mailer {
//!     host: String,
//! }
//!
//! struct MailProvider;
//!
//! impl Provider for MailProvider {
//!     fn register(&self, registry: &mut dyn ProviderRegistry) -> Result<()> {
//!         registry.set_property("mail.host", "localhost")?;
//!         registry.register_bean_definition(
//!             "mailer",
//!             BeanDefinition::builder::<Mailer>()
//!                 .property("host", "mail.host", |m: &mut Mailer| &mut m.host)
//!                 .build()?,
//!         )?;
//!         registry.register_alias("mailer", "smtp")
//!     }
//! }
//!
//! let factory = BeanFactory::builder().provider(&MailProvider).build().unwrap();
//! assert_eq!(factory.get_bean_as::<Mailer>("smtp").unwrap().host, "localhost");
//! ```

use crate::definition::BeanDefinition;
use crate::error::Result;

/// A module that registers related beans into a factory.
pub trait Provider: Send + Sync {
    /// Registers everything this provider contributes.
    ///
    /// Called once, when the provider is added.
    fn register(&self, registry: &mut dyn ProviderRegistry) -> Result<()>;

    /// Human-readable name for logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// The registration surface a [`Provider`] sees.
///
/// Kept separate from the factory so providers can be tested alone.
pub trait ProviderRegistry {
    fn register_bean_definition(&mut self, name: &str, definition: BeanDefinition) -> Result<()>;

    fn register_alias(&mut self, name: &str, alias: &str) -> Result<()>;

    fn set_property(&mut self, key: &str, value: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConflictError, Subject, TarkibError};

    #[derive(Default)]
    struct MockRegistry {
        definitions: Vec<String>,
        aliases: Vec<(String, String)>,
        properties: Vec<(String, String)>,
    }

    impl ProviderRegistry for MockRegistry {
        fn register_bean_definition(&mut self, name: &str, _definition: BeanDefinition) -> Result<()> {
            if self.definitions.iter().any(|n| n == name) {
                return Err(TarkibError::Conflict(ConflictError {
                    subject: Subject::BeanDefinition,
                    name: name.to_string(),
                    registered_for: None,
                    requested_for: None,
                }));
            }
            self.definitions.push(name.to_string());
            Ok(())
        }

        fn register_alias(&mut self, name: &str, alias: &str) -> Result<()> {
            self.aliases.push((name.to_string(), alias.to_string()));
            Ok(())
        }

        fn set_property(&mut self, key: &str, value: &str) -> Result<()> {
            self.properties.push((key.to_string(), value.to_string()));
            Ok(())
        }
    }

    #[derive(Default)]
    struct Cache;

    struct CacheProvider;

    impl Provider for CacheProvider {
        fn register(&self, registry: &mut dyn ProviderRegistry) -> Result<()> {
            registry.set_property("cache.size", "128")?;
            registry.register_bean_definition("cache", BeanDefinition::builder::<Cache>().build()?)?;
            registry.register_alias("cache", "lru")
        }
    }

    #[test]
    fn provider_registers_everything() {
        let mut registry = MockRegistry::default();
        CacheProvider.register(&mut registry).unwrap();

        assert_eq!(registry.definitions, vec!["cache"]);
        assert_eq!(registry.aliases, vec![("cache".to_string(), "lru".to_string())]);
        assert_eq!(registry.properties.len(), 1);
    }

    #[test]
    fn provider_stops_at_first_error() {
        let mut registry = MockRegistry::default();
        CacheProvider.register(&mut registry).unwrap();

        assert!(CacheProvider.register(&mut registry).is_err());
        assert_eq!(registry.aliases.len(), 1);
    }

    #[test]
    fn provider_has_name() {
        assert!(CacheProvider.name().contains("CacheProvider"));
    }
}
