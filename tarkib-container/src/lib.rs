//! Core of the Tarkib bean factory.
//!
//! - [`property`]: flattened configuration entries with typed coercion
//! - [`alias`]: alternate names for beans
//! - [`definition`] and [`registry`]: how each bean is built, by name
//! - [`factory`]: resolution, wiring, singleton caching and lifecycle

pub mod alias;
pub mod definition;
pub mod directive;
pub mod error;
pub mod factory;
mod graph;
pub mod inject;
pub mod key;
pub mod lifecycle;
pub mod property;
pub mod provider;
pub mod registry;
pub mod scope;

pub use factory::prelude;
pub use error::{Result, TarkibError};
pub use factory::{BeanFactory, BeanFactoryBuilder};
pub use key::TypeKey;
pub use scope::Scope;
