//! Lifecycle hooks run while a bean is being created.
//!
//! Order for each new instance:
//! 1. fields are populated
//! 2. every [`BeanPostProcessor::before_initialization`]
//! 3. [`InitializingBean::after_properties_set`], then the named init method
//! 4. every [`BeanPostProcessor::after_initialization`]
//!
//! Destroy methods run from
//! [`BeanFactory::destroy_singletons`](crate::factory::BeanFactory::destroy_singletons)
//! in reverse creation order.

use std::any::Any;

use crate::error::BoxError;

/// A bean that wants a callback once its fields are populated.
///
/// Register with
/// [`BeanDefinitionBuilder::initializing`](crate::definition::BeanDefinitionBuilder::initializing)
/// or `#[bean(initializing)]`.
pub trait InitializingBean {
    fn after_properties_set(&mut self) -> Result<(), BoxError>;
}

/// Observes (and may modify) every bean the factory creates.
///
/// Processors run in registration order. A failing processor aborts the
/// creation with [`TarkibError::LifecycleFailed`](crate::error::TarkibError::LifecycleFailed).
pub trait BeanPostProcessor: Send + Sync {
    fn before_initialization(
        &self,
        _bean: &mut (dyn Any + Send + Sync),
        _name: &str,
    ) -> Result<(), BoxError> {
        Ok(())
    }

    fn after_initialization(
        &self,
        _bean: &mut (dyn Any + Send + Sync),
        _name: &str,
    ) -> Result<(), BoxError> {
        Ok(())
    }
}
