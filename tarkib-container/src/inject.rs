//! Field injection.
//!
//! [`Inject`] is implemented by every type a bound field may have. The
//! factory hands each field a [`FieldSource`]: a property key for
//! `value:` bindings, a resolved [`WiredBean`] for `autowire:` ones.

use std::any::{Any, type_name};
use std::sync::Arc;

use crate::definition::BeanDefinition;
use crate::error::{Result, TarkibError};
use crate::property::PropertyStore;

/// A shared, type-erased bean instance.
pub type BeanInstance = Arc<dyn Any + Send + Sync>;

/// A bean resolved for injection, together with its definition.
#[derive(Clone)]
pub struct WiredBean {
    name: String,
    instance: BeanInstance,
    definition: Arc<BeanDefinition>,
}

impl WiredBean {
    pub(crate) fn new(
        name: impl Into<String>,
        instance: BeanInstance,
        definition: Arc<BeanDefinition>,
    ) -> Self {
        Self {
            name: name.into(),
            instance,
            definition,
        }
    }

    /// The name the bean was requested under.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instance(&self) -> &BeanInstance {
        &self.instance
    }

    pub fn definition(&self) -> &BeanDefinition {
        &self.definition
    }

    /// Views the bean as `C`: its own type or a capability it provides.
    ///
    /// # Errors
    /// [`TarkibError::TypeMismatch`] if the bean does not provide `C`.
    pub fn cast<C: ?Sized + 'static>(&self) -> Result<Arc<C>> {
        self.definition
            .cast::<C>(&self.name, Arc::clone(&self.instance))
    }
}

impl std::fmt::Debug for WiredBean {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WiredBean")
            .field("name", &self.name)
            .field("type", &self.definition.type_key())
            .finish()
    }
}

/// Where a bound field gets its value.
#[derive(Debug)]
pub enum FieldSource<'a> {
    Property {
        store: &'a PropertyStore,
        key: &'a str,
    },
    Bean(&'a WiredBean),
}

/// A type that can be injected into a bound field.
///
/// Scalars (integers, floats, `bool`, `String`) and `Option`s of them
/// accept property bindings; `Arc<T>` accepts bean bindings, where `T` is
/// the bean's type or any capability it provides. Anything else reports
/// [`TarkibError::UnsupportedType`].
pub trait Inject: Sized + Send + 'static {
    fn from_property(_store: &PropertyStore, key: &str) -> Result<Self> {
        Err(TarkibError::UnsupportedType {
            target: type_name::<Self>().to_string(),
            binding: format!("property '{key}'"),
        })
    }

    fn from_bean(bean: &WiredBean) -> Result<Self> {
        Err(TarkibError::UnsupportedType {
            target: type_name::<Self>().to_string(),
            binding: format!("bean '{}'", bean.name()),
        })
    }
}

macro_rules! inject_scalars {
    ($($ty:ty),* $(,)?) => {$(
        impl Inject for $ty {
            fn from_property(store: &PropertyStore, key: &str) -> Result<Self> {
                store.value::<$ty>(key)
            }
        }

        impl Inject for Option<$ty> {
            fn from_property(store: &PropertyStore, key: &str) -> Result<Self> {
                store.value::<$ty>(key).map(Some)
            }
        }
    )*};
}

inject_scalars!(
    u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64, bool, String,
);

impl<B: ?Sized + Send + Sync + 'static> Inject for Arc<B> {
    fn from_bean(bean: &WiredBean) -> Result<Self> {
        bean.cast::<B>()
    }
}

impl<B: ?Sized + Send + Sync + 'static> Inject for Option<Arc<B>> {
    fn from_bean(bean: &WiredBean) -> Result<Self> {
        bean.cast::<B>().map(Some)
    }
}

impl<T: Send + 'static> Inject for Vec<T> {}
