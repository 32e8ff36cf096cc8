//! Bean definitions.
//!
//! A [`BeanDefinition`] is the recipe for one bean: how to instantiate
//! it, which fields to populate from properties or other beans, which
//! lifecycle hooks to run and which capabilities (`dyn Trait` views) it
//! offers. Definitions are built once through [`BeanDefinitionBuilder`]
//! (or `#[derive(Bean)]`) and are immutable afterwards.

use std::any::{Any, type_name};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tarkib_support::rendering::shorten_type_name;
use tracing::trace;

use crate::directive::{Binding, parse_directive};
use crate::error::{BoxError, Result, TarkibError};
use crate::inject::{BeanInstance, FieldSource, Inject, WiredBean};
use crate::key::TypeKey;
use crate::lifecycle::InitializingBean;
use crate::scope::Scope;

static NEXT_DEFINITION_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) type BoxedBean = Box<dyn Any + Send + Sync>;

/// Writes one converted field value into a bean.
pub(crate) type Assignment = Box<dyn FnOnce(&mut (dyn Any + Send + Sync)) + Send>;

type FieldConverter = Arc<dyn Fn(FieldSource<'_>) -> Result<Assignment> + Send + Sync>;
type InitHook = Arc<dyn Fn(&mut (dyn Any + Send + Sync)) -> std::result::Result<(), BoxError> + Send + Sync>;
type DestroyHook = Arc<dyn Fn(&(dyn Any + Send + Sync)) + Send + Sync>;
type Caster = Arc<dyn Fn(BeanInstance) -> Option<Box<dyn Any>> + Send + Sync>;
type FactoryMethod = Arc<dyn Fn(&WiredBean, &[String]) -> Result<BoxedBean> + Send + Sync>;
type Constructor = Arc<dyn Fn(&[String]) -> Result<BoxedBean> + Send + Sync>;

/// A type that describes its own bean definition.
///
/// Usually implemented with `#[derive(Bean)]`.
pub trait Bean: Send + Sync + Sized + 'static {
    fn bean_definition() -> Result<BeanDefinition>;
}

/// Whether a field may be written by the factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Public,
    /// Bound fields that are private fail with `NotSettable` on resolution.
    Private,
}

impl Visibility {
    pub fn is_writable(self) -> bool {
        self == Visibility::Public
    }
}

/// One bound field of a bean type.
pub struct FieldDescriptor {
    name: String,
    index: usize,
    type_name: &'static str,
    visibility: Visibility,
    binding: Binding,
    converter: FieldConverter,
}

impl FieldDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Position among the bound fields, in declaration order.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn binding(&self) -> &Binding {
        &self.binding
    }

    pub(crate) fn convert(&self, source: FieldSource<'_>) -> Result<Assignment> {
        (self.converter)(source)
    }
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("type", &shorten_type_name(self.type_name))
            .field("visibility", &self.visibility)
            .field("binding", &self.binding.to_string())
            .finish()
    }
}

pub(crate) enum Instantiate {
    /// `T::default()`
    Default(fn() -> BoxedBean),
    /// A constructor fed with the construction args.
    Constructor(Constructor),
    /// A method on another bean, fed with the construction args.
    FactoryBean { name: String, make: FactoryMethod },
}

/// The recipe for one bean.
pub struct BeanDefinition {
    id: u64,
    name: String,
    type_key: TypeKey,
    scope: Scope,
    fields: Vec<FieldDescriptor>,
    args: Vec<String>,
    instantiate: Instantiate,
    init_method: Option<String>,
    init_hooks: Vec<InitHook>,
    destroy: Option<(String, DestroyHook)>,
    capabilities: HashMap<TypeKey, Caster>,
}

impl BeanDefinition {
    /// Starts a definition for a type instantiated with `T::default()`.
    ///
    /// # Examples
    /// ```
    /// use tarkib_container::definition::BeanDefinition;
    /// use tarkib_container::scope::Scope;
    ///
    /// #[derive(Default)]
    /// struct Server {
    ///     port: u16,
    /// }
    ///
    /// let definition = BeanDefinition::builder::<Server>()
    ///     .name("server")
    ///     .scope(Scope::Prototype)
    ///     .property("port", "server.port", |s: &mut Server| &mut s.port)
    ///     .build()
    ///     .unwrap();
    ///
    /// assert_eq!(definition.name(), "server");
    /// assert_eq!(definition.fields().len(), 1);
    /// ```
    pub fn builder<T: Default + Send + Sync + 'static>() -> BeanDefinitionBuilder<T> {
        BeanDefinitionBuilder::new(Instantiate::Default(default_bean::<T>))
    }

    /// Starts a definition for a type built by `constructor` from the
    /// construction args.
    pub fn constructed<T, F>(constructor: F) -> BeanDefinitionBuilder<T>
    where
        T: Send + Sync + 'static,
        F: Fn(&[String]) -> Result<T> + Send + Sync + 'static,
    {
        BeanDefinitionBuilder::new(Instantiate::Constructor(Arc::new(move |args| {
            Ok(Box::new(constructor(args)?) as BoxedBean)
        })))
    }

    /// Starts a definition for a type produced by a method on the bean
    /// named `factory`. `F` is that bean's type or one of its capabilities.
    pub fn from_factory_bean<T, F, M>(factory: &str, make: M) -> BeanDefinitionBuilder<T>
    where
        T: Send + Sync + 'static,
        F: ?Sized + Send + Sync + 'static,
        M: Fn(&F, &[String]) -> Result<T> + Send + Sync + 'static,
    {
        BeanDefinitionBuilder::new(factory_method(factory, make))
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// The definition's own name. Registration may use another one.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_key(&self) -> TypeKey {
        self.type_key
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Bound fields in declaration order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn construction_args(&self) -> &[String] {
        &self.args
    }

    pub fn factory_bean(&self) -> Option<&str> {
        match &self.instantiate {
            Instantiate::FactoryBean { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn init_method(&self) -> Option<&str> {
        self.init_method.as_deref()
    }

    pub fn destroy_method(&self) -> Option<&str> {
        self.destroy.as_ref().map(|(name, _)| name.as_str())
    }

    /// Names of the beans this definition needs, as written.
    pub fn dependencies(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .fields
            .iter()
            .filter_map(|field| match field.binding() {
                Binding::Bean(name) => Some(name.as_str()),
                Binding::Property(_) => None,
            })
            .collect();
        names.extend(self.factory_bean());
        names
    }

    /// Every type this bean can be viewed as, its own type included.
    pub fn capabilities(&self) -> impl Iterator<Item = TypeKey> + '_ {
        self.capabilities.keys().copied()
    }

    pub fn provides(&self, capability: &TypeKey) -> bool {
        self.capabilities.contains_key(capability)
    }

    /// Views `instance` (created from this definition) as `C`.
    ///
    /// # Errors
    /// [`TarkibError::TypeMismatch`] if `C` is neither the bean's type
    /// nor one of its capabilities.
    pub fn cast<C: ?Sized + 'static>(&self, name: &str, instance: BeanInstance) -> Result<Arc<C>> {
        self.capabilities
            .get(&TypeKey::of::<C>())
            .and_then(|caster| caster(instance))
            .and_then(|boxed| boxed.downcast::<Arc<C>>().ok())
            .map(|cast| *cast)
            .ok_or_else(|| TarkibError::TypeMismatch {
                name: name.to_string(),
                expected: type_name::<C>().to_string(),
                found: self.type_key.type_name().to_string(),
            })
    }

    pub(crate) fn instantiate(&self) -> &Instantiate {
        &self.instantiate
    }

    pub(crate) fn init_hooks(&self) -> &[InitHook] {
        &self.init_hooks
    }

    pub(crate) fn destroy_instance(&self, instance: &BeanInstance) {
        if let Some((_, hook)) = &self.destroy {
            hook(instance.as_ref());
        }
    }
}

impl fmt::Debug for BeanDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanDefinition")
            .field("name", &self.name)
            .field("type", &self.type_key)
            .field("scope", &self.scope)
            .field("fields", &self.fields)
            .field("args", &self.args)
            .field("factory_bean", &self.factory_bean())
            .field("init_method", &self.init_method)
            .field("destroy_method", &self.destroy_method())
            .finish_non_exhaustive()
    }
}

fn default_bean<T: Default + Send + Sync + 'static>() -> BoxedBean {
    Box::new(T::default())
}

fn factory_method<T, F, M>(factory: &str, make: M) -> Instantiate
where
    T: Send + Sync + 'static,
    F: ?Sized + Send + Sync + 'static,
    M: Fn(&F, &[String]) -> Result<T> + Send + Sync + 'static,
{
    let make: FactoryMethod = Arc::new(move |wired: &WiredBean, args: &[String]| {
        let factory = wired.cast::<F>()?;
        Ok(Box::new(make(&factory, args)?) as BoxedBean)
    });
    Instantiate::FactoryBean {
        name: factory.to_string(),
        make,
    }
}

fn converter<F>(convert: F) -> FieldConverter
where
    F: Fn(FieldSource<'_>) -> Result<Assignment> + Send + Sync + 'static,
{
    Arc::new(convert)
}

/// Builds a [`BeanDefinition`] for type `T`.
///
/// Errors (malformed directives) are collected and the first one is
/// reported by [`build`](Self::build).
pub struct BeanDefinitionBuilder<T> {
    name: String,
    scope: Scope,
    fields: Vec<FieldDescriptor>,
    args: Vec<String>,
    instantiate: Instantiate,
    after_properties_set: Option<InitHook>,
    init: Option<(String, InitHook)>,
    destroy: Option<(String, DestroyHook)>,
    capabilities: HashMap<TypeKey, Caster>,
    error: Option<TarkibError>,
    _bean: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> BeanDefinitionBuilder<T> {
    fn new(instantiate: Instantiate) -> Self {
        Self {
            name: shorten_type_name(type_name::<T>()),
            scope: Scope::default(),
            fields: Vec::new(),
            args: Vec::new(),
            instantiate,
            after_properties_set: None,
            init: None,
            destroy: None,
            capabilities: HashMap::new(),
            error: None,
            _bean: PhantomData,
        }
    }

    /// Overrides the default name (the short type name).
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// Appends one construction argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Binds a public field to a property key.
    pub fn property<F, A>(self, field: &str, key: &str, accessor: A) -> Self
    where
        F: Inject,
        A: Fn(&mut T) -> &mut F + Send + Sync + 'static,
    {
        let binding = Binding::Property(key.to_string());
        self.push_field(field, binding, Visibility::Public, accessor)
    }

    /// Binds a public field to another bean.
    pub fn autowire<F, A>(self, field: &str, bean: &str, accessor: A) -> Self
    where
        F: Inject,
        A: Fn(&mut T) -> &mut F + Send + Sync + 'static,
    {
        let binding = Binding::Bean(bean.to_string());
        self.push_field(field, binding, Visibility::Public, accessor)
    }

    /// Binds a field from a directive string such as `value:${port}`.
    ///
    /// A malformed directive is reported by [`build`](Self::build).
    pub fn bind<F, A>(mut self, field: &str, directive: &str, visibility: Visibility, accessor: A) -> Self
    where
        F: Inject,
        A: Fn(&mut T) -> &mut F + Send + Sync + 'static,
    {
        match parse_directive(directive) {
            Ok(binding) => self.push_field(field, binding, visibility, accessor),
            Err(reason) => {
                self.fail(TarkibError::malformed(
                    directive,
                    format!("field '{field}' of {}: {reason}", self.name),
                ));
                self
            }
        }
    }

    fn push_field<F, A>(mut self, field: &str, binding: Binding, visibility: Visibility, accessor: A) -> Self
    where
        F: Inject,
        A: Fn(&mut T) -> &mut F + Send + Sync + 'static,
    {
        let accessor = Arc::new(accessor);
        let convert = converter(move |source| {
            let value = match source {
                FieldSource::Property { store, key } => F::from_property(store, key)?,
                FieldSource::Bean(bean) => F::from_bean(bean)?,
            };
            let accessor = Arc::clone(&accessor);
            Ok(Box::new(move |bean: &mut (dyn Any + Send + Sync)| {
                if let Some(bean) = bean.downcast_mut::<T>() {
                    *accessor(bean) = value;
                }
            }) as Assignment)
        });

        trace!(bean = %self.name, field, binding = %binding, "Bound field");
        self.fields.push(FieldDescriptor {
            name: field.to_string(),
            index: self.fields.len(),
            type_name: type_name::<F>(),
            visibility,
            binding,
            converter: convert,
        });
        self
    }

    /// Instantiates the bean through a method on the bean named `factory`
    /// instead of the builder's own constructor.
    pub fn factory_bean<F, M>(mut self, factory: &str, make: M) -> Self
    where
        F: ?Sized + Send + Sync + 'static,
        M: Fn(&F, &[String]) -> Result<T> + Send + Sync + 'static,
    {
        self.instantiate = factory_method(factory, make);
        self
    }

    /// Runs [`InitializingBean::after_properties_set`] after population.
    pub fn initializing(mut self) -> Self
    where
        T: InitializingBean,
    {
        self.after_properties_set = Some(Arc::new(|bean: &mut (dyn Any + Send + Sync)| {
            match bean.downcast_mut::<T>() {
                Some(bean) => bean.after_properties_set(),
                None => Ok(()),
            }
        }));
        self
    }

    /// Runs `init` after population (and after `after_properties_set`).
    pub fn init_method<E, M>(mut self, name: &str, init: M) -> Self
    where
        E: Into<BoxError>,
        M: Fn(&mut T) -> std::result::Result<(), E> + Send + Sync + 'static,
    {
        let hook: InitHook = Arc::new(move |bean: &mut (dyn Any + Send + Sync)| {
            match bean.downcast_mut::<T>() {
                Some(bean) => init(bean).map_err(Into::into),
                None => Ok(()),
            }
        });
        self.init = Some((name.to_string(), hook));
        self
    }

    /// Runs `destroy` when the factory destroys its singletons.
    pub fn destroy_method<M>(mut self, name: &str, destroy: M) -> Self
    where
        M: Fn(&T) + Send + Sync + 'static,
    {
        let hook: DestroyHook = Arc::new(move |bean: &(dyn Any + Send + Sync)| {
            if let Some(bean) = bean.downcast_ref::<T>() {
                destroy(bean);
            }
        });
        self.destroy = Some((name.to_string(), hook));
        self
    }

    /// Declares that the bean can be viewed as `C`, usually a `dyn Trait`.
    ///
    /// ```
    /// use std::sync::Arc;
    /// use tarkib_container::definition::BeanDefinition;
    /// use tarkib_container::key::TypeKey;
    ///
    /// trait Runner: Send + Sync {}
    ///
    /// #[derive(Default)]
    /// struct Job;
    /// impl Runner for Job {}
    ///
    /// let definition = BeanDefinition::builder::<Job>()
    ///     .provides(|job: Arc<Job>| job as Arc<dyn Runner>)
    ///     .build()
    ///     .unwrap();
    /// assert!(definition.provides(&TypeKey::of::<dyn Runner>()));
    /// ```
    pub fn provides<C, M>(mut self, cast: M) -> Self
    where
        C: ?Sized + 'static,
        M: Fn(Arc<T>) -> Arc<C> + Send + Sync + 'static,
    {
        let caster: Caster = Arc::new(move |instance: BeanInstance| {
            instance
                .downcast::<T>()
                .ok()
                .map(|bean| Box::new(cast(bean)) as Box<dyn Any>)
        });
        self.capabilities.insert(TypeKey::of::<C>(), caster);
        self
    }

    fn fail(&mut self, error: TarkibError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    /// Finishes the definition.
    ///
    /// # Errors
    /// The first malformed directive passed to [`bind`](Self::bind).
    pub fn build(mut self) -> Result<BeanDefinition> {
        if let Some(error) = self.error {
            return Err(error);
        }

        let identity: Caster = Arc::new(|instance: BeanInstance| {
            instance
                .downcast::<T>()
                .ok()
                .map(|bean| Box::new(bean) as Box<dyn Any>)
        });
        self.capabilities.entry(TypeKey::of::<T>()).or_insert(identity);

        let mut init_hooks: Vec<InitHook> = self.after_properties_set.into_iter().collect();
        let init_method = self.init.map(|(name, hook)| {
            init_hooks.push(hook);
            name
        });

        Ok(BeanDefinition {
            id: NEXT_DEFINITION_ID.fetch_add(1, Ordering::Relaxed),
            name: self.name,
            type_key: TypeKey::of::<T>(),
            scope: self.scope,
            fields: self.fields,
            args: self.args,
            instantiate: self.instantiate,
            init_method,
            init_hooks,
            destroy: self.destroy,
            capabilities: self.capabilities,
        })
    }

    /// Like [`build`](Self::build), but panics on a malformed directive.
    ///
    /// Meant for definitions written out in code, where a bad directive
    /// is a programming error.
    pub fn must_build(self) -> BeanDefinition {
        match self.build() {
            Ok(definition) => definition,
            Err(err) => panic!("invalid bean definition: {err}"),
        }
    }
}
