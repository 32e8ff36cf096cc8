//! # The bean factory
//!
//! Assembles beans from their definitions: canonicalizes the requested
//! name, fetches the definition, instantiates it, populates every bound
//! field from the property store or by resolving another bean, then runs
//! the lifecycle hooks.
//!
//! ```text
//! BeanFactoryBuilder ──build()──> BeanFactory
//!                                    │
//!          get_bean(name) ───────────┤
//!                                    ▼
//!   AliasRegistry ─> BeanDefinitionRegistry ─> instantiate ─> populate ─> init
//!                                                               │
//!                                         PropertyStore <───────┴──> get_bean(ref)
//! ```
//!
//! Singletons are created at most once per definition, even under
//! concurrent callers, and shared afterwards. Prototypes are created on
//! every request.
//!
//! # Examples
//! ```rust
//! use std::sync::Arc;
//! use tarkib_container::prelude::*;
//!
//! #[derive(Default)]
//! struct DataSource {
//!     url: String,
//! }
//!
//! #[derive(Default)]
//! struct Repository {
//!     source: Option<Arc<DataSource>>,
//! }
//!
//! let factory = BeanFactory::builder()
//!     .property("db.url", "postgres://localhost")
//!     .definition(
//!         "dataSource",
//!         BeanDefinition::builder::<DataSource>()
//!             .property("url", "db.url", |d: &mut DataSource| &mut d.url)
//!             .must_build(),
//!     )
//!     .definition(
//!         "repository",
//!         BeanDefinition::builder::<Repository>()
//!             .autowire("source", "dataSource", |r: &mut Repository| &mut r.source)
//!             .must_build(),
//!     )
//!     .build()
//!     .expect("Failed to build factory");
//!
//! let repository = factory.get_bean_as::<Repository>("repository").unwrap();
//! assert_eq!(repository.source.as_ref().unwrap().url, "postgres://localhost");
//! ```

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, info, instrument, trace, warn};

use crate::alias::AliasRegistry;
use crate::definition::{Bean, BeanDefinition, BoxedBean, Instantiate};
use crate::directive::Binding;
use crate::error::{BoxError, CycleError, Result, TarkibError};
use crate::graph::GraphValidator;
use crate::inject::{BeanInstance, FieldSource, WiredBean};
use crate::key::TypeKey;
use crate::lifecycle::BeanPostProcessor;
use crate::property::PropertyStore;
use crate::provider::{Provider, ProviderRegistry};
use crate::registry::BeanDefinitionRegistry;
use crate::scope::Scope;

// ============================================================
// Resolution state
// ============================================================

/// Names under construction in one top-level request, outermost first.
#[derive(Debug, Default)]
struct Resolution {
    path: Vec<String>,
}

impl Resolution {
    fn enter(&mut self, name: &str) -> Result<()> {
        if let Some(start) = self.path.iter().position(|n| n == name) {
            let mut chain = self.path[start..].to_vec();
            chain.push(name.to_string());
            warn!(chain = ?chain, "Cyclic bean dependency detected");
            return Err(TarkibError::CyclicDependency(CycleError { chain }));
        }
        self.path.push(name.to_string());
        Ok(())
    }

    fn leave(&mut self) {
        self.path.pop();
    }

    fn requester(&self) -> Option<&str> {
        self.path.last().map(String::as_str)
    }

    fn is_top_level(&self) -> bool {
        self.path.is_empty()
    }
}

/// The cache cell for one singleton definition.
struct SingletonSlot {
    name: String,
    definition: Arc<BeanDefinition>,
    cell: OnceCell<BeanInstance>,
}

// ============================================================
// BeanFactory
// ============================================================

/// Creates, wires and caches beans.
///
/// All operations take `&self`; the factory is `Send + Sync` and meant to
/// be shared behind an `Arc`.
pub struct BeanFactory {
    aliases: AliasRegistry,
    definitions: BeanDefinitionRegistry,
    properties: PropertyStore,
    post_processors: RwLock<Vec<Arc<dyn BeanPostProcessor>>>,
    singletons: DashMap<u64, Arc<SingletonSlot>>,
    /// Definition ids in the order their singletons finished creation
    creation_order: Mutex<Vec<u64>>,
}

impl Default for BeanFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl BeanFactory {
    /// An empty factory. Use [`builder`](Self::builder) to register and
    /// validate in one go.
    pub fn new() -> Self {
        Self {
            aliases: AliasRegistry::new(),
            definitions: BeanDefinitionRegistry::new(),
            properties: PropertyStore::new(),
            post_processors: RwLock::new(Vec::new()),
            singletons: DashMap::new(),
            creation_order: Mutex::new(Vec::new()),
        }
    }

    pub fn builder() -> BeanFactoryBuilder {
        BeanFactoryBuilder::new()
    }

    pub fn aliases(&self) -> &AliasRegistry {
        &self.aliases
    }

    pub fn definitions(&self) -> &BeanDefinitionRegistry {
        &self.definitions
    }

    pub fn properties(&self) -> &PropertyStore {
        &self.properties
    }

    // ── Registration ──

    /// Registers `definition` under `name`.
    ///
    /// # Errors
    /// [`TarkibError::Conflict`] if `name` is taken.
    pub fn register_bean_definition(&self, name: &str, definition: BeanDefinition) -> Result<()> {
        self.definitions.register_bean_definition(name, definition)
    }

    /// Registers a derived bean under its own name, which is returned.
    ///
    /// # Errors
    /// A malformed definition, or [`TarkibError::Conflict`].
    pub fn register<T: Bean>(&self) -> Result<String> {
        let definition = T::bean_definition()?;
        let name = definition.name().to_string();
        self.definitions.register_bean_definition(&name, definition)?;
        Ok(name)
    }

    /// Removes a definition, destroying its cached singleton if any.
    ///
    /// A singleton still under construction keeps its slot; it is
    /// destroyed by the next [`destroy_singletons`](Self::destroy_singletons).
    ///
    /// # Errors
    /// [`TarkibError::NotFound`] if `name` is not registered.
    pub fn remove_bean_definition(&self, name: &str) -> Result<Arc<BeanDefinition>> {
        let definition = self.definitions.remove_bean_definition(name)?;

        let evicted = self
            .singletons
            .remove_if(&definition.id(), |_, slot| slot.cell.get().is_some());
        if let Some((_, slot)) = evicted {
            self.creation_order.lock().retain(|id| *id != definition.id());
            if let Some(instance) = slot.cell.get() {
                definition.destroy_instance(instance);
                debug!(name, "Destroyed evicted singleton");
            }
        }
        Ok(definition)
    }

    pub fn add_post_processor(&self, processor: impl BeanPostProcessor + 'static) {
        self.post_processors.write().push(Arc::new(processor));
    }

    /// Runs a [`Provider`] against this factory.
    ///
    /// # Errors
    /// The first registration error the provider hits.
    pub fn add_provider(&mut self, provider: &dyn Provider) -> Result<()> {
        debug!(provider = provider.name(), "Registering provider");
        provider.register(self)
    }

    // ── Resolution ──

    /// Returns the bean registered under `name` (or an alias of it).
    ///
    /// # Errors
    /// - [`TarkibError::NotFound`] for an unknown bean or property
    /// - [`TarkibError::CyclicAlias`], [`TarkibError::CyclicDependency`]
    /// - any conversion or lifecycle error raised while creating the bean
    #[instrument(skip(self), level = "debug")]
    pub fn get_bean(&self, name: &str) -> Result<BeanInstance> {
        self.resolve(name, &mut Resolution::default())
            .map(|(instance, _)| instance)
    }

    /// Like [`get_bean`](Self::get_bean), viewed as `T`: the bean's own
    /// type or one of its capabilities.
    ///
    /// # Errors
    /// [`TarkibError::TypeMismatch`] if the bean is not a `T`, otherwise
    /// as [`get_bean`](Self::get_bean).
    pub fn get_bean_as<T: ?Sized + 'static>(&self, name: &str) -> Result<Arc<T>> {
        let (instance, definition) = self.resolve(name, &mut Resolution::default())?;
        definition.cast::<T>(name, instance)
    }

    /// Populates the bound fields of `target` as if it were the bean
    /// `name`. No instance is created and no lifecycle hooks run.
    ///
    /// On error `target` is left untouched.
    ///
    /// # Errors
    /// [`TarkibError::TypeMismatch`] if `name` is not defined for type `T`,
    /// otherwise as [`get_bean`](Self::get_bean).
    pub fn retrieve_bean<T: Send + Sync + 'static>(&self, name: &str, target: &mut T) -> Result<()> {
        let canonical = self.aliases.canonical_name(name)?;
        let definition = self.definitions.get_bean_definition(&canonical)?;

        if definition.type_key() != TypeKey::of::<T>() {
            return Err(TarkibError::TypeMismatch {
                name: name.to_string(),
                expected: std::any::type_name::<T>().to_string(),
                found: definition.type_key().type_name().to_string(),
            });
        }

        self.check_acyclic(&canonical)?;
        let mut resolution = Resolution::default();
        resolution.enter(&canonical)?;
        self.populate(&canonical, &definition, target, &mut resolution)
    }

    /// Appends every bean whose type is, or provides, `C`.
    ///
    /// Order is by bean name. On error nothing is appended.
    ///
    /// # Errors
    /// The first error raised while resolving one of the beans.
    pub fn retrieve_beans<C: ?Sized + 'static>(&self, beans: &mut Vec<Arc<C>>) -> Result<()> {
        let capability = TypeKey::of::<C>();
        let names = self.definitions.names_providing(&capability);

        let mut found = Vec::with_capacity(names.len());
        for name in &names {
            let (instance, definition) = self.resolve_canonical(name, &mut Resolution::default())?;
            found.push(definition.cast::<C>(name, instance)?);
        }

        debug!(capability = %capability, count = found.len(), "Retrieved beans by capability");
        beans.extend(found);
        Ok(())
    }

    /// Checks that every referenced bean is registered and that the
    /// reference graph has no cycles.
    ///
    /// # Errors
    /// [`TarkibError::NotFound`] (with `required_by`),
    /// [`TarkibError::CyclicDependency`] or [`TarkibError::CyclicAlias`].
    #[instrument(skip(self), name = "bean_factory_validate")]
    pub fn validate(&self) -> Result<()> {
        let names = self.definitions.names();
        let lookup = |name: &str| self.dependencies_of(name);
        GraphValidator::new(&lookup)
            .require_registered()
            .validate(names.as_slice())?;

        info!(definitions = names.len(), "Bean graph validated");
        Ok(())
    }

    /// Runs destroy methods of all cached singletons, newest first, and
    /// evicts them from the cache.
    ///
    /// Singletons still under construction are left in place and handled
    /// by a later call.
    pub fn destroy_singletons(&self) {
        let order = std::mem::take(&mut *self.creation_order.lock());
        debug!(count = order.len(), "Destroying singletons");

        // finished but not yet recorded in the creation order
        let unordered: Vec<u64> = self
            .singletons
            .iter()
            .filter(|entry| entry.cell.get().is_some() && !order.contains(entry.key()))
            .map(|entry| *entry.key())
            .collect();

        for id in order.into_iter().rev().chain(unordered) {
            self.destroy_singleton(id);
        }
    }

    // ── Internal ──

    fn destroy_singleton(&self, id: u64) {
        let Some((_, slot)) = self
            .singletons
            .remove_if(&id, |_, slot| slot.cell.get().is_some())
        else {
            return;
        };
        if let Some(instance) = slot.cell.get() {
            slot.definition.destroy_instance(instance);
            trace!(name = %slot.name, "Destroyed singleton");
        }
    }

    fn resolve(&self, name: &str, resolution: &mut Resolution) -> Result<(BeanInstance, Arc<BeanDefinition>)> {
        let canonical = self.aliases.canonical_name(name)?;
        self.resolve_canonical(&canonical, resolution)
    }

    fn resolve_canonical(
        &self,
        name: &str,
        resolution: &mut Resolution,
    ) -> Result<(BeanInstance, Arc<BeanDefinition>)> {
        let definition = self
            .definitions
            .get_bean_definition(name)
            .map_err(|err| match err {
                TarkibError::NotFound(mut err) => {
                    err.required_by = resolution.requester().map(str::to_string);
                    TarkibError::NotFound(err)
                }
                other => other,
            })?;

        if resolution.is_top_level() && !self.is_cached(&definition) {
            self.check_acyclic(name)?;
        }

        resolution.enter(name)?;
        let instance = match definition.scope() {
            Scope::Singleton => self.singleton(name, &definition, resolution),
            Scope::Prototype => self
                .create(name, &definition, resolution)
                .map(BeanInstance::from),
        };
        resolution.leave();

        Ok((instance?, definition))
    }

    fn is_cached(&self, definition: &BeanDefinition) -> bool {
        definition.scope().is_cached()
            && self
                .singletons
                .get(&definition.id())
                .is_some_and(|slot| slot.cell.get().is_some())
    }

    fn singleton(
        &self,
        name: &str,
        definition: &Arc<BeanDefinition>,
        resolution: &mut Resolution,
    ) -> Result<BeanInstance> {
        // the map guard must be released before construction recurses
        let slot = Arc::clone(&self.singletons.entry(definition.id()).or_insert_with(|| {
            Arc::new(SingletonSlot {
                name: name.to_string(),
                definition: Arc::clone(definition),
                cell: OnceCell::new(),
            })
        }));

        if let Some(instance) = slot.cell.get() {
            trace!(name, "Singleton cache hit");
            return Ok(Arc::clone(instance));
        }

        let mut created = false;
        let instance = slot.cell.get_or_try_init(|| -> Result<BeanInstance> {
            let instance = BeanInstance::from(self.create(name, definition, resolution)?);
            created = true;
            Ok(instance)
        })?;

        // recorded only once the cell holds the instance
        if created {
            self.creation_order.lock().push(definition.id());
            debug!(name, "Created singleton");
        }
        Ok(Arc::clone(instance))
    }

    fn create(&self, name: &str, definition: &BeanDefinition, resolution: &mut Resolution) -> Result<BoxedBean> {
        trace!(name, bean_type = %definition.type_key().short_name(), "Creating bean");

        let mut bean = self.instantiate(definition, resolution)?;
        self.populate(name, definition, &mut *bean, resolution)?;
        self.initialize(name, definition, &mut *bean)?;
        Ok(bean)
    }

    fn instantiate(&self, definition: &BeanDefinition, resolution: &mut Resolution) -> Result<BoxedBean> {
        match definition.instantiate() {
            Instantiate::Default(make) => Ok(make()),
            Instantiate::Constructor(construct) => construct(definition.construction_args()),
            Instantiate::FactoryBean { name, make } => {
                let factory_name = self.aliases.canonical_name(name)?;
                let (instance, factory) = self.resolve_canonical(&factory_name, resolution)?;
                let wired = WiredBean::new(name.as_str(), instance, factory);
                make(&wired, definition.construction_args())
            }
        }
    }

    /// Converts every bound field first and writes them only once all
    /// conversions succeeded.
    fn populate(
        &self,
        name: &str,
        definition: &BeanDefinition,
        target: &mut (dyn Any + Send + Sync),
        resolution: &mut Resolution,
    ) -> Result<()> {
        let mut assignments = Vec::with_capacity(definition.fields().len());

        for field in definition.fields() {
            if !field.visibility().is_writable() {
                return Err(TarkibError::NotSettable {
                    target: format!("field '{}' of bean '{name}'", field.name()),
                    reason: "the field is private".to_string(),
                });
            }

            let assignment = match field.binding() {
                Binding::Property(key) => field.convert(FieldSource::Property {
                    store: &self.properties,
                    key,
                })?,
                Binding::Bean(reference) => {
                    let (instance, referenced) = self.resolve(reference, resolution)?;
                    let wired = WiredBean::new(reference.as_str(), instance, referenced);
                    field.convert(FieldSource::Bean(&wired))?
                }
            };
            trace!(bean = name, field = field.name(), "Converted field");
            assignments.push(assignment);
        }

        for assign in assignments {
            assign(&mut *target);
        }
        Ok(())
    }

    fn initialize(&self, name: &str, definition: &BeanDefinition, bean: &mut (dyn Any + Send + Sync)) -> Result<()> {
        let processors = self.post_processors.read().clone();
        let failed = |phase: &'static str| {
            move |source: BoxError| TarkibError::LifecycleFailed {
                name: name.to_string(),
                phase,
                source,
            }
        };

        for processor in &processors {
            processor
                .before_initialization(&mut *bean, name)
                .map_err(failed("post-processing before initialization"))?;
        }
        for hook in definition.init_hooks() {
            hook(&mut *bean).map_err(failed("initialization"))?;
        }
        for processor in &processors {
            processor
                .after_initialization(&mut *bean, name)
                .map_err(failed("post-processing after initialization"))?;
        }
        Ok(())
    }

    /// Fails if the graph reachable from `root` has a cycle.
    fn check_acyclic(&self, root: &str) -> Result<()> {
        let lookup = |name: &str| self.dependencies_of(name);
        GraphValidator::new(&lookup).validate(std::slice::from_ref(&root))
    }

    fn dependencies_of(&self, name: &str) -> Result<Option<Vec<String>>> {
        let Some(definition) = self.definitions.find(name) else {
            return Ok(None);
        };
        definition
            .dependencies()
            .into_iter()
            .map(|dependency| self.aliases.canonical_name(dependency))
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }
}

impl ProviderRegistry for BeanFactory {
    fn register_bean_definition(&mut self, name: &str, definition: BeanDefinition) -> Result<()> {
        self.definitions.register_bean_definition(name, definition)
    }

    fn register_alias(&mut self, name: &str, alias: &str) -> Result<()> {
        self.aliases.register_alias(name, alias)
    }

    fn set_property(&mut self, key: &str, value: &str) -> Result<()> {
        self.properties.set(key, value)
    }
}

impl fmt::Debug for BeanFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanFactory")
            .field("definitions", &self.definitions.len())
            .field("aliases", &self.aliases.len())
            .field("properties", &self.properties.len())
            .field("singletons", &self.singletons.len())
            .finish()
    }
}

// ============================================================
// BeanFactoryBuilder
// ============================================================

/// Collects registrations, then validates the graph on
/// [`build`](Self::build).
///
/// Registration errors are deferred: the first one is returned by
/// `build`.
pub struct BeanFactoryBuilder {
    factory: BeanFactory,
    error: Option<TarkibError>,
}

impl BeanFactoryBuilder {
    fn new() -> Self {
        Self {
            factory: BeanFactory::new(),
            error: None,
        }
    }

    fn record(&mut self, outcome: Result<()>) {
        if let Err(err) = outcome {
            if self.error.is_none() {
                warn!(error = %err, "Registration failed");
                self.error = Some(err);
            }
        }
    }

    pub fn definition(mut self, name: &str, definition: BeanDefinition) -> Self {
        let outcome = self.factory.register_bean_definition(name, definition);
        self.record(outcome);
        self
    }

    /// Registers a derived bean under its own name.
    pub fn bean<T: Bean>(mut self) -> Self {
        let outcome = self.factory.register::<T>().map(drop);
        self.record(outcome);
        self
    }

    pub fn alias(mut self, name: &str, alias: &str) -> Self {
        let outcome = self.factory.aliases.register_alias(name, alias);
        self.record(outcome);
        self
    }

    pub fn property<V: Serialize + ?Sized>(mut self, key: &str, value: &V) -> Self {
        let outcome = self.factory.properties.set(key, value);
        self.record(outcome);
        self
    }

    pub fn post_processor(self, processor: impl BeanPostProcessor + 'static) -> Self {
        self.factory.add_post_processor(processor);
        self
    }

    pub fn provider(mut self, provider: &dyn Provider) -> Self {
        let outcome = self.factory.add_provider(provider);
        self.record(outcome);
        self
    }

    /// Finishes registration and validates the bean graph.
    ///
    /// # Errors
    /// The first registration error, or a validation error from
    /// [`BeanFactory::validate`].
    #[instrument(skip(self), name = "bean_factory_build")]
    pub fn build(self) -> Result<BeanFactory> {
        if let Some(err) = self.error {
            return Err(err);
        }

        info!(
            definitions = self.factory.definitions.len(),
            aliases = self.factory.aliases.len(),
            properties = self.factory.properties.len(),
            "Building bean factory"
        );
        self.factory.validate()?;
        Ok(self.factory)
    }
}

impl fmt::Debug for BeanFactoryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanFactoryBuilder")
            .field("factory", &self.factory)
            .field("error", &self.error)
            .finish()
    }
}

// ============================================================
// Prelude
// ============================================================

pub mod prelude {
    pub use super::{BeanFactory, BeanFactoryBuilder};
    pub use crate::alias::AliasRegistry;
    pub use crate::definition::{Bean, BeanDefinition, BeanDefinitionBuilder, Visibility};
    pub use crate::directive::Binding;
    pub use crate::error::{BoxError, Result, TarkibError};
    pub use crate::inject::{BeanInstance, Inject};
    pub use crate::key::TypeKey;
    pub use crate::lifecycle::{BeanPostProcessor, InitializingBean};
    pub use crate::property::PropertyStore;
    pub use crate::provider::{Provider, ProviderRegistry};
    pub use crate::registry::BeanDefinitionRegistry;
    pub use crate::scope::Scope;
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Barrier;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::definition::Visibility;
    use crate::error::Subject;
    use crate::lifecycle::InitializingBean;

    #[derive(Debug, Default)]
    struct T {
        v: i32,
    }

    #[derive(Default)]
    struct Settings {
        name: String,
        port: u16,
        debug: bool,
        ratio: Option<f64>,
    }

    #[derive(Default)]
    struct A {
        b: Option<Arc<B>>,
    }

    #[derive(Default)]
    struct B {
        a: Option<Arc<A>>,
    }

    trait Runner: Send + Sync {
        fn run(&self) -> String;
    }

    #[derive(Default)]
    struct Runner1;

    #[derive(Default)]
    struct Runner2;

    impl Runner for Runner1 {
        fn run(&self) -> String {
            "one".into()
        }
    }

    impl Runner for Runner2 {
        fn run(&self) -> String {
            "two".into()
        }
    }

    fn t_definition() -> BeanDefinition {
        t_definition_with(Scope::Singleton)
    }

    fn t_definition_with(scope: Scope) -> BeanDefinition {
        BeanDefinition::builder::<T>()
            .scope(scope)
            .property("v", "val", |t: &mut T| &mut t.v)
            .must_build()
    }

    fn settings_definition() -> BeanDefinition {
        BeanDefinition::builder::<Settings>()
            .scope(Scope::Prototype)
            .property("name", "app.name", |s: &mut Settings| &mut s.name)
            .property("port", "app.port", |s: &mut Settings| &mut s.port)
            .property("debug", "app.debug", |s: &mut Settings| &mut s.debug)
            .property("ratio", "app.ratio", |s: &mut Settings| &mut s.ratio)
            .must_build()
    }

    #[test]
    fn property_bound_bean() {
        let factory = BeanFactory::new();
        factory.register_bean_definition("beanT", t_definition()).unwrap();
        factory.properties().set("val", "42").unwrap();

        let bean = factory.get_bean("beanT").unwrap();
        assert_eq!(bean.downcast_ref::<T>().unwrap().v, 42);
    }

    #[test]
    fn prototype_reflects_store_at_call_time() {
        let factory = BeanFactory::builder()
            .definition("settings", settings_definition())
            .property("app", &HashMap::from([("name", "demo"), ("port", "80"), ("debug", "t"), ("ratio", "0.5")]))
            .build()
            .unwrap();

        let first = factory.get_bean_as::<Settings>("settings").unwrap();
        assert_eq!(first.name, "demo");
        assert_eq!(first.port, 80);
        assert!(first.debug);
        assert_eq!(first.ratio, Some(0.5));

        factory.properties().set("app.port", &8080).unwrap();
        let second = factory.get_bean_as::<Settings>("settings").unwrap();
        assert_eq!(second.port, 8080);
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn singleton_is_shared() {
        let factory = BeanFactory::new();
        factory.register_bean_definition("beanT", t_definition()).unwrap();
        factory.properties().set("val", &1).unwrap();

        let first = factory.get_bean("beanT").unwrap();
        factory.properties().set("val", &2).unwrap();
        let second = factory.get_bean("beanT").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.downcast_ref::<T>().unwrap().v, 1);
    }

    #[test]
    fn missing_property_aborts_bean() {
        let factory = BeanFactory::new();
        factory.register_bean_definition("beanT", t_definition()).unwrap();

        match factory.get_bean("beanT").unwrap_err() {
            TarkibError::NotFound(e) => {
                assert_eq!(e.subject, Subject::Property);
                assert_eq!(e.name, "val");
            }
            other => panic!("Expected NotFound, got: {other:?}"),
        }
    }

    #[test]
    fn conversion_error_propagates() {
        let factory = BeanFactory::new();
        factory.register_bean_definition("beanT", t_definition()).unwrap();
        factory.properties().set("val", "abc").unwrap();

        assert!(matches!(
            factory.get_bean("beanT"),
            Err(TarkibError::Conversion(_))
        ));
    }

    #[test]
    fn unknown_bean_not_found() {
        let factory = BeanFactory::new();
        factory.register_bean_definition("beanT", t_definition()).unwrap();

        match factory.get_bean("beanX").unwrap_err() {
            TarkibError::NotFound(e) => {
                assert_eq!(e.subject, Subject::BeanDefinition);
                assert!(e.required_by.is_none());
            }
            other => panic!("Expected NotFound, got: {other:?}"),
        }
    }

    #[test]
    fn get_bean_through_alias_chain() {
        let factory = BeanFactory::new();
        factory.register_bean_definition("beanT", t_definition()).unwrap();
        factory.aliases().register_alias("beanT", "t").unwrap();
        factory.aliases().register_alias("t", "tee").unwrap();
        factory.properties().set("val", &7).unwrap();

        let by_alias = factory.get_bean("tee").unwrap();
        let by_name = factory.get_bean("beanT").unwrap();
        assert!(Arc::ptr_eq(&by_alias, &by_name));
    }

    #[test]
    fn autowired_bean_is_injected() {
        #[derive(Default)]
        struct Holder {
            t: Option<Arc<T>>,
        }

        let factory = BeanFactory::builder()
            .definition("beanT", t_definition())
            .definition(
                "holder",
                BeanDefinition::builder::<Holder>()
                    .autowire("t", "beanT", |h: &mut Holder| &mut h.t)
                    .must_build(),
            )
            .property("val", &3)
            .build()
            .unwrap();

        let holder = factory.get_bean_as::<Holder>("holder").unwrap();
        let t = factory.get_bean_as::<T>("beanT").unwrap();
        assert!(Arc::ptr_eq(holder.t.as_ref().unwrap(), &t));
    }

    #[test]
    fn missing_reference_names_requester() {
        #[derive(Default)]
        struct Holder {
            t: Option<Arc<T>>,
        }

        let factory = BeanFactory::new();
        factory
            .register_bean_definition(
                "holder",
                BeanDefinition::builder::<Holder>()
                    .autowire("t", "beanT", |h: &mut Holder| &mut h.t)
                    .must_build(),
            )
            .unwrap();

        match factory.get_bean("holder").unwrap_err() {
            TarkibError::NotFound(e) => {
                assert_eq!(e.name, "beanT");
                assert_eq!(e.required_by.as_deref(), Some("holder"));
            }
            other => panic!("Expected NotFound, got: {other:?}"),
        }
        assert!(factory.validate().is_err());
    }

    fn cyclic_factory() -> BeanFactory {
        let factory = BeanFactory::new();
        factory
            .register_bean_definition(
                "A",
                BeanDefinition::builder::<A>()
                    .autowire("b", "B", |a: &mut A| &mut a.b)
                    .must_build(),
            )
            .unwrap();
        factory
            .register_bean_definition(
                "B",
                BeanDefinition::builder::<B>()
                    .autowire("a", "A", |b: &mut B| &mut b.a)
                    .must_build(),
            )
            .unwrap();
        factory
    }

    #[test]
    fn cyclic_beans_fail_fast() {
        let factory = cyclic_factory();

        match factory.get_bean("A").unwrap_err() {
            TarkibError::CyclicDependency(e) => {
                assert_eq!(e.chain, vec!["A", "B", "A"]);
            }
            other => panic!("Expected CyclicDependency, got: {other:?}"),
        }
        assert!(matches!(
            factory.validate(),
            Err(TarkibError::CyclicDependency(_))
        ));
    }

    #[test]
    fn resolution_path_catches_cycles_too() {
        let factory = cyclic_factory();

        // skips the graph check, which only runs for top-level requests
        let mut resolution = Resolution::default();
        resolution.enter("A").unwrap();

        match factory.resolve_canonical("B", &mut resolution).unwrap_err() {
            TarkibError::CyclicDependency(e) => assert_eq!(e.chain, vec!["A", "B", "A"]),
            other => panic!("Expected CyclicDependency, got: {other:?}"),
        }
    }

    #[test]
    fn builder_rejects_cycles() {
        let result = BeanFactory::builder()
            .definition(
                "A",
                BeanDefinition::builder::<A>()
                    .autowire("b", "A", |a: &mut A| &mut a.b)
                    .must_build(),
            )
            .build();
        assert!(matches!(result, Err(TarkibError::CyclicDependency(_))));
    }

    #[test]
    fn retrieve_beans_by_capability() {
        let factory = BeanFactory::builder()
            .definition(
                "runner1",
                BeanDefinition::builder::<Runner1>()
                    .provides(|r: Arc<Runner1>| r as Arc<dyn Runner>)
                    .must_build(),
            )
            .definition(
                "runner2",
                BeanDefinition::builder::<Runner2>()
                    .provides(|r: Arc<Runner2>| r as Arc<dyn Runner>)
                    .must_build(),
            )
            .definition("beanT", t_definition())
            .build()
            .unwrap();

        let mut runners: Vec<Arc<dyn Runner>> = Vec::new();
        factory.retrieve_beans(&mut runners).unwrap();

        let mut ran: Vec<String> = runners.iter().map(|r| r.run()).collect();
        ran.sort();
        assert_eq!(ran, vec!["one", "two"]);
    }

    #[test]
    fn retrieve_beans_appends_nothing_on_error() {
        let factory = BeanFactory::new();
        factory.register_bean_definition("beanT", t_definition()).unwrap();

        let mut beans = vec![Arc::new(T { v: 9 })];
        assert!(factory.retrieve_beans::<T>(&mut beans).is_err());
        assert_eq!(beans.len(), 1);

        factory.properties().set("val", &10).unwrap();
        factory.retrieve_beans::<T>(&mut beans).unwrap();
        assert_eq!(beans.len(), 2);
        assert_eq!(beans[1].v, 10);
    }

    #[test]
    fn get_bean_as_capability_and_mismatch() {
        let factory = BeanFactory::new();
        factory
            .register_bean_definition(
                "runner",
                BeanDefinition::builder::<Runner1>()
                    .provides(|r: Arc<Runner1>| r as Arc<dyn Runner>)
                    .must_build(),
            )
            .unwrap();

        assert_eq!(factory.get_bean_as::<dyn Runner>("runner").unwrap().run(), "one");
        assert!(matches!(
            factory.get_bean_as::<Runner2>("runner"),
            Err(TarkibError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn retrieve_bean_populates_target() {
        let factory = BeanFactory::new();
        factory.register_bean_definition("beanT", t_definition()).unwrap();
        factory.properties().set("val", "42").unwrap();

        let mut t = T::default();
        factory.retrieve_bean("beanT", &mut t).unwrap();
        assert_eq!(t.v, 42);

        let mut wrong = Settings::default();
        assert!(matches!(
            factory.retrieve_bean("beanT", &mut wrong),
            Err(TarkibError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn retrieve_bean_leaves_target_untouched_on_error() {
        let factory = BeanFactory::new();
        factory.register_bean_definition("settings", settings_definition()).unwrap();
        factory.properties().set("app.name", "demo").unwrap();
        factory.properties().set("app.port", "99999").unwrap();

        let mut settings = Settings::default();
        assert!(matches!(
            factory.retrieve_bean("settings", &mut settings),
            Err(TarkibError::Conversion(_))
        ));
        assert!(settings.name.is_empty());
    }

    #[test]
    fn private_field_not_settable() {
        let factory = BeanFactory::new();
        factory
            .register_bean_definition(
                "beanT",
                BeanDefinition::builder::<T>()
                    .bind("v", "value:${val}", Visibility::Private, |t: &mut T| &mut t.v)
                    .must_build(),
            )
            .unwrap();
        factory.properties().set("val", &1).unwrap();

        assert!(matches!(
            factory.get_bean("beanT"),
            Err(TarkibError::NotSettable { .. })
        ));
    }

    #[test]
    fn unsupported_field_type() {
        #[derive(Default)]
        struct Hosts {
            hosts: Vec<String>,
        }

        let factory = BeanFactory::new();
        factory
            .register_bean_definition(
                "hosts",
                BeanDefinition::builder::<Hosts>()
                    .property("hosts", "hosts", |h: &mut Hosts| &mut h.hosts)
                    .must_build(),
            )
            .unwrap();

        assert!(matches!(
            factory.get_bean("hosts"),
            Err(TarkibError::UnsupportedType { .. })
        ));
    }

    #[test]
    fn constructor_receives_args() {
        let factory = BeanFactory::new();
        factory
            .register_bean_definition(
                "settings",
                BeanDefinition::constructed(|args: &[String]| {
                    Ok(Settings {
                        name: args.join("-"),
                        ..Settings::default()
                    })
                })
                .args(["a", "b"])
                .must_build(),
            )
            .unwrap();

        let settings = factory.get_bean_as::<Settings>("settings").unwrap();
        assert_eq!(settings.name, "a-b");
    }

    #[test]
    fn factory_bean_instantiates() {
        struct Pool {
            size: usize,
        }

        #[derive(Default)]
        struct PoolFactory {
            default_size: usize,
        }

        impl PoolFactory {
            fn pool(&self, args: &[String]) -> Result<Pool> {
                Ok(Pool {
                    size: self.default_size + args.len(),
                })
            }
        }

        let factory = BeanFactory::builder()
            .definition(
                "poolFactory",
                BeanDefinition::builder::<PoolFactory>()
                    .property("default_size", "pool.size", |f: &mut PoolFactory| {
                        &mut f.default_size
                    })
                    .must_build(),
            )
            .definition(
                "pool",
                BeanDefinition::from_factory_bean("poolFactory", PoolFactory::pool)
                    .arg("extra")
                    .must_build(),
            )
            .property("pool.size", &4)
            .build()
            .unwrap();

        assert_eq!(factory.get_bean_as::<Pool>("pool").unwrap().size, 5);
    }

    #[test]
    fn lifecycle_order() {
        #[derive(Default)]
        struct Service {
            events: Vec<&'static str>,
        }

        impl InitializingBean for Service {
            fn after_properties_set(&mut self) -> std::result::Result<(), BoxError> {
                self.events.push("after_properties_set");
                Ok(())
            }
        }

        struct Recorder;

        impl BeanPostProcessor for Recorder {
            fn before_initialization(
                &self,
                bean: &mut (dyn Any + Send + Sync),
                _name: &str,
            ) -> std::result::Result<(), BoxError> {
                if let Some(service) = bean.downcast_mut::<Service>() {
                    service.events.push("before");
                }
                Ok(())
            }

            fn after_initialization(
                &self,
                bean: &mut (dyn Any + Send + Sync),
                _name: &str,
            ) -> std::result::Result<(), BoxError> {
                if let Some(service) = bean.downcast_mut::<Service>() {
                    service.events.push("after");
                }
                Ok(())
            }
        }

        let factory = BeanFactory::builder()
            .definition(
                "service",
                BeanDefinition::builder::<Service>()
                    .initializing()
                    .init_method("start", |s: &mut Service| {
                        s.events.push("start");
                        Ok::<_, BoxError>(())
                    })
                    .must_build(),
            )
            .post_processor(Recorder)
            .build()
            .unwrap();

        let service = factory.get_bean_as::<Service>("service").unwrap();
        assert_eq!(
            service.events,
            vec!["before", "after_properties_set", "start", "after"]
        );
    }

    #[test]
    fn failed_init_is_lifecycle_error_and_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));

        let factory = BeanFactory::new();
        factory
            .register_bean_definition(
                "beanT",
                BeanDefinition::builder::<T>()
                    .init_method("check", {
                        let attempts = Arc::clone(&attempts);
                        move |_: &mut T| {
                            if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                                Err("not ready")
                            } else {
                                Ok(())
                            }
                        }
                    })
                    .must_build(),
            )
            .unwrap();

        match factory.get_bean("beanT").unwrap_err() {
            TarkibError::LifecycleFailed { name, phase, .. } => {
                assert_eq!(name, "beanT");
                assert_eq!(phase, "initialization");
            }
            other => panic!("Expected LifecycleFailed, got: {other:?}"),
        }
        assert!(factory.get_bean("beanT").is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn destroy_runs_newest_first() {
        #[derive(Default)]
        struct First;
        #[derive(Default)]
        struct Second {
            first: Option<Arc<First>>,
        }

        let destroyed = Arc::new(Mutex::new(Vec::new()));
        let log = |label: &'static str| {
            let destroyed = Arc::clone(&destroyed);
            move || destroyed.lock().push(label)
        };

        let factory = BeanFactory::new();
        let first = log("first");
        factory
            .register_bean_definition(
                "first",
                BeanDefinition::builder::<First>()
                    .destroy_method("close", move |_: &First| first())
                    .must_build(),
            )
            .unwrap();
        let second = log("second");
        factory
            .register_bean_definition(
                "second",
                BeanDefinition::builder::<Second>()
                    .autowire("first", "first", |s: &mut Second| &mut s.first)
                    .destroy_method("close", move |_: &Second| second())
                    .must_build(),
            )
            .unwrap();

        factory.get_bean("second").unwrap();
        factory.destroy_singletons();
        assert_eq!(*destroyed.lock(), vec!["second", "first"]);

        // a new instance after destruction
        factory.get_bean("first").unwrap();
        factory.destroy_singletons();
        assert_eq!(destroyed.lock().len(), 3);
    }

    #[test]
    fn removing_definition_evicts_singleton() {
        let factory = BeanFactory::new();
        factory.register_bean_definition("beanT", t_definition()).unwrap();
        factory.properties().set("val", &1).unwrap();
        let first = factory.get_bean("beanT").unwrap();

        factory.remove_bean_definition("beanT").unwrap();
        assert!(factory.get_bean("beanT").is_err());

        factory.register_bean_definition("beanT", t_definition()).unwrap();
        let second = factory.get_bean("beanT").unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }

    /// A singleton whose init method parks until released, counting destroys.
    fn gated_definition(entered: Arc<Barrier>, release: Arc<Barrier>, destroyed: Arc<AtomicUsize>) -> BeanDefinition {
        BeanDefinition::builder::<T>()
            .init_method("open", move |_: &mut T| {
                entered.wait();
                release.wait();
                Ok::<_, BoxError>(())
            })
            .destroy_method("close", move |_: &T| {
                destroyed.fetch_add(1, Ordering::SeqCst);
            })
            .must_build()
    }

    #[test]
    fn destroy_keeps_singleton_under_construction() {
        let entered = Arc::new(Barrier::new(2));
        let release = Arc::new(Barrier::new(2));
        let destroyed = Arc::new(AtomicUsize::new(0));

        let factory = BeanFactory::new();
        factory
            .register_bean_definition(
                "gated",
                gated_definition(Arc::clone(&entered), Arc::clone(&release), Arc::clone(&destroyed)),
            )
            .unwrap();

        let first = std::thread::scope(|scope| {
            let handle = scope.spawn(|| factory.get_bean("gated").unwrap());
            entered.wait();
            factory.destroy_singletons();
            release.wait();
            handle.join().unwrap()
        });
        assert_eq!(destroyed.load(Ordering::SeqCst), 0);

        // still cached, destroyed on the next call
        assert!(Arc::ptr_eq(&first, &factory.get_bean("gated").unwrap()));
        factory.destroy_singletons();
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn removal_during_construction_destroys_later() {
        let entered = Arc::new(Barrier::new(2));
        let release = Arc::new(Barrier::new(2));
        let destroyed = Arc::new(AtomicUsize::new(0));

        let factory = BeanFactory::new();
        factory
            .register_bean_definition(
                "gated",
                gated_definition(Arc::clone(&entered), Arc::clone(&release), Arc::clone(&destroyed)),
            )
            .unwrap();

        std::thread::scope(|scope| {
            let handle = scope.spawn(|| factory.get_bean("gated").unwrap());
            entered.wait();
            factory.remove_bean_definition("gated").unwrap();
            release.wait();
            handle.join().unwrap();
        });
        assert_eq!(destroyed.load(Ordering::SeqCst), 0);
        assert!(factory.get_bean("gated").is_err());

        factory.destroy_singletons();
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn prototypes_are_never_cached() {
        let factory = BeanFactory::new();
        factory
            .register_bean_definition("proto", t_definition_with(Scope::Prototype))
            .unwrap();
        factory.properties().set("val", &3).unwrap();

        factory.get_bean("proto").unwrap();
        let definition = factory.definitions().get_bean_definition("proto").unwrap();
        assert!(!factory.is_cached(&definition));
        assert!(factory.singletons.is_empty());
    }

    #[test]
    fn concurrent_singleton_created_once() {
        let created = Arc::new(AtomicUsize::new(0));

        let factory = BeanFactory::new();
        factory
            .register_bean_definition(
                "slow",
                BeanDefinition::constructed({
                    let created = Arc::clone(&created);
                    move |_: &[String]| {
                        created.fetch_add(1, Ordering::SeqCst);
                        std::thread::sleep(std::time::Duration::from_millis(20));
                        Ok(T { v: 1 })
                    }
                })
                .must_build(),
            )
            .unwrap();

        let instances: Vec<BeanInstance> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| factory.get_bean("slow").unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(created.load(Ordering::SeqCst), 1);
        assert!(instances.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[test]
    fn builder_reports_first_registration_error() {
        let result = BeanFactory::builder()
            .alias("a", "x")
            .alias("b", "x")
            .alias("c", "x")
            .build();

        match result.unwrap_err() {
            TarkibError::Conflict(e) => assert_eq!(e.requested_for.as_deref(), Some("b")),
            other => panic!("Expected Conflict, got: {other:?}"),
        }
    }

    #[test]
    fn debug_display() {
        let factory = BeanFactory::new();
        factory.register_bean_definition("beanT", t_definition()).unwrap();

        let debug = format!("{factory:?}");
        assert!(debug.contains("BeanFactory"));
        assert!(debug.contains("definitions: 1"));
    }
}
