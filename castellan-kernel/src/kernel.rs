//! The [Kernel] is the central registry of components. It turns [ComponentModels](ComponentModel)
//! into [handlers](crate::handler::Handler), keeps their states up to date as components come and go, and serves
//! resolution and release requests.
//!
//! ```
//! use castellan_kernel::component_model::dependency::{ConstructorCandidate, DependencyModel};
//! use castellan_kernel::component_model::ComponentModel;
//! use castellan_kernel::component::InstanceBox;
//! use castellan_kernel::kernel::KernelBuilder;
//! use std::sync::Arc;
//!
//! #[derive(Default)]
//! struct Repository;
//!
//! struct Service {
//!     repository: Arc<Repository>,
//! }
//!
//! let kernel = KernelBuilder::new().build();
//!
//! kernel
//!     .register(
//!         ComponentModel::of::<Repository>("repository")
//!             .with_constructor(ConstructorCandidate::default_of::<Repository>()),
//!     )
//!     .unwrap();
//!
//! kernel
//!     .register(
//!         ComponentModel::of::<Service>("service").with_constructor(
//!             ConstructorCandidate::new(|arguments| {
//!                 Ok(Box::new(Service {
//!                     repository: arguments.service::<Repository>(0)?,
//!                 }) as InstanceBox)
//!             })
//!             .with_dependency(DependencyModel::service::<Repository>()),
//!         ),
//!     )
//!     .unwrap();
//!
//! let service = kernel.resolve::<Service>().unwrap();
//! let repository = kernel.resolve::<Repository>().unwrap();
//! assert!(Arc::ptr_eq(&service.repository, &repository));
//! ```

use crate::activator::{ComponentActivatorPtr, DefaultComponentActivator, ExternalInstanceActivator};
use crate::component::{instance_address, ComponentValue, GenericService, ServiceDowncast, ServiceType};
use crate::component_model::contributor::{
    ComponentModelContributorPtr, DefaultLifestyleContributor, LifestyleConfigurationContributor,
};
use crate::component_model::dependency::DependencyType;
use crate::component_model::{ComponentModel, Lifestyle};
use crate::context::{Arguments, CreationContext, DEFAULT_MAX_DEPTH};
use crate::conversion::DefaultConversionManager;
use crate::error::{RegistrationError, ResolutionError};
use crate::handler::default::DefaultHandler;
use crate::handler::forwarding::ForwardingHandler;
use crate::handler::generic::GenericHandler;
use crate::handler::{HandlerId, HandlerPtr, HandlerState};
use crate::kernel::registry::NamingRegistry;
use crate::lifestyle::{
    LifestyleManagerFactoryPtr, LifestyleManagerPtr, PerThreadLifestyleManager,
    SingletonLifestyleManager, TransientLifestyleManager,
};
use crate::proxy::{NoProxyFactory, ProxyFactoryPtr};
use crate::release::{LifecycledComponentsReleasePolicy, NoTrackingReleasePolicy, ReleasePolicyPtr};
use crate::resolver::{generic_arguments, DependencyResolver, SubDependencyResolverPtr};
use fxhash::{FxHashMap, FxHashSet};
use itertools::Itertools;
use parking_lot::{Mutex, RwLock};
use std::any::type_name;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Which release policy a kernel uses.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub enum ReleasePolicyKind {
    /// Track instances requiring decommission until they are released.
    #[default]
    Lifecycled,
    /// Never track instances.
    NoTracking,
}

impl FromStr for ReleasePolicyKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "lifecycled" => Ok(Self::Lifecycled),
            "no_tracking" | "notracking" => Ok(Self::NoTracking),
            _ => Err(format!("Unknown release policy: {value}")),
        }
    }
}

/// Kernel behavior settings.
#[derive(Clone, Debug)]
pub struct KernelConfig {
    /// Lifestyle of components which don't specify one.
    pub default_lifestyle: Lifestyle,
    /// Maximum number of nested handler resolutions in a single request.
    pub max_resolution_depth: usize,
    pub release_policy: ReleasePolicyKind,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            default_lifestyle: Lifestyle::Singleton,
            max_resolution_depth: DEFAULT_MAX_DEPTH,
            release_policy: ReleasePolicyKind::Lifecycled,
        }
    }
}

/// Builder for [Kernels](Kernel) with customized extension points.
pub struct KernelBuilder {
    config: KernelConfig,
    release_policy: Option<ReleasePolicyPtr>,
    proxy_factory: ProxyFactoryPtr,
    sub_resolvers: Vec<SubDependencyResolverPtr>,
    contributors: Vec<ComponentModelContributorPtr>,
    lifestyle_factories: FxHashMap<String, LifestyleManagerFactoryPtr>,
}

impl Default for KernelBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl KernelBuilder {
    pub fn new() -> Self {
        Self {
            config: Default::default(),
            release_policy: None,
            proxy_factory: Arc::new(NoProxyFactory),
            sub_resolvers: vec![],
            contributors: vec![],
            lifestyle_factories: Default::default(),
        }
    }

    pub fn with_config(mut self, config: KernelConfig) -> Self {
        self.config = config;
        self
    }

    /// Uses a custom release policy instead of the configured one.
    pub fn with_release_policy(mut self, release_policy: ReleasePolicyPtr) -> Self {
        self.release_policy = Some(release_policy);
        self
    }

    pub fn with_proxy_factory(mut self, proxy_factory: ProxyFactoryPtr) -> Self {
        self.proxy_factory = proxy_factory;
        self
    }

    pub fn with_sub_resolver(mut self, resolver: SubDependencyResolverPtr) -> Self {
        self.sub_resolvers.push(resolver);
        self
    }

    /// Adds a contributor run after the built-in ones.
    pub fn with_contributor(mut self, contributor: ComponentModelContributorPtr) -> Self {
        self.contributors.push(contributor);
        self
    }

    pub fn with_lifestyle_factory<N: ToString>(
        mut self,
        name: N,
        factory: LifestyleManagerFactoryPtr,
    ) -> Self {
        self.lifestyle_factories.insert(name.to_string(), factory);
        self
    }

    pub fn build(self) -> Kernel {
        let release_policy = self.release_policy.unwrap_or_else(|| match self.config.release_policy {
            ReleasePolicyKind::Lifecycled => {
                Arc::new(LifecycledComponentsReleasePolicy::default()) as ReleasePolicyPtr
            }
            ReleasePolicyKind::NoTracking => Arc::new(NoTrackingReleasePolicy),
        });

        let resolver = DependencyResolver::new(Arc::new(DefaultConversionManager::default()));
        for sub_resolver in self.sub_resolvers {
            resolver.add_sub_resolver(sub_resolver);
        }

        let mut contributors: Vec<ComponentModelContributorPtr> = vec![
            Arc::new(LifestyleConfigurationContributor),
            Arc::new(DefaultLifestyleContributor::new(
                self.config.default_lifestyle.clone(),
            )),
        ];
        contributors.extend(self.contributors);

        Kernel {
            config: self.config,
            registry: Default::default(),
            registration_lock: Mutex::new(()),
            resolver,
            release_policy,
            proxy_factory: self.proxy_factory,
            lifestyle_factories: RwLock::new(self.lifestyle_factories),
            contributors: RwLock::new(contributors),
            disposed: AtomicBool::new(false),
        }
    }
}

/// Registry and resolution engine for components. All operations take `&self` and can be called
/// concurrently. Disposing the kernel (explicitly or on drop) releases everything it tracks.
pub struct Kernel {
    config: KernelConfig,
    registry: RwLock<NamingRegistry>,
    // serializes registrations and the state evaluation which follows them
    registration_lock: Mutex<()>,
    resolver: DependencyResolver,
    release_policy: ReleasePolicyPtr,
    proxy_factory: ProxyFactoryPtr,
    lifestyle_factories: RwLock<FxHashMap<String, LifestyleManagerFactoryPtr>>,
    contributors: RwLock<Vec<ComponentModelContributorPtr>>,
    disposed: AtomicBool,
}

impl Kernel {
    #[inline]
    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    #[inline]
    pub fn resolver(&self) -> &DependencyResolver {
        &self.resolver
    }

    #[inline]
    pub fn release_policy(&self) -> &ReleasePolicyPtr {
        &self.release_policy
    }

    #[inline]
    pub fn proxy_factory(&self) -> &ProxyFactoryPtr {
        &self.proxy_factory
    }

    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    pub fn add_sub_resolver(&self, resolver: SubDependencyResolverPtr) {
        self.resolver.add_sub_resolver(resolver);
        self.update_handler_states();
    }

    /// Adds a contributor for models registered from now on.
    pub fn add_contributor(&self, contributor: ComponentModelContributorPtr) {
        self.contributors.write().push(contributor);
    }

    pub fn add_lifestyle_factory<N: ToString>(&self, name: N, factory: LifestyleManagerFactoryPtr) {
        self.lifestyle_factories
            .write()
            .insert(name.to_string(), factory);
    }

    /// Adds conversion of textual parameters to `T`.
    pub fn add_converter<T>(&self)
    where
        T: FromStr + Send + Sync + 'static,
        T::Err: Display,
    {
        self.resolver.converter().add_from_str::<T>();
        self.update_handler_states();
    }

    /// Creates a context for a new top-level resolution.
    pub fn create_context(&self) -> CreationContext {
        CreationContext::new(self.release_policy.clone())
            .with_max_depth(self.config.max_resolution_depth)
    }

    /// Runs all contributors on given model.
    pub fn contribute(&self, model: &mut ComponentModel) {
        let contributors = self.contributors.read().clone();
        for contributor in contributors {
            contributor.process_model(self, model);
        }
    }

    pub fn create_activator(&self, model: &Arc<ComponentModel>) -> ComponentActivatorPtr {
        match &model.custom_activator {
            Some(factory) => factory(model.clone(), self),
            None => Arc::new(DefaultComponentActivator::new(
                model.clone(),
                self.proxy_factory.clone(),
            )),
        }
    }

    pub fn create_lifestyle_manager(
        &self,
        model: &Arc<ComponentModel>,
        activator: ComponentActivatorPtr,
    ) -> Result<LifestyleManagerPtr, RegistrationError> {
        Ok(match &model.lifestyle {
            Lifestyle::Undefined | Lifestyle::Singleton => {
                Arc::new(SingletonLifestyleManager::new(activator)) as LifestyleManagerPtr
            }
            Lifestyle::Transient => Arc::new(TransientLifestyleManager::new(activator)),
            Lifestyle::PerThread => Arc::new(PerThreadLifestyleManager::new(activator)),
            Lifestyle::Custom(name) => self
                .lifestyle_factories
                .read()
                .get(name)
                .ok_or_else(|| RegistrationError::UnknownLifestyle {
                    component: model.name.clone(),
                    lifestyle: name.clone(),
                })?
                .create(model, activator),
        })
    }

    fn validate(&self, model: &ComponentModel) -> Result<(), RegistrationError> {
        if model.name.is_empty() {
            return Err(RegistrationError::EmptyComponentName);
        }

        if model.abstract_implementation
            && !model.has_custom_activator()
            && model.interceptors.is_empty()
        {
            return Err(RegistrationError::AbstractImplementation {
                component: model.name.clone(),
                implementation: model.implementation.to_string(),
            });
        }

        let is_open_generic = model
            .service
            .generic_type()
            .map_or(false, |generic| generic.arguments.is_empty());
        if is_open_generic && !model.requires_generic_arguments() {
            return Err(RegistrationError::MissingGenericCloser(model.name.clone()));
        }

        if let Some(dependency) = model.all_dependencies().find(|dependency| {
            dependency.dependency_type == DependencyType::ServiceOverride
                && dependency.dependency_key.is_none()
        }) {
            return Err(RegistrationError::MalformedDependency {
                component: model.name.clone(),
                reason: format!("service override {dependency} needs a component name"),
            });
        }

        Ok(())
    }

    /// Registers a component. Contributors process the model first, then it's validated and a
    /// handler is created. States of all handlers are re-evaluated afterwards.
    pub fn register(&self, model: ComponentModel) -> Result<(), RegistrationError> {
        if self.is_disposed() {
            return Err(RegistrationError::KernelDisposed);
        }

        let mut model = model;
        self.contribute(&mut model);
        self.validate(&model)?;

        let model = Arc::new(model);

        {
            let _guard = self.registration_lock.lock();
            if self.registry.read().contains(&model.name) {
                return Err(RegistrationError::DuplicateComponentName(model.name.clone()));
            }

            let handler: HandlerPtr = if model.requires_generic_arguments() {
                Arc::new(GenericHandler::new(model.clone()))
            } else {
                DefaultHandler::new(model.clone(), self)?
            };

            let forwarding = model
                .forwarded_services
                .iter()
                .map(|forwarded| {
                    Arc::new(ForwardingHandler::new(
                        handler.clone(),
                        forwarded.service.clone(),
                        forwarded.cast,
                    )) as HandlerPtr
                })
                .collect_vec();

            self.registry.write().add(handler, forwarding);

            debug!(
                component = %model.name,
                service = %model.service,
                lifestyle = %model.lifestyle,
                "Registered component."
            );

            self.evaluate_handler_states();
        }

        Ok(())
    }

    /// Registers an existing instance as a singleton component.
    pub fn register_instance<S, I>(
        &self,
        name: impl Into<String>,
        instance: Arc<I>,
    ) -> Result<(), RegistrationError>
    where
        S: ServiceDowncast<I> + ?Sized,
        I: Send + Sync + 'static,
    {
        let value = ComponentValue::from_arc::<S, I>(instance);
        self.register(
            ComponentModel::new::<S, I>(name)
                .with_lifestyle(Lifestyle::Singleton)
                .with_activator(Arc::new(move |_: Arc<ComponentModel>, _: &Kernel| {
                    Arc::new(ExternalInstanceActivator::new(value.clone())) as ComponentActivatorPtr
                })),
        )
    }

    /// Removes a component and disposes instances kept by its lifestyle. Components depending on
    /// it go back to waiting for dependencies.
    pub fn remove_component(&self, name: &str) -> bool {
        let handler = {
            let _guard = self.registration_lock.lock();
            let handler = self.registry.write().remove(name);
            if handler.is_some() {
                self.evaluate_handler_states();
            }

            handler
        };

        match handler {
            Some(handler) => {
                handler.set_state(HandlerState::Invalid, vec![]);
                handler.dispose();
                debug!(component = name, "Removed component.");
                true
            }
            None => false,
        }
    }

    fn update_handler_states(&self) {
        let _guard = self.registration_lock.lock();
        self.evaluate_handler_states();
    }

    /// Computes the largest set of handlers which can be valid together: starting with all of
    /// them, handlers with dependencies unsatisfiable by the remaining ones are removed until
    /// nothing changes.
    fn evaluate_handler_states(&self) {
        let handlers = self.registry.read().handlers();
        let mut valid: FxHashSet<HandlerId> = handlers.iter().map(|handler| handler.id()).collect();
        let mut missing: FxHashMap<HandlerId, Vec<String>> = Default::default();

        loop {
            let context = CreationContext::for_state_evaluation(valid.clone());
            let failed = handlers
                .iter()
                .filter(|handler| valid.contains(&handler.id()))
                .filter_map(|handler| {
                    let dependencies = handler.evaluate_dependencies(self, &context);
                    (!dependencies.is_empty()).then(|| (handler.id(), dependencies))
                })
                .collect_vec();

            if failed.is_empty() {
                break;
            }

            for (id, dependencies) in failed {
                valid.remove(&id);
                missing.insert(id, dependencies);
            }
        }

        for handler in &handlers {
            let (state, dependencies) = if valid.contains(&handler.id()) {
                (HandlerState::Valid, vec![])
            } else {
                (
                    HandlerState::WaitingDependency,
                    missing.remove(&handler.id()).unwrap_or_default(),
                )
            };

            if handler.current_state() != state {
                debug!(
                    component = %handler.component_model().name,
                    ?state,
                    missing = ?dependencies,
                    "Component state changed."
                );
            }

            handler.set_state(state, dependencies);
        }
    }

    pub fn has_component(&self, name: &str) -> bool {
        self.registry.read().contains(name)
    }

    /// Returns the primary handler of a named component.
    pub fn handler(&self, name: &str) -> Option<HandlerPtr> {
        self.registry.read().get(name)
    }

    /// Returns handlers advertising given service, in registration order.
    pub fn handlers_for(&self, service: &ServiceType) -> Vec<HandlerPtr> {
        self.registry.read().for_service(service)
    }

    /// Returns handlers of open generic components with given definition.
    pub fn generic_handlers(&self, definition: &str) -> Vec<HandlerPtr> {
        self.registry.read().for_definition(definition)
    }

    /// Returns the handler of a named component advertising given service, directly or through a
    /// forwarded service.
    pub fn handler_for_name_and_service(
        &self,
        name: &str,
        service: &ServiceType,
    ) -> Option<HandlerPtr> {
        self.handlers_for(service)
            .into_iter()
            .find(|handler| handler.component_model().name == name)
    }

    /// Returns the handler used for resolving given service: the first usable one, or the first
    /// registered one if none is usable. Closed generic services fall back to open generic
    /// components.
    pub fn handler_for_service(&self, service: &ServiceType) -> Option<HandlerPtr> {
        let handlers = self.handlers_for(service);
        let index = handlers
            .iter()
            .position(|handler| handler.current_state() == HandlerState::Valid)
            .unwrap_or(0);

        handlers.into_iter().nth(index).or_else(|| {
            service
                .generic_type()
                .and_then(|generic| self.generic_handlers(generic.definition).into_iter().next())
        })
    }

    /// Returns names and missing dependencies of all components waiting for dependencies.
    pub fn waiting_components(&self) -> Vec<(String, Vec<String>)> {
        self.registry
            .read()
            .handlers()
            .into_iter()
            .filter(|handler| handler.current_state() == HandlerState::WaitingDependency)
            .map(|handler| {
                (
                    handler.component_model().name.clone(),
                    handler.missing_dependencies(),
                )
            })
            .collect_vec()
    }

    fn check_disposed(&self) -> Result<(), ResolutionError> {
        if self.is_disposed() {
            Err(ResolutionError::KernelDisposed)
        } else {
            Ok(())
        }
    }

    /// Resolves given service with a handler in given context.
    pub fn resolve_with_handler(
        &self,
        handler: &HandlerPtr,
        service: &ServiceType,
        context: &mut CreationContext,
    ) -> Result<ComponentValue, ResolutionError> {
        self.check_disposed()?;

        let generic_arguments = if handler.component_model().requires_generic_arguments() {
            generic_arguments(service)
        } else {
            vec![]
        };

        let mut context = context.generic_scope(generic_arguments);
        handler.resolve(self, &mut context)
    }

    /// Resolves given service in given context.
    pub fn resolve_service(
        &self,
        service: &ServiceType,
        context: &mut CreationContext,
    ) -> Result<ComponentValue, ResolutionError> {
        self.check_disposed()?;

        let handler = self
            .handler_for_service(service)
            .ok_or_else(|| ResolutionError::NoComponentForService(service.to_string()))?;

        self.resolve_with_handler(&handler, service, context)
    }

    fn downcast<T: ?Sized + 'static>(value: ComponentValue) -> Result<Arc<T>, ResolutionError> {
        value
            .downcast::<T>()
            .ok_or_else(|| ResolutionError::IncompatibleComponent {
                component: value.service.to_string(),
                target: type_name::<T>().to_string(),
            })
    }

    /// Resolves the default component for service `T`.
    pub fn resolve<T: ?Sized + 'static>(&self) -> Result<Arc<T>, ResolutionError> {
        self.resolve_with::<T>(Arguments::new())
    }

    /// Resolves the default component for service `T`, using explicit values for its dependencies.
    pub fn resolve_with<T: ?Sized + 'static>(
        &self,
        arguments: Arguments,
    ) -> Result<Arc<T>, ResolutionError> {
        let mut context = self.create_context().with_arguments(arguments);
        self.resolve_service(&ServiceType::of::<T>(), &mut context)
            .and_then(Self::downcast)
    }

    /// Resolves a closed generic service, falling back to open generic components.
    pub fn resolve_generic<T: GenericService + ?Sized>(&self) -> Result<Arc<T>, ResolutionError> {
        let mut context = self.create_context();
        self.resolve_service(&ServiceType::generic::<T>(), &mut context)
            .and_then(Self::downcast)
    }

    /// Resolves a named component as service `T`.
    pub fn resolve_named<T: ?Sized + 'static>(&self, name: &str) -> Result<Arc<T>, ResolutionError> {
        self.resolve_named_with::<T>(name, Arguments::new())
    }

    pub fn resolve_named_with<T: ?Sized + 'static>(
        &self,
        name: &str,
        arguments: Arguments,
    ) -> Result<Arc<T>, ResolutionError> {
        let service = ServiceType::of::<T>();
        let handler = self
            .handler_for_name_and_service(name, &service)
            .ok_or_else(|| {
                if self.has_component(name) {
                    ResolutionError::IncompatibleComponent {
                        component: name.to_string(),
                        target: service.to_string(),
                    }
                } else {
                    ResolutionError::NoNamedComponent(name.to_string())
                }
            })?;

        let mut context = self.create_context().with_arguments(arguments);
        self.resolve_with_handler(&handler, &service, &mut context)
            .and_then(Self::downcast)
    }

    /// Resolves all valid components advertising service `T`, in registration order.
    pub fn resolve_all<T: ?Sized + 'static>(&self) -> Result<Vec<Arc<T>>, ResolutionError> {
        let service = ServiceType::of::<T>();
        self.handlers_for(&service)
            .into_iter()
            .filter(|handler| handler.current_state() == HandlerState::Valid)
            .map(|handler| {
                let mut context = self.create_context();
                self.resolve_with_handler(&handler, &service, &mut context)
                    .and_then(Self::downcast)
            })
            .try_collect()
    }

    /// Releases an instance returned by the kernel. Instances which are not tracked, e.g.
    /// singletons, are unaffected.
    pub fn release<T: ?Sized>(&self, instance: &Arc<T>) {
        self.release_policy.release(instance_address(instance));
    }

    pub fn release_value(&self, value: &ComponentValue) {
        self.release_policy.release(value.address());
    }

    /// Checks if an instance is tracked by the release policy.
    pub fn is_tracked<T: ?Sized>(&self, instance: &Arc<T>) -> bool {
        self.release_policy.has_track(instance_address(instance))
    }

    /// Releases all tracked instances and disposes all handlers, in reverse registration order.
    /// Only the first call has any effect.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        debug!("Disposing kernel.");

        self.release_policy.dispose();

        let handlers = self.registry.read().handlers();
        for handler in handlers.iter().rev() {
            handler.dispose();
        }
    }
}

impl Drop for Kernel {
    fn drop(&mut self) {
        self.dispose();
    }
}

mod registry {
    use crate::component::ServiceType;
    use crate::handler::HandlerPtr;
    use fxhash::FxHashMap;
    use std::any::TypeId;

    #[derive(Default)]
    pub(super) struct NamingRegistry {
        by_name: FxHashMap<String, HandlerPtr>,
        by_service: FxHashMap<TypeId, Vec<HandlerPtr>>,
        by_definition: FxHashMap<&'static str, Vec<HandlerPtr>>,
        ordered: Vec<HandlerPtr>,
    }

    impl NamingRegistry {
        pub(super) fn contains(&self, name: &str) -> bool {
            self.by_name.contains_key(name)
        }

        pub(super) fn get(&self, name: &str) -> Option<HandlerPtr> {
            self.by_name.get(name).cloned()
        }

        pub(super) fn for_service(&self, service: &ServiceType) -> Vec<HandlerPtr> {
            self.by_service
                .get(&service.id())
                .cloned()
                .unwrap_or_default()
        }

        pub(super) fn for_definition(&self, definition: &str) -> Vec<HandlerPtr> {
            self.by_definition
                .get(definition)
                .cloned()
                .unwrap_or_default()
        }

        /// Primary handlers in registration order.
        pub(super) fn handlers(&self) -> Vec<HandlerPtr> {
            self.ordered.clone()
        }

        pub(super) fn add(&mut self, handler: HandlerPtr, forwarding: Vec<HandlerPtr>) {
            let model = handler.component_model().clone();

            match &model.generic {
                Some(generic) => self
                    .by_definition
                    .entry(generic.definition)
                    .or_default()
                    .push(handler.clone()),
                None => self
                    .by_service
                    .entry(model.service.id())
                    .or_default()
                    .push(handler.clone()),
            }

            for forwarded in forwarding {
                self.by_service
                    .entry(forwarded.service().id())
                    .or_default()
                    .push(forwarded);
            }

            self.by_name.insert(model.name.clone(), handler.clone());
            self.ordered.push(handler);
        }

        pub(super) fn remove(&mut self, name: &str) -> Option<HandlerPtr> {
            let handler = self.by_name.remove(name)?;
            let belongs = |other: &HandlerPtr| other.component_model().name == name;

            self.ordered.retain(|other| !belongs(other));
            for handlers in self.by_service.values_mut() {
                handlers.retain(|other| !belongs(other));
            }
            for handlers in self.by_definition.values_mut() {
                handlers.retain(|other| !belongs(other));
            }

            Some(handler)
        }
    }
}
