//! Static description of registered components. A [ComponentModel] is built by the registration
//! layer, passed through all [contributors](contributor::ComponentModelContributor), and then frozen
//! behind an [Arc] for the rest of its life.
//!
//! ```
//! use castellan_kernel::component_model::dependency::{ConstructorCandidate, DependencyModel};
//! use castellan_kernel::component_model::{ComponentModel, Lifestyle};
//! use castellan_kernel::component::InstanceBox;
//! use castellan_kernel::service_alias;
//! use std::sync::Arc;
//!
//! trait Clock: Send + Sync {}
//!
//! #[derive(Default)]
//! struct SystemClock;
//!
//! impl Clock for SystemClock {}
//!
//! service_alias!(SystemClock => dyn Clock);
//!
//! struct Scheduler {
//!     clock: Arc<dyn Clock>,
//! }
//!
//! let clock = ComponentModel::new::<dyn Clock, SystemClock>("clock")
//!     .with_constructor(ConstructorCandidate::default_of::<SystemClock>());
//!
//! let scheduler = ComponentModel::of::<Scheduler>("scheduler")
//!     .with_lifestyle(Lifestyle::Transient)
//!     .with_constructor(
//!         ConstructorCandidate::new(|arguments| {
//!             Ok(Box::new(Scheduler {
//!                 clock: arguments.service::<dyn Clock>(0)?,
//!             }) as InstanceBox)
//!         })
//!         .with_dependency(DependencyModel::service::<dyn Clock>()),
//!     );
//! ```

pub mod configuration;
pub mod contributor;
pub mod dependency;
pub mod lifecycle;

use crate::activator::{ComponentActivatorPtr, FactoryMethodActivator};
use crate::component::{
    cast_to, no_cast, CastFunction, ComponentValue, InstanceBox, ServiceDowncast, ServiceType,
};
use crate::component_model::configuration::Configuration;
use crate::component_model::dependency::{ConstructorCandidate, DependencyModel, PropertyTarget};
use crate::component_model::lifecycle::{
    CommissionConcern, DecommissionConcern, LifecycleConcerns,
};
use crate::context::{Arguments, CreationContext};
use crate::error::ErrorPtr;
use crate::kernel::Kernel;
use derivative::Derivative;
use fxhash::FxHashMap;
use std::any::Any;
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;

/// Name of the built-in singleton lifestyle.
pub const SINGLETON: &str = "singleton";

/// Name of the built-in transient lifestyle.
pub const TRANSIENT: &str = "transient";

/// Name of the built-in per-thread lifestyle.
pub const PER_THREAD: &str = "per_thread";

/// Policy governing instance sharing.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Default)]
pub enum Lifestyle {
    /// Not decided yet. Contributors replace it with the configured default.
    #[default]
    Undefined,
    /// One instance for the whole lifetime of the kernel.
    Singleton,
    /// A new instance on every request.
    Transient,
    /// One instance per calling thread.
    PerThread,
    /// Lifestyle provided by a named [LifestyleManagerFactory](crate::lifestyle::LifestyleManagerFactory).
    Custom(String),
}

impl FromStr for Lifestyle {
    type Err = Infallible;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(match value.trim().to_lowercase().as_str() {
            "" | "undefined" => Self::Undefined,
            SINGLETON => Self::Singleton,
            TRANSIENT => Self::Transient,
            PER_THREAD | "perthread" => Self::PerThread,
            _ => Self::Custom(value.trim().to_string()),
        })
    }
}

impl Display for Lifestyle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Undefined => f.write_str("undefined"),
            Self::Singleton => f.write_str(SINGLETON),
            Self::Transient => f.write_str(TRANSIENT),
            Self::PerThread => f.write_str(PER_THREAD),
            Self::Custom(name) => f.write_str(name),
        }
    }
}

/// Which properties should be injected after construction.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub enum InspectionBehavior {
    /// Treated as [InspectionBehavior::All].
    #[default]
    Undefined,
    /// Properties are never injected.
    None,
    /// All declared properties are injected.
    All,
}

/// Reference to an interceptor applied by the proxy factory.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum InterceptorReference {
    Named(String),
    Service(ServiceType),
}

impl InterceptorReference {
    pub fn named<N: ToString>(name: N) -> Self {
        Self::Named(name.to_string())
    }

    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::Service(ServiceType::of::<T>())
    }
}

/// Additional service advertised by the same implementation instance.
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct ForwardedService {
    pub service: ServiceType,
    #[derivative(Debug = "ignore")]
    pub cast: CastFunction,
}

/// Creates a closed model for given type arguments, or returns `None` if the implementation cannot
/// be closed over them.
pub type GenericCloser = fn(arguments: &[ServiceType]) -> Option<ComponentModel>;

/// Open generic registration data.
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct GenericDefinition {
    pub definition: &'static str,
    #[derivative(Debug = "ignore")]
    pub closer: GenericCloser,
}

/// Creates a custom activator for a frozen model.
pub type ActivatorFactory =
    Arc<dyn Fn(Arc<ComponentModel>, &Kernel) -> ComponentActivatorPtr + Send + Sync>;

/// Builds instances instead of a constructor.
pub type FactoryMethod =
    Arc<dyn Fn(&Kernel, &mut CreationContext) -> Result<InstanceBox, ErrorPtr> + Send + Sync>;

/// Arbitrary data attached to a model, shared between contributors and activators.
pub type ExtendedProperty = Arc<dyn Any + Send + Sync>;

/// Description of one registered component.
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct ComponentModel {
    /// Unique component name.
    pub name: String,
    pub service: ServiceType,
    pub implementation: ServiceType,
    /// Abstract implementations need a custom activator or a proxy to be built.
    pub abstract_implementation: bool,
    /// Casts implementation instances to the advertised service.
    #[derivative(Debug = "ignore")]
    pub cast: CastFunction,
    pub lifestyle: Lifestyle,
    pub inspection_behavior: InspectionBehavior,
    pub constructors: Vec<ConstructorCandidate>,
    pub properties: Vec<PropertyTarget>,
    /// Additional dependencies which need to be satisfiable for the component to be valid.
    pub dependencies: Vec<DependencyModel>,
    pub interceptors: Vec<InterceptorReference>,
    pub lifecycle: LifecycleConcerns,
    #[derivative(Debug = "ignore")]
    pub custom_activator: Option<ActivatorFactory>,
    pub extended_properties: FxHashMap<String, ExtendedProperty>,
    pub configuration: Option<Configuration>,
    /// Values taking precedence over registered components, by key or by type.
    pub custom_dependencies: Arguments,
    pub generic: Option<GenericDefinition>,
    pub forwarded_services: Vec<ForwardedService>,
}

impl ComponentModel {
    fn with_types(
        name: String,
        service: ServiceType,
        implementation: ServiceType,
        cast: CastFunction,
    ) -> Self {
        Self {
            name,
            service,
            implementation,
            abstract_implementation: false,
            cast,
            lifestyle: Lifestyle::Undefined,
            inspection_behavior: InspectionBehavior::Undefined,
            constructors: vec![],
            properties: vec![],
            dependencies: vec![],
            interceptors: vec![],
            lifecycle: Default::default(),
            custom_activator: None,
            extended_properties: Default::default(),
            configuration: None,
            custom_dependencies: Default::default(),
            generic: None,
            forwarded_services: vec![],
        }
    }

    /// Creates a model for implementation `I` advertised as service `S`.
    pub fn new<S, I>(name: impl Into<String>) -> Self
    where
        S: ServiceDowncast<I> + ?Sized,
        I: Send + Sync + 'static,
    {
        Self::with_types(
            name.into(),
            ServiceType::of::<S>(),
            ServiceType::of::<I>(),
            cast_to::<S, I>,
        )
    }

    /// Creates a model for implementation `I` advertised as itself.
    pub fn of<I: Send + Sync + 'static>(name: impl Into<String>) -> Self {
        Self::new::<I, I>(name)
    }

    /// Creates a model built by a factory method. The concrete type of created instances is
    /// considered unknown, so the implementation is abstract.
    pub fn factory<S, I, F>(name: impl Into<String>, factory: F) -> Self
    where
        S: ServiceDowncast<I> + ?Sized,
        I: Send + Sync + 'static,
        F: Fn(&Kernel) -> Result<I, ErrorPtr> + Send + Sync + 'static,
    {
        let mut model = Self::new::<S, I>(name);
        model.implementation = ServiceType::of::<S>();
        model.abstract_implementation = true;
        model.with_factory_method(Arc::new(move |kernel: &Kernel, _: &mut CreationContext| {
            factory(kernel).map(|instance| Box::new(instance) as InstanceBox)
        }))
    }

    /// Creates an open generic model, which is closed on demand for concrete type arguments.
    pub fn open_generic(
        name: impl Into<String>,
        definition: &'static str,
        closer: GenericCloser,
    ) -> Self {
        let service = ServiceType::open_generic(definition);
        let mut model = Self::with_types(name.into(), service.clone(), service, no_cast);
        model.generic = Some(GenericDefinition { definition, closer });
        model
    }

    pub fn with_lifestyle(mut self, lifestyle: Lifestyle) -> Self {
        self.lifestyle = lifestyle;
        self
    }

    pub fn with_inspection_behavior(mut self, inspection_behavior: InspectionBehavior) -> Self {
        self.inspection_behavior = inspection_behavior;
        self
    }

    pub fn with_constructor(mut self, constructor: ConstructorCandidate) -> Self {
        self.add_constructor(constructor);
        self
    }

    pub fn with_property(mut self, property: PropertyTarget) -> Self {
        self.add_property(property);
        self
    }

    pub fn with_dependency(mut self, dependency: DependencyModel) -> Self {
        self.add_dependency(dependency);
        self
    }

    pub fn with_interceptor(mut self, interceptor: InterceptorReference) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn with_commission(mut self, concern: CommissionConcern) -> Self {
        self.lifecycle.add_commission(concern);
        self
    }

    pub fn with_decommission(mut self, concern: DecommissionConcern) -> Self {
        self.lifecycle.add_decommission(concern);
        self
    }

    pub fn with_activator(mut self, factory: ActivatorFactory) -> Self {
        self.custom_activator = Some(factory);
        self
    }

    /// Uses given factory method instead of constructors.
    pub fn with_factory_method(self, method: FactoryMethod) -> Self {
        self.with_activator(Arc::new(move |model: Arc<ComponentModel>, _: &Kernel| {
            Arc::new(FactoryMethodActivator::new(model, method.clone())) as ComponentActivatorPtr
        }))
    }

    pub fn with_extended_property<K: ToString>(mut self, key: K, value: ExtendedProperty) -> Self {
        self.extended_properties.insert(key.to_string(), value);
        self
    }

    pub fn with_configuration(mut self, configuration: Configuration) -> Self {
        self.configuration = Some(configuration);
        self
    }

    /// Binds a dependency key to a fixed value for this component only.
    pub fn with_custom_dependency<K: ToString>(mut self, key: K, value: ComponentValue) -> Self {
        self.custom_dependencies = self.custom_dependencies.with_named_value(key, value);
        self
    }

    /// Binds a dependency type to a fixed value for this component only.
    pub fn with_custom_typed_dependency(mut self, value: ComponentValue) -> Self {
        self.custom_dependencies = self.custom_dependencies.with_typed_value(value);
        self
    }

    /// Advertises the same implementation as an additional service.
    pub fn with_forwarded_service<S, I>(mut self) -> Self
    where
        S: ServiceDowncast<I> + ?Sized,
        I: 'static,
    {
        self.forwarded_services.push(ForwardedService {
            service: ServiceType::of::<S>(),
            cast: cast_to::<S, I>,
        });
        self
    }

    /// Marks the implementation as abstract.
    pub fn as_abstract(mut self) -> Self {
        self.abstract_implementation = true;
        self
    }

    pub fn add_constructor(&mut self, constructor: ConstructorCandidate) {
        self.constructors.push(constructor);
    }

    pub fn add_property(&mut self, property: PropertyTarget) {
        self.properties.push(property);
    }

    /// Adds a dependency unless an equal one is already present.
    pub fn add_dependency(&mut self, dependency: DependencyModel) {
        if !self.dependencies.contains(&dependency) {
            self.dependencies.push(dependency);
        }
    }

    #[inline]
    pub fn requires_generic_arguments(&self) -> bool {
        self.generic.is_some()
    }

    #[inline]
    pub fn has_custom_activator(&self) -> bool {
        self.custom_activator.is_some()
    }

    /// Returns a typed extended property.
    pub fn extended_property<T: Send + Sync + 'static>(&self, key: &str) -> Option<Arc<T>> {
        self.extended_properties
            .get(key)
            .cloned()
            .and_then(|property| property.downcast::<T>().ok())
    }

    /// Returns all dependencies which might influence whether the component can be built.
    pub fn all_dependencies(&self) -> impl Iterator<Item = &DependencyModel> {
        self.constructors
            .iter()
            .flat_map(|constructor| constructor.dependencies.iter())
            .chain(self.properties.iter().map(|property| &property.dependency))
            .chain(self.dependencies.iter())
    }
}
