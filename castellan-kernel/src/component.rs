//! Type-erased building blocks shared by the whole kernel. Rust has no runtime reflection, so every
//! piece of type information needed at resolution time is captured when a component is described:
//! a [ServiceType] identifies what is being asked for, an [InstancePtr] holds what was built, and a
//! [CastFunction] bridges the two.
//!
//! ## Advertising services
//!
//! A component implementation `I` can be advertised as a service `S` when `S: ServiceDowncast<I>`.
//! Every concrete type is trivially its own service. Trait objects need an explicit alias, which
//! can be declared with the [service_alias](crate::service_alias) macro:
//!
//! ```
//! use castellan_kernel::service_alias;
//!
//! trait Greeter: Send + Sync {
//!     fn greet(&self) -> String;
//! }
//!
//! struct EnglishGreeter;
//!
//! impl Greeter for EnglishGreeter {
//!     fn greet(&self) -> String {
//!         "Hello".to_string()
//!     }
//! }
//!
//! service_alias!(EnglishGreeter => dyn Greeter);
//! ```

use derivative::Derivative;
use std::any::{type_name, Any, TypeId};
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Type-erased pointer to a live component instance.
pub type InstancePtr = Arc<dyn Any + Send + Sync>;

/// Freshly constructed instance, still exclusively owned by the activator.
pub type InstanceBox = Box<dyn Any + Send + Sync>;

/// Casts a type-erased implementation instance to a boxed `Arc<Service>`. Since the service type is
/// not known in the kernel, the result is type-erased once more and needs to be downcast by the
/// caller, who knows what to expect. On failure, the original instance is returned.
pub type CastFunction = fn(instance: InstancePtr) -> Result<Box<dyn Any>, InstancePtr>;

/// Generic information about a closed generic service, e.g. `dyn Repository<User>`.
#[derive(Clone, Debug)]
pub struct GenericType {
    /// Name shared by all closed versions of the same open generic service.
    pub definition: &'static str,
    /// Ordered type arguments.
    pub arguments: Vec<ServiceType>,
}

struct OpenGeneric;

/// Identity of a service or implementation type. Equality and hashing only take the [TypeId] into
/// account.
#[derive(Clone, Debug)]
pub struct ServiceType {
    id: TypeId,
    name: &'static str,
    generic: Option<Arc<GenericType>>,
}

impl ServiceType {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
            generic: None,
        }
    }

    /// Creates a service type carrying generic information, which allows resolving it from an open
    /// generic registration.
    pub fn generic<T: GenericService + ?Sized>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
            generic: Some(Arc::new(GenericType {
                definition: T::DEFINITION,
                arguments: T::generic_arguments(),
            })),
        }
    }

    /// Creates the identity of an open generic service. All open generic services share the same
    /// [TypeId] and are told apart by their definition.
    pub fn open_generic(definition: &'static str) -> Self {
        Self {
            id: TypeId::of::<OpenGeneric>(),
            name: definition,
            generic: Some(Arc::new(GenericType {
                definition,
                arguments: vec![],
            })),
        }
    }

    #[inline]
    pub fn id(&self) -> TypeId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn generic_type(&self) -> Option<&GenericType> {
        self.generic.as_deref()
    }

    #[inline]
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

impl PartialEq for ServiceType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ServiceType {}

impl Hash for ServiceType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Display for ServiceType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

/// Capability of generic services which can be served by open generic registrations. All closed
/// versions of a service share the same `DEFINITION` and differ in their arguments.
///
/// ```
/// use castellan_kernel::component::{GenericService, ServiceType};
///
/// trait Repository<T>: Send + Sync {}
///
/// impl<T: 'static> GenericService for dyn Repository<T> {
///     const DEFINITION: &'static str = "Repository";
///
///     fn generic_arguments() -> Vec<ServiceType> {
///         vec![ServiceType::of::<T>()]
///     }
/// }
/// ```
pub trait GenericService: 'static {
    const DEFINITION: &'static str;

    fn generic_arguments() -> Vec<ServiceType>;
}

/// Allows advertising implementation `I` as service `Self`. Implemented for every concrete type as
/// its own service, and for trait objects via [service_alias](crate::service_alias).
pub trait ServiceDowncast<I: 'static>: 'static {
    fn downcast(instance: InstancePtr) -> Result<Arc<Self>, InstancePtr>;
}

impl<T: Send + Sync + 'static> ServiceDowncast<T> for T {
    #[inline]
    fn downcast(instance: InstancePtr) -> Result<Arc<Self>, InstancePtr> {
        instance.downcast::<T>()
    }
}

/// Declares that an implementation can be advertised as a `dyn Trait` service.
#[macro_export]
macro_rules! service_alias {
    ($implementation:ty => $service:ty) => {
        impl $crate::component::ServiceDowncast<$implementation> for $service {
            fn downcast(
                instance: $crate::component::InstancePtr,
            ) -> Result<std::sync::Arc<Self>, $crate::component::InstancePtr> {
                instance
                    .downcast::<$implementation>()
                    .map(|instance| instance as std::sync::Arc<Self>)
            }
        }
    };
}

/// [CastFunction] advertising `I` as `S`.
pub fn cast_to<S: ServiceDowncast<I> + ?Sized, I: 'static>(
    instance: InstancePtr,
) -> Result<Box<dyn Any>, InstancePtr> {
    S::downcast(instance).map(|instance| Box::new(instance) as Box<dyn Any>)
}

/// [CastFunction] which never succeeds. Used by components which are never resolved directly.
pub fn no_cast(instance: InstancePtr) -> Result<Box<dyn Any>, InstancePtr> {
    Err(instance)
}

fn unwrap_shared<T: ?Sized + Send + Sync + 'static>(
    instance: InstancePtr,
) -> Result<Box<dyn Any>, InstancePtr> {
    instance
        .downcast::<Arc<T>>()
        .map(|outer| Box::new(Arc::clone(&*outer)) as Box<dyn Any>)
}

/// Returns the address of the data an [Arc] points to, which is stable for the whole lifetime of
/// the allocation and the same for every service view of a given instance.
#[inline]
pub fn instance_address<T: ?Sized>(instance: &Arc<T>) -> usize {
    Arc::as_ptr(instance) as *const () as usize
}

/// An instance together with the knowledge of how to view it as the service it advertises. This is
/// the unit passed around as inline argument, default value, resolved dependency and resolution
/// result.
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct ComponentValue {
    #[derivative(Debug = "ignore")]
    pub instance: InstancePtr,
    #[derivative(Debug = "ignore")]
    pub cast: CastFunction,
    pub service: ServiceType,
}

impl ComponentValue {
    /// Wraps a plain value, advertised as its own type.
    pub fn new<T: Send + Sync + 'static>(value: T) -> Self {
        Self {
            instance: Arc::new(value) as InstancePtr,
            cast: cast_to::<T, T>,
            service: ServiceType::of::<T>(),
        }
    }

    /// Wraps an existing implementation instance advertised as service `S`.
    pub fn from_arc<S, I>(instance: Arc<I>) -> Self
    where
        S: ServiceDowncast<I> + ?Sized,
        I: Send + Sync + 'static,
    {
        Self {
            instance: instance as InstancePtr,
            cast: cast_to::<S, I>,
            service: ServiceType::of::<S>(),
        }
    }

    /// Wraps an already type-erased service pointer, e.g. `Arc<dyn Trait>`. The resulting value is
    /// distinct from the pointer itself, so it should not be used for instances which are later
    /// released.
    pub fn shared<T: ?Sized + Send + Sync + 'static>(instance: Arc<T>) -> Self {
        Self {
            instance: Arc::new(instance) as InstancePtr,
            cast: unwrap_shared::<T>,
            service: ServiceType::of::<T>(),
        }
    }

    /// Returns a copy advertising a different service.
    pub fn with_service(mut self, service: ServiceType, cast: CastFunction) -> Self {
        self.service = service;
        self.cast = cast;
        self
    }

    /// Views the instance as `Arc<T>`, if it advertises `T`.
    pub fn downcast<T: ?Sized + 'static>(&self) -> Option<Arc<T>> {
        (self.cast)(self.instance.clone())
            .ok()
            .and_then(|service| service.downcast::<Arc<T>>().ok())
            .map(|service| *service)
    }

    /// Returns textual content, if the wrapped value is a string.
    pub fn as_text(&self) -> Option<&str> {
        self.instance
            .downcast_ref::<String>()
            .map(String::as_str)
            .or_else(|| self.instance.downcast_ref::<&'static str>().copied())
    }

    #[inline]
    pub fn address(&self) -> usize {
        instance_address(&self.instance)
    }
}
