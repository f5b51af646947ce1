use std::error::Error;
use std::sync::Arc;
use thiserror::Error;

/// Shared pointer to an arbitrary error produced by user code, e.g. a constructor or a lifecycle
/// hook.
pub type ErrorPtr = Arc<dyn Error + Send + Sync>;

/// Wraps any error in an [ErrorPtr].
pub fn convert_error<E: Error + Send + Sync + 'static>(error: E) -> ErrorPtr {
    Arc::new(error) as ErrorPtr
}

/// Errors raised while registering components. Always surfaced at registration time.
#[derive(Error, Clone, Eq, PartialEq, Debug)]
pub enum RegistrationError {
    #[error("Component name cannot be empty.")]
    EmptyComponentName,
    #[error("Attempted to register a duplicated component with name: {0}")]
    DuplicateComponentName(String),
    #[error("Component '{component}' has abstract implementation {implementation} and neither a custom activator nor interceptors to build it.")]
    AbstractImplementation {
        component: String,
        implementation: String,
    },
    #[error("Component '{component}' declares a malformed dependency: {reason}")]
    MalformedDependency { component: String, reason: String },
    #[error("Component '{0}' is generic and needs a closer function.")]
    MissingGenericCloser(String),
    #[error("Component '{component}' uses unknown lifestyle: {lifestyle}")]
    UnknownLifestyle { component: String, lifestyle: String },
    #[error("Cannot register components in a disposed kernel.")]
    KernelDisposed,
}

/// Errors raised by user code while building or configuring an instance.
#[derive(Error, Clone, Debug)]
pub enum ActivationError {
    #[error("Error creating instance of {implementation} for component '{component}': {source}")]
    Instantiation {
        component: String,
        implementation: String,
        source: ErrorPtr,
    },
    #[error("Error setting property {property} on type {implementation}, component id is {component}: {source}")]
    PropertySetter {
        property: String,
        implementation: String,
        component: String,
        source: ErrorPtr,
    },
    #[error("Error running commission concern on {implementation} for component '{component}': {source}")]
    Commission {
        component: String,
        implementation: String,
        source: ErrorPtr,
    },
    #[error("Error creating proxy for component '{component}': {source}")]
    Proxy { component: String, source: ErrorPtr },
    #[error("Component '{component}' has no constructor and cannot be created without a proxy.")]
    NoConstructor { component: String },
}

/// Errors raised while converting textual values to dependency types.
#[derive(Error, Clone, Eq, PartialEq, Debug)]
pub enum ConversionError {
    #[error("No converter registered for type {0}")]
    UnsupportedType(String),
    #[error("Cannot convert '{value}' to {target}: {reason}")]
    InvalidFormat {
        value: String,
        target: String,
        reason: String,
    },
}

/// Errors raised when accessing resolved constructor arguments with the wrong type or position.
#[derive(Error, Clone, Eq, PartialEq, Debug)]
pub enum ArgumentError {
    #[error("Missing constructor argument at position {0}")]
    MissingArgument(usize),
    #[error("Constructor argument '{name}' is not of type {expected}")]
    IncompatibleArgument { name: String, expected: String },
}

/// Errors raised when a component cannot be resolved.
#[derive(Error, Clone, Debug)]
pub enum ResolutionError {
    #[error("No component registered for service {0}")]
    NoComponentForService(String),
    #[error("Cannot find named component: {0}")]
    NoNamedComponent(String),
    #[error("Can't create component '{component}' as it has dependencies to be satisfied: {}", .missing.join(", "))]
    WaitingDependency {
        component: String,
        missing: Vec<String>,
    },
    #[error("Dependency cycle detected while resolving '{component}': {}", .path.join(" -> "))]
    CircularDependency {
        component: String,
        path: Vec<String>,
    },
    #[error("Component '{component}' has no resolvable constructor for {implementation}")]
    NoResolvableConstructor {
        component: String,
        implementation: String,
    },
    #[error("Cannot resolve dependency {dependency} of component '{component}' (resolution path: {})", .path.join(" -> "))]
    UnresolvableDependency {
        component: String,
        dependency: String,
        path: Vec<String>,
    },
    #[error("Component '{0}' is invalid and cannot be resolved.")]
    InvalidComponent(String),
    #[error("Component '{component}' has abstract implementation {implementation} which cannot be instantiated without a proxy.")]
    AbstractImplementation {
        component: String,
        implementation: String,
    },
    #[error("Tried to downcast component '{component}' to incompatible type: {target}")]
    IncompatibleComponent { component: String, target: String },
    #[error("Maximum resolution depth of {max_depth} exceeded while resolving '{component}'")]
    DepthExceeded { component: String, max_depth: usize },
    #[error("Generic component '{0}' requires generic arguments, but none were provided.")]
    MissingGenericArguments(String),
    #[error("Generic component '{component}' cannot be closed over [{}]", .arguments.join(", "))]
    CannotCloseGeneric {
        component: String,
        arguments: Vec<String>,
    },
    #[error("Cannot resolve components from a disposed kernel.")]
    KernelDisposed,
    #[error(transparent)]
    Registration(#[from] RegistrationError),
    #[error(transparent)]
    Activation(#[from] ActivationError),
    #[error(transparent)]
    Conversion(#[from] ConversionError),
}
