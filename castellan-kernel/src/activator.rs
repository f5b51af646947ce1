//! Activators build and destroy component instances. The [DefaultComponentActivator] selects the
//! best constructor, resolves its arguments, injects properties and runs commission concerns.
//! Components can provide a custom activator, e.g. a [FactoryMethodActivator] building instances
//! with a closure.

use crate::component::{ComponentValue, InstanceBox, InstancePtr};
use crate::component_model::dependency::{ConstructorArguments, ConstructorCandidate};
use crate::component_model::{ComponentModel, FactoryMethod, InspectionBehavior};
use crate::context::CreationContext;
use crate::error::{ActivationError, ErrorPtr, ResolutionError};
use crate::kernel::Kernel;
use crate::proxy::ProxyFactoryPtr;
use crate::release::ReleasePolicy;
#[cfg(test)]
use mockall::automock;
use std::any::Any;
use std::sync::Arc;
use tracing::trace;

/// Builds and destroys instances of a single component.
#[cfg_attr(test, automock)]
pub trait ComponentActivator: Send + Sync {
    fn create(
        &self,
        kernel: &Kernel,
        context: &mut CreationContext,
    ) -> Result<ComponentValue, ResolutionError>;

    /// Runs decommission concerns of an instance which is being let go.
    fn destroy(&self, instance: &InstancePtr);
}

pub type ComponentActivatorPtr = Arc<dyn ComponentActivator>;

// Lets go of dependencies resolved for an instance which failed to build.
fn release_resolved<'a>(
    policy: &dyn ReleasePolicy,
    values: impl IntoIterator<Item = &'a ComponentValue>,
) {
    for value in values {
        policy.release(value.address());
    }
}

fn finish_instance(
    model: &ComponentModel,
    mut instance: InstanceBox,
) -> Result<ComponentValue, ResolutionError> {
    model
        .lifecycle
        .commission(&mut *instance)
        .map_err(|source| ActivationError::Commission {
            component: model.name.clone(),
            implementation: model.implementation.to_string(),
            source,
        })?;

    Ok(ComponentValue {
        instance: Arc::from(instance),
        cast: model.cast,
        service: model.service.clone(),
    })
}

/// Activator using constructors declared by the component model.
pub struct DefaultComponentActivator {
    model: Arc<ComponentModel>,
    proxy_factory: ProxyFactoryPtr,
}

impl DefaultComponentActivator {
    pub fn new(model: Arc<ComponentModel>, proxy_factory: ProxyFactoryPtr) -> Self {
        Self {
            model,
            proxy_factory,
        }
    }

    fn proxy_error(&self, source: ErrorPtr) -> ResolutionError {
        ActivationError::Proxy {
            component: self.model.name.clone(),
            source,
        }
        .into()
    }

    /// Scores a candidate: 100 points for every resolvable dependency and 1 for every dependency
    /// falling back to its default value. Returns `None` if any dependency cannot be satisfied.
    fn score(
        &self,
        kernel: &Kernel,
        context: &CreationContext,
        candidate: &ConstructorCandidate,
    ) -> Option<usize> {
        let resolver = kernel.resolver();
        candidate
            .dependencies
            .iter()
            .try_fold(0, |points, dependency| {
                if resolver.can_resolve(kernel, context, &self.model, dependency) {
                    Some(points + 100)
                } else if dependency.has_default_value() {
                    Some(points + 1)
                } else {
                    None
                }
            })
    }

    fn select_constructor(
        &self,
        kernel: &Kernel,
        context: &CreationContext,
    ) -> Result<&ConstructorCandidate, ResolutionError> {
        match self.model.constructors.as_slice() {
            [] => Err(ActivationError::NoConstructor {
                component: self.model.name.clone(),
            }
            .into()),
            [single] => Ok(single),
            candidates => {
                // ties keep the first declared candidate
                let mut winner: Option<(usize, &ConstructorCandidate)> = None;
                for candidate in candidates {
                    if let Some(points) = self.score(kernel, context, candidate) {
                        if winner.map_or(true, |(best, _)| points > best) {
                            winner = Some((points, candidate));
                        }
                    }
                }

                winner.map(|(_, candidate)| candidate).ok_or_else(|| {
                    ResolutionError::NoResolvableConstructor {
                        component: self.model.name.clone(),
                        implementation: self.model.implementation.to_string(),
                    }
                })
            }
        }
    }

    fn create_arguments(
        &self,
        kernel: &Kernel,
        context: &mut CreationContext,
        candidate: &ConstructorCandidate,
    ) -> Result<ConstructorArguments, ResolutionError> {
        let resolver = kernel.resolver();
        let policy = context.release_policy().clone();
        let mut values = Vec::with_capacity(candidate.dependencies.len());

        for dependency in &candidate.dependencies {
            let value = {
                let mut scope = context.track_dependency(dependency);
                resolver.resolve(kernel, &mut scope, &self.model, dependency)
            };

            match value {
                Ok(value) => values.push((dependency.describe(), value)),
                Err(error) => {
                    release_resolved(
                        &*policy,
                        values.iter().filter_map(|(_, value)| value.as_ref()),
                    );
                    return Err(error);
                }
            }
        }

        Ok(ConstructorArguments::new(values))
    }

    /// Builds a bare instance and returns it together with the constructor arguments it was built
    /// from.
    fn instantiate(
        &self,
        kernel: &Kernel,
        context: &mut CreationContext,
    ) -> Result<(InstanceBox, Vec<ComponentValue>), ResolutionError> {
        let candidate = self.select_constructor(kernel, context)?;
        let arguments = self.create_arguments(kernel, context, candidate)?;
        let instance = (candidate.constructor)(&arguments);
        let values = arguments.into_values();

        match instance {
            Ok(instance) => Ok((instance, values)),
            Err(source) => {
                release_resolved(&**context.release_policy(), &values);
                Err(ActivationError::Instantiation {
                    component: self.model.name.clone(),
                    implementation: self.model.implementation.to_string(),
                    source,
                }
                .into())
            }
        }
    }

    fn set_properties(
        &self,
        kernel: &Kernel,
        context: &mut CreationContext,
        instance: &mut (dyn Any + Send + Sync),
        resolved: &mut Vec<ComponentValue>,
    ) -> Result<(), ResolutionError> {
        if self.model.inspection_behavior == InspectionBehavior::None {
            return Ok(());
        }

        let resolver = kernel.resolver();
        for property in &self.model.properties {
            let dependency = &property.dependency;
            if dependency.is_optional
                && !resolver.can_resolve(kernel, context, &self.model, dependency)
            {
                continue;
            }

            let value = {
                let mut scope = context.track_dependency(dependency);
                resolver.resolve(kernel, &mut scope, &self.model, dependency)?
            };

            if let Some(value) = value {
                resolved.push(value.clone());
                (property.setter)(&mut *instance, value).map_err(|source| {
                    ActivationError::PropertySetter {
                        property: property.name.clone(),
                        implementation: self.model.implementation.to_string(),
                        component: self.model.name.clone(),
                        source,
                    }
                })?;
            }
        }

        Ok(())
    }
}

impl ComponentActivator for DefaultComponentActivator {
    fn create(
        &self,
        kernel: &Kernel,
        context: &mut CreationContext,
    ) -> Result<ComponentValue, ResolutionError> {
        let proxied = self.proxy_factory.should_create_proxy(&self.model);
        if proxied && !self.proxy_factory.requires_target_instance(&self.model) {
            return self
                .proxy_factory
                .create(kernel, &self.model, None)
                .map_err(|source| self.proxy_error(source));
        }

        if self.model.abstract_implementation {
            return Err(ResolutionError::AbstractImplementation {
                component: self.model.name.clone(),
                implementation: self.model.implementation.to_string(),
            });
        }

        let (mut instance, mut resolved) = self.instantiate(kernel, context)?;
        let value = self
            .set_properties(kernel, context, &mut *instance, &mut resolved)
            .and_then(|_| finish_instance(&self.model, instance));

        let value = match value {
            Ok(value) => value,
            Err(error) => {
                release_resolved(&**context.release_policy(), &resolved);
                return Err(error);
            }
        };
        trace!(component = %self.model.name, "Created instance.");

        if proxied {
            self.proxy_factory
                .create(kernel, &self.model, Some(value))
                .map_err(|source| self.proxy_error(source))
        } else {
            Ok(value)
        }
    }

    fn destroy(&self, instance: &InstancePtr) {
        let instance = self
            .proxy_factory
            .unproxied_instance(instance)
            .unwrap_or_else(|| instance.clone());

        self.model
            .lifecycle
            .decommission(&self.model.name, &*instance);
    }
}

/// Activator building instances with a [FactoryMethod]. Commission concerns are applied to the
/// instances it returns, so concerns matching their runtime type take effect.
pub struct FactoryMethodActivator {
    model: Arc<ComponentModel>,
    method: FactoryMethod,
}

impl FactoryMethodActivator {
    pub fn new(model: Arc<ComponentModel>, method: FactoryMethod) -> Self {
        Self { model, method }
    }
}

impl ComponentActivator for FactoryMethodActivator {
    fn create(
        &self,
        kernel: &Kernel,
        context: &mut CreationContext,
    ) -> Result<ComponentValue, ResolutionError> {
        let instance =
            (self.method)(kernel, context).map_err(|source| ActivationError::Instantiation {
                component: self.model.name.clone(),
                implementation: self.model.implementation.to_string(),
                source,
            })?;

        finish_instance(&self.model, instance)
    }

    fn destroy(&self, instance: &InstancePtr) {
        self.model
            .lifecycle
            .decommission(&self.model.name, &**instance);
    }
}

/// Activator returning an instance created outside of the kernel. Such instances are never
/// decommissioned by the kernel.
pub struct ExternalInstanceActivator {
    instance: ComponentValue,
}

impl ExternalInstanceActivator {
    pub fn new(instance: ComponentValue) -> Self {
        Self { instance }
    }
}

impl ComponentActivator for ExternalInstanceActivator {
    fn create(
        &self,
        _kernel: &Kernel,
        _context: &mut CreationContext,
    ) -> Result<ComponentValue, ResolutionError> {
        Ok(self.instance.clone())
    }

    fn destroy(&self, _instance: &InstancePtr) {}
}

#[cfg(test)]
mod tests {
    use crate::activator::{ComponentActivator, DefaultComponentActivator};
    use crate::component::{ComponentValue, InstanceBox};
    use crate::component_model::dependency::{
        ConstructorArguments, ConstructorCandidate, DependencyModel,
    };
    use crate::component_model::ComponentModel;
    use crate::context::{Arguments, CreationContext};
    use crate::error::{ErrorPtr, ResolutionError};
    use crate::kernel::KernelBuilder;
    use crate::proxy::{MockProxyFactory, NoProxyFactory};
    use std::sync::Arc;

    #[derive(Debug)]
    struct Greeting(String);

    fn build_greeting(arguments: &ConstructorArguments) -> Result<InstanceBox, ErrorPtr> {
        Ok(Box::new(Greeting(arguments.value::<String>(0)?)) as InstanceBox)
    }

    fn build_default_greeting(_arguments: &ConstructorArguments) -> Result<InstanceBox, ErrorPtr> {
        Ok(Box::new(Greeting("default".to_string())) as InstanceBox)
    }

    #[test]
    fn should_prefer_resolvable_constructor() {
        let kernel = KernelBuilder::new().build();
        let model = Arc::new(
            ComponentModel::of::<Greeting>("greeting")
                .with_constructor(ConstructorCandidate::new(build_default_greeting))
                .with_constructor(
                    ConstructorCandidate::new(build_greeting)
                        .with_dependency(DependencyModel::parameter::<String, _>("text")),
                ),
        );
        let activator = DefaultComponentActivator::new(model, Arc::new(NoProxyFactory));

        let value = activator
            .create(&kernel, &mut CreationContext::empty())
            .unwrap();
        assert_eq!(value.downcast::<Greeting>().unwrap().0, "default");

        let mut context = CreationContext::empty()
            .with_arguments(Arguments::new().with_named("text", "hello".to_string()));
        let value = activator.create(&kernel, &mut context).unwrap();
        assert_eq!(value.downcast::<Greeting>().unwrap().0, "hello");
    }

    fn build_optional_greeting(arguments: &ConstructorArguments) -> Result<InstanceBox, ErrorPtr> {
        let text = arguments
            .optional_service::<u64>(0)?
            .map(|value| value.to_string())
            .unwrap_or_else(|| "optional".to_string());
        Ok(Box::new(Greeting(text)) as InstanceBox)
    }

    fn build_other_greeting(_arguments: &ConstructorArguments) -> Result<InstanceBox, ErrorPtr> {
        Ok(Box::new(Greeting("other".to_string())) as InstanceBox)
    }

    #[test]
    fn should_skip_constructor_with_unresolvable_optional_dependency() {
        let kernel = KernelBuilder::new().build();
        let model = Arc::new(
            ComponentModel::of::<Greeting>("greeting")
                .with_constructor(ConstructorCandidate::new(build_default_greeting))
                .with_constructor(
                    ConstructorCandidate::new(build_optional_greeting)
                        .with_dependency(DependencyModel::service::<u64>().optional()),
                ),
        );
        let activator = DefaultComponentActivator::new(model, Arc::new(NoProxyFactory));

        let value = activator
            .create(&kernel, &mut CreationContext::empty())
            .unwrap();
        assert_eq!(value.downcast::<Greeting>().unwrap().0, "default");

        let mut context =
            CreationContext::empty().with_arguments(Arguments::new().with_typed(7u64));
        let value = activator.create(&kernel, &mut context).unwrap();
        assert_eq!(value.downcast::<Greeting>().unwrap().0, "7");
    }

    #[test]
    fn should_keep_first_declared_constructor_on_tie() {
        let kernel = KernelBuilder::new().build();
        let model = Arc::new(
            ComponentModel::of::<Greeting>("greeting")
                .with_constructor(ConstructorCandidate::new(build_other_greeting))
                .with_constructor(ConstructorCandidate::new(build_default_greeting))
                .with_constructor(
                    ConstructorCandidate::new(build_optional_greeting)
                        .with_dependency(DependencyModel::service::<u64>().optional()),
                ),
        );
        let activator = DefaultComponentActivator::new(model, Arc::new(NoProxyFactory));

        let value = activator
            .create(&kernel, &mut CreationContext::empty())
            .unwrap();
        assert_eq!(value.downcast::<Greeting>().unwrap().0, "other");
    }

    #[test]
    fn should_reject_abstract_implementation() {
        let kernel = KernelBuilder::new().build();
        let model = Arc::new(ComponentModel::of::<Greeting>("greeting").as_abstract());
        let activator = DefaultComponentActivator::new(model, Arc::new(NoProxyFactory));

        assert!(matches!(
            activator.create(&kernel, &mut CreationContext::empty()),
            Err(ResolutionError::AbstractImplementation { .. })
        ));
    }

    #[test]
    fn should_create_proxy_without_target() {
        let mut proxy_factory = MockProxyFactory::new();
        proxy_factory.expect_should_create_proxy().return_const(true);
        proxy_factory
            .expect_requires_target_instance()
            .return_const(false);
        proxy_factory
            .expect_create()
            .withf(|_, _, target| target.is_none())
            .returning(|_, _, _| Ok(ComponentValue::new(Greeting("proxy".to_string()))));

        let kernel = KernelBuilder::new().build();
        let model = Arc::new(ComponentModel::of::<Greeting>("greeting").as_abstract());
        let activator = DefaultComponentActivator::new(model, Arc::new(proxy_factory));

        let value = activator
            .create(&kernel, &mut CreationContext::empty())
            .unwrap();
        assert_eq!(value.downcast::<Greeting>().unwrap().0, "proxy");
    }

    #[test]
    fn should_fail_without_constructor() {
        let kernel = KernelBuilder::new().build();
        let model = Arc::new(ComponentModel::of::<Greeting>("greeting"));
        let activator = DefaultComponentActivator::new(model, Arc::new(NoProxyFactory));

        assert!(matches!(
            activator.create(&kernel, &mut CreationContext::empty()),
            Err(ResolutionError::Activation(_))
        ));
    }
}
