//! Dependency resolution. For every dependency, the [DependencyResolver] tries the following
//! sources in order, using the first which can provide a value:
//!
//! 1. inline arguments of the current [CreationContext], by key and then by type
//! 2. custom dependencies of the component model
//! 3. configuration parameters of the component model, where `${name}` references another
//!    component
//! 4. registered [SubDependencyResolvers](SubDependencyResolver), in registration order
//! 5. components registered in the kernel, by name and then by service
//! 6. the default value of the dependency
//!
//! Optional dependencies which cannot be satisfied resolve to `None`.

pub mod list;

use crate::component::{ComponentValue, ServiceType};
use crate::component_model::configuration::service_reference;
use crate::component_model::dependency::{DependencyModel, DependencyType};
use crate::component_model::ComponentModel;
use crate::context::CreationContext;
use crate::conversion::{DefaultConversionManager, TypeConverter};
use crate::error::ResolutionError;
use crate::handler::HandlerPtr;
use crate::kernel::Kernel;
use itertools::Itertools;
#[cfg(test)]
use mockall::automock;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::trace;

/// Additional source of dependency values, consulted before kernel components.
#[cfg_attr(test, automock)]
pub trait SubDependencyResolver: Send + Sync {
    fn can_resolve(
        &self,
        kernel: &Kernel,
        context: &CreationContext,
        model: &ComponentModel,
        dependency: &DependencyModel,
    ) -> bool;

    /// Returns a value for given dependency. Only called when
    /// [can_resolve](Self::can_resolve) returned `true`.
    fn resolve(
        &self,
        kernel: &Kernel,
        context: &mut CreationContext,
        model: &ComponentModel,
        dependency: &DependencyModel,
    ) -> Result<Option<ComponentValue>, ResolutionError>;
}

pub type SubDependencyResolverPtr = Arc<dyn SubDependencyResolver>;

pub struct DependencyResolver {
    sub_resolvers: RwLock<Vec<SubDependencyResolverPtr>>,
    converter: Arc<DefaultConversionManager>,
}

impl DependencyResolver {
    pub fn new(converter: Arc<DefaultConversionManager>) -> Self {
        Self {
            sub_resolvers: Default::default(),
            converter,
        }
    }

    pub fn add_sub_resolver(&self, resolver: SubDependencyResolverPtr) {
        self.sub_resolvers.write().push(resolver);
    }

    #[inline]
    pub fn converter(&self) -> &Arc<DefaultConversionManager> {
        &self.converter
    }

    // snapshot, so resolvers can be added while resolving
    fn sub_resolvers(&self) -> Vec<SubDependencyResolverPtr> {
        self.sub_resolvers.read().clone()
    }

    /// Checks if given dependency can be satisfied without falling back to its default value.
    pub fn can_resolve(
        &self,
        kernel: &Kernel,
        context: &CreationContext,
        model: &ComponentModel,
        dependency: &DependencyModel,
    ) -> bool {
        let converter = &*self.converter;

        context
            .additional_arguments()
            .can_satisfy(dependency, converter)
            || model.custom_dependencies.can_satisfy(dependency, converter)
            || self.can_resolve_from_configuration(kernel, context, model, dependency)
            || self
                .sub_resolvers()
                .iter()
                .any(|resolver| resolver.can_resolve(kernel, context, model, dependency))
            || Self::find_handler(kernel, context, model, dependency, true).is_some()
    }

    /// Resolves given dependency. Fails if a required dependency cannot be satisfied.
    pub fn resolve(
        &self,
        kernel: &Kernel,
        context: &mut CreationContext,
        model: &ComponentModel,
        dependency: &DependencyModel,
    ) -> Result<Option<ComponentValue>, ResolutionError> {
        let converter = &*self.converter;

        if let Some(value) = context
            .additional_arguments()
            .find(dependency, converter)?
        {
            return Ok(Some(value));
        }

        if let Some(value) = model.custom_dependencies.find(dependency, converter)? {
            return Ok(Some(value));
        }

        if let Some(value) = self.resolve_from_configuration(kernel, context, model, dependency)? {
            return Ok(Some(value));
        }

        for resolver in self.sub_resolvers() {
            if resolver.can_resolve(kernel, context, model, dependency) {
                if let Some(value) = resolver.resolve(kernel, context, model, dependency)? {
                    return Ok(Some(value));
                }
            }
        }

        if let Some(value) = Self::resolve_from_kernel(kernel, context, model, dependency)? {
            return Ok(Some(value));
        }

        if let Some(value) = &dependency.default_value {
            trace!(component = %model.name, %dependency, "Using default value.");
            return Ok(Some(value.clone()));
        }

        if dependency.is_optional {
            trace!(component = %model.name, %dependency, "Optional dependency is absent.");
            return Ok(None);
        }

        Err(ResolutionError::UnresolvableDependency {
            component: model.name.clone(),
            dependency: dependency.describe(),
            path: context.resolution_path(),
        })
    }

    fn configured_value<'a>(
        model: &'a ComponentModel,
        dependency: &DependencyModel,
    ) -> Option<&'a str> {
        let key = dependency.dependency_key.as_deref()?;
        model.configuration.as_ref()?.parameter(key)
    }

    fn can_resolve_from_configuration(
        &self,
        kernel: &Kernel,
        context: &CreationContext,
        model: &ComponentModel,
        dependency: &DependencyModel,
    ) -> bool {
        match Self::configured_value(model, dependency) {
            Some(value) => match service_reference(value) {
                Some(name) => kernel
                    .handler_for_name_and_service(name, &dependency.target_type)
                    .map_or(false, |handler| {
                        context.is_handler_usable(&*handler)
                            && !handler.is_being_resolved_in_context(context)
                    }),
                None => {
                    dependency.dependency_type == DependencyType::Parameter
                        && self.converter.can_handle(&dependency.target_type)
                }
            },
            None => false,
        }
    }

    fn resolve_from_configuration(
        &self,
        kernel: &Kernel,
        context: &mut CreationContext,
        model: &ComponentModel,
        dependency: &DependencyModel,
    ) -> Result<Option<ComponentValue>, ResolutionError> {
        let value = match Self::configured_value(model, dependency) {
            Some(value) => value,
            None => return Ok(None),
        };

        if let Some(name) = service_reference(value) {
            return match kernel.handler_for_name_and_service(name, &dependency.target_type) {
                Some(handler) => Self::resolve_handler(kernel, context, &handler, dependency),
                None => Ok(None),
            };
        }

        if dependency.dependency_type == DependencyType::Parameter
            && self.converter.can_handle(&dependency.target_type)
        {
            return self
                .converter
                .convert(value, &dependency.target_type)
                .map(Some)
                .map_err(Into::into);
        }

        Ok(None)
    }

    fn candidate_handlers(
        kernel: &Kernel,
        model: &ComponentModel,
        dependency: &DependencyModel,
    ) -> Vec<HandlerPtr> {
        if dependency.dependency_type == DependencyType::Parameter {
            return vec![];
        }

        let named = dependency
            .dependency_key
            .as_deref()
            .and_then(|key| kernel.handler_for_name_and_service(key, &dependency.target_type));

        // overrides reference exactly one component
        if dependency.dependency_type == DependencyType::ServiceOverride {
            return named.into_iter().collect_vec();
        }

        let mut handlers = named
            .into_iter()
            .chain(kernel.handlers_for(&dependency.target_type))
            .filter(|handler| handler.component_model().name != model.name)
            .collect_vec();

        if handlers.is_empty() {
            if let Some(generic) = dependency.target_type.generic_type() {
                handlers.extend(kernel.generic_handlers(generic.definition));
            }
        }

        handlers
    }

    /// Finds a handler for a dependency. Strict lookup only accepts usable handlers which are not
    /// being resolved already; otherwise, those are only preferred.
    fn find_handler(
        kernel: &Kernel,
        context: &CreationContext,
        model: &ComponentModel,
        dependency: &DependencyModel,
        strict: bool,
    ) -> Option<HandlerPtr> {
        let candidates = Self::candidate_handlers(kernel, model, dependency);
        let preferred = candidates.iter().position(|handler| {
            context.is_handler_usable(&**handler) && !handler.is_being_resolved_in_context(context)
        });

        match preferred {
            Some(index) => candidates.into_iter().nth(index),
            None if strict => None,
            None => {
                let index = candidates
                    .iter()
                    .position(|handler| context.is_handler_usable(&**handler))
                    .unwrap_or(0);
                candidates.into_iter().nth(index)
            }
        }
    }

    fn resolve_from_kernel(
        kernel: &Kernel,
        context: &mut CreationContext,
        model: &ComponentModel,
        dependency: &DependencyModel,
    ) -> Result<Option<ComponentValue>, ResolutionError> {
        match Self::find_handler(kernel, context, model, dependency, false) {
            Some(handler) => Self::resolve_handler(kernel, context, &handler, dependency),
            None => Ok(None),
        }
    }

    fn resolve_handler(
        kernel: &Kernel,
        context: &mut CreationContext,
        handler: &HandlerPtr,
        dependency: &DependencyModel,
    ) -> Result<Option<ComponentValue>, ResolutionError> {
        let generic_arguments = if handler.component_model().requires_generic_arguments() {
            generic_arguments(&dependency.target_type)
        } else {
            vec![]
        };

        let mut context = context.child_context(generic_arguments);
        if dependency.is_optional {
            handler.try_resolve(kernel, &mut context)
        } else {
            handler.resolve(kernel, &mut context).map(Some)
        }
    }
}

/// Returns type arguments of a closed generic service.
pub fn generic_arguments(service: &ServiceType) -> Vec<ServiceType> {
    service
        .generic_type()
        .map(|generic| generic.arguments.clone())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use crate::component::ComponentValue;
    use crate::component_model::configuration::Configuration;
    use crate::component_model::dependency::DependencyModel;
    use crate::component_model::ComponentModel;
    use crate::context::{Arguments, CreationContext};
    use crate::error::ResolutionError;
    use crate::kernel::KernelBuilder;
    use crate::resolver::MockSubDependencyResolver;
    use std::sync::Arc;

    #[test]
    fn should_prefer_inline_arguments() {
        let kernel = KernelBuilder::new().build();
        kernel.register_instance::<u16, _>("number", Arc::new(1u16)).unwrap();

        let model = ComponentModel::of::<u8>("model")
            .with_custom_dependency("number", ComponentValue::new(2u16));
        let dependency = DependencyModel::named_service::<u16, _>("number");
        let resolver = kernel.resolver();

        let mut context =
            CreationContext::empty().with_arguments(Arguments::new().with_named("number", 3u16));
        let value = resolver
            .resolve(&kernel, &mut context, &model, &dependency)
            .unwrap()
            .unwrap();
        assert_eq!(*value.downcast::<u16>().unwrap(), 3);

        let value = resolver
            .resolve(&kernel, &mut CreationContext::empty(), &model, &dependency)
            .unwrap()
            .unwrap();
        assert_eq!(*value.downcast::<u16>().unwrap(), 2);

        let value = resolver
            .resolve(
                &kernel,
                &mut CreationContext::empty(),
                &ComponentModel::of::<u8>("other"),
                &dependency,
            )
            .unwrap()
            .unwrap();
        assert_eq!(*value.downcast::<u16>().unwrap(), 1);
    }

    #[test]
    fn should_convert_configuration_parameters() {
        let kernel = KernelBuilder::new().build();
        let model = ComponentModel::of::<u8>("model")
            .with_configuration(Configuration::with_parameters("model", [("port", "8080")]));
        let dependency = DependencyModel::parameter::<u16, _>("port");
        let resolver = kernel.resolver();

        assert!(resolver.can_resolve(&kernel, &CreationContext::empty(), &model, &dependency));

        let value = resolver
            .resolve(&kernel, &mut CreationContext::empty(), &model, &dependency)
            .unwrap()
            .unwrap();
        assert_eq!(*value.downcast::<u16>().unwrap(), 8080);
    }

    #[test]
    fn should_consult_sub_resolvers_before_kernel() {
        let kernel = KernelBuilder::new().build();
        kernel.register_instance::<u16, _>("number", Arc::new(1u16)).unwrap();

        let mut sub_resolver = MockSubDependencyResolver::new();
        sub_resolver.expect_can_resolve().return_const(true);
        sub_resolver
            .expect_resolve()
            .returning(|_, _, _, _| Ok(Some(ComponentValue::new(9u16))));
        kernel.add_sub_resolver(Arc::new(sub_resolver));

        let value = kernel
            .resolver()
            .resolve(
                &kernel,
                &mut CreationContext::empty(),
                &ComponentModel::of::<u8>("model"),
                &DependencyModel::service::<u16>(),
            )
            .unwrap()
            .unwrap();
        assert_eq!(*value.downcast::<u16>().unwrap(), 9);
    }

    #[test]
    fn should_fall_back_to_defaults() {
        let kernel = KernelBuilder::new().build();
        let model = ComponentModel::of::<u8>("model");
        let resolver = kernel.resolver();

        let dependency = DependencyModel::service::<u16>().with_default(4u16);
        assert!(!resolver.can_resolve(&kernel, &CreationContext::empty(), &model, &dependency));
        let value = resolver
            .resolve(&kernel, &mut CreationContext::empty(), &model, &dependency)
            .unwrap()
            .unwrap();
        assert_eq!(*value.downcast::<u16>().unwrap(), 4);

        let optional = DependencyModel::service::<u16>().optional();
        assert!(resolver
            .resolve(&kernel, &mut CreationContext::empty(), &model, &optional)
            .unwrap()
            .is_none());

        assert!(matches!(
            resolver.resolve(
                &kernel,
                &mut CreationContext::empty(),
                &model,
                &DependencyModel::service::<u16>()
            ),
            Err(ResolutionError::UnresolvableDependency { .. })
        ));
    }
}
