//! Integration point for interception. The kernel itself doesn't build proxies; it asks a
//! [ProxyFactory] whether a component needs one and lets it wrap created instances.

use crate::component::{ComponentValue, InstancePtr};
use crate::component_model::ComponentModel;
use crate::error::{convert_error, ErrorPtr, ResolutionError};
use crate::kernel::Kernel;
#[cfg(test)]
use mockall::automock;
use std::sync::Arc;

#[cfg_attr(test, automock)]
pub trait ProxyFactory: Send + Sync {
    /// Checks if instances of given component should be proxied.
    fn should_create_proxy(&self, model: &ComponentModel) -> bool;

    /// Checks if a proxy needs a target instance to wrap. Proxies without targets are created
    /// instead of instances, which allows abstract implementations.
    fn requires_target_instance(&self, model: &ComponentModel) -> bool;

    /// Creates a proxy advertising the component's service.
    fn create(
        &self,
        kernel: &Kernel,
        model: &ComponentModel,
        target: Option<ComponentValue>,
    ) -> Result<ComponentValue, ErrorPtr>;

    /// Returns the wrapped instance, if given instance is a proxy.
    fn unproxied_instance(&self, instance: &InstancePtr) -> Option<InstancePtr>;
}

pub type ProxyFactoryPtr = Arc<dyn ProxyFactory>;

/// Factory which never creates proxies.
#[derive(Copy, Clone, Default, Debug)]
pub struct NoProxyFactory;

impl ProxyFactory for NoProxyFactory {
    fn should_create_proxy(&self, _model: &ComponentModel) -> bool {
        false
    }

    fn requires_target_instance(&self, _model: &ComponentModel) -> bool {
        true
    }

    fn create(
        &self,
        _kernel: &Kernel,
        model: &ComponentModel,
        target: Option<ComponentValue>,
    ) -> Result<ComponentValue, ErrorPtr> {
        target.ok_or_else(|| convert_error(ResolutionError::InvalidComponent(model.name.clone())))
    }

    fn unproxied_instance(&self, _instance: &InstancePtr) -> Option<InstancePtr> {
        None
    }
}
