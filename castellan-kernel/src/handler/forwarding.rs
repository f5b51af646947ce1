use crate::component::{CastFunction, ComponentValue, InstancePtr, ServiceType};
use crate::component_model::ComponentModel;
use crate::context::CreationContext;
use crate::error::ResolutionError;
use crate::handler::{Handler, HandlerId, HandlerPtr, HandlerState};
use crate::kernel::Kernel;
use std::sync::Arc;

/// Exposes the component of another handler as an additional service. Everything except the
/// advertised service is delegated, so both services share instances, state and identity.
pub struct ForwardingHandler {
    target: HandlerPtr,
    service: ServiceType,
    cast: CastFunction,
}

impl ForwardingHandler {
    pub fn new(target: HandlerPtr, service: ServiceType, cast: CastFunction) -> Self {
        Self {
            target,
            service,
            cast,
        }
    }

    #[inline]
    pub fn target(&self) -> &HandlerPtr {
        &self.target
    }

    fn forward(&self, value: ComponentValue) -> ComponentValue {
        value.with_service(self.service.clone(), self.cast)
    }
}

impl Handler for ForwardingHandler {
    #[inline]
    fn id(&self) -> HandlerId {
        self.target.id()
    }

    #[inline]
    fn component_model(&self) -> &Arc<ComponentModel> {
        self.target.component_model()
    }

    #[inline]
    fn service(&self) -> &ServiceType {
        &self.service
    }

    fn current_state(&self) -> HandlerState {
        self.target.current_state()
    }

    fn missing_dependencies(&self) -> Vec<String> {
        self.target.missing_dependencies()
    }

    fn evaluate_dependencies(&self, kernel: &Kernel, context: &CreationContext) -> Vec<String> {
        self.target.evaluate_dependencies(kernel, context)
    }

    // state belongs to the target
    fn set_state(&self, _state: HandlerState, _missing: Vec<String>) {}

    fn resolve(
        &self,
        kernel: &Kernel,
        context: &mut CreationContext,
    ) -> Result<ComponentValue, ResolutionError> {
        self.target
            .resolve(kernel, context)
            .map(|value| self.forward(value))
    }

    fn try_resolve(
        &self,
        kernel: &Kernel,
        context: &mut CreationContext,
    ) -> Result<Option<ComponentValue>, ResolutionError> {
        self.target
            .try_resolve(kernel, context)
            .map(|value| value.map(|value| self.forward(value)))
    }

    fn release(&self, instance: &InstancePtr) -> bool {
        self.target.release(instance)
    }

    fn is_being_resolved_in_context(&self, context: &CreationContext) -> bool {
        self.target.is_being_resolved_in_context(context)
    }

    fn releases_with_owner(&self) -> bool {
        self.target.releases_with_owner()
    }

    fn dispose(&self) {}
}
