use crate::component::{ComponentValue, InstancePtr, ServiceType};
use crate::component_model::{ComponentModel, Lifestyle};
use crate::context::CreationContext;
use crate::error::ResolutionError;
use crate::handler::default::DefaultHandler;
use crate::handler::{Handler, HandlerId, HandlerPtr, HandlerState};
use crate::kernel::Kernel;
use fxhash::FxHashMap;
use itertools::Itertools;
use parking_lot::Mutex;
use std::any::{Any, TypeId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Handler for open generic components. Closed components are created on demand for generic
/// arguments found in the [CreationContext], and cached for subsequent requests.
pub struct GenericHandler {
    id: HandlerId,
    model: Arc<ComponentModel>,
    closed_handlers: Mutex<FxHashMap<Vec<TypeId>, HandlerPtr>>,
    removed: AtomicBool,
}

impl GenericHandler {
    pub fn new(model: Arc<ComponentModel>) -> Self {
        Self {
            id: HandlerId::next(),
            model,
            closed_handlers: Default::default(),
            removed: AtomicBool::new(false),
        }
    }

    /// Returns the handler for given generic arguments, creating it if needed.
    pub fn closed_handler(
        &self,
        kernel: &Kernel,
        arguments: &[ServiceType],
    ) -> Result<HandlerPtr, ResolutionError> {
        let key = arguments.iter().map(ServiceType::id).collect_vec();
        if let Some(handler) = self.closed_handlers.lock().get(&key) {
            return Ok(handler.clone());
        }

        // built outside of the lock, since contributors and closers are user code
        let handler = self.close(kernel, arguments)?;

        let mut closed_handlers = self.closed_handlers.lock();
        Ok(closed_handlers.entry(key).or_insert(handler).clone())
    }

    fn close(
        &self,
        kernel: &Kernel,
        arguments: &[ServiceType],
    ) -> Result<HandlerPtr, ResolutionError> {
        let closer = self
            .model
            .generic
            .as_ref()
            .map(|generic| generic.closer)
            .ok_or_else(|| ResolutionError::InvalidComponent(self.model.name.clone()))?;

        let mut model = closer(arguments).ok_or_else(|| ResolutionError::CannotCloseGeneric {
            component: self.model.name.clone(),
            arguments: arguments.iter().map(|argument| argument.to_string()).collect_vec(),
        })?;

        model.name = format!(
            "{}<{}>",
            self.model.name,
            arguments.iter().map(ServiceType::name).join(", ")
        );

        if model.lifestyle == Lifestyle::Undefined {
            model.lifestyle = self.model.lifestyle.clone();
        }

        for interceptor in &self.model.interceptors {
            if !model.interceptors.contains(interceptor) {
                model.interceptors.push(interceptor.clone());
            }
        }

        for concern in self.model.lifecycle.commission_concerns() {
            model.lifecycle.add_commission_if_absent(concern.clone());
        }

        for concern in self.model.lifecycle.decommission_concerns() {
            model.lifecycle.add_decommission_if_absent(concern.clone());
        }

        kernel.contribute(&mut model);

        debug!(component = %model.name, "Closing generic component.");

        let handler = DefaultHandler::new(Arc::new(model), kernel)?;
        let missing = handler.evaluate_dependencies(kernel, &CreationContext::empty());
        let state = if missing.is_empty() {
            HandlerState::Valid
        } else {
            HandlerState::WaitingDependency
        };

        handler.set_state(state, missing);
        Ok(handler as HandlerPtr)
    }

    fn resolve_core(
        &self,
        kernel: &Kernel,
        context: &mut CreationContext,
        required: bool,
    ) -> Result<Option<ComponentValue>, ResolutionError> {
        if context.generic_arguments().is_empty() {
            return Err(ResolutionError::MissingGenericArguments(
                self.model.name.clone(),
            ));
        }

        let arguments = context.generic_arguments().to_vec();
        let handler = self.closed_handler(kernel, &arguments)?;

        // the closed handler owns the burden
        let mut scope = context.enter_resolution_context(self, false)?;
        if required {
            handler.resolve(kernel, &mut scope).map(Some)
        } else {
            handler.try_resolve(kernel, &mut scope)
        }
    }
}

impl Handler for GenericHandler {
    #[inline]
    fn id(&self) -> HandlerId {
        self.id
    }

    #[inline]
    fn component_model(&self) -> &Arc<ComponentModel> {
        &self.model
    }

    #[inline]
    fn service(&self) -> &ServiceType {
        &self.model.service
    }

    fn current_state(&self) -> HandlerState {
        if self.removed.load(Ordering::Relaxed) {
            HandlerState::Invalid
        } else {
            HandlerState::Valid
        }
    }

    fn missing_dependencies(&self) -> Vec<String> {
        vec![]
    }

    fn evaluate_dependencies(&self, _kernel: &Kernel, _context: &CreationContext) -> Vec<String> {
        vec![]
    }

    fn set_state(&self, state: HandlerState, _missing: Vec<String>) {
        if state == HandlerState::Invalid {
            self.removed.store(true, Ordering::Relaxed);
        }
    }

    fn resolve(
        &self,
        kernel: &Kernel,
        context: &mut CreationContext,
    ) -> Result<ComponentValue, ResolutionError> {
        self.resolve_core(kernel, context, true)?
            .ok_or_else(|| ResolutionError::InvalidComponent(self.model.name.clone()))
    }

    fn try_resolve(
        &self,
        kernel: &Kernel,
        context: &mut CreationContext,
    ) -> Result<Option<ComponentValue>, ResolutionError> {
        self.resolve_core(kernel, context, false)
    }

    fn release(&self, instance: &InstancePtr) -> bool {
        let type_id = Any::type_id(&**instance);
        let handler = self
            .closed_handlers
            .lock()
            .values()
            .find(|handler| handler.component_model().implementation.id() == type_id)
            .cloned();

        handler.map_or(false, |handler| handler.release(instance))
    }

    // closed handlers detect their own cycles, different closures may nest freely
    fn is_being_resolved_in_context(&self, _context: &CreationContext) -> bool {
        false
    }

    fn releases_with_owner(&self) -> bool {
        false
    }

    fn dispose(&self) {
        let handlers = self
            .closed_handlers
            .lock()
            .drain()
            .map(|(_, handler)| handler)
            .collect_vec();

        for handler in handlers {
            handler.dispose();
        }
    }
}
