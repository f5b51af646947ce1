use crate::component::{ComponentValue, InstancePtr, ServiceType};
use crate::component_model::dependency::DependencyModel;
use crate::component_model::ComponentModel;
use crate::context::CreationContext;
use crate::error::{RegistrationError, ResolutionError};
use crate::handler::{Handler, HandlerId, HandlerPtr, HandlerState};
use crate::kernel::Kernel;
use crate::lifestyle::LifestyleManagerPtr;
use itertools::Itertools;
use parking_lot::RwLock;
use std::sync::{Arc, Weak};
use tracing::{trace, warn};

#[derive(Debug)]
struct HandlerStatus {
    state: HandlerState,
    missing: Vec<String>,
}

/// Handler for components built by an activator and shared according to their lifestyle.
pub struct DefaultHandler {
    id: HandlerId,
    model: Arc<ComponentModel>,
    lifestyle: LifestyleManagerPtr,
    status: RwLock<HandlerStatus>,
    this: Weak<DefaultHandler>,
}

impl DefaultHandler {
    /// Creates a handler with an activator and lifestyle manager provided by the kernel. The handler
    /// starts waiting for dependencies until evaluated.
    pub fn new(model: Arc<ComponentModel>, kernel: &Kernel) -> Result<Arc<Self>, RegistrationError> {
        let activator = kernel.create_activator(&model);
        let lifestyle = kernel.create_lifestyle_manager(&model, activator)?;
        Ok(Self::with_lifestyle(model, lifestyle))
    }

    pub fn with_lifestyle(model: Arc<ComponentModel>, lifestyle: LifestyleManagerPtr) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            id: HandlerId::next(),
            model,
            lifestyle,
            status: RwLock::new(HandlerStatus {
                state: HandlerState::WaitingDependency,
                missing: vec![],
            }),
            this: this.clone(),
        })
    }

    fn resolve_core(
        &self,
        kernel: &Kernel,
        context: &mut CreationContext,
        required: bool,
    ) -> Result<Option<ComponentValue>, ResolutionError> {
        // re-entering is only allowed when inline arguments might break the cycle
        if self.is_being_resolved_in_context(context) && !context.has_additional_arguments() {
            let mut path = context.resolution_path();
            path.push(self.model.name.clone());

            return Err(ResolutionError::CircularDependency {
                component: self.model.name.clone(),
                path,
            });
        }

        match self.current_state() {
            HandlerState::Invalid => {
                warn!(component = %self.model.name, "Attempted to resolve an invalid component.");
                return Err(ResolutionError::InvalidComponent(self.model.name.clone()));
            }
            HandlerState::WaitingDependency => {
                let missing = self.evaluate_dependencies(kernel, context);
                if !missing.is_empty() {
                    if !required {
                        return Ok(None);
                    }

                    return Err(ResolutionError::WaitingDependency {
                        component: self.model.name.clone(),
                        missing,
                    });
                }
            }
            HandlerState::Valid => {}
        }

        let this = self
            .this
            .upgrade()
            .ok_or_else(|| ResolutionError::InvalidComponent(self.model.name.clone()))?;

        let mut scope = context.enter_resolution_context(self, true)?;
        let value = self.lifestyle.resolve(kernel, &mut scope)?;

        trace!(component = %self.model.name, depth = scope.depth(), "Resolved instance.");

        if let Some(burden) = scope.set_root_instance(
            value.instance.clone(),
            this as HandlerPtr,
            self.model.lifecycle.has_decommission_concerns(),
        ) {
            if self.lifestyle.releases_with_owner() && burden.requires_policy_release() {
                scope.release_policy().track(burden);
            }
        }

        Ok(Some(value))
    }
}

impl Handler for DefaultHandler {
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
        self.status.read().state
    }

    fn missing_dependencies(&self) -> Vec<String> {
        self.status.read().missing.clone()
    }

    fn evaluate_dependencies(&self, kernel: &Kernel, context: &CreationContext) -> Vec<String> {
        let resolver = kernel.resolver();
        let is_missing = |dependency: &&DependencyModel| {
            !dependency.is_optional
                && !dependency.has_default_value()
                && !resolver.can_resolve(kernel, context, &self.model, dependency)
        };

        let mut missing = vec![];

        // custom activators don't use constructors
        if !self.model.has_custom_activator() && !self.model.constructors.is_empty() {
            let per_constructor = self
                .model
                .constructors
                .iter()
                .map(|constructor| {
                    constructor
                        .dependencies
                        .iter()
                        .filter(is_missing)
                        .map(|dependency| dependency.describe())
                        .collect_vec()
                })
                .collect_vec();

            if !per_constructor.iter().any(Vec::is_empty) {
                if let Some(closest) = per_constructor.into_iter().min_by_key(Vec::len) {
                    missing.extend(closest);
                }
            }
        }

        missing.extend(
            self.model
                .properties
                .iter()
                .map(|property| &property.dependency)
                .chain(self.model.dependencies.iter())
                .filter(is_missing)
                .map(|dependency| dependency.describe()),
        );

        missing.into_iter().unique().collect_vec()
    }

    fn set_state(&self, state: HandlerState, missing: Vec<String>) {
        let mut status = self.status.write();
        status.state = state;
        status.missing = missing;
    }

    fn resolve(
        &self,
        kernel: &Kernel,
        context: &mut CreationContext,
    ) -> Result<ComponentValue, ResolutionError> {
        self.resolve_core(kernel, context, true)?
            .ok_or_else(|| ResolutionError::WaitingDependency {
                component: self.model.name.clone(),
                missing: self.missing_dependencies(),
            })
    }

    fn try_resolve(
        &self,
        kernel: &Kernel,
        context: &mut CreationContext,
    ) -> Result<Option<ComponentValue>, ResolutionError> {
        self.resolve_core(kernel, context, false)
    }

    fn release(&self, instance: &InstancePtr) -> bool {
        self.lifestyle.release(instance)
    }

    fn is_being_resolved_in_context(&self, context: &CreationContext) -> bool {
        context.is_in_resolution_context(self.id)
    }

    #[inline]
    fn releases_with_owner(&self) -> bool {
        self.lifestyle.releases_with_owner()
    }

    fn dispose(&self) {
        self.lifestyle.dispose();
    }
}
