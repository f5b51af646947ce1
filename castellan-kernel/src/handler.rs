//! Handlers own the runtime side of registered components: their state with respect to
//! dependencies, the lifestyle manager deciding about instance sharing, and the release of
//! created instances.
//!
//! A handler is [Valid](HandlerState::Valid) when all its required dependencies can be satisfied
//! by other valid handlers, or by configuration. Otherwise it's
//! [waiting for dependencies](HandlerState::WaitingDependency) and can only be resolved when inline
//! arguments provide the missing values.

pub mod default;
pub mod forwarding;
pub mod generic;

use crate::component::{ComponentValue, InstancePtr, ServiceType};
use crate::component_model::ComponentModel;
use crate::context::CreationContext;
use crate::error::ResolutionError;
use crate::kernel::Kernel;
#[cfg(test)]
use mockall::automock;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Unique identity of a registered component's handler.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Debug)]
pub struct HandlerId(pub u64);

impl HandlerId {
    pub fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl Display for HandlerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum HandlerState {
    WaitingDependency,
    Valid,
    /// Removed from the kernel.
    Invalid,
}

/// Runtime owner of a component.
#[cfg_attr(test, automock)]
pub trait Handler: Send + Sync {
    fn id(&self) -> HandlerId;

    fn component_model(&self) -> &Arc<ComponentModel>;

    /// Service advertised by values returned from this handler.
    fn service(&self) -> &ServiceType;

    fn current_state(&self) -> HandlerState;

    /// Descriptions of dependencies which were missing at the time of last evaluation.
    fn missing_dependencies(&self) -> Vec<String>;

    /// Returns descriptions of required dependencies which cannot be satisfied in given context.
    fn evaluate_dependencies(&self, kernel: &Kernel, context: &CreationContext) -> Vec<String>;

    /// Updates the state after an evaluation performed by the kernel.
    fn set_state(&self, state: HandlerState, missing: Vec<String>);

    #[inline]
    fn is_invalid(&self) -> bool {
        self.current_state() == HandlerState::Invalid
    }

    /// Resolves an instance, failing if it cannot be built.
    fn resolve(
        &self,
        kernel: &Kernel,
        context: &mut CreationContext,
    ) -> Result<ComponentValue, ResolutionError>;

    /// Resolves an instance, returning `None` if dependencies are missing.
    fn try_resolve(
        &self,
        kernel: &Kernel,
        context: &mut CreationContext,
    ) -> Result<Option<ComponentValue>, ResolutionError>;

    /// Releases an instance created by this handler. Returns whether the instance was let go, as
    /// opposed to being kept alive by its lifestyle.
    fn release(&self, instance: &InstancePtr) -> bool;

    fn is_being_resolved_in_context(&self, context: &CreationContext) -> bool;

    /// Checks if instances should be released together with the component which required them.
    fn releases_with_owner(&self) -> bool;

    /// Releases all instances kept alive by the lifestyle.
    fn dispose(&self);
}

pub type HandlerPtr = Arc<dyn Handler>;
