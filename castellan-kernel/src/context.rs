//! Per-request resolution state. A [CreationContext] is created for every top-level resolution and
//! passed down to all nested resolutions of the same request. It carries explicit inline arguments,
//! ambient generic arguments, the stack of handlers being resolved (for cycle detection) and the
//! stack of open ownership frames used to build [Burdens](Burden).
//!
//! Entering a handler's resolution returns a [ResolutionScope] guard, which gives access to the
//! context and restores the stacks when dropped, on success and error paths alike.

use crate::component::{ComponentValue, InstancePtr, ServiceType};
use crate::component_model::dependency::{DependencyModel, DependencyType};
use crate::conversion::TypeConverter;
use crate::error::{ConversionError, ResolutionError};
use crate::handler::{Handler, HandlerId, HandlerPtr, HandlerState};
use crate::release::{Burden, BurdenPtr, NoTrackingReleasePolicy, ReleasePolicyPtr};
use fxhash::{FxHashMap, FxHashSet};
use itertools::Itertools;
use std::any::TypeId;
use std::mem;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// Default maximum number of nested handler resolutions in a single request.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Explicit values provided for dependencies, by key or by type.
#[derive(Clone, Default, Debug)]
pub struct Arguments {
    named: FxHashMap<String, ComponentValue>,
    typed: FxHashMap<TypeId, ComponentValue>,
}

impl Arguments {
    pub fn new() -> Self {
        Default::default()
    }

    /// Adds a value for dependencies with the given key.
    pub fn with_named<K: ToString, T: Send + Sync + 'static>(self, key: K, value: T) -> Self {
        self.with_named_value(key, ComponentValue::new(value))
    }

    pub fn with_named_value<K: ToString>(mut self, key: K, value: ComponentValue) -> Self {
        self.named.insert(key.to_string(), value);
        self
    }

    /// Adds a value for dependencies on its type.
    pub fn with_typed<T: Send + Sync + 'static>(self, value: T) -> Self {
        self.with_typed_value(ComponentValue::new(value))
    }

    /// Adds a value for dependencies on the service it advertises.
    pub fn with_typed_value(mut self, value: ComponentValue) -> Self {
        self.typed.insert(value.service.id(), value);
        self
    }

    /// Adds a shared service, e.g. `Arc<dyn Trait>`, for dependencies on `T`.
    pub fn with_shared<T: ?Sized + Send + Sync + 'static>(self, value: Arc<T>) -> Self {
        self.with_typed_value(ComponentValue::shared(value))
    }

    pub fn named(&self, key: &str) -> Option<&ComponentValue> {
        self.named.get(key)
    }

    pub fn typed(&self, service: &ServiceType) -> Option<&ComponentValue> {
        self.typed.get(&service.id())
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.named.is_empty() && self.typed.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.named.len() + self.typed.len()
    }

    fn named_match<'a>(
        &'a self,
        dependency: &DependencyModel,
    ) -> Option<&'a ComponentValue> {
        dependency
            .dependency_key
            .as_deref()
            .and_then(|key| self.named.get(key))
    }

    fn is_convertible(
        value: &ComponentValue,
        dependency: &DependencyModel,
        converter: &dyn TypeConverter,
    ) -> bool {
        dependency.dependency_type == DependencyType::Parameter
            && value.as_text().is_some()
            && converter.can_handle(&dependency.target_type)
    }

    /// Checks if any argument can satisfy given dependency.
    pub fn can_satisfy(&self, dependency: &DependencyModel, converter: &dyn TypeConverter) -> bool {
        let by_key = self.named_match(dependency).map_or(false, |value| {
            value.service == dependency.target_type
                || Self::is_convertible(value, dependency, converter)
        });

        by_key || self.typed(&dependency.target_type).is_some()
    }

    /// Looks up an argument for given dependency, first by key and then by type. Textual values
    /// under a matching key are converted for parameter dependencies.
    pub fn find(
        &self,
        dependency: &DependencyModel,
        converter: &dyn TypeConverter,
    ) -> Result<Option<ComponentValue>, ConversionError> {
        if let Some(value) = self.named_match(dependency) {
            if value.service == dependency.target_type {
                return Ok(Some(value.clone()));
            }

            if Self::is_convertible(value, dependency, converter) {
                if let Some(text) = value.as_text() {
                    return converter
                        .convert(text, &dependency.target_type)
                        .map(Some);
                }
            }
        }

        Ok(self.typed(&dependency.target_type).cloned())
    }
}

#[derive(Clone, Debug)]
struct HandlerEntry {
    id: HandlerId,
    name: String,
}

#[derive(Default)]
struct ResolutionFrame {
    children: Vec<BurdenPtr>,
    burden: Option<BurdenPtr>,
}

/// State of a single resolution request.
pub struct CreationContext {
    release_policy: ReleasePolicyPtr,
    additional_arguments: Arguments,
    generic_arguments: Vec<ServiceType>,
    propagate_inline_arguments: bool,
    handler_stack: Vec<HandlerEntry>,
    resolution_stack: Vec<ResolutionFrame>,
    dependency_stack: Vec<String>,
    max_depth: usize,
    assumed_valid: Option<FxHashSet<HandlerId>>,
}

impl CreationContext {
    pub fn new(release_policy: ReleasePolicyPtr) -> Self {
        Self {
            release_policy,
            additional_arguments: Default::default(),
            generic_arguments: vec![],
            propagate_inline_arguments: false,
            handler_stack: vec![],
            resolution_stack: vec![],
            dependency_stack: vec![],
            max_depth: DEFAULT_MAX_DEPTH,
            assumed_valid: None,
        }
    }

    /// Context for lookups which never need to be released.
    pub fn empty() -> Self {
        Self::new(Arc::new(NoTrackingReleasePolicy))
    }

    /// Context used for evaluating handler states, which treats exactly the given handlers as
    /// valid.
    pub(crate) fn for_state_evaluation(assumed_valid: FxHashSet<HandlerId>) -> Self {
        let mut context = Self::empty();
        context.assumed_valid = Some(assumed_valid);
        context
    }

    pub fn with_arguments(mut self, arguments: Arguments) -> Self {
        self.additional_arguments = arguments;
        self
    }

    pub fn with_generic_arguments(mut self, generic_arguments: Vec<ServiceType>) -> Self {
        self.generic_arguments = generic_arguments;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Makes inline arguments visible to nested resolutions, instead of only the top-level one.
    pub fn with_propagated_arguments(mut self, propagate: bool) -> Self {
        self.propagate_inline_arguments = propagate;
        self
    }

    #[inline]
    pub fn release_policy(&self) -> &ReleasePolicyPtr {
        &self.release_policy
    }

    #[inline]
    pub fn additional_arguments(&self) -> &Arguments {
        &self.additional_arguments
    }

    #[inline]
    pub fn has_additional_arguments(&self) -> bool {
        !self.additional_arguments.is_empty()
    }

    #[inline]
    pub fn generic_arguments(&self) -> &[ServiceType] {
        &self.generic_arguments
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.handler_stack.len()
    }

    /// Checks if a handler with given id is currently being resolved.
    pub fn is_in_resolution_context(&self, id: HandlerId) -> bool {
        self.handler_stack.iter().any(|entry| entry.id == id)
    }

    /// Names of components being resolved, from the outermost one.
    pub fn resolution_path(&self) -> Vec<String> {
        self.handler_stack
            .iter()
            .map(|entry| entry.name.clone())
            .collect_vec()
    }

    /// Dependencies being resolved, from the outermost one.
    pub fn dependency_path(&self) -> &[String] {
        &self.dependency_stack
    }

    /// Checks if a handler can be used to satisfy dependencies.
    pub fn is_handler_usable(&self, handler: &dyn Handler) -> bool {
        match &self.assumed_valid {
            Some(assumed_valid) => assumed_valid.contains(&handler.id()),
            None => handler.current_state() == HandlerState::Valid,
        }
    }

    /// Pushes given handler on the resolution stack. Unless `create_burden` is false, a new
    /// ownership frame is opened, which collects burdens of nested resolutions.
    pub fn enter_resolution_context(
        &mut self,
        handler: &dyn Handler,
        create_burden: bool,
    ) -> Result<ResolutionScope<'_>, ResolutionError> {
        let name = &handler.component_model().name;
        if self.handler_stack.len() >= self.max_depth {
            return Err(ResolutionError::DepthExceeded {
                component: name.clone(),
                max_depth: self.max_depth,
            });
        }

        self.handler_stack.push(HandlerEntry {
            id: handler.id(),
            name: name.clone(),
        });

        if create_burden {
            self.resolution_stack.push(Default::default());
        }

        Ok(ResolutionScope {
            context: self,
            create_burden,
        })
    }

    fn exit_resolution_context(&mut self, create_burden: bool) {
        self.handler_stack.pop();

        if !create_burden {
            return;
        }

        if let Some(ResolutionFrame {
            burden: Some(burden),
            ..
        }) = self.resolution_stack.pop()
        {
            if let Some(parent) = self.resolution_stack.last_mut() {
                if burden.releases_with_owner() && burden.requires_policy_release() {
                    parent.children.push(burden);
                }
            }
        }
    }

    /// Derives a context for a nested service resolution. Inline arguments are hidden from the
    /// nested resolution unless propagation is enabled, and generic arguments are replaced. Both
    /// are restored when the returned guard is dropped. Cycle detection and ownership stacks are
    /// shared with the parent.
    pub fn child_context(&mut self, generic_arguments: Vec<ServiceType>) -> ChildContext<'_> {
        let hide_arguments = !self.propagate_inline_arguments;
        self.derive(generic_arguments, hide_arguments)
    }

    /// Replaces generic arguments for a top-level resolution, keeping inline arguments visible.
    pub fn generic_scope(&mut self, generic_arguments: Vec<ServiceType>) -> ChildContext<'_> {
        self.derive(generic_arguments, false)
    }

    fn derive(
        &mut self,
        generic_arguments: Vec<ServiceType>,
        hide_arguments: bool,
    ) -> ChildContext<'_> {
        let arguments = hide_arguments.then(|| mem::take(&mut self.additional_arguments));

        let generic_arguments = mem::replace(&mut self.generic_arguments, generic_arguments);

        ChildContext {
            context: self,
            arguments,
            generic_arguments,
        }
    }

    /// Records a dependency being resolved for diagnostic purposes.
    pub fn track_dependency(&mut self, dependency: &DependencyModel) -> DependencyTrackingScope<'_> {
        self.dependency_stack.push(dependency.describe());
        DependencyTrackingScope { context: self }
    }
}

/// Guard for a handler's resolution. Pops the handler from the resolution stack when dropped and,
/// if a root instance was set, attaches its burden to the creator's frame.
pub struct ResolutionScope<'a> {
    context: &'a mut CreationContext,
    create_burden: bool,
}

impl ResolutionScope<'_> {
    /// Marks given instance as the root of the current ownership frame. Returns the resulting
    /// burden, which owns all burdens created by nested resolutions in this frame.
    pub fn set_root_instance(
        &mut self,
        instance: InstancePtr,
        handler: HandlerPtr,
        requires_decommission: bool,
    ) -> Option<BurdenPtr> {
        if !self.create_burden {
            return None;
        }

        let frame = self.context.resolution_stack.last_mut()?;
        let burden = Arc::new(Burden::new(
            instance,
            handler,
            requires_decommission,
            mem::take(&mut frame.children),
        ));

        frame.burden = Some(burden.clone());
        Some(burden)
    }
}

impl Deref for ResolutionScope<'_> {
    type Target = CreationContext;

    fn deref(&self) -> &Self::Target {
        self.context
    }
}

impl DerefMut for ResolutionScope<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.context
    }
}

impl Drop for ResolutionScope<'_> {
    fn drop(&mut self) {
        self.context.exit_resolution_context(self.create_burden);
    }
}

/// Guard for a nested service resolution, restoring parent arguments when dropped.
pub struct ChildContext<'a> {
    context: &'a mut CreationContext,
    arguments: Option<Arguments>,
    generic_arguments: Vec<ServiceType>,
}

impl Deref for ChildContext<'_> {
    type Target = CreationContext;

    fn deref(&self) -> &Self::Target {
        self.context
    }
}

impl DerefMut for ChildContext<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.context
    }
}

impl Drop for ChildContext<'_> {
    fn drop(&mut self) {
        if let Some(arguments) = self.arguments.take() {
            self.context.additional_arguments = arguments;
        }

        self.context.generic_arguments = mem::take(&mut self.generic_arguments);
    }
}

/// Guard for a dependency being resolved.
pub struct DependencyTrackingScope<'a> {
    context: &'a mut CreationContext,
}

impl Deref for DependencyTrackingScope<'_> {
    type Target = CreationContext;

    fn deref(&self) -> &Self::Target {
        self.context
    }
}

impl DerefMut for DependencyTrackingScope<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.context
    }
}

impl Drop for DependencyTrackingScope<'_> {
    fn drop(&mut self) {
        self.context.dependency_stack.pop();
    }
}
