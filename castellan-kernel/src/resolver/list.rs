use crate::component::ComponentValue;
use crate::component_model::dependency::DependencyModel;
use crate::component_model::ComponentModel;
use crate::context::CreationContext;
use crate::error::ResolutionError;
use crate::handler::HandlerPtr;
use crate::kernel::Kernel;
use crate::resolver::SubDependencyResolver;
use itertools::Itertools;

/// Satisfies collection dependencies, declared with [DependencyModel::collection], with all
/// usable components advertising the item service, in registration order.
#[derive(Copy, Clone, Default, Debug)]
pub struct ListResolver {
    allow_empty: bool,
}

impl ListResolver {
    pub fn new(allow_empty: bool) -> Self {
        Self { allow_empty }
    }

    fn item_handlers(
        kernel: &Kernel,
        context: &CreationContext,
        model: &ComponentModel,
        dependency: &DependencyModel,
    ) -> Vec<HandlerPtr> {
        dependency
            .collection
            .as_ref()
            .map(|collection| {
                kernel
                    .handlers_for(&collection.item_type)
                    .into_iter()
                    .filter(|handler| {
                        handler.component_model().name != model.name
                            && context.is_handler_usable(&**handler)
                    })
                    .collect_vec()
            })
            .unwrap_or_default()
    }
}

impl SubDependencyResolver for ListResolver {
    fn can_resolve(
        &self,
        kernel: &Kernel,
        context: &CreationContext,
        model: &ComponentModel,
        dependency: &DependencyModel,
    ) -> bool {
        dependency.collection.is_some()
            && (self.allow_empty || !Self::item_handlers(kernel, context, model, dependency).is_empty())
    }

    fn resolve(
        &self,
        kernel: &Kernel,
        context: &mut CreationContext,
        model: &ComponentModel,
        dependency: &DependencyModel,
    ) -> Result<Option<ComponentValue>, ResolutionError> {
        let collection = match &dependency.collection {
            Some(collection) => collection,
            None => return Ok(None),
        };

        let handlers = Self::item_handlers(kernel, context, model, dependency);
        let items: Vec<ComponentValue> = handlers
            .iter()
            .map(|handler| {
                let mut context = context.child_context(vec![]);
                handler.resolve(kernel, &mut context)
            })
            .try_collect()?;

        Ok((collection.assemble)(items))
    }
}
