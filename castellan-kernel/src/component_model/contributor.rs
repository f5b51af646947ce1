//! Model construction contributors get a chance to modify every [ComponentModel] before it is
//! frozen. They run in registration order, outside of any kernel lock.

use crate::component_model::configuration::LIFESTYLE_ATTRIBUTE;
use crate::component_model::{ComponentModel, Lifestyle};
use crate::kernel::Kernel;
#[cfg(test)]
use mockall::automock;
use std::sync::Arc;

pub type ComponentModelContributorPtr = Arc<dyn ComponentModelContributor>;

/// Contributes to a model before it's frozen.
#[cfg_attr(test, automock)]
pub trait ComponentModelContributor: Send + Sync {
    fn process_model(&self, kernel: &Kernel, model: &mut ComponentModel);
}

/// Reads the lifestyle from the `lifestyle` configuration attribute of models with an undefined
/// lifestyle.
#[derive(Copy, Clone, Default, Debug)]
pub struct LifestyleConfigurationContributor;

impl ComponentModelContributor for LifestyleConfigurationContributor {
    fn process_model(&self, _kernel: &Kernel, model: &mut ComponentModel) {
        if model.lifestyle != Lifestyle::Undefined {
            return;
        }

        if let Some(lifestyle) = model
            .configuration
            .as_ref()
            .and_then(|configuration| configuration.attribute(LIFESTYLE_ATTRIBUTE))
            .and_then(|lifestyle| lifestyle.parse::<Lifestyle>().ok())
        {
            model.lifestyle = lifestyle;
        }
    }
}

/// Assigns a default lifestyle to models which still don't have one.
#[derive(Clone, Debug)]
pub struct DefaultLifestyleContributor {
    lifestyle: Lifestyle,
}

impl DefaultLifestyleContributor {
    pub fn new(lifestyle: Lifestyle) -> Self {
        Self { lifestyle }
    }
}

impl ComponentModelContributor for DefaultLifestyleContributor {
    fn process_model(&self, _kernel: &Kernel, model: &mut ComponentModel) {
        if model.lifestyle == Lifestyle::Undefined {
            model.lifestyle = self.lifestyle.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::component_model::configuration::Configuration;
    use crate::component_model::contributor::{
        ComponentModelContributor, DefaultLifestyleContributor, LifestyleConfigurationContributor,
    };
    use crate::component_model::{ComponentModel, Lifestyle};
    use crate::kernel::KernelBuilder;

    #[test]
    fn should_read_lifestyle_from_configuration() {
        let kernel = KernelBuilder::new().build();
        let mut model = ComponentModel::of::<u8>("model").with_configuration(
            Configuration::new("model").with_attribute("lifestyle", "transient"),
        );

        LifestyleConfigurationContributor.process_model(&kernel, &mut model);
        assert_eq!(model.lifestyle, Lifestyle::Transient);
    }

    #[test]
    fn should_not_override_explicit_lifestyle() {
        let kernel = KernelBuilder::new().build();
        let mut model = ComponentModel::of::<u8>("model")
            .with_lifestyle(Lifestyle::PerThread)
            .with_configuration(Configuration::new("model").with_attribute("lifestyle", "transient"));

        LifestyleConfigurationContributor.process_model(&kernel, &mut model);
        DefaultLifestyleContributor::new(Lifestyle::Singleton).process_model(&kernel, &mut model);
        assert_eq!(model.lifestyle, Lifestyle::PerThread);
    }

    #[test]
    fn should_assign_default_lifestyle() {
        let kernel = KernelBuilder::new().build();
        let mut model = ComponentModel::of::<u8>("model");

        DefaultLifestyleContributor::new(Lifestyle::Transient).process_model(&kernel, &mut model);
        assert_eq!(model.lifestyle, Lifestyle::Transient);
    }
}
