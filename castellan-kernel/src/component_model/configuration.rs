//! Semi-structured configuration attached to a component by external registration layers, e.g. a
//! configuration file interpreter. The kernel understands two conventions:
//!
//! * a `lifestyle` attribute on the root node, see
//!   [LifestyleConfigurationContributor](crate::component_model::contributor::LifestyleConfigurationContributor)
//! * a `parameters` child, whose children provide values for dependencies with matching keys;
//!   values in the form of `${name}` refer to other components by name

use fxhash::FxHashMap;

/// Name of the child node holding parameter values.
pub const PARAMETERS: &str = "parameters";

/// Name of the attribute holding a lifestyle name.
pub const LIFESTYLE_ATTRIBUTE: &str = "lifestyle";

#[derive(Clone, Default, Eq, PartialEq, Debug)]
pub struct Configuration {
    pub name: String,
    pub value: Option<String>,
    pub attributes: FxHashMap<String, String>,
    pub children: Vec<Configuration>,
}

impl Configuration {
    pub fn new<N: ToString>(name: N) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Creates a component configuration with given parameters.
    pub fn with_parameters<N, I, K, V>(name: N, parameters: I) -> Self
    where
        N: ToString,
        I: IntoIterator<Item = (K, V)>,
        K: ToString,
        V: ToString,
    {
        let parameters = parameters
            .into_iter()
            .fold(Self::new(PARAMETERS), |node, (key, value)| {
                node.with_child(Self::new(key).with_value(value))
            });

        Self::new(name).with_child(parameters)
    }

    pub fn with_value<V: ToString>(mut self, value: V) -> Self {
        self.value = Some(value.to_string());
        self
    }

    pub fn with_attribute<K: ToString, V: ToString>(mut self, key: K, value: V) -> Self {
        self.attributes.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_child(mut self, child: Configuration) -> Self {
        self.children.push(child);
        self
    }

    pub fn child(&self, name: &str) -> Option<&Configuration> {
        self.children.iter().find(|child| child.name == name)
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Returns the value of a parameter with given key.
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.child(PARAMETERS)
            .and_then(|parameters| parameters.child(key))
            .and_then(|parameter| parameter.value.as_deref())
    }
}

/// Returns the referenced component name, if given value is a `${name}` reference.
pub fn service_reference(value: &str) -> Option<&str> {
    value
        .strip_prefix("${")
        .and_then(|value| value.strip_suffix('}'))
        .map(str::trim)
        .filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use crate::component_model::configuration::{service_reference, Configuration};

    #[test]
    fn should_read_parameters() {
        let configuration =
            Configuration::with_parameters("component", [("port", "80"), ("host", "localhost")]);

        assert_eq!(configuration.parameter("port"), Some("80"));
        assert_eq!(configuration.parameter("host"), Some("localhost"));
        assert_eq!(configuration.parameter("missing"), None);
    }

    #[test]
    fn should_recognize_service_references() {
        assert_eq!(service_reference("${logger}"), Some("logger"));
        assert_eq!(service_reference("${}"), None);
        assert_eq!(service_reference("logger"), None);
    }
}
