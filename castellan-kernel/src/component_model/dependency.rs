//! Description of single dependencies and the signatures grouping them.

use crate::component::{ComponentValue, GenericService, InstanceBox, ServiceType};
use crate::error::{convert_error, ArgumentError, ErrorPtr};
use derivative::Derivative;
use itertools::Itertools;
use std::any::{type_name, Any};
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// How a dependency is satisfied.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum DependencyType {
    /// Another component, looked up by key and then by type.
    Service,
    /// A plain value, e.g. a connection string. Never looked up in the component registry and
    /// eligible for textual conversion.
    Parameter,
    /// Another component, explicitly selected by name.
    ServiceOverride,
}

/// Assembles resolved collection items into the final dependency value.
pub type CollectionAssembler = fn(items: Vec<ComponentValue>) -> Option<ComponentValue>;

/// Marks a dependency as a collection of all components of a given item service.
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct CollectionDescriptor {
    pub item_type: ServiceType,
    #[derivative(Debug = "ignore")]
    pub assemble: CollectionAssembler,
}

fn assemble_collection<T: ?Sized + Send + Sync + 'static>(
    items: Vec<ComponentValue>,
) -> Option<ComponentValue> {
    let items: Option<Vec<Arc<T>>> = items.iter().map(|item| item.downcast::<T>()).collect();
    items.map(ComponentValue::new)
}

/// A single dependency of a component.
#[derive(Clone, Debug)]
pub struct DependencyModel {
    /// Optional key used for lookups by name, e.g. a parameter or property name.
    pub dependency_key: Option<String>,
    pub target_type: ServiceType,
    pub dependency_type: DependencyType,
    /// Optional dependencies which cannot be satisfied yield no value instead of an error.
    pub is_optional: bool,
    pub default_value: Option<ComponentValue>,
    pub collection: Option<CollectionDescriptor>,
}

impl DependencyModel {
    fn with_type(target_type: ServiceType, dependency_type: DependencyType) -> Self {
        Self {
            dependency_key: None,
            target_type,
            dependency_type,
            is_optional: false,
            default_value: None,
            collection: None,
        }
    }

    /// Required dependency on a service.
    pub fn service<T: ?Sized + 'static>() -> Self {
        Self::with_type(ServiceType::of::<T>(), DependencyType::Service)
    }

    /// Dependency on a service, which is first looked up by the given key.
    pub fn named_service<T: ?Sized + 'static, K: ToString>(key: K) -> Self {
        Self::service::<T>().with_key(key)
    }

    /// Dependency explicitly bound to the component with the given name.
    pub fn service_override<T: ?Sized + 'static, K: ToString>(name: K) -> Self {
        Self::with_type(ServiceType::of::<T>(), DependencyType::ServiceOverride).with_key(name)
    }

    /// Plain value dependency.
    pub fn parameter<T: 'static, K: ToString>(key: K) -> Self {
        Self::with_type(ServiceType::of::<T>(), DependencyType::Parameter).with_key(key)
    }

    /// Dependency on a closed generic service, which can be served by an open generic component.
    pub fn generic_service<T: GenericService + ?Sized>() -> Self {
        Self::with_type(ServiceType::generic::<T>(), DependencyType::Service)
    }

    /// Dependency on all components of service `T`, injected as `Vec<Arc<T>>`.
    pub fn collection<T: ?Sized + Send + Sync + 'static>() -> Self {
        let mut dependency =
            Self::with_type(ServiceType::of::<Vec<Arc<T>>>(), DependencyType::Service);
        dependency.collection = Some(CollectionDescriptor {
            item_type: ServiceType::of::<T>(),
            assemble: assemble_collection::<T>,
        });
        dependency
    }

    pub fn with_key<K: ToString>(mut self, key: K) -> Self {
        self.dependency_key = Some(key.to_string());
        self
    }

    pub fn optional(mut self) -> Self {
        self.is_optional = true;
        self
    }

    pub fn with_default<T: Send + Sync + 'static>(self, value: T) -> Self {
        self.with_default_value(ComponentValue::new(value))
    }

    pub fn with_default_value(mut self, value: ComponentValue) -> Self {
        self.default_value = Some(value);
        self
    }

    #[inline]
    pub fn has_default_value(&self) -> bool {
        self.default_value.is_some()
    }

    /// Human readable identity used in diagnostics.
    pub fn describe(&self) -> String {
        self.to_string()
    }
}

impl PartialEq for DependencyModel {
    fn eq(&self, other: &Self) -> bool {
        self.dependency_key == other.dependency_key
            && self.target_type == other.target_type
            && self.dependency_type == other.dependency_type
    }
}

impl Display for DependencyModel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.dependency_key {
            Some(key) => write!(f, "'{}' ({})", key, self.target_type),
            None => write!(f, "{}", self.target_type),
        }
    }
}

/// Creates an instance from resolved arguments.
pub type ConstructorFunction =
    fn(arguments: &ConstructorArguments) -> Result<InstanceBox, ErrorPtr>;

fn construct_default<T: Default + Send + Sync + 'static>(
    _arguments: &ConstructorArguments,
) -> Result<InstanceBox, ErrorPtr> {
    Ok(Box::<T>::default() as InstanceBox)
}

/// One way of constructing an implementation: an ordered list of dependencies, passed positionally
/// to the constructor function.
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct ConstructorCandidate {
    pub dependencies: Vec<DependencyModel>,
    #[derivative(Debug = "ignore")]
    pub constructor: ConstructorFunction,
}

impl ConstructorCandidate {
    pub fn new(constructor: ConstructorFunction) -> Self {
        Self {
            dependencies: vec![],
            constructor,
        }
    }

    /// Dependency-less constructor using [Default].
    pub fn default_of<T: Default + Send + Sync + 'static>() -> Self {
        Self::new(construct_default::<T>)
    }

    pub fn with_dependency(mut self, dependency: DependencyModel) -> Self {
        self.dependencies.push(dependency);
        self
    }
}

/// Resolved constructor arguments with typed positional access.
#[derive(Default, Debug)]
pub struct ConstructorArguments {
    values: Vec<(String, Option<ComponentValue>)>,
}

impl ConstructorArguments {
    pub(crate) fn new(values: Vec<(String, Option<ComponentValue>)>) -> Self {
        Self { values }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the raw value at given position, if it was resolved.
    pub fn raw(&self, index: usize) -> Option<&ComponentValue> {
        self.values.get(index).and_then(|(_, value)| value.as_ref())
    }

    /// Returns a required service argument.
    pub fn service<T: ?Sized + 'static>(&self, index: usize) -> Result<Arc<T>, ErrorPtr> {
        self.optional_service(index)?
            .ok_or_else(|| convert_error(ArgumentError::MissingArgument(index)))
    }

    /// Returns an optional service argument, which might have not been resolved.
    pub fn optional_service<T: ?Sized + 'static>(
        &self,
        index: usize,
    ) -> Result<Option<Arc<T>>, ErrorPtr> {
        let (name, value) = self
            .values
            .get(index)
            .ok_or_else(|| convert_error(ArgumentError::MissingArgument(index)))?;

        value
            .as_ref()
            .map(|value| {
                value.downcast::<T>().ok_or_else(|| {
                    convert_error(ArgumentError::IncompatibleArgument {
                        name: name.clone(),
                        expected: type_name::<T>().to_string(),
                    })
                })
            })
            .transpose()
    }

    /// Returns a copy of a plain value argument.
    pub fn value<T: Clone + 'static>(&self, index: usize) -> Result<T, ErrorPtr> {
        self.service::<T>(index).map(|value| (*value).clone())
    }

    pub(crate) fn into_values(self) -> Vec<ComponentValue> {
        self.values
            .into_iter()
            .filter_map(|(_, value)| value)
            .collect_vec()
    }
}

/// Sets a resolved dependency on a freshly constructed instance.
pub type PropertySetter =
    fn(instance: &mut (dyn Any + Send + Sync), value: ComponentValue) -> Result<(), ErrorPtr>;

/// A settable property of an implementation, injected after construction.
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct PropertyTarget {
    pub name: String,
    pub dependency: DependencyModel,
    #[derivative(Debug = "ignore")]
    pub setter: PropertySetter,
}

impl PropertyTarget {
    /// Creates a new property. Dependencies without a key are keyed by the property name.
    pub fn new<N: ToString>(name: N, dependency: DependencyModel, setter: PropertySetter) -> Self {
        let name = name.to_string();
        let dependency = if dependency.dependency_key.is_none() {
            dependency.with_key(&name)
        } else {
            dependency
        };

        Self {
            name,
            dependency,
            setter,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::component::{ComponentValue, ServiceType};
    use crate::component_model::dependency::{
        ConstructorArguments, DependencyModel, DependencyType, PropertyTarget,
    };
    use crate::error::ErrorPtr;
    use std::any::Any;
    use std::sync::Arc;

    fn setter(_instance: &mut (dyn Any + Send + Sync), _value: ComponentValue) -> Result<(), ErrorPtr> {
        Ok(())
    }

    #[test]
    fn should_compare_by_identity() {
        let first = DependencyModel::named_service::<u8, _>("key");
        let second = DependencyModel::named_service::<u8, _>("key").optional();
        let third = DependencyModel::parameter::<u8, _>("key");

        assert_eq!(first, second);
        assert_ne!(first, third);
        assert_eq!(third.dependency_type, DependencyType::Parameter);
    }

    #[test]
    fn should_key_properties_by_name() {
        let property = PropertyTarget::new("logger", DependencyModel::service::<u8>(), setter);
        assert_eq!(property.dependency.dependency_key.as_deref(), Some("logger"));
    }

    #[test]
    fn should_assemble_collections() {
        let dependency = DependencyModel::collection::<u8>();
        let collection = dependency.collection.unwrap();
        assert_eq!(collection.item_type, ServiceType::of::<u8>());

        let value = (collection.assemble)(vec![ComponentValue::new(1u8), ComponentValue::new(2u8)])
            .unwrap();
        let items = value.downcast::<Vec<Arc<u8>>>().unwrap();
        assert_eq!(items.iter().map(|item| **item).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn should_access_arguments() {
        let arguments = ConstructorArguments::new(vec![
            ("first".to_string(), Some(ComponentValue::new(5i32))),
            ("second".to_string(), None),
        ]);

        assert_eq!(arguments.value::<i32>(0).unwrap(), 5);
        assert!(arguments.value::<u32>(0).is_err());
        assert!(arguments.optional_service::<u8>(1).unwrap().is_none());
        assert!(arguments.service::<u8>(1).is_err());
        assert!(arguments.service::<u8>(2).is_err());
    }

    #[test]
    fn should_describe_dependencies() {
        assert_eq!(
            DependencyModel::parameter::<u8, _>("port").describe(),
            "'port' (u8)"
        );
        assert_eq!(DependencyModel::service::<u8>().describe(), "u8");
    }
}
