//! Conversion of textual configuration values to typed dependency values.

use crate::component::{ComponentValue, ServiceType};
use crate::error::ConversionError;
use fxhash::FxHashMap;
#[cfg(test)]
use mockall::automock;
use parking_lot::RwLock;
use std::any::TypeId;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;

/// Converts text to values of supported types.
#[cfg_attr(test, automock)]
pub trait TypeConverter: Send + Sync {
    fn can_handle(&self, target: &ServiceType) -> bool;

    fn convert(&self, value: &str, target: &ServiceType) -> Result<ComponentValue, ConversionError>;
}

pub type TypeConverterPtr = Arc<dyn TypeConverter>;

type ConversionFunction = fn(value: &str) -> Result<ComponentValue, ConversionError>;

fn parse<T>(value: &str) -> Result<ComponentValue, ConversionError>
where
    T: FromStr + Send + Sync + 'static,
    T::Err: Display,
{
    value
        .trim()
        .parse::<T>()
        .map(ComponentValue::new)
        .map_err(|error| ConversionError::InvalidFormat {
            value: value.to_string(),
            target: std::any::type_name::<T>().to_string(),
            reason: error.to_string(),
        })
}

fn to_string(value: &str) -> Result<ComponentValue, ConversionError> {
    Ok(ComponentValue::new(value.to_string()))
}

/// Converter supporting all primitive types and [String] out of the box. Additional types can be
/// registered with [add_from_str](Self::add_from_str).
pub struct DefaultConversionManager {
    conversions: RwLock<FxHashMap<TypeId, ConversionFunction>>,
}

impl Default for DefaultConversionManager {
    fn default() -> Self {
        let mut conversions: FxHashMap<TypeId, ConversionFunction> = Default::default();

        macro_rules! from_str {
            ($($ty:ty),*) => {
                $(conversions.insert(TypeId::of::<$ty>(), parse::<$ty>);)*
            };
        }

        from_str!(
            bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64
        );
        conversions.insert(TypeId::of::<String>(), to_string);

        Self {
            conversions: RwLock::new(conversions),
        }
    }
}

impl DefaultConversionManager {
    /// Adds support for a type with a [FromStr] implementation.
    pub fn add_from_str<T>(&self)
    where
        T: FromStr + Send + Sync + 'static,
        T::Err: Display,
    {
        self.conversions
            .write()
            .insert(TypeId::of::<T>(), parse::<T>);
    }
}

impl TypeConverter for DefaultConversionManager {
    fn can_handle(&self, target: &ServiceType) -> bool {
        self.conversions.read().contains_key(&target.id())
    }

    fn convert(&self, value: &str, target: &ServiceType) -> Result<ComponentValue, ConversionError> {
        let conversion = self
            .conversions
            .read()
            .get(&target.id())
            .copied()
            .ok_or_else(|| ConversionError::UnsupportedType(target.name().to_string()))?;

        conversion(value)
    }
}
