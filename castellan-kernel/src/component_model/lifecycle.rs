//! Lifecycle concerns run on instances right after construction (commission) and right before they
//! are let go (decommission). Interface-based hooks are bound through capability lookups captured
//! when the concern is created. A lookup which doesn't match the runtime type of an instance simply
//! skips the concern, which makes all concerns late-bound: they can be attached to components built
//! by factory methods, whose concrete type is known only after creation.

use crate::error::ErrorPtr;
use std::any::Any;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use tracing::warn;

/// Components which need to initialize themselves after all dependencies are injected.
pub trait Initializable {
    fn initialize(&mut self) -> Result<(), ErrorPtr>;
}

/// Components which support batched initialization, with explicit begin and end markers.
pub trait SupportsInitialize {
    fn begin_init(&mut self);

    fn end_init(&mut self) -> Result<(), ErrorPtr>;
}

/// Components which need to release resources when the container lets them go.
pub trait Disposable {
    fn dispose(&self);
}

pub type InitializableLookup =
    fn(instance: &mut (dyn Any + Send + Sync)) -> Option<&mut dyn Initializable>;
pub type SupportsInitializeLookup =
    fn(instance: &mut (dyn Any + Send + Sync)) -> Option<&mut dyn SupportsInitialize>;
pub type DisposableLookup = fn(instance: &(dyn Any + Send + Sync)) -> Option<&dyn Disposable>;

pub type CommissionCallback =
    Arc<dyn Fn(&mut (dyn Any + Send + Sync)) -> Result<(), ErrorPtr> + Send + Sync>;
pub type DecommissionCallback =
    Arc<dyn Fn(&(dyn Any + Send + Sync)) -> Result<(), ErrorPtr> + Send + Sync>;

fn lookup_initializable<T: Initializable + Any>(
    instance: &mut (dyn Any + Send + Sync),
) -> Option<&mut dyn Initializable> {
    instance
        .downcast_mut::<T>()
        .map(|instance| instance as &mut dyn Initializable)
}

fn lookup_supports_initialize<T: SupportsInitialize + Any>(
    instance: &mut (dyn Any + Send + Sync),
) -> Option<&mut dyn SupportsInitialize> {
    instance
        .downcast_mut::<T>()
        .map(|instance| instance as &mut dyn SupportsInitialize)
}

fn lookup_disposable<T: Disposable + Any>(
    instance: &(dyn Any + Send + Sync),
) -> Option<&dyn Disposable> {
    instance
        .downcast_ref::<T>()
        .map(|instance| instance as &dyn Disposable)
}

#[inline]
fn same_callback<T: ?Sized>(first: &Arc<T>, second: &Arc<T>) -> bool {
    Arc::as_ptr(first) as *const () == Arc::as_ptr(second) as *const ()
}

/// Concern applied after an instance is constructed and its properties are set.
#[derive(Clone)]
pub enum CommissionConcern {
    Initialize(InitializableLookup),
    SupportsInitializeBegin(SupportsInitializeLookup),
    SupportsInitializeEnd(SupportsInitializeLookup),
    Custom(CommissionCallback),
}

impl CommissionConcern {
    pub fn initialize<T: Initializable + Any>() -> Self {
        Self::Initialize(lookup_initializable::<T>)
    }

    /// Returns the begin/end pair for [SupportsInitialize] components.
    pub fn supports_initialize<T: SupportsInitialize + Any>() -> [Self; 2] {
        [
            Self::SupportsInitializeBegin(lookup_supports_initialize::<T>),
            Self::SupportsInitializeEnd(lookup_supports_initialize::<T>),
        ]
    }

    pub fn custom<F>(callback: F) -> Self
    where
        F: Fn(&mut (dyn Any + Send + Sync)) -> Result<(), ErrorPtr> + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(callback))
    }

    /// Typed callback run on every newly created instance of `T`.
    pub fn on_create<T, F>(callback: F) -> Self
    where
        T: Any,
        F: Fn(&mut T) -> Result<(), ErrorPtr> + Send + Sync + 'static,
    {
        Self::custom(move |instance| match instance.downcast_mut::<T>() {
            Some(instance) => callback(instance),
            None => Ok(()),
        })
    }

    pub fn apply(&self, instance: &mut (dyn Any + Send + Sync)) -> Result<(), ErrorPtr> {
        match self {
            Self::Initialize(lookup) => lookup(instance).map_or(Ok(()), |i| i.initialize()),
            Self::SupportsInitializeBegin(lookup) => {
                if let Some(instance) = lookup(instance) {
                    instance.begin_init();
                }

                Ok(())
            }
            Self::SupportsInitializeEnd(lookup) => {
                lookup(instance).map_or(Ok(()), |i| i.end_init())
            }
            Self::Custom(callback) => callback(instance),
        }
    }

    fn is_same(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Initialize(first), Self::Initialize(second)) => {
                *first as usize == *second as usize
            }
            (Self::SupportsInitializeBegin(first), Self::SupportsInitializeBegin(second))
            | (Self::SupportsInitializeEnd(first), Self::SupportsInitializeEnd(second)) => {
                *first as usize == *second as usize
            }
            (Self::Custom(first), Self::Custom(second)) => same_callback(first, second),
            _ => false,
        }
    }
}

impl Debug for CommissionConcern {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Initialize(_) => "Initialize",
            Self::SupportsInitializeBegin(_) => "SupportsInitializeBegin",
            Self::SupportsInitializeEnd(_) => "SupportsInitializeEnd",
            Self::Custom(_) => "Custom",
        })
    }
}

/// Concern applied to a shared instance when it is released.
#[derive(Clone)]
pub enum DecommissionConcern {
    Dispose(DisposableLookup),
    Custom(DecommissionCallback),
}

impl DecommissionConcern {
    pub fn dispose<T: Disposable + Any>() -> Self {
        Self::Dispose(lookup_disposable::<T>)
    }

    pub fn custom<F>(callback: F) -> Self
    where
        F: Fn(&(dyn Any + Send + Sync)) -> Result<(), ErrorPtr> + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(callback))
    }

    /// Typed callback run on every released instance of `T`.
    pub fn on_destroy<T, F>(callback: F) -> Self
    where
        T: Any,
        F: Fn(&T) -> Result<(), ErrorPtr> + Send + Sync + 'static,
    {
        Self::custom(move |instance| match instance.downcast_ref::<T>() {
            Some(instance) => callback(instance),
            None => Ok(()),
        })
    }

    pub fn apply(&self, instance: &(dyn Any + Send + Sync)) -> Result<(), ErrorPtr> {
        match self {
            Self::Dispose(lookup) => {
                if let Some(instance) = lookup(instance) {
                    instance.dispose();
                }

                Ok(())
            }
            Self::Custom(callback) => callback(instance),
        }
    }

    fn is_same(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Dispose(first), Self::Dispose(second)) => *first as usize == *second as usize,
            (Self::Custom(first), Self::Custom(second)) => same_callback(first, second),
            _ => false,
        }
    }
}

impl Debug for DecommissionConcern {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Dispose(_) => "Dispose",
            Self::Custom(_) => "Custom",
        })
    }
}

/// Ordered commission and decommission concerns of a component.
#[derive(Clone, Default, Debug)]
pub struct LifecycleConcerns {
    commission: Vec<CommissionConcern>,
    decommission: Vec<DecommissionConcern>,
}

impl LifecycleConcerns {
    pub fn add_commission(&mut self, concern: CommissionConcern) {
        self.commission.push(concern);
    }

    pub fn add_decommission(&mut self, concern: DecommissionConcern) {
        self.decommission.push(concern);
    }

    /// Adds a concern unless the very same one is already present.
    pub fn add_commission_if_absent(&mut self, concern: CommissionConcern) {
        if !self.commission.iter().any(|other| other.is_same(&concern)) {
            self.commission.push(concern);
        }
    }

    /// Adds a concern unless the very same one is already present.
    pub fn add_decommission_if_absent(&mut self, concern: DecommissionConcern) {
        if !self.decommission.iter().any(|other| other.is_same(&concern)) {
            self.decommission.push(concern);
        }
    }

    #[inline]
    pub fn commission_concerns(&self) -> &[CommissionConcern] {
        &self.commission
    }

    #[inline]
    pub fn decommission_concerns(&self) -> &[DecommissionConcern] {
        &self.decommission
    }

    #[inline]
    pub fn has_commission_concerns(&self) -> bool {
        !self.commission.is_empty()
    }

    #[inline]
    pub fn has_decommission_concerns(&self) -> bool {
        !self.decommission.is_empty()
    }

    /// Runs all commission concerns in order, stopping at the first failure.
    pub fn commission(&self, instance: &mut (dyn Any + Send + Sync)) -> Result<(), ErrorPtr> {
        self.commission
            .iter()
            .try_for_each(|concern| concern.apply(instance))
    }

    /// Runs all decommission concerns in order. Failures are logged and do not stop the remaining
    /// concerns.
    pub fn decommission(&self, component: &str, instance: &(dyn Any + Send + Sync)) {
        for concern in &self.decommission {
            if let Err(error) = concern.apply(instance) {
                warn!(component, %error, "Error running decommission concern.");
            }
        }
    }
}
