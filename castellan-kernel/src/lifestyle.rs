//! Lifestyle managers decide when instances are created and when they are let go. The kernel
//! comes with [singleton](SingletonLifestyleManager), [transient](TransientLifestyleManager) and
//! [per-thread](PerThreadLifestyleManager) lifestyles. Custom lifestyles are provided by named
//! [LifestyleManagerFactories](LifestyleManagerFactory).

use crate::activator::ComponentActivatorPtr;
use crate::component::{ComponentValue, InstancePtr};
use crate::component_model::ComponentModel;
use crate::context::CreationContext;
use crate::error::ResolutionError;
use crate::kernel::Kernel;
use fxhash::FxHashMap;
use itertools::Itertools;
#[cfg(test)]
use mockall::automock;
use parking_lot::{Mutex, ReentrantMutex};
use std::cell::RefCell;
use std::sync::Arc;
use std::thread::{self, ThreadId};

/// Manages instance sharing for a single component.
#[cfg_attr(test, automock)]
pub trait LifestyleManager: Send + Sync {
    /// Returns an instance, either a new or a shared one.
    fn resolve(
        &self,
        kernel: &Kernel,
        context: &mut CreationContext,
    ) -> Result<ComponentValue, ResolutionError>;

    /// Releases an instance. Returns `true` if the instance was destroyed, or `false` if the
    /// lifestyle keeps it alive.
    fn release(&self, instance: &InstancePtr) -> bool;

    /// Checks if instances should be released together with the component which required them.
    fn releases_with_owner(&self) -> bool;

    /// Destroys all instances kept alive.
    fn dispose(&self);
}

pub type LifestyleManagerPtr = Arc<dyn LifestyleManager>;

/// Creates managers for a custom lifestyle.
#[cfg_attr(test, automock)]
pub trait LifestyleManagerFactory: Send + Sync {
    fn create(
        &self,
        model: &Arc<ComponentModel>,
        activator: ComponentActivatorPtr,
    ) -> LifestyleManagerPtr;
}

pub type LifestyleManagerFactoryPtr = Arc<dyn LifestyleManagerFactory>;

/// Keeps a single instance for the whole lifetime of the kernel. Concurrent first resolutions wait
/// for the instance to be created, so it's created exactly once.
pub struct SingletonLifestyleManager {
    activator: ComponentActivatorPtr,
    // reentrant, so resolution cycles on the same thread fail in cycle detection instead of
    // deadlocking
    instance: ReentrantMutex<RefCell<Option<ComponentValue>>>,
}

impl SingletonLifestyleManager {
    pub fn new(activator: ComponentActivatorPtr) -> Self {
        Self {
            activator,
            instance: ReentrantMutex::new(RefCell::new(None)),
        }
    }
}

impl LifestyleManager for SingletonLifestyleManager {
    fn resolve(
        &self,
        kernel: &Kernel,
        context: &mut CreationContext,
    ) -> Result<ComponentValue, ResolutionError> {
        let instance = self.instance.lock();
        if let Some(value) = instance.borrow().as_ref() {
            return Ok(value.clone());
        }

        let value = self.activator.create(kernel, context)?;

        let existing = instance.borrow().clone();
        match existing {
            Some(existing) => {
                // created by a nested resolution with inline arguments
                self.activator.destroy(&value.instance);
                Ok(existing)
            }
            None => {
                *instance.borrow_mut() = Some(value.clone());
                Ok(value)
            }
        }
    }

    fn release(&self, _instance: &InstancePtr) -> bool {
        false
    }

    fn releases_with_owner(&self) -> bool {
        false
    }

    fn dispose(&self) {
        let value = self.instance.lock().borrow_mut().take();
        if let Some(value) = value {
            self.activator.destroy(&value.instance);
        }
    }
}

/// Creates a new instance on every request and destroys it on release.
pub struct TransientLifestyleManager {
    activator: ComponentActivatorPtr,
}

impl TransientLifestyleManager {
    pub fn new(activator: ComponentActivatorPtr) -> Self {
        Self { activator }
    }
}

impl LifestyleManager for TransientLifestyleManager {
    fn resolve(
        &self,
        kernel: &Kernel,
        context: &mut CreationContext,
    ) -> Result<ComponentValue, ResolutionError> {
        self.activator.create(kernel, context)
    }

    fn release(&self, instance: &InstancePtr) -> bool {
        self.activator.destroy(instance);
        true
    }

    fn releases_with_owner(&self) -> bool {
        true
    }

    fn dispose(&self) {}
}

/// Keeps one instance per calling thread. Instances are destroyed when the kernel is disposed.
pub struct PerThreadLifestyleManager {
    activator: ComponentActivatorPtr,
    instances: Mutex<FxHashMap<ThreadId, ComponentValue>>,
}

impl PerThreadLifestyleManager {
    pub fn new(activator: ComponentActivatorPtr) -> Self {
        Self {
            activator,
            instances: Default::default(),
        }
    }
}

impl LifestyleManager for PerThreadLifestyleManager {
    fn resolve(
        &self,
        kernel: &Kernel,
        context: &mut CreationContext,
    ) -> Result<ComponentValue, ResolutionError> {
        let thread_id = thread::current().id();
        if let Some(value) = self.instances.lock().get(&thread_id) {
            return Ok(value.clone());
        }

        let value = self.activator.create(kernel, context)?;

        let mut instances = self.instances.lock();
        if let Some(existing) = instances.get(&thread_id).cloned() {
            drop(instances);
            self.activator.destroy(&value.instance);
            return Ok(existing);
        }

        instances.insert(thread_id, value.clone());
        Ok(value)
    }

    fn release(&self, _instance: &InstancePtr) -> bool {
        false
    }

    fn releases_with_owner(&self) -> bool {
        false
    }

    fn dispose(&self) {
        let values = self
            .instances
            .lock()
            .drain()
            .map(|(_, value)| value)
            .collect_vec();

        for value in values {
            self.activator.destroy(&value.instance);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::activator::MockComponentActivator;
    use crate::component::ComponentValue;
    use crate::context::CreationContext;
    use crate::kernel::KernelBuilder;
    use crate::lifestyle::{
        LifestyleManager, PerThreadLifestyleManager, SingletonLifestyleManager,
        TransientLifestyleManager,
    };
    use std::sync::Arc;
    use std::thread;

    fn create_activator(creations: usize, destructions: usize) -> MockComponentActivator {
        let mut activator = MockComponentActivator::new();
        activator
            .expect_create()
            .times(creations)
            .returning(|_, _| Ok(ComponentValue::new(1u8)));
        activator.expect_destroy().times(destructions).return_const(());
        activator
    }

    #[test]
    fn should_create_singleton_once() {
        let kernel = KernelBuilder::new().build();
        let lifestyle = SingletonLifestyleManager::new(Arc::new(create_activator(1, 1)));

        let first = lifestyle
            .resolve(&kernel, &mut CreationContext::empty())
            .unwrap();
        let second = lifestyle
            .resolve(&kernel, &mut CreationContext::empty())
            .unwrap();

        assert_eq!(first.address(), second.address());
        assert!(!lifestyle.release(&first.instance));

        lifestyle.dispose();
        lifestyle.dispose();
    }

    #[test]
    fn should_create_transient_every_time() {
        let kernel = KernelBuilder::new().build();
        let lifestyle = TransientLifestyleManager::new(Arc::new(create_activator(2, 1)));

        let first = lifestyle
            .resolve(&kernel, &mut CreationContext::empty())
            .unwrap();
        let second = lifestyle
            .resolve(&kernel, &mut CreationContext::empty())
            .unwrap();

        assert_ne!(first.address(), second.address());
        assert!(lifestyle.release(&first.instance));
        assert!(lifestyle.releases_with_owner());
    }

    #[test]
    fn should_create_instance_per_thread() {
        let kernel = KernelBuilder::new().build();
        let lifestyle = PerThreadLifestyleManager::new(Arc::new(create_activator(2, 2)));

        let first = lifestyle
            .resolve(&kernel, &mut CreationContext::empty())
            .unwrap();
        let same = lifestyle
            .resolve(&kernel, &mut CreationContext::empty())
            .unwrap();
        let other = thread::scope(|scope| {
            scope
                .spawn(|| {
                    lifestyle
                        .resolve(&kernel, &mut CreationContext::empty())
                        .unwrap()
                })
                .join()
                .unwrap()
        });

        assert_eq!(first.address(), same.address());
        assert_ne!(first.address(), other.address());

        lifestyle.dispose();
    }
}
