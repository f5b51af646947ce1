use castellan_kernel::component::{
    instance_address, GenericService, InstanceBox, InstancePtr, ServiceDowncast, ServiceType,
};
use castellan_kernel::component_model::dependency::{ConstructorCandidate, DependencyModel};
use castellan_kernel::component_model::lifecycle::DecommissionConcern;
use castellan_kernel::component_model::{ComponentModel, Lifestyle};
use castellan_kernel::error::{RegistrationError, ResolutionError};
use castellan_kernel::kernel::KernelBuilder;
use std::any::type_name;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

trait Repository<T>: Send + Sync {
    fn entity(&self) -> &'static str;
}

impl<T: 'static> GenericService for dyn Repository<T> {
    const DEFINITION: &'static str = "Repository";

    fn generic_arguments() -> Vec<ServiceType> {
        vec![ServiceType::of::<T>()]
    }
}

struct MemoryRepository<T>(PhantomData<fn() -> T>);

impl<T: 'static> Repository<T> for MemoryRepository<T> {
    fn entity(&self) -> &'static str {
        type_name::<T>()
    }
}

impl<T: 'static> ServiceDowncast<MemoryRepository<T>> for dyn Repository<T> {
    fn downcast(instance: InstancePtr) -> Result<Arc<Self>, InstancePtr> {
        instance
            .downcast::<MemoryRepository<T>>()
            .map(|instance| instance as Arc<Self>)
    }
}

fn repository_model<T: 'static>() -> ComponentModel {
    ComponentModel::new::<dyn Repository<T>, MemoryRepository<T>>("closed").with_constructor(
        ConstructorCandidate::new(|_| {
            Ok(Box::new(MemoryRepository::<T>(PhantomData)) as InstanceBox)
        }),
    )
}

fn close_repository(arguments: &[ServiceType]) -> Option<ComponentModel> {
    match arguments {
        [argument] if argument.is::<u32>() => Some(repository_model::<u32>()),
        [argument] if argument.is::<String>() => Some(repository_model::<String>()),
        _ => None,
    }
}

fn open_repository_model() -> ComponentModel {
    ComponentModel::open_generic("repository", "Repository", close_repository)
}

struct UserService {
    users: Arc<dyn Repository<String>>,
}

#[test]
fn should_close_generic_components_on_demand() {
    let kernel = KernelBuilder::new().build();
    kernel.register(open_repository_model()).unwrap();

    let numbers = kernel.resolve_generic::<dyn Repository<u32>>().unwrap();
    let names = kernel.resolve_generic::<dyn Repository<String>>().unwrap();

    assert_eq!(numbers.entity(), "u32");
    assert_eq!(names.entity(), type_name::<String>());

    // closed components inherit the singleton lifestyle of the open one
    let again = kernel.resolve_generic::<dyn Repository<u32>>().unwrap();
    assert_eq!(instance_address(&numbers), instance_address(&again));
}

#[test]
fn should_reject_unsupported_arguments() {
    let kernel = KernelBuilder::new().build();
    kernel.register(open_repository_model()).unwrap();

    assert!(matches!(
        kernel.resolve_generic::<dyn Repository<u8>>(),
        Err(ResolutionError::CannotCloseGeneric { .. })
    ));
}

#[test]
fn should_inject_closed_generic_dependencies() {
    let kernel = KernelBuilder::new().build();
    kernel
        .register(
            ComponentModel::of::<UserService>("users").with_constructor(
                ConstructorCandidate::new(|arguments| {
                    Ok(Box::new(UserService {
                        users: arguments.service::<dyn Repository<String>>(0)?,
                    }) as InstanceBox)
                })
                .with_dependency(DependencyModel::generic_service::<dyn Repository<String>>()),
            ),
        )
        .unwrap();

    assert_eq!(kernel.waiting_components().len(), 1);

    kernel.register(open_repository_model()).unwrap();

    assert!(kernel.waiting_components().is_empty());
    assert_eq!(
        kernel.resolve::<UserService>().unwrap().users.entity(),
        type_name::<String>()
    );
}

#[test]
fn should_propagate_concerns_to_closed_components() {
    let destroyed = Arc::new(AtomicUsize::new(0));
    let counter = destroyed.clone();

    let kernel = KernelBuilder::new().build();
    kernel
        .register(
            open_repository_model()
                .with_lifestyle(Lifestyle::Transient)
                .with_decommission(DecommissionConcern::custom(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })),
        )
        .unwrap();

    let first = kernel.resolve_generic::<dyn Repository<u32>>().unwrap();
    let second = kernel.resolve_generic::<dyn Repository<u32>>().unwrap();
    assert_ne!(instance_address(&first), instance_address(&second));
    assert!(kernel.is_tracked(&first));

    kernel.release(&first);
    assert_eq!(destroyed.load(Ordering::SeqCst), 1);

    kernel.dispose();
    assert_eq!(destroyed.load(Ordering::SeqCst), 2);
}

#[test]
fn should_require_closer_for_open_services() {
    let kernel = KernelBuilder::new().build();
    let mut model = open_repository_model();
    model.generic = None;

    assert_eq!(
        kernel.register(model),
        Err(RegistrationError::MissingGenericCloser("repository".to_string()))
    );
}
