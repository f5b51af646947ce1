use castellan_kernel::component::InstanceBox;
use castellan_kernel::component_model::dependency::{ConstructorCandidate, DependencyModel};
use castellan_kernel::component_model::ComponentModel;
use castellan_kernel::kernel::KernelBuilder;
use castellan_kernel::service_alias;
use std::sync::Arc;

// this is a trait we would like to use in our component
trait TestTrait: Send + Sync {
    fn foo(&self);
}

// this is a dependency which implements the above trait
#[derive(Default)]
struct TestDependency;

impl TestTrait for TestDependency {
    fn foo(&self) {
        println!("Hello world!");
    }
}

// we're telling the kernel TestDependency can be provided when asked for dyn TestTrait
service_alias!(TestDependency => dyn TestTrait);

// this is another component, but with a dependency
struct TestComponent {
    dependency: Arc<dyn TestTrait>,
}

impl TestComponent {
    fn call_foo(&self) {
        self.dependency.foo();
    }
}

// note: for the sake of simplicity, errors are unwrapped, rather than gracefully handled
fn main() {
    let kernel = KernelBuilder::new().build();

    // components are described by models: what service they provide, how to construct them and
    // what they depend on
    kernel
        .register(
            ComponentModel::new::<dyn TestTrait, TestDependency>("dependency")
                .with_constructor(ConstructorCandidate::default_of::<TestDependency>()),
        )
        .expect("error registering TestDependency");

    kernel
        .register(
            ComponentModel::of::<TestComponent>("component").with_constructor(
                // resolved dependencies are passed to the constructor in declaration order
                ConstructorCandidate::new(|arguments| {
                    Ok(Box::new(TestComponent {
                        dependency: arguments.service::<dyn TestTrait>(0)?,
                    }) as InstanceBox)
                })
                .with_dependency(DependencyModel::service::<dyn TestTrait>()),
            ),
        )
        .expect("error registering TestComponent");

    let component = kernel
        .resolve::<TestComponent>()
        .expect("error creating TestComponent");

    // prints "Hello world!"
    component.call_foo();
}
