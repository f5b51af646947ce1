// note: this example assumes you've analyzed the previous one

use castellan_kernel::component::InstanceBox;
use castellan_kernel::component_model::configuration::Configuration;
use castellan_kernel::component_model::dependency::{ConstructorCandidate, DependencyModel};
use castellan_kernel::component_model::{ComponentModel, Lifestyle};
use castellan_kernel::context::Arguments;
use castellan_kernel::kernel::KernelBuilder;

struct Greeter {
    greeting: String,
    name: String,
}

fn main() {
    let kernel = KernelBuilder::new().build();

    kernel
        .register(
            ComponentModel::of::<Greeter>("greeter")
                // a component can have many constructors, the one with most satisfiable
                // dependencies is used
                .with_constructor(
                    ConstructorCandidate::new(|arguments| {
                        Ok(Box::new(Greeter {
                            greeting: arguments.value::<String>(0)?,
                            name: "world".to_string(),
                        }) as InstanceBox)
                    })
                    .with_dependency(DependencyModel::parameter::<String, _>("greeting")),
                )
                .with_constructor(
                    ConstructorCandidate::new(|arguments| {
                        Ok(Box::new(Greeter {
                            greeting: arguments.value::<String>(0)?,
                            name: arguments.value::<String>(1)?,
                        }) as InstanceBox)
                    })
                    .with_dependency(DependencyModel::parameter::<String, _>("greeting"))
                    .with_dependency(DependencyModel::parameter::<String, _>("name")),
                )
                // parameters can come from configuration
                .with_configuration(Configuration::with_parameters(
                    "greeter",
                    [("greeting", "Hello")],
                ))
                .with_lifestyle(Lifestyle::Transient),
        )
        .expect("error registering Greeter");

    let greeter = kernel
        .resolve::<Greeter>()
        .expect("error creating Greeter");

    // prints "Hello world!"
    println!("{} {}!", greeter.greeting, greeter.name);

    // or be passed inline, which makes the greedier constructor satisfiable
    let greeter = kernel
        .resolve_with::<Greeter>(Arguments::new().with_named("name", "castellan".to_string()))
        .expect("error creating Greeter");

    // prints "Hello castellan!"
    println!("{} {}!", greeter.greeting, greeter.name);
}
