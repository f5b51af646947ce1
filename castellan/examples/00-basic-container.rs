use castellan::container::Container;
use castellan::kernel::component::InstanceBox;
use castellan::kernel::component_model::dependency::{ConstructorCandidate, DependencyModel};
use castellan::kernel::component_model::ComponentModel;
use castellan::kernel::error::RegistrationError;
use castellan::kernel::installer::internal::{submit, InstallerRegisterer};
use castellan::kernel::kernel::Kernel;
use std::sync::Arc;

#[derive(Default)]
struct Plugin(u8);

struct PluginHost {
    plugins: Vec<Arc<Plugin>>,
}

// installers group registrations and can be discovered automatically
fn install_plugins(kernel: &Kernel) -> Result<(), RegistrationError> {
    kernel.register_instance::<Plugin, _>("first", Arc::new(Plugin(1)))?;
    kernel.register_instance::<Plugin, _>("second", Arc::new(Plugin(2)))?;

    kernel.register(
        ComponentModel::of::<PluginHost>("host").with_constructor(
            ConstructorCandidate::new(|arguments| {
                Ok(Box::new(PluginHost {
                    plugins: arguments.value::<Vec<Arc<Plugin>>>(0)?,
                }) as InstanceBox)
            })
            // collections are filled with all components providing the item service
            .with_dependency(DependencyModel::collection::<Plugin>()),
        ),
    )
}

submit! {
    InstallerRegisterer {
        install: install_plugins,
        priority: 0,
    }
}

fn main() {
    // the container reads castellan.json and CASTELLAN_* environment variables, installs a logger
    // and runs all registered installers
    let container = Container::from_environment().expect("error creating container");

    let host = container
        .resolve::<PluginHost>()
        .expect("error creating PluginHost");

    // prints "Loaded plugins: [1, 2]"
    println!(
        "Loaded plugins: {:?}",
        host.plugins.iter().map(|plugin| plugin.0).collect::<Vec<_>>()
    );
}
