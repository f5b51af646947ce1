// note: this example assumes you've analyzed the previous one

use castellan::config::ContainerConfig;
use castellan::container::{Container, CONFIG_COMPONENT_NAME};
use castellan::kernel::component_model::Lifestyle;

fn main() {
    // start with a default config and override what's needed
    let mut config = ContainerConfig::default();
    config.install_tracing_logger = false;
    config.default_lifestyle = Lifestyle::Transient;

    let container = Container::from_config(config).expect("error creating container");

    // the config is registered as a component, so it can be injected anywhere
    let config = container
        .resolve_named::<ContainerConfig>(CONFIG_COMPONENT_NAME)
        .expect("error resolving config");

    // prints "Using built-in logger: false"
    println!("Using built-in logger: {}", config.install_tracing_logger);
}
