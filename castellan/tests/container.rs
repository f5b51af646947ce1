use castellan::config::ContainerConfig;
use castellan::container::{Container, ContainerError};
use castellan::kernel::component::InstanceBox;
use castellan::kernel::component_model::dependency::{ConstructorCandidate, DependencyModel};
use castellan::kernel::component_model::ComponentModel;
use castellan::kernel::error::{RegistrationError, ResolutionError};
use castellan::kernel::installer::internal::{submit, InstallerRegisterer};
use castellan::kernel::installer::Installer;
use castellan::kernel::kernel::Kernel;
use std::sync::Arc;

#[derive(Default)]
struct Settings {
    retries: u8,
}

struct Worker {
    settings: Arc<Settings>,
}

fn install_settings(kernel: &Kernel) -> Result<(), RegistrationError> {
    kernel.register_instance::<Settings, _>("settings", Arc::new(Settings { retries: 3 }))
}

fn install_worker(kernel: &Kernel) -> Result<(), RegistrationError> {
    kernel.register(
        ComponentModel::of::<Worker>("worker").with_constructor(
            ConstructorCandidate::new(|arguments| {
                Ok(Box::new(Worker {
                    settings: arguments.service::<Settings>(0)?,
                }) as InstanceBox)
            })
            .with_dependency(DependencyModel::service::<Settings>()),
        ),
    )
}

submit! {
    InstallerRegisterer {
        install: install_worker,
        priority: 0,
    }
}

submit! {
    InstallerRegisterer {
        install: install_settings,
        priority: 10,
    }
}

fn test_config() -> ContainerConfig {
    let mut config = ContainerConfig::default();
    config.install_tracing_logger = false;
    config
}

#[test]
fn should_run_registered_installers() {
    let container = Container::from_config(test_config()).unwrap();

    assert_eq!(container.resolve::<Worker>().unwrap().settings.retries, 3);
    assert!(container.kernel().waiting_components().is_empty());
}

struct CounterInstaller;

impl Installer for CounterInstaller {
    fn install(&self, kernel: &Kernel) -> Result<(), RegistrationError> {
        kernel.register(
            ComponentModel::of::<u64>("counter")
                .with_constructor(ConstructorCandidate::default_of::<u64>()),
        )
    }
}

#[test]
fn should_run_explicit_installers() {
    let container = Container::from_config(test_config()).unwrap();
    container.install(&[&CounterInstaller]).unwrap();

    assert_eq!(*container.resolve::<u64>().unwrap(), 0);
    assert!(matches!(
        container.install(&[&CounterInstaller]),
        Err(ContainerError::Registration(
            RegistrationError::DuplicateComponentName(_)
        ))
    ));
}

#[test]
fn should_fail_after_dispose() {
    let container = Container::from_config(test_config()).unwrap();
    container.dispose();

    assert!(matches!(
        container.resolve::<Worker>(),
        Err(ContainerError::Resolution(ResolutionError::KernelDisposed))
    ));
}
