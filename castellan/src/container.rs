//! Main entrypoint for applications using the container.

use crate::config::ContainerConfig;
use castellan_kernel::component_model::ComponentModel;
use castellan_kernel::context::Arguments;
use castellan_kernel::error::{convert_error, ErrorPtr, RegistrationError, ResolutionError};
use castellan_kernel::installer::{install, install_registered, Installer};
use castellan_kernel::kernel::{Kernel, KernelBuilder};
use castellan_kernel::resolver::list::ListResolver;
use derive_more::Constructor;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Name under which the [ContainerConfig] is registered.
pub const CONFIG_COMPONENT_NAME: &str = "containerConfig";

#[derive(Clone, Error, Debug)]
pub enum ContainerError {
    #[error("Error loading configuration: {0}")]
    Configuration(ErrorPtr),
    #[error(transparent)]
    Registration(#[from] RegistrationError),
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
}

fn install_tracing_logger() {
    // another subscriber might already be installed
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

/// A [Kernel] configured from [ContainerConfig], with all statically registered installers run.
#[derive(Constructor)]
pub struct Container {
    kernel: Kernel,
    config: ContainerConfig,
}

impl Container {
    /// Creates a container with config loaded from the environment.
    pub fn from_environment() -> Result<Self, ContainerError> {
        let config = ContainerConfig::init_from_environment()
            .map_err(|error| ContainerError::Configuration(convert_error(error)))?;

        Self::from_config(config)
    }

    pub fn from_config(config: ContainerConfig) -> Result<Self, ContainerError> {
        Self::from_builder(config, KernelBuilder::new())
    }

    /// Creates a container using a customized kernel builder. Kernel settings from given config
    /// replace the ones in the builder.
    pub fn from_builder(
        config: ContainerConfig,
        builder: KernelBuilder,
    ) -> Result<Self, ContainerError> {
        if config.install_tracing_logger {
            install_tracing_logger();
        }

        let mut builder = builder.with_config(config.kernel_config());
        if config.register_collection_resolver {
            builder = builder.with_sub_resolver(Arc::new(ListResolver::new(
                config.allow_empty_collections,
            )));
        }

        let kernel = builder.build();
        kernel.register_instance::<ContainerConfig, _>(
            CONFIG_COMPONENT_NAME,
            Arc::new(config.clone()),
        )?;

        install_registered(&kernel)?;

        for (component, missing) in kernel.waiting_components() {
            warn!(%component, ?missing, "Component is waiting for dependencies.");
        }

        info!("Container initialized.");

        Ok(Self::new(kernel, config))
    }

    #[inline]
    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    #[inline]
    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    pub fn register(&self, model: ComponentModel) -> Result<(), ContainerError> {
        self.kernel.register(model).map_err(Into::into)
    }

    pub fn install(&self, installers: &[&dyn Installer]) -> Result<(), ContainerError> {
        install(&self.kernel, installers).map_err(Into::into)
    }

    pub fn resolve<T: ?Sized + 'static>(&self) -> Result<Arc<T>, ContainerError> {
        self.kernel.resolve::<T>().map_err(Into::into)
    }

    pub fn resolve_with<T: ?Sized + 'static>(
        &self,
        arguments: Arguments,
    ) -> Result<Arc<T>, ContainerError> {
        self.kernel.resolve_with::<T>(arguments).map_err(Into::into)
    }

    pub fn resolve_named<T: ?Sized + 'static>(&self, name: &str) -> Result<Arc<T>, ContainerError> {
        self.kernel.resolve_named::<T>(name).map_err(Into::into)
    }

    pub fn resolve_all<T: ?Sized + 'static>(&self) -> Result<Vec<Arc<T>>, ContainerError> {
        self.kernel.resolve_all::<T>().map_err(Into::into)
    }

    pub fn release<T: ?Sized>(&self, instance: &Arc<T>) {
        self.kernel.release(instance);
    }

    /// Releases everything tracked and disposes all components. Also happens on drop.
    pub fn dispose(&self) {
        info!("Disposing container.");
        self.kernel.dispose();
    }
}
