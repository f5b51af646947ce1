//! Container configuration. By default, the config is created with opinionated default values,
//! which can then be overwritten by environment variables prefixed with `CASTELLAN_` or the
//! `castellan.json` file.

use castellan_kernel::component_model::Lifestyle;
use castellan_kernel::context::DEFAULT_MAX_DEPTH;
use castellan_kernel::kernel::{KernelConfig, ReleasePolicyKind};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

const CONFIG_ENV_PREFIX: &str = "CASTELLAN";

/// Name of the default config file.
pub const CONFIG_FILE: &str = "castellan.json";

/// Container configuration. It's also registered in the kernel as the `containerConfig` component,
/// so it can be injected into other components.
#[non_exhaustive]
#[derive(Clone, Debug)]
pub struct ContainerConfig {
    /// Should a default tracing logger be installed when the container is created.
    pub install_tracing_logger: bool,
    /// Lifestyle of components which don't specify one.
    pub default_lifestyle: Lifestyle,
    pub max_resolution_depth: usize,
    pub release_policy: ReleasePolicyKind,
    /// Should collection dependencies be satisfied with all components of the item service.
    pub register_collection_resolver: bool,
    /// Can collection dependencies be satisfied with no items.
    pub allow_empty_collections: bool,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            install_tracing_logger: true,
            default_lifestyle: Lifestyle::Singleton,
            max_resolution_depth: DEFAULT_MAX_DEPTH,
            release_policy: ReleasePolicyKind::Lifecycled,
            register_collection_resolver: true,
            allow_empty_collections: false,
        }
    }
}

impl TryFrom<OptionalContainerConfig> for ContainerConfig {
    type Error = ConfigError;

    fn try_from(value: OptionalContainerConfig) -> Result<Self, Self::Error> {
        let default = Self::default();
        Ok(Self {
            install_tracing_logger: value
                .install_tracing_logger
                .unwrap_or(default.install_tracing_logger),
            default_lifestyle: value
                .default_lifestyle
                .map(|lifestyle| parse_default_lifestyle(&lifestyle))
                .transpose()?
                .flatten()
                .unwrap_or(default.default_lifestyle),
            max_resolution_depth: value
                .max_resolution_depth
                .unwrap_or(default.max_resolution_depth),
            release_policy: value
                .release_policy
                .map(|policy| policy.parse::<ReleasePolicyKind>().map_err(ConfigError::Message))
                .transpose()?
                .unwrap_or(default.release_policy),
            register_collection_resolver: value
                .register_collection_resolver
                .unwrap_or(default.register_collection_resolver),
            allow_empty_collections: value
                .allow_empty_collections
                .unwrap_or(default.allow_empty_collections),
        })
    }
}

// custom lifestyles need factories registered in code, so only built-in ones are accepted
fn parse_default_lifestyle(value: &str) -> Result<Option<Lifestyle>, ConfigError> {
    match value.parse::<Lifestyle>() {
        Ok(Lifestyle::Undefined) => Ok(None),
        Ok(Lifestyle::Custom(_)) => Err(ConfigError::Message(format!(
            "Unknown default lifestyle: {value}"
        ))),
        Ok(lifestyle) => Ok(Some(lifestyle)),
        Err(error) => match error {},
    }
}

impl ContainerConfig {
    /// Loads the config from the default config file and environment.
    pub fn init_from_environment() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(Environment::with_prefix(CONFIG_ENV_PREFIX))
            .build()
            .and_then(|config| config.try_deserialize::<OptionalContainerConfig>())
            .and_then(|config| config.try_into())
    }

    /// Settings for the underlying kernel.
    pub fn kernel_config(&self) -> KernelConfig {
        KernelConfig {
            default_lifestyle: self.default_lifestyle.clone(),
            max_resolution_depth: self.max_resolution_depth,
            release_policy: self.release_policy,
        }
    }
}

#[derive(Deserialize, Default)]
struct OptionalContainerConfig {
    install_tracing_logger: Option<bool>,
    default_lifestyle: Option<String>,
    max_resolution_depth: Option<usize>,
    release_policy: Option<String>,
    register_collection_resolver: Option<bool>,
    allow_empty_collections: Option<bool>,
}
