//! Inversion of control container based on [castellan_kernel].
//!
//! The kernel on its own is a low-level registry, which needs to be configured and populated
//! explicitly. This crate provides a ready-to-use [Container](container::Container), which loads
//! its [configuration](config::ContainerConfig) from a file and the environment, installs a
//! logger, registers the collection resolver and runs all statically registered
//! [installers](castellan_kernel::installer).

pub mod config;
pub mod container;

pub use castellan_kernel as kernel;
