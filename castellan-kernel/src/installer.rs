//! Installers group component registrations. They can be run explicitly with [install] or
//! registered statically and discovered with [install_registered]:
//!
//! ```
//! use castellan_kernel::component_model::dependency::ConstructorCandidate;
//! use castellan_kernel::component_model::ComponentModel;
//! use castellan_kernel::error::RegistrationError;
//! use castellan_kernel::installer::internal::{submit, InstallerRegisterer};
//! use castellan_kernel::installer::install_registered;
//! use castellan_kernel::kernel::{Kernel, KernelBuilder};
//!
//! #[derive(Default)]
//! struct Clock;
//!
//! fn install_clock(kernel: &Kernel) -> Result<(), RegistrationError> {
//!     kernel.register(
//!         ComponentModel::of::<Clock>("clock")
//!             .with_constructor(ConstructorCandidate::default_of::<Clock>()),
//!     )
//! }
//!
//! submit! {
//!     InstallerRegisterer {
//!         install: install_clock,
//!         priority: 0,
//!     }
//! }
//!
//! fn main() {
//!     let kernel = KernelBuilder::new().build();
//!     install_registered(&kernel).unwrap();
//!     assert!(kernel.has_component("clock"));
//! }
//! ```

use crate::error::RegistrationError;
use crate::installer::internal::InstallerRegisterer;
use crate::kernel::Kernel;
use itertools::Itertools;
#[cfg(test)]
use mockall::automock;
use tracing::debug;

/// A group of registrations.
#[cfg_attr(test, automock)]
pub trait Installer {
    fn install(&self, kernel: &Kernel) -> Result<(), RegistrationError>;
}

/// Runs given installers in order, stopping at the first failure.
pub fn install(kernel: &Kernel, installers: &[&dyn Installer]) -> Result<(), RegistrationError> {
    installers
        .iter()
        .try_for_each(|installer| installer.install(kernel))
}

/// Runs all statically registered installers, higher priority first.
pub fn install_registered(kernel: &Kernel) -> Result<(), RegistrationError> {
    let registerers = inventory::iter::<InstallerRegisterer>
        .into_iter()
        .sorted_by_key(|registerer| -(registerer.priority as i16))
        .collect_vec();

    debug!(count = registerers.len(), "Running registered installers.");

    registerers
        .into_iter()
        .try_for_each(|registerer| (registerer.install)(kernel))
}

#[doc(hidden)]
pub mod internal {
    use crate::error::RegistrationError;
    use crate::kernel::Kernel;
    use inventory::collect;
    pub use inventory::submit;

    pub struct InstallerRegisterer {
        pub install: fn(&Kernel) -> Result<(), RegistrationError>,
        pub priority: i8,
    }

    collect!(InstallerRegisterer);
}
