//! Inversion of control kernel. Components are described by
//! [ComponentModels](component_model::ComponentModel) and registered in a [Kernel](kernel::Kernel),
//! which creates a [handler](handler::Handler) for each of them. Handlers track whether their
//! dependencies can be satisfied and resolve instances through
//! [lifestyle managers](lifestyle::LifestyleManager) and
//! [activators](activator::ComponentActivator). Dependencies are looked up by the
//! [resolver chain](resolver::DependencyResolver), and instances requiring cleanup are tracked by
//! a [release policy](release::ReleasePolicy) until released.

pub mod activator;
pub mod component;
pub mod component_model;
pub mod context;
pub mod conversion;
pub mod error;
pub mod handler;
pub mod installer;
pub mod kernel;
pub mod lifestyle;
pub mod proxy;
pub mod release;
pub mod resolver;
