#![allow(clippy::new_without_default)]

pub mod container;
pub mod key;
pub mod module;
pub mod policy;
pub mod provider;
pub mod scope;
mod util;

pub mod prelude {
    pub use crate::container::injector::{InjectorError, TypedInjector};
    pub use crate::container::registry::{Binder, JitComponents, RegistryError};
    pub use crate::container::{Container, ContainerBuilder};
    pub use crate::key;
    pub use crate::module::{dsl, Configuration, Module};
    pub use crate::policy::WiringPolicy;
    pub use crate::provider::component::Component;
    pub use crate::scope::{ScopeEventKind, ScopeEventListener};
}
