pub mod dsl;

use std::any;
use std::error::Error;
use std::fmt::{Debug, Formatter, Result as FmtResult};

use crate::container::registry::Binder;

/// A reusable bundle of binding registrations.
///
/// ```rust
/// # use std::error::Error;
/// # use bindery::container::registry::Binder;
/// # use bindery::module::{dsl, Module};
/// struct AppModule;
///
/// impl Module for AppModule {
///     fn configure(&self, binder: &mut Binder<'_>) -> Result<(), Box<dyn Error + Send + Sync>> {
///         dsl::instance(42i32).set_on(binder);
///         Ok(())
///     }
/// }
/// ```
pub trait Module: Send + Sync + 'static {
    /// Registers this module's bindings on the binder.
    ///
    /// # Errors
    ///
    /// Returns an error if the module cannot set its configuration up, for
    /// example because a resource it binds instances of is unavailable. The
    /// error is attributed to this module and aggregated with every other
    /// registration failure.
    fn configure(&self, binder: &mut Binder<'_>) -> Result<(), Box<dyn Error + Send + Sync>>;
}

/// An ordered collection of modules installed together. Later modules
/// see (and may replace) the bindings of earlier ones.
#[derive(Default)]
pub struct Configuration {
    modules: Vec<(&'static str, Box<dyn Module>)>,
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<M>(mut self, module: M) -> Self
    where
        M: Module,
    {
        self.modules.push((any::type_name::<M>(), Box::new(module)));
        self
    }

    pub(crate) fn apply(&self, binder: &mut Binder<'_>) {
        for (name, module) in &self.modules {
            if let Err(err) = module.configure(binder) {
                binder.report_module_error(name, err);
            }
        }
    }
}

impl<M> From<M> for Configuration
where
    M: Module,
{
    fn from(module: M) -> Self {
        Self::new().with(module)
    }
}

impl Debug for Configuration {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Configuration")
            .field(
                "modules",
                &self.modules.iter().map(|(name, _)| name).collect::<Vec<_>>(),
            )
            .finish()
    }
}
