mod binding_map;
mod dynamic;

use std::error::Error;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::sync::Arc;

use snafu::prelude::*;

use crate::container::injector::InjectorError;
use crate::container::SharedManaged;
use crate::key::{Key, TypedKey};
use crate::provider::{TypedProvider, TypedSharedProvider};
use crate::scope::{CachingScope, Scope};

pub use binding_map::{Binding, BindingMap, DefaultLifetime};
pub use dynamic::{DynamicBindingFactory, JitComponents, Synthesized};

/// The registration surface handed to modules.
///
/// A binder validates nothing eagerly: registration failures accumulate and
/// surface together once every module has run, so one faulty binding does
/// not hide the others.
pub struct Binder<'a> {
    map: &'a BindingMap,
    eager: Vec<Key>,
    errors: Vec<RegistryError>,
}

impl<'a> Binder<'a> {
    pub(crate) fn new(map: &'a BindingMap) -> Self {
        Self {
            map,
            eager: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Registers a transient binding: the provider runs on every request.
    pub fn register<P>(&mut self, key: TypedKey<P::Output>, provider: P)
    where
        P: TypedProvider,
    {
        self.bind(Binding::transient(key.into_key(), Arc::new(provider)));
    }

    /// Registers a binding whose instances live in `scope`.
    pub fn register_scoped<P>(&mut self, key: TypedKey<P::Output>, provider: P, scope: &dyn Scope)
    where
        P: TypedSharedProvider,
        P::Output: SharedManaged,
    {
        self.bind(Binding::scoped(key.into_key(), Arc::new(provider), scope));
    }

    /// Registers a binding in the container-wide singleton scope.
    pub fn register_singleton<P>(&mut self, key: TypedKey<P::Output>, provider: P)
    where
        P: TypedSharedProvider,
        P::Output: SharedManaged,
    {
        let singleton = self.map.singleton_scope();
        self.register_scoped(key, provider, &singleton);
    }

    /// Schedules `key` for construction right after the container finishes
    /// installing its modules.
    pub fn schedule_eager(&mut self, key: Key) {
        self.eager.push(key);
    }

    /// The container-wide singleton scope, to subscribe listeners or to pass
    /// to [`Binder::register_scoped`].
    pub fn singleton_scope(&self) -> CachingScope {
        self.map.singleton_scope()
    }

    pub(crate) fn report_module_error(
        &mut self,
        module: &'static str,
        err: Box<dyn Error + Send + Sync>,
    ) {
        self.errors.push(RegistryError::ModuleInner {
            module,
            source: err,
        });
    }

    fn bind(&mut self, binding: Binding) {
        if let Err(err) = self.map.bind(binding) {
            self.errors.push(err);
        }
    }

    pub(crate) fn finish(self) -> Result<Vec<Key>, RegistryError> {
        if self.errors.is_empty() {
            Ok(self.eager)
        } else {
            Err(RegistryError::Aggregated {
                errors: self.errors,
            })
        }
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
pub enum RegistryError {
    #[snafu(display("the binding for key {key} was already resolved and can't be replaced"))]
    #[non_exhaustive]
    AlreadyResolved { key: Key },
    #[snafu(display("module {module} fails to setup the configuration"))]
    #[non_exhaustive]
    ModuleInner {
        module: &'static str,
        source: Box<dyn Error + Send + Sync>,
    },
    #[snafu(display("eager construction for key {key} failed"))]
    #[non_exhaustive]
    EagerConstruction { key: Key, source: InjectorError },
    #[snafu(display("aggregated registry errors:\n{}", AggregatedDisplayer::new(errors)))]
    Aggregated { errors: Vec<RegistryError> },
}

struct AggregatedDisplayer<'a> {
    errors: &'a [RegistryError],
}

impl<'a> AggregatedDisplayer<'a> {
    fn new(errors: &'a [RegistryError]) -> Self {
        Self { errors }
    }
}

impl Display for AggregatedDisplayer<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        for (i, error) in self.errors.iter().enumerate() {
            writeln!(f, "{:4}: {}", i + 1, error)?;
        }
        Ok(())
    }
}
