mod context;
mod proxy;

use std::any;
use std::error::Error;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::sync::Arc;

use snafu::prelude::*;

use crate::container::Managed;
use crate::key::{Key, TypeLiteral, TypedKey};
use crate::policy::WiringPolicy;
use crate::provider::deferred::{Deferred, DynDeferred};
use crate::scope::CachingScope;
use crate::util::any::Downcast;

pub use context::{CallContext, InjectionTrace};
pub(crate) use proxy::ContextForwardingInjectorProxy;

/// The type-erased resolution interface: everything a provider needs to pull
/// its dependencies out of a container.
#[cfg_attr(test, mockall::automock)]
pub trait Injector: Send + Sync {
    /// Resolves `key` as a fresh top-level request.
    fn dyn_get(&self, key: &Key) -> Result<Box<dyn Managed>, InjectorError>;

    /// Resolves `key` as a dependency of an in-progress resolution, so the
    /// cycle-detection trace keeps growing through nested requests.
    fn dyn_get_dependency<'a>(
        &self,
        key: &Key,
        context: &'a CallContext<'a>,
    ) -> Result<Box<dyn Managed>, InjectorError>;

    /// Returns a deferred handle for `key` without constructing anything.
    /// All resolution failures are reported when the handle is invoked.
    fn dyn_provider(&self, key: &Key) -> DynDeferred;

    /// The container's default caching scope, exposed so instances can
    /// subscribe to lifecycle events during their own construction.
    fn singleton_scope(&self) -> CachingScope;

    /// The predicate set governing blueprint member wiring.
    fn wiring_policy(&self) -> Arc<WiringPolicy>;
}

/// Static-dispatch convenience layer over [`Injector`].
pub trait TypedInjector: Injector {
    /// Resolves a typed key.
    ///
    /// Keys are one-level-erased structural literals, so two distinct Rust
    /// types can share a key. A binding whose object is not actually `T`
    /// yields [`InjectorError::TypeMismatch`] rather than the object.
    fn get<T>(&self, key: TypedKey<T>) -> Result<T, InjectorError>
    where
        T: Managed,
    {
        match self.dyn_get(key.as_key()) {
            Ok(boxed) => match boxed.downcast::<T>() {
                Ok(object) => Ok(*object),
                Err(_) => Err(InjectorError::TypeMismatch {
                    key: key.into_key(),
                    expected: any::type_name::<T>(),
                }),
            },
            Err(err) => Err(err),
        }
    }

    /// Like [`TypedInjector::get`], but a missing binding yields `None`
    /// instead of an error. Used for optional dependency slots.
    fn get_optional<T>(&self, key: TypedKey<T>) -> Result<Option<T>, InjectorError>
    where
        T: Managed,
    {
        match self.get(key) {
            Ok(object) => Ok(Some(object)),
            Err(InjectorError::NotFound { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Returns a typed deferred handle for `key` without constructing.
    fn provider<T>(&self, key: TypedKey<T>) -> Deferred<T>
    where
        T: Managed,
    {
        Deferred::from_dyn(self.dyn_provider(key.as_key()))
    }

    fn upcast_dyn(&self) -> &dyn Injector;
}

impl<T> TypedInjector for T
where
    T: Injector,
{
    fn upcast_dyn(&self) -> &dyn Injector {
        self
    }
}

impl TypedInjector for dyn Injector + '_ {
    fn upcast_dyn(&self) -> &dyn Injector {
        self
    }
}

#[derive(Debug, Clone, Snafu)]
#[non_exhaustive]
pub enum InjectorError {
    #[snafu(display("could not find a binding for the requested key {key}"))]
    #[non_exhaustive]
    NotFound { key: Key },
    #[snafu(display("could not construct {key} which depends on itself: {}", ChainDisplayer::new(chain)))]
    #[non_exhaustive]
    CyclicDependency { key: Key, chain: Vec<Key> },
    #[snafu(display("could not satisfy the dependency `{member}` ({key}) required by {requested_by}"))]
    #[non_exhaustive]
    UnsatisfiedDependency {
        member: &'static str,
        key: Key,
        requested_by: TypeLiteral,
    },
    #[snafu(display("could not downcast the object {key} to {expected}"))]
    #[non_exhaustive]
    TypeMismatch { key: Key, expected: &'static str },
    #[snafu(display("could not construct the object {key}"))]
    #[non_exhaustive]
    ObjectConstruction {
        key: Key,
        source: Arc<dyn Error + Send + Sync>,
    },
}

struct ChainDisplayer<'a> {
    chain: &'a [Key],
}

impl<'a> ChainDisplayer<'a> {
    fn new(chain: &'a [Key]) -> Self {
        Self { chain }
    }
}

impl Display for ChainDisplayer<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        for (i, key) in self.chain.iter().enumerate() {
            if i > 0 {
                write!(f, " -> ")?;
            }
            write!(f, "{key}")?;
        }
        Ok(())
    }
}
