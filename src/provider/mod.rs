pub mod blueprint;
pub mod closure;
pub mod component;
pub mod deferred;
pub mod instance;

use std::fmt::Debug;

use crate::container::injector::{CallContext, Injector, InjectorError, TypedInjector};
use crate::container::{Managed, SharedManaged};

/// A factory which constructs objects of one type on demand.
///
/// A [`Provider`] retrieves whatever it depends on from the [`Injector`] it
/// is handed and builds a fresh object per request. Providers are stateless
/// by convention and may be invoked from multiple threads; any caching is the
/// business of the scope a binding is registered under, never the provider.
///
/// Implement [`TypedProvider`] instead of this trait; a blanket
/// implementation takes care of the type-erased layer.
pub trait Provider: Debug + Send + Sync + 'static {
    /// Provides a newly created type-erased object.
    ///
    /// # Errors
    ///
    /// Returns an error if a dependency cannot be resolved or the object
    /// construction itself fails.
    fn dyn_provide(
        &self,
        injector: &dyn Injector,
        context: &CallContext<'_>,
    ) -> Result<Box<dyn Managed>, InjectorError>;
}

/// The static-dispatch variant of [`Provider`].
pub trait TypedProvider: Provider {
    type Output: Managed;

    /// Provides a newly created object of type [`TypedProvider::Output`].
    ///
    /// # Errors
    ///
    /// Returns an error if a dependency cannot be resolved or the object
    /// construction itself fails.
    fn provide<I>(
        &self,
        injector: &I,
        context: &CallContext<'_>,
    ) -> Result<Self::Output, InjectorError>
    where
        I: TypedInjector + ?Sized;
}

impl<T: TypedProvider> Provider for T {
    fn dyn_provide(
        &self,
        injector: &dyn Injector,
        context: &CallContext<'_>,
    ) -> Result<Box<dyn Managed>, InjectorError> {
        self.provide(injector, context)
            .map(|obj| -> Box<dyn Managed> { Box::new(obj) })
    }
}

/// A [`Provider`] whose output has shared ownership, making it eligible for
/// registration under a caching scope.
///
/// Each request must still produce a newly created object; sharing is managed
/// by the scope's cache, not by the provider.
pub trait SharedProvider: Provider {
    /// Provides a newly created shareable type-erased object.
    ///
    /// # Errors
    ///
    /// Returns an error if a dependency cannot be resolved or the object
    /// construction itself fails.
    fn dyn_provide_shared(
        &self,
        injector: &dyn Injector,
        context: &CallContext<'_>,
    ) -> Result<Box<dyn SharedManaged>, InjectorError>;

    /// Returns a reference to `self` as a [`Provider`].
    fn upcast_provider(&self) -> &dyn Provider;
}

/// The static-dispatch variant of [`SharedProvider`]. Implemented as a
/// marker on top of a [`TypedProvider`] whose output is [`SharedManaged`].
pub trait TypedSharedProvider
where
    Self: SharedProvider + TypedProvider<Output: SharedManaged>,
{
}

impl<T: TypedSharedProvider> SharedProvider for T {
    fn dyn_provide_shared(
        &self,
        injector: &dyn Injector,
        context: &CallContext<'_>,
    ) -> Result<Box<dyn SharedManaged>, InjectorError> {
        self.provide(injector, context)
            .map(|obj| -> Box<dyn SharedManaged> { Box::new(obj) })
    }

    fn upcast_provider(&self) -> &dyn Provider {
        self
    }
}
