use std::error::Error;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;

use crate::container::injector::{
    CallContext, ContextForwardingInjectorProxy, Injector, InjectorError, TypedInjector,
};
use crate::container::{Managed, SharedManaged};
use crate::provider::{TypedProvider, TypedSharedProvider};

/// A factory closure which accepts an [`Injector`] and constructs an object,
/// possibly fetching its dependencies from the injector first.
///
/// Closures of `Fn(&dyn Injector) -> Result<Result<T, E>, InjectorError>`
/// where `T: Managed` are [`Factory`]. Dependency retrieval failures go in
/// the outer [`Result`] so that `?` propagates them unchanged, while `E` in
/// the inner [`Result`] is the closure's own construction failure.
pub trait Factory
where
    Self: Fn(&dyn Injector) -> Result<Result<Self::Constructed, Self::Error>, InjectorError>,
    Self: Send + Sync + 'static,
{
    /// The successfully constructed object.
    type Constructed: Managed;

    /// The error occurred in object construction after all dependencies are
    /// retrieved.
    type Error: Into<Box<dyn Error + Send + Sync>>;
}

impl<F, T, E> Factory for F
where
    T: Managed,
    E: Into<Box<dyn Error + Send + Sync>>,
    Self: Fn(&dyn Injector) -> Result<Result<T, E>, InjectorError>,
    Self: Send + Sync + 'static,
{
    type Constructed = T;

    type Error = E;
}

/// A [`Provider`] which supplies objects from a [`Factory`] closure.
///
/// The injector handed to the closure forwards the ongoing call context, so
/// dependencies fetched inside the closure stay on the same resolution chain
/// and cycles through the closure are still detected.
///
/// [`Provider`]: crate::provider::Provider
pub struct ClosureProvider<T, C>
where
    T: Managed,
    C: Factory<Constructed = T>,
{
    closure: C,
}

impl<T, C> ClosureProvider<T, C>
where
    T: Managed,
    C: Factory<Constructed = T>,
{
    pub fn new(closure: C) -> Self {
        Self { closure }
    }
}

impl<T, C> Debug for ClosureProvider<T, C>
where
    T: Managed,
    C: Factory<Constructed = T>,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ClosureProvider<T, C>")
            .finish_non_exhaustive()
    }
}

impl<T, C> TypedProvider for ClosureProvider<T, C>
where
    T: Managed,
    C: Factory<Constructed = T>,
{
    type Output = T;

    fn provide<I>(
        &self,
        injector: &I,
        context: &CallContext<'_>,
    ) -> Result<Self::Output, InjectorError>
    where
        I: TypedInjector + ?Sized,
    {
        let injector = ContextForwardingInjectorProxy::new(injector, context);
        match (self.closure)(&injector) {
            Ok(Ok(obj)) => Ok(obj),
            Ok(Err(err)) => Err(InjectorError::ObjectConstruction {
                key: context.key().clone(),
                source: Arc::from(err.into()),
            }),
            Err(err) => Err(err),
        }
    }
}

impl<T, C> TypedSharedProvider for ClosureProvider<T, C>
where
    T: SharedManaged,
    C: Factory<Constructed = T>,
{
}
