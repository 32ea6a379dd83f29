use std::error::Error;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::marker::PhantomData;
use std::sync::Arc;

use crate::container::injector::{
    CallContext, ContextForwardingInjectorProxy, InjectorError, TypedInjector,
};
use crate::container::{Managed, SharedManaged};
use crate::key::TypeLiteral;
use crate::provider::{TypedProvider, TypedSharedProvider};

/// A type that has a dedicated constructor for dependency injection.
///
/// ```rust
/// # use std::sync::Arc;
/// # use std::convert::Infallible;
/// # use bindery::container::injector::{TypedInjector, InjectorError};
/// # use bindery::provider::component::Component;
/// # use bindery::key;
/// #
/// trait MyTrait: Send + Sync + 'static {}
///
/// struct MyComponent {
///     dep1: i32,
///     dep2: Arc<f64>,
/// }
///
/// impl MyTrait for MyComponent {}
///
/// impl Component for MyComponent {
///     type Constructed = Arc<dyn MyTrait>;
///
///     type Error = Infallible;
///
///     fn construct<I>(injector: &I) -> Result<Result<Self, Self::Error>, InjectorError>
///     where
///         I: TypedInjector + ?Sized
///     {
///         let dep1 = injector.get(key::of())?;
///         let dep2 = injector.get(key::of())?;
///         Ok(Ok(Self { dep1, dep2 }))
///     }
///
///     fn post_process(self) -> Self::Constructed {
///         Arc::new(self)
///     }
/// }
/// ```
pub trait Component: Managed + Sized {
    /// The successfully constructed object. This can be not only `Self`, but
    /// also some boxed `Self`, such as `Arc<Self>` and `Arc<dyn Trait>`.
    type Constructed: Managed;

    /// The error occurred in object construction after all dependencies are
    /// retrieved.
    type Error: Into<Box<dyn Error + Send + Sync>>;

    /// Retrieves the dependencies from the injector and creates the object.
    ///
    /// # Errors
    ///
    /// Returns an error if all dependencies can't be fetched.
    ///
    /// Returns an inner error [`Component::Error`] wrapped in the outer [`Ok`]
    /// if the object construction fails.
    fn construct<I>(injector: &I) -> Result<Result<Self, Self::Error>, InjectorError>
    where
        I: TypedInjector + ?Sized;

    /// Converts `self` to [`Component::Constructed`]. Typical usages are
    /// putting `self` to an [`Arc`] and coercing it to an `Arc<dyn Trait>`.
    ///
    /// [`Arc`]: std::sync::Arc
    fn post_process(self) -> Self::Constructed;

    /// Marker types attached to this component, consulted by the wiring
    /// policy when a binding for it is synthesized on demand. A component
    /// carrying the configured singleton marker is cached in the singleton
    /// scope even when no explicit binding names a scope.
    fn type_markers() -> Vec<TypeLiteral> {
        Vec::new()
    }
}

/// A [`Provider`] which supplies objects by calling [`Component::construct`].
///
/// [`Provider`]: crate::provider::Provider
pub struct ComponentProvider<C>
where
    C: Component,
{
    _marker: PhantomData<C>,
}

impl<C> ComponentProvider<C>
where
    C: Component,
{
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<C> Default for ComponentProvider<C>
where
    C: Component,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Debug for ComponentProvider<C>
where
    C: Component,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ComponentProvider<C>")
            .finish_non_exhaustive()
    }
}

impl<C> TypedProvider for ComponentProvider<C>
where
    C: Component,
{
    type Output = C::Constructed;

    fn provide<I>(
        &self,
        injector: &I,
        context: &CallContext<'_>,
    ) -> Result<Self::Output, InjectorError>
    where
        I: TypedInjector + ?Sized,
    {
        let injector = ContextForwardingInjectorProxy::new(injector, context);
        match C::construct(&injector) {
            Ok(Ok(obj)) => Ok(obj.post_process()),
            Ok(Err(err)) => Err(InjectorError::ObjectConstruction {
                key: context.key().clone(),
                source: Arc::from(err.into()),
            }),
            Err(err) => Err(err),
        }
    }
}

impl<C> TypedSharedProvider for ComponentProvider<C> where C: Component<Constructed: SharedManaged> {}
