use std::marker::PhantomData;
use std::sync::Arc;

use crate::container::registry::Binder;
use crate::container::{Managed, SharedManaged};
use crate::key::{self, Qualifier, TypeLiteral};
use crate::provider::{TypedProvider, TypedSharedProvider};
use crate::scope::Scope;

pub(super) trait ToLifetime: Send + Sync + 'static {}

/// The default lifetime of a registration: a fresh instance per request.
pub struct TransientLifetime;

impl ToLifetime for TransientLifetime {}

/// The lifetime of a registration in the container-wide singleton scope.
pub struct SingletonLifetime {
    eager: bool,
}

impl ToLifetime for SingletonLifetime {}

/// The lifetime of a registration in a caller-supplied scope.
pub struct ScopedLifetime {
    scope: Arc<dyn Scope>,
}

impl ToLifetime for ScopedLifetime {}

/// An in-progress registration: a provider waiting for its qualifier and
/// lifetime before being set on a [`Binder`].
///
/// The lifetime is tracked in the type so that scoping is only offered for
/// providers whose output can be shared.
#[allow(private_bounds)]
pub struct BindingTo<T, P, L>
where
    T: Managed,
    P: TypedProvider<Output = T>,
    L: ToLifetime,
{
    provider: P,
    qualifier: Qualifier,
    lifetime: L,
    _marker: PhantomData<fn() -> T>,
}

#[allow(private_bounds)]
impl<T, P, L> BindingTo<T, P, L>
where
    T: Managed,
    P: TypedProvider<Output = T>,
    L: ToLifetime,
{
    pub(super) fn new(provider: P, qualifier: Qualifier, lifetime: L) -> Self {
        Self {
            provider,
            qualifier,
            lifetime,
            _marker: PhantomData,
        }
    }

    /// Qualifies the registered key by a name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.qualifier = Qualifier::Named(name.into());
        self
    }

    /// Qualifies the registered key by the marker type `M`.
    pub fn marked<M>(mut self) -> Self
    where
        M: 'static,
    {
        self.qualifier = Qualifier::Marker(TypeLiteral::of::<M>());
        self
    }

    /// Makes the registration transient, undoing an earlier scope choice.
    pub fn without_scope(self) -> BindingTo<T, P, TransientLifetime> {
        BindingTo::new(self.provider, self.qualifier, TransientLifetime)
    }
}

#[allow(private_bounds)]
impl<T, P, L> BindingTo<T, P, L>
where
    T: SharedManaged,
    P: TypedSharedProvider<Output = T>,
    L: ToLifetime,
{
    /// Puts the registration in the container-wide singleton scope.
    pub fn in_singleton_scope(self) -> BindingTo<T, P, SingletonLifetime> {
        BindingTo::new(
            self.provider,
            self.qualifier,
            SingletonLifetime { eager: false },
        )
    }

    /// Like [`BindingTo::in_singleton_scope`], and additionally constructs
    /// the instance as soon as its module is installed.
    pub fn as_eager_singleton(self) -> BindingTo<T, P, SingletonLifetime> {
        BindingTo::new(
            self.provider,
            self.qualifier,
            SingletonLifetime { eager: true },
        )
    }

    /// Puts the registration in a custom scope.
    pub fn in_scope(self, scope: Arc<dyn Scope>) -> BindingTo<T, P, ScopedLifetime> {
        BindingTo::new(self.provider, self.qualifier, ScopedLifetime { scope })
    }
}

impl<T, P> BindingTo<T, P, TransientLifetime>
where
    T: Managed,
    P: TypedProvider<Output = T>,
{
    /// Registers the binding on the binder.
    pub fn set_on(self, binder: &mut Binder<'_>) {
        let key = key::qualified::<T>(self.qualifier);
        binder.register(key, self.provider);
    }
}

impl<T, P> BindingTo<T, P, SingletonLifetime>
where
    T: SharedManaged,
    P: TypedSharedProvider<Output = T>,
{
    /// Registers the binding on the binder.
    pub fn set_on(self, binder: &mut Binder<'_>) {
        let key = key::qualified::<T>(self.qualifier);
        if self.lifetime.eager {
            binder.schedule_eager(key.as_key().clone());
        }
        binder.register_singleton(key, self.provider);
    }
}

impl<T, P> BindingTo<T, P, ScopedLifetime>
where
    T: SharedManaged,
    P: TypedSharedProvider<Output = T>,
{
    /// Registers the binding on the binder.
    pub fn set_on(self, binder: &mut Binder<'_>) {
        let key = key::qualified::<T>(self.qualifier);
        binder.register_scoped(key, self.provider, self.lifetime.scope.as_ref());
    }
}
