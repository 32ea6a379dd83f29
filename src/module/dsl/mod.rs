//! The registration vocabulary used inside [`Module::configure`]: pick a
//! provider kind, optionally qualify and scope it, then `set_on(binder)`.
//!
//! [`Module::configure`]: crate::module::Module::configure

mod binding;

use std::sync::Arc;

use crate::container::Managed;
use crate::key::Qualifier;
use crate::provider::blueprint::{Blueprint, BlueprintProvider};
use crate::provider::closure::{ClosureProvider, Factory};
use crate::provider::component::{Component, ComponentProvider};
use crate::provider::instance::InstanceProvider;
use crate::provider::TypedProvider;

pub use binding::{BindingTo, ScopedLifetime, SingletonLifetime, TransientLifetime};

/// Binds a pre-built value, cloned on every request.
pub fn instance<T>(value: T) -> BindingTo<T, InstanceProvider<T>, TransientLifetime>
where
    T: Managed + Clone,
{
    provider(InstanceProvider::new(value))
}

/// Binds a factory closure which receives the injector and constructs the
/// object.
pub fn closure<C>(
    closure: C,
) -> BindingTo<C::Constructed, ClosureProvider<C::Constructed, C>, TransientLifetime>
where
    C: Factory,
{
    provider(ClosureProvider::new(closure))
}

/// Binds a [`Component`] by its constructed type.
pub fn component<C>() -> BindingTo<C::Constructed, ComponentProvider<C>, TransientLifetime>
where
    C: Component,
{
    provider(ComponentProvider::<C>::new())
}

/// Binds a type wired according to a [`Blueprint`].
pub fn blueprint<T>(
    blueprint: Arc<Blueprint<T>>,
) -> BindingTo<T, BlueprintProvider<T>, TransientLifetime>
where
    T: Managed,
{
    provider(BlueprintProvider::new(blueprint))
}

/// Binds an arbitrary [`TypedProvider`]. The other helpers delegate here.
pub fn provider<P>(provider: P) -> BindingTo<P::Output, P, TransientLifetime>
where
    P: TypedProvider,
{
    BindingTo::new(provider, Qualifier::None, TransientLifetime)
}
