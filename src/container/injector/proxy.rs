use std::sync::Arc;

use crate::container::injector::{CallContext, Injector, InjectorError, TypedInjector};
use crate::container::Managed;
use crate::key::Key;
use crate::policy::WiringPolicy;
use crate::provider::deferred::DynDeferred;
use crate::scope::CachingScope;

/// Wraps an injector so that plain `get` calls made inside a provider keep
/// extending the current resolution trace instead of starting a new one.
pub struct ContextForwardingInjectorProxy<'a, I>
where
    I: TypedInjector + ?Sized,
{
    inner: &'a I,
    context: &'a CallContext<'a>,
}

impl<'a, I> ContextForwardingInjectorProxy<'a, I>
where
    I: TypedInjector + ?Sized,
{
    pub fn new(inner: &'a I, context: &'a CallContext<'a>) -> Self {
        Self { inner, context }
    }
}

impl<I> Injector for ContextForwardingInjectorProxy<'_, I>
where
    I: TypedInjector + ?Sized,
{
    fn dyn_get(&self, key: &Key) -> Result<Box<dyn Managed>, InjectorError> {
        self.dyn_get_dependency(key, self.context)
    }

    fn dyn_get_dependency<'a>(
        &self,
        key: &Key,
        context: &'a CallContext<'a>,
    ) -> Result<Box<dyn Managed>, InjectorError> {
        self.inner.dyn_get_dependency(key, context)
    }

    fn dyn_provider(&self, key: &Key) -> DynDeferred {
        self.inner.dyn_provider(key)
    }

    fn singleton_scope(&self) -> CachingScope {
        self.inner.singleton_scope()
    }

    fn wiring_policy(&self) -> Arc<WiringPolicy> {
        self.inner.wiring_policy()
    }
}
