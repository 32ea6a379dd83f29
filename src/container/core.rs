use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::{Arc, Weak};

use crate::container::injector::{CallContext, Injector, InjectorError};
use crate::container::registry::{
    Binding, BindingMap, DefaultLifetime, DynamicBindingFactory,
};
use crate::container::Managed;
use crate::key::Key;
use crate::policy::WiringPolicy;
use crate::provider::deferred::DynDeferred;
use crate::scope::CachingScope;

/// The resolution engine shared by every handle of one container.
pub(super) struct ContainerCore {
    bindings: BindingMap,
    singleton: CachingScope,
    policy: Arc<WiringPolicy>,
    weak_self: Weak<ContainerCore>,
}

impl ContainerCore {
    pub(super) fn new(
        dynamic: Option<Box<dyn DynamicBindingFactory>>,
        default_lifetime: DefaultLifetime,
        policy: WiringPolicy,
    ) -> Arc<Self> {
        let singleton = CachingScope::new();
        let policy = Arc::new(policy);
        Arc::new_cyclic(|weak_self| Self {
            bindings: BindingMap::new(
                dynamic,
                default_lifetime,
                singleton.clone(),
                Arc::clone(&policy),
            ),
            singleton,
            policy,
            weak_self: weak_self.clone(),
        })
    }

    pub(super) fn bindings(&self) -> &BindingMap {
        &self.bindings
    }

    pub(super) fn get_binding(&self, key: &Key) -> Option<Arc<Binding>> {
        self.bindings.get(key)
    }

    fn get_object(
        &self,
        key: &Key,
        context: &CallContext<'_>,
    ) -> Result<Box<dyn Managed>, InjectorError> {
        if context.trace().previous_contains_key(key) {
            return Err(InjectorError::CyclicDependency {
                key: key.clone(),
                chain: context.trace().chain(),
            });
        }
        match self.bindings.lookup(key) {
            Some(binding) => binding.resolve(self, context),
            None => Err(InjectorError::NotFound { key: key.clone() }),
        }
    }
}

impl Injector for ContainerCore {
    fn dyn_get(&self, key: &Key) -> Result<Box<dyn Managed>, InjectorError> {
        let context = CallContext::new(key);
        self.get_object(key, &context)
    }

    fn dyn_get_dependency<'a>(
        &self,
        key: &Key,
        context: &'a CallContext<'a>,
    ) -> Result<Box<dyn Managed>, InjectorError> {
        let context = context.append(key);
        self.get_object(key, &context)
    }

    fn dyn_provider(&self, key: &Key) -> DynDeferred {
        let injector = self
            .weak_self
            .upgrade()
            .unwrap_or_else(|| unreachable!("the core should be kept alive by the caller"));
        DynDeferred::new(injector, key.clone())
    }

    fn singleton_scope(&self) -> CachingScope {
        self.singleton.clone()
    }

    fn wiring_policy(&self) -> Arc<WiringPolicy> {
        Arc::clone(&self.policy)
    }
}

impl Debug for ContainerCore {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ContainerCore")
            .field("bindings", &self.bindings)
            .finish_non_exhaustive()
    }
}
