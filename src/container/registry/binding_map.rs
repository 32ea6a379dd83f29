use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::container::injector::{CallContext, Injector, InjectorError};
use crate::container::registry::dynamic::DynamicBindingFactory;
use crate::container::registry::{AlreadyResolvedSnafu, RegistryError};
use crate::container::Managed;
use crate::key::Key;
use crate::policy::WiringPolicy;
use crate::provider::{Provider, SharedProvider};
use crate::scope::{CachingScope, Scope};

/// The lifetime given to bindings synthesized on demand when their markers
/// say nothing about scoping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DefaultLifetime {
    /// Synthesized bindings are transient unless marked as singletons.
    Transient,
    /// Synthesized bindings join the singleton scope when they can be
    /// shared.
    #[default]
    Singleton,
}

/// A registered association between a [`Key`] and the provider that
/// supplies its objects, together with the scope enforcing its lifetime.
pub struct Binding {
    key: Key,
    provider: Arc<dyn Provider>,
    scoped: bool,
    resolved: AtomicBool,
}

impl Binding {
    pub(crate) fn transient(key: Key, provider: Arc<dyn Provider>) -> Self {
        Self {
            key,
            provider,
            scoped: false,
            resolved: AtomicBool::new(false),
        }
    }

    pub(crate) fn scoped(key: Key, provider: Arc<dyn SharedProvider>, scope: &dyn Scope) -> Self {
        Self {
            key,
            provider: scope.scoped(provider),
            scoped: true,
            resolved: AtomicBool::new(false),
        }
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    /// Whether this binding enforces a scope, as opposed to constructing a
    /// fresh object per request.
    pub fn is_scoped(&self) -> bool {
        self.scoped
    }

    /// Whether this binding has ever been used to resolve an object. A
    /// resolved binding can no longer be replaced.
    pub fn is_resolved(&self) -> bool {
        self.resolved.load(Ordering::SeqCst)
    }

    pub(crate) fn resolve(
        &self,
        injector: &dyn Injector,
        context: &CallContext<'_>,
    ) -> Result<Box<dyn Managed>, InjectorError> {
        self.resolved.store(true, Ordering::SeqCst);
        self.provider.dyn_provide(injector, context)
    }
}

impl Debug for Binding {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Binding")
            .field("key", &self.key)
            .field("scoped", &self.scoped)
            .field("resolved", &self.is_resolved())
            .finish_non_exhaustive()
    }
}

/// The live binding table of a container.
///
/// Bindings registered under a key that already has one replace the earlier
/// registration as long as the earlier binding has never been resolved.
/// When lookups miss and a dynamic binding factory is installed, a binding
/// is synthesized for unqualified keys and memoized like a registered one.
pub struct BindingMap {
    bindings: RwLock<HashMap<Key, Arc<Binding>>>,
    dynamic: Option<Box<dyn DynamicBindingFactory>>,
    default_lifetime: DefaultLifetime,
    singleton: CachingScope,
    policy: Arc<WiringPolicy>,
}

impl BindingMap {
    pub(crate) fn new(
        dynamic: Option<Box<dyn DynamicBindingFactory>>,
        default_lifetime: DefaultLifetime,
        singleton: CachingScope,
        policy: Arc<WiringPolicy>,
    ) -> Self {
        Self {
            bindings: RwLock::new(HashMap::new()),
            dynamic,
            default_lifetime,
            singleton,
            policy,
        }
    }

    pub(crate) fn bind(&self, binding: Binding) -> Result<(), RegistryError> {
        let mut bindings = self.bindings.write();
        match bindings.entry(binding.key().clone()) {
            Entry::Occupied(entry) if entry.get().is_resolved() => {
                AlreadyResolvedSnafu {
                    key: binding.key().clone(),
                }
                .fail()
            }
            Entry::Occupied(mut entry) => {
                entry.insert(Arc::new(binding));
                Ok(())
            }
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(binding));
                Ok(())
            }
        }
    }

    /// Looks a registered binding up without triggering synthesis.
    pub(crate) fn get(&self, key: &Key) -> Option<Arc<Binding>> {
        self.bindings.read().get(key).map(Arc::clone)
    }

    /// Looks a binding up, synthesizing and memoizing one on a miss if a
    /// dynamic binding factory is installed. Qualified keys are never
    /// synthesized.
    pub(crate) fn lookup(&self, key: &Key) -> Option<Arc<Binding>> {
        if let Some(binding) = self.get(key) {
            return Some(binding);
        }
        if key.is_qualified() {
            return None;
        }

        let dynamic = self.dynamic.as_deref()?;
        let mut bindings = self.bindings.write();
        if let Some(binding) = bindings.get(key) {
            return Some(Arc::clone(binding));
        }

        let synthesized = dynamic.synthesize(key)?;
        let wants_singleton = self.default_lifetime == DefaultLifetime::Singleton
            || synthesized
                .markers()
                .iter()
                .any(|marker| self.policy.is_singleton_marker(marker));

        let (transient, shared, _) = synthesized.into_parts();
        let binding = match shared {
            Some(shared) if wants_singleton => {
                Binding::scoped(key.clone(), shared, &self.singleton)
            }
            _ => Binding::transient(key.clone(), transient),
        };

        let binding = Arc::new(binding);
        bindings.insert(key.clone(), Arc::clone(&binding));
        Some(binding)
    }

    pub(crate) fn singleton_scope(&self) -> CachingScope {
        self.singleton.clone()
    }
}

impl Debug for BindingMap {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("BindingMap")
            .field("keys", &self.bindings.read().keys().collect::<Vec<_>>())
            .field("default_lifetime", &self.default_lifetime)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use crate::container::injector::MockInjector;
    use crate::key;
    use crate::provider::instance::InstanceProvider;
    use crate::util::any::Downcast;

    use super::*;

    fn transient_map() -> BindingMap {
        BindingMap::new(
            None,
            DefaultLifetime::Transient,
            CachingScope::new(),
            Arc::new(WiringPolicy::new()),
        )
    }

    #[test]
    fn binding_map_replaces_unresolved_bindings() {
        let map = transient_map();
        let key = key::of::<i32>().into_key();

        map.bind(Binding::transient(
            key.clone(),
            Arc::new(InstanceProvider::new(1)),
        ))
        .unwrap();
        map.bind(Binding::transient(
            key.clone(),
            Arc::new(InstanceProvider::new(2)),
        ))
        .unwrap();

        let binding = map.lookup(&key).unwrap();
        let injector = MockInjector::new();
        let object = binding.resolve(&injector, &CallContext::new(&key)).unwrap();
        assert_eq!(*object.downcast::<i32>().unwrap_or(Box::new(0)), 2);
    }

    #[test]
    fn binding_map_rejects_rebinding_resolved_keys() {
        let map = transient_map();
        let key = key::of::<i32>().into_key();

        map.bind(Binding::transient(
            key.clone(),
            Arc::new(InstanceProvider::new(1)),
        ))
        .unwrap();

        let binding = map.lookup(&key).unwrap();
        let injector = MockInjector::new();
        binding.resolve(&injector, &CallContext::new(&key)).unwrap();

        let res = map.bind(Binding::transient(
            key.clone(),
            Arc::new(InstanceProvider::new(2)),
        ));
        assert!(matches!(res, Err(RegistryError::AlreadyResolved { .. })));
    }

    #[test]
    fn binding_map_misses_unknown_keys_without_a_factory() {
        let map = transient_map();
        assert!(map.lookup(&key::of::<i32>().into_key()).is_none());
    }
}
