use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;

use snafu::ResultExt;

use crate::container::core::ContainerCore;
use crate::container::injector::{CallContext, Injector, InjectorError};
use crate::container::registry::{
    Binder, Binding, DefaultLifetime, DynamicBindingFactory, EagerConstructionSnafu, RegistryError,
};
use crate::container::Managed;
use crate::key::{Key, TypeLiteral};
use crate::module::{Configuration, Module};
use crate::policy::{MemberPredicate, WiringPolicy};
use crate::provider::blueprint::MemberBlueprint;
use crate::provider::deferred::DynDeferred;
use crate::scope::{CachingScope, Scope, ScopeEventKind};

/// Assembles a [`Container`]: modules to install, the wiring policy, the
/// dynamic binding factory and the default lifetime of synthesized bindings.
pub struct ContainerBuilder {
    configuration: Configuration,
    policy: WiringPolicy,
    dynamic: Option<Box<dyn DynamicBindingFactory>>,
    default_lifetime: DefaultLifetime,
}

impl ContainerBuilder {
    pub fn new() -> Self {
        Self {
            configuration: Configuration::new(),
            policy: WiringPolicy::new(),
            dynamic: None,
            default_lifetime: DefaultLifetime::default(),
        }
    }

    /// Adds a module, installed in registration order when the container is
    /// built.
    pub fn module<M>(mut self, module: M) -> Self
    where
        M: Module,
    {
        self.configuration = self.configuration.with(module);
        self
    }

    /// Makes synthesized bindings transient unless their markers say
    /// otherwise.
    pub fn default_no_scope(mut self) -> Self {
        self.default_lifetime = DefaultLifetime::Transient;
        self
    }

    /// Makes shareable synthesized bindings singletons. This is the default.
    pub fn default_singleton_scope(mut self) -> Self {
        self.default_lifetime = DefaultLifetime::Singleton;
        self
    }

    /// Installs a factory that synthesizes bindings for unbound keys on
    /// their first lookup. Without one, unbound keys fail resolution.
    pub fn enable_dynamic_bindings<F>(mut self, factory: F) -> Self
    where
        F: DynamicBindingFactory,
    {
        self.dynamic = Some(Box::new(factory));
        self
    }

    /// Replaces the predicate deciding which blueprint fields are injected.
    pub fn injectable(mut self, predicate: impl Fn(&MemberBlueprint) -> bool + Send + Sync + 'static) -> Self {
        self.policy = self
            .policy
            .with_injectable(Box::new(predicate) as MemberPredicate);
        self
    }

    /// Replaces the predicate deciding which member markers qualify keys.
    pub fn qualifier(mut self, predicate: impl Fn(&TypeLiteral) -> bool + Send + Sync + 'static) -> Self {
        self.policy = self.policy.with_qualifier(Box::new(predicate));
        self
    }

    /// Replaces the predicate deciding which type markers imply singleton
    /// lifetime for synthesized bindings.
    pub fn singleton_marker(mut self, predicate: impl Fn(&TypeLiteral) -> bool + Send + Sync + 'static) -> Self {
        self.policy = self.policy.with_singleton_marker(Box::new(predicate));
        self
    }

    /// Replaces the predicate deciding which declared member types receive
    /// lazy provider handles instead of eager instances.
    pub fn provider_wrapper(mut self, predicate: impl Fn(&TypeLiteral) -> bool + Send + Sync + 'static) -> Self {
        self.policy = self.policy.with_provider_wrapper(Box::new(predicate));
        self
    }

    /// Builds the container, installing every module and constructing the
    /// scheduled eager singletons.
    ///
    /// # Errors
    ///
    /// Returns the aggregated registration errors of the modules, or the
    /// first eager construction failure.
    pub fn build(self) -> Result<Container, RegistryError> {
        let core = ContainerCore::new(self.dynamic, self.default_lifetime, self.policy);
        let container = Container { core };
        container.install(self.configuration)?;
        Ok(container)
    }
}

impl Default for ContainerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for ContainerBuilder {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ContainerBuilder")
            .field("configuration", &self.configuration)
            .field("default_lifetime", &self.default_lifetime)
            .field("dynamic", &self.dynamic.is_some())
            .finish_non_exhaustive()
    }
}

/// A handle to a running container. Cloning is cheap and every clone shares
/// the same bindings and scopes.
///
/// The typed request surface ([`get`], [`get_optional`], [`provider`]) comes
/// from the [`TypedInjector`] extension of [`Injector`].
///
/// [`get`]: crate::container::injector::TypedInjector::get
/// [`get_optional`]: crate::container::injector::TypedInjector::get_optional
/// [`provider`]: crate::container::injector::TypedInjector::provider
#[derive(Clone)]
pub struct Container {
    core: Arc<ContainerCore>,
}

impl Container {
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new()
    }

    /// Builds a container from a single module with the default policy.
    ///
    /// # Errors
    ///
    /// Returns the module's aggregated registration errors.
    pub fn init<M>(module: M) -> Result<Self, RegistryError>
    where
        M: Module,
    {
        Self::builder().module(module).build()
    }

    /// Installs additional bindings on a running container and constructs
    /// any eager singletons they schedule.
    ///
    /// Replacing an existing binding is allowed as long as the old binding
    /// has never been resolved.
    ///
    /// # Errors
    ///
    /// Returns the aggregated registration errors, or the first eager
    /// construction failure.
    pub fn install(&self, configuration: impl Into<Configuration>) -> Result<(), RegistryError> {
        let configuration = configuration.into();
        let mut binder = Binder::new(self.core.bindings());
        configuration.apply(&mut binder);
        let eager = binder.finish()?;
        for key in eager {
            self.core
                .dyn_get(&key)
                .map(drop)
                .context(EagerConstructionSnafu { key: key.clone() })?;
        }
        Ok(())
    }

    /// Returns the registered binding for `key`, if any. Synthesized
    /// bindings appear here once their key has been looked up.
    pub fn get_binding(&self, key: &Key) -> Option<Arc<Binding>> {
        self.core.get_binding(key)
    }

    /// Ends the singleton scope: broadcasts the end-of-scope events to its
    /// listeners and drops every cached singleton.
    ///
    /// The container stays usable afterwards; singletons are rebuilt on
    /// their next request.
    pub fn shutdown(&self) {
        let singleton = self.core.singleton_scope();
        singleton.post_scope_event(ScopeEventKind::BeforeScopeEnd);
        singleton.post_scope_event(ScopeEventKind::AfterScopeEnd);
    }
}

impl Injector for Container {
    fn dyn_get(&self, key: &Key) -> Result<Box<dyn Managed>, InjectorError> {
        self.core.dyn_get(key)
    }

    fn dyn_get_dependency<'a>(
        &self,
        key: &Key,
        context: &'a CallContext<'a>,
    ) -> Result<Box<dyn Managed>, InjectorError> {
        self.core.dyn_get_dependency(key, context)
    }

    fn dyn_provider(&self, key: &Key) -> DynDeferred {
        self.core.dyn_provider(key)
    }

    fn singleton_scope(&self) -> CachingScope {
        self.core.singleton_scope()
    }

    fn wiring_policy(&self) -> Arc<WiringPolicy> {
        self.core.wiring_policy()
    }
}

impl Debug for Container {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Container")
            .field("core", &self.core)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;
    use std::error::Error;

    use crate::container::injector::TypedInjector;
    use crate::key;
    use crate::module::dsl;

    use super::*;

    struct BaseModule;

    impl Module for BaseModule {
        fn configure(&self, binder: &mut Binder<'_>) -> Result<(), Box<dyn Error + Send + Sync>> {
            dsl::instance(42i32).set_on(binder);
            dsl::instance(Arc::new(String::from("shared")))
                .in_singleton_scope()
                .set_on(binder);
            Ok(())
        }
    }

    #[test]
    fn container_resolves_installed_bindings() {
        let container = Container::init(BaseModule).unwrap();

        assert_eq!(container.get(key::of::<i32>()).unwrap(), 42);
        let first = container.get(key::of::<Arc<String>>()).unwrap();
        let second = container.get(key::of::<Arc<String>>()).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn container_reports_missing_bindings() {
        let container = Container::init(BaseModule).unwrap();

        assert!(matches!(
            container.get(key::of::<u64>()),
            Err(InjectorError::NotFound { .. })
        ));
        assert_eq!(container.get_optional(key::of::<u64>()).unwrap(), None);
    }

    #[test]
    fn container_install_replaces_unresolved_bindings() {
        struct Replacement;

        impl Module for Replacement {
            fn configure(
                &self,
                binder: &mut Binder<'_>,
            ) -> Result<(), Box<dyn Error + Send + Sync>> {
                dsl::instance(7i32).set_on(binder);
                Ok(())
            }
        }

        let container = Container::init(BaseModule).unwrap();
        container.install(Replacement).unwrap();
        assert_eq!(container.get(key::of::<i32>()).unwrap(), 7);
    }

    #[test]
    fn container_install_rejects_resolved_bindings() {
        struct Replacement;

        impl Module for Replacement {
            fn configure(
                &self,
                binder: &mut Binder<'_>,
            ) -> Result<(), Box<dyn Error + Send + Sync>> {
                dsl::instance(7i32).set_on(binder);
                Ok(())
            }
        }

        let container = Container::init(BaseModule).unwrap();
        assert_eq!(container.get(key::of::<i32>()).unwrap(), 42);

        let err = container.install(Replacement).unwrap_err();
        let RegistryError::Aggregated { errors } = err else {
            panic!("errors should be aggregated");
        };
        assert!(matches!(
            errors.first().unwrap(),
            RegistryError::AlreadyResolved { .. }
        ));
    }

    #[test]
    fn container_shutdown_clears_singletons() {
        struct FreshModule;

        impl Module for FreshModule {
            fn configure(
                &self,
                binder: &mut Binder<'_>,
            ) -> Result<(), Box<dyn Error + Send + Sync>> {
                dsl::closure(|_: &dyn Injector| {
                    Ok(Ok::<_, Infallible>(Arc::new(String::from("fresh"))))
                })
                .in_singleton_scope()
                .set_on(binder);
                Ok(())
            }
        }

        let container = Container::init(FreshModule).unwrap();

        let first = container.get(key::of::<Arc<String>>()).unwrap();
        let again = container.get(key::of::<Arc<String>>()).unwrap();
        assert!(Arc::ptr_eq(&first, &again));

        container.shutdown();
        let second = container.get(key::of::<Arc<String>>()).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn container_get_binding_reports_resolution_state() {
        let container = Container::init(BaseModule).unwrap();
        let key = key::of::<i32>().into_key();

        let binding = container.get_binding(&key).unwrap();
        assert!(!binding.is_resolved());
        assert!(!binding.is_scoped());

        container.get(key::of::<i32>()).unwrap();
        assert!(binding.is_resolved());
        assert!(container.get_binding(&key::of::<u64>().into_key()).is_none());
    }
}
