use std::convert::Infallible;
use std::error::Error;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use bindery::container::injector::Injector;
use bindery::container::registry::JitComponents;
use bindery::key::TypeLiteral;
use bindery::policy::markers;
use bindery::prelude::*;
use bindery::provider::blueprint::{Blueprint, MemberBlueprint, Wired};
use bindery::provider::deferred::Deferred;
use bindery::scope::{CachingScope, Scope, ScopeEventKind, ScopeEventListener};

#[derive(Debug)]
struct Repository {
    sequence: usize,
}

impl Component for Repository {
    type Constructed = Arc<Repository>;

    type Error = Infallible;

    fn construct<I>(injector: &I) -> Result<Result<Self, Self::Error>, InjectorError>
    where
        I: TypedInjector + ?Sized,
    {
        let counter: Arc<AtomicUsize> = injector.get(key::of())?;
        let sequence = counter.fetch_add(1, Ordering::SeqCst);
        // Slow construction widens the race window for the concurrency test.
        thread::sleep(Duration::from_millis(5));
        Ok(Ok(Self { sequence }))
    }

    fn post_process(self) -> Self::Constructed {
        Arc::new(self)
    }
}

struct RepositoryModule {
    counter: Arc<AtomicUsize>,
}

impl RepositoryModule {
    fn new() -> Self {
        Self {
            counter: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl Module for RepositoryModule {
    fn configure(&self, binder: &mut Binder<'_>) -> Result<(), Box<dyn Error + Send + Sync>> {
        dsl::instance(Arc::clone(&self.counter)).set_on(binder);
        dsl::component::<Repository>()
            .in_singleton_scope()
            .set_on(binder);
        Ok(())
    }
}

#[test]
fn concurrent_singleton_requests_construct_once() {
    const THREADS: usize = 8;

    let module = RepositoryModule::new();
    let counter = Arc::clone(&module.counter);
    let container = Container::init(module).unwrap();

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let container = container.clone();
            thread::spawn(move || container.get(key::of::<Arc<Repository>>()).unwrap())
        })
        .collect();

    let repositories: Vec<Arc<Repository>> = handles
        .into_iter()
        .map(|handle| handle.join().expect("each thread should not `panic!()`"))
        .collect();

    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert!(repositories
        .iter()
        .all(|repository| Arc::ptr_eq(repository, &repositories[0])));
}

#[test]
fn transient_bindings_construct_per_request() {
    struct TransientModule {
        counter: Arc<AtomicUsize>,
    }

    impl Module for TransientModule {
        fn configure(&self, binder: &mut Binder<'_>) -> Result<(), Box<dyn Error + Send + Sync>> {
            dsl::instance(Arc::clone(&self.counter)).set_on(binder);
            dsl::component::<Repository>().set_on(binder);
            Ok(())
        }
    }

    let counter = Arc::new(AtomicUsize::new(0));
    let container = Container::init(TransientModule {
        counter: Arc::clone(&counter),
    })
    .unwrap();

    let first = container.get(key::of::<Arc<Repository>>()).unwrap();
    let second = container.get(key::of::<Arc<Repository>>()).unwrap();

    assert!(!Arc::ptr_eq(&first, &second));
    assert_ne!(first.sequence, second.sequence);
    assert_eq!(counter.load(Ordering::SeqCst), 2);
}

#[test]
fn qualified_bindings_coexist_with_the_primary() {
    struct Backup;

    struct QualifiedModule;

    impl Module for QualifiedModule {
        fn configure(&self, binder: &mut Binder<'_>) -> Result<(), Box<dyn Error + Send + Sync>> {
            dsl::instance(1i32).set_on(binder);
            dsl::instance(2i32).named("fallback").set_on(binder);
            dsl::instance(3i32).marked::<Backup>().set_on(binder);
            Ok(())
        }
    }

    let container = Container::init(QualifiedModule).unwrap();

    assert_eq!(container.get(key::of::<i32>()).unwrap(), 1);
    assert_eq!(container.get(key::named::<i32>("fallback")).unwrap(), 2);
    assert_eq!(container.get(key::marked::<i32, Backup>()).unwrap(), 3);
    assert!(matches!(
        container.get(key::named::<i32>("missing")),
        Err(InjectorError::NotFound { .. })
    ));
}

#[test]
fn colliding_erased_keys_fail_with_a_type_mismatch() {
    use std::collections::HashMap;

    struct CollidingModule;

    impl Module for CollidingModule {
        fn configure(&self, binder: &mut Binder<'_>) -> Result<(), Box<dyn Error + Send + Sync>> {
            let mut map = HashMap::new();
            map.insert(String::from("ones"), vec![1i32]);
            dsl::instance(map).set_on(binder);
            Ok(())
        }
    }

    let container = Container::init(CollidingModule).unwrap();

    let stored: HashMap<String, Vec<i32>> = container.get(key::of()).unwrap();
    assert_eq!(stored["ones"], vec![1]);

    // One-level erasure makes these keys equal while the Rust types differ.
    assert_eq!(
        key::of::<HashMap<String, Vec<i32>>>().into_key(),
        key::of::<HashMap<String, Vec<u32>>>().into_key()
    );
    assert!(matches!(
        container.get(key::of::<HashMap<String, Vec<u32>>>()),
        Err(InjectorError::TypeMismatch { .. })
    ));
}

mod cycles {
    use super::*;

    struct Chicken {
        egg: Deferred<Arc<Egg>>,
    }

    struct Egg {
        chicken: Arc<Chicken>,
    }

    impl Component for Chicken {
        type Constructed = Arc<Chicken>;

        type Error = Infallible;

        fn construct<I>(injector: &I) -> Result<Result<Self, Self::Error>, InjectorError>
        where
            I: TypedInjector + ?Sized,
        {
            let egg = injector.provider(key::of());
            Ok(Ok(Self { egg }))
        }

        fn post_process(self) -> Self::Constructed {
            Arc::new(self)
        }
    }

    impl Component for Egg {
        type Constructed = Arc<Egg>;

        type Error = Infallible;

        fn construct<I>(injector: &I) -> Result<Result<Self, Self::Error>, InjectorError>
        where
            I: TypedInjector + ?Sized,
        {
            let chicken = injector.get(key::of())?;
            Ok(Ok(Self { chicken }))
        }

        fn post_process(self) -> Self::Constructed {
            Arc::new(self)
        }
    }

    struct PoultryModule;

    impl Module for PoultryModule {
        fn configure(&self, binder: &mut Binder<'_>) -> Result<(), Box<dyn Error + Send + Sync>> {
            dsl::component::<Chicken>()
                .in_singleton_scope()
                .set_on(binder);
            dsl::component::<Egg>().set_on(binder);
            Ok(())
        }
    }

    #[test]
    fn deferred_handles_break_dependency_cycles() {
        let container = Container::init(PoultryModule).unwrap();

        let chicken = container.get(key::of::<Arc<Chicken>>()).unwrap();
        let egg = chicken.egg.get().unwrap();

        assert!(Arc::ptr_eq(&egg.chicken, &chicken));
    }

    #[derive(Debug)]
    struct Ouroboros {
        _tail: Arc<Ouroboros>,
    }

    impl Component for Ouroboros {
        type Constructed = Arc<Ouroboros>;

        type Error = Infallible;

        fn construct<I>(injector: &I) -> Result<Result<Self, Self::Error>, InjectorError>
        where
            I: TypedInjector + ?Sized,
        {
            let tail = injector.get(key::of())?;
            Ok(Ok(Self { _tail: tail }))
        }

        fn post_process(self) -> Self::Constructed {
            Arc::new(self)
        }
    }

    struct OuroborosModule;

    impl Module for OuroborosModule {
        fn configure(&self, binder: &mut Binder<'_>) -> Result<(), Box<dyn Error + Send + Sync>> {
            dsl::component::<Ouroboros>().set_on(binder);
            Ok(())
        }
    }

    struct Gateway {
        backend: Deferred<Arc<Backend>>,
    }

    struct Backend {
        gateway: Gateway,
    }

    impl Component for Backend {
        type Constructed = Arc<Backend>;

        type Error = Infallible;

        fn construct<I>(injector: &I) -> Result<Result<Self, Self::Error>, InjectorError>
        where
            I: TypedInjector + ?Sized,
        {
            let gateway = injector.get(key::of())?;
            Ok(Ok(Self { gateway }))
        }

        fn post_process(self) -> Self::Constructed {
            Arc::new(self)
        }
    }

    fn gateway_blueprint() -> Arc<Blueprint<Gateway>> {
        Arc::new(
            Blueprint::new(|wired: &mut Wired| {
                Ok(Gateway {
                    backend: wired.take_deferred("backend")?,
                })
            })
            .member(MemberBlueprint::deferred(
                "backend",
                TypeLiteral::of::<Arc<Backend>>(),
            )),
        )
    }

    struct GatewayModule;

    impl Module for GatewayModule {
        fn configure(&self, binder: &mut Binder<'_>) -> Result<(), Box<dyn Error + Send + Sync>> {
            dsl::blueprint(gateway_blueprint()).set_on(binder);
            dsl::component::<Backend>()
                .in_singleton_scope()
                .set_on(binder);
            Ok(())
        }
    }

    #[test]
    fn deferred_blueprint_members_break_dependency_cycles() {
        let container = Container::init(GatewayModule).unwrap();

        let backend = container.get(key::of::<Arc<Backend>>()).unwrap();
        let roundtrip = backend.gateway.backend.get().unwrap();

        assert!(Arc::ptr_eq(&backend, &roundtrip));
    }

    #[test]
    fn direct_cycles_fail_with_the_offending_chain() {
        let container = Container::init(OuroborosModule).unwrap();

        let err = container.get(key::of::<Arc<Ouroboros>>()).unwrap_err();
        let InjectorError::CyclicDependency { key, chain, .. } = err else {
            panic!("a self-dependency should be cyclic");
        };

        assert_eq!(key, key::of::<Arc<Ouroboros>>().into_key());
        assert_eq!(chain.first(), chain.last());
        assert!(chain.len() >= 2);
    }
}

mod lifecycle {
    use super::*;

    struct EventLog {
        events: Arc<Mutex<Vec<ScopeEventKind>>>,
    }

    impl ScopeEventListener for EventLog {
        fn on_scope_event(&self, kind: ScopeEventKind) {
            self.events.lock().push(kind);
        }
    }

    struct Subscriber;

    impl Component for Subscriber {
        type Constructed = Arc<Subscriber>;

        type Error = Infallible;

        fn construct<I>(injector: &I) -> Result<Result<Self, Self::Error>, InjectorError>
        where
            I: TypedInjector + ?Sized,
        {
            let events: Arc<Mutex<Vec<ScopeEventKind>>> = injector.get(key::of())?;
            let scope = injector.singleton_scope();
            scope.add_listener(ScopeEventKind::BeforeScopeEnd, Arc::new(EventLog {
                events: Arc::clone(&events),
            }));
            scope.add_listener(ScopeEventKind::AfterScopeEnd, Arc::new(EventLog { events }));
            Ok(Ok(Self))
        }

        fn post_process(self) -> Self::Constructed {
            Arc::new(self)
        }
    }

    struct SubscriberModule {
        events: Arc<Mutex<Vec<ScopeEventKind>>>,
    }

    impl Module for SubscriberModule {
        fn configure(&self, binder: &mut Binder<'_>) -> Result<(), Box<dyn Error + Send + Sync>> {
            dsl::instance(Arc::clone(&self.events)).set_on(binder);
            dsl::component::<Subscriber>()
                .as_eager_singleton()
                .set_on(binder);
            Ok(())
        }
    }

    #[test]
    fn shutdown_notifies_listeners_and_clears_singletons() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let container = Container::init(SubscriberModule {
            events: Arc::clone(&events),
        })
        .unwrap();

        let first = container.get(key::of::<Arc<Subscriber>>()).unwrap();
        container.shutdown();

        assert_eq!(
            *events.lock(),
            vec![ScopeEventKind::BeforeScopeEnd, ScopeEventKind::AfterScopeEnd]
        );

        let second = container.get(key::of::<Arc<Subscriber>>()).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn eager_singletons_are_constructed_at_build_time() {
        let module = RepositoryModule::new();
        let counter = Arc::clone(&module.counter);

        struct EagerModule;

        impl Module for EagerModule {
            fn configure(
                &self,
                binder: &mut Binder<'_>,
            ) -> Result<(), Box<dyn Error + Send + Sync>> {
                dsl::component::<Repository>()
                    .as_eager_singleton()
                    .set_on(binder);
                Ok(())
            }
        }

        let _container = Container::builder()
            .module(module)
            .module(EagerModule)
            .build()
            .unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn eager_construction_failures_fail_the_build() {
        struct DoomedModule;

        impl Module for DoomedModule {
            fn configure(
                &self,
                binder: &mut Binder<'_>,
            ) -> Result<(), Box<dyn Error + Send + Sync>> {
                // Repository's counter dependency is left unbound on purpose.
                dsl::component::<Repository>()
                    .as_eager_singleton()
                    .set_on(binder);
                Ok(())
            }
        }

        let err = Container::init(DoomedModule).unwrap_err();
        assert!(matches!(err, RegistryError::EagerConstruction { .. }));
    }

    #[test]
    fn custom_scopes_cache_until_their_scope_ends() {
        let request_scope = CachingScope::new();
        let counter = Arc::new(AtomicUsize::new(0));

        struct CountingModule {
            scope: CachingScope,
            counter: Arc<AtomicUsize>,
        }

        impl Module for CountingModule {
            fn configure(
                &self,
                binder: &mut Binder<'_>,
            ) -> Result<(), Box<dyn Error + Send + Sync>> {
                let counter = Arc::clone(&self.counter);
                dsl::closure(move |_: &dyn Injector| {
                    Ok(Ok::<_, Infallible>(Arc::new(
                        counter.fetch_add(1, Ordering::SeqCst),
                    )))
                })
                .in_scope(Arc::new(self.scope.clone()))
                .set_on(binder);
                Ok(())
            }
        }

        let container = Container::builder()
            .module(CountingModule {
                scope: request_scope.clone(),
                counter: Arc::clone(&counter),
            })
            .build()
            .unwrap();

        let first = container.get(key::of::<Arc<usize>>()).unwrap();
        let again = container.get(key::of::<Arc<usize>>()).unwrap();
        assert!(Arc::ptr_eq(&first, &again));

        request_scope.post_scope_event(ScopeEventKind::BeforeScopeEnd);
        let fresh = container.get(key::of::<Arc<usize>>()).unwrap();
        assert!(!Arc::ptr_eq(&first, &fresh));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }
}

mod dynamic {
    use super::*;

    struct AutoService;

    impl Component for AutoService {
        type Constructed = Arc<AutoService>;

        type Error = Infallible;

        fn construct<I>(_injector: &I) -> Result<Result<Self, Self::Error>, InjectorError>
        where
            I: TypedInjector + ?Sized,
        {
            Ok(Ok(Self))
        }

        fn post_process(self) -> Self::Constructed {
            Arc::new(self)
        }
    }

    struct MarkedService;

    impl Component for MarkedService {
        type Constructed = Arc<MarkedService>;

        type Error = Infallible;

        fn construct<I>(_injector: &I) -> Result<Result<Self, Self::Error>, InjectorError>
        where
            I: TypedInjector + ?Sized,
        {
            Ok(Ok(Self))
        }

        fn post_process(self) -> Self::Constructed {
            Arc::new(self)
        }

        fn type_markers() -> Vec<TypeLiteral> {
            vec![markers::singleton()]
        }
    }

    fn jit() -> JitComponents {
        JitComponents::new()
            .register_shared::<AutoService>()
            .register_shared::<MarkedService>()
    }

    #[test]
    fn synthesized_bindings_default_to_singletons() {
        let container = Container::builder()
            .enable_dynamic_bindings(jit())
            .build()
            .unwrap();

        let first = container.get(key::of::<Arc<AutoService>>()).unwrap();
        let second = container.get(key::of::<Arc<AutoService>>()).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        // The synthesized binding is memoized and observable afterwards.
        let binding = container
            .get_binding(&key::of::<Arc<AutoService>>().into_key())
            .unwrap();
        assert!(binding.is_scoped());
        assert!(binding.is_resolved());
    }

    #[test]
    fn synthesized_bindings_can_default_to_transient() {
        let container = Container::builder()
            .default_no_scope()
            .enable_dynamic_bindings(jit())
            .build()
            .unwrap();

        let first = container.get(key::of::<Arc<AutoService>>()).unwrap();
        let second = container.get(key::of::<Arc<AutoService>>()).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn singleton_markers_override_the_transient_default() {
        let container = Container::builder()
            .default_no_scope()
            .enable_dynamic_bindings(jit())
            .build()
            .unwrap();

        let first = container.get(key::of::<Arc<MarkedService>>()).unwrap();
        let second = container.get(key::of::<Arc<MarkedService>>()).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn unknown_keys_still_miss_with_a_factory_installed() {
        let container = Container::builder()
            .enable_dynamic_bindings(jit())
            .build()
            .unwrap();

        assert!(matches!(
            container.get(key::of::<Arc<String>>()),
            Err(InjectorError::NotFound { .. })
        ));
    }

    #[test]
    fn explicit_bindings_shadow_synthesized_ones() {
        struct ExplicitModule;

        impl Module for ExplicitModule {
            fn configure(
                &self,
                binder: &mut Binder<'_>,
            ) -> Result<(), Box<dyn Error + Send + Sync>> {
                dsl::instance(Arc::new(AutoService)).set_on(binder);
                Ok(())
            }
        }

        let container = Container::builder()
            .module(ExplicitModule)
            .enable_dynamic_bindings(jit())
            .build()
            .unwrap();

        let first = container.get(key::of::<Arc<AutoService>>()).unwrap();
        let second = container.get(key::of::<Arc<AutoService>>()).unwrap();
        // The instance binding clones the same Arc instead of synthesizing.
        assert!(Arc::ptr_eq(&first, &second));
        let binding = container
            .get_binding(&key::of::<Arc<AutoService>>().into_key())
            .unwrap();
        assert!(!binding.is_scoped());
    }
}

mod blueprints {
    use super::*;

    #[derive(Debug)]
    struct Report {
        title: String,
        pages: i32,
        reviewer: Option<String>,
        stamp: Option<i64>,
    }

    fn report_blueprint() -> Arc<Blueprint<Report>> {
        Arc::new(
            Blueprint::new(|wired: &mut Wired| {
                Ok(Report {
                    title: wired.take("title")?,
                    pages: wired.take("pages")?,
                    reviewer: wired.take_optional("reviewer")?,
                    stamp: None,
                })
            })
            .member(MemberBlueprint::new("title", TypeLiteral::of::<String>()))
            .member(MemberBlueprint::new("pages", TypeLiteral::of::<i32>()))
            .member(
                MemberBlueprint::new("reviewer", TypeLiteral::of::<String>())
                    .named("reviewer")
                    .optional(),
            )
            .field(
                MemberBlueprint::new("stamp", TypeLiteral::of::<i64>()),
                |report, wired| {
                    report.stamp = Some(wired.take("stamp")?);
                    Ok(())
                },
            ),
        )
    }

    struct ReportModule;

    impl Module for ReportModule {
        fn configure(&self, binder: &mut Binder<'_>) -> Result<(), Box<dyn Error + Send + Sync>> {
            dsl::instance(String::from("annual")).set_on(binder);
            dsl::instance(7i32).set_on(binder);
            dsl::instance(99i64).set_on(binder);
            dsl::blueprint(report_blueprint()).set_on(binder);
            Ok(())
        }
    }

    #[test]
    fn blueprints_wire_through_the_container() {
        let container = Container::init(ReportModule).unwrap();

        let report = container.get(key::of::<Report>()).unwrap();
        assert_eq!(report.title, "annual");
        assert_eq!(report.pages, 7);
        assert_eq!(report.reviewer, None);
        // The unmarked field is skipped under the default policy.
        assert_eq!(report.stamp, None);
    }

    #[test]
    fn a_permissive_policy_injects_unmarked_fields() {
        let container = Container::builder()
            .module(ReportModule)
            .injectable(|_| true)
            .build()
            .unwrap();

        let report = container.get(key::of::<Report>()).unwrap();
        assert_eq!(report.stamp, Some(99));
    }

    struct Lazy {
        connection: Deferred<Arc<String>>,
    }

    fn lazy_blueprint() -> Arc<Blueprint<Lazy>> {
        Arc::new(
            Blueprint::new(|wired: &mut Wired| {
                Ok(Lazy {
                    connection: wired.take_deferred("connection")?,
                })
            })
            .member(MemberBlueprint::deferred(
                "connection",
                TypeLiteral::of::<Arc<String>>(),
            )),
        )
    }

    #[test]
    fn deferred_members_resolve_against_live_bindings() {
        struct LazyModule;

        impl Module for LazyModule {
            fn configure(
                &self,
                binder: &mut Binder<'_>,
            ) -> Result<(), Box<dyn Error + Send + Sync>> {
                dsl::instance(Arc::new(String::from("postgres://primary"))).set_on(binder);
                dsl::blueprint(lazy_blueprint()).set_on(binder);
                Ok(())
            }
        }

        let container = Container::init(LazyModule).unwrap();

        let lazy = container.get(key::of::<Lazy>()).unwrap();
        let connection = lazy.connection.get().unwrap();
        let direct = container.get(key::of::<Arc<String>>()).unwrap();

        assert_eq!(*connection, "postgres://primary");
        assert!(Arc::ptr_eq(&connection, &direct));
    }

    #[test]
    fn missing_required_members_name_the_member_and_requester() {
        struct SparseModule;

        impl Module for SparseModule {
            fn configure(
                &self,
                binder: &mut Binder<'_>,
            ) -> Result<(), Box<dyn Error + Send + Sync>> {
                // `title` / `pages` dependencies are left unbound.
                dsl::blueprint(report_blueprint()).set_on(binder);
                Ok(())
            }
        }

        let container = Container::init(SparseModule).unwrap();
        let err = container.get(key::of::<Report>()).unwrap_err();

        let InjectorError::UnsatisfiedDependency {
            member,
            requested_by,
            ..
        } = err
        else {
            panic!("a missing required member should be reported");
        };
        assert_eq!(member, "title");
        assert_eq!(requested_by, TypeLiteral::of::<Report>());
    }
}
