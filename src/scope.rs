use std::collections::HashMap;
use std::fmt::{Debug, Display, Formatter, Result as FmtResult};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use oneshot::{Receiver, Sender};
use parking_lot::{Mutex, RwLock, RwLockWriteGuard};

use crate::container::injector::{CallContext, Injector, InjectorError};
use crate::container::{Managed, SharedManaged};
use crate::key::Key;
use crate::provider::{Provider, SharedProvider};

/// A lifecycle policy for resolved instances: whether provider results are
/// cached per key, and how lifecycle events reach the instances it holds.
pub trait Scope: Send + Sync + 'static {
    /// Wraps a shared provider into a provider enforcing this scope's
    /// caching behavior. Bindings invoke the wrapped provider on every
    /// request; the wrapper decides whether construction actually happens.
    fn scoped(&self, provider: Arc<dyn SharedProvider>) -> Arc<dyn Provider>;

    /// Broadcasts a lifecycle event to every listener registered in this
    /// scope, in registration order.
    ///
    /// Broadcasting is meant for steady state: the caller must ensure no
    /// construction is in flight in this scope when posting an event.
    fn post_scope_event(&self, kind: ScopeEventKind);
}

/// The lifecycle events a scope can broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeEventKind {
    /// The scope is about to end. A caching scope drops every cached
    /// instance right after broadcasting this event.
    BeforeScopeEnd,
    /// The scope has ended. A caching scope drops its listeners right after
    /// broadcasting this event.
    AfterScopeEnd,
}

impl Display for ScopeEventKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::BeforeScopeEnd => write!(f, "BeforeScopeEnd"),
            Self::AfterScopeEnd => write!(f, "AfterScopeEnd"),
        }
    }
}

/// A subscriber to scope lifecycle events, typically a cached instance that
/// has to release resources when its scope ends.
pub trait ScopeEventListener: Send + Sync {
    fn on_scope_event(&self, kind: ScopeEventKind);
}

/// The scope of unbounded objects: a fresh instance per request, no cache,
/// no lifecycle broadcast.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoScope;

impl NoScope {
    pub fn new() -> Self {
        Self
    }
}

impl Scope for NoScope {
    fn scoped(&self, provider: Arc<dyn SharedProvider>) -> Arc<dyn Provider> {
        Arc::new(UnscopedProvider { inner: provider })
    }

    fn post_scope_event(&self, _kind: ScopeEventKind) {}
}

#[derive(Debug)]
struct UnscopedProvider {
    inner: Arc<dyn SharedProvider>,
}

impl Provider for UnscopedProvider {
    fn dyn_provide(
        &self,
        injector: &dyn Injector,
        context: &CallContext<'_>,
    ) -> Result<Box<dyn Managed>, InjectorError> {
        self.inner.dyn_provide(injector, context)
    }
}

/// A caching scope: at most one instance per key, alive until the scope
/// ends. The container's singleton scope is one instance of this type, and
/// further instances act as custom scopes.
///
/// Each key's cache slot moves through `absent -> constructing -> cached`.
/// The `absent -> constructing` transition is taken by exactly one caller;
/// concurrent callers for the same key wait for that construction and then
/// observe the same instance. A failed construction reverts the slot to
/// absent, propagates the failure to every waiter and leaves the slot
/// retryable.
#[derive(Clone, Default)]
pub struct CachingScope {
    inner: Arc<CachingScopeInner>,
}

impl CachingScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes `listener` to events of the given kind. Listeners are
    /// notified in registration order and dropped once the scope has ended.
    pub fn add_listener(&self, kind: ScopeEventKind, listener: Arc<dyn ScopeEventListener>) {
        self.inner.listeners.lock().push((kind, listener));
    }

    /// Whether an instance for `key` is currently cached. Introspection
    /// only; never constructs.
    pub fn is_cached(&self, key: &Key) -> bool {
        self.inner.state.read().cached.contains_key(key)
    }

    fn obtain(
        &self,
        provider: &dyn SharedProvider,
        injector: &dyn Injector,
        context: &CallContext<'_>,
    ) -> Result<Box<dyn Managed>, InjectorError> {
        let key = context.key();
        if let Some(object) = self.try_get_cached(key) {
            return Ok(object);
        }

        let mut state = self.inner.state.write();
        if let Some(object) = state.cached.get(key) {
            return Ok(object.dyn_clone().upcast_managed());
        }

        if let Some(watch) = state.constructing.get_mut(key) {
            if watch.is_constructing_on_current_thread() {
                Err(self.stop_construction_on_cycle(state, context))
            } else {
                self.wait_for_cached_object(state, key)
            }
        } else {
            self.construct_object(state, provider, injector, context)
        }
    }

    fn try_get_cached(&self, key: &Key) -> Option<Box<dyn Managed>> {
        let state = self.inner.state.read();
        state
            .cached
            .get(key)
            .map(|object| object.dyn_clone().upcast_managed())
    }

    fn stop_construction_on_cycle(
        &self,
        state: RwLockWriteGuard<'_, CacheState>,
        context: &CallContext<'_>,
    ) -> InjectorError {
        let key = context.key();
        let err = InjectorError::CyclicDependency {
            key: key.clone(),
            chain: context.trace().chain(),
        };
        self.notify_waiters(state, key, WaitResponse::Error(err.clone()));
        err
    }

    fn wait_for_cached_object(
        &self,
        mut state: RwLockWriteGuard<'_, CacheState>,
        key: &Key,
    ) -> Result<Box<dyn Managed>, InjectorError> {
        let (sender, receiver) = oneshot::channel();
        let Some(watch) = state.constructing.get_mut(key) else {
            unreachable!("whether `watch` exists should be checked before calling this method")
        };
        watch.register_waiter(sender);
        drop(state);

        self.get_object_on_response(receiver, key)
    }

    fn get_object_on_response(
        &self,
        receiver: Receiver<WaitResponse>,
        key: &Key,
    ) -> Result<Box<dyn Managed>, InjectorError> {
        match receiver.recv() {
            Ok(WaitResponse::Constructed) => {
                let state = self.inner.state.read();
                let Some(object) = state.cached.get(key) else {
                    unreachable!("`object` should already be cached by the constructing caller")
                };
                Ok(object.dyn_clone().upcast_managed())
            }
            Ok(WaitResponse::Error(err)) => Err(err),
            Err(_) => unreachable!("the constructing caller should send a response"),
        }
    }

    fn construct_object(
        &self,
        mut state: RwLockWriteGuard<'_, CacheState>,
        provider: &dyn SharedProvider,
        injector: &dyn Injector,
        context: &CallContext<'_>,
    ) -> Result<Box<dyn Managed>, InjectorError> {
        let key = context.key();
        let watch = ConstructionWatch::new(thread::current().id());
        state.constructing.insert(key.clone(), watch);
        drop(state);

        match provider.dyn_provide_shared(injector, context) {
            Ok(object) => {
                let mut state = self.inner.state.write();
                state.cached.insert(key.clone(), object.dyn_clone());
                self.notify_waiters(state, key, WaitResponse::Constructed);
                Ok(object.upcast_managed())
            }
            Err(err) => {
                let state = self.inner.state.write();
                self.notify_waiters(state, key, WaitResponse::Error(err.clone()));
                Err(err)
            }
        }
    }

    fn notify_waiters(
        &self,
        mut state: RwLockWriteGuard<'_, CacheState>,
        key: &Key,
        response: WaitResponse,
    ) {
        if let Some(watch) = state.constructing.remove(key) {
            drop(state);
            watch.notify(response);
        }
    }
}

impl Scope for CachingScope {
    fn scoped(&self, provider: Arc<dyn SharedProvider>) -> Arc<dyn Provider> {
        Arc::new(CachingProvider {
            scope: self.clone(),
            inner: provider,
        })
    }

    fn post_scope_event(&self, kind: ScopeEventKind) {
        let listeners: Vec<_> = self
            .inner
            .listeners
            .lock()
            .iter()
            .filter(|(listens_to, _)| *listens_to == kind)
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in &listeners {
            listener.on_scope_event(kind);
        }

        match kind {
            ScopeEventKind::BeforeScopeEnd => self.inner.state.write().cached.clear(),
            ScopeEventKind::AfterScopeEnd => self.inner.listeners.lock().clear(),
        }
    }
}

impl Debug for CachingScope {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("CachingScope").finish_non_exhaustive()
    }
}

#[derive(Default)]
struct CachingScopeInner {
    state: RwLock<CacheState>,
    listeners: Mutex<Vec<(ScopeEventKind, Arc<dyn ScopeEventListener>)>>,
}

#[derive(Default)]
struct CacheState {
    cached: HashMap<Key, Box<dyn SharedManaged>>,
    constructing: HashMap<Key, ConstructionWatch>,
}

struct ConstructionWatch {
    on_thread: ThreadId,
    waiters: Vec<Sender<WaitResponse>>,
}

impl ConstructionWatch {
    fn new(on_thread: ThreadId) -> Self {
        Self {
            on_thread,
            waiters: Vec::new(),
        }
    }

    fn is_constructing_on_current_thread(&self) -> bool {
        thread::current().id() == self.on_thread
    }

    fn register_waiter(&mut self, sender: Sender<WaitResponse>) {
        self.waiters.push(sender);
    }

    fn notify(self, response: WaitResponse) {
        for sender in self.waiters {
            let _ = sender.send(response.clone());
        }
    }
}

#[derive(Debug, Clone)]
enum WaitResponse {
    Constructed,
    Error(InjectorError),
}

#[derive(Debug)]
struct CachingProvider {
    scope: CachingScope,
    inner: Arc<dyn SharedProvider>,
}

impl Provider for CachingProvider {
    fn dyn_provide(
        &self,
        injector: &dyn Injector,
        context: &CallContext<'_>,
    ) -> Result<Box<dyn Managed>, InjectorError> {
        self.scope.obtain(self.inner.as_ref(), injector, context)
    }
}
