use std::collections::HashMap;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;

use crate::container::SharedManaged;
use crate::key::{Key, TypeLiteral};
use crate::provider::component::{Component, ComponentProvider};
use crate::provider::{Provider, SharedProvider};

/// A source of bindings synthesized on demand.
///
/// When a lookup misses and the container has dynamic bindings enabled, the
/// factory is asked once for the missing key. A synthesized binding is
/// memoized, so later lookups of the same key observe the same binding.
pub trait DynamicBindingFactory: Send + Sync + 'static {
    /// Produces the providers for `key`, or [`None`] if the factory does
    /// not recognize it. Only unqualified keys are ever passed in.
    fn synthesize(&self, key: &Key) -> Option<Synthesized>;
}

/// The providers and markers a [`DynamicBindingFactory`] produced for one
/// key. The container picks the transient or the shared form depending on
/// the markers and its default lifetime for synthesized bindings.
pub struct Synthesized {
    transient: Arc<dyn Provider>,
    shared: Option<Arc<dyn SharedProvider>>,
    markers: Vec<TypeLiteral>,
}

impl Synthesized {
    pub fn new(transient: Arc<dyn Provider>) -> Self {
        Self {
            transient,
            shared: None,
            markers: Vec::new(),
        }
    }

    /// Supplies the shared form, making the synthesized binding eligible
    /// for the singleton scope.
    pub fn with_shared(mut self, shared: Arc<dyn SharedProvider>) -> Self {
        self.shared = Some(shared);
        self
    }

    /// Attaches the constructed type's markers, consulted by the wiring
    /// policy's singleton predicate.
    pub fn with_markers(mut self, markers: Vec<TypeLiteral>) -> Self {
        self.markers = markers;
        self
    }

    pub fn markers(&self) -> &[TypeLiteral] {
        &self.markers
    }

    pub(crate) fn into_parts(
        self,
    ) -> (
        Arc<dyn Provider>,
        Option<Arc<dyn SharedProvider>>,
        Vec<TypeLiteral>,
    ) {
        (self.transient, self.shared, self.markers)
    }
}

impl Debug for Synthesized {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Synthesized")
            .field("shared", &self.shared.is_some())
            .field("markers", &self.markers)
            .finish_non_exhaustive()
    }
}

type SynthesizeFn = Box<dyn Fn() -> Synthesized + Send + Sync>;

/// A [`DynamicBindingFactory`] backed by a fixed set of [`Component`]
/// implementations, keyed by their constructed type.
#[derive(Default)]
pub struct JitComponents {
    factories: HashMap<TypeLiteral, SynthesizeFn>,
}

impl JitComponents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a component whose constructed type cannot be shared, so
    /// its synthesized bindings are always transient.
    pub fn register<C>(mut self) -> Self
    where
        C: Component,
    {
        self.factories.insert(
            TypeLiteral::of::<C::Constructed>(),
            Box::new(|| {
                Synthesized::new(Arc::new(ComponentProvider::<C>::new()))
                    .with_markers(C::type_markers())
            }),
        );
        self
    }

    /// Registers a component whose constructed type can be shared, letting
    /// the container cache it when its lifetime rules say so.
    pub fn register_shared<C>(mut self) -> Self
    where
        C: Component<Constructed: SharedManaged>,
    {
        self.factories.insert(
            TypeLiteral::of::<C::Constructed>(),
            Box::new(|| {
                Synthesized::new(Arc::new(ComponentProvider::<C>::new()))
                    .with_shared(Arc::new(ComponentProvider::<C>::new()))
                    .with_markers(C::type_markers())
            }),
        );
        self
    }
}

impl DynamicBindingFactory for JitComponents {
    fn synthesize(&self, key: &Key) -> Option<Synthesized> {
        self.factories
            .get(key.type_literal())
            .map(|factory| factory())
    }
}

impl Debug for JitComponents {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("JitComponents")
            .field("types", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}
