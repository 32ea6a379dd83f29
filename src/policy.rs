use std::fmt::{Debug, Formatter, Result as FmtResult};

use crate::key::TypeLiteral;
use crate::provider::blueprint::MemberBlueprint;
use crate::provider::deferred::Deferred;

pub type MemberPredicate = Box<dyn Fn(&MemberBlueprint) -> bool + Send + Sync>;
pub type TypePredicate = Box<dyn Fn(&TypeLiteral) -> bool + Send + Sync>;

/// The strategy set that decides how blueprint members are wired: which
/// declared slots get injected, which markers act as qualifiers, which type
/// markers imply singleton lifetime, and which declared types are deferred
/// provider wrappers.
///
/// Supplying custom predicates lets the same resolution engine mirror the
/// conventions of a different injection framework without touching the
/// engine itself. The defaults recognize this crate's own markers.
pub struct WiringPolicy {
    injectable: MemberPredicate,
    qualifier: TypePredicate,
    singleton_marker: TypePredicate,
    provider_wrapper: TypePredicate,
}

impl WiringPolicy {
    pub fn new() -> Self {
        Self {
            injectable: Box::new(|member| member.markers().contains(&markers::inject())),
            qualifier: Box::new(|marker| !markers::is_builtin(marker)),
            singleton_marker: Box::new(|marker| *marker == markers::singleton()),
            provider_wrapper: Box::new(|literal| {
                literal.raw_name() == TypeLiteral::of::<Deferred<()>>().raw_name()
            }),
        }
    }

    pub fn with_injectable(mut self, predicate: MemberPredicate) -> Self {
        self.injectable = predicate;
        self
    }

    pub fn with_qualifier(mut self, predicate: TypePredicate) -> Self {
        self.qualifier = predicate;
        self
    }

    pub fn with_singleton_marker(mut self, predicate: TypePredicate) -> Self {
        self.singleton_marker = predicate;
        self
    }

    pub fn with_provider_wrapper(mut self, predicate: TypePredicate) -> Self {
        self.provider_wrapper = predicate;
        self
    }

    pub fn is_injectable(&self, member: &MemberBlueprint) -> bool {
        (self.injectable)(member)
    }

    pub fn is_qualifier(&self, marker: &TypeLiteral) -> bool {
        (self.qualifier)(marker)
    }

    pub fn is_singleton_marker(&self, marker: &TypeLiteral) -> bool {
        (self.singleton_marker)(marker)
    }

    pub fn is_provider_wrapper(&self, literal: &TypeLiteral) -> bool {
        (self.provider_wrapper)(literal)
    }
}

impl Default for WiringPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for WiringPolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("WiringPolicy").finish_non_exhaustive()
    }
}

/// Built-in wiring markers recognized by the default [`WiringPolicy`].
pub mod markers {
    use crate::key::TypeLiteral;

    /// Marks a declared field slot as injectable.
    pub struct Inject;

    /// Marks a component type as singleton-scoped.
    pub struct Singleton;

    pub fn inject() -> TypeLiteral {
        TypeLiteral::of::<Inject>()
    }

    pub fn singleton() -> TypeLiteral {
        TypeLiteral::of::<Singleton>()
    }

    pub fn is_builtin(marker: &TypeLiteral) -> bool {
        *marker == inject() || *marker == singleton()
    }
}
