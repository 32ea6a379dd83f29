use std::collections::HashMap;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;

use snafu::Snafu;

use crate::container::injector::{CallContext, InjectorError, TypedInjector};
use crate::container::{Managed, SharedManaged};
use crate::key::{Key, Qualifier, TypeLiteral};
use crate::policy::WiringPolicy;
use crate::provider::deferred::{Deferred, DynDeferred};
use crate::provider::{TypedProvider, TypedSharedProvider};
use crate::util::any::Downcast;

/// Declares a single injectable member of a wired type: a constructor
/// parameter or a settable field.
///
/// The declared [`TypeLiteral`] and the attached markers decide which [`Key`]
/// the member resolves to. A member declared with
/// [`MemberBlueprint::deferred`], or whose declared type matches the wiring
/// policy's provider wrapper predicate, receives a lazy [`Deferred`] handle
/// instead of an eagerly resolved instance.
#[derive(Debug, Clone)]
pub struct MemberBlueprint {
    name: &'static str,
    declared: TypeLiteral,
    target: Option<TypeLiteral>,
    markers: Vec<TypeLiteral>,
    qualifier: Option<Qualifier>,
    optional: bool,
}

impl MemberBlueprint {
    pub fn new(name: &'static str, declared: TypeLiteral) -> Self {
        Self {
            name,
            declared,
            target: None,
            markers: Vec::new(),
            qualifier: None,
            optional: false,
        }
    }

    /// Declares a member that receives a lazy handle to `target` instead of
    /// an eagerly resolved instance.
    ///
    /// The target literal is carried verbatim, so parameterized targets keep
    /// their argument names. Deriving the target from a declared wrapper
    /// type cannot do that: one-level erasure drops the wrapper argument's
    /// own arguments.
    pub fn deferred(name: &'static str, target: TypeLiteral) -> Self {
        Self {
            name,
            declared: target.clone(),
            target: Some(target),
            markers: Vec::new(),
            qualifier: None,
            optional: false,
        }
    }

    /// Attaches a marker type to this member. Markers matching the policy's
    /// qualifier predicate qualify the resolved key; markers matching the
    /// injectable predicate opt a field into injection.
    pub fn marker(mut self, marker: TypeLiteral) -> Self {
        self.markers.push(marker);
        self
    }

    /// Qualifies the resolved key by name, overriding any marker qualifier.
    pub fn named(mut self, name: &str) -> Self {
        self.qualifier = Some(Qualifier::Named(name.to_owned()));
        self
    }

    /// Marks this member as optional: an unbound key yields an absent value
    /// instead of an unsatisfied dependency error.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn declared(&self) -> &TypeLiteral {
        &self.declared
    }

    pub fn markers(&self) -> &[TypeLiteral] {
        &self.markers
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    fn resolved_key(&self, policy: &WiringPolicy) -> (Key, bool) {
        let (type_literal, wrapped) = match &self.target {
            Some(target) => (target.clone(), true),
            // A declared wrapper type without an explicit target falls back
            // to the wrapper's erased argument name, which only reaches
            // unparameterized targets.
            None if policy.is_provider_wrapper(&self.declared) => {
                let fallback = self
                    .declared
                    .argument_names()
                    .first()
                    .and_then(|name| TypeLiteral::named(name.as_str()).ok())
                    .unwrap_or_else(|| self.declared.clone());
                (fallback, true)
            }
            None => (self.declared.clone(), false),
        };

        let qualifier = match &self.qualifier {
            Some(qualifier) => qualifier.clone(),
            None => self
                .markers
                .iter()
                .find(|marker| policy.is_qualifier(marker))
                .map(|marker| Qualifier::Marker(marker.clone()))
                .unwrap_or(Qualifier::None),
        };

        (Key::qualified(type_literal, qualifier), wrapped)
    }
}

/// A mistake in a blueprint itself, such as taking a member under a wrong
/// type or taking one that was never declared. Surfaced to callers as an
/// object construction failure.
#[derive(Debug, Snafu)]
pub enum WiringMismatch {
    #[snafu(display("member `{member}` was not wired or was already taken"))]
    MissingMember { member: &'static str },
    #[snafu(display("member `{member}` is not of type `{expected}`"))]
    MemberTypeMismatch {
        member: &'static str,
        expected: &'static str,
    },
}

enum MemberValue {
    Instance(Box<dyn Managed>),
    Handle(DynDeferred),
    Absent,
}

/// The resolved member values handed to a blueprint's creation closure and
/// setters. Each member is taken at most once.
#[derive(Default)]
pub struct Wired {
    values: HashMap<&'static str, MemberValue>,
}

impl Wired {
    fn insert(&mut self, name: &'static str, value: MemberValue) {
        self.values.insert(name, value);
    }

    /// Takes a required member by name.
    pub fn take<T>(&mut self, name: &'static str) -> Result<T, WiringMismatch>
    where
        T: Managed,
    {
        match self.take_optional(name)? {
            Some(value) => Ok(value),
            None => MissingMemberSnafu { member: name }.fail(),
        }
    }

    /// Takes an optional member by name. Returns [`None`] if the member was
    /// declared optional and its key was unbound.
    pub fn take_optional<T>(&mut self, name: &'static str) -> Result<Option<T>, WiringMismatch>
    where
        T: Managed,
    {
        match self.values.remove(name) {
            Some(MemberValue::Instance(object)) => match object.downcast::<T>() {
                Ok(value) => Ok(Some(*value)),
                Err(_) => MemberTypeMismatchSnafu {
                    member: name,
                    expected: std::any::type_name::<T>(),
                }
                .fail(),
            },
            Some(MemberValue::Absent) => Ok(None),
            Some(MemberValue::Handle(_)) | None => MissingMemberSnafu { member: name }.fail(),
        }
    }

    /// Takes a member declared with a provider wrapper type as a lazy handle.
    pub fn take_deferred<T>(&mut self, name: &'static str) -> Result<Deferred<T>, WiringMismatch>
    where
        T: Managed,
    {
        match self.values.remove(name) {
            Some(MemberValue::Handle(handle)) => Ok(Deferred::from_dyn(handle)),
            Some(_) | None => MissingMemberSnafu { member: name }.fail(),
        }
    }
}

impl Debug for Wired {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Wired")
            .field("members", &self.values.keys().collect::<Vec<_>>())
            .finish()
    }
}

type CreateFn<T> = Box<dyn Fn(&mut Wired) -> Result<T, WiringMismatch> + Send + Sync>;
type SetterFn<T> = Box<dyn Fn(&mut T, &mut Wired) -> Result<(), WiringMismatch> + Send + Sync>;

/// A declarative wiring plan for a type: its constructor members, its
/// injectable fields and its marker types.
///
/// Constructor members are always resolved. Field members are resolved only
/// when the container's wiring policy deems them injectable, so a policy can
/// restrict field injection to members carrying a chosen marker.
pub struct Blueprint<T>
where
    T: Managed,
{
    type_markers: Vec<TypeLiteral>,
    constructor: Vec<MemberBlueprint>,
    create: CreateFn<T>,
    fields: Vec<(MemberBlueprint, SetterFn<T>)>,
}

impl<T> Blueprint<T>
where
    T: Managed,
{
    pub fn new<F>(create: F) -> Self
    where
        F: Fn(&mut Wired) -> Result<T, WiringMismatch> + Send + Sync + 'static,
    {
        Self {
            type_markers: Vec::new(),
            constructor: Vec::new(),
            create: Box::new(create),
            fields: Vec::new(),
        }
    }

    /// Declares a constructor member, resolved before the creation closure
    /// runs and taken from [`Wired`] inside it.
    pub fn member(mut self, member: MemberBlueprint) -> Self {
        self.constructor.push(member);
        self
    }

    /// Declares a field member together with its setter. The setter takes
    /// the member from [`Wired`] and stores it on the constructed object.
    pub fn field<F>(mut self, member: MemberBlueprint, setter: F) -> Self
    where
        F: Fn(&mut T, &mut Wired) -> Result<(), WiringMismatch> + Send + Sync + 'static,
    {
        self.fields.push((member, Box::new(setter)));
        self
    }

    /// Attaches a marker type to the wired type itself, consulted when a
    /// binding for it is synthesized on demand.
    pub fn marker(mut self, marker: TypeLiteral) -> Self {
        self.type_markers.push(marker);
        self
    }

    pub fn type_markers(&self) -> &[TypeLiteral] {
        &self.type_markers
    }
}

impl<T> Debug for Blueprint<T>
where
    T: Managed,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Blueprint<T>")
            .field("constructor", &self.constructor)
            .field(
                "fields",
                &self.fields.iter().map(|(member, _)| member).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

/// A [`Provider`] which wires objects according to a [`Blueprint`].
///
/// [`Provider`]: crate::provider::Provider
pub struct BlueprintProvider<T>
where
    T: Managed,
{
    blueprint: Arc<Blueprint<T>>,
}

impl<T> BlueprintProvider<T>
where
    T: Managed,
{
    pub fn new(blueprint: Arc<Blueprint<T>>) -> Self {
        Self { blueprint }
    }

    fn resolve_member<I>(
        injector: &I,
        context: &CallContext<'_>,
        policy: &WiringPolicy,
        member: &MemberBlueprint,
    ) -> Result<MemberValue, InjectorError>
    where
        I: TypedInjector + ?Sized,
    {
        let (key, wrapped) = member.resolved_key(policy);
        if wrapped {
            return Ok(MemberValue::Handle(injector.upcast_dyn().dyn_provider(&key)));
        }

        match injector.upcast_dyn().dyn_get_dependency(&key, context) {
            Ok(object) => Ok(MemberValue::Instance(object)),
            Err(InjectorError::NotFound { .. }) if member.is_optional() => {
                Ok(MemberValue::Absent)
            }
            Err(InjectorError::NotFound { .. }) => Err(InjectorError::UnsatisfiedDependency {
                member: member.name(),
                key,
                requested_by: context.key().type_literal().clone(),
            }),
            Err(err) => Err(err),
        }
    }
}

impl<T> Debug for BlueprintProvider<T>
where
    T: Managed,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("BlueprintProvider<T>")
            .field("blueprint", &self.blueprint)
            .finish()
    }
}

impl<T> TypedProvider for BlueprintProvider<T>
where
    T: Managed,
{
    type Output = T;

    fn provide<I>(
        &self,
        injector: &I,
        context: &CallContext<'_>,
    ) -> Result<Self::Output, InjectorError>
    where
        I: TypedInjector + ?Sized,
    {
        let policy = injector.wiring_policy();
        let mut wired = Wired::default();

        for member in &self.blueprint.constructor {
            let value = Self::resolve_member(injector, context, &policy, member)?;
            wired.insert(member.name(), value);
        }

        let mistake = |err: WiringMismatch| InjectorError::ObjectConstruction {
            key: context.key().clone(),
            source: Arc::new(err),
        };

        let mut object = (self.blueprint.create)(&mut wired).map_err(mistake)?;

        for (member, setter) in &self.blueprint.fields {
            if !policy.is_injectable(member) {
                continue;
            }
            let value = Self::resolve_member(injector, context, &policy, member)?;
            wired.insert(member.name(), value);
            setter(&mut object, &mut wired).map_err(mistake)?;
        }

        Ok(object)
    }
}

impl<T> TypedSharedProvider for BlueprintProvider<T> where T: SharedManaged {}
