mod type_literal;

use std::fmt::{Debug, Display, Formatter, Result as FmtResult};
use std::marker::PhantomData;

use crate::container::Managed;

pub use type_literal::{TypeDescriptor, TypeLiteral, TypeLiteralError};

/// The lookup unit of the binding registry: a structural type identity plus
/// an optional qualifier distinguishing multiple bindings of the same type.
///
/// Keys are plain values. Equality and hashing are structural over the type
/// literal and the qualifier, so independently constructed keys for the same
/// binding always collide in the registry map.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Key {
    type_literal: TypeLiteral,
    qualifier: Qualifier,
}

/// A secondary discriminator on a [`Key`]: either a name or a marker type.
/// At most one is present; the default is the unqualified primary binding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum Qualifier {
    #[default]
    None,
    Named(String),
    Marker(TypeLiteral),
}

impl Key {
    /// Builds the primary, unqualified key for a type literal.
    pub fn new(type_literal: TypeLiteral) -> Self {
        Self {
            type_literal,
            qualifier: Qualifier::None,
        }
    }

    /// Builds a key qualified by a name.
    pub fn named(type_literal: TypeLiteral, name: impl Into<String>) -> Self {
        Self {
            type_literal,
            qualifier: Qualifier::Named(name.into()),
        }
    }

    /// Builds a key with an explicit qualifier value.
    pub fn qualified(type_literal: TypeLiteral, qualifier: Qualifier) -> Self {
        Self {
            type_literal,
            qualifier,
        }
    }

    /// Builds a key qualified by a marker type.
    pub fn marked(type_literal: TypeLiteral, marker: TypeLiteral) -> Self {
        Self {
            type_literal,
            qualifier: Qualifier::Marker(marker),
        }
    }

    pub fn type_literal(&self) -> &TypeLiteral {
        &self.type_literal
    }

    pub fn qualifier(&self) -> &Qualifier {
        &self.qualifier
    }

    pub fn is_qualified(&self) -> bool {
        self.qualifier != Qualifier::None
    }
}

impl Display for Key {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match &self.qualifier {
            Qualifier::None => write!(f, "{}", self.type_literal),
            Qualifier::Named(name) => write!(f, "{}@{name:?}", self.type_literal),
            Qualifier::Marker(marker) => write!(f, "{}@{marker}", self.type_literal),
        }
    }
}

/// A [`Key`] that remembers which Rust type its binding produces, so typed
/// lookups can downcast the resolved object without a runtime check failing.
pub struct TypedKey<T>
where
    T: Managed,
{
    key: Key,
    _marker: PhantomData<fn() -> T>,
}

impl<T> TypedKey<T>
where
    T: Managed,
{
    fn new(key: Key) -> Self {
        Self {
            key,
            _marker: PhantomData,
        }
    }

    pub fn as_key(&self) -> &Key {
        &self.key
    }

    pub fn into_key(self) -> Key {
        self.key
    }
}

impl<T: Managed> Clone for TypedKey<T> {
    fn clone(&self) -> Self {
        Self::new(self.key.clone())
    }
}

impl<T: Managed> Debug for TypedKey<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        Display::fmt(&self.key, f)
    }
}

impl<T: Managed> Display for TypedKey<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        Display::fmt(&self.key, f)
    }
}

impl<T: Managed> PartialEq for TypedKey<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<T: Managed> Eq for TypedKey<T> {}

impl<T: Managed> From<TypedKey<T>> for Key {
    fn from(key: TypedKey<T>) -> Self {
        key.key
    }
}

/// Builds the primary key for `T`.
pub fn of<T>() -> TypedKey<T>
where
    T: Managed,
{
    TypedKey::new(Key::new(TypeLiteral::of::<T>()))
}

/// Builds a key for `T` qualified by a name.
pub fn named<T>(name: impl Into<String>) -> TypedKey<T>
where
    T: Managed,
{
    TypedKey::new(Key::named(TypeLiteral::of::<T>(), name))
}

/// Builds a key for `T` with an explicit qualifier value.
pub fn qualified<T>(qualifier: Qualifier) -> TypedKey<T>
where
    T: Managed,
{
    TypedKey::new(Key::qualified(TypeLiteral::of::<T>(), qualifier))
}

/// Builds a key for `T` qualified by the marker type `M`.
pub fn marked<T, M>() -> TypedKey<T>
where
    T: Managed,
    M: 'static,
{
    TypedKey::new(Key::marked(TypeLiteral::of::<T>(), TypeLiteral::of::<M>()))
}
