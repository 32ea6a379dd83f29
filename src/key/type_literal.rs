use std::any;
use std::collections::HashMap;
use std::fmt::{Display, Formatter, Result as FmtResult};

use snafu::prelude::*;

/// A structural description of a possibly parameterized type.
///
/// A [`TypeLiteral`] captures a type as its raw name plus the names of its
/// generic arguments, one level deep. Equality and hashing are structural, so
/// two literals built independently for the same type always compare equal,
/// no matter which constructor produced them.
///
/// Generic arguments are recorded by their raw name only: the inner arguments
/// of a nested generic type are dropped. `HashMap<String, Vec<i32>>` records
/// its value argument as `Vec`, not `Vec<i32>`. Callers that need to tell
/// deeply nested types apart must disambiguate with a qualifier instead.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeLiteral {
    raw_name: String,
    argument_names: Vec<String>,
}

/// Reserved stand-in for wildcard and unbounded type positions.
struct WildcardMarker;

impl TypeLiteral {
    /// Builds the literal for `T`, splitting its full name into the raw name
    /// and one level of generic argument names.
    pub fn of<T: ?Sized + 'static>() -> Self {
        let (raw_name, argument_names) = parse_type_name(any::type_name::<T>());
        Self {
            raw_name,
            argument_names,
        }
    }

    /// Builds the literal for `Vec<E>`.
    pub fn of_list<E: 'static>() -> Self {
        Self::of::<Vec<E>>()
    }

    /// Builds the literal for `HashMap<K, V>`.
    pub fn of_map<K: 'static, V: 'static>() -> Self {
        Self::of::<HashMap<K, V>>()
    }

    /// Builds a literal from an explicit raw type name, without arguments.
    ///
    /// # Errors
    ///
    /// Returns an error if `raw_name` is empty.
    pub fn named(raw_name: impl Into<String>) -> Result<Self, TypeLiteralError> {
        let raw_name = raw_name.into();
        ensure!(!raw_name.trim().is_empty(), EmptyTypeNameSnafu);
        Ok(Self {
            raw_name,
            argument_names: Vec::new(),
        })
    }

    /// Builds a literal from an explicit raw type name and argument names.
    /// Each argument is normalized to its own raw name.
    ///
    /// # Errors
    ///
    /// Returns an error if the raw name or any argument name is empty.
    pub fn parameterized<I, A>(raw_name: impl Into<String>, arguments: I) -> Result<Self, TypeLiteralError>
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        let raw_name = raw_name.into();
        ensure!(!raw_name.trim().is_empty(), EmptyTypeNameSnafu);
        let argument_names = arguments
            .into_iter()
            .map(|arg| {
                let arg = arg.into();
                ensure!(!arg.trim().is_empty(), EmptyTypeNameSnafu);
                Ok(normalize_argument(&arg))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            raw_name,
            argument_names,
        })
    }

    /// Returns the reserved literal representing an unknown or wildcard type.
    /// It is distinct from every concrete type literal.
    pub fn wildcard() -> Self {
        Self {
            raw_name: any::type_name::<WildcardMarker>().to_string(),
            argument_names: Vec::new(),
        }
    }

    /// Builds a literal from a structural type description, typically
    /// translated from a foreign framework's type model.
    ///
    /// Parameterized arguments are erased to their raw name. A wildcard is
    /// flattened into the reserved marker with two synthetic argument slots,
    /// the lower bound name and the upper bound name.
    ///
    /// # Errors
    ///
    /// Returns an error if any name is empty or a wildcard bound is itself
    /// a wildcard.
    pub fn from_descriptor(descriptor: &TypeDescriptor) -> Result<Self, TypeLiteralError> {
        match descriptor {
            TypeDescriptor::Simple { name } => Self::named(name.clone()),
            TypeDescriptor::Parameterized { raw, arguments } => {
                let names = arguments
                    .iter()
                    .map(bound_name)
                    .collect::<Result<Vec<_>, _>>()?;
                Self::parameterized(raw.clone(), names)
            }
            TypeDescriptor::Wildcard { lower, upper } => {
                let lower = lower.as_deref().map(bound_name).transpose()?;
                let upper = upper.as_deref().map(bound_name).transpose()?;
                let marker = Self::wildcard().raw_name;
                Ok(Self {
                    argument_names: vec![
                        lower.unwrap_or_else(|| marker.clone()),
                        upper.unwrap_or_else(|| marker.clone()),
                    ],
                    raw_name: marker,
                })
            }
        }
    }

    pub fn raw_name(&self) -> &str {
        &self.raw_name
    }

    pub fn argument_names(&self) -> &[String] {
        &self.argument_names
    }

    pub fn is_wildcard(&self) -> bool {
        self.raw_name == any::type_name::<WildcardMarker>()
    }
}

impl Display for TypeLiteral {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.raw_name)?;
        if !self.argument_names.is_empty() {
            write!(f, "<{}>", self.argument_names.join(", "))?;
        }
        Ok(())
    }
}

/// A structural type description used to construct [`TypeLiteral`]s for types
/// that are not expressible as a Rust type parameter, e.g. keys translated
/// from another framework's binding model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeDescriptor {
    Simple {
        name: String,
    },
    Parameterized {
        raw: String,
        arguments: Vec<TypeDescriptor>,
    },
    Wildcard {
        lower: Option<Box<TypeDescriptor>>,
        upper: Option<Box<TypeDescriptor>>,
    },
}

#[derive(Debug, Snafu, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TypeLiteralError {
    #[snafu(display("could not build a type literal from an empty type name"))]
    #[non_exhaustive]
    EmptyTypeName,
    #[snafu(display("could not build a type literal from a wildcard nested in a wildcard bound"))]
    #[non_exhaustive]
    NestedWildcard,
}

fn bound_name(descriptor: &TypeDescriptor) -> Result<String, TypeLiteralError> {
    match descriptor {
        TypeDescriptor::Simple { name } => {
            ensure!(!name.trim().is_empty(), EmptyTypeNameSnafu);
            Ok(name.clone())
        }
        TypeDescriptor::Parameterized { raw, .. } => {
            ensure!(!raw.trim().is_empty(), EmptyTypeNameSnafu);
            Ok(raw.clone())
        }
        TypeDescriptor::Wildcard { .. } => NestedWildcardSnafu.fail(),
    }
}

fn parse_type_name(full: &str) -> (String, Vec<String>) {
    let Some(start) = full.find('<') else {
        return (full.to_string(), Vec::new());
    };
    if !full.ends_with('>') {
        return (full.to_string(), Vec::new());
    }

    let raw = full[..start].to_string();
    let inner = &full[start + 1..full.len() - 1];
    let arguments = split_top_level(inner)
        .into_iter()
        .map(normalize_argument)
        .collect();
    (raw, arguments)
}

/// Splits comma-separated argument names, ignoring commas nested in angle
/// brackets, parentheses or square brackets.
fn split_top_level(arguments: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;

    for (pos, ch) in arguments.char_indices() {
        match ch {
            '<' | '(' | '[' => depth += 1,
            '>' | ')' | ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&arguments[start..pos]);
                start = pos + 1;
            }
            _ => {}
        }
    }
    parts.push(&arguments[start..]);
    parts
}

/// Erases an argument to its raw name: one level of generic arguments is the
/// supported depth, anything deeper is dropped.
fn normalize_argument(argument: &str) -> String {
    let argument = argument.trim();
    match argument.find('<') {
        Some(pos) if argument.ends_with('>') => argument[..pos].to_string(),
        _ => argument.to_string(),
    }
}
