use std::any;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::marker::PhantomData;
use std::sync::Arc;

use crate::container::injector::{Injector, InjectorError};
use crate::container::Managed;
use crate::key::Key;
use crate::util::any::Downcast;

/// A type-erased deferred handle to one binding. Holding the handle performs
/// no construction; every invocation runs a full, fresh resolution, which is
/// also how a dependency cycle is broken by deferring one of its edges.
#[derive(Clone)]
pub struct DynDeferred {
    injector: Arc<dyn Injector>,
    key: Key,
}

impl DynDeferred {
    pub fn new(injector: Arc<dyn Injector>, key: Key) -> Self {
        Self { injector, key }
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    /// Resolves the binding now.
    ///
    /// # Errors
    ///
    /// Returns all the errors a direct `get` of the same key would.
    pub fn get(&self) -> Result<Box<dyn Managed>, InjectorError> {
        self.injector.dyn_get(&self.key)
    }
}

impl Debug for DynDeferred {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("DynDeferred").field("key", &self.key).finish_non_exhaustive()
    }
}

/// The typed deferred handle injected for provider-wrapper dependency slots
/// and returned by provider lookups.
pub struct Deferred<T>
where
    T: Managed,
{
    inner: DynDeferred,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Deferred<T>
where
    T: Managed,
{
    pub fn from_dyn(inner: DynDeferred) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }

    pub fn key(&self) -> &Key {
        self.inner.key()
    }

    /// Resolves the binding now and downcasts the result.
    ///
    /// # Errors
    ///
    /// Returns all the errors a direct `get` of the same key would, plus
    /// a type mismatch if the binding produces something other than `T`,
    /// which can happen when the handle was described dynamically.
    pub fn get(&self) -> Result<T, InjectorError> {
        match self.inner.get()?.downcast::<T>() {
            Ok(object) => Ok(*object),
            Err(_) => Err(InjectorError::TypeMismatch {
                key: self.inner.key().clone(),
                expected: any::type_name::<T>(),
            }),
        }
    }
}

impl<T: Managed> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self::from_dyn(self.inner.clone())
    }
}

impl<T: Managed> Debug for Deferred<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Deferred").field("key", self.key()).finish_non_exhaustive()
    }
}
