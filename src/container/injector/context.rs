use crate::key::Key;

/// Ephemeral per-request state threaded through a resolution. Holds the chain
/// of keys currently being constructed; dropped when the top-level request
/// returns.
#[derive(Clone)]
pub struct CallContext<'a> {
    trace: InjectionTrace<'a>,
}

impl<'a> CallContext<'a> {
    pub fn new(key: &'a Key) -> Self {
        Self {
            trace: InjectionTrace::new(key),
        }
    }

    pub fn append<'b>(&'b self, key: &'b Key) -> CallContext<'b> {
        CallContext {
            trace: self.trace.append(key),
        }
    }

    pub fn key(&self) -> &Key {
        self.trace.key()
    }

    pub fn trace(&self) -> &InjectionTrace<'_> {
        &self.trace
    }
}

/// A linked chain of in-progress keys, innermost last.
#[derive(Clone)]
pub struct InjectionTrace<'a> {
    key: &'a Key,
    previous: Option<&'a InjectionTrace<'a>>,
}

impl<'a> InjectionTrace<'a> {
    pub fn new(key: &'a Key) -> Self {
        Self {
            key,
            previous: None,
        }
    }

    pub fn append<'b>(&'b self, key: &'b Key) -> InjectionTrace<'b> {
        InjectionTrace {
            key,
            previous: Some(self),
        }
    }

    pub fn key(&self) -> &Key {
        self.key
    }

    pub fn previous(&self) -> Option<&InjectionTrace<'a>> {
        self.previous
    }

    pub fn previous_contains_key(&self, key: &Key) -> bool {
        let mut this = self;
        while let Some(previous) = this.previous() {
            if previous.key() == key {
                return true;
            }
            this = previous;
        }
        false
    }

    /// The full key chain from the top-level request to the current key,
    /// cloned for diagnostics.
    pub fn chain(&self) -> Vec<Key> {
        let mut chain = vec![self.key.clone()];
        let mut this = self;
        while let Some(previous) = this.previous() {
            chain.push(previous.key().clone());
            this = previous;
        }
        chain.reverse();
        chain
    }
}
