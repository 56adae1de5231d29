//! Participant registry for the relay server.
//!
//! Maps each connected alias to the endpoint it receives packets on.
//! Entries are ephemeral and lost on relay restart. Iteration is only
//! offered as an owned snapshot, ordered by registration, so callers never
//! hold the lock while sending.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::transport::Endpoint;

/// A registered participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    /// Unique display name.
    pub alias: String,
    /// Where the participant receives packets.
    pub endpoint: Endpoint,
}

#[derive(Debug)]
struct Entry {
    seq: u64,
    endpoint: Endpoint,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    next_seq: u64,
}

impl Inner {
    fn ordered<'a>(&'a self, skip: Option<&'a str>) -> Vec<Participant> {
        let mut rows: Vec<(&String, &Entry)> = self
            .entries
            .iter()
            .filter(|(alias, _)| Some(alias.as_str()) != skip)
            .collect();
        rows.sort_unstable_by_key(|(_, entry)| entry.seq);
        rows.into_iter()
            .map(|(alias, entry)| Participant {
                alias: alias.clone(),
                endpoint: entry.endpoint.clone(),
            })
            .collect()
    }
}

/// In-memory directory of connected participants.
///
/// Thread-safe via [`RwLock`]. Every method takes the lock exactly once, so
/// each operation is atomic with respect to every other.
#[derive(Debug, Default)]
pub struct Registry {
    inner: RwLock<Inner>,
}

impl Registry {
    /// Creates a new, empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `alias` at `endpoint`.
    ///
    /// Returns `true` if the alias was absent and is now registered, `false`
    /// (leaving the existing entry untouched) if it was already present.
    pub fn register(&self, alias: &str, endpoint: Endpoint) -> bool {
        let mut inner = self.inner.write();
        if inner.entries.contains_key(alias) {
            return false;
        }
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner
            .entries
            .insert(alias.to_string(), Entry { seq, endpoint });
        true
    }

    /// Removes `alias`. Returns `true` if it was registered.
    pub fn unregister(&self, alias: &str) -> bool {
        self.inner.write().entries.remove(alias).is_some()
    }

    /// Returns the endpoint registered for `alias`, if any.
    #[must_use]
    pub fn lookup(&self, alias: &str) -> Option<Endpoint> {
        self.inner
            .read()
            .entries
            .get(alias)
            .map(|entry| entry.endpoint.clone())
    }

    /// Returns `true` if `alias` is registered.
    #[must_use]
    pub fn contains(&self, alias: &str) -> bool {
        self.inner.read().entries.contains_key(alias)
    }

    /// Snapshot of every participant other than `alias`, in registration order.
    #[must_use]
    pub fn all_except(&self, alias: &str) -> Vec<Participant> {
        self.inner.read().ordered(Some(alias))
    }

    /// Snapshot of every participant, in registration order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Participant> {
        self.inner.read().ordered(None)
    }

    /// Number of registered participants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    /// Returns `true` if nobody is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().entries.is_empty()
    }
}
