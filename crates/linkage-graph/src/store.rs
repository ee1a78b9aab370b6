//! Cached values of graph symbols.
//!
//! The store keeps the current binding of every input that has been given a
//! value and a cache of evaluated node values. Each cache entry is stamped
//! with the store revision it was computed at. Changing an input evicts only
//! the nodes that transitively read it; everything else stays cached.

use std::collections::HashMap;

use indexmap::IndexMap;
use linkage_symbolics::{Atom, Expr, Symbol, Value};

#[derive(Debug, Clone)]
struct CachedValue {
    value: Value,
    revision: u64,
}

/// Input bindings plus per-node value cache.
#[derive(Debug, Default)]
pub struct ValueStore {
    bindings: IndexMap<Symbol, Value>,
    cache: HashMap<Symbol, CachedValue>,
    revision: u64,
    evaluations: u64,
}

impl ValueStore {
    /// Incremented on every input change.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Number of node evaluations performed so far.
    pub fn evaluation_count(&self) -> u64 {
        self.evaluations
    }

    pub fn binding(&self, symbol: &Symbol) -> Option<&Value> {
        self.bindings.get(symbol)
    }

    /// Revision at which `symbol`'s cached value was computed.
    pub fn cached_revision(&self, symbol: &Symbol) -> Option<u64> {
        self.cache.get(symbol).map(|c| c.revision)
    }

    pub(crate) fn bind(&mut self, symbol: &Symbol, value: Value) {
        self.bindings.insert(symbol.clone(), value);
        self.revision += 1;
    }

    pub(crate) fn cached(&self, symbol: &Symbol) -> Option<&Value> {
        self.cache.get(symbol).map(|c| &c.value)
    }

    pub(crate) fn is_cached(&self, symbol: &Symbol) -> bool {
        self.cache.contains_key(symbol)
    }

    pub(crate) fn insert(&mut self, symbol: &Symbol, value: Value) {
        self.evaluations += 1;
        self.cache.insert(
            symbol.clone(),
            CachedValue {
                value,
                revision: self.revision,
            },
        );
    }

    pub(crate) fn evict(&mut self, symbol: &Symbol) -> bool {
        self.cache.remove(symbol).is_some()
    }

    pub(crate) fn clear_cache(&mut self) {
        self.cache.clear();
    }

    /// Current element for `atom` from bindings or cache.
    pub(crate) fn lookup(&self, atom: &Atom) -> Option<Expr> {
        let symbol = atom.symbol();
        self.bindings
            .get(symbol)
            .or_else(|| self.cache.get(symbol).map(|c| &c.value))
            .and_then(|value| value.element(atom.flat_index()).ok().cloned())
    }
}
