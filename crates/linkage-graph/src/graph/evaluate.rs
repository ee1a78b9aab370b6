//! Value queries and input changes.

use std::collections::{HashSet, VecDeque};

use linkage_symbolics::{Atom, Symbol, Value};
use tracing::debug;

use super::{EquationGraph, NodeIndex};
use crate::error::{GraphError, Result};
use crate::store::ValueStore;

impl EquationGraph {
    pub fn value_store(&self) -> &ValueStore {
        &self.store
    }

    /// Bind a declared input to a new value and evict every cached node that
    /// transitively reads it.
    pub fn change_value(&mut self, symbol: &Symbol, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        if !self.inputs.contains_key(symbol) {
            return Err(GraphError::NotAnInput(symbol.name().to_string()));
        }
        if value.shape() != symbol.shape() {
            return Err(GraphError::ShapeMismatch {
                symbol: symbol.name().to_string(),
                expected: symbol.shape(),
                found: value.shape(),
            });
        }
        self.store.bind(symbol, value);
        let evicted = self.invalidate_dependents(symbol);
        debug!(input = %symbol, evicted, revision = self.store.revision(), "changed input value");
        Ok(())
    }

    /// Current value of `symbol`.
    ///
    /// Inputs without a binding stay symbolic, so the result is numeric
    /// exactly when every input it depends on has a numeric binding.
    pub fn get_value(&mut self, symbol: &Symbol) -> Result<Value> {
        if self.inputs.contains_key(symbol) {
            return Ok(self
                .store
                .binding(symbol)
                .cloned()
                .unwrap_or_else(|| symbol.value()));
        }
        if let Some(index) = self.live_index(symbol) {
            self.evaluate_node(index)?;
            return self
                .store
                .cached(symbol)
                .cloned()
                .ok_or_else(|| GraphError::UnknownSymbol(symbol.name().to_string()));
        }
        if let Some(aliased) = self.aliases.get(symbol).cloned() {
            let mut resolved = Vec::new();
            for target in aliased.free_symbols() {
                resolved.push((target.clone(), self.get_value(&target)?));
            }
            return Ok(aliased.substitute(&|atom: &Atom| {
                resolved
                    .iter()
                    .find(|(s, _)| s == atom.symbol())
                    .and_then(|(_, v)| v.element(atom.flat_index()).ok().cloned())
            }));
        }
        Err(GraphError::UnknownSymbol(symbol.name().to_string()))
    }

    /// Numeric elements of `symbol`'s current value, if fully bound.
    pub fn get_numbers(&mut self, symbol: &Symbol) -> Result<Option<Vec<f64>>> {
        Ok(self.get_value(symbol)?.as_numbers())
    }

    /// Evaluate `target` and any stale node it reads, dependencies first.
    fn evaluate_node(&mut self, target: NodeIndex) -> Result<()> {
        if self.store.is_cached(self.nodes[target].symbol()) {
            return Ok(());
        }
        let mut path: Vec<(NodeIndex, usize)> = vec![(target, 0)];
        let mut on_path: HashSet<NodeIndex> = HashSet::from([target]);

        while let Some(&(index, position)) = path.last() {
            let reads = &self.nodes[index].reads;
            if position < reads.len() {
                let read = reads[position].clone();
                if let Some(top) = path.last_mut() {
                    top.1 += 1;
                }
                let Some(dep) = self.live_index(&read) else {
                    continue;
                };
                if self.store.is_cached(&read) {
                    continue;
                }
                if !on_path.insert(dep) {
                    let start = path.iter().position(|(i, _)| *i == dep).unwrap_or(0);
                    let symbols = path[start..]
                        .iter()
                        .map(|(i, _)| self.nodes[*i].symbol().name().to_string())
                        .collect();
                    return Err(GraphError::CyclicDependency { symbols });
                }
                path.push((dep, 0));
            } else {
                let node = &self.nodes[index];
                let value = node
                    .expression
                    .value
                    .substitute(&|atom: &Atom| self.store.lookup(atom));
                let symbol = node.symbol().clone();
                self.store.insert(&symbol, value);
                on_path.remove(&index);
                path.pop();
            }
        }
        Ok(())
    }

    /// Evict cached values downstream of `symbol`; returns how many were evicted.
    pub(crate) fn invalidate_dependents(&mut self, symbol: &Symbol) -> usize {
        let mut evicted = 0;
        let mut seen: HashSet<Symbol> = HashSet::new();
        let mut queue: VecDeque<Symbol> = VecDeque::from([symbol.clone()]);
        while let Some(current) = queue.pop_front() {
            let Some(consumers) = self.consumers.get(&current) else {
                continue;
            };
            for &index in consumers {
                let consumer = self.nodes[index].symbol().clone();
                if seen.insert(consumer.clone()) {
                    if self.store.evict(&consumer) {
                        evicted += 1;
                    }
                    queue.push_back(consumer);
                }
            }
        }
        evicted
    }
}
