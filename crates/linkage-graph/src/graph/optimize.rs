//! Optimisation passes run by `build_graph`.
//!
//! Each pass rewrites node values without changing what any live symbol
//! evaluates to. Passes run in a fixed order and iterate nodes in insertion
//! order, so the result is independent of thread scheduling.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use linkage_symbolics::{Atom, Expr, ExprKind, SimplifyError, Symbol, Value};
use rayon::prelude::*;
use tracing::{debug, warn};

use super::{EquationGraph, Node, NodeIndex};
use crate::category::Category;
use crate::expression::Expression;

impl EquationGraph {
    /// Run the injected simplifier over every live node. Failures are logged
    /// and leave the node unchanged; returns the number of failures.
    pub(super) fn simplify_nodes(&mut self) -> usize {
        let simplifier = Arc::clone(&self.simplifier);
        let live = self.live_indices();
        let simplify = |&index: &NodeIndex| -> (NodeIndex, Result<Value, SimplifyError>) {
            (index, simplifier.simplify_value(&self.nodes[index].expression.value))
        };
        let results: Vec<_> = if self.config.parallel {
            live.par_iter().map(simplify).collect()
        } else {
            live.iter().map(simplify).collect()
        };

        let mut failures = 0;
        for (index, result) in results {
            match result {
                Ok(value) => self.nodes[index].set_value(value),
                Err(error) => {
                    warn!(
                        expression = %self.nodes[index].expression.name,
                        %error,
                        "simplification failed, keeping unsimplified value"
                    );
                    failures += 1;
                }
            }
        }
        failures
    }

    /// Turn every later node whose whole value equals an earlier node's into
    /// a reference to the earlier symbol.
    pub(super) fn fold_duplicates(&mut self) -> usize {
        let mut first_seen: HashMap<Value, NodeIndex> = HashMap::new();
        let mut folded = 0;
        for index in self.live_indices() {
            let value = &self.nodes[index].expression.value;
            if value.operation_count() == 0 {
                continue;
            }
            match first_seen.get(value) {
                Some(&original) => {
                    let target = self.nodes[original].symbol().clone();
                    debug!(
                        expression = %self.nodes[index].expression.name,
                        duplicate_of = %target,
                        "folded duplicate expression"
                    );
                    self.nodes[index].set_value(target.value());
                    folded += 1;
                }
                None => {
                    first_seen.insert(value.clone(), index);
                }
            }
        }
        folded
    }

    /// Hoist compound subexpressions that occur at least `min_occurrences`
    /// times into shared temporaries; returns the number of temporaries kept.
    pub(super) fn eliminate_common_subexpressions(&mut self) -> usize {
        let live = self.live_indices();
        let mut counts: HashMap<Expr, usize> = HashMap::new();
        for &index in &live {
            for element in self.nodes[index].expression.value.elements() {
                count_occurrences(element, &mut counts);
            }
        }

        // A scalar node whose entire value repeats elsewhere is its own temporary.
        let mut hoisted: IndexMap<Expr, Symbol> = IndexMap::new();
        for &index in &live {
            let expression = &self.nodes[index].expression;
            if let Ok(element) = expression.value.as_scalar()
                && is_hoistable(element)
                && counts.get(element).copied().unwrap_or(0) >= self.config.min_occurrences
            {
                hoisted
                    .entry(element.clone())
                    .or_insert_with(|| expression.symbol.clone());
            }
        }
        let mut hoister = Hoister {
            counts: &counts,
            min_occurrences: self.config.min_occurrences,
            hoisted,
            temporaries: Vec::new(),
            next_name: self.next_temporary,
        };
        let mut rewritten = Vec::with_capacity(live.len());
        for &index in &live {
            let value = &self.nodes[index].expression.value;
            let scalar_root = value.as_scalar().is_ok();
            rewritten.push(value.map(|e| hoister.rewrite(e, scalar_root)));
        }
        let Hoister {
            temporaries,
            next_name,
            ..
        } = hoister;
        self.next_temporary = next_name;

        for (&index, value) in live.iter().zip(rewritten) {
            self.nodes[index].set_value(value);
        }
        let mut created = Vec::with_capacity(temporaries.len());
        for (symbol, value) in temporaries {
            let index = self.nodes.len();
            self.by_symbol.insert(symbol.clone(), index);
            self.nodes.push(Node::new(Expression {
                name: symbol.name().to_string(),
                symbol,
                value: Value::scalar(value),
                categories: Category::Variable.into(),
            }));
            created.push(index);
        }

        let inlined = self.inline_single_use(&created);
        let kept = created.len() - inlined;
        if kept > 0 {
            debug!(temporaries = kept, inlined, "hoisted common subexpressions");
        }
        kept
    }

    /// Substitute temporaries that end up read exactly once back into their
    /// reader, outermost first.
    fn inline_single_use(&mut self, temporaries: &[NodeIndex]) -> usize {
        let mut uses: HashMap<Symbol, usize> = HashMap::new();
        for index in self.live_indices() {
            for element in self.nodes[index].expression.value.elements() {
                count_symbol_uses(element, &mut uses);
            }
        }

        let mut inlined = 0;
        for &temporary in temporaries.iter().rev() {
            let symbol = self.nodes[temporary].symbol().clone();
            if uses.get(&symbol).copied().unwrap_or(0) != 1 {
                continue;
            }
            let Ok(replacement) = self.nodes[temporary].expression.value.as_scalar().cloned() else {
                continue;
            };
            let Some(reader) = self
                .live_indices()
                .into_iter()
                .find(|&i| i != temporary && self.nodes[i].reads.contains(&symbol))
            else {
                continue;
            };
            let value = self.nodes[reader].expression.value.substitute(&|atom: &Atom| {
                (atom.symbol() == &symbol).then(|| replacement.clone())
            });
            self.nodes[reader].set_value(value);
            self.nodes[temporary].removed = true;
            inlined += 1;
        }
        inlined
    }

    /// Remove `Variable`-only nodes whose value is a plain reference to
    /// another symbol and point their readers at the target.
    pub(super) fn eliminate_aliases(&mut self) -> usize {
        let mut targets: IndexMap<Symbol, Symbol> = IndexMap::new();
        for index in self.live_indices() {
            let node = &self.nodes[index];
            if !node.expression.categories.is_only(Category::Variable) {
                continue;
            }
            if let Some(target) = node.expression.value.alias_target()
                && &target != node.symbol()
            {
                targets.insert(node.symbol().clone(), target);
            }
        }
        if targets.is_empty() {
            return 0;
        }

        // Follow chains a -> b -> c to their end.
        let resolve = |symbol: &Symbol| -> Symbol {
            let mut current = symbol.clone();
            for _ in 0..=targets.len() {
                match targets.get(&current) {
                    Some(next) => current = next.clone(),
                    None => break,
                }
            }
            current
        };
        let resolved: IndexMap<Symbol, Symbol> = targets.keys().map(|s| (s.clone(), resolve(s))).collect();

        for index in self.live_indices() {
            let node = &mut self.nodes[index];
            if let Some(target) = resolved.get(node.symbol()) {
                debug!(alias = %node.symbol(), target = %target, "removed alias");
                node.removed = true;
                self.aliases.insert(node.symbol().clone(), target.value());
                continue;
            }
            if node.reads.iter().any(|s| resolved.contains_key(s)) {
                let value = node.expression.value.substitute(&|atom: &Atom| {
                    resolved
                        .get(atom.symbol())
                        .and_then(|target| Self::retarget(atom, target))
                });
                node.set_value(value);
            }
        }
        resolved.len()
    }
}

/// Subexpressions worth sharing: anything compound except a plain negation
/// or scaling of a leaf.
fn is_hoistable(expr: &Expr) -> bool {
    match expr.kind() {
        ExprKind::Number(_) | ExprKind::Atom(_) => false,
        ExprKind::Mul(factors) => {
            !(factors.len() == 2 && factors[0].as_number().is_some() && factors[1].is_leaf())
        }
        _ => true,
    }
}

/// Count occurrences, descending into a subexpression only on its first
/// sighting so repeats inside a repeated parent are not double counted.
fn count_occurrences(expr: &Expr, counts: &mut HashMap<Expr, usize>) {
    if expr.is_leaf() {
        return;
    }
    let seen = counts.entry(expr.clone()).or_insert(0);
    *seen += 1;
    if *seen == 1 {
        for child in expr.children() {
            count_occurrences(child, counts);
        }
    }
}

fn count_symbol_uses(expr: &Expr, uses: &mut HashMap<Symbol, usize>) {
    match expr.kind() {
        ExprKind::Atom(atom) => *uses.entry(atom.symbol().clone()).or_insert(0) += 1,
        _ => {
            for child in expr.children() {
                count_symbol_uses(child, uses);
            }
        }
    }
}

struct Hoister<'a> {
    counts: &'a HashMap<Expr, usize>,
    min_occurrences: usize,
    hoisted: IndexMap<Expr, Symbol>,
    temporaries: Vec<(Symbol, Expr)>,
    next_name: usize,
}

impl Hoister<'_> {
    /// Rewrite bottom-up; `root` marks the whole value of a scalar node,
    /// which must not be replaced by a reference to itself.
    fn rewrite(&mut self, expr: &Expr, root: bool) -> Expr {
        if expr.is_leaf() {
            return expr.clone();
        }
        let repeated = is_hoistable(expr)
            && self.counts.get(expr).copied().unwrap_or(0) >= self.min_occurrences;
        if repeated
            && !root
            && let Some(symbol) = self.hoisted.get(expr)
        {
            return Expr::atom(Atom::Symbol(symbol.clone()));
        }
        let rebuilt = expr.map_children(|child| self.rewrite(child, false));
        if !repeated || root {
            return rebuilt;
        }
        let symbol = Symbol::scalar(format!("_cse{}", self.next_name));
        self.next_name += 1;
        self.hoisted.insert(expr.clone(), symbol.clone());
        self.temporaries.push((symbol.clone(), rebuilt));
        Expr::atom(Atom::Symbol(symbol))
    }
}
