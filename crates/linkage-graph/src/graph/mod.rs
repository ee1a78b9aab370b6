//! The equation graph.
//!
//! Nodes are stored in insertion order and addressed by index; a symbol maps
//! to at most one defining node. Dependencies are derived from the atoms of
//! each node's value, so references to not-yet-defined symbols are allowed
//! until [`EquationGraph::build_graph`] checks them.
//!
//! Lifecycle: register (`declare_input`, `add_expression`) → build →
//! optionally reduce → extract, with value queries and input changes allowed
//! at any point. Registering after a build marks the graph unbuilt again.

mod build;
mod evaluate;
mod extract;
mod optimize;
mod reduce;
mod topology;


use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use linkage_symbolics::{Atom, BasicSimplifier, Expr, Simplifier, Symbol, Value};
use tracing::debug;

use crate::category::CategorySet;
use crate::config::GraphConfig;
use crate::error::{GraphError, Result};
use crate::expression::Expression;
use crate::store::ValueStore;

pub use build::BuildStats;
pub use reduce::ReductionStats;

pub(crate) type NodeIndex = usize;

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) expression: Expression,
    /// Symbols read by the value, in first-occurrence order.
    pub(crate) reads: IndexSet<Symbol>,
    /// Value as handed to `add_expression`, untouched by optimisation.
    registered: Value,
    pub(crate) removed: bool,
}

impl Node {
    fn new(expression: Expression) -> Self {
        let registered = expression.value.clone();
        Self::registered_as(expression, registered)
    }

    fn registered_as(expression: Expression, registered: Value) -> Self {
        let reads = expression.value.free_symbols();
        Self {
            expression,
            reads,
            registered,
            removed: false,
        }
    }

    pub(crate) fn symbol(&self) -> &Symbol {
        &self.expression.symbol
    }

    pub(crate) fn set_value(&mut self, value: Value) {
        self.reads = value.free_symbols();
        self.expression.value = value;
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Input {
    pub(crate) categories: CategorySet,
}

/// Dependency graph of symbolic equations.
pub struct EquationGraph {
    config: GraphConfig,
    simplifier: Arc<dyn Simplifier>,
    nodes: Vec<Node>,
    by_symbol: IndexMap<Symbol, NodeIndex>,
    inputs: IndexMap<Symbol, Input>,
    /// Symbols removed as aliases, with the value they stood for.
    aliases: IndexMap<Symbol, Value>,
    /// For each symbol, the live nodes whose value reads it.
    consumers: IndexMap<Symbol, Vec<NodeIndex>>,
    levels: Vec<Vec<NodeIndex>>,
    built: bool,
    next_temporary: usize,
    store: ValueStore,
}

impl EquationGraph {
    /// Create a graph with an explicit configuration and simplifier.
    pub fn new(config: GraphConfig, simplifier: Arc<dyn Simplifier>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            simplifier,
            nodes: Vec::new(),
            by_symbol: IndexMap::new(),
            inputs: IndexMap::new(),
            aliases: IndexMap::new(),
            consumers: IndexMap::new(),
            levels: Vec::new(),
            built: false,
            next_temporary: 0,
            store: ValueStore::default(),
        })
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Register an external input (state, parameter, time) that is never
    /// defined in-graph. Redeclaring with the same categories is a no-op.
    pub fn declare_input(
        &mut self,
        symbol: &Symbol,
        categories: impl Into<CategorySet>,
        initial: Option<Value>,
    ) -> Result<()> {
        let categories = categories.into();
        if categories.is_empty() {
            return Err(GraphError::EmptyCategory {
                expression: symbol.name().to_string(),
            });
        }
        if let Some(&index) = self.by_symbol.get(symbol)
            && !self.nodes[index].removed
        {
            return Err(GraphError::DuplicateSymbol {
                symbol: symbol.name().to_string(),
                existing: format!("expression {}", self.nodes[index].expression.name),
                requested: "input".to_string(),
            });
        }
        if let Some(existing) = self.inputs.get(symbol) {
            if existing.categories != categories {
                return Err(GraphError::DuplicateSymbol {
                    symbol: symbol.name().to_string(),
                    existing: format!("input {}", existing.categories),
                    requested: format!("input {categories}"),
                });
            }
        } else {
            self.inputs.insert(symbol.clone(), Input { categories });
            self.built = false;
            debug!(input = %symbol, %categories, "declared input");
        }
        if let Some(initial) = initial {
            self.change_value(symbol, initial)?;
        }
        Ok(())
    }

    /// Register `symbol := value`.
    ///
    /// Re-registering an identical definition returns the symbol unchanged,
    /// also after a build has rewritten the stored value; any conflicting
    /// redefinition is a [`GraphError::DuplicateSymbol`].
    pub fn add_expression(
        &mut self,
        name: impl Into<String>,
        symbol: &Symbol,
        value: impl Into<Value>,
        categories: impl Into<CategorySet>,
    ) -> Result<Symbol> {
        let name = name.into();
        let requested = value.into();
        let value = self.resolve_aliases(&requested);
        let categories = categories.into();

        if categories.is_empty() {
            return Err(GraphError::EmptyCategory { expression: name });
        }
        if value.shape() != symbol.shape() {
            return Err(GraphError::ShapeMismatch {
                symbol: symbol.name().to_string(),
                expected: symbol.shape(),
                found: value.shape(),
            });
        }
        if self.inputs.contains_key(symbol) {
            return Err(GraphError::DuplicateSymbol {
                symbol: symbol.name().to_string(),
                existing: "input".to_string(),
                requested: format!("expression {name}"),
            });
        }
        if let Some(index) = self.live_index(symbol) {
            let node = &self.nodes[index];
            let existing = &node.expression;
            let same_value = node.registered == requested || existing.value == value;
            if same_value && existing.categories == categories {
                return Ok(symbol.clone());
            }
            return Err(GraphError::DuplicateSymbol {
                symbol: symbol.name().to_string(),
                existing: format!("{} = {:?}", existing.name, existing.value.elements()),
                requested: format!("{name} = {:?}", value.elements()),
            });
        }

        let node = Node::registered_as(
            Expression {
                name,
                symbol: symbol.clone(),
                value,
                categories,
            },
            requested,
        );
        let index = self.nodes.len();
        for read in &node.reads {
            self.consumers.entry(read.clone()).or_default().push(index);
        }
        debug!(
            expression = %node.expression.name,
            symbol = %symbol,
            reads = node.reads.len(),
            "added expression"
        );
        self.by_symbol.insert(symbol.clone(), index);
        self.aliases.shift_remove(symbol);
        self.nodes.push(node);
        self.invalidate_dependents(symbol);
        self.built = false;
        Ok(symbol.clone())
    }

    /// Create a fresh symbol of the value's shape and register it.
    pub fn define(
        &mut self,
        name: impl Into<String>,
        value: impl Into<Value>,
        categories: impl Into<CategorySet>,
    ) -> Result<Symbol> {
        let name = name.into();
        let value = value.into();
        let symbol = Symbol::new(name.clone(), value.shape());
        self.add_expression(name, &symbol, value, categories)
    }

    pub fn is_built(&self) -> bool {
        self.built
    }

    pub fn is_input(&self, symbol: &Symbol) -> bool {
        self.inputs.contains_key(symbol)
    }

    /// True if a live node defines `symbol`.
    pub fn is_defined(&self, symbol: &Symbol) -> bool {
        self.live_index(symbol).is_some()
    }

    /// The live expression defining `symbol`.
    pub fn expression(&self, symbol: &Symbol) -> Option<&Expression> {
        self.live_index(symbol).map(|i| &self.nodes[i].expression)
    }

    /// Live expressions in insertion order.
    pub fn expressions(&self) -> impl Iterator<Item = &Expression> {
        self.nodes
            .iter()
            .filter(|n| !n.removed)
            .map(|n| &n.expression)
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|n| !n.removed).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn inputs(&self) -> impl Iterator<Item = (&Symbol, CategorySet)> {
        self.inputs.iter().map(|(s, i)| (s, i.categories))
    }

    /// Topological levels of the last build; no node depends on another node
    /// of its own level.
    pub fn levels(&self) -> Vec<Vec<Symbol>> {
        self.levels
            .iter()
            .map(|level| {
                level
                    .iter()
                    .map(|&i| self.nodes[i].symbol().clone())
                    .collect()
            })
            .collect()
    }

    /// Global evaluation order of the last build.
    pub fn order(&self) -> Vec<Symbol> {
        self.levels.iter().flatten().map(|&i| self.nodes[i].symbol().clone()).collect()
    }

    pub(crate) fn live_index(&self, symbol: &Symbol) -> Option<NodeIndex> {
        self.by_symbol
            .get(symbol)
            .copied()
            .filter(|&i| !self.nodes[i].removed)
    }

    pub(crate) fn live_indices(&self) -> Vec<NodeIndex> {
        (0..self.nodes.len()).filter(|&i| !self.nodes[i].removed).collect()
    }

    /// Indices of the live nodes `index` reads.
    pub(crate) fn dependencies(&self, index: NodeIndex) -> Vec<NodeIndex> {
        self.nodes[index]
            .reads
            .iter()
            .filter_map(|s| self.live_index(s))
            .collect()
    }

    /// `roots` plus every live node they transitively read.
    pub(crate) fn closure(&self, roots: &[NodeIndex]) -> HashSet<NodeIndex> {
        let mut needed: HashSet<NodeIndex> = roots.iter().copied().collect();
        let mut queue: VecDeque<NodeIndex> = roots.iter().copied().collect();
        while let Some(index) = queue.pop_front() {
            for dep in self.dependencies(index) {
                if needed.insert(dep) {
                    queue.push_back(dep);
                }
            }
        }
        needed
    }

    /// Recompute the consumer index after node values changed.
    pub(crate) fn relink(&mut self) {
        self.consumers.clear();
        for (index, node) in self.nodes.iter().enumerate() {
            if node.removed {
                continue;
            }
            for read in &node.reads {
                self.consumers.entry(read.clone()).or_default().push(index);
            }
        }
    }

    /// Replace references to removed alias symbols by what they stood for.
    fn resolve_aliases(&self, value: &Value) -> Value {
        if self.aliases.is_empty() {
            return value.clone();
        }
        value.substitute(&|atom: &Atom| {
            self.aliases
                .get(atom.symbol())
                .and_then(|aliased| aliased.element(atom.flat_index()).ok().cloned())
        })
    }

    pub(crate) fn operation_count(&self) -> usize {
        self.expressions().map(|e| e.value.operation_count()).sum()
    }

    /// Reference to `atom`'s element of `target`, which has the same shape.
    pub(crate) fn retarget(atom: &Atom, target: &Symbol) -> Option<Expr> {
        target.at(atom.flat_index()).ok()
    }
}

impl Default for EquationGraph {
    fn default() -> Self {
        Self {
            config: GraphConfig::default(),
            simplifier: Arc::new(BasicSimplifier::default()),
            nodes: Vec::new(),
            by_symbol: IndexMap::new(),
            inputs: IndexMap::new(),
            aliases: IndexMap::new(),
            consumers: IndexMap::new(),
            levels: Vec::new(),
            built: false,
            next_temporary: 0,
            store: ValueStore::default(),
        }
    }
}
