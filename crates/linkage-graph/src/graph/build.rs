//! The build pipeline.

use serde::Serialize;
use tracing::{info, instrument};

use super::EquationGraph;
use super::topology::CycleError;
use crate::error::{GraphError, Result};

/// Summary of one `build_graph` run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildStats {
    /// Live nodes after the build.
    pub nodes: usize,
    pub levels: usize,
    /// Total operation count before and after optimisation.
    pub operations_before: usize,
    pub operations_after: usize,
    pub simplification_failures: usize,
    pub duplicates_folded: usize,
    pub temporaries: usize,
    pub aliases_removed: usize,
}

impl EquationGraph {
    /// Check bindings, optimise, and compute the topological order.
    ///
    /// Fails with [`GraphError::UnboundSymbol`] naming the first expression
    /// (in insertion order) that reads an undefined, undeclared symbol, or
    /// with [`GraphError::CyclicDependency`] naming the symbols of one cycle.
    #[instrument(skip(self), fields(nodes = self.len(), inputs = self.inputs.len()))]
    pub fn build_graph(&mut self) -> Result<BuildStats> {
        self.check_bound()?;
        self.relink();
        self.topological_levels()
            .map_err(|cycle| self.cycle_error(cycle))?;

        let mut stats = BuildStats {
            operations_before: self.operation_count(),
            ..BuildStats::default()
        };

        if self.config.optimize {
            stats.simplification_failures = self.simplify_nodes();
            stats.duplicates_folded = self.fold_duplicates();
            if self.config.eliminate_common_subexpressions {
                stats.temporaries = self.eliminate_common_subexpressions();
            }
            stats.aliases_removed = self.eliminate_aliases();
            self.relink();
        }

        self.levels = self
            .topological_levels()
            .map_err(|cycle| self.cycle_error(cycle))?;
        self.store.clear_cache();
        self.built = true;

        stats.nodes = self.len();
        stats.levels = self.levels.len();
        stats.operations_after = self.operation_count();
        info!(
            nodes = stats.nodes,
            levels = stats.levels,
            operations_before = stats.operations_before,
            operations_after = stats.operations_after,
            temporaries = stats.temporaries,
            aliases_removed = stats.aliases_removed,
            "equation graph built"
        );
        Ok(stats)
    }

    fn check_bound(&self) -> Result<()> {
        for node in self.nodes.iter().filter(|n| !n.removed) {
            for read in &node.reads {
                if self.live_index(read).is_none() && !self.inputs.contains_key(read) {
                    return Err(GraphError::UnboundSymbol {
                        symbol: read.name().to_string(),
                        expression: node.expression.name.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    fn cycle_error(&self, cycle: CycleError) -> GraphError {
        GraphError::CyclicDependency {
            symbols: cycle
                .path
                .iter()
                .map(|&i| self.nodes[i].symbol().name().to_string())
                .collect(),
        }
    }
}
