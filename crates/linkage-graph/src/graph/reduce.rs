use serde::Serialize;
use tracing::{info, instrument};

use super::{EquationGraph, NodeIndex};
use crate::category::CategorySet;
use crate::error::{GraphError, Result};

/// Outcome of a `reduce_graph` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReductionStats {
    pub kept: usize,
    pub removed: usize,
}

impl EquationGraph {
    /// Remove every node that neither belongs to `keep` nor is transitively
    /// read by a node that does.
    ///
    /// Reducing twice with the same categories removes nothing the second time.
    #[instrument(skip(self), fields(keep = %keep))]
    pub fn reduce_graph(&mut self, keep: CategorySet) -> Result<ReductionStats> {
        if !self.built {
            return Err(GraphError::NotBuilt);
        }
        let roots = self.roots(keep, CategorySet::EMPTY);
        if roots.is_empty() {
            return Err(GraphError::NoMatchingCategory { categories: keep });
        }

        let needed = self.closure(&roots);
        let mut removed = 0;
        for index in self.live_indices() {
            if !needed.contains(&index) {
                self.nodes[index].removed = true;
                let symbol = self.nodes[index].symbol().clone();
                self.store.evict(&symbol);
                removed += 1;
            }
        }

        for level in &mut self.levels {
            level.retain(|i| needed.contains(i));
        }
        self.levels.retain(|level| !level.is_empty());
        self.relink();

        let stats = ReductionStats {
            kept: needed.len(),
            removed,
        };
        info!(kept = stats.kept, removed = stats.removed, "reduced equation graph");
        Ok(stats)
    }

    /// Live nodes in any of `include` and none of `exclude`, in insertion order.
    pub(super) fn roots(&self, include: CategorySet, exclude: CategorySet) -> Vec<NodeIndex> {
        self.live_indices()
            .into_iter()
            .filter(|&i| {
                let categories = self.nodes[i].expression.categories;
                categories.intersects(include) && !categories.intersects(exclude)
            })
            .collect()
    }
}
