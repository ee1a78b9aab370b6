//! Topological levelling and cycle reporting.

use super::{EquationGraph, NodeIndex};

/// A dependency cycle, listed in dependency order (each node reads the next,
/// the last reads the first).
#[derive(Debug)]
pub(super) struct CycleError {
    pub(super) path: Vec<NodeIndex>,
}

impl EquationGraph {
    /// Group live nodes into levels using Kahn's algorithm.
    ///
    /// Level 0 holds nodes that read no other node; every later node sits one
    /// level after its deepest dependency. Within a level nodes keep
    /// insertion order, which makes the global order deterministic.
    pub(super) fn topological_levels(&self) -> Result<Vec<Vec<NodeIndex>>, CycleError> {
        let live = self.live_indices();
        if live.is_empty() {
            return Ok(Vec::new());
        }

        let mut in_degree = vec![0usize; self.nodes.len()];
        let mut dependents: Vec<Vec<NodeIndex>> = vec![Vec::new(); self.nodes.len()];
        for &index in &live {
            let mut deps = self.dependencies(index);
            deps.sort_unstable();
            deps.dedup();
            in_degree[index] = deps.len();
            for dep in deps {
                dependents[dep].push(index);
            }
        }

        let mut levels = Vec::new();
        let mut current: Vec<NodeIndex> = live.iter().copied().filter(|&i| in_degree[i] == 0).collect();
        let mut processed = 0;

        while !current.is_empty() {
            // Sort for determinism
            current.sort_unstable();
            processed += current.len();

            let mut next = Vec::new();
            for &index in &current {
                for &dependent in &dependents[index] {
                    in_degree[dependent] -= 1;
                    if in_degree[dependent] == 0 {
                        next.push(dependent);
                    }
                }
            }
            levels.push(current);
            current = next;
        }

        if processed != live.len() {
            let stuck: Vec<NodeIndex> = live.into_iter().filter(|&i| in_degree[i] > 0).collect();
            return Err(CycleError {
                path: self.trace_cycle(&stuck, &in_degree),
            });
        }
        Ok(levels)
    }

    /// Walk unresolved dependencies from the first stuck node until a node
    /// repeats. Every stuck node reads at least one other stuck node, so the
    /// walk always closes.
    fn trace_cycle(&self, stuck: &[NodeIndex], in_degree: &[usize]) -> Vec<NodeIndex> {
        let Some(&start) = stuck.first() else {
            return Vec::new();
        };
        let mut walk = vec![start];
        let mut current = start;
        loop {
            let Some(next) = self
                .dependencies(current)
                .into_iter()
                .find(|&d| in_degree[d] > 0)
            else {
                return walk;
            };
            if let Some(position) = walk.iter().position(|&i| i == next) {
                return walk.split_off(position);
            }
            walk.push(next);
            current = next;
        }
    }
}
