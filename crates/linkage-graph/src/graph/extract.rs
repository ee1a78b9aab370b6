//! Ordered equation extraction for code generation.

use indexmap::IndexSet;
use linkage_symbolics::Symbol;
use tracing::debug;

use super::EquationGraph;
use crate::category::CategorySet;
use crate::error::{GraphError, Result};
use crate::expression::{EquationList, ExternalInput};

impl EquationGraph {
    /// Equations needed to compute every expression in `output` that is not
    /// in `exclude`, in topological order.
    ///
    /// `exclude` only filters which expressions are requested; an excluded
    /// expression is still emitted when a requested one reads it, so the list
    /// is always closed. Inputs appear in order of first reference.
    pub fn get_equations(&self, output: CategorySet, exclude: CategorySet) -> Result<EquationList> {
        if !self.built {
            return Err(GraphError::NotBuilt);
        }
        let roots = self.roots(output, exclude);
        if roots.is_empty() {
            return Err(GraphError::NoMatchingCategory { categories: output });
        }
        let needed = self.closure(&roots);

        let mut equations = Vec::with_capacity(needed.len());
        let mut referenced: IndexSet<Symbol> = IndexSet::new();
        for &index in self.levels.iter().flatten() {
            if !needed.contains(&index) {
                continue;
            }
            let node = &self.nodes[index];
            referenced.extend(
                node.reads
                    .iter()
                    .filter(|s| self.inputs.contains_key(*s))
                    .cloned(),
            );
            equations.push(node.expression.clone());
        }

        let inputs: Vec<ExternalInput> = referenced
            .into_iter()
            .filter_map(|symbol| {
                let input = self.inputs.get(&symbol)?;
                Some(ExternalInput {
                    shape: symbol.shape(),
                    categories: input.categories,
                    symbol,
                })
            })
            .collect();

        debug!(
            %output,
            %exclude,
            equations = equations.len(),
            inputs = inputs.len(),
            "extracted equations"
        );
        Ok(EquationList { equations, inputs })
    }
}
