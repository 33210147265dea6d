//! Balance of inflows and outflows of buses.
use super::BlockContext;
use crate::energy_system::Edge;
use crate::optimisation::{ConstraintKey, Problem, VariableKey};
use anyhow::Result;

/// For each balanced bus and timestep, the sum of inflows equals the sum of outflows.
///
/// Inertia sources are not flows of energy and take no part.
pub fn add_constraints(problem: &mut Problem, ctx: &BlockContext) -> Result<()> {
    let mut terms = Vec::new();
    for bus in &ctx.groups.buses {
        let inputs: Vec<_> = ctx
            .energy_system
            .inputs(bus)
            .filter(|(_, edge)| matches!(edge, Edge::Flow(_)))
            .map(|(id, _)| id)
            .collect();
        let outputs: Vec<_> = ctx
            .energy_system
            .outputs(bus)
            .filter(|(_, edge)| matches!(edge, Edge::Flow(_)))
            .map(|(id, _)| id)
            .collect();

        for t in ctx.timesteps() {
            for id in &inputs {
                terms.push((problem.get_variable(&VariableKey::Flow(id.clone(), t))?, 1.0));
            }
            for id in &outputs {
                terms.push((problem.get_variable(&VariableKey::Flow(id.clone(), t))?, -1.0));
            }

            problem.add_row(
                ConstraintKey::BusBalance(bus.clone(), t),
                0.0..=0.0,
                terms.drain(..),
            );
        }
    }

    Ok(())
}
