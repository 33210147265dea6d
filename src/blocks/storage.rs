//! Content and balance of generic storages.
use super::BlockContext;
use crate::energy_system::{Edge, EnergySystem};
use crate::id::{EdgeID, NodeID};
use crate::node::{GenericStorage, NodeKind};
use crate::optimisation::{ConstraintKey, Problem, VariableKey};
use anyhow::{Result, bail};

fn get_storage<'a>(energy_system: &'a EnergySystem, id: &NodeID) -> Result<&'a GenericStorage> {
    match energy_system.node(id).map(|node| &node.kind) {
        Some(NodeKind::Storage(storage)) => Ok(storage),
        _ => bail!("{id} is not a storage"),
    }
}

/// Declare the content of each storage at the end of every timestep and before the first one
pub fn add_variables(problem: &mut Problem, ctx: &BlockContext) -> Result<()> {
    for id in &ctx.groups.storages {
        let storage = get_storage(ctx.energy_system, id)?;
        let capacity = storage.nominal_storage_capacity;
        for t in ctx.timesteps() {
            let lower = storage.min_storage_level.get(t) * capacity;
            let upper = storage.max_storage_level.get(t) * capacity;
            problem.add_variable(VariableKey::StorageContent(id.clone(), t), lower..=upper);
        }

        let initial = problem.add_variable(VariableKey::InitialContent(id.clone()), 0.0..=capacity);
        if let Some(level) = storage.initial_storage_level {
            problem.fix(initial, level * capacity);
        }
    }

    Ok(())
}

/// The single flow going in or out of a storage, if any
fn single_flow<'a>(edges: impl Iterator<Item = (EdgeID, &'a Edge)>) -> Option<EdgeID> {
    edges
        .filter(|(_, edge)| matches!(edge, Edge::Flow(_)))
        .map(|(id, _)| id)
        .next()
}

/// `content(t) = content(t-1) * (1 - loss_rate) + inflow(t) * eta_in - outflow(t) / eta_out`
///
/// For balanced storages, the content after the last timestep equals the initial content.
pub fn add_constraints(problem: &mut Problem, ctx: &BlockContext) -> Result<()> {
    for id in &ctx.groups.storages {
        let storage = get_storage(ctx.energy_system, id)?;
        let inflow = single_flow(ctx.energy_system.inputs(id));
        let outflow = single_flow(ctx.energy_system.outputs(id));
        let initial = problem.get_variable(&VariableKey::InitialContent(id.clone()))?;

        let mut previous = initial;
        for t in ctx.timesteps() {
            let content = problem.get_variable(&VariableKey::StorageContent(id.clone(), t))?;
            let mut terms = vec![(content, 1.0), (previous, -(1.0 - storage.loss_rate))];
            if let Some(inflow) = &inflow {
                let var = problem.get_variable(&VariableKey::Flow(inflow.clone(), t))?;
                terms.push((var, -storage.inflow_conversion_factor.get(t)));
            }
            if let Some(outflow) = &outflow {
                let var = problem.get_variable(&VariableKey::Flow(outflow.clone(), t))?;
                terms.push((var, 1.0 / storage.outflow_conversion_factor.get(t)));
            }

            problem.add_row(ConstraintKey::StorageBalance(id.clone(), t), 0.0..=0.0, terms);
            previous = content;
        }

        if storage.balanced {
            problem.add_row(
                ConstraintKey::StorageBalanced(id.clone()),
                0.0..=0.0,
                [(previous, 1.0), (initial, -1.0)],
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::energy_system::EnergySystem;
    use crate::fixture::{build_model, storage_energy_system};
    use crate::optimisation::{ConstraintKey, VariableKey};
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[rstest]
    fn test_storage_variables(storage_energy_system: EnergySystem) {
        let model = build_model(&storage_energy_system);
        let problem = model.problem();
        let initial = problem
            .variable(&VariableKey::InitialContent("battery".into()))
            .unwrap();
        assert_eq!(problem.bounds(initial), 5.0..=5.0);
        let content = problem
            .variable(&VariableKey::StorageContent("battery".into(), 1))
            .unwrap();
        assert_eq!(problem.bounds(content), 0.0..=10.0);
    }

    #[rstest]
    fn test_storage_balance(storage_energy_system: EnergySystem) {
        let model = build_model(&storage_energy_system);
        let problem = model.problem();
        let row = problem
            .row(&ConstraintKey::StorageBalance("battery".into(), 1))
            .unwrap();

        // content, previous content, inflow, outflow
        let coeffs: Vec<_> = row.terms.iter().map(|(_, coeff)| *coeff).collect();
        assert_eq!(coeffs.len(), 4);
        assert_approx_eq!(f64, coeffs[1], -0.9);
        assert_approx_eq!(f64, coeffs[2], -0.9);
        assert_approx_eq!(f64, coeffs[3], 1.0 / 0.8);

        assert!(
            problem
                .row(&ConstraintKey::StorageBalanced("battery".into()))
                .is_some()
        );
    }
}
