//! Variable costs of flows.
use super::BlockContext;
use crate::optimisation::{Problem, VariableKey};
use anyhow::Result;

/// Add the variable costs of every flow to the objective
pub fn add_objective(problem: &mut Problem, ctx: &BlockContext) -> Result<()> {
    for id in &ctx.groups.flows {
        let flow = ctx.energy_system.get_flow(id)?;
        for t in ctx.timesteps() {
            let cost = flow.variable_costs.get(t);
            if cost != 0.0 {
                let var = problem.get_variable(&VariableKey::Flow(id.clone(), t))?;
                problem.add_cost(var, cost);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::energy_system::EnergySystem;
    use crate::fixture::{build_model, energy_system};
    use crate::optimisation::VariableKey;
    use rstest::rstest;

    #[rstest]
    fn test_variable_costs(energy_system: EnergySystem) {
        let model = build_model(&energy_system);
        let problem = model.problem();
        let var = problem
            .variable(&VariableKey::Flow(("gas_plant", "electricity").into(), 1))
            .unwrap();
        assert_eq!(problem.cost(var), 50.0);
    }
}
