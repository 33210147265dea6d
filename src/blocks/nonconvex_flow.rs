//! Flows with an on/off status.
use super::BlockContext;
use crate::optimisation::{ConstraintKey, Problem, VariableKey};
use anyhow::{Context, Result};

/// Declare a binary status for each non-convex flow and timestep
pub fn add_variables(problem: &mut Problem, ctx: &BlockContext) -> Result<()> {
    for id in &ctx.groups.nonconvex_flows {
        for t in ctx.timesteps() {
            problem.add_binary(VariableKey::Status(id.clone(), t));
        }
    }

    Ok(())
}

/// `status(t) * min(t) * nominal <= flow(t) <= status(t) * max(t) * nominal`
pub fn add_constraints(problem: &mut Problem, ctx: &BlockContext) -> Result<()> {
    for id in &ctx.groups.nonconvex_flows {
        let flow = ctx.energy_system.get_flow(id)?;
        let nominal_value = flow
            .nominal_value
            .with_context(|| format!("Non-convex flow {id} has no nominal value"))?;

        for t in ctx.timesteps() {
            let var = problem.get_variable(&VariableKey::Flow(id.clone(), t))?;
            let status = problem.get_variable(&VariableKey::Status(id.clone(), t))?;
            problem.add_row(
                ConstraintKey::NonConvexFlowMax(id.clone(), t),
                f64::NEG_INFINITY..=0.0,
                [(var, 1.0), (status, -flow.max.get(t) * nominal_value)],
            );
            problem.add_row(
                ConstraintKey::NonConvexFlowMin(id.clone(), t),
                0.0..=f64::INFINITY,
                [(var, 1.0), (status, -flow.min.get(t) * nominal_value)],
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::energy_system::EnergySystem;
    use crate::fixture::{build_model, nonconvex_energy_system};
    use crate::optimisation::{ConstraintKey, VariableKey};
    use rstest::rstest;

    #[rstest]
    fn test_status_and_limits(nonconvex_energy_system: EnergySystem) {
        let model = build_model(&nonconvex_energy_system);
        let problem = model.problem();
        let id = ("coal_plant", "electricity");
        assert!(
            problem
                .variable(&VariableKey::Status(id.into(), 2))
                .is_some()
        );

        let row = problem
            .row(&ConstraintKey::NonConvexFlowMin(id.into(), 0))
            .unwrap();
        assert_eq!(row.terms[1].1, -0.4 * 60.0);

        // Flow bounds don't include min for non-convex flows
        let var = problem
            .variable(&VariableKey::Flow(id.into(), 0))
            .unwrap();
        assert_eq!(problem.bounds(var), 0.0..=60.0);
    }
}
