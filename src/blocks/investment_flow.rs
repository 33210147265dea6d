//! Flows whose capacity is decided by the optimisation.
use super::BlockContext;
use crate::flow::Investment;
use crate::id::EdgeID;
use crate::optimisation::{ConstraintKey, Problem, VariableKey};
use anyhow::{Context, Result};

fn get_investment<'a>(ctx: &BlockContext<'a>, id: &EdgeID) -> Result<&'a Investment> {
    ctx.energy_system
        .get_flow(id)?
        .investment
        .as_ref()
        .with_context(|| format!("Flow {id} has no investment"))
}

/// Declare the invested capacity of each flow, with its periodical costs
pub fn add_variables(problem: &mut Problem, ctx: &BlockContext) -> Result<()> {
    for id in &ctx.groups.investment_flows {
        let investment = get_investment(ctx, id)?;
        let var = problem.add_variable(
            VariableKey::Invest(id.clone()),
            investment.minimum..=investment.maximum,
        );
        problem.add_cost(var, investment.ep_costs);
    }

    Ok(())
}

/// Limit each flow by its total capacity: invested plus existing.
///
/// A flow with a fix profile is fixed to a fraction of its total capacity. Otherwise it lies
/// between `min` and `max` times its total capacity.
pub fn add_constraints(problem: &mut Problem, ctx: &BlockContext) -> Result<()> {
    for id in &ctx.groups.investment_flows {
        let flow = ctx.energy_system.get_flow(id)?;
        let existing = get_investment(ctx, id)?.existing;
        let invest = problem.get_variable(&VariableKey::Invest(id.clone()))?;

        for t in ctx.timesteps() {
            let var = problem.get_variable(&VariableKey::Flow(id.clone(), t))?;

            // flow - fraction * invest <= / = / >= fraction * existing
            if let Some(fix) = flow.fixed_fraction(t) {
                let rhs = fix * existing;
                problem.add_row(
                    ConstraintKey::InvestmentFlowFixed(id.clone(), t),
                    rhs..=rhs,
                    [(var, 1.0), (invest, -fix)],
                );
                continue;
            }

            let max = flow.max.get(t);
            problem.add_row(
                ConstraintKey::InvestmentFlowMax(id.clone(), t),
                f64::NEG_INFINITY..=max * existing,
                [(var, 1.0), (invest, -max)],
            );

            let min = flow.min.get(t);
            if min != 0.0 {
                problem.add_row(
                    ConstraintKey::InvestmentFlowMin(id.clone(), t),
                    min * existing..=f64::INFINITY,
                    [(var, 1.0), (invest, -min)],
                );
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::energy_system::EnergySystem;
    use crate::fixture::{build_model, investment_energy_system};
    use crate::optimisation::{ConstraintKey, VariableKey};
    use rstest::rstest;

    #[rstest]
    fn test_invest_variable(investment_energy_system: EnergySystem) {
        let model = build_model(&investment_energy_system);
        let problem = model.problem();
        let invest = problem
            .variable(&VariableKey::Invest(("solar", "electricity").into()))
            .unwrap();
        assert_eq!(problem.bounds(invest), 0.0..=1000.0);
        assert_eq!(problem.cost(invest), 20.0);
    }

    #[rstest]
    fn test_investment_flow_rows(investment_energy_system: EnergySystem) {
        let model = build_model(&investment_energy_system);
        let problem = model.problem();
        let row = problem
            .row(&ConstraintKey::InvestmentFlowMax(("solar", "electricity").into(), 0))
            .unwrap();
        assert_eq!(*row.bounds.end(), 0.8 * 10.0);
        assert_eq!(row.terms[1].1, -0.8);
        assert!(
            problem
                .row(&ConstraintKey::InvestmentFlowMin(("solar", "electricity").into(), 0))
                .is_none()
        );
    }
}
