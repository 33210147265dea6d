//! Commitment of inertia sources, their constraints and their costs.
//!
//! Each inertia source has a binary commitment per timestep. A committed source provides its
//! moment of inertia to the system.
use super::BlockContext;
use crate::error::ModelError;
use crate::id::EdgeID;
use crate::inertia::{InertiaEdge, ProvisionType};
use crate::model::fixed_profile;
use crate::optimisation::{ConstraintKey, Problem, Variable, VariableKey};
use anyhow::{Context, Result};
use indexmap::IndexMap;
use log::debug;

fn sources_inertia<'a>(ctx: &BlockContext<'a>) -> IndexMap<EdgeID, &'a InertiaEdge> {
    ctx.energy_system.sources_inertia()
}

fn commitment(problem: &Problem, id: &EdgeID, t: usize) -> Result<Variable> {
    problem.get_variable(&VariableKey::SourceInertia(id.clone(), t))
}

/// Declare the commitment of each inertia source.
///
/// The commitment of `synthetic_wind` and `none` sources follows the fix profile of their
/// correlated flow: they are committed whenever the flow is above zero.
pub fn add_variables(problem: &mut Problem, ctx: &BlockContext) -> Result<()> {
    for (id, inertia) in sources_inertia(ctx) {
        let vars: Vec<_> = ctx
            .timesteps()
            .map(|t| problem.add_binary(VariableKey::SourceInertia(id.clone(), t)))
            .collect();

        if !inertia.provision_type().has_fixed_commitment() {
            continue;
        }
        let Some(flow_id) = ctx.correlations.get(&id) else {
            continue;
        };

        let fix = fixed_profile(ctx.energy_system, &id, flow_id)?;
        for (t, var) in vars.into_iter().enumerate() {
            problem.fix(var, if fix.get(t) > 0.0 { 1.0 } else { 0.0 });
        }
    }

    Ok(())
}

/// Add the constraints linking synchronous generators to their flows and the system-wide
/// minimum inertia constraints
pub fn add_constraints(problem: &mut Problem, ctx: &BlockContext) -> Result<()> {
    let sources = sources_inertia(ctx);

    for (id, inertia) in &sources {
        if inertia.provision_type() != ProvisionType::SynchronousGenerator {
            continue;
        }
        let Some(flow_id) = ctx.correlations.get(id) else {
            continue;
        };
        add_generator_constraints(problem, ctx, id, inertia, flow_id)?;
    }

    let parameters = ctx.energy_system.parameters();
    if let Some(minimum) = parameters.minimum_system_synchronous_inertia {
        let synchronous: Vec<_> = sources
            .iter()
            .filter(|(_, inertia)| inertia.provision_type().is_synchronous())
            .map(|(id, _)| id)
            .collect();
        for t in ctx.timesteps() {
            let terms = inertia_terms(problem, ctx, &synchronous, t)?;
            problem.add_row(
                ConstraintKey::MinSynchronousInertia(t),
                minimum.value()..=f64::INFINITY,
                terms,
            );
        }
    }

    if let Some(minimum) = parameters.minimum_system_inertia {
        let all: Vec<_> = sources.keys().collect();
        for t in ctx.timesteps() {
            let terms = inertia_terms(problem, ctx, &all, t)?;
            problem.add_row(
                ConstraintKey::MinSystemInertia(t),
                minimum.value()..=f64::INFINITY,
                terms,
            );
        }
    }

    Ok(())
}

/// `commitment(t) * S * minimum_stable_operation <= flow(t)` and `commitment(t) >= flow(t) / S`
fn add_generator_constraints(
    problem: &mut Problem,
    ctx: &BlockContext,
    id: &EdgeID,
    inertia: &InertiaEdge,
    flow_id: &EdgeID,
) -> Result<()> {
    let apparent_power = inertia.apparent_power().value();
    if apparent_power <= 0.0 {
        Err(ModelError::formulation(
            id,
            "synchronous generators need an apparent power above 0",
        ))?;
    }
    let minimum_stable_operation = inertia.minimum_stable_operation().0;

    for t in ctx.timesteps() {
        let commitment = commitment(problem, id, t)?;
        let flow = problem
            .get_variable(&VariableKey::Flow(flow_id.clone(), t))
            .with_context(|| format!("Correlated flow of {id} has no variable"))?;

        problem.add_row(
            ConstraintKey::FlowInertia(id.clone(), t),
            f64::NEG_INFINITY..=0.0,
            [
                (commitment, apparent_power * minimum_stable_operation),
                (flow, -1.0),
            ],
        );
        problem.add_row(
            ConstraintKey::InertiaFlow(id.clone(), t),
            0.0..=f64::INFINITY,
            [(commitment, 1.0), (flow, -1.0 / apparent_power)],
        );
    }
    debug!("Added commitment constraints for synchronous generator {id}");

    Ok(())
}

/// `commitment(t) * J(t)` for each of `sources`
fn inertia_terms(
    problem: &Problem,
    ctx: &BlockContext,
    sources: &[&EdgeID],
    t: usize,
) -> Result<Vec<(Variable, f64)>> {
    sources
        .iter()
        .map(|id| {
            let var = commitment(problem, id, t)?;
            Ok((var, ctx.profile.moment_of_inertia(id, t).value()))
        })
        .collect()
}

/// Add `commitment(t) * J(t) * inertia_costs(t)` to the objective
pub fn add_objective(problem: &mut Problem, ctx: &BlockContext) -> Result<()> {
    for (id, inertia) in sources_inertia(ctx) {
        for t in ctx.timesteps() {
            let coeff =
                ctx.profile.moment_of_inertia(&id, t).value() * inertia.inertia_costs().get(t);
            if coeff != 0.0 {
                let var = commitment(problem, &id, t)?;
                problem.add_cost(var, coeff);
            }
        }
    }

    Ok(())
}
