//! Conversion relations of transformers.
use super::BlockContext;
use crate::energy_system::{Edge, EnergySystem};
use crate::error::ModelError;
use crate::id::{EdgeID, NodeID};
use crate::node::{NodeKind, Transformer};
use crate::optimisation::{ConstraintKey, Problem, VariableKey};
use anyhow::{Result, bail};

/// For each transformer, input, output and timestep:
/// `flow(input) / cf(input) = flow(output) / cf(output)`.
///
/// Only outputs into balanced nodes are related to the inputs.
pub fn add_constraints(problem: &mut Problem, ctx: &BlockContext) -> Result<()> {
    let energy_system = ctx.energy_system;
    for node_id in &ctx.groups.transformers {
        let transformer = get_transformer(energy_system, node_id)?;
        let inputs = flow_ids(energy_system.inputs(node_id));
        let outputs: Vec<_> = flow_ids(energy_system.outputs(node_id))
            .into_iter()
            .filter(|id| {
                energy_system
                    .node(&id.target)
                    .is_some_and(|node| node.is_balanced())
            })
            .collect();

        for t in ctx.timesteps() {
            for input in &inputs {
                let input_factor = conversion_factor(transformer, node_id, &input.source, t)?;
                let input_var = problem.get_variable(&VariableKey::Flow(input.clone(), t))?;
                for output in &outputs {
                    let output_factor = conversion_factor(transformer, node_id, &output.target, t)?;
                    let output_var = problem.get_variable(&VariableKey::Flow(output.clone(), t))?;
                    problem.add_row(
                        ConstraintKey::TransformerRelation {
                            input: input.clone(),
                            output: output.clone(),
                            timestep: t,
                        },
                        0.0..=0.0,
                        [
                            (input_var, 1.0 / input_factor),
                            (output_var, -1.0 / output_factor),
                        ],
                    );
                }
            }
        }
    }

    Ok(())
}

fn get_transformer<'a>(energy_system: &'a EnergySystem, id: &NodeID) -> Result<&'a Transformer> {
    match energy_system.node(id).map(|node| &node.kind) {
        Some(NodeKind::Transformer(transformer)) => Ok(transformer),
        _ => bail!("{id} is not a transformer"),
    }
}

fn flow_ids<'a>(edges: impl Iterator<Item = (EdgeID, &'a Edge)>) -> Vec<EdgeID> {
    edges
        .filter(|(_, edge)| matches!(edge, Edge::Flow(_)))
        .map(|(id, _)| id)
        .collect()
}

/// The conversion factor for a connection, which must be finite and non-zero
fn conversion_factor(
    transformer: &Transformer,
    node: &NodeID,
    connection: &NodeID,
    t: usize,
) -> Result<f64> {
    let factor = transformer.conversion_factor(connection, t);
    if factor == 0.0 || !factor.is_finite() {
        Err(ModelError::formulation(
            node,
            format!("invalid conversion factor {factor} for connection {connection}"),
        ))?;
    }

    Ok(factor)
}

#[cfg(test)]
mod tests {
    use crate::energy_system::EnergySystem;
    use crate::error::ModelError;
    use crate::fixture::{build_model, chp_energy_system, chp_energy_system_with_factor};
    use crate::model::{InertiaModel, ModelOptions};
    use crate::optimisation::ConstraintKey;
    use crate::wind::PiecewiseLinearCurve;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[rstest]
    fn test_transformer_relation(chp_energy_system: EnergySystem) {
        let model = build_model(&chp_energy_system);
        let row = model
            .problem()
            .row(&ConstraintKey::TransformerRelation {
                input: ("gas", "chp").into(),
                output: ("chp", "electricity").into(),
                timestep: 0,
            })
            .unwrap();
        assert_eq!(row.bounds, 0.0..=0.0);
        assert_approx_eq!(f64, row.terms[0].1, 1.0);
        assert_approx_eq!(f64, row.terms[1].1, -1.0 / 0.4);

        // Heat goes into an unbalanced bus so it is not related to the input
        assert!(
            model
                .problem()
                .row(&ConstraintKey::TransformerRelation {
                    input: ("gas", "chp").into(),
                    output: ("chp", "heat").into(),
                    timestep: 0,
                })
                .is_none()
        );
    }

    #[test]
    fn test_zero_conversion_factor() {
        let energy_system = chp_energy_system_with_factor(0.0);
        let err = InertiaModel::build(
            &energy_system,
            &ModelOptions::default(),
            &PiecewiseLinearCurve::default(),
        )
        .err()
        .unwrap();
        assert_eq!(
            err.downcast_ref::<ModelError>(),
            Some(&ModelError::formulation(
                "chp",
                "invalid conversion factor 0 for connection electricity"
            ))
        );
    }
}
