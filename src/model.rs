//! Building an optimisation model with inertia provision from an energy system.
use crate::blocks::BlockContext;
use crate::energy_system::EnergySystem;
use crate::error::ModelError;
use crate::grouping::{Block, Groups};
use crate::id::{EdgeID, NodeID};
use crate::inertia::{ProvisionType, moment_of_inertia_from_inertia_constant};
use crate::optimisation::{Problem, Solution, VariableKey};
use crate::sequence::Sequence;
use crate::units::{MomentOfInertia, Seconds};
use crate::wind::WindInertiaEstimator;
use anyhow::{Context, Result};
use indexmap::IndexMap;
use log::{debug, info, warn};
use strum::IntoEnumIterator;

pub mod parameters;
pub use parameters::ModelParameters;

/// Options affecting how a model is built
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelOptions {
    /// Whether an inertia source without a correlated flow is an error rather than a warning
    pub strict_correlation: bool,
}

/// Maps each inertia source to the flow leaving the same source node
pub type Correlations = IndexMap<EdgeID, EdgeID>;

/// Per-timestep inertia values of an inertia source
#[derive(Debug, Clone, PartialEq)]
pub struct InertiaSeries {
    /// Inertia constant H
    pub inertia_constant: Vec<Seconds>,
    /// Moment of inertia J
    pub moment_of_inertia: Vec<MomentOfInertia>,
}

/// The per-timestep inertia values of every inertia source.
///
/// For `synthetic_wind` sources these depend on the output of the correlated flow, so they are
/// computed once while building the model and read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InertiaProfile(IndexMap<EdgeID, InertiaSeries>);

impl InertiaProfile {
    /// Compute the inertia values of every inertia source of an energy system
    pub fn build(
        energy_system: &EnergySystem,
        correlations: &Correlations,
        estimator: &dyn WindInertiaEstimator,
    ) -> Result<Self> {
        let num_timesteps = energy_system.num_timesteps();
        let frequency = energy_system.parameters().physics_frequency();

        let mut profile = IndexMap::new();
        for (id, inertia) in energy_system.sources_inertia() {
            let series = match inertia.provision_type() {
                ProvisionType::SyntheticWind => {
                    let inertia_constant = match correlations.get(&id) {
                        Some(flow_id) => {
                            wind_inertia_constants(energy_system, &id, flow_id, estimator)?
                        }
                        None => vec![Seconds(0.0); num_timesteps],
                    };
                    let moment_of_inertia = inertia_constant
                        .iter()
                        .map(|&h| {
                            moment_of_inertia_from_inertia_constant(
                                h,
                                inertia.apparent_power(),
                                frequency,
                            )
                        })
                        .collect();
                    InertiaSeries {
                        inertia_constant,
                        moment_of_inertia,
                    }
                }
                _ => InertiaSeries {
                    inertia_constant: vec![inertia.inertia_constant(); num_timesteps],
                    moment_of_inertia: inertia
                        .moment_of_inertia()
                        .to_series(num_timesteps)
                        .into_iter()
                        .map(MomentOfInertia)
                        .collect(),
                },
            };
            profile.insert(id, series);
        }

        Ok(Self(profile))
    }

    /// The inertia values of an inertia source
    pub fn get(&self, id: &EdgeID) -> Option<&InertiaSeries> {
        self.0.get(id)
    }

    /// The moment of inertia of a source at timestep `t`, or zero for unknown sources
    pub fn moment_of_inertia(&self, id: &EdgeID, t: usize) -> MomentOfInertia {
        self.0
            .get(id)
            .map_or(MomentOfInertia(0.0), |series| series.moment_of_inertia[t])
    }
}

/// H(t) = estimate(fix(t)) * emulated_inertia_constant
fn wind_inertia_constants(
    energy_system: &EnergySystem,
    inertia_source: &EdgeID,
    flow_id: &EdgeID,
    estimator: &dyn WindInertiaEstimator,
) -> Result<Vec<Seconds>> {
    let emulated_inertia_constant = energy_system
        .parameters()
        .emulated_inertia_constant
        .ok_or_else(|| {
            ModelError::formulation(
                inertia_source,
                "synthetic_wind sources need an emulated_inertia_constant for the energy system",
            )
        })?;
    let fix = fixed_profile(energy_system, inertia_source, flow_id)?;

    Ok((0..energy_system.num_timesteps())
        .map(|t| estimator.estimate(fix.get(t)) * emulated_inertia_constant)
        .collect())
}

/// The fix profile of the flow correlated with an inertia source
pub fn fixed_profile<'a>(
    energy_system: &'a EnergySystem,
    inertia_source: &EdgeID,
    flow_id: &EdgeID,
) -> Result<&'a Sequence> {
    let flow = energy_system.get_flow(flow_id)?;
    let fix = flow.fix.as_ref().ok_or_else(|| {
        ModelError::formulation(
            inertia_source,
            format!("the correlated flow {flow_id} has no fix profile"),
        )
    })?;

    Ok(fix)
}

/// Find the correlated flow of every inertia source
fn correlate(
    energy_system: &EnergySystem,
    groups: &Groups,
    options: &ModelOptions,
) -> Result<Correlations> {
    let mut correlations = Correlations::new();
    for id in &groups.inertia_sources {
        match energy_system.correlated_flow(id) {
            Some((flow_id, _)) => {
                correlations.insert(id.clone(), flow_id);
            }
            None if options.strict_correlation => Err(ModelError::MissingCorrelatedFlow {
                edge: id.to_string(),
            })?,
            None => warn!(
                "Inertia source {id} has no correlated flow. No inertia constraints are added \
                for it."
            ),
        }
    }

    Ok(correlations)
}

/// An optimisation model with inertia provision, ready to be solved
pub struct InertiaModel<'a> {
    energy_system: &'a EnergySystem,
    groups: Groups,
    correlations: Correlations,
    profile: InertiaProfile,
    problem: Problem,
}

impl<'a> InertiaModel<'a> {
    /// Build the model.
    ///
    /// The flow variables and their bounds are set up first, followed by the inertia profile.
    /// Then each block declares its variables and finally each block adds its constraints, in the
    /// order given by [`Block`].
    pub fn build(
        energy_system: &'a EnergySystem,
        options: &ModelOptions,
        estimator: &dyn WindInertiaEstimator,
    ) -> Result<Self> {
        energy_system.validate()?;

        let groups = Groups::new(energy_system);
        let correlations = correlate(energy_system, &groups, options)?;

        let mut problem = Problem::default();
        add_flow_variables(&mut problem, energy_system, &groups)?;
        set_flow_bounds(&mut problem, energy_system, &groups)?;

        let profile = InertiaProfile::build(energy_system, &correlations, estimator)?;

        let ctx = BlockContext {
            energy_system,
            groups: &groups,
            correlations: &correlations,
            profile: &profile,
        };
        for block in Block::iter() {
            block
                .add_variables(&mut problem, &ctx)
                .with_context(|| format!("Failed to add variables for {block} block"))?;
        }
        for block in Block::iter() {
            block
                .add_constraints(&mut problem, &ctx)
                .with_context(|| format!("Failed to add constraints for {block} block"))?;
        }
        debug!(
            "Model has {} variables and {} constraints",
            problem.num_variables(),
            problem.rows().len()
        );

        Ok(Self {
            energy_system,
            groups,
            correlations,
            profile,
            problem,
        })
    }

    /// The optimisation problem
    pub fn problem(&self) -> &Problem {
        &self.problem
    }

    /// The working sets of the blocks
    pub fn groups(&self) -> &Groups {
        &self.groups
    }

    /// The correlated flow of each inertia source which has one
    pub fn correlations(&self) -> &Correlations {
        &self.correlations
    }

    /// Per-timestep inertia values of the inertia sources
    pub fn profile(&self) -> &InertiaProfile {
        &self.profile
    }

    /// Solve the model
    pub fn solve(self) -> Result<SolvedModel<'a>> {
        let solution = self.problem.solve()?;
        info!("Objective value: {}", solution.objective_value());

        Ok(SolvedModel {
            energy_system: self.energy_system,
            profile: self.profile,
            solution,
        })
    }
}

/// A model which has been solved
#[derive(Debug)]
pub struct SolvedModel<'a> {
    /// The energy system the model was built from
    pub energy_system: &'a EnergySystem,
    /// Per-timestep inertia values of the inertia sources
    pub profile: InertiaProfile,
    /// Values of the variables
    pub solution: Solution,
}

/// Declare a flow variable for every flow and timestep
fn add_flow_variables(
    problem: &mut Problem,
    energy_system: &EnergySystem,
    groups: &Groups,
) -> Result<()> {
    for id in &groups.flows {
        let flow = energy_system.get_flow(id)?;
        let bounds = if flow.unidirectional {
            0.0..=f64::INFINITY
        } else {
            f64::NEG_INFINITY..=f64::INFINITY
        };
        for t in 0..energy_system.num_timesteps() {
            problem.add_variable(VariableKey::Flow(id.clone(), t), bounds.clone());
        }
    }

    Ok(())
}

/// Set the bounds of the flow variables of flows with a nominal value.
///
/// In order of priority:
/// 1. Flows leaving the source node of a `synthetic_storage` inertia source keep the share of
///    their capacity reserved for inertia emulation free.
/// 2. Flows with a fix profile are fixed.
/// 3. Other flows are limited by `max` and, unless non-convex, `min`.
fn set_flow_bounds(
    problem: &mut Problem,
    energy_system: &EnergySystem,
    groups: &Groups,
) -> Result<()> {
    // Largest reserved share per source node
    let mut reserved_shares: IndexMap<NodeID, f64> = IndexMap::new();
    for (id, inertia) in energy_system.sources_inertia() {
        if inertia.provision_type() == ProvisionType::SyntheticStorage {
            let share = reserved_shares.entry(id.source).or_insert(0.0);
            *share = share.max(inertia.inertia_power_share().0);
        }
    }

    for id in &groups.flows {
        let flow = energy_system.get_flow(id)?;
        let Some(nominal_value) = flow.nominal_value else {
            continue;
        };

        for t in 0..energy_system.num_timesteps() {
            let var = problem.get_variable(&VariableKey::Flow(id.clone(), t))?;
            if let Some(share) = reserved_shares.get(&id.source) {
                problem.set_upper(var, nominal_value * (1.0 - share));
            } else if let Some(fix) = flow.fixed_fraction(t) {
                problem.fix(var, fix * nominal_value);
            } else {
                problem.set_upper(var, flow.max.get(t) * nominal_value);
                if !flow.nonconvex {
                    problem.set_lower(var, flow.min.get(t) * nominal_value);
                } else if flow.unidirectional {
                    problem.set_lower(var, 0.0);
                }
            }
        }
    }

    Ok(())
}
