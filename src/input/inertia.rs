//! Code for reading inertia sources from a CSV file.
use super::{input_err_msg, read_csv_optional};
use crate::energy_system::EnergySystem;
use crate::id::EdgeID;
use crate::inertia::{InertiaEdge, InertiaParameters, ProvisionType};
use crate::sequence::Sequence;
use crate::units::{ApparentPower, Dimensionless, MomentOfInertia, Seconds};
use anyhow::{Context, Result, anyhow, ensure};
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::Path;

const INERTIA_SOURCES_FILE_NAME: &str = "inertia_sources.csv";
const INERTIA_COSTS_FILE_NAME: &str = "inertia_costs.csv";

#[derive(Debug, Deserialize, PartialEq)]
struct InertiaSourceRaw {
    source: String,
    target: String,
    provision_type: String,
    inertia_constant: Option<Seconds>,
    apparent_power: Option<ApparentPower>,
    inertia_costs: Option<f64>,
    moment_of_inertia: Option<MomentOfInertia>,
    minimum_stable_operation: Option<Dimensionless>,
    inertia_power_share: Option<Dimensionless>,
}

impl InertiaSourceRaw {
    fn into_parameters(self) -> Result<InertiaParameters> {
        let provision_type = ProvisionType::parse(&self.provision_type)?;
        let defaults = InertiaParameters::new(provision_type);

        Ok(InertiaParameters {
            inertia_constant: self.inertia_constant,
            apparent_power: self.apparent_power,
            inertia_costs: self
                .inertia_costs
                .map_or(defaults.inertia_costs, Sequence::Constant),
            moment_of_inertia: self.moment_of_inertia,
            minimum_stable_operation: self
                .minimum_stable_operation
                .unwrap_or(defaults.minimum_stable_operation),
            inertia_power_share: self
                .inertia_power_share
                .unwrap_or(defaults.inertia_power_share),
            ..defaults
        })
    }
}

#[derive(Debug, Deserialize, PartialEq)]
struct InertiaCostRaw {
    source: String,
    target: String,
    timestep: usize,
    value: f64,
}

type CostProfileMap = IndexMap<EdgeID, Vec<Option<f64>>>;

/// Read inertia sources and add them to the energy system.
///
/// Both files are optional: an energy system without inertia sources is a plain dispatch model.
/// Costs per timestep in `inertia_costs.csv` replace the scalar costs of `inertia_sources.csv`.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
/// * `energy_system` - The energy system, which must already contain the nodes
pub fn read_inertia_sources(model_dir: &Path, energy_system: &mut EnergySystem) -> Result<()> {
    let costs_path = model_dir.join(INERTIA_COSTS_FILE_NAME);
    let costs_csv = read_csv_optional(&costs_path)?;
    let mut costs = read_cost_profiles_from_iter(costs_csv, energy_system.num_timesteps())
        .with_context(|| input_err_msg(&costs_path))?;

    let file_path = model_dir.join(INERTIA_SOURCES_FILE_NAME);
    let sources_csv = read_csv_optional(&file_path)?;
    add_inertia_sources_from_iter(sources_csv, &mut costs, energy_system)
        .with_context(|| input_err_msg(&file_path))?;

    if let Some(id) = costs.keys().next() {
        return Err(anyhow!("Inertia costs given for unknown inertia source {id}")
            .context(input_err_msg(&costs_path)));
    }

    Ok(())
}

fn read_cost_profiles_from_iter<I>(iter: I, num_timesteps: usize) -> Result<CostProfileMap>
where
    I: Iterator<Item = InertiaCostRaw>,
{
    let mut costs = CostProfileMap::new();
    for raw in iter {
        let id = EdgeID::from((raw.source.as_str(), raw.target.as_str()));
        ensure!(
            raw.timestep < num_timesteps,
            "Timestep {} for inertia source {id} is out of range (model has {num_timesteps} \
            timesteps)",
            raw.timestep
        );

        let values = costs
            .entry(id.clone())
            .or_insert_with(|| vec![None; num_timesteps]);
        ensure!(
            values[raw.timestep].replace(raw.value).is_none(),
            "Duplicate value for timestep {} of inertia source {id}",
            raw.timestep
        );
    }

    Ok(costs)
}

fn add_inertia_sources_from_iter<I>(
    iter: I,
    costs: &mut CostProfileMap,
    energy_system: &mut EnergySystem,
) -> Result<()>
where
    I: Iterator<Item = InertiaSourceRaw>,
{
    let frequency = energy_system.parameters().physics_frequency();
    for raw in iter {
        let id = EdgeID::from((raw.source.as_str(), raw.target.as_str()));
        let mut params = raw.into_parameters()?;
        if let Some(values) = costs.shift_remove(&id) {
            let values = values
                .into_iter()
                .enumerate()
                .map(|(t, value)| {
                    value.with_context(|| {
                        format!("Inertia costs of {id} are missing timestep {t}")
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            params.inertia_costs = Sequence::Series(values);
        }

        let inertia = InertiaEdge::with_frequency(params, frequency)
            .with_context(|| format!("Invalid inertia source {id}"))?;

        energy_system.add_inertia_source(&id.source, &id.target, inertia)?;
    }

    Ok(())
}
